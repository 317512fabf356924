// Trait 注册表和工厂函数

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::type_options::TypeOptions;

// 返回的 Box<dyn Any> 中实际装的是 Box<dyn Trait>
type TraitConstructor = Arc<dyn Fn(JsonValue) -> Result<Box<dyn Any + Send + Sync>> + Send + Sync>;

// 外层 key 为 Trait 的 TypeId，内层 key 为类型名称
static TRAIT_REGISTRY: Lazy<RwLock<HashMap<TypeId, HashMap<String, TraitConstructor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// 为实现特定 Trait 的类型注册构造函数
///
/// 构造通过 `TryFrom<Config>` 完成，配置非法或初始化失败时返回错误，
/// 而不是在注册表内部 panic。同名重复注册会覆盖之前的构造函数。
///
/// # 示例
/// ```ignore
/// register_trait::<ReqwestTransport, dyn Transport, ReqwestTransportConfig>("ReqwestTransport")?;
///
/// let transport: Box<dyn Transport> = create_trait_from_type_options(&type_options)?;
/// ```
pub fn register_trait<T, Trait, Config>(type_name: &str) -> Result<()>
where
    T: Send + Sync + 'static,
    Trait: ?Sized + Send + Sync + 'static,
    Config: DeserializeOwned + Send + Sync + 'static,
    T: TryFrom<Config>,
    <T as TryFrom<Config>>::Error: std::error::Error + Send + Sync + 'static,
    Box<T>: Into<Box<Trait>>,
{
    let trait_id = TypeId::of::<Trait>();

    let constructor: TraitConstructor = Arc::new(move |value| {
        let config: Config = serde_json::from_value(value)?;
        let instance = T::try_from(config)?;
        let trait_object: Box<Trait> = Box::new(instance).into();
        Ok(Box::new(trait_object) as Box<dyn Any + Send + Sync>)
    });

    let mut registry = TRAIT_REGISTRY
        .write()
        .map_err(|_| anyhow!("Failed to acquire write lock"))?;
    registry
        .entry(trait_id)
        .or_default()
        .insert(type_name.to_string(), constructor);

    Ok(())
}

/// 根据 TypeOptions 创建 trait object
pub fn create_trait_from_type_options<Trait>(type_options: &TypeOptions) -> Result<Box<Trait>>
where
    Trait: ?Sized + Send + Sync + 'static,
{
    let trait_id = TypeId::of::<Trait>();
    // 构造函数可能递归创建内层组件，调用前先释放读锁
    let constructor = {
        let registry = TRAIT_REGISTRY
            .read()
            .map_err(|_| anyhow!("Failed to acquire read lock"))?;
        registry
            .get(&trait_id)
            .and_then(|implementations| implementations.get(&type_options.type_name))
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    "Type '{}' not registered for this trait",
                    type_options.type_name
                )
            })?
    };

    let any_box = constructor(type_options.options.clone())?;

    any_box
        .downcast::<Box<Trait>>()
        .map(|boxed| *boxed)
        .map_err(|_| anyhow!("Failed to downcast to target trait type"))
}
