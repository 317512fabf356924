// TypeOptions 序列化相关实现

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 类型选项结构
///
/// `type` 指定注册表中的实现名称，`options` 为该实现的配置，
/// 在创建实例时反序列化为对应的 Config 类型。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeOptions {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "empty_options")]
    pub options: JsonValue,
}

fn empty_options() -> JsonValue {
    JsonValue::Object(Default::default())
}

impl TypeOptions {
    /// 使用类型名称和任意可序列化的配置创建
    pub fn new<T: Serialize>(type_name: impl Into<String>, options: T) -> Result<Self> {
        Ok(Self {
            type_name: type_name.into(),
            options: serde_json::to_value(options)?,
        })
    }

    /// 仅指定类型名称，options 为空对象
    pub fn of(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            options: empty_options(),
        }
    }

    /// 从 JSON 字符串创建 TypeOptions（支持 JSON5 格式）
    pub fn from_json(json_str: &str) -> Result<Self> {
        Ok(json5::from_str(json_str)?)
    }

    /// 从 YAML 字符串创建 TypeOptions
    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml_str)?)
    }

    /// 从 TOML 字符串创建 TypeOptions
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// 将 options 解析为具体的配置类型
    pub fn options_as<C: DeserializeOwned>(&self) -> Result<C> {
        Ok(serde_json::from_value(self.options.clone())?)
    }

    /// 导出为 JSON 字符串
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
