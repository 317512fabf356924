//! cfg 模块 - 配置管理
//!
//! 提供 `{type, options}` 形式的配置描述，以及基于 trait 的类型注册表，
//! 使 Transport 等组件可以完全由配置文件驱动创建。

pub mod macros;
pub mod registry;
pub mod serde_duration;
pub mod type_options;

pub use registry::{create_trait_from_type_options, register_trait};
pub use serde_duration::{format_duration, parse_duration, HumanDur};
pub use type_options::TypeOptions;
