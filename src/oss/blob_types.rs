use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use smart_default::SmartDefault;
use std::collections::HashMap;

/// 存储桶中的一个对象
///
/// 字段名与服务端 JSON 资源一致（camelCase），`size` 与 `generation`
/// 在线上以十进制字符串传输。
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlobObject {
    pub name: String,
    pub bucket: String,
    #[serde_as(as = "DisplayFromStr")]
    pub size: u64,
    /// 内容的 MD5，base64 编码
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crc32c: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

/// 写入后的完整性校验方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(rename_all = "lowercase")]
pub enum Validation {
    /// 比对本地计算的 MD5 与服务端返回的 md5Hash
    #[default]
    Md5,
    None,
}

/// 写入选项
#[derive(Debug, Clone, SmartDefault)]
pub struct WriteOptions {
    pub content_type: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    /// 覆盖客户端默认的校验方式
    pub validation: Option<Validation>,
}

impl WriteOptions {
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// 元数据更新
///
/// `metadata` 中值为 `None` 的键会从对象上删除。
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Option<String>>,
}

impl MetadataUpdate {
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), Some(value.into()));
        self
    }

    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), None);
        self
    }
}

/// 复制目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyDestination {
    /// 目标存储桶，`None` 表示与源相同
    pub bucket: Option<String>,
    pub name: String,
}

impl From<&str> for CopyDestination {
    fn from(name: &str) -> Self {
        Self {
            bucket: None,
            name: name.to_string(),
        }
    }
}

impl From<String> for CopyDestination {
    fn from(name: String) -> Self {
        Self { bucket: None, name }
    }
}

/// 分页游标
///
/// 对客户端不透明，只能原样交还给服务端继续列举。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 列举请求
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    /// 单页最多返回的对象数，必须为正
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<PageToken>,
}

impl ListQuery {
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }
}

/// 一页列举结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResult {
    pub objects: Vec<BlobObject>,
    /// 指定 delimiter 时折叠出的公共前缀
    pub prefixes: Vec<String>,
    /// 继续列举所需的请求；`None` 表示已经列举完毕
    pub next_query: Option<ListQuery>,
}
