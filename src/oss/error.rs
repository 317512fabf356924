use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 存储桶客户端统一错误类型
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("对象不存在: {name}")]
    NotFound { name: String },

    #[error("存储服务错误{}: {message}", status_suffix(.status))]
    Store {
        status: Option<u16>,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("数据流错误: {message}")]
    Stream {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("校验失败: {name} 期望 md5 {expected}, 实际 {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("配置错误: {0}")]
    Configuration(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" [{}]", s)).unwrap_or_default()
}

impl BlobError {
    /// 存储服务返回的非成功状态
    pub fn store(status: u16, message: impl Into<String>) -> Self {
        BlobError::Store {
            status: Some(status),
            message: message.into(),
            source: None,
        }
    }

    /// 传输层失败（连接、超时、TLS 等），没有 HTTP 状态
    pub fn from_transport<E>(err: E, context: &str) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BlobError::Store {
            status: None,
            message: context.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// 读写数据流过程中的失败
    pub fn from_stream<E>(err: E, context: &str) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BlobError::Stream {
            message: context.to_string(),
            source: Some(Box::new(err)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound { .. })
    }

    /// HTTP 状态码（仅 `Store` 错误可能携带）
    pub fn status(&self) -> Option<u16> {
        match self {
            BlobError::Store { status, .. } => *status,
            BlobError::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BlobError {
    fn from(err: serde_json::Error) -> Self {
        BlobError::Store {
            status: None,
            message: "响应解析失败".to_string(),
            source: Some(Box::new(err)),
        }
    }
}
