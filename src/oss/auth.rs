use async_trait::async_trait;

use crate::oss::BlobError;

/// 鉴权提供者
///
/// 每次请求前调用，返回 `Authorization` 头的取值；`None` 表示匿名访问。
/// 凭证的获取与刷新由实现方负责。
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authorization(&self) -> Result<Option<String>, BlobError>;
}

/// 匿名访问（公开存储桶或本地模拟器）
#[derive(Debug, Default, Clone)]
pub struct Anonymous;

#[async_trait]
impl AuthProvider for Anonymous {
    async fn authorization(&self) -> Result<Option<String>, BlobError> {
        Ok(None)
    }
}

/// 固定的 Bearer Token
#[derive(Clone)]
pub struct BearerTokenAuth {
    token: String,
}

impl BearerTokenAuth {
    pub fn new(token: impl Into<String>) -> Result<Self, BlobError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(BlobError::Configuration("bearer token 不能为空".to_string()));
        }
        Ok(Self { token })
    }

    /// 从环境变量读取 token，变量不存在或为空时报错
    pub fn from_env(var: &str) -> Result<Self, BlobError> {
        let token = std::env::var(var).map_err(|_| {
            BlobError::Configuration(format!("环境变量 {} 未设置", var))
        })?;
        Self::new(token)
    }
}

impl std::fmt::Debug for BearerTokenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenAuth")
            .field("token", &"***")
            .finish()
    }
}

#[async_trait]
impl AuthProvider for BearerTokenAuth {
    async fn authorization(&self) -> Result<Option<String>, BlobError> {
        Ok(Some(format!("Bearer {}", self.token)))
    }
}
