//! 带日志的 Transport 装饰器
//!
//! 包装任意一个 Transport，记录每次请求的方法、地址、状态码和耗时。

use async_trait::async_trait;
use garde::Validate;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::cfg::serde_duration::{serde_as, HumanDur};
use crate::cfg::{create_trait_from_type_options, TypeOptions};
use crate::impl_box_from;
use crate::oss::{BlobError, HttpRequest, HttpResponse, Transport};

/// TracingTransport 配置
#[serde_as]
#[derive(Debug, Clone, Deserialize, Serialize, SmartDefault, Validate)]
#[serde(default)]
pub struct TracingTransportConfig {
    /// 内部 Transport 配置
    #[garde(skip)]
    #[default(TypeOptions::of("ReqwestTransport"))]
    pub transport: TypeOptions,

    /// 超过该耗时的请求以 warn 级别记录
    #[serde_as(as = "HumanDur")]
    #[default(Duration::from_secs(1))]
    #[garde(skip)]
    pub slow_threshold: Duration,
}

pub struct TracingTransport {
    inner: Box<dyn Transport>,
    slow_threshold: Duration,
}

impl TracingTransport {
    pub fn new(config: TracingTransportConfig) -> Result<Self, BlobError> {
        if let Err(e) = config.validate() {
            return Err(BlobError::Configuration(format!("{}", e)));
        }

        let inner = create_trait_from_type_options::<dyn Transport>(&config.transport)
            .map_err(|e| BlobError::Configuration(format!("{:#}", e)))?;

        Ok(Self::from_parts(inner, config.slow_threshold))
    }

    /// 从已有的 Transport 创建
    pub fn from_parts(inner: Box<dyn Transport>, slow_threshold: Duration) -> Self {
        Self {
            inner,
            slow_threshold,
        }
    }
}

impl TryFrom<TracingTransportConfig> for TracingTransport {
    type Error = BlobError;

    fn try_from(config: TracingTransportConfig) -> Result<Self, Self::Error> {
        Self::new(config)
    }
}

impl_box_from!(TracingTransport => dyn Transport);

#[async_trait]
impl Transport for TracingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BlobError> {
        let method = request.method.clone();
        let url = request.url.clone();
        let start = Instant::now();

        let result = self.inner.send(request).await;
        let elapsed = start.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        match &result {
            Ok(response) if elapsed >= self.slow_threshold => {
                warn!(%method, %url, status = response.status.as_u16(), elapsed_ms, "slow storage request");
            }
            Ok(response) => {
                debug!(%method, %url, status = response.status.as_u16(), elapsed_ms, "storage request");
            }
            Err(err) => {
                warn!(%method, %url, error = %err, elapsed_ms, "storage request failed");
            }
        }

        result
    }
}
