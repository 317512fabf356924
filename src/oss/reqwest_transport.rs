use async_trait::async_trait;
use futures::stream::{StreamExt, TryStreamExt};
use garde::Validate;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::cfg::serde_duration::{serde_as, HumanDur};
use crate::impl_box_from;
use crate::oss::{
    Anonymous, AuthProvider, BearerTokenAuth, BlobError, ByteStream, HttpRequest, HttpResponse,
    RequestBody, Transport,
};

// 流式请求体在转发任务与 HTTP 客户端之间最多缓冲的块数
const STREAM_BODY_BUFFER: usize = 4;

/// ReqwestTransport 配置
///
/// 凭证获取顺序（优先级从高到低）：
/// 1. `bearer_token` - 直接配置的 token
/// 2. `bearer_token_env` - 从指定环境变量读取 token
/// 3. 匿名访问
#[serde_as]
#[derive(Deserialize, Serialize, SmartDefault, Clone, Validate)]
#[serde(default)]
pub struct ReqwestTransportConfig {
    /// 单次请求的总超时，未设置时不限制（大对象流式传输可能耗时很长）
    #[serde_as(as = "Option<HumanDur>")]
    #[garde(skip)]
    pub timeout: Option<Duration>,

    /// 建立连接的超时
    #[serde_as(as = "HumanDur")]
    #[default(Duration::from_secs(10))]
    #[garde(skip)]
    pub connect_timeout: Duration,

    #[default = "blobx/0.1"]
    #[garde(length(min = 1))]
    pub user_agent: String,

    #[garde(skip)]
    pub bearer_token: Option<String>,

    #[garde(skip)]
    pub bearer_token_env: Option<String>,
}

/// 基于 reqwest 的 HTTP(S) 传输层
pub struct ReqwestTransport {
    client: reqwest::Client,
    auth: Arc<dyn AuthProvider>,
}

impl ReqwestTransport {
    pub fn new(config: ReqwestTransportConfig) -> Result<Self, BlobError> {
        if let Err(errors) = config.validate() {
            return Err(BlobError::Configuration(format!("{}", errors)));
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BlobError::Configuration(format!("创建 HTTP 客户端失败: {}", e)))?;

        let auth: Arc<dyn AuthProvider> = match (&config.bearer_token, &config.bearer_token_env) {
            (Some(token), _) => Arc::new(BearerTokenAuth::new(token.as_str())?),
            (None, Some(var)) => Arc::new(BearerTokenAuth::from_env(var)?),
            (None, None) => Arc::new(Anonymous),
        };

        Ok(Self { client, auth })
    }

    /// 替换鉴权提供者
    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    /// reqwest 要求流式请求体满足 Sync，这里经由 channel 转发
    fn stream_body(stream: ByteStream) -> reqwest::Body {
        let (tx, rx) = mpsc::channel(STREAM_BODY_BUFFER);
        tokio::spawn(async move {
            let mut stream = stream;
            while let Some(chunk) = stream.next().await {
                let failed = chunk.is_err();
                // 接收端已关闭说明请求被放弃，停止读取源数据
                if tx.send(chunk).await.is_err() || failed {
                    break;
                }
            }
        });
        reqwest::Body::wrap_stream(ReceiverStream::new(rx))
    }
}

impl TryFrom<ReqwestTransportConfig> for ReqwestTransport {
    type Error = BlobError;

    fn try_from(config: ReqwestTransportConfig) -> Result<Self, Self::Error> {
        Self::new(config)
    }
}

impl_box_from!(ReqwestTransport => dyn Transport);

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BlobError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| BlobError::InvalidArgument(format!("不支持的 HTTP 方法: {}", e)))?;

        let mut builder = self.client.request(method, request.url.as_str());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name.as_str(), value.as_bytes());
        }
        if let Some(authorization) = self.auth.authorization().await? {
            builder = builder.header("authorization", authorization);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Stream { stream, length } => {
                if let Some(length) = length {
                    builder = builder.header("content-length", length.to_string());
                }
                builder.body(Self::stream_body(stream))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| BlobError::from_transport(e, "发送请求失败"))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| BlobError::from_transport(e, "无效的响应状态"))?;

        let mut headers = HeaderMap::new();
        for (name, value) in response.headers() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                headers.append(name, value);
            }
        }

        let body = response
            .bytes_stream()
            .map_err(|e| BlobError::from_stream(e, "读取响应体失败"))
            .boxed();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
