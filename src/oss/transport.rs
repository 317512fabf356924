use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::oss::BlobError;

/// 字节块流，读写两个方向共用
pub type ByteStream = BoxStream<'static, Result<Bytes, BlobError>>;

/// 请求体
pub enum RequestBody {
    Empty,
    Bytes(Bytes),
    /// 流式请求体，`length` 未知时由传输层决定分块发送
    Stream {
        stream: ByteStream,
        length: Option<u64>,
    },
}

impl RequestBody {
    pub fn len(&self) -> Option<u64> {
        match self {
            RequestBody::Empty => Some(0),
            RequestBody::Bytes(bytes) => Some(bytes.len() as u64),
            RequestBody::Stream { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// 将请求体读完，流式请求体中途出错时返回该错误
    pub async fn collect(self) -> Result<Bytes, BlobError> {
        match self {
            RequestBody::Empty => Ok(Bytes::new()),
            RequestBody::Bytes(bytes) => Ok(bytes),
            RequestBody::Stream { stream, .. } => collect_stream(stream).await,
        }
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            RequestBody::Stream { length, .. } => f
                .debug_struct("Stream")
                .field("length", length)
                .finish(),
        }
    }
}

/// 一次 HTTP 请求
#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// 添加请求头；非法的名称或取值会被忽略
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn json<T: serde::Serialize>(self, value: &T) -> Result<Self, BlobError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| BlobError::InvalidArgument(format!("请求体序列化失败: {}", e)))?;
        Ok(self
            .header("content-type", "application/json; charset=UTF-8")
            .body(RequestBody::Bytes(Bytes::from(body))))
    }
}

/// 一次 HTTP 响应，响应体以流的形式按需读取
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            status,
            headers: HeaderMap::new(),
            body: stream::once(async move { Ok(body) }).boxed(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub async fn bytes(self) -> Result<Bytes, BlobError> {
        collect_stream(self.body).await
    }

    pub async fn json<T: DeserializeOwned>(self) -> Result<T, BlobError> {
        let body = self.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish()
    }
}

async fn collect_stream(stream: ByteStream) -> Result<Bytes, BlobError> {
    let buffer = stream
        .try_fold(BytesMut::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await?;
    Ok(buffer.freeze())
}

/// 传输层接口
///
/// 负责把请求送达存储服务并取回响应（包括鉴权、超时、连接复用），
/// 不解释业务语义：非 2xx 状态也作为正常的 `HttpResponse` 返回。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BlobError>;
}
