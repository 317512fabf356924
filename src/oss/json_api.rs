// 存储服务 JSON API 的请求地址、multipart 上传体与错误响应解析

use bytes::Bytes;
use futures::future;
use futures::stream::{self, StreamExt};
use http::HeaderMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;

use crate::oss::{BlobError, BlobObject, ByteStream, HttpResponse, ListQuery, RequestBody};

pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// 某个存储桶的请求地址构造器
#[derive(Debug, Clone)]
pub(crate) struct JsonApi {
    endpoint: String,
    bucket: String,
}

impl JsonApi {
    pub fn new(endpoint: &str, bucket: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn objects_url_of(&self, bucket: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o",
            self.endpoint,
            urlencoding::encode(bucket)
        )
    }

    pub fn object_url(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.objects_url_of(&self.bucket),
            urlencoding::encode(name)
        )
    }

    pub fn media_url(&self, name: &str) -> String {
        format!("{}?alt=media", self.object_url(name))
    }

    pub fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=multipart",
            self.endpoint,
            urlencoding::encode(&self.bucket)
        )
    }

    pub fn copy_url(&self, source: &str, bucket: &str, name: &str) -> String {
        format!(
            "{}/copyTo/b/{}/o/{}",
            self.object_url(source),
            urlencoding::encode(bucket),
            urlencoding::encode(name)
        )
    }

    pub fn list_url(&self, query: &ListQuery) -> String {
        let mut params = Vec::new();
        if let Some(max_results) = query.max_results {
            params.push(format!("maxResults={}", max_results));
        }
        if let Some(token) = &query.page_token {
            params.push(format!("pageToken={}", urlencoding::encode(token.as_str())));
        }
        if let Some(prefix) = &query.prefix {
            params.push(format!("prefix={}", urlencoding::encode(prefix)));
        }
        if let Some(delimiter) = &query.delimiter {
            params.push(format!("delimiter={}", urlencoding::encode(delimiter)));
        }

        let url = self.objects_url_of(&self.bucket);
        if params.is_empty() {
            url
        } else {
            format!("{}?{}", url, params.join("&"))
        }
    }
}

/// multipart/related 上传体：JSON 资源在前，对象内容在后
pub(crate) struct Multipart {
    boundary: String,
    preamble: Bytes,
    epilogue: Bytes,
}

impl Multipart {
    pub fn new(resource: &serde_json::Value, media_type: &str) -> Result<Self, BlobError> {
        let boundary: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let resource = serde_json::to_string(resource)
            .map_err(|e| BlobError::InvalidArgument(format!("对象资源序列化失败: {}", e)))?;

        let preamble = format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{r}\r\n--{b}\r\nContent-Type: {m}\r\n\r\n",
            b = boundary,
            r = resource,
            m = media_type,
        );
        let epilogue = format!("\r\n--{}--\r\n", boundary);

        Ok(Self {
            boundary,
            preamble: Bytes::from(preamble),
            epilogue: Bytes::from(epilogue),
        })
    }

    pub fn content_type(&self) -> String {
        format!("multipart/related; boundary={}", self.boundary)
    }

    /// 把对象内容包进 multipart 请求体，内容长度已知时请求体长度也已知
    pub fn wrap(self, media: ByteStream, media_length: Option<u64>) -> RequestBody {
        let length = media_length
            .map(|len| len + self.preamble.len() as u64 + self.epilogue.len() as u64);
        let stream = stream::once(future::ready(Ok(self.preamble)))
            .chain(media)
            .chain(stream::once(future::ready(Ok(self.epilogue))))
            .boxed();
        RequestBody::Stream { stream, length }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ListResponse {
    pub items: Vec<BlobObject>,
    pub prefixes: Vec<String>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// 2xx 原样返回，其余状态读出错误信息并转换为 `BlobError`
///
/// 404 对应 `NotFound`，`name` 为调用方关心的对象（或存储桶）名称。
pub(crate) async fn check_status(
    response: HttpResponse,
    name: &str,
) -> Result<HttpResponse, BlobError> {
    let status = response.status;
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 404 {
        return Err(BlobError::NotFound {
            name: name.to_string(),
        });
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = match serde_json::from_slice::<ErrorBody>(&body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ if !body.is_empty() => String::from_utf8_lossy(&body).into_owned(),
        _ => status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
    };
    Err(BlobError::store(status.as_u16(), message))
}

/// 读取响应需要比对的 md5 摘要
///
/// 以 gzip 存储的对象可能在返回时被解压，摘要对应的是存储的字节，此时不做比对。
pub(crate) fn expected_md5(headers: &HeaderMap) -> Option<String> {
    let stored_encoding = headers
        .get("x-goog-stored-content-encoding")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if stored_encoding.eq_ignore_ascii_case("gzip") {
        return None;
    }
    md5_from_hash_header(
        headers
            .get_all("x-goog-hash")
            .iter()
            .filter_map(|v| v.to_str().ok()),
    )
}

/// 从 `x-goog-hash` 头中取出 md5 摘要，例如 `crc32c=n03x6A==,md5=Ojk9c3dhfxgoKVVHYwFbHQ==`
pub(crate) fn md5_from_hash_header<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    values
        .flat_map(|value| value.split(','))
        .filter_map(|part| part.trim().strip_prefix("md5="))
        .map(str::to_string)
        .next()
}
