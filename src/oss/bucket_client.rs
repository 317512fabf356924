use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use garde::Validate;
use http::{HeaderValue, Method};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

use crate::cfg::{create_trait_from_type_options, TypeOptions};
use crate::oss::digest::{SourceTap, VerifyMd5};
use crate::oss::json_api::{self, JsonApi, ListResponse, Multipart, DEFAULT_ENDPOINT};
use crate::oss::{
    register_transports, BlobError, BlobObject, ByteStream, CopyDestination, HttpRequest, ListQuery,
    ListResult, MetadataUpdate, PageToken, ReadStream, Transport, Validation, WriteOptions,
    WriteSource,
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// BlobBucketClient 配置
///
/// ```json5
/// {
///     bucket: "my-bucket",
///     endpoint: "http://localhost:4443",
///     transport: {
///         type: "TracingTransport",
///         options: { transport: { type: "ReqwestTransport", options: { bearer_token_env: "GCS_TOKEN" } } }
///     }
/// }
/// ```
#[derive(Debug, Deserialize, Serialize, SmartDefault, Clone, Validate)]
#[serde(default)]
pub struct BlobBucketClientConfig {
    /// 存储桶名称
    #[garde(length(min = 1))]
    #[default = ""]
    pub bucket: String,

    /// 服务地址，可指向本地模拟器或私有部署
    #[garde(length(min = 1))]
    #[default(DEFAULT_ENDPOINT.to_string())]
    pub endpoint: String,

    #[garde(skip)]
    #[default(TypeOptions::of("ReqwestTransport"))]
    pub transport: TypeOptions,

    /// 写入后的默认校验方式
    #[garde(skip)]
    pub validation: Validation,
}

/// 单个存储桶的客户端
///
/// 只持有不可变状态和共享的 Transport，可以在多个任务间并发使用；
/// 每次调用的中间状态（摘要、计数）都在调用内部。
pub struct BlobBucketClient {
    api: JsonApi,
    transport: Arc<dyn Transport>,
    validation: Validation,
}

impl BlobBucketClient {
    pub fn new(config: BlobBucketClientConfig) -> Result<Self, BlobError> {
        if let Err(errors) = config.validate() {
            return Err(BlobError::Configuration(format!("{}", errors)));
        }

        register_transports();
        let transport = create_trait_from_type_options::<dyn Transport>(&config.transport)
            .map_err(|e| BlobError::Configuration(format!("{:#}", e)))?;

        Ok(Self {
            api: JsonApi::new(&config.endpoint, &config.bucket),
            transport: Arc::from(transport),
            validation: config.validation,
        })
    }

    /// 使用已有的 Transport 创建客户端
    pub fn with_transport(
        bucket: impl AsRef<str>,
        endpoint: impl AsRef<str>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            api: JsonApi::new(endpoint.as_ref(), bucket.as_ref()),
            transport,
            validation: Validation::default(),
        }
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn bucket(&self) -> &str {
        self.api.bucket()
    }

    pub fn endpoint(&self) -> &str {
        self.api.endpoint()
    }

    /// 写入对象，已存在的同名对象会被覆盖
    ///
    /// 数据以一次 multipart 请求整体上传，服务端要么得到完整对象，要么什么都不保留。
    /// 上传过程中计算内容的 MD5：校验方式为 `Md5` 时与服务端返回的 `md5Hash` 比对，
    /// 不一致则删除刚写入的对象并返回 `ChecksumMismatch`。
    pub async fn write(
        &self,
        name: &str,
        source: WriteSource,
        options: WriteOptions,
    ) -> Result<BlobObject, BlobError> {
        check_name(name)?;
        let start = Instant::now();

        let content_type = options
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        // 内容类型会写进 multipart 的分段头
        if HeaderValue::from_str(&content_type).is_err() {
            return Err(BlobError::InvalidArgument(format!(
                "无效的内容类型: {:?}",
                content_type
            )));
        }

        let (media, length) = source.open().await?;

        let mut resource = serde_json::json!({
            "name": name,
            "contentType": content_type,
        });
        if let Some(metadata) = &options.metadata {
            resource["metadata"] = serde_json::to_value(metadata)
                .map_err(|e| BlobError::InvalidArgument(format!("元数据序列化失败: {}", e)))?;
        }

        let multipart = Multipart::new(&resource, &content_type)?;
        let tap = SourceTap::default();
        let request = HttpRequest::new(Method::POST, self.api.upload_url())
            .header("content-type", &multipart.content_type())
            .body(multipart.wrap(tap.observe(media), length));

        let result = match self.transport.send(request).await {
            Ok(response) => json_api::check_status(response, name).await,
            Err(err) => Err(err),
        };

        // 数据源出错时传输层返回的错误不一定能说明原因，以数据源的失败为准
        if let Some(failure) = tap.take_failure() {
            if result.is_ok() {
                self.discard(name).await;
            }
            return Err(failure);
        }

        let mut object: BlobObject = result?.json().await?;
        let (size, local_md5) = tap.finish();

        let validation = options.validation.unwrap_or(self.validation);
        match object.md5_hash.clone() {
            Some(remote) if validation == Validation::Md5 && remote != local_md5 => {
                self.discard(name).await;
                return Err(BlobError::ChecksumMismatch {
                    name: name.to_string(),
                    expected: local_md5,
                    actual: remote,
                });
            }
            Some(_) => {}
            None => object.md5_hash = Some(local_md5),
        }

        info!(
            bucket = self.bucket(),
            name,
            size,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "object written"
        );
        Ok(object)
    }

    // 写入校验失败后的清理，失败只记录日志
    async fn discard(&self, name: &str) {
        if let Err(err) = self.remove(name).await {
            warn!(bucket = self.bucket(), name, error = %err, "failed to discard object");
        }
    }

    /// 打开对象的读取流，首次 poll 时才发起请求
    pub fn create_read_stream(&self, name: &str) -> ReadStream {
        let transport = self.transport.clone();
        let url = self.api.media_url(name);
        let name = name.to_string();

        ReadStream::new(open_read(transport, url, name))
    }

    /// 读取对象并写入 `writer`，返回字节数
    pub async fn read_to<W>(&self, name: &str, writer: &mut W) -> Result<u64, BlobError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.create_read_stream(name).pipe_to(writer).await
    }

    /// 下载对象到本地文件
    ///
    /// 自动创建父目录；`overwrite` 为 false 时不覆盖已存在的文件。
    /// 内容先写入同目录下的 `.partial` 临时文件，完整下载后再改名，
    /// 失败时原有文件保持不变。
    pub async fn download_to_file(
        &self,
        name: &str,
        path: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<u64, BlobError> {
        let path = path.as_ref();
        let file_name = path.file_name().ok_or_else(|| {
            BlobError::InvalidArgument(format!("无效的文件路径: {}", path.display()))
        })?;
        if !overwrite && tokio::fs::metadata(path).await.is_ok() {
            return Err(BlobError::InvalidArgument(format!(
                "文件已存在: {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::from_stream(e, "创建目录失败"))?;
        }

        let mut partial_name = file_name.to_os_string();
        partial_name.push(".partial");
        let partial = path.with_file_name(partial_name);

        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|e| BlobError::from_stream(e, "创建文件失败"))?;
        let result = self.read_to(name, &mut file).await;
        drop(file);

        match result {
            Ok(size) => {
                if let Err(e) = tokio::fs::rename(&partial, path).await {
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(BlobError::from_stream(e, "重命名文件失败"));
                }
                debug!(name, path = %path.display(), size, "object downloaded");
                Ok(size)
            }
            Err(err) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(err)
            }
        }
    }

    /// 获取对象元数据，不读取内容
    pub async fn stat(&self, name: &str) -> Result<BlobObject, BlobError> {
        check_name(name)?;
        let response = self
            .transport
            .send(HttpRequest::new(Method::GET, self.api.object_url(name)))
            .await?;
        json_api::check_status(response, name).await?.json().await
    }

    pub async fn exists(&self, name: &str) -> Result<bool, BlobError> {
        match self.stat(name).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// 修改对象的内容类型与自定义元数据
    pub async fn set_metadata(
        &self,
        name: &str,
        update: MetadataUpdate,
    ) -> Result<BlobObject, BlobError> {
        check_name(name)?;
        let request =
            HttpRequest::new(Method::PATCH, self.api.object_url(name)).json(&update)?;
        let response = self.transport.send(request).await?;
        json_api::check_status(response, name).await?.json().await
    }

    /// 服务端复制，不重新上传内容，源对象保留
    pub async fn copy(
        &self,
        source: &str,
        destination: impl Into<CopyDestination>,
    ) -> Result<BlobObject, BlobError> {
        let destination = destination.into();
        check_name(source)?;
        check_name(&destination.name)?;

        let bucket = destination.bucket.as_deref().unwrap_or(self.bucket());
        let request = HttpRequest::new(
            Method::POST,
            self.api.copy_url(source, bucket, &destination.name),
        )
        .json(&serde_json::json!({}))?;

        let response = self.transport.send(request).await?;
        let object: BlobObject = json_api::check_status(response, source).await?.json().await?;

        debug!(
            source_bucket = self.bucket(),
            source,
            bucket,
            name = destination.name.as_str(),
            "object copied"
        );
        Ok(object)
    }

    /// 删除对象，对象不存在时返回 `NotFound`
    pub async fn remove(&self, name: &str) -> Result<(), BlobError> {
        check_name(name)?;
        let response = self
            .transport
            .send(HttpRequest::new(Method::DELETE, self.api.object_url(name)))
            .await?;
        json_api::check_status(response, name).await?;

        debug!(bucket = self.bucket(), name, "object removed");
        Ok(())
    }

    /// 列举一页对象
    ///
    /// 结果中的 `next_query` 为继续列举的请求，`None` 表示已经列举完毕。
    pub async fn list(&self, query: ListQuery) -> Result<ListResult, BlobError> {
        if query.max_results == Some(0) {
            return Err(BlobError::InvalidArgument(
                "max_results 必须为正数".to_string(),
            ));
        }

        let response = self
            .transport
            .send(HttpRequest::new(Method::GET, self.api.list_url(&query)))
            .await?;
        let page: ListResponse = json_api::check_status(response, self.bucket())
            .await?
            .json()
            .await?;

        let next_query = page
            .next_page_token
            .filter(|token| !token.is_empty())
            .map(|token| ListQuery {
                page_token: Some(PageToken::new(token)),
                ..query
            });

        Ok(ListResult {
            objects: page.items,
            prefixes: page.prefixes,
            next_query,
        })
    }

    /// 逐页列举直到结束，依次产出每个对象；遇到第一个错误即停止
    pub fn list_all(&self, query: ListQuery) -> BoxStream<'_, Result<BlobObject, BlobError>> {
        stream::try_unfold(Some(query), move |next| async move {
            let query = match next {
                Some(query) => query,
                None => return Ok::<_, BlobError>(None),
            };
            let page = self.list(query).await?;
            let objects = stream::iter(page.objects.into_iter().map(Ok::<_, BlobError>));
            Ok(Some((objects, page.next_query)))
        })
        .try_flatten()
        .boxed()
    }
}

async fn open_read(
    transport: Arc<dyn Transport>,
    url: String,
    name: String,
) -> Result<ByteStream, BlobError> {
    check_name(&name)?;
    let response = transport.send(HttpRequest::new(Method::GET, url)).await?;
    let response = json_api::check_status(response, &name).await?;

    let expected = json_api::expected_md5(&response.headers);
    debug!(name = name.as_str(), verify = expected.is_some(), "read stream opened");

    Ok(match expected {
        Some(expected) => VerifyMd5::new(response.body, name, expected).boxed(),
        None => response.body,
    })
}

fn check_name(name: &str) -> Result<(), BlobError> {
    if name.is_empty() {
        return Err(BlobError::InvalidArgument("对象名称不能为空".to_string()));
    }
    Ok(())
}
