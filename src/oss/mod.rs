mod auth;
mod blob_types;
mod bucket_client;
mod digest;
mod error;
mod json_api;
mod read_stream;
mod reqwest_transport;
mod tracing_transport;
mod transport;
mod write_source;

pub use auth::{Anonymous, AuthProvider, BearerTokenAuth};
pub use blob_types::{
    BlobObject, CopyDestination, ListQuery, ListResult, MetadataUpdate, PageToken, Validation,
    WriteOptions,
};
pub use bucket_client::{BlobBucketClient, BlobBucketClientConfig};
pub use digest::md5_base64;
pub use error::BlobError;
pub use json_api::DEFAULT_ENDPOINT;
pub use read_stream::ReadStream;
pub use reqwest_transport::{ReqwestTransport, ReqwestTransportConfig};
pub use tracing_transport::{TracingTransport, TracingTransportConfig};
pub use transport::{ByteStream, HttpRequest, HttpResponse, RequestBody, Transport};
pub use write_source::WriteSource;

use std::sync::Once;
use tracing::warn;

use crate::cfg::register_trait;

static REGISTER_TRANSPORTS: Once = Once::new();

/// 注册所有内置的 Transport 实现
///
/// 注册后可以通过 `TypeOptions` 按名称创建 Transport，重复调用只生效一次。
///
/// # 示例
///
/// ```rust
/// use blobx::cfg::{create_trait_from_type_options, TypeOptions};
/// use blobx::oss::{register_transports, Transport};
///
/// register_transports();
/// let transport = create_trait_from_type_options::<dyn Transport>(
///     &TypeOptions::of("ReqwestTransport"),
/// ).unwrap();
/// ```
pub fn register_transports() {
    REGISTER_TRANSPORTS.call_once(|| {
        if let Err(e) = register_trait::<ReqwestTransport, dyn Transport, ReqwestTransportConfig>(
            "ReqwestTransport",
        ) {
            warn!(error = %e, "failed to register ReqwestTransport");
        }

        if let Err(e) = register_trait::<TracingTransport, dyn Transport, TracingTransportConfig>(
            "TracingTransport",
        ) {
            warn!(error = %e, "failed to register TracingTransport");
        }
    });
}
