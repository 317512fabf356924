//! blobx - 远程对象存储的存储桶客户端
//!
//! 以单个存储桶为单位，支持从文件、内存、读取流写入对象，流式读取，
//! 元数据查询与修改，服务端复制，删除以及基于游标的分页列举。
//!
//! ## 模块
//!
//! - **cfg**: 配置描述（`{type, options}`）、类型注册表、可读的时长格式
//! - **oss**: 存储桶客户端、传输层与鉴权
//!
//! ## 示例
//!
//! ```rust,no_run
//! use blobx::{BlobBucketClient, BlobBucketClientConfig, WriteOptions, WriteSource};
//!
//! # async fn demo() -> Result<(), blobx::BlobError> {
//! let client = BlobBucketClient::new(BlobBucketClientConfig {
//!     bucket: "my-bucket".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let object = client
//!     .write("hello.txt", WriteSource::buffer("Hello World"), WriteOptions::default())
//!     .await?;
//! println!("{} {:?}", object.name, object.md5_hash);
//! # Ok(())
//! # }
//! ```

pub mod cfg;
pub mod oss;

// 重新导出主要的公共 API
pub use cfg::{create_trait_from_type_options, register_trait, TypeOptions};

pub use oss::{
    BlobBucketClient, BlobBucketClientConfig, BlobError, BlobObject, CopyDestination, ListQuery,
    ListResult, MetadataUpdate, PageToken, ReadStream, Validation, WriteOptions, WriteSource,
};
pub use oss::{ReqwestTransport, ReqwestTransportConfig, TracingTransport, TracingTransportConfig};
pub use oss::{register_transports, Transport};
