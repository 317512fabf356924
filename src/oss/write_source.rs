use bytes::Bytes;
use futures::future;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::PathBuf;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::oss::{BlobError, ByteStream};

// 文件与读取流按块送入上传请求
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// 写入的数据来源
///
/// 文件和流按块读取，不会整体载入内存。
pub enum WriteSource {
    File(PathBuf),
    Buffer(Bytes),
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl WriteSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        WriteSource::File(path.into())
    }

    pub fn buffer(data: impl Into<Bytes>) -> Self {
        WriteSource::Buffer(data.into())
    }

    pub fn stream(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        WriteSource::Stream(Box::new(reader))
    }

    /// 打开数据源，返回字节流和已知的长度
    pub(crate) async fn open(self) -> Result<(ByteStream, Option<u64>), BlobError> {
        match self {
            WriteSource::Buffer(data) => {
                let length = data.len() as u64;
                Ok((stream::once(future::ready(Ok(data))).boxed(), Some(length)))
            }
            WriteSource::File(path) => {
                let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
                    BlobError::InvalidArgument(format!("无法访问文件 {}: {}", path.display(), e))
                })?;
                if !metadata.is_file() {
                    return Err(BlobError::InvalidArgument(format!(
                        "{} 不是普通文件",
                        path.display()
                    )));
                }
                let file = tokio::fs::File::open(&path).await.map_err(|e| {
                    BlobError::InvalidArgument(format!("无法打开文件 {}: {}", path.display(), e))
                })?;
                let stream = ReaderStream::with_capacity(file, READ_CHUNK_SIZE)
                    .map_err(|e| BlobError::from_stream(e, "读取文件失败"))
                    .boxed();
                Ok((stream, Some(metadata.len())))
            }
            WriteSource::Stream(reader) => {
                let stream = ReaderStream::with_capacity(reader, READ_CHUNK_SIZE)
                    .map_err(|e| BlobError::from_stream(e, "读取数据流失败"))
                    .boxed();
                Ok((stream, None))
            }
        }
    }
}

impl std::fmt::Debug for WriteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteSource::File(path) => f.debug_tuple("File").field(path).finish(),
            WriteSource::Buffer(data) => write!(f, "Buffer({} bytes)", data.len()),
            WriteSource::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<Bytes> for WriteSource {
    fn from(data: Bytes) -> Self {
        WriteSource::Buffer(data)
    }
}

impl From<Vec<u8>> for WriteSource {
    fn from(data: Vec<u8>) -> Self {
        WriteSource::Buffer(Bytes::from(data))
    }
}

impl From<PathBuf> for WriteSource {
    fn from(path: PathBuf) -> Self {
        WriteSource::File(path)
    }
}
