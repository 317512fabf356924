use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::StreamReader;

use crate::oss::{BlobError, ByteStream};

/// 对象内容的读取流
///
/// 惰性：首次 poll 时才发起请求。只能顺序读取一遍，正常结束即表示读取完成，
/// 对象不存在或传输失败以错误项的形式出现。提前 drop 会释放底层连接。
pub struct ReadStream {
    inner: ByteStream,
}

impl ReadStream {
    pub(crate) fn new<F>(open: F) -> Self
    where
        F: Future<Output = Result<ByteStream, BlobError>> + Send + 'static,
    {
        Self {
            inner: stream::once(open).try_flatten().boxed(),
        }
    }

    /// 按块写入 `writer`，返回写入的字节数
    pub async fn pipe_to<W>(mut self, writer: &mut W) -> Result<u64, BlobError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut written = 0u64;
        while let Some(chunk) = self.inner.next().await {
            let chunk = chunk?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| BlobError::from_stream(e, "写入目标失败"))?;
            written += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| BlobError::from_stream(e, "写入目标失败"))?;
        Ok(written)
    }

    /// 转换为 `AsyncRead`，错误以 `std::io::Error` 传出
    pub fn into_async_read(self) -> impl AsyncRead + Send + Unpin {
        StreamReader::new(
            self.inner
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        )
    }

    /// 读取全部内容到内存
    pub async fn bytes(self) -> Result<Bytes, BlobError> {
        let chunks: Vec<Bytes> = self.inner.try_collect().await?;
        Ok(Bytes::from(chunks.concat()))
    }
}

impl Stream for ReadStream {
    type Item = Result<Bytes, BlobError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ReadStream")
    }
}
