use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use futures::ready;
use futures::stream::{Stream, StreamExt};
use md5::{Digest, Md5};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use crate::oss::{BlobError, ByteStream};

/// base64 编码的 MD5，与存储服务 `md5Hash` 字段的格式一致
pub fn md5_base64(data: &[u8]) -> String {
    STANDARD.encode(Md5::digest(data))
}

#[derive(Default)]
struct TapState {
    hasher: Md5,
    bytes: u64,
    failure: Option<BlobError>,
}

/// 上传数据源的旁路观察者
///
/// 记录实际发出的字节数与 MD5，以及数据源在中途的失败。
/// 数据源的原始错误留在这里，传输层只收到一个中断标记；
/// 传输层可能把它包装成别的错误，写入结果以这里的记录为准。
#[derive(Clone, Default)]
pub(crate) struct SourceTap {
    state: Arc<Mutex<TapState>>,
}

impl SourceTap {
    pub fn observe(&self, stream: ByteStream) -> ByteStream {
        let tap = self.clone();
        stream
            .map(move |item| {
                let mut state = match tap.state.lock() {
                    Ok(state) => state,
                    Err(_) => return item,
                };
                match item {
                    Ok(chunk) => {
                        state.hasher.update(&chunk);
                        state.bytes += chunk.len() as u64;
                        Ok(chunk)
                    }
                    Err(err) => {
                        state.failure.get_or_insert(err);
                        Err(BlobError::Stream {
                            message: "数据源读取中断".to_string(),
                            source: None,
                        })
                    }
                }
            })
            .boxed()
    }

    /// 取出数据源的原始错误，只能取一次
    pub fn take_failure(&self) -> Option<BlobError> {
        self.state
            .lock()
            .ok()
            .and_then(|mut state| state.failure.take())
    }

    /// 已观察的字节数与 base64 MD5
    pub fn finish(&self) -> (u64, String) {
        match self.state.lock() {
            Ok(mut state) => {
                let digest = std::mem::take(&mut state.hasher).finalize();
                (state.bytes, STANDARD.encode(digest))
            }
            Err(_) => (0, String::new()),
        }
    }
}

/// 读取结束时比对内容 MD5，不一致则以 `ChecksumMismatch` 代替正常结束
pub(crate) struct VerifyMd5 {
    inner: ByteStream,
    name: String,
    expected: String,
    hasher: Option<Md5>,
}

impl VerifyMd5 {
    pub fn new(inner: ByteStream, name: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            inner,
            name: name.into(),
            expected: expected.into(),
            hasher: Some(Md5::new()),
        }
    }
}

impl Stream for VerifyMd5 {
    type Item = Result<Bytes, BlobError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.hasher.is_none() {
            return Poll::Ready(None);
        }

        match ready!(this.inner.poll_next_unpin(cx)) {
            Some(Ok(chunk)) => {
                if let Some(hasher) = this.hasher.as_mut() {
                    hasher.update(&chunk);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(err)) => {
                this.hasher = None;
                Poll::Ready(Some(Err(err)))
            }
            None => {
                let actual = match this.hasher.take() {
                    Some(hasher) => STANDARD.encode(hasher.finalize()),
                    None => return Poll::Ready(None),
                };
                if actual == this.expected {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Err(BlobError::ChecksumMismatch {
                        name: this.name.clone(),
                        expected: this.expected.clone(),
                        actual,
                    })))
                }
            }
        }
    }
}
