//! Pull-driven chunk reader backing the streaming response body.

use std::{
    io::{self, SeekFrom},
    path::Path,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use thiserror::Error;
use tokio::{fs::File, io::AsyncSeekExt};
use tokio_util::io::poll_read_buf;
use tracing::{debug, warn};

use crate::range::ByteRange;

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum ChunkError {
    /// The file ended before the committed range was read, e.g. it was
    /// truncated or replaced while streaming.
    #[error("file ended at offset {offset} with {missing} bytes of the range unread")]
    TruncatedRead { offset: u64, missing: u64 },
    #[error("reading media file: {0}")]
    Io(#[from] io::Error),
}

/// Finite, forward-only sequence of chunks covering one [`ByteRange`].
///
/// Every chunk is `min(chunk_size, remaining)` bytes long. Nothing is read
/// until the consumer polls, so a slow client stalls the reader instead of
/// filling memory. The file handle is dropped as soon as the range is
/// exhausted or an error is yielded, and dropping the stream early (client
/// gone, seek superseded the request) closes it as well.
#[derive(Debug)]
pub struct ChunkStream {
    file: Option<File>,
    buf: BytesMut,
    chunk_size: usize,
    offset: u64,
    remaining: u64,
}

impl ChunkStream {
    /// Opens `path` read-only and positions it at the start of `range`.
    ///
    /// Each stream owns its own handle, so any number of readers can share a
    /// file without coordinating seek positions.
    pub async fn open(path: &Path, range: ByteRange, chunk_size: usize) -> io::Result<Self> {
        let chunk_size = chunk_size.max(1);
        let mut file = File::open(path).await?;
        file.seek(SeekFrom::Start(range.start())).await?;
        debug!(
            path = %path.display(),
            start = range.start(),
            end = range.end(),
            "opened chunk stream"
        );
        Ok(Self {
            file: Some(file),
            buf: BytesMut::with_capacity(chunk_size),
            chunk_size,
            offset: range.start(),
            remaining: range.length(),
        })
    }

    /// Bytes of the range not yet handed to the consumer.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn close(&mut self) {
        self.file = None;
        self.buf = BytesMut::new();
    }
}

impl Stream for ChunkStream {
    type Item = Result<Bytes, ChunkError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.remaining == 0 {
            this.close();
            return Poll::Ready(None);
        }
        let Some(file) = this.file.as_mut() else {
            return Poll::Ready(None);
        };

        let want = this.chunk_size.min(usize::try_from(this.remaining).unwrap_or(usize::MAX));

        // Short reads are accumulated across polls until the chunk is full.
        while this.buf.len() < want {
            let missing = want - this.buf.len();
            this.buf.reserve(missing);
            let mut limited = (&mut this.buf).limit(missing);
            match poll_read_buf(Pin::new(&mut *file), cx, &mut limited) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(0)) => {
                    let offset = this.offset + this.buf.len() as u64;
                    let missing = this.remaining - this.buf.len() as u64;
                    warn!(offset, missing, "media file ended before the requested range");
                    this.close();
                    return Poll::Ready(Some(Err(ChunkError::TruncatedRead { offset, missing })));
                }
                Poll::Ready(Ok(_)) => {}
                Poll::Ready(Err(err)) => {
                    warn!(offset = this.offset, error = %err, "aborting media stream");
                    this.close();
                    return Poll::Ready(Some(Err(ChunkError::Io(err))));
                }
            }
        }

        let chunk = this.buf.split_to(want).freeze();
        this.offset += want as u64;
        this.remaining -= want as u64;
        if this.remaining == 0 {
            this.close();
        }

        Poll::Ready(Some(Ok(chunk)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.file.is_none() {
            return (0, Some(0));
        }
        let chunks = self.remaining.div_ceil(self.chunk_size as u64);
        let chunks = usize::try_from(chunks).unwrap_or(usize::MAX);
        (chunks, Some(chunks))
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        if self.file.is_some() && self.remaining > 0 {
            debug!(
                offset = self.offset,
                remaining = self.remaining,
                "chunk stream abandoned by consumer"
            );
        }
    }
}
