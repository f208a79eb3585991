//! Transfer Engine
//!
//! One engine drives every provider: the adapters contribute wire calls
//! only, never transfer logic. See the crate docs for the cancellation and
//! cleanup semantics.

use crate::error::{Result, TransferError};
use crate::progress::ProgressSink;
use bridge_traits::storage::{RemoteEntry, StorageAdapter, UploadDestination};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Bookkeeping for one resumable upload.
///
/// `bytes_committed` is the sum of all appended (non-final) chunk lengths;
/// it is the cursor every append and the finish call carry. Sessions are
/// never persisted — cancellation or error destroys them, and they are not
/// resumed across process restarts.
struct TransferSession {
    session_id: String,
    bytes_committed: u64,
    total_size: u64,
}

/// Chunked, cancellable transfers over a [`StorageAdapter`].
pub struct TransferEngine;

impl TransferEngine {
    pub fn new() -> Self {
        Self
    }

    /// Download a remote file into `sink`.
    ///
    /// Reads the provider stream in chunks of the adapter's chunk size.
    /// Short reads are written fully before the next read. After every
    /// chunk the cancellation token is polled; a requested cancel stops
    /// immediately with [`TransferError::Cancelled`] and leaves the bytes
    /// already written in the sink (no rollback). One progress event per
    /// chunk carries that chunk's byte count. A zero-byte read ends the
    /// download.
    ///
    /// Returns the total number of bytes written.
    #[instrument(skip(self, adapter, sink, progress, cancel), fields(file_id = %file_id))]
    pub async fn download<W>(
        &self,
        adapter: &dyn StorageAdapter,
        file_id: &str,
        sink: &mut W,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut stream = adapter.download_stream(file_id).await?;
        let chunk_size = adapter.chunk_size();
        let mut buffer = vec![0u8; chunk_size];
        let mut total: u64 = 0;

        info!(chunk_size = chunk_size, "Download started");

        loop {
            if cancel.is_cancelled() {
                // Bytes already written stay in place
                info!(bytes_written = total, "Download cancelled");
                return Err(TransferError::Cancelled);
            }

            let read = stream.read(&mut buffer).await?;
            if read == 0 {
                break;
            }

            sink.write_all(&buffer[..read]).await?;
            total += read as u64;
            debug!(bytes = read, "Downloaded chunk");
            progress.on_chunk(read as u64);
        }

        sink.flush().await?;
        info!(bytes_written = total, "Download finished");
        Ok(total)
    }

    /// Upload `total_size` bytes from `reader` to `dest`.
    ///
    /// A payload of at most one chunk goes up in a single call with a
    /// single progress event of the full size and no mid-call cancellation
    /// point. Anything larger drives the resumable session protocol:
    /// Start carries the first chunk, Append each following non-final
    /// chunk at the committed-byte cursor, and Finish carries the final
    /// chunk plus the destination metadata in one round trip — the final
    /// chunk is never sent through Append.
    ///
    /// Cancellation is polled once per chunk between appends; a cancelled
    /// session is abandoned without an abort call.
    ///
    /// `bytes_committed + len(final_chunk) == total_size` must hold exactly
    /// at finish time; a reader that runs short or long against
    /// `total_size` is a [`TransferError::SizeMismatch`] defect, not a
    /// recoverable condition.
    #[instrument(
        skip(self, adapter, reader, progress, cancel),
        fields(file_name = %dest.file_name, total_size = total_size)
    )]
    pub async fn upload<R>(
        &self,
        adapter: &dyn StorageAdapter,
        reader: &mut R,
        total_size: u64,
        dest: &UploadDestination,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RemoteEntry>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let chunk_size = adapter.chunk_size();

        if total_size <= chunk_size as u64 {
            return self
                .upload_single_shot(adapter, reader, total_size, dest, progress)
                .await;
        }

        // Resumable protocol. The first chunk opens the session.
        let first_chunk = read_up_to(reader, chunk_size).await?;
        if (first_chunk.len() as u64) < chunk_size as u64 {
            return Err(TransferError::SizeMismatch {
                expected: total_size,
                actual: first_chunk.len() as u64,
            });
        }

        let first_len = first_chunk.len() as u64;
        let session_id = adapter.session_start(dest, total_size, first_chunk).await?;
        progress.on_chunk(first_len);

        let mut session = TransferSession {
            session_id,
            bytes_committed: first_len,
            total_size,
        };
        info!(session_id = %session.session_id, "Upload session started");

        let final_chunk = loop {
            if cancel.is_cancelled() {
                // The remote session is abandoned, not aborted
                info!(
                    session_id = %session.session_id,
                    bytes_committed = session.bytes_committed,
                    "Upload cancelled"
                );
                return Err(TransferError::Cancelled);
            }

            let chunk = read_up_to(reader, chunk_size).await?;
            if chunk.is_empty() {
                // Reader ran dry before reaching total_size
                return Err(TransferError::SizeMismatch {
                    expected: session.total_size,
                    actual: session.bytes_committed,
                });
            }

            if session.bytes_committed + chunk.len() as u64 >= session.total_size {
                // The last bytes always travel with the finish call
                break chunk;
            }

            let chunk_len = chunk.len() as u64;
            adapter
                .session_append(&session.session_id, session.bytes_committed, chunk)
                .await?;
            progress.on_chunk(chunk_len);
            session.bytes_committed += chunk_len;
            debug!(
                bytes_committed = session.bytes_committed,
                "Upload chunk appended"
            );
        };

        let final_len = final_chunk.len() as u64;
        if session.bytes_committed + final_len != session.total_size {
            return Err(TransferError::SizeMismatch {
                expected: session.total_size,
                actual: session.bytes_committed + final_len,
            });
        }

        let entry = adapter
            .session_finish(
                &session.session_id,
                session.bytes_committed,
                final_chunk,
                dest,
            )
            .await?;
        progress.on_chunk(final_len);

        info!(file_id = %entry.id, "Upload session finished");
        Ok(entry)
    }

    async fn upload_single_shot<R>(
        &self,
        adapter: &dyn StorageAdapter,
        reader: &mut R,
        total_size: u64,
        dest: &UploadDestination,
        progress: &dyn ProgressSink,
    ) -> Result<RemoteEntry>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let data = read_up_to(reader, total_size as usize).await?;
        if data.len() as u64 != total_size {
            return Err(TransferError::SizeMismatch {
                expected: total_size,
                actual: data.len() as u64,
            });
        }

        let entry = adapter.upload_small(dest, data).await?;
        progress.on_chunk(total_size);

        info!(file_id = %entry.id, "Single-shot upload finished");
        Ok(entry)
    }
}

impl Default for TransferEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Read up to `limit` bytes, tolerating short reads; stops early only at
/// EOF.
async fn read_up_to<R>(reader: &mut R, limit: usize) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; limit];
    let mut filled = 0;
    while filled < limit {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(Bytes::from(buf))
}
