//! Download frame emission

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use super::types::{DownloadFrame, CHUNK_SIZE};
use crate::error::Result;

/// Frames of one download: `Info` first, then file chunks
pub type DownloadStream = BoxStream<'static, Result<DownloadFrame>>;

enum Emission {
    Info { name: String, file: File },
    Chunks(File),
    Done,
}

/// Emit the metadata frame followed by the file contents of an opened file.
pub(crate) fn frames(id: Uuid, name: String, file: File) -> DownloadStream {
    stream::unfold(Emission::Info { name, file }, move |state| async move {
        match state {
            Emission::Info { name, file } => {
                Some((Ok(DownloadFrame::Info { name }), Emission::Chunks(file)))
            }
            Emission::Chunks(mut file) => match read_chunk(&mut file).await {
                Ok(Some(chunk)) => Some((Ok(DownloadFrame::Chunk(chunk)), Emission::Chunks(file))),
                Ok(None) => {
                    tracing::debug!(file_id = %id, "Download complete");
                    None
                }
                Err(e) => {
                    tracing::warn!(file_id = %id, error = %e, "Download aborted mid-stream");
                    Some((Err(e.into()), Emission::Done))
                }
            },
            Emission::Done => None,
        }
    })
    .boxed()
}

/// Fill one chunk, short only at end of file; `None` once the file is exhausted.
async fn read_chunk(file: &mut File) -> std::io::Result<Option<Bytes>> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut filled = 0;

    while filled < CHUNK_SIZE {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled == 0 {
        return Ok(None);
    }
    buf.truncate(filled);
    Ok(Some(Bytes::from(buf)))
}
