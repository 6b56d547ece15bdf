//! Transfer service: List, Upload and Download on top of [`Storage`]

use futures::{Stream, StreamExt};
use tokio::fs::File;

use super::download::{frames, DownloadStream};
use super::types::{UploadMessage, UploadReceipt};
use super::upload::Upload;
use crate::error::{Result, TransferError};
use crate::storage::{FileRecord, Storage};

#[derive(Debug, Clone)]
pub struct TransferService {
    storage: Storage,
}

impl TransferService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Every file currently visible in storage, unordered.
    pub async fn list(&self) -> Result<Vec<FileRecord>> {
        let records = self.storage.list_all().await?;
        tracing::debug!(count = records.len(), "Listed files");
        Ok(records)
    }

    /// Begin an upload driven message by message by the transport.
    pub fn start_upload(&self) -> Upload {
        Upload::new(self.storage.clone())
    }

    /// Run a complete upload from a message stream.
    ///
    /// A stream error is treated as a transport failure and aborts the upload.
    pub async fn upload<S>(&self, messages: S) -> Result<UploadReceipt>
    where
        S: Stream<Item = Result<UploadMessage>>,
    {
        let mut upload = self.start_upload();
        futures::pin_mut!(messages);

        while let Some(message) = messages.next().await {
            match message {
                Ok(message) => upload.accept(message).await?,
                Err(e) => return Err(upload.fail(e).await),
            }
        }

        upload.finish().await
    }

    /// Open the file stored under `id` and return its frames.
    ///
    /// Validation, lookup and open failures are reported here, before any frame.
    pub async fn download(&self, id: &str) -> Result<DownloadStream> {
        if id.is_empty() {
            return Err(TransferError::validation("file id must not be empty"));
        }

        let entry = self.storage.resolve_by_id(id).await?;
        let file = File::open(&entry.path).await?;

        tracing::info!(file_id = %entry.id, file_name = %entry.name, "Download started");

        Ok(frames(entry.id, entry.name, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{DownloadFrame, CHUNK_SIZE};
    use bytes::Bytes;
    use futures::stream;
    use std::collections::HashSet;
    use tempfile::TempDir;

    async fn service() -> (TempDir, TransferService) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).await.unwrap();
        (temp_dir, TransferService::new(storage))
    }

    fn messages(name: &str, content: &[u8], chunk_size: usize) -> Vec<Result<UploadMessage>> {
        let mut messages = vec![Ok(UploadMessage::Filename(name.to_string()))];
        for chunk in content.chunks(chunk_size) {
            messages.push(Ok(UploadMessage::Chunk(Bytes::copy_from_slice(chunk))));
        }
        messages
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn collect(stream: DownloadStream) -> (String, Vec<Bytes>) {
        let frames: Vec<DownloadFrame> = stream
            .map(|frame| frame.unwrap())
            .collect()
            .await;

        let mut frames = frames.into_iter();
        let name = match frames.next() {
            Some(DownloadFrame::Info { name }) => name,
            other => panic!("expected info frame first, got {other:?}"),
        };
        let chunks = frames
            .map(|frame| match frame {
                DownloadFrame::Chunk(chunk) => chunk,
                DownloadFrame::Info { .. } => panic!("info frame after the first"),
            })
            .collect();
        (name, chunks)
    }

    #[tokio::test]
    async fn test_round_trip_chunk_boundaries() {
        let (_dir, service) = service().await;

        let cases = [
            (0, 0),
            (1, 1),
            (CHUNK_SIZE - 1, 1),
            (CHUNK_SIZE, 1),
            (CHUNK_SIZE + 1, 2),
            (3 * CHUNK_SIZE + 17, 4),
        ];

        for (len, expected_chunks) in cases {
            let content = pattern(len);
            let receipt = service
                .upload(stream::iter(messages("a.txt", &content, 4096)))
                .await
                .unwrap();
            assert_eq!(receipt.size, len as u64);

            let download = service.download(&receipt.id.to_string()).await.unwrap();
            let (name, chunks) = collect(download).await;

            assert_eq!(name, "a.txt");
            assert_eq!(chunks.len(), expected_chunks, "content length {len}");
            assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= CHUNK_SIZE));
            assert_eq!(chunks.concat(), content);
        }
    }

    #[tokio::test]
    async fn test_list_reflects_uploads() {
        let (_dir, service) = service().await;
        assert!(service.list().await.unwrap().is_empty());

        let mut ids = HashSet::new();
        for i in 0..5 {
            let receipt = service
                .upload(stream::iter(messages(&format!("file_{i}.txt"), b"abc", 2)))
                .await
                .unwrap();
            ids.insert(receipt.id);
        }

        let first = service.list().await.unwrap();
        let listed: HashSet<_> = first.iter().map(|r| r.id).collect();
        assert_eq!(listed, ids);

        let second = service.list().await.unwrap();
        let as_set = |records: &[FileRecord]| {
            records
                .iter()
                .map(|r| (r.id, r.name.clone(), r.size, r.modified_at))
                .collect::<HashSet<_>>()
        };
        assert_eq!(as_set(&first), as_set(&second));
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_no_trace() {
        let (_dir, service) = service().await;

        let stream = stream::iter(vec![
            Ok(UploadMessage::Filename("doomed.bin".to_string())),
            Ok(UploadMessage::Chunk(Bytes::from_static(b"first"))),
            Err(TransferError::from(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))),
            Ok(UploadMessage::Chunk(Bytes::from_static(b"never"))),
        ]);

        let err = service.upload(stream).await.unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let (_dir, service) = service().await;

        let err = service
            .upload(stream::iter(messages("", b"data", 4)))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Validation(_)));

        let err = service
            .upload(stream::iter(vec![Ok::<_, TransferError>(UploadMessage::Chunk(
                Bytes::from_static(b"x"),
            ))]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Validation(_)));

        let err = service
            .upload(stream::iter(Vec::<Result<UploadMessage>>::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Validation(_)));

        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_errors() {
        let (_dir, service) = service().await;

        assert!(matches!(
            service.download("").await,
            Err(TransferError::Validation(_))
        ));
        assert!(matches!(
            service.download(&uuid::Uuid::new_v4().to_string()).await,
            Err(TransferError::NotFound(_))
        ));
        assert!(matches!(
            service.download("../../etc/passwd").await,
            Err(TransferError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_download_keeps_name_with_separator() {
        let (_dir, service) = service().await;

        let receipt = service
            .upload(stream::iter(messages("quarterly_report_v2.pdf", b"%PDF", 4)))
            .await
            .unwrap();

        let download = service.download(&receipt.id.to_string()).await.unwrap();
        let (name, chunks) = collect(download).await;
        assert_eq!(name, "quarterly_report_v2.pdf");
        assert_eq!(chunks.concat(), b"%PDF");
    }
}
