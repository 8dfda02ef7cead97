use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_test::{assert_err, assert_ok};

use tusk_blob::protocol::{OFFSET_OCTET_STREAM, TUS_RESUMABLE};
use tusk_blob::{
    BlobBackend, BlobError, BlobRef, BlobResult, ChunkAppend, MemoryBackend,
    MemorySessionStore, Metadata, UploadAdapter, UploadConfig, UploadId, UploadState,
};

/// Test factory functions
fn adapter() -> UploadAdapter {
    UploadAdapter::in_memory(UploadConfig::default().with_max_size(1024))
}

fn named(filename: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("filename".to_string(), filename.to_string());
    metadata
}

fn chunk(id: &UploadId, offset: u64, data: &[u8]) -> ChunkAppend {
    ChunkAppend::new(id.clone(), offset, Bytes::copy_from_slice(data))
        .with_protocol_version(TUS_RESUMABLE)
        .with_content_type(OFFSET_OCTET_STREAM)
}

/// Backend whose appends or renames can be made to misbehave
#[derive(Clone, Default)]
struct FaultyBackend {
    inner: MemoryBackend,
    fail_append: Arc<AtomicBool>,
    fail_rename: Arc<AtomicBool>,
    append_delay: Option<Duration>,
}

#[async_trait]
impl BlobBackend for FaultyBackend {
    async fn create_empty(&self, blob: &BlobRef) -> BlobResult<()> {
        self.inner.create_empty(blob).await
    }

    async fn append(&self, blob: &BlobRef, data: Bytes) -> BlobResult<u64> {
        if let Some(delay) = self.append_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("disk on fire").into());
        }
        self.inner.append(blob, data).await
    }

    async fn read_all(&self, blob: &BlobRef) -> BlobResult<Bytes> {
        self.inner.read_all(blob).await
    }

    async fn size(&self, blob: &BlobRef) -> BlobResult<u64> {
        self.inner.size(blob).await
    }

    async fn truncate(&self, blob: &BlobRef, len: u64) -> BlobResult<()> {
        self.inner.truncate(blob, len).await
    }

    async fn rename(&self, src: &BlobRef, dst: &BlobRef) -> BlobResult<()> {
        if self.fail_rename.swap(false, Ordering::SeqCst) {
            return Err(std::io::Error::other("rename refused").into());
        }
        self.inner.rename(src, dst).await
    }

    async fn delete(&self, blob: &BlobRef) -> BlobResult<bool> {
        self.inner.delete(blob).await
    }

    async fn exists(&self, blob: &BlobRef) -> BlobResult<bool> {
        self.inner.exists(blob).await
    }
}

fn faulty_adapter(backend: FaultyBackend, config: UploadConfig) -> UploadAdapter {
    UploadAdapter::new(MemorySessionStore::new(config.max_size), backend, config)
}

/// Valid creates start at offset zero with the requested length
#[tokio::test]
async fn test_create_starts_at_zero() {
    let uploads = adapter();

    for length in [1u64, 10, 1024] {
        let session = uploads.create(length, Metadata::new()).await.unwrap();
        assert_eq!(session.offset, 0);
        assert_eq!(session.declared_length, length);
        assert_eq!(session.state(), UploadState::Created);
        assert!(session.final_ref.is_none());
    }
}

/// Declared length over the maximum creates nothing
#[tokio::test]
async fn test_create_over_max_is_rejected() {
    let uploads = adapter();

    let err = uploads.create(1025, Metadata::new()).await.unwrap_err();

    assert!(matches!(err, BlobError::PayloadTooLarge { .. }));
    assert!(uploads.list().await.unwrap().is_empty());
}

/// declared_length=10, bytes[0:6] then bytes[6:10]
#[tokio::test]
async fn test_two_chunks_complete_and_fetch_in_order() {
    let uploads = adapter();
    let data = b"0123456789";
    let session = uploads.create(10, named("digits.txt")).await.unwrap();

    let first = uploads.append(chunk(&session.id, 0, &data[..6])).await.unwrap();
    assert_eq!(first.offset, 6);
    assert!(!first.is_complete());
    assert_eq!(
        uploads.status(&session.id).await.unwrap().state(),
        UploadState::InProgress
    );

    let second = uploads.append(chunk(&session.id, 6, &data[6..])).await.unwrap();
    assert_eq!(second.offset, 10);
    assert_eq!(second.final_ref, Some(BlobRef::file("digits.txt")));

    let status = uploads.status(&session.id).await.unwrap();
    assert_eq!(status.state(), UploadState::Completed);

    assert_eq!(uploads.read_file("digits.txt").await.unwrap(), Bytes::from_static(data));
    let opened = uploads.fetch("digits.txt").await.unwrap();
    assert_eq!(opened.size_bytes, 10);
}

/// Retrying the same chunk at a stale offset is a conflict
#[tokio::test]
async fn test_stale_offset_conflicts_without_moving() {
    let uploads = adapter();
    let session = uploads.create(10, Metadata::new()).await.unwrap();

    assert_ok!(uploads.append(chunk(&session.id, 0, b"abcdef")).await);
    let err = uploads.append(chunk(&session.id, 0, b"abcdef")).await.unwrap_err();

    assert!(matches!(
        err,
        BlobError::Conflict {
            client_offset: 0,
            server_offset: 6
        }
    ));
    assert_eq!(uploads.status(&session.id).await.unwrap().offset, 6);

    // Ahead of the server is a conflict too
    assert_err!(uploads.append(chunk(&session.id, 8, b"xy")).await);
    assert_eq!(uploads.status(&session.id).await.unwrap().offset, 6);
}

/// Status is stable without an intervening append
#[tokio::test]
async fn test_status_is_idempotent() {
    let uploads = adapter();
    let session = uploads.create(4, Metadata::new()).await.unwrap();
    uploads.append(chunk(&session.id, 0, b"ab")).await.unwrap();

    let a = uploads.status(&session.id).await.unwrap();
    let b = uploads.status(&session.id).await.unwrap();

    assert_eq!(a.offset, b.offset);
    assert_eq!(a.updated_at, b.updated_at);
}

/// Chunks past the declared length are rejected
#[tokio::test]
async fn test_chunk_past_declared_length() {
    let uploads = adapter();
    let session = uploads.create(4, Metadata::new()).await.unwrap();

    let err = uploads.append(chunk(&session.id, 0, b"abcde")).await.unwrap_err();

    assert!(matches!(err, BlobError::PayloadTooLarge { .. }));
    assert_eq!(uploads.status(&session.id).await.unwrap().offset, 0);
}

/// Version and content type are checked before anything is written
#[tokio::test]
async fn test_protocol_headers_are_enforced() {
    let uploads = adapter();
    let session = uploads.create(4, Metadata::new()).await.unwrap();

    let wrong_version = ChunkAppend::new(session.id.clone(), 0, Bytes::from_static(b"ab"))
        .with_protocol_version("0.2.2")
        .with_content_type(OFFSET_OCTET_STREAM);
    assert!(matches!(
        uploads.append(wrong_version).await.unwrap_err(),
        BlobError::PreconditionFailed { .. }
    ));

    let wrong_type = ChunkAppend::new(session.id.clone(), 0, Bytes::from_static(b"ab"))
        .with_protocol_version(TUS_RESUMABLE)
        .with_content_type("application/json");
    assert!(matches!(
        uploads.append(wrong_type).await.unwrap_err(),
        BlobError::UnsupportedMediaType { .. }
    ));

    assert_eq!(uploads.status(&session.id).await.unwrap().offset, 0);
}

/// Same requested filename never overwrites
#[tokio::test]
async fn test_same_filename_gets_distinct_names() {
    let uploads = adapter();

    let a = uploads.create(3, named("report.pdf")).await.unwrap();
    let b = uploads.create(3, named("report.pdf")).await.unwrap();

    let a_done = uploads.append(chunk(&a.id, 0, b"AAA")).await.unwrap();
    let b_done = uploads.append(chunk(&b.id, 0, b"BBB")).await.unwrap();

    assert_eq!(a_done.final_ref, Some(BlobRef::file("report.pdf")));
    assert_eq!(b_done.final_ref, Some(BlobRef::file("report_1.pdf")));
    assert_eq!(uploads.read_file("report.pdf").await.unwrap(), Bytes::from_static(b"AAA"));
    assert_eq!(uploads.read_file("report_1.pdf").await.unwrap(), Bytes::from_static(b"BBB"));
}

/// Unsafe filenames are sanitized before they become public names
#[tokio::test]
async fn test_filename_is_sanitized() {
    let uploads = adapter();
    let session = uploads.create(1, named("../../etc/pass wd")).await.unwrap();

    let done = uploads.append(chunk(&session.id, 0, b"x")).await.unwrap();

    assert_eq!(done.final_ref, Some(BlobRef::file("....etcpass wd")));
}

/// Termination makes status and append report NotFound
#[tokio::test]
async fn test_terminate_removes_session() {
    let uploads = adapter();
    let session = uploads.create(10, Metadata::new()).await.unwrap();
    uploads.append(chunk(&session.id, 0, b"abc")).await.unwrap();

    uploads.terminate(&session.id).await.unwrap();

    assert!(matches!(
        uploads.status(&session.id).await.unwrap_err(),
        BlobError::NotFound { .. }
    ));
    assert!(matches!(
        uploads.append(chunk(&session.id, 3, b"def")).await.unwrap_err(),
        BlobError::NotFound { .. }
    ));
    assert!(matches!(
        uploads.terminate(&session.id).await.unwrap_err(),
        BlobError::NotFound { .. }
    ));
    assert!(!uploads
        .backend()
        .exists(&BlobRef::temp(&session.id))
        .await
        .unwrap());
}

/// Completed uploads accept no more bytes; an empty append is a no-op
#[tokio::test]
async fn test_completed_session_is_immutable() {
    let uploads = adapter();
    let session = uploads.create(2, named("pair.bin")).await.unwrap();
    let done = uploads.append(chunk(&session.id, 0, b"ok")).await.unwrap();

    let err = uploads.append(chunk(&session.id, 2, b"more")).await.unwrap_err();
    assert!(matches!(err, BlobError::PayloadTooLarge { .. }));

    let again = uploads.append(chunk(&session.id, 2, b"")).await.unwrap();
    assert_eq!(again, done);
}

/// Concurrent appends at the same offset: exactly one wins
#[tokio::test]
async fn test_concurrent_appends_are_serialized() {
    let uploads = adapter();
    let session = uploads.create(10, named("race.bin")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let uploads = uploads.clone();
        let id = session.id.clone();
        handles.push(tokio::spawn(async move {
            uploads.append(chunk(&id, 0, b"123456")).await
        }));
    }

    let mut accepted = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                accepted += 1;
                assert_eq!(receipt.offset, 6);
            }
            Err(BlobError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(uploads.status(&session.id).await.unwrap().offset, 6);
}

/// A failed backend write never advances the offset
#[tokio::test]
async fn test_failed_write_keeps_offset() {
    let backend = FaultyBackend::default();
    let uploads = faulty_adapter(backend.clone(), UploadConfig::default());
    let session = uploads.create(4, Metadata::new()).await.unwrap();

    backend.fail_append.store(true, Ordering::SeqCst);
    let err = uploads.append(chunk(&session.id, 0, b"ab")).await.unwrap_err();
    assert!(matches!(err, BlobError::Io { .. }));
    assert_eq!(uploads.status(&session.id).await.unwrap().offset, 0);

    backend.fail_append.store(false, Ordering::SeqCst);
    let receipt = uploads.append(chunk(&session.id, 0, b"ab")).await.unwrap();
    assert_eq!(receipt.offset, 2);
}

/// A failed finalization rolls the last chunk back; resending it finalizes
#[tokio::test]
async fn test_finalization_retry() {
    let backend = FaultyBackend::default();
    let uploads = faulty_adapter(backend.clone(), UploadConfig::default());
    let session = uploads.create(5, named("late.txt")).await.unwrap();

    assert_ok!(uploads.append(chunk(&session.id, 0, b"ab")).await);

    backend.fail_rename.store(true, Ordering::SeqCst);
    assert_err!(uploads.append(chunk(&session.id, 2, b"cde")).await);

    // Never reports the full length without a final reference
    let pending = uploads.status(&session.id).await.unwrap();
    assert_eq!(pending.offset, 2);
    assert_eq!(pending.state(), UploadState::InProgress);
    assert!(pending.final_ref.is_none());
    assert_eq!(backend.size(&session.temp_ref).await.unwrap(), 2);
    assert!(!backend.exists(&BlobRef::file("late.txt")).await.unwrap());

    let receipt = uploads.append(chunk(&session.id, 2, b"cde")).await.unwrap();
    assert_eq!(receipt.offset, 5);
    assert_eq!(receipt.final_ref, Some(BlobRef::file("late.txt")));
    assert_eq!(uploads.read_file("late.txt").await.unwrap(), Bytes::from_static(b"abcde"));
}

/// An empty upload that cannot be finalized is not left behind
#[tokio::test]
async fn test_empty_upload_finalization_failure_discards_it() {
    let backend = FaultyBackend::default();
    backend.fail_rename.store(true, Ordering::SeqCst);
    let uploads = faulty_adapter(backend.clone(), UploadConfig::default());

    assert_err!(uploads.create(0, named("void.txt")).await);

    assert!(uploads.list().await.unwrap().is_empty());
    assert!(backend.inner.is_empty().await);
}

/// The sweeper re-checks idleness once it holds the session lock
#[tokio::test]
async fn test_sweep_spares_upload_resumed_mid_sweep() {
    let backend = FaultyBackend {
        append_delay: Some(Duration::from_millis(200)),
        ..FaultyBackend::default()
    };
    let uploads = faulty_adapter(backend, UploadConfig::default());
    let session = uploads.create(10, Metadata::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let appending = {
        let uploads = uploads.clone();
        let id = session.id.clone();
        tokio::spawn(async move { uploads.append(chunk(&id, 0, b"abc")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let swept = uploads.sweep_older_than(Duration::from_millis(30)).await.unwrap();

    assert_eq!(swept, 0);
    assert_eq!(appending.await.unwrap().unwrap().offset, 3);
    assert_eq!(uploads.status(&session.id).await.unwrap().offset, 3);
}

/// Slow storage surfaces as a timeout; the write still lands
#[tokio::test]
async fn test_slow_append_times_out() {
    let backend = FaultyBackend {
        append_delay: Some(Duration::from_millis(200)),
        ..FaultyBackend::default()
    };
    let config = UploadConfig::default().with_io_timeout(Duration::from_millis(20));
    let uploads = faulty_adapter(backend, config);
    let session = uploads.create(4, Metadata::new()).await.unwrap();

    let err = uploads.append(chunk(&session.id, 0, b"ab")).await.unwrap_err();
    assert!(matches!(err, BlobError::Timeout { millis: 20 }));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(uploads.status(&session.id).await.unwrap().offset, 2);
}

/// Metadata without a filename finalizes under the session id
#[tokio::test]
async fn test_unnamed_upload_uses_id() {
    let uploads = adapter();
    let session = uploads.create(1, Metadata::new()).await.unwrap();

    let done = uploads.append(chunk(&session.id, 0, b"z")).await.unwrap();

    assert_eq!(done.final_ref, Some(BlobRef::file(session.id.as_str())));
}
