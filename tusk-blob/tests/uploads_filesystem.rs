use std::path::Path;

use bytes::Bytes;
use futures_util::StreamExt;
use tempfile::tempdir;
use tokio_test::assert_ok;

use tusk_blob::protocol::{OFFSET_OCTET_STREAM, TUS_RESUMABLE};
use tusk_blob::{
    BlobBackend, BlobError, BlobRef, ChunkAppend, FilesystemBackend, MemorySessionStore, Metadata,
    UploadAdapter, UploadConfig,
};

async fn fs_adapter(root: &Path) -> UploadAdapter {
    let backend = FilesystemBackend::new(root.join("temp"), root.join("files"))
        .await
        .unwrap();
    let config = UploadConfig::default();
    UploadAdapter::new(MemorySessionStore::new(config.max_size), backend, config)
}

fn chunk(upload: &tusk_blob::UploadSession, offset: u64, data: &'static [u8]) -> ChunkAppend {
    ChunkAppend::new(upload.id.clone(), offset, Bytes::from_static(data))
        .with_protocol_version(TUS_RESUMABLE)
        .with_content_type(OFFSET_OCTET_STREAM)
}

#[tokio::test]
async fn test_filesystem_upload_lands_under_files_dir() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let uploads = fs_adapter(root).await;

    let mut metadata = Metadata::new();
    metadata.insert("filename".to_string(), "notes.txt".to_string());
    let session = uploads.create(10, metadata).await.unwrap();
    assert!(root.join("temp").join(session.id.as_str()).exists());

    uploads.append(chunk(&session, 0, b"hello ")).await.unwrap();
    let done = uploads.append(chunk(&session, 6, b"disk")).await.unwrap();
    assert_eq!(done.final_ref, Some(BlobRef::file("notes.txt")));

    assert!(!root.join("temp").join(session.id.as_str()).exists());
    assert_eq!(
        tokio::fs::read(root.join("files").join("notes.txt")).await.unwrap(),
        b"hello disk"
    );

    let mut opened = uploads.fetch("notes.txt").await.unwrap();
    assert_eq!(opened.size_bytes, 10);
    let mut streamed = Vec::new();
    while let Some(part) = opened.stream.next().await {
        streamed.extend_from_slice(&part.unwrap());
    }
    assert_eq!(streamed, b"hello disk");
}

#[tokio::test]
async fn test_filesystem_rename_never_clobbers() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let backend = FilesystemBackend::new(root.join("temp"), root.join("files"))
        .await
        .unwrap();

    let src = BlobRef::new(tusk_blob::Namespace::Temp, "src");
    let dst = BlobRef::file("taken.bin");
    backend.create_empty(&src).await.unwrap();
    backend.append(&src, Bytes::from_static(b"new")).await.unwrap();
    backend.create_empty(&dst).await.unwrap();
    backend.append(&dst, Bytes::from_static(b"old")).await.unwrap();

    let err = backend.rename(&src, &dst).await.unwrap_err();
    assert!(matches!(err, BlobError::AlreadyExists { .. }));
    assert_eq!(backend.read_all(&dst).await.unwrap(), Bytes::from_static(b"old"));
    assert!(backend.exists(&src).await.unwrap());

    let missing = BlobRef::new(tusk_blob::Namespace::Temp, "missing");
    assert!(matches!(
        backend.append(&missing, Bytes::from_static(b"x")).await.unwrap_err(),
        BlobError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_fetch_rejects_path_traversal() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let uploads = fs_adapter(root).await;

    assert!(matches!(
        uploads.fetch("../temp/anything").await.unwrap_err(),
        BlobError::InvalidArgument { .. }
    ));
    assert!(matches!(
        uploads.fetch("nope.txt").await.unwrap_err(),
        BlobError::NotFound { .. }
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_rename_succeeds_when_source_cannot_be_removed() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let root = dir.path();
    let backend = FilesystemBackend::new(root.join("temp"), root.join("files"))
        .await
        .unwrap();

    let src = BlobRef::new(tusk_blob::Namespace::Temp, "stuck");
    let dst = BlobRef::file("stuck.bin");
    backend.create_empty(&src).await.unwrap();
    backend.append(&src, Bytes::from_static(b"data")).await.unwrap();

    // A read-only temp dir lets the link in but not the unlink out
    // (unless running as root, where both succeed).
    std::fs::set_permissions(root.join("temp"), std::fs::Permissions::from_mode(0o555)).unwrap();
    let renamed = backend.rename(&src, &dst).await;
    std::fs::set_permissions(root.join("temp"), std::fs::Permissions::from_mode(0o755)).unwrap();

    assert_ok!(renamed);
    assert_eq!(backend.read_all(&dst).await.unwrap(), Bytes::from_static(b"data"));
}

#[tokio::test]
async fn test_truncate_cuts_back_but_never_extends() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let backend = FilesystemBackend::new(root.join("temp"), root.join("files"))
        .await
        .unwrap();

    let blob = BlobRef::new(tusk_blob::Namespace::Temp, "cut");
    backend.create_empty(&blob).await.unwrap();
    backend.append(&blob, Bytes::from_static(b"abcdef")).await.unwrap();

    backend.truncate(&blob, 4).await.unwrap();
    assert_eq!(backend.read_all(&blob).await.unwrap(), Bytes::from_static(b"abcd"));

    backend.truncate(&blob, 10).await.unwrap();
    assert_eq!(backend.size(&blob).await.unwrap(), 4);

    let missing = BlobRef::new(tusk_blob::Namespace::Temp, "missing");
    assert!(matches!(
        backend.truncate(&missing, 0).await.unwrap_err(),
        BlobError::NotFound { .. }
    ));
}
