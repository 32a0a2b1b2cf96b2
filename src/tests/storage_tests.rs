use tempfile::TempDir;

use crate::storage::{LocalStorage, StorageError, StorageService};

fn create_test_storage() -> (LocalStorage, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(temp_dir.path().to_string_lossy().to_string());
    (storage, temp_dir)
}

#[test]
fn generated_keys_keep_the_extension() {
    let (storage, _temp_dir) = create_test_storage();
    let key = storage.generate_key("complaint.pdf");
    assert!(key.starts_with("documents/"));
    assert!(key.ends_with(".pdf"));
}

#[test]
fn generated_keys_fall_back_without_extension() {
    let (storage, _temp_dir) = create_test_storage();
    let key = storage.generate_key("complaint");
    assert!(key.ends_with(".bin"));
}

#[test]
fn generated_keys_are_unique() {
    let (storage, _temp_dir) = create_test_storage();
    let a = storage.generate_key("file.txt");
    let b = storage.generate_key("file.txt");
    assert_ne!(a, b);
}

#[tokio::test]
async fn presigned_upload_creates_parent_directories() {
    let (storage, temp_dir) = create_test_storage();
    let key = storage.generate_key("upload.txt");

    let url = storage.presign_upload(&key).await.unwrap();
    assert!(url.starts_with("file://"));
    assert!(temp_dir.path().join("documents").is_dir());
}

#[tokio::test]
async fn read_returns_stored_bytes() {
    let (storage, temp_dir) = create_test_storage();
    let key = "documents/stored.txt";
    tokio::fs::create_dir_all(temp_dir.path().join("documents"))
        .await
        .unwrap();
    tokio::fs::write(temp_dir.path().join(key), b"case notes")
        .await
        .unwrap();

    let bytes = storage.read(key).await.unwrap();
    assert_eq!(bytes, b"case notes");
}

#[tokio::test]
async fn read_missing_key_is_not_found() {
    let (storage, _temp_dir) = create_test_storage();
    let result = storage.read("documents/missing.txt").await;
    assert!(matches!(result, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn presign_download_requires_the_object() {
    let (storage, _temp_dir) = create_test_storage();
    let result = storage.presign_download("documents/absent.pdf").await;
    assert!(matches!(result, Err(StorageError::NotFound(_))));
}
