//! Orchestration tests against in-memory stores.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::future::join_all;

use super::*;
use crate::storage::{
    ObjectStore, ObjectStream, PresignedUrl, StorageError, attachment_disposition, expiry_after,
};

/// A stored object in [`MemoryObjectStore`].
#[derive(Clone)]
struct StoredObject {
    content: Bytes,
    content_type: String,
}

/// Link issued by [`MemoryObjectStore::presign_download`].
#[derive(Clone)]
struct IssuedLink {
    key: String,
    expires_at: DateTime<Utc>,
    disposition: String,
}

/// Object store double with a controllable clock and failure injection.
struct MemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    links: Mutex<HashMap<String, IssuedLink>>,
    now: Mutex<DateTime<Utc>>,
    max_file_size: u64,
    fail_put: AtomicBool,
    fail_open: AtomicBool,
    fail_delete: AtomicBool,
    puts: AtomicUsize,
    opens: AtomicUsize,
    deletes: AtomicUsize,
    presigns: AtomicUsize,
}

impl MemoryObjectStore {
    fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            links: Mutex::new(HashMap::new()),
            now: Mutex::new(Utc::now()),
            max_file_size: u64::MAX,
            fail_put: AtomicBool::new(false),
            fail_open: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            puts: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            presigns: AtomicUsize::new(0),
        }
    }

    fn with_max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = max;
        self
    }

    fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = expiry_after(*now, by);
    }

    fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    fn remove_behind_our_back(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }

    fn calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
            + self.opens.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
            + self.presigns.load(Ordering::SeqCst)
    }

    /// Serve a presigned URL the way the real store validates it.
    fn fetch(&self, url: &str) -> Result<(Bytes, String), StorageError> {
        let link = self
            .links
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| StorageError::operation("403 SignatureDoesNotMatch"))?;
        if *self.now.lock().unwrap() >= link.expires_at {
            return Err(StorageError::operation("403 Request has expired"));
        }
        let object = self
            .objects
            .lock()
            .unwrap()
            .get(&link.key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(&link.key))?;
        Ok((object.content, link.disposition))
    }
}

impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        "test-bucket"
    }

    fn validate_upload(&self, size: u64) -> Result<(), StorageError> {
        if size > self.max_file_size {
            return Err(StorageError::file_too_large(size, self.max_file_size));
        }
        Ok(())
    }

    async fn put(&self, key: &str, content: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::operation("connection refused"));
        }
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                content,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<ObjectStream, StorageError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(StorageError::operation("access denied"));
        }
        let object = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(key))?;

        let chunks: Vec<std::io::Result<Bytes>> = object
            .content
            .chunks(3)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::operation("service unavailable"));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign_download(
        &self,
        key: &str,
        ttl: Duration,
        file_name: &str,
    ) -> Result<PresignedUrl, StorageError> {
        self.presigns.fetch_add(1, Ordering::SeqCst);
        let now = *self.now.lock().unwrap();
        let expires_at = expiry_after(now, ttl);
        let url = format!(
            "memory://test-bucket/{key}?expires={}&nonce={}",
            expires_at.timestamp(),
            uuid::Uuid::new_v4()
        );
        self.links.lock().unwrap().insert(
            url.clone(),
            IssuedLink {
                key: key.to_string(),
                expires_at,
                disposition: attachment_disposition(file_name),
            },
        );
        Ok(PresignedUrl {
            url,
            method: "GET".to_string(),
            expires_at,
            headers: HashMap::new(),
        })
    }
}

/// Metadata repository double with auto-increment ids and unique keys.
struct MemoryFileRepository {
    records: Mutex<HashMap<i64, FileRecord>>,
    next_id: AtomicI64,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryFileRepository {
    fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            fail_create: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl FileRepository for MemoryFileRepository {
    async fn create(&self, input: NewFileRecord) -> Result<FileRecord, FileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(FileError::metadata("connection pool timed out"));
        }
        let mut records = self.records.lock().unwrap();
        if records
            .values()
            .any(|r| r.storage_key == input.storage_key)
        {
            return Err(FileError::metadata("duplicate storage key"));
        }
        let record = FileRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            original_file_name: input.original_file_name,
            storage_key: input.storage_key,
            content_type: input.content_type,
            file_size: input.file_size,
            upload_timestamp: input.upload_timestamp,
            share_token: None,
        };
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<FileRecord>, FileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_storage_key(&self, storage_key: &str) -> Result<Option<FileRecord>, FileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.storage_key == storage_key)
            .cloned())
    }

    async fn delete(&self, id: i64) -> Result<bool, FileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(FileError::metadata("deadlock detected"));
        }
        Ok(self.records.lock().unwrap().remove(&id).is_some())
    }
}

type TestService = FileService<MemoryObjectStore, MemoryFileRepository>;

fn setup() -> (TestService, Arc<MemoryObjectStore>, Arc<MemoryFileRepository>) {
    setup_with_store(MemoryObjectStore::new())
}

fn setup_with_store(
    store: MemoryObjectStore,
) -> (TestService, Arc<MemoryObjectStore>, Arc<MemoryFileRepository>) {
    let store = Arc::new(store);
    let repo = Arc::new(MemoryFileRepository::new());
    let service = FileService::new(store.clone(), repo.clone());
    (service, store, repo)
}

async fn read_all(mut stream: ObjectStream) -> Vec<u8> {
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.expect("chunk should read"));
    }
    body
}

const ONE_HOUR: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn test_upload_then_download_round_trip() {
    let (service, _, _) = setup();

    let record = service
        .upload(UploadInput::new(
            &b"quarterly numbers"[..],
            "report.csv",
            "text/csv",
        ))
        .await
        .unwrap();

    assert_eq!(record.original_file_name, "report.csv");
    assert_eq!(record.content_type, "text/csv");
    assert_eq!(record.file_size, 17);
    assert!(record.storage_key.ends_with("-report.csv"));
    assert!(record.share_token.is_none());

    let download = service.download(record.id).await.unwrap();
    assert_eq!(download.content_type, "text/csv");
    assert_eq!(download.file_name, "report.csv");
    assert_eq!(download.file_size, 17);
    assert_eq!(read_all(download.stream).await, b"quarterly numbers");
}

#[tokio::test]
async fn test_upload_records_object_content_type() {
    let (service, store, _) = setup();

    let record = service
        .upload(UploadInput::new(&b"%PDF"[..], "a.pdf", "application/pdf"))
        .await
        .unwrap();

    let stored = store.objects.lock().unwrap().get(&record.storage_key).cloned();
    assert_eq!(stored.unwrap().content_type, "application/pdf");
}

#[tokio::test]
async fn test_upload_blank_content_type_defaults() {
    let (service, _, _) = setup();

    let record = service
        .upload(UploadInput::new(&b"x"[..], "blob", " "))
        .await
        .unwrap();
    assert_eq!(record.content_type, DEFAULT_CONTENT_TYPE);
}

#[tokio::test]
async fn test_same_name_gets_distinct_keys_and_ids() {
    let (service, store, _) = setup();

    let first = service
        .upload(UploadInput::new(&b"one"[..], "photo.png", "image/png"))
        .await
        .unwrap();
    let second = service
        .upload(UploadInput::new(&b"two"[..], "photo.png", "image/png"))
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_ne!(first.storage_key, second.storage_key);
    assert_eq!(store.object_count(), 2);
}

#[tokio::test]
async fn test_unknown_id_is_not_found_without_store_calls() {
    let (service, store, _) = setup();

    assert!(matches!(
        service.get_metadata(99).await,
        Err(FileError::NotFound(99))
    ));
    assert!(matches!(
        service.download(99).await,
        Err(FileError::NotFound(99))
    ));
    assert!(matches!(
        service.delete(99).await,
        Err(FileError::NotFound(99))
    ));
    assert!(matches!(
        service.generate_share_link(99, ONE_HOUR).await,
        Err(FileError::NotFound(99))
    ));

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_delete_removes_object_and_record() {
    let (service, store, repo) = setup();

    let record = service
        .upload(UploadInput::new(&b"bye"[..], "old.txt", "text/plain"))
        .await
        .unwrap();

    service.delete(record.id).await.unwrap();

    assert!(!store.contains(&record.storage_key));
    assert_eq!(repo.record_count(), 0);
    assert!(matches!(
        service.get_metadata(record.id).await,
        Err(FileError::NotFound(_))
    ));
    assert!(matches!(
        service.download(record.id).await,
        Err(FileError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_empty_upload_rejected_before_any_store_call() {
    let (service, store, repo) = setup();

    let result = service
        .upload(UploadInput::new(Bytes::new(), "empty.txt", "text/plain"))
        .await;

    assert!(matches!(result, Err(FileError::EmptyContent)));
    assert_eq!(store.calls(), 0);
    assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_declared_size_mismatch_rejected() {
    let (service, store, _) = setup();

    let result = service
        .upload(UploadInput::new(&b"12345"[..], "n.txt", "text/plain").with_declared_size(6))
        .await;

    assert!(matches!(
        result,
        Err(FileError::SizeMismatch {
            expected: 6,
            actual: 5
        })
    ));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_declared_size_match_accepted() {
    let (service, _, _) = setup();

    let record = service
        .upload(UploadInput::new(&b"12345"[..], "n.txt", "text/plain").with_declared_size(5))
        .await
        .unwrap();
    assert_eq!(record.file_size, 5);
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let (service, store, _) = setup_with_store(MemoryObjectStore::new().with_max_file_size(4));

    let result = service
        .upload(UploadInput::new(&b"12345"[..], "big.bin", "application/octet-stream"))
        .await;

    assert!(matches!(
        result,
        Err(FileError::FileTooLarge { size: 5, max: 4 })
    ));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_failed_object_write_creates_no_record() {
    let (service, store, repo) = setup();
    store.fail_put.store(true, Ordering::SeqCst);

    let result = service
        .upload(UploadInput::new(&b"data"[..], "a.txt", "text/plain"))
        .await;

    assert!(matches!(result, Err(FileError::StorageWrite(_))));
    assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
    assert_eq!(repo.record_count(), 0);
}

#[tokio::test]
async fn test_failed_metadata_insert_removes_object() {
    let (service, store, repo) = setup();
    repo.fail_create.store(true, Ordering::SeqCst);

    let result = service
        .upload(UploadInput::new(&b"data"[..], "a.txt", "text/plain"))
        .await;

    assert!(matches!(result, Err(FileError::Metadata(_))));
    assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
    assert_eq!(store.object_count(), 0);
}

#[tokio::test]
async fn test_failed_compensating_delete_still_reports_metadata_error() {
    let (service, store, repo) = setup();
    repo.fail_create.store(true, Ordering::SeqCst);
    store.fail_delete.store(true, Ordering::SeqCst);

    let result = service
        .upload(UploadInput::new(&b"data"[..], "a.txt", "text/plain"))
        .await;

    assert!(matches!(result, Err(FileError::Metadata(_))));
    assert_eq!(store.object_count(), 1);
}

#[tokio::test]
async fn test_failed_object_delete_keeps_record() {
    let (service, store, repo) = setup();

    let record = service
        .upload(UploadInput::new(&b"keep"[..], "k.txt", "text/plain"))
        .await
        .unwrap();
    store.fail_delete.store(true, Ordering::SeqCst);

    let result = service.delete(record.id).await;

    assert!(matches!(result, Err(FileError::StorageDelete(_))));
    assert_eq!(repo.record_count(), 1);
    assert!(store.contains(&record.storage_key));
    assert_eq!(service.get_metadata(record.id).await.unwrap(), record);
}

#[tokio::test]
async fn test_failed_metadata_delete_leaves_dangling_record() {
    let (service, store, repo) = setup();

    let record = service
        .upload(UploadInput::new(&b"gone"[..], "g.txt", "text/plain"))
        .await
        .unwrap();
    repo.fail_delete.store(true, Ordering::SeqCst);

    let result = service.delete(record.id).await;
    assert!(matches!(result, Err(FileError::Metadata(_))));
    assert!(!store.contains(&record.storage_key));

    // The dangling row still resolves, but its object is gone.
    assert!(service.get_metadata(record.id).await.is_ok());
    let err = service.download(record.id).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, FileError::ObjectNotFound(ref key) if *key == record.storage_key));
}

#[tokio::test]
async fn test_missing_object_is_reported_as_not_found() {
    let (service, store, _) = setup();

    let record = service
        .upload(UploadInput::new(&b"lost"[..], "l.txt", "text/plain"))
        .await
        .unwrap();
    store.remove_behind_our_back(&record.storage_key);

    let err = service.download(record.id).await.unwrap_err();
    assert!(matches!(err, FileError::ObjectNotFound(_)));
}

#[tokio::test]
async fn test_store_read_failure_is_storage_error() {
    let (service, store, _) = setup();

    let record = service
        .upload(UploadInput::new(&b"x"[..], "x.txt", "text/plain"))
        .await
        .unwrap();
    store.fail_open.store(true, Ordering::SeqCst);

    let err = service.download(record.id).await.unwrap_err();
    assert!(matches!(err, FileError::StorageRead(_)));
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_share_link_valid_until_expiry() {
    let (service, store, _) = setup();

    let record = service
        .upload(UploadInput::new(&b"shared"[..], "deck.pdf", "application/pdf"))
        .await
        .unwrap();

    let link = service
        .generate_share_link(record.id, ONE_HOUR)
        .await
        .unwrap();
    assert_eq!(link.method, "GET");

    let (body, disposition) = store.fetch(&link.url).unwrap();
    assert_eq!(&body[..], b"shared");
    assert_eq!(disposition, "attachment; filename=\"deck.pdf\"");

    store.advance(Duration::from_secs(3599));
    assert!(store.fetch(&link.url).is_ok());

    store.advance(Duration::from_secs(1));
    assert!(store.fetch(&link.url).is_err());
}

#[tokio::test]
async fn test_share_link_does_not_record_state() {
    let (service, _, repo) = setup();

    let record = service
        .upload(UploadInput::new(&b"s"[..], "s.txt", "text/plain"))
        .await
        .unwrap();
    service
        .generate_share_link(record.id, ONE_HOUR)
        .await
        .unwrap();

    let after = service.get_metadata(record.id).await.unwrap();
    assert_eq!(after, record);
    assert_eq!(repo.record_count(), 1);
}

#[tokio::test]
async fn test_find_by_storage_key() {
    let (service, _, _) = setup();

    let record = service
        .upload(UploadInput::new(&b"k"[..], "k.bin", "application/octet-stream"))
        .await
        .unwrap();

    let found = service
        .find_by_storage_key(&record.storage_key)
        .await
        .unwrap();
    assert_eq!(found, Some(record));
    assert_eq!(service.find_by_storage_key("nope").await.unwrap(), None);
}

#[tokio::test]
async fn test_concurrent_uploads_are_independent() {
    let (service, store, _) = setup();
    let service = Arc::new(service);

    let handles = (0..32).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            let content = format!("payload-{i}").into_bytes();
            let record = service
                .upload(UploadInput::new(content.clone(), "same.txt", "text/plain"))
                .await
                .unwrap();
            (record, content)
        })
    });

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let mut ids: Vec<i64> = results.iter().map(|(r, _)| r.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 32);
    assert_eq!(store.object_count(), 32);

    for (record, content) in results {
        let download = service.download(record.id).await.unwrap();
        assert_eq!(read_all(download.stream).await, content);
    }
}
