//! Collaborator doubles shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use entity::prelude::*;
use repository::{
    auth::{AuthBackend, SessionStore, Subscription},
    memory::{MemoryAuth, MemoryPosts, MemoryStorage},
    post::{PostQuery, RowStore},
    storage::ObjectStore,
    RepositoryError, Response,
};

pub const ADMIN_EMAIL: &str = "editor@sanat.test";
pub const ADMIN_PASSWORD: &str = "kütüphane";

pub fn new_post(title: &str, category: Category) -> NewPost {
    NewPost {
        title: title.to_string(),
        content: format!("<p>{title} üzerine bir yazı.</p>"),
        category,
        image_url: None,
        author_name: None,
        author_status: None,
        created_at: Utc::now(),
    }
}

pub async fn signed_in_auth() -> Arc<MemoryAuth> {
    let auth = Arc::new(
        MemoryAuth::default().with_account(ADMIN_EMAIL, ADMIN_PASSWORD),
    );
    auth.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    auth
}

/// Answers session checks after a delay.
pub struct SlowAuth {
    inner: MemoryAuth,
    delay: Duration,
}

impl SlowAuth {
    pub fn new(inner: MemoryAuth, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl AuthBackend for SlowAuth {
    async fn current_session(&self) -> Response<Option<Session>> {
        tokio::time::sleep(self.delay).await;
        self.inner.current_session().await
    }

    fn on_session_change(&self) -> Subscription {
        self.inner.on_session_change()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Response<Session> {
        self.inner.sign_in(email, password).await
    }

    async fn sign_out(&self) -> Response<()> {
        self.inner.sign_out().await
    }
}

/// Auth collaborator that cannot be reached.
#[derive(Default)]
pub struct FailingAuth {
    store: SessionStore,
}

#[async_trait]
impl AuthBackend for FailingAuth {
    async fn current_session(&self) -> Response<Option<Session>> {
        Err(RepositoryError::Unexpected("auth offline".to_string()))
    }

    fn on_session_change(&self) -> Subscription {
        self.store.subscribe()
    }

    async fn sign_in(&self, _: &str, _: &str) -> Response<Session> {
        Err(RepositoryError::Unexpected("auth offline".to_string()))
    }

    async fn sign_out(&self) -> Response<()> {
        Err(RepositoryError::Unexpected("auth offline".to_string()))
    }
}

/// Write calls across collaborators, in the order they happened.
#[derive(Debug, Default, Clone)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    fn record(&self, call: &'static str) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Memory rows with per-category latency, call counters and switchable
/// failures.
pub struct ScriptedRows {
    inner: Arc<MemoryPosts>,
    delays: HashMap<Category, Duration>,
    fail_queries: AtomicBool,
    fail_writes: AtomicBool,
    queries: AtomicUsize,
    inserts: AtomicUsize,
    deletes: AtomicUsize,
    log: CallLog,
}

impl ScriptedRows {
    pub fn new(inner: Arc<MemoryPosts>) -> Self {
        Self {
            inner,
            delays: HashMap::new(),
            fail_queries: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            log: CallLog::default(),
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn delay(mut self, category: Category, delay: Duration) -> Self {
        self.delays.insert(category, delay);
        self
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn offline() -> RepositoryError {
        RepositoryError::Status {
            status: 503,
            message: "rows offline".to_string(),
        }
    }
}

#[async_trait]
impl RowStore for ScriptedRows {
    async fn query(&self, query: PostQuery) -> Response<Vec<PostEntity>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = query
            .filter
            .category()
            .and_then(|category| self.delays.get(&category))
        {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }

        self.inner.query(query).await
    }

    async fn get_by_id(&self, id: PostId) -> Response<PostEntity> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }

        self.inner.get_by_id(id).await
    }

    async fn insert(&self, post: NewPost) -> Response<PostEntity> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.log.record("insert");
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }

        self.inner.insert(post).await
    }

    async fn delete_by_id(&self, id: PostId) -> Response<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.log.record("delete");
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }

        self.inner.delete_by_id(id).await
    }
}

/// Memory storage that counts calls, can fail, and can end the session
/// while an upload is in flight.
pub struct ScriptedStorage {
    pub inner: MemoryStorage,
    fail_uploads: AtomicBool,
    fail_removes: AtomicBool,
    uploads: AtomicUsize,
    removes: AtomicUsize,
    upload_delay: Mutex<Option<Duration>>,
    revoke_on_upload: Mutex<Option<Arc<MemoryAuth>>>,
    log: CallLog,
}

impl ScriptedStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryStorage::new("http://media.test"),
            fail_uploads: AtomicBool::new(false),
            fail_removes: AtomicBool::new(false),
            uploads: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
            upload_delay: Mutex::new(None),
            revoke_on_upload: Mutex::new(None),
            log: CallLog::default(),
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    pub fn slow_uploads(&self, delay: Duration) {
        *self
            .upload_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    pub fn revoke_on_upload(&self, auth: Arc<MemoryAuth>) {
        *self
            .revoke_on_upload
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(auth);
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for ScriptedStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Response<()> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.log.record("upload");
        let delay = *self
            .upload_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("bucket offline".to_string()));
        }

        let revoke = self
            .revoke_on_upload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(auth) = revoke {
            auth.revoke();
        }

        self.inner.upload(bucket, path, bytes, content_type).await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.inner.public_url(bucket, path)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Response<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.log.record("remove");
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("bucket offline".to_string()));
        }

        self.inner.remove(bucket, paths).await
    }
}

/// Smallest valid PNG: signature plus IHDR.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0, 0, 0, 13]);
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0]);
    bytes.extend_from_slice(&[0x1F, 0x15, 0xC4, 0x89]);
    bytes
}
