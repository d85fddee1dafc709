//! In-process collaborators for local development and tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use entity::prelude::*;
use uuid::Uuid;

use crate::{
    auth::{AuthBackend, SessionStore, Subscription},
    post::{PostQuery, RowStore, SortOrder},
    response::Response,
    storage::ObjectStore,
    Repository, RepositoryError,
};

const SESSION_TTL_HOURS: i64 = 1;

/// Builds a repository where every collaborator lives in memory.
pub fn init_repository(auth: MemoryAuth, public_base_url: &str) -> Repository {
    Repository {
        auth: Arc::new(auth),
        post: Arc::new(MemoryPosts::default()),
        storage: Arc::new(MemoryStorage::new(public_base_url)),
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuth {
    accounts: HashMap<String, String>,
    store: SessionStore,
}

impl MemoryAuth {
    pub fn with_account(mut self, email: &str, password: &str) -> Self {
        self.accounts.insert(email.to_string(), password.to_string());
        self
    }

    pub fn subscriber_count(&self) -> usize {
        self.store.subscriber_count()
    }

    /// Ends the session from outside the client, e.g. an admin revoking it.
    pub fn revoke(&self) {
        self.store.set(AuthEventKind::SignedOut, None);
    }
}

#[async_trait]
impl AuthBackend for MemoryAuth {
    async fn current_session(&self) -> Response<Option<Session>> {
        let session = self.store.get();
        if let Some(session) = &session {
            if session.is_expired_at(Utc::now()) {
                self.store.set(AuthEventKind::SignedOut, None);
                return Ok(None);
            }
        }

        Ok(session)
    }

    fn on_session_change(&self) -> Subscription {
        self.store.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Response<Session> {
        if self.accounts.get(email).map(String::as_str) != Some(password) {
            return Err(RepositoryError::Auth(
                "Invalid login credentials".to_string(),
            ));
        }

        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
            expires_at: Utc::now() + TimeDelta::hours(SESSION_TTL_HOURS),
            user: UserEntity {
                id: Uuid::new_v4().to_string(),
                email: Some(email.to_string()),
            },
        };
        self.store
            .set(AuthEventKind::SignedIn, Some(session.clone()));

        Ok(session)
    }

    async fn sign_out(&self) -> Response<()> {
        self.store.set(AuthEventKind::SignedOut, None);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPosts {
    rows: Mutex<Vec<PostEntity>>,
    next_id: Mutex<i64>,
}

impl MemoryPosts {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RowStore for MemoryPosts {
    async fn query(&self, query: PostQuery) -> Response<Vec<PostEntity>> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let mut posts: Vec<_> = rows
            .iter()
            .filter(|post| match query.filter.category() {
                Some(category) => post.category == category,
                None => true,
            })
            .cloned()
            .collect();

        posts.sort_by_key(|post| (post.created_at, post.id));
        if query.order == SortOrder::NewestFirst {
            posts.reverse();
        }

        Ok(posts)
    }

    async fn get_by_id(&self, id: PostId) -> Response<PostEntity> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|post| post.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn insert(&self, post: NewPost) -> Response<PostEntity> {
        let id = {
            let mut next_id =
                self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
            *next_id += 1;
            PostId(*next_id)
        };

        let post = post.into_post(id);
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(post.clone());

        Ok(post)
    }

    async fn delete_by_id(&self, id: PostId) -> Response<()> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let before = rows.len();
        rows.retain(|post| post.id != id);

        if rows.len() == before {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug)]
pub struct MemoryStorage {
    public_base_url: String,
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryStorage {
    pub fn new(public_base_url: &str) -> Self {
        Self {
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&format!("{bucket}/{path}"))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Response<()> {
        let mut objects =
            self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        let key = format!("{bucket}/{path}");
        if objects.contains_key(&key) {
            return Err(RepositoryError::Storage(format!(
                "object {key} already exists"
            )));
        }

        objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );

        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, path)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Response<()> {
        let mut objects =
            self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        for path in paths {
            objects.remove(&format!("{bucket}/{path}"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_post(title: &str, category: Category, minutes: i64) -> NewPost {
        NewPost {
            title: title.to_string(),
            content: "<p>içerik</p>".to_string(),
            category,
            image_url: None,
            author_name: None,
            author_status: None,
            created_at: Utc::now() + TimeDelta::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn test_query_orders_and_filters() {
        // Arrange
        let posts = MemoryPosts::default();
        posts
            .insert(new_post("eski", Category::Sinema, 0))
            .await
            .unwrap();
        posts
            .insert(new_post("yeni", Category::Sinema, 5))
            .await
            .unwrap();
        posts
            .insert(new_post("şiir", Category::Edebiyat, 2))
            .await
            .unwrap();

        // Act
        let all = posts.query(PostQuery::default()).await.unwrap();
        let sinema = posts
            .query(PostQuery::new(CategoryFilter::Only(Category::Sinema)))
            .await
            .unwrap();

        // Assert
        let titles: Vec<_> = all.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["yeni", "şiir", "eski"]);
        assert_eq!(sinema.len(), 2);
        assert!(sinema.iter().all(|p| p.category == Category::Sinema));
    }

    #[tokio::test]
    async fn test_delete_missing_row_fails() {
        let posts = MemoryPosts::default();
        let post = posts
            .insert(new_post("a", Category::Sanat, 0))
            .await
            .unwrap();

        assert!(posts.delete_by_id(post.id).await.is_ok());
        assert!(matches!(
            posts.delete_by_id(post.id).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_auth_rejects_bad_credentials() {
        let auth = MemoryAuth::default().with_account("yazar@example.com", "gizli");

        assert!(matches!(
            auth.sign_in("yazar@example.com", "yanlış").await,
            Err(RepositoryError::Auth(_))
        ));
        assert!(auth.sign_in("yazar@example.com", "gizli").await.is_ok());
        assert!(auth.current_session().await.unwrap().is_some());

        auth.revoke();
        assert!(auth.current_session().await.unwrap().is_none());
    }

    #[test]
    fn test_public_url_round_trip() {
        let storage = MemoryStorage::new("http://localhost:8000/media/");

        let url = storage.public_url("post-images", "posts/a.png");

        assert_eq!(url, "http://localhost:8000/media/post-images/posts/a.png");
        assert_eq!(
            storage.path_from_public_url("post-images", &url).as_deref(),
            Some("posts/a.png")
        );
        assert_eq!(
            storage.path_from_public_url("post-images", "https://elsewhere/x.png"),
            None
        );
    }
}
