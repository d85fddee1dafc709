use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::Utc;
use entity::prelude::*;
use repository::{
    auth::AuthBackend,
    post::{PostQuery, RowStore},
    storage::ObjectStore,
};
use tracing::{error, info, warn};

use crate::{
    listing::ListingEngine, session::SessionState, text::format_date, Error,
    Result,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ManagedPost {
    pub id: PostId,
    pub title: String,
    pub category: Category,
    pub date: String,
    pub image_url: Option<String>,
}

impl From<PostEntity> for ManagedPost {
    fn from(post: PostEntity) -> Self {
        Self {
            id: post.id,
            category: post.category,
            date: format_date(post.created_at),
            image_url: post.image().map(str::to_string),
            title: post.title,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteConfirmation {
    pub id: PostId,
    pub title: String,
    pub prompt: String,
}

/// Archive list on the editor page with a two-step delete.
pub struct PostManager {
    auth: Arc<dyn AuthBackend>,
    rows: Arc<dyn RowStore>,
    storage: Arc<dyn ObjectStore>,
    listing: Arc<ListingEngine>,
    bucket: String,
    posts: Mutex<Vec<ManagedPost>>,
    pending: Mutex<Option<PostId>>,
}

impl fmt::Debug for PostManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostManager")
            .field("bucket", &self.bucket)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl PostManager {
    pub fn new(
        auth: Arc<dyn AuthBackend>,
        rows: Arc<dyn RowStore>,
        storage: Arc<dyn ObjectStore>,
        listing: Arc<ListingEngine>,
        bucket: &str,
    ) -> Self {
        Self {
            auth,
            rows,
            storage,
            listing,
            bucket: bucket.to_string(),
            posts: Mutex::new(Vec::new()),
            pending: Mutex::new(None),
        }
    }

    /// Fetches every post, newest first, replacing the local list.
    pub async fn load(&self) -> Result<Vec<ManagedPost>> {
        let posts = self
            .rows
            .query(PostQuery::default())
            .await
            .map_err(|e| {
                error!(task = "load archive", error = e.to_string());
                Error::from(e)
            })?;

        let posts: Vec<ManagedPost> =
            posts.into_iter().map(ManagedPost::from).collect();
        *self.posts.lock().unwrap_or_else(PoisonError::into_inner) =
            posts.clone();

        Ok(posts)
    }

    pub fn posts(&self) -> Vec<ManagedPost> {
        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn pending(&self) -> Option<PostId> {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// First step: remembers the id and returns the prompt to show.
    pub async fn request_delete(&self, id: PostId) -> Result<DeleteConfirmation> {
        let known = self
            .posts()
            .into_iter()
            .find(|post| post.id == id)
            .map(|post| post.title);
        let title = match known {
            Some(title) => title,
            None => self.rows.get_by_id(id).await?.title,
        };

        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);

        Ok(DeleteConfirmation {
            id,
            prompt: format!(
                "\"{title}\" başlıklı yazıyı gerçekten silmek istiyor musunuz? Bu işlem geri alınamaz!"
            ),
            title,
        })
    }

    pub fn cancel_delete(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Second step. Only the id named by the last [`PostManager::request_delete`]
    /// can be confirmed.
    /// A failed confirm keeps the request pending, so it can be retried.
    pub async fn confirm_delete(&self, id: PostId) -> Result<()> {
        if self.pending() != Some(id) {
            return Err(Error::NoPendingDelete);
        }

        self.ensure_privileged().await?;

        let post = self.rows.get_by_id(id).await?;
        self.rows.delete_by_id(id).await.map_err(|e| {
            error!(task = "delete post", id = %id, error = e.to_string());
            Error::from(e)
        })?;

        // The row is gone; a leftover image is only an orphan.
        if let Some(url) = post.image() {
            self.remove_image(url).await;
        }

        info!(task = "delete post", id = %id);
        {
            let mut pending =
                self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if *pending == Some(id) {
                pending.take();
            }
        }
        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|post| post.id != id);
        self.listing.refresh();

        Ok(())
    }

    async fn ensure_privileged(&self) -> Result<()> {
        let session = self.auth.current_session().await.unwrap_or_else(|e| {
            warn!(task = "privilege check", error = e.to_string());
            None
        });

        if SessionState::from_session(session.as_ref(), Utc::now())
            .is_privileged()
        {
            Ok(())
        } else {
            Err(Error::NotPrivileged)
        }
    }

    /// Images outside our bucket are left alone; removal failures only warn.
    async fn remove_image(&self, url: &str) {
        let Some(path) = self.storage.path_from_public_url(&self.bucket, url)
        else {
            info!(task = "remove image", url, "not a bucket object");
            return;
        };

        if let Err(e) = self.storage.remove(&self.bucket, &[path]).await {
            warn!(task = "remove image", url, error = e.to_string());
        }
    }
}

#[cfg(test)]
mod test {
    use repository::memory::{MemoryAuth, MemoryPosts};

    use super::*;
    use crate::testing::{new_post, signed_in_auth, ScriptedRows, ScriptedStorage};

    const BUCKET: &str = "post-images";

    struct Fixture {
        rows: Arc<ScriptedRows>,
        storage: Arc<ScriptedStorage>,
        manager: PostManager,
    }

    async fn fixture(auth: Arc<dyn AuthBackend>) -> Fixture {
        let memory = Arc::new(MemoryPosts::default());
        for (title, category) in [
            ("Medea", Category::Mitoloji),
            ("Sisifos", Category::Felsefe),
        ] {
            memory.insert(new_post(title, category)).await.unwrap();
        }

        let rows = Arc::new(ScriptedRows::new(memory));
        let storage = Arc::new(ScriptedStorage::new());
        let listing =
            Arc::new(ListingEngine::new(rows.clone(), "/placeholder.svg"));
        let manager = PostManager::new(
            auth,
            rows.clone(),
            storage.clone(),
            listing,
            BUCKET,
        );
        manager.load().await.unwrap();

        Fixture {
            rows,
            storage,
            manager,
        }
    }

    fn find(manager: &PostManager, title: &str) -> PostId {
        manager
            .posts()
            .into_iter()
            .find(|post| post.title == title)
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_confirmed_delete_removes_item() {
        // Arrange
        let f = fixture(signed_in_auth().await).await;
        let id = find(&f.manager, "Medea");

        // Act
        let confirmation = f.manager.request_delete(id).await.unwrap();
        f.manager.confirm_delete(id).await.unwrap();

        // Assert
        assert!(confirmation.prompt.contains("\"Medea\""));
        assert_eq!(f.manager.posts().len(), 1);
        assert_eq!(f.rows.deletes(), 1);
        assert_eq!(f.manager.pending(), None);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_item() {
        // Arrange
        let f = fixture(signed_in_auth().await).await;
        let id = find(&f.manager, "Sisifos");
        f.rows.fail_writes(true);

        // Act
        f.manager.request_delete(id).await.unwrap();
        let result = f.manager.confirm_delete(id).await;

        // Assert
        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(f.manager.posts().len(), 2);
        assert_eq!(f.manager.pending(), Some(id));
    }

    #[tokio::test]
    async fn test_failed_delete_can_be_retried() {
        // Arrange
        let f = fixture(signed_in_auth().await).await;
        let id = find(&f.manager, "Sisifos");
        f.manager.request_delete(id).await.unwrap();
        f.rows.fail_writes(true);
        assert!(f.manager.confirm_delete(id).await.is_err());

        // Act
        f.rows.fail_writes(false);
        let retried = f.manager.confirm_delete(id).await;

        // Assert
        assert!(retried.is_ok());
        assert_eq!(f.manager.posts().len(), 1);
        assert_eq!(f.manager.pending(), None);
        assert_eq!(f.rows.deletes(), 2);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_image() {
        // Arrange
        let auth = signed_in_auth().await;
        let rows = Arc::new(ScriptedRows::new(Arc::new(MemoryPosts::default())));
        let storage = Arc::new(ScriptedStorage::new());
        let mut post = new_post("Guernica", Category::Sanat);
        post.image_url = Some(storage.public_url(BUCKET, "posts/g.png"));
        let post = rows.insert(post).await.unwrap();
        let listing =
            Arc::new(ListingEngine::new(rows.clone(), "/placeholder.svg"));
        let manager =
            PostManager::new(auth, rows.clone(), storage.clone(), listing, BUCKET);
        rows.fail_writes(true);

        // Act
        manager.request_delete(post.id).await.unwrap();
        let result = manager.confirm_delete(post.id).await;

        // Assert
        assert!(result.is_err());
        assert_eq!(storage.removes(), 0);
    }

    #[tokio::test]
    async fn test_confirm_without_request_makes_no_call() {
        // Arrange
        let f = fixture(signed_in_auth().await).await;
        let medea = find(&f.manager, "Medea");
        let sisifos = find(&f.manager, "Sisifos");

        // Act
        let unrequested = f.manager.confirm_delete(medea).await;
        f.manager.request_delete(sisifos).await.unwrap();
        let mismatched = f.manager.confirm_delete(medea).await;
        f.manager.request_delete(medea).await.unwrap();
        f.manager.cancel_delete();
        let cancelled = f.manager.confirm_delete(medea).await;

        // Assert
        assert!(matches!(unrequested, Err(Error::NoPendingDelete)));
        assert!(matches!(mismatched, Err(Error::NoPendingDelete)));
        assert!(matches!(cancelled, Err(Error::NoPendingDelete)));
        assert_eq!(f.rows.deletes(), 0);
    }

    #[tokio::test]
    async fn test_anonymous_delete_is_rejected() {
        let f = fixture(Arc::new(MemoryAuth::default())).await;
        let id = find(&f.manager, "Medea");

        f.manager.request_delete(id).await.unwrap();
        let result = f.manager.confirm_delete(id).await;

        assert!(matches!(result, Err(Error::NotPrivileged)));
        assert_eq!(f.rows.deletes(), 0);
        assert_eq!(f.manager.posts().len(), 2);
    }

    #[tokio::test]
    async fn test_image_removal_failure_is_tolerated() {
        // Arrange
        let auth = signed_in_auth().await;
        let rows = Arc::new(ScriptedRows::new(Arc::new(MemoryPosts::default())));
        let storage = Arc::new(ScriptedStorage::new());
        let mut post = new_post("Guernica", Category::Sanat);
        post.image_url = Some(storage.public_url(BUCKET, "posts/g.png"));
        let post = rows.insert(post).await.unwrap();
        let listing =
            Arc::new(ListingEngine::new(rows.clone(), "/placeholder.svg"));
        let manager =
            PostManager::new(auth, rows.clone(), storage.clone(), listing, BUCKET);
        storage.fail_removes(true);

        // Act
        manager.request_delete(post.id).await.unwrap();
        let result = manager.confirm_delete(post.id).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(storage.removes(), 1);
        assert_eq!(rows.deletes(), 1);
    }

    #[tokio::test]
    async fn test_foreign_image_url_is_not_removed() {
        // Arrange
        let f = fixture(signed_in_auth().await).await;
        let mut post = new_post("Dış Bağlantı", Category::Sanat);
        post.image_url = Some("https://upload.wikimedia.org/a.jpg".to_string());
        let post = f.rows.insert(post).await.unwrap();

        // Act
        f.manager.request_delete(post.id).await.unwrap();
        f.manager.confirm_delete(post.id).await.unwrap();

        // Assert
        assert_eq!(f.storage.removes(), 0);
        assert_eq!(f.rows.deletes(), 1);
    }
}
