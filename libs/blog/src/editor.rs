use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use chrono::Utc;
use entity::prelude::*;
use image::ImageFormat;
use repository::{auth::AuthBackend, post::RowStore, storage::ObjectStore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    listing::ListingEngine,
    sanitize::Sanitizer,
    session::SessionState,
    text::{has_markup, paragraphs, strip_markup},
    Error, Result,
};

pub const TITLE_MAX_CHARS: usize = 200;
pub const CONTENT_MIN_CHARS: usize = 3;
pub const IMAGE_MAX_BYTES: usize = 5 * 1024 * 1024;
pub const IMAGE_DIR: &str = "posts";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("başlık boş olamaz")]
    EmptyTitle,

    #[error("başlık en fazla {max} karakter olabilir")]
    TitleTooLong { max: usize },

    #[error("lütfen bir kategori seçin")]
    CategoryNotSelected,

    #[error("içerik en az {min} karakter olmalı")]
    ContentTooShort { min: usize },

    #[error("görsel en fazla {} MB olabilir", .max / (1024 * 1024))]
    ImageTooLarge { max: usize },

    #[error("desteklenmeyen görsel türü: {0}")]
    UnsupportedImageType(String),
}

#[derive(Clone, Default, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Raw form input, exactly as submitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub title: String,
    pub category: String,
    pub content: String,
    pub author_name: String,
    pub author_status: String,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// A draft that passed validation; `content_html` is sanitized.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidDraft {
    pub title: String,
    pub category: Category,
    pub content_html: String,
    pub author_name: Option<String>,
    pub author_status: Option<String>,
    pub image: Option<ValidImage>,
}

impl Draft {
    pub fn validate(
        self,
        sanitizer: &Sanitizer,
    ) -> std::result::Result<ValidDraft, ValidationError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if title.chars().count() > TITLE_MAX_CHARS {
            return Err(ValidationError::TitleTooLong {
                max: TITLE_MAX_CHARS,
            });
        }

        let category = match self.category.parse::<CategoryFilter>() {
            Ok(CategoryFilter::Only(category)) => category,
            _ => return Err(ValidationError::CategoryNotSelected),
        };

        let content_html = render_content(&self.content, sanitizer);
        if strip_markup(&content_html).chars().count() < CONTENT_MIN_CHARS {
            return Err(ValidationError::ContentTooShort {
                min: CONTENT_MIN_CHARS,
            });
        }

        let image = match self.image {
            Some(image) if !image.bytes.is_empty() => Some(check_image(image)?),
            _ => None,
        };

        Ok(ValidDraft {
            title,
            category,
            content_html,
            author_name: optional(self.author_name),
            author_status: optional(self.author_status),
            image,
        })
    }
}

/// Plain text becomes paragraphs; either way the result is sanitized.
pub fn render_content(content: &str, sanitizer: &Sanitizer) -> String {
    if has_markup(content) {
        sanitizer.sanitize(content)
    } else {
        sanitizer.sanitize(&paragraphs(content))
    }
}

fn check_image(
    upload: ImageUpload,
) -> std::result::Result<ValidImage, ValidationError> {
    if upload.bytes.len() > IMAGE_MAX_BYTES {
        return Err(ValidationError::ImageTooLarge {
            max: IMAGE_MAX_BYTES,
        });
    }

    let unsupported =
        || ValidationError::UnsupportedImageType(upload.content_type.clone());
    let (content_type, extension) = match image::guess_format(&upload.bytes) {
        Ok(ImageFormat::Jpeg) => ("image/jpeg", "jpg"),
        Ok(ImageFormat::Png) => ("image/png", "png"),
        Ok(ImageFormat::WebP) => ("image/webp", "webp"),
        Ok(ImageFormat::Gif) => ("image/gif", "gif"),
        _ => return Err(unsupported()),
    };

    // Declared type and magic bytes must agree.
    let declared = upload.content_type.trim().to_ascii_lowercase();
    let declared = match declared.as_str() {
        "image/jpg" => "image/jpeg",
        declared => declared,
    };
    if declared != content_type {
        return Err(unsupported());
    }

    Ok(ValidImage {
        bytes: upload.bytes,
        content_type,
        extension,
    })
}

fn optional(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Releases the in-flight flag when the submission ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Editor {
    auth: Arc<dyn AuthBackend>,
    rows: Arc<dyn RowStore>,
    storage: Arc<dyn ObjectStore>,
    listing: Arc<ListingEngine>,
    sanitizer: Sanitizer,
    bucket: String,
    submitting: AtomicBool,
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("bucket", &self.bucket)
            .field("submitting", &self.is_submitting())
            .finish_non_exhaustive()
    }
}

impl Editor {
    pub fn new(
        auth: Arc<dyn AuthBackend>,
        rows: Arc<dyn RowStore>,
        storage: Arc<dyn ObjectStore>,
        listing: Arc<ListingEngine>,
        sanitizer: Sanitizer,
        bucket: &str,
    ) -> Self {
        Self {
            auth,
            rows,
            storage,
            listing,
            sanitizer,
            bucket: bucket.to_string(),
            submitting: AtomicBool::new(false),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Validates, uploads the cover image if any, then inserts the post.
    /// The image is always stored before the row that points at it.
    pub async fn submit(&self, draft: Draft) -> Result<PostEntity> {
        let _in_flight =
            InFlight::acquire(&self.submitting).ok_or(Error::Busy)?;

        let draft = draft.validate(&self.sanitizer)?;
        self.ensure_privileged().await?;

        let uploaded = match &draft.image {
            Some(image) => Some(self.upload(image).await?),
            None => None,
        };

        if let Err(e) = self.ensure_privileged().await {
            self.discard(uploaded.as_deref()).await;
            return Err(e);
        }

        let post = NewPost {
            title: draft.title,
            content: draft.content_html,
            category: draft.category,
            image_url: uploaded
                .as_deref()
                .map(|path| self.storage.public_url(&self.bucket, path)),
            author_name: draft.author_name,
            author_status: draft.author_status,
            created_at: Utc::now(),
        };

        let post = match self.rows.insert(post).await {
            Ok(post) => post,
            Err(e) => {
                error!(task = "insert post", error = e.to_string());
                self.discard(uploaded.as_deref()).await;
                return Err(e.into());
            }
        };

        info!(task = "insert post", id = %post.id, category = %post.category);
        self.listing.refresh();

        Ok(post)
    }

    async fn ensure_privileged(&self) -> Result<()> {
        let state = match self.auth.current_session().await {
            Ok(session) => {
                SessionState::from_session(session.as_ref(), Utc::now())
            }
            Err(e) => {
                warn!(task = "privilege check", error = e.to_string());
                SessionState::Anonymous
            }
        };

        if state.is_privileged() {
            Ok(())
        } else {
            Err(Error::NotPrivileged)
        }
    }

    async fn upload(&self, image: &ValidImage) -> Result<String> {
        let path = format!("{IMAGE_DIR}/{}.{}", Uuid::new_v4(), image.extension);
        self.storage
            .upload(&self.bucket, &path, image.bytes.clone(), image.content_type)
            .await
            .map_err(|e| {
                error!(
                    task = "upload image",
                    path = path.as_str(),
                    error = e.to_string()
                );
                Error::storage(e)
            })?;

        Ok(path)
    }

    /// Best effort: an orphaned image is harmless, a failed submit is not.
    async fn discard(&self, path: Option<&str>) {
        let Some(path) = path else {
            return;
        };

        let paths = [path.to_string()];
        if let Err(e) = self.storage.remove(&self.bucket, &paths).await {
            warn!(task = "discard image", path, error = e.to_string());
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use repository::memory::{MemoryAuth, MemoryPosts};

    use super::*;
    use crate::testing::{
        png_bytes, signed_in_auth, CallLog, ScriptedRows, ScriptedStorage,
    };

    const BUCKET: &str = "post-images";

    struct Fixture {
        rows: Arc<ScriptedRows>,
        storage: Arc<ScriptedStorage>,
        listing: Arc<ListingEngine>,
        editor: Editor,
        log: CallLog,
    }

    fn fixture(auth: Arc<dyn AuthBackend>) -> Fixture {
        let log = CallLog::default();
        let rows = Arc::new(
            ScriptedRows::new(Arc::new(MemoryPosts::default()))
                .with_log(log.clone()),
        );
        let storage = Arc::new(ScriptedStorage::new().with_log(log.clone()));
        let listing = Arc::new(ListingEngine::new(rows.clone(), "/placeholder.svg"));
        let editor = Editor::new(
            auth,
            rows.clone(),
            storage.clone(),
            listing.clone(),
            Sanitizer::default(),
            BUCKET,
        );

        Fixture {
            rows,
            storage,
            listing,
            editor,
            log,
        }
    }

    fn draft() -> Draft {
        Draft {
            title: "Stalker ve Bölge".to_string(),
            category: "Sinema".to_string(),
            content: "Tarkovski'nin bölgesi bir vicdan haritasıdır.".to_string(),
            ..Default::default()
        }
    }

    fn png() -> ImageUpload {
        ImageUpload {
            file_name: "kapak.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: png_bytes(),
        }
    }

    #[tokio::test]
    async fn test_invalid_drafts_make_no_calls() {
        // Arrange
        let f = fixture(signed_in_auth().await);
        let cases = [
            (
                Draft {
                    title: "   ".to_string(),
                    ..draft()
                },
                ValidationError::EmptyTitle,
            ),
            (
                Draft {
                    title: "a".repeat(TITLE_MAX_CHARS + 1),
                    ..draft()
                },
                ValidationError::TitleTooLong {
                    max: TITLE_MAX_CHARS,
                },
            ),
            (
                Draft {
                    category: ALL_LABEL.to_string(),
                    ..draft()
                },
                ValidationError::CategoryNotSelected,
            ),
            (
                Draft {
                    category: "Müzik".to_string(),
                    ..draft()
                },
                ValidationError::CategoryNotSelected,
            ),
            (
                Draft {
                    content: "<p> a </p><script>uzun bir betik</script>".to_string(),
                    ..draft()
                },
                ValidationError::ContentTooShort {
                    min: CONTENT_MIN_CHARS,
                },
            ),
        ];

        for (draft, expected) in cases {
            // Act
            let result = f.editor.submit(draft).await;

            // Assert
            assert!(
                matches!(&result, Err(Error::Validation(e)) if *e == expected),
                "expected {expected:?}, got {result:?}"
            );
        }
        assert_eq!(f.rows.inserts(), 0);
        assert_eq!(f.storage.uploads(), 0);
        assert!(!f.editor.is_submitting());
    }

    #[test]
    fn test_image_checks() {
        let sanitizer = Sanitizer::default();

        let too_large = Draft {
            image: Some(ImageUpload {
                bytes: vec![0; IMAGE_MAX_BYTES + 1],
                ..png()
            }),
            ..draft()
        };
        let mislabelled = Draft {
            image: Some(ImageUpload {
                content_type: "image/gif".to_string(),
                ..png()
            }),
            ..draft()
        };
        let not_an_image = Draft {
            image: Some(ImageUpload {
                bytes: b"%PDF-1.7".to_vec(),
                content_type: "application/pdf".to_string(),
                ..png()
            }),
            ..draft()
        };

        assert_eq!(
            too_large.validate(&sanitizer),
            Err(ValidationError::ImageTooLarge {
                max: IMAGE_MAX_BYTES
            })
        );
        assert!(matches!(
            mislabelled.validate(&sanitizer),
            Err(ValidationError::UnsupportedImageType(_))
        ));
        assert!(matches!(
            not_an_image.validate(&sanitizer),
            Err(ValidationError::UnsupportedImageType(_))
        ));
    }

    #[test]
    fn test_plain_text_becomes_paragraphs() {
        let valid = Draft {
            content: "ilk paragraf\n\nikinci <paragraf".to_string(),
            author_name: "  ".to_string(),
            ..draft()
        }
        .validate(&Sanitizer::default())
        .unwrap();

        assert_eq!(
            valid.content_html,
            "<p>ilk paragraf</p><br><p>ikinci &lt;paragraf</p>"
        );
        assert_eq!(valid.author_name, None);
        assert_eq!(valid.category, Category::Sinema);
    }

    #[tokio::test]
    async fn test_submit_uploads_once_before_insert() {
        // Arrange
        let f = fixture(signed_in_auth().await);
        let draft = Draft {
            image: Some(png()),
            content: "<p>hello</p><script>alert(1)</script>".to_string(),
            ..draft()
        };

        // Act
        let post = f.editor.submit(draft).await.unwrap();

        // Assert
        assert_eq!(f.log.entries(), vec!["upload", "insert"]);
        let url = post.image_url.clone().unwrap();
        let path = f.storage.path_from_public_url(BUCKET, &url).unwrap();
        assert!(path.starts_with("posts/") && path.ends_with(".png"));
        let stored = f.storage.inner.get(BUCKET, &path).unwrap();
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(post.content, "<p>hello</p>");
    }

    #[tokio::test]
    async fn test_failed_upload_inserts_nothing() {
        // Arrange
        let f = fixture(signed_in_auth().await);
        f.storage.fail_uploads(true);

        // Act
        let result = f
            .editor
            .submit(Draft {
                image: Some(png()),
                ..draft()
            })
            .await;

        // Assert
        assert!(matches!(result, Err(Error::Storage(_))));
        assert_eq!(f.rows.inserts(), 0);
        assert!(!f.editor.is_submitting());
    }

    #[tokio::test]
    async fn test_second_submit_is_busy() {
        // Arrange
        let f = fixture(signed_in_auth().await);
        f.storage.slow_uploads(Duration::from_millis(100));
        let first = Draft {
            image: Some(png()),
            ..draft()
        };

        // Act
        let (first, second) =
            tokio::join!(f.editor.submit(first), f.editor.submit(draft()));

        // Assert
        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::Busy)));
        assert_eq!(f.rows.inserts(), 1);
    }

    #[tokio::test]
    async fn test_anonymous_submit_is_rejected() {
        let f = fixture(Arc::new(MemoryAuth::default()));

        let result = f.editor.submit(draft()).await;

        assert!(matches!(result, Err(Error::NotPrivileged)));
        assert_eq!(f.rows.inserts(), 0);
    }

    #[tokio::test]
    async fn test_privilege_lost_during_upload_discards_image() {
        // Arrange
        let auth = signed_in_auth().await;
        let f = fixture(auth.clone());
        f.storage.revoke_on_upload(auth);

        // Act
        let result = f
            .editor
            .submit(Draft {
                image: Some(png()),
                ..draft()
            })
            .await;

        // Assert
        assert!(matches!(result, Err(Error::NotPrivileged)));
        assert_eq!(f.log.entries(), vec!["upload", "remove"]);
        assert!(f.storage.inner.is_empty());
    }

    #[tokio::test]
    async fn test_submit_refreshes_listing() {
        // Arrange
        let f = fixture(signed_in_auth().await);
        let before = f.listing.current().generation;

        // Act
        let post = f.editor.submit(draft()).await.unwrap();

        // Assert
        let state = f.listing.settled(before + 1).await;
        let crate::listing::Phase::Ready(cards) = state.phase else {
            panic!("listing did not settle");
        };
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id, post.id);
    }
}
