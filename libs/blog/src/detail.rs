use std::{fmt, sync::Arc};

use entity::prelude::*;
use repository::{post::RowStore, RepositoryError};
use tracing::{error, info};

use crate::{sanitize::Sanitizer, text::format_date, Error};

pub const DEFAULT_AUTHOR: &str = "Topluluk Yazarı";
pub const DEFAULT_AUTHOR_STATUS: &str = "Misafir Kalem";
pub const NOT_FOUND_MESSAGE: &str =
    "Aradığınız yazı rafta bulunamadı. Kaldırılmış ya da hiç yazılmamış olabilir.";

/// A post ready to render. `content_html` has been sanitized.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleView {
    pub id: PostId,
    pub title: String,
    pub category: Category,
    pub date: String,
    pub image_url: String,
    pub author_name: String,
    pub author_status: String,
    pub content_html: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailView {
    NotFound { message: String },
    Failed { message: String },
    Ready(ArticleView),
}

pub struct DetailViewer {
    rows: Arc<dyn RowStore>,
    sanitizer: Sanitizer,
    placeholder: String,
}

impl fmt::Debug for DetailViewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetailViewer")
            .field("placeholder", &self.placeholder)
            .finish_non_exhaustive()
    }
}

impl DetailViewer {
    pub fn new(
        rows: Arc<dyn RowStore>,
        sanitizer: Sanitizer,
        placeholder: &str,
    ) -> Self {
        Self {
            rows,
            sanitizer,
            placeholder: placeholder.to_string(),
        }
    }

    /// Loads one post by the id segment of its route.
    pub async fn open(&self, raw_id: &str) -> DetailView {
        let Ok(id) = raw_id.parse::<PostId>() else {
            info!(task = "open post", id = raw_id, "unparsable id");
            return not_found();
        };

        match self.rows.get_by_id(id).await {
            Ok(post) => DetailView::Ready(self.article(post)),
            Err(RepositoryError::NotFound) => not_found(),
            Err(e) => {
                error!(task = "open post", id = %id, error = e.to_string());
                DetailView::Failed {
                    message: Error::from(e).to_string(),
                }
            }
        }
    }

    fn article(&self, post: PostEntity) -> ArticleView {
        let image_url = post.image().unwrap_or(&self.placeholder).to_string();

        ArticleView {
            id: post.id,
            category: post.category,
            date: format_date(post.created_at),
            image_url,
            author_name: non_empty(post.author_name, DEFAULT_AUTHOR),
            author_status: non_empty(post.author_status, DEFAULT_AUTHOR_STATUS),
            content_html: self.sanitizer.sanitize(&post.content),
            title: post.title,
        }
    }
}

fn not_found() -> DetailView {
    DetailView::NotFound {
        message: NOT_FOUND_MESSAGE.to_string(),
    }
}

fn non_empty(value: Option<String>, default: &str) -> String {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}
