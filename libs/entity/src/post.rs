use std::{fmt, num::ParseIntError, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;

/// Label of the "no filter" sentinel. Never a stored category.
pub const ALL_LABEL: &str = "Hepsi";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PostId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(PostId)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub category: Category,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Cover image, if one was stored. Older rows carry `""` instead of null.
    pub fn image(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Insert payload; the id is assigned by the row store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub category: Category,
    pub image_url: Option<String>,
    pub author_name: Option<String>,
    pub author_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewPost {
    pub fn into_post(self, id: PostId) -> Post {
        Post {
            id,
            title: self.title,
            content: self.content,
            category: self.category,
            image_url: self.image_url,
            author_name: self.author_name,
            author_status: self.author_status,
            created_at: self.created_at,
        }
    }
}

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Category {
    #[default]
    Sinema,
    Edebiyat,
    Mitoloji,
    Sanat,
    Felsefe,
}

/// Listing filter: the "all" sentinel or one concrete category.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    /// Every selectable filter, sentinel first.
    pub fn choices() -> Vec<CategoryFilter> {
        std::iter::once(CategoryFilter::All)
            .chain(Category::iter().map(CategoryFilter::Only))
            .collect()
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(category) => Some(*category),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, CategoryFilter::All)
    }
}

impl From<Category> for CategoryFilter {
    fn from(value: Category) -> Self {
        CategoryFilter::Only(value)
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str(ALL_LABEL),
            CategoryFilter::Only(category) => write!(f, "{category}"),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case(ALL_LABEL) || s == "HEPSİ" {
            return Ok(CategoryFilter::All);
        }

        s.parse::<Category>().map(CategoryFilter::Only)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_filter() {
        assert_eq!("Hepsi".parse(), Ok(CategoryFilter::All));
        assert_eq!("HEPSİ".parse(), Ok(CategoryFilter::All));
        assert_eq!("".parse(), Ok(CategoryFilter::All));
        assert_eq!(
            "sinema".parse(),
            Ok(CategoryFilter::Only(Category::Sinema))
        );
        assert!("Tiyatro".parse::<CategoryFilter>().is_err());
    }

    #[test]
    fn test_sentinel_is_not_a_category() {
        assert!("Hepsi".parse::<Category>().is_err());
        assert_eq!(CategoryFilter::choices().len(), 6);
        assert_eq!(CategoryFilter::choices()[0], CategoryFilter::All);
    }

    #[test]
    fn test_empty_image_url_is_absent() {
        // Arrange
        let mut post = Post {
            id: PostId(1),
            title: "T".to_string(),
            content: String::new(),
            category: Category::Sanat,
            image_url: Some("  ".to_string()),
            author_name: None,
            author_status: None,
            created_at: Utc::now(),
        };

        // Act & Assert
        assert_eq!(post.image(), None);
        post.image_url = Some("https://cdn/x.png".to_string());
        assert_eq!(post.image(), Some("https://cdn/x.png"));
    }

    #[test]
    fn test_deserialize_row() {
        let row = r#"{
            "id": 42,
            "title": "Başlık",
            "content": "<p>merhaba</p>",
            "category": "Edebiyat",
            "image_url": null,
            "created_at": "2024-05-01T10:00:00+00:00"
        }"#;

        let post = serde_json_row(row);

        assert_eq!(post.id, PostId(42));
        assert_eq!(post.category, Category::Edebiyat);
        assert_eq!(post.author_name, None);
    }

    fn serde_json_row(row: &str) -> Post {
        serde_json::from_str(row).unwrap()
    }
}
