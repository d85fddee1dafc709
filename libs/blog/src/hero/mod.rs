//! Landing banner: a random painting and a quote, each with a fixed fallback.
//! Nothing here ever fails from the caller's point of view.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::{info, warn};

pub use self::{
    client::{MetMuseum, Quotable},
    response::ArtObject,
};

mod client;
mod response;

/// One first try plus five retries.
pub const MAX_ATTEMPTS: usize = 6;

/// Longest the landing page waits for either half of the banner.
pub const BANNER_DEADLINE: Duration = Duration::from_secs(3);

pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

const FALLBACK_QUOTES: [(&str, &str); 3] = [
    (
        "Art is the lie that enables us to realize the truth.",
        "Pablo Picasso",
    ),
    ("Creativity takes courage.", "Henri Matisse"),
    ("Every artist was first an amateur.", "Ralph Waldo Emerson"),
];

#[derive(Debug, thiserror::Error)]
pub enum HeroError {
    #[error("in reqwest crate: {}: {}", message, source)]
    Request {
        message: String,
        source: reqwest::Error,
    },

    #[error("unsuccessful status code {status}")]
    Status { status: u16 },

    #[error("search returned no objects")]
    EmptySearch,

    #[error("object {id} has no image")]
    NoImage { id: u64 },

    #[error("empty quote")]
    EmptyQuote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artwork {
    pub image_url: String,
    pub title: String,
    pub artist: String,
}

impl Artwork {
    pub fn fallback() -> Self {
        Self {
            image_url: "https://upload.wikimedia.org/wikipedia/commons/8/8c/David_-_The_Death_of_Socrates.jpg".to_string(),
            title: "The Death of Socrates".to_string(),
            artist: "Jacques-Louis David".to_string(),
        }
    }

    fn from_object(object: &ArtObject) -> Option<Self> {
        let image_url = object.image()?.to_string();

        Some(Self {
            image_url,
            title: or_default(&object.title, UNTITLED),
            artist: or_default(&object.artist_display_name, UNKNOWN_ARTIST),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub content: String,
    pub author: String,
}

impl Quote {
    pub fn fallbacks() -> Vec<Quote> {
        FALLBACK_QUOTES
            .iter()
            .map(|(content, author)| Quote {
                content: content.to_string(),
                author: author.to_string(),
            })
            .collect()
    }

    pub fn fallback() -> Quote {
        let (content, author) =
            pick(&FALLBACK_QUOTES).unwrap_or(FALLBACK_QUOTES[0]);
        Quote {
            content: content.to_string(),
            author: author.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub artwork: Artwork,
    pub quote: Quote,
}

#[async_trait]
pub trait ArtSource: Send + Sync {
    /// Candidate object ids.
    async fn search(&self) -> Result<Vec<u64>, HeroError>;

    async fn object(&self, id: u64) -> Result<ArtObject, HeroError>;
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn random(&self) -> Result<Quote, HeroError>;
}

pub struct Hero {
    art: Option<Arc<dyn ArtSource>>,
    quotes: Option<Arc<dyn QuoteSource>>,
    deadline: Duration,
}

impl fmt::Debug for Hero {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hero")
            .field("online", &self.art.is_some())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl Hero {
    pub fn new(art: Arc<dyn ArtSource>, quotes: Arc<dyn QuoteSource>) -> Self {
        Self {
            art: Some(art),
            quotes: Some(quotes),
            deadline: BANNER_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Always shows the fallbacks; used when the hero is disabled.
    pub fn offline() -> Self {
        Self {
            art: None,
            quotes: None,
            deadline: BANNER_DEADLINE,
        }
    }

    /// Artwork and quote fetched side by side; whichever misses the
    /// deadline is replaced by its fallback.
    pub async fn banner(&self) -> Banner {
        let artwork = async {
            tokio::time::timeout(self.deadline, self.artwork())
                .await
                .unwrap_or_else(|_| {
                    warn!(task = "fetch artwork", "deadline passed");
                    Artwork::fallback()
                })
        };
        let quote = async {
            tokio::time::timeout(self.deadline, self.quote())
                .await
                .unwrap_or_else(|_| {
                    warn!(task = "fetch quote", "deadline passed");
                    Quote::fallback()
                })
        };

        let (artwork, quote) = tokio::join!(artwork, quote);
        Banner { artwork, quote }
    }

    pub async fn artwork(&self) -> Artwork {
        let Some(art) = &self.art else {
            return Artwork::fallback();
        };

        for attempt in 1..=MAX_ATTEMPTS {
            match try_artwork(art.as_ref()).await {
                Ok(artwork) => {
                    info!(
                        task = "fetch artwork",
                        attempt,
                        title = artwork.title.as_str()
                    );
                    return artwork;
                }
                Err(e) => {
                    warn!(
                        task = "fetch artwork",
                        attempt,
                        error = e.to_string()
                    );
                }
            }
        }

        Artwork::fallback()
    }

    pub async fn quote(&self) -> Quote {
        let Some(quotes) = &self.quotes else {
            return Quote::fallback();
        };

        for attempt in 1..=MAX_ATTEMPTS {
            match quotes.random().await {
                Ok(quote) if !quote.content.trim().is_empty() => return quote,
                Ok(_) => {
                    warn!(
                        task = "fetch quote",
                        attempt,
                        error = HeroError::EmptyQuote.to_string()
                    );
                }
                Err(e) => {
                    warn!(task = "fetch quote", attempt, error = e.to_string());
                }
            }
        }

        Quote::fallback()
    }
}

async fn try_artwork(art: &dyn ArtSource) -> Result<Artwork, HeroError> {
    let ids = art.search().await?;
    let id = pick(&ids).ok_or(HeroError::EmptySearch)?;
    let object = art.object(id).await?;

    Artwork::from_object(&object).ok_or(HeroError::NoImage { id })
}

/// Kept synchronous so the thread-local rng never lives across an await.
fn pick<T: Copy>(items: &[T]) -> Option<T> {
    items.choose(&mut rand::thread_rng()).copied()
}

fn or_default(value: &str, default: &str) -> String {
    match value.trim() {
        "" => default.to_string(),
        value => value.to_string(),
    }
}
