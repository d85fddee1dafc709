use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use entity::prelude::*;
use repository::post::{PostQuery, RowStore};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info};

use crate::{
    text::{format_date, preview},
    Error,
};

pub const PREVIEW_CHARS: usize = 120;

pub const EMPTY_MESSAGE: &str = "Bu rafta henüz bir yazı yok...";

#[derive(Debug, Clone, PartialEq)]
pub enum Phase<T> {
    Loading,
    Failed(String),
    Ready(T),
}

impl<T> Phase<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::Loading)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostCard {
    pub id: PostId,
    pub title: String,
    pub category: Category,
    pub date: String,
    pub preview: String,
    pub image_url: String,
    pub href: String,
}

impl PostCard {
    pub fn from_post(post: &PostEntity, placeholder: &str) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            category: post.category,
            date: format_date(post.created_at),
            preview: preview(&post.content, PREVIEW_CHARS),
            image_url: post.image().unwrap_or(placeholder).to_string(),
            href: format!("/yazi/{}", post.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingState {
    pub filter: CategoryFilter,
    /// Bumped on every selection; only the newest generation may settle.
    pub generation: u64,
    pub phase: Phase<Vec<PostCard>>,
}

/// What the listing area renders.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingView {
    Loading,
    Failed {
        message: String,
        retry: CategoryFilter,
    },
    Empty {
        message: String,
    },
    Cards(Vec<PostCard>),
}

impl ListingState {
    pub fn view(&self) -> ListingView {
        match &self.phase {
            Phase::Loading => ListingView::Loading,
            Phase::Failed(message) => ListingView::Failed {
                message: message.clone(),
                retry: self.filter,
            },
            Phase::Ready(cards) if cards.is_empty() => ListingView::Empty {
                message: empty_message(self.filter),
            },
            Phase::Ready(cards) => ListingView::Cards(cards.clone()),
        }
    }
}

pub fn empty_message(filter: CategoryFilter) -> String {
    match filter {
        CategoryFilter::All => EMPTY_MESSAGE.to_string(),
        CategoryFilter::Only(category) => format!(
            "{EMPTY_MESSAGE} (\"{category}\" kategorisinde yazı bulunamadı)"
        ),
    }
}

/// Category-filtered post listing with last-request-wins settling.
pub struct ListingEngine {
    rows: Arc<dyn RowStore>,
    placeholder: String,
    state: Arc<watch::Sender<ListingState>>,
    inflight: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for ListingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingEngine")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl ListingEngine {
    pub fn new(rows: Arc<dyn RowStore>, placeholder: &str) -> Self {
        let (state, _) = watch::channel(ListingState {
            filter: CategoryFilter::All,
            generation: 0,
            phase: Phase::Loading,
        });

        Self {
            rows,
            placeholder: placeholder.to_string(),
            state: Arc::new(state),
            inflight: Mutex::new(None),
        }
    }

    pub fn current(&self) -> ListingState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListingState> {
        self.state.subscribe()
    }

    /// Starts a fetch for `filter` and returns its generation. Any fetch
    /// still running for an older selection is aborted and can no longer
    /// touch the state.
    pub fn select(&self, filter: CategoryFilter) -> u64 {
        let mut inflight =
            self.inflight.lock().unwrap_or_else(PoisonError::into_inner);

        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.filter = filter;
            state.phase = Phase::Loading;
            generation = state.generation;
        });

        if let Some(previous) = inflight.take() {
            previous.abort();
        }

        let rows = self.rows.clone();
        let state = self.state.clone();
        let placeholder = self.placeholder.clone();
        *inflight = Some(tokio::spawn(async move {
            let phase = match rows.query(PostQuery::new(filter)).await {
                Ok(posts) => Phase::Ready(
                    posts
                        .iter()
                        .map(|post| PostCard::from_post(post, &placeholder))
                        .collect(),
                ),
                Err(e) => {
                    error!(
                        task = "fetch posts",
                        filter = %filter,
                        error = e.to_string()
                    );
                    Phase::Failed(Error::from(e).to_string())
                }
            };

            let applied = state.send_if_modified(|current| {
                if current.generation != generation {
                    return false;
                }
                current.phase = phase;
                true
            });
            if !applied {
                info!(
                    task = "fetch posts",
                    generation,
                    "superseded result dropped"
                );
            }
        }));

        generation
    }

    /// Fetches the current selection again (retry, or after a write).
    pub fn refresh(&self) -> u64 {
        let filter = self.state.borrow().filter;
        self.select(filter)
    }

    /// Aborts the fetch in flight, if any. Its result is never applied.
    pub fn abort(&self) {
        let inflight = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = inflight {
            handle.abort();
        }
    }

    /// Waits until the selection made at `generation`, or a newer one, has
    /// settled.
    pub async fn settled(&self, generation: u64) -> ListingState {
        let mut rx = self.state.subscribe();
        let result = rx
            .wait_for(|state| {
                state.generation >= generation && !state.phase.is_loading()
            })
            .await
            .map(|state| state.clone());

        match result {
            Ok(state) => state,
            Err(_) => self.current(),
        }
    }
}
