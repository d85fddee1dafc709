use askama::Template;
use blog::{
    detail::ArticleView,
    hero::{Artwork, Banner},
    listing::{ListingState, ListingView, PostCard},
    manager::{DeleteConfirmation, ManagedPost},
};
use entity::prelude::*;

#[derive(Debug, Clone, Default)]
pub struct Nav {
    pub privileged: bool,
}

#[derive(Debug, Clone)]
pub struct CategoryLink {
    pub label: String,
    pub href: String,
    pub active: bool,
}

impl CategoryLink {
    pub fn all(active: CategoryFilter) -> Vec<Self> {
        CategoryFilter::choices()
            .into_iter()
            .map(|filter| CategoryLink {
                label: filter.to_string(),
                href: filter_href(filter),
                active: filter == active,
            })
            .collect()
    }
}

pub fn filter_href(filter: CategoryFilter) -> String {
    match filter.category() {
        Some(category) => format!("/?kategori={category}"),
        None => "/".to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct CategoryOption {
    pub label: String,
    pub selected: bool,
}

impl CategoryOption {
    /// Concrete categories only; the sentinel is never a valid choice.
    pub fn all(selected: &str) -> Vec<Self> {
        let selected = selected.parse::<Category>().ok();
        CategoryFilter::choices()
            .into_iter()
            .filter_map(|filter| filter.category())
            .map(|category| CategoryOption {
                label: category.to_string(),
                selected: Some(category) == selected,
            })
            .collect()
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub nav: Nav,
    /// Swapped in when a card image fails to load.
    pub placeholder: String,
    pub banner: Banner,
    /// Swapped in when the hero artwork fails to load.
    pub banner_fallback: String,
    pub categories: Vec<CategoryLink>,
    pub loading: bool,
    pub error: String,
    pub retry_href: String,
    pub empty_message: String,
    pub cards: Vec<PostCard>,
}

impl HomeTemplate {
    pub fn new(
        nav: Nav,
        placeholder: String,
        banner: Banner,
        state: &ListingState,
    ) -> Self {
        let mut template = Self {
            nav,
            placeholder,
            banner,
            banner_fallback: Artwork::fallback().image_url,
            categories: CategoryLink::all(state.filter),
            loading: false,
            error: String::new(),
            retry_href: filter_href(state.filter),
            empty_message: String::new(),
            cards: Vec::new(),
        };

        match state.view() {
            ListingView::Loading => template.loading = true,
            ListingView::Failed { message, retry } => {
                template.error = message;
                template.retry_href = filter_href(retry);
            }
            ListingView::Empty { message } => template.empty_message = message,
            ListingView::Cards(cards) => template.cards = cards,
        }

        template
    }
}

#[derive(Template)]
#[template(path = "article.html")]
pub struct ArticleTemplate {
    pub nav: Nav,
    pub placeholder: String,
    pub article: ArticleView,
}

#[derive(Template)]
#[template(path = "sign_in.html")]
pub struct SignInTemplate {
    pub nav: Nav,
    pub email: String,
    pub error: String,
}

#[derive(Template, Default)]
#[template(path = "editor.html")]
pub struct EditorTemplate {
    pub nav: Nav,
    pub error: String,
    pub title: String,
    pub categories: Vec<CategoryOption>,
    pub content: String,
    pub author_name: String,
    pub author_status: String,
    pub title_max: usize,
    pub image_max_mb: usize,
    pub posts: Vec<ManagedPost>,
    pub archive_error: String,
}

#[derive(Template)]
#[template(path = "confirm_delete.html")]
pub struct ConfirmDeleteTemplate {
    pub nav: Nav,
    pub confirmation: DeleteConfirmation,
}

#[derive(Template)]
#[template(path = "gate_pending.html")]
pub struct GatePendingTemplate {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "contact.html")]
pub struct ContactTemplate {
    pub nav: Nav,
    pub instagram_url: String,
    pub form_action: String,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub nav: Nav,
    pub message: String,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub nav: Nav,
    pub status: u16,
    pub message: String,
}
