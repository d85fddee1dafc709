use axum::{
    extract::{Query, State},
    response::Response,
};
use entity::prelude::*;
use serde::Deserialize;
use tracing::warn;

use crate::{
    response::render,
    templates::{HomeTemplate, Nav},
    WebState,
};

#[derive(Deserialize)]
pub struct HomeParam {
    kategori: Option<String>,
}

/// Landing page: hero banner plus the listing for `?kategori=`.
pub(super) async fn get_home(
    State(state): State<WebState>,
    nav: Nav,
    Query(param): Query<HomeParam>,
) -> Response {
    let filter = match param
        .kategori
        .as_deref()
        .unwrap_or_default()
        .parse::<CategoryFilter>()
    {
        Ok(filter) => filter,
        Err(e) => {
            warn!(task = "parse category", error = e.to_string());
            CategoryFilter::All
        }
    };

    let listing = state.shell.listing();
    let generation = listing.select(filter);
    let (listing, banner) =
        tokio::join!(listing.settled(generation), state.shell.hero().banner());

    let placeholder = state.shell.config().placeholder_image.clone();
    render(HomeTemplate::new(nav, placeholder, banner, &listing))
}
