use axum::{http::header, response::IntoResponse};

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="800" height="500" viewBox="0 0 800 500"><rect width="800" height="500" fill="#111"/><rect x="40" y="40" width="720" height="420" fill="none" stroke="#d4af37" stroke-width="2"/><text x="400" y="260" fill="#d4af37" font-family="Times New Roman, serif" font-size="36" text-anchor="middle">SANATA ATILIM</text></svg>"##;

/// Stand-in for posts without a cover and for images that fail to load.
pub(super) async fn get_placeholder() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        PLACEHOLDER_SVG,
    )
}
