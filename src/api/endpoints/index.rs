//! Upload page, embedded at compile time.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../../assets/index.html");

/// `GET /`: static upload page.
pub async fn page() -> Html<&'static str> {
    Html(INDEX_HTML)
}
