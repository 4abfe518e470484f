use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;

const INDEX_PAGE: &str = include_str!("../views/index.html");
const NOT_FOUND_PAGE: &str = include_str!("../views/404.html");
const NOT_FOUND_MESSAGE: &str = "404 Not Found";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Html,
    Json,
    Text,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// Fallback for unmatched routes, shaped by the `Accept` header.
pub async fn handle_404(headers: HeaderMap) -> Response {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match preferred_format(accept) {
        Format::Html => (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response(),
        Format::Json => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": NOT_FOUND_MESSAGE })),
        )
            .into_response(),
        Format::Text => (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE).into_response(),
    }
}

/// HTML wins whenever the client accepts it, wildcards included; an absent
/// header accepts everything.
pub(crate) fn preferred_format(accept: &str) -> Format {
    let ranges: Vec<&str> = accept
        .split(',')
        .filter_map(|range| {
            let mut parts = range.split(';').map(str::trim);
            let media = parts.next().filter(|media| !media.is_empty())?;
            let rejected = parts.any(|param| {
                param
                    .strip_prefix("q=")
                    .and_then(|q| q.parse::<f32>().ok())
                    .is_some_and(|q| q == 0.0)
            });
            (!rejected).then_some(media)
        })
        .collect();

    if ranges.is_empty() {
        return Format::Html;
    }
    let accepts = |candidates: &[&str]| ranges.iter().any(|media| candidates.contains(media));

    if accepts(&["text/html", "text/*", "*/*"]) {
        Format::Html
    } else if accepts(&["application/json", "application/*"]) {
        Format::Json
    } else {
        Format::Text
    }
}
