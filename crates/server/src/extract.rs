use std::{convert::Infallible, sync::Arc};

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
};
use serde::de::DeserializeOwned;
use shared::domain::UserId;
use tracing::debug;

use crate::{error::AppError, AppState};

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathId<T>(pub T);

/// Body of a create request. A request without a JSON content type, or with
/// an empty body, reads as `T::default()` so absent fields reach the
/// controller's missing-field check. JSON that does not fit `T` is handed
/// over as `Malformed` for the caller to report.
pub enum CreateBody<T> {
    Parsed(T),
    Malformed(serde_json::Error),
}

#[async_trait]
impl<T, S> FromRequest<S> for CreateBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let json = is_json_content_type(req.headers());
        let bytes = Bytes::from_request(req, state).await?;

        if !json || bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(CreateBody::Parsed(T::default()));
        }
        Ok(match serde_json::from_slice(&bytes) {
            Ok(value) => CreateBody::Parsed(value),
            Err(err) => CreateBody::Malformed(err),
        })
    }
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

/// The acting user, taken from a verified `Authorization: Bearer` token.
/// Requests without a valid token act anonymously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub Option<UserId>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(Actor(None));
        };
        let actor = state.tokens.verify(token);
        if actor.is_none() {
            debug!("ignoring invalid bearer token");
        }
        Ok(Actor(actor))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("Bearer"), Some(token)) => Some(token),
        _ => None,
    }
}
