//! Actor extraction from trusted gateway headers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{AuthContext, UserId};

use crate::error::ApiError;

/// Header carrying the acting user's id.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Header flagging the acting user as a moderator.
pub const MODERATOR_HEADER: &str = "x-moderator";

/// The authenticated actor of a request.
///
/// Identity is asserted by the gateway in front of the service; this
/// extractor only parses it.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub AuthContext);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        auth_from_headers(&parts.headers).map(Actor)
    }
}

fn auth_from_headers(headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    let raw = headers
        .get(ACTOR_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {ACTOR_HEADER} header")))?
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {ACTOR_HEADER} header")))?;

    let actor_id = raw
        .trim()
        .parse::<i64>()
        .map(UserId::new)
        .ok()
        .filter(UserId::is_valid)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid {ACTOR_HEADER}: {raw}")))?;

    let is_moderator = match headers.get(MODERATOR_HEADER) {
        None => false,
        Some(value) => {
            let value = value.to_str().unwrap_or_default();
            parse_flag(value)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid {MODERATOR_HEADER}: {value}")))?
        }
    };

    Ok(AuthContext {
        actor_id,
        is_moderator,
    })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}
