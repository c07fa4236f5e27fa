//! Request identity from `Authorization: Bearer <token>`.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use quire_core::error::Error as CoreError;
use quire_core::identity::{Identity, Moderator};

use super::AppState;
use super::error::ApiError;

/// Whoever sent the request. Missing credentials mean [`Identity::Anonymous`];
/// credentials that do not check out are rejected.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

/// A caller holding the moderator role.
#[derive(Debug, Clone)]
pub struct RequireModerator(pub Moderator);

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, CoreError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| CoreError::Unauthorized)?;
    let (scheme, token) = value.split_once(' ').ok_or(CoreError::Unauthorized)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(CoreError::Unauthorized);
    }
    Ok(Some(token))
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        Ok(Self(state.tokens.identify(token)?))
    }
}

impl FromRequestParts<AppState> for RequireModerator {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Caller(identity) = Caller::from_request_parts(parts, state).await?;
        Ok(Self(identity.require_moderator()?))
    }
}
