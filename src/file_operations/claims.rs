//! Bearer-claim handling: decodes the external identity token and reduces
//! its group memberships to the three role booleans the gate consumes.

use super::authz::RoleSet;
use crate::config::AppConfig;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    /// Verified group memberships supplied by the identity layer.
    #[serde(default)]
    pub groups: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Maps verified group claims to the role booleans via the configured
/// group names.
pub fn roles_from_groups(groups: &[String], config: &AppConfig) -> RoleSet {
    RoleSet {
        is_reader: groups.iter().any(|g| g == &config.reader_group),
        is_uploader: groups.iter().any(|g| g == &config.uploader_group),
        is_admin: groups.iter().any(|g| g == &config.admin_group),
    }
}

pub fn roles_from_token(token: &str, config: &AppConfig) -> Option<RoleSet> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.auth_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        tracing::warn!("bearer token rejected: {e}");
    })
    .ok()?;
    Some(roles_from_groups(&token_data.claims.groups, config))
}

/// Attaches the caller's `RoleSet` to the request. A missing or invalid
/// bearer yields the empty set rather than a rejection: capability-token
/// downloads carry no bearer at all, and the gate makes the final call.
pub async fn attach_roles(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let roles = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .and_then(|t| roles_from_token(t, &state.config))
        .unwrap_or_else(RoleSet::none);

    request.extensions_mut().insert(roles);
    next.run(request).await
}
