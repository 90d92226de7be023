use super::errors::AppError;
use super::share_token::VerifiedToken;
use serde::Serialize;

/// Ordered roles: every role includes the permissions of the ones below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Uploader,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Uploader => "uploader",
            Role::Admin => "admin",
        }
    }
}

/// The three membership booleans derived from the caller's verified claims.
/// Derivation happens upstream; the gate only decides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoleSet {
    pub is_reader: bool,
    pub is_uploader: bool,
    pub is_admin: bool,
}

impl RoleSet {
    pub fn none() -> Self {
        Self::default()
    }

    /// Monotonic: a higher role satisfies every lower requirement.
    pub fn satisfies(&self, required: Role) -> bool {
        match required {
            Role::Reader => self.is_reader || self.is_uploader || self.is_admin,
            Role::Uploader => self.is_uploader || self.is_admin,
            Role::Admin => self.is_admin,
        }
    }

    pub fn require(&self, required: Role) -> Result<(), AppError> {
        if self.satisfies(required) {
            Ok(())
        } else {
            tracing::warn!(required = required.as_str(), "permission denied");
            Err(AppError::AccessDenied)
        }
    }
}

/// Download is the one operation a capability token can satisfy in place of
/// role membership, and only for the exact object key the token binds.
pub fn allow_download(
    roles: &RoleSet,
    token: Option<&VerifiedToken>,
    requested_key: &str,
) -> Result<(), AppError> {
    if roles.satisfies(Role::Reader) {
        return Ok(());
    }
    if let Some(token) = token {
        if token.path == requested_key {
            return Ok(());
        }
        tracing::warn!(
            bound = %token.path,
            requested = %requested_key,
            "capability token path mismatch"
        );
    }
    Err(AppError::AccessDenied)
}
