use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{Caller, Role, UserId};
use super::error::LifecycleError;

/// What the authentication collaborator knows about a bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
    pub is_active: bool,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Identity, IdentityError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("credential is invalid or expired")]
    Invalid,
    #[error("account revoked")]
    Revoked,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Turn an optional `Authorization` header into a caller.
///
/// No header means an anonymous request. A header that does not resolve to an
/// active account is `Unauthenticated`, never silently anonymous.
pub async fn authenticate<P>(
    provider: &P,
    authorization: Option<&str>,
) -> Result<Option<Caller>, LifecycleError>
where
    P: IdentityProvider + ?Sized,
{
    let Some(header) = authorization else {
        return Ok(None);
    };

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(LifecycleError::Unauthenticated)?;

    let identity = provider.resolve(token).await?;
    if !identity.is_active {
        return Err(LifecycleError::Unauthenticated);
    }

    Ok(Some(Caller::new(identity.user_id, identity.role)))
}

/// Like [`authenticate`] but for operations that need a caller.
pub async fn require_caller<P>(
    provider: &P,
    authorization: Option<&str>,
) -> Result<Caller, LifecycleError>
where
    P: IdentityProvider + ?Sized,
{
    authenticate(provider, authorization)
        .await?
        .ok_or(LifecycleError::Unauthenticated)
}
