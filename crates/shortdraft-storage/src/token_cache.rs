//! Bearer tokens for the Drive client.
//!
//! A video upload can outlive a token, so tokens are swapped out a minute
//! before they lapse. Only one task talks to the service-account provider
//! at a time; the rest wait on the lock and reuse what it fetched.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// OAuth scope for full Drive access.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

const RENEW_BEFORE_EXPIRY: Duration = Duration::from_secs(60);

/// Lifetime used when the provider's expiry cannot be converted.
const FALLBACK_LIFETIME: Duration = Duration::from_secs(50 * 60);

/// Supplies bearer tokens to the Drive client.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> StorageResult<String>;

    /// Forget the held token, e.g. after Drive answered 401.
    async fn invalidate(&self);
}

#[derive(Clone)]
struct HeldToken {
    value: String,
    expires: Instant,
}

impl HeldToken {
    fn needs_renewal(&self, now: Instant) -> bool {
        now + RENEW_BEFORE_EXPIRY >= self.expires
    }

    fn expired(&self, now: Instant) -> bool {
        now >= self.expires
    }
}

/// Remaining lifetime of a token expiring at `expires_at`.
fn lifetime(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    if expires_at <= now {
        return Duration::ZERO;
    }
    (expires_at - now).to_std().unwrap_or(FALLBACK_LIFETIME)
}

/// Token source backed by a service account.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    held: RwLock<Option<HeldToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            held: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> Result<HeldToken, gcp_auth::Error> {
        let token = self.provider.token(&[DRIVE_SCOPE]).await?;
        let expires = Instant::now() + lifetime(token.expires_at(), Utc::now());
        Ok(HeldToken {
            value: token.as_str().to_string(),
            expires,
        })
    }
}

#[async_trait]
impl AccessTokenSource for TokenCache {
    async fn access_token(&self) -> StorageResult<String> {
        if let Some(held) = &*self.held.read().await {
            if !held.needs_renewal(Instant::now()) {
                return Ok(held.value.clone());
            }
        }

        let mut held = self.held.write().await;
        let now = Instant::now();
        if let Some(current) = (*held).as_ref().filter(|t| !t.needs_renewal(now)) {
            return Ok(current.value.clone());
        }

        match self.fetch().await {
            Ok(fresh) => {
                debug!("Obtained new Drive access token");
                let value = fresh.value.clone();
                *held = Some(fresh);
                Ok(value)
            }
            // A provider hiccup is tolerable while the old token still works
            Err(e) => match (*held).as_ref().filter(|t| !t.expired(now)) {
                Some(current) => {
                    warn!(error = %e, "Drive token renewal failed, keeping the current token");
                    Ok(current.value.clone())
                }
                None => Err(StorageError::auth_error(format!("service account token: {}", e))),
            },
        }
    }

    async fn invalidate(&self) {
        self.held.write().await.take();
    }
}
