//! Hosted-service backend over its REST dialect
//!
//! Wire shapes:
//! - Auth: POST {base}/auth/v1/token?grant_type=password
//! - Rows: {base}/rest/v1/locations with `apikey` + bearer headers,
//!   `Prefer: return=representation` on insert
//! - Tier: {base}/rest/v1/profiles?select=subscription_status
//!
//! The hosted realtime channel is not consumed directly; the live feed
//! is realized as an interval poll that emits insert events for row
//! ids not seen before. That delivery is at-least-once and unordered
//! relative to any bulk fetch, which is all the feed contract promises.

use crate::domain::errors::Error;
use crate::domain::types::{
    Identity, LocationId, NewSharedLocation, SharedLocation, SubscriptionTier, UserId,
};
use crate::infra::config::Config;
use crate::io::backend::{
    FeedEvent, FeedHandle, IdentityProvider, LiveFeed, LocationRepository, TierOracle,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

const FEED_CHANNEL_CAPACITY: usize = 64;

const LOCATIONS_PATH: &str = "/rest/v1/locations";
const PROFILES_PATH: &str = "/rest/v1/profiles";
const TOKEN_PATH: &str = "/auth/v1/token";

#[derive(Debug, Clone)]
struct Session {
    identity: Identity,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    subscription_status: String,
}

struct RestInner {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
    feed_poll_interval: Duration,
    session: RwLock<Option<Session>>,
    tier: RwLock<Option<SubscriptionTier>>,
}

/// Cheap-to-clone handle to the hosted service
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestInner>,
}

impl RestBackend {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        // One client for connection pooling across all requests
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms()))
            .build()?;

        Ok(Self {
            inner: Arc::new(RestInner {
                base_url: config.backend_url().trim_end_matches('/').to_string(),
                api_key: config.backend_api_key().to_string(),
                http,
                feed_poll_interval: Duration::from_millis(config.feed_poll_interval_ms()),
                session: RwLock::new(None),
                tier: RwLock::new(None),
            }),
        })
    }

    /// Exchange email/password for a session and cache the identity
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, Error> {
        let url = format!("{}{}?grant_type=password", self.inner.base_url, TOKEN_PATH);
        let response = self
            .inner
            .http
            .post(&url)
            .header("apikey", &self.inner.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST
            || response.status() == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(Error::Unauthenticated);
        }
        if !response.status().is_success() {
            return Err(Error::Persistence(format!("sign-in failed: {}", response.status())));
        }

        let token: TokenResponse =
            response.json().await.map_err(|e| Error::Persistence(e.to_string()))?;

        let identity = Identity { id: UserId(token.user.id), email: token.user.email };
        info!(user_id = %identity.id, "signed_in");
        *self.inner.session.write() =
            Some(Session { identity: identity.clone(), access_token: token.access_token });
        Ok(identity)
    }

    /// Drop the cached session and tier
    pub fn sign_out(&self) {
        *self.inner.session.write() = None;
        *self.inner.tier.write() = None;
        info!("signed_out");
    }

    /// Re-read the caller's subscription tier from their profile row
    /// and cache it for synchronous oracle reads
    pub async fn refresh_tier(&self) -> Result<SubscriptionTier, Error> {
        let session = self.inner.session.read().clone().ok_or(Error::Unauthenticated)?;

        let url = format!(
            "{}{}?select=subscription_status&id=eq.{}",
            self.inner.base_url, PROFILES_PATH, session.identity.id
        );
        let rows: Vec<ProfileRow> = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Persistence(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;

        // Missing profile row reads as free, the strict default
        let tier = rows
            .first()
            .map(|row| row.subscription_status.parse().unwrap_or(SubscriptionTier::Free))
            .unwrap_or(SubscriptionTier::Free);

        debug!(tier = tier.as_str(), "tier_refreshed");
        *self.inner.tier.write() = Some(tier);
        Ok(tier)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.inner.http.request(method, url).header("apikey", &self.inner.api_key);
        if let Some(session) = self.inner.session.read().as_ref() {
            builder = builder.bearer_auth(&session.access_token);
        }
        builder
    }

    async fn fetch_rows(inner: &RestInner) -> Result<Vec<SharedLocation>, Error> {
        let url = format!(
            "{}{}?select=*&order=shared_at.desc",
            inner.base_url, LOCATIONS_PATH
        );
        let mut builder = inner.http.get(&url).header("apikey", &inner.api_key);
        if let Some(session) = inner.session.read().as_ref() {
            builder = builder.bearer_auth(&session.access_token);
        }
        builder
            .send()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Persistence(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))
    }
}

#[async_trait]
impl LocationRepository for RestBackend {
    async fn insert(&self, row: NewSharedLocation) -> Result<SharedLocation, Error> {
        let url = format!("{}{}", self.inner.base_url, LOCATIONS_PATH);
        let response = self
            .request(reqwest::Method::POST, &url)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Persistence(format!("insert failed: {}", response.status())));
        }

        // return=representation yields the inserted rows as an array
        let mut rows: Vec<SharedLocation> =
            response.json().await.map_err(|e| Error::Persistence(e.to_string()))?;
        rows.pop().ok_or_else(|| Error::Persistence("insert returned no rows".to_string()))
    }

    async fn fetch_all_newest_first(&self) -> Result<Vec<SharedLocation>, Error> {
        Self::fetch_rows(&self.inner).await
    }
}

#[async_trait]
impl LiveFeed for RestBackend {
    async fn subscribe(&self) -> Result<FeedHandle, Error> {
        // Baseline snapshot so only rows inserted after this point are
        // emitted. Subscribers bulk-fetch after subscribing, so rows
        // landing between baseline and their fetch are covered there.
        let baseline = Self::fetch_rows(&self.inner)
            .await
            .map_err(|e| Error::Feed(e.to_string()))?;
        let mut seen: FxHashSet<LocationId> =
            baseline.into_iter().map(|row| row.id).collect();

        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let mut poll = interval(inner.feed_poll_interval);
            loop {
                poll.tick().await;
                let rows = match Self::fetch_rows(&inner).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!(error = %e, "feed_poll_failed");
                        continue;
                    }
                };

                // Oldest unseen first so prepend ordering matches
                // insertion order
                for row in rows.into_iter().rev() {
                    if !seen.insert(row.id.clone()) {
                        continue;
                    }
                    if tx.send(FeedEvent::Inserted(row)).await.is_err() {
                        // Handle dropped; subscription is over
                        return;
                    }
                }
            }
        });

        Ok(FeedHandle::new(rx))
    }
}

impl IdentityProvider for RestBackend {
    fn current_identity(&self) -> Option<Identity> {
        self.inner.session.read().as_ref().map(|s| s.identity.clone())
    }
}

impl TierOracle for RestBackend {
    fn current_tier(&self) -> Option<SubscriptionTier> {
        *self.inner.tier.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_shape() {
        let json = r#"{
            "access_token": "jwt-here",
            "token_type": "bearer",
            "user": { "id": "u-1", "email": "a@b.is", "role": "authenticated" }
        }"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "jwt-here");
        assert_eq!(token.user.id, "u-1");
        assert_eq!(token.user.email.as_deref(), Some("a@b.is"));
    }

    #[test]
    fn test_profile_row_shape() {
        let json = r#"[{ "subscription_status": "premium" }]"#;
        let rows: Vec<ProfileRow> = serde_json::from_str(json).unwrap();
        assert_eq!(
            rows[0].subscription_status.parse::<SubscriptionTier>().unwrap(),
            SubscriptionTier::Premium
        );
    }

    #[tokio::test]
    async fn test_unauthenticated_without_session() {
        let backend = RestBackend::new(&Config::default()).unwrap();
        assert!(backend.current_identity().is_none());
        assert!(backend.current_tier().is_none());
        match backend.refresh_tier().await {
            Err(Error::Unauthenticated) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
