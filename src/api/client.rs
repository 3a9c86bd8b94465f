//! HTTP client for the Townmeet REST backend.
//!
//! Thin per-resource wrappers over `reqwest`: the feed endpoints (next
//! candidate, decisions, skip reset), event management, join requests, and
//! the profile. Every failure is classified into [`ApiError`] before it
//! leaves this module.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::config::Config;
use crate::feed::{FeedBackend, FeedFilter};
use crate::models::{
    EventCard, EventDraft, EventSummary, PendingCounts, PendingDecision, Profile, RequestAck,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting, doubled per
/// retry.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the Townmeet backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client from configuration.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests.
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection
    /// pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Check if a response is successful, classifying it with the body
    /// otherwise.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying rate-limited responses with exponential
    /// backoff. The builder closure is invoked once per attempt.
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().send().await?;
            if response.status().as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::Server(
                        "Rate limited - please wait before retrying".to_string(),
                    ));
                }
                warn!(retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }
            return Self::check_response(response).await;
        }
    }

    async fn parse_json<T: DeserializeOwned>(
        response: reqwest::Response,
        path: &str,
    ) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::Unknown(format!("Invalid response from {}: {}", path, e)))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self
            .send_with_retry(|| self.request(Method::GET, path).query(query))
            .await?;
        Self::parse_json(response, path).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .send_with_retry(|| self.request(Method::POST, path).json(body))
            .await?;
        Self::parse_json(response, path).await
    }

    async fn post_empty<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        self.send_with_retry(|| self.request(Method::POST, path).json(body))
            .await?;
        Ok(())
    }

    // ===== Feed =====

    fn feed_query(filter: &FeedFilter) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if filter.enabled {
            if let Some(ref town) = filter.town_id {
                query.push(("townId", town.clone()));
            }
            if let Some(day) = filter.from_day {
                query.push(("fromDay", day.to_string()));
            }
            if let Some(day) = filter.to_day {
                query.push(("toDay", day.to_string()));
            }
        }
        query
    }

    /// Next feed candidate. The backend answers 404 when no event matches,
    /// which surfaces as [`ApiError::NotFound`] and means exhaustion.
    pub async fn fetch_next_candidate(&self, filter: &FeedFilter) -> Result<EventCard, ApiError> {
        self.get("/feed/next", &Self::feed_query(filter)).await
    }

    /// Record a swipe decision.
    pub async fn post_decision(&self, decision: &PendingDecision) -> Result<(), ApiError> {
        self.post_empty("/feed/decisions", decision).await
    }

    /// Forget recorded skips within the filter scope.
    pub async fn post_reset_skips(&self, filter: &FeedFilter) -> Result<(), ApiError> {
        let body = serde_json::json!({ "townId": filter.town_id });
        self.post_empty("/feed/skips/reset", &body).await
    }

    // ===== Events =====

    pub async fn fetch_my_events(&self) -> Result<Vec<EventSummary>, ApiError> {
        self.get("/events/mine", &[]).await
    }

    pub async fn create_event(&self, draft: &EventDraft) -> Result<EventSummary, ApiError> {
        self.post_json("/events", draft).await
    }

    pub async fn update_event(
        &self,
        event_id: i64,
        draft: &EventDraft,
    ) -> Result<EventSummary, ApiError> {
        let path = format!("/events/{}", event_id);
        let response = self
            .send_with_retry(|| self.request(Method::PATCH, &path).json(draft))
            .await?;
        Self::parse_json(response, &path).await
    }

    pub async fn cancel_event(&self, event_id: i64) -> Result<(), ApiError> {
        let path = format!("/events/{}", event_id);
        self.send_with_retry(|| self.request(Method::DELETE, &path))
            .await?;
        Ok(())
    }

    // ===== Join requests =====

    /// Pending join-request counts for all of the user's events, as one
    /// aggregate.
    pub async fn fetch_pending_counts(&self) -> Result<PendingCounts, ApiError> {
        self.get("/events/requests/pending", &[]).await
    }

    /// Accept or decline a join request. The ack carries the confirmed
    /// pending count for the event, which cross-view patches are derived
    /// from.
    pub async fn respond_to_request(
        &self,
        event_id: i64,
        user_id: i64,
        accept: bool,
    ) -> Result<RequestAck, ApiError> {
        let path = format!("/events/{}/requests/{}/respond", event_id, user_id);
        let body = serde_json::json!({ "accept": accept });
        self.post_json(&path, &body).await
    }

    // ===== Profile =====

    pub async fn fetch_profile(&self) -> Result<Profile, ApiError> {
        self.get("/profile", &[]).await
    }

    pub async fn update_profile(&self, profile: &Profile) -> Result<Profile, ApiError> {
        let response = self
            .send_with_retry(|| self.request(Method::PUT, "/profile").json(profile))
            .await?;
        Self::parse_json(response, "/profile").await
    }
}

#[async_trait]
impl FeedBackend for ApiClient {
    async fn next_candidate(&self, filter: &FeedFilter) -> Result<EventCard, ApiError> {
        self.fetch_next_candidate(filter).await
    }

    async fn record_decision(&self, decision: &PendingDecision) -> Result<(), ApiError> {
        self.post_decision(decision).await
    }

    async fn reset_skips(&self, filter: &FeedFilter) -> Result<(), ApiError> {
        self.post_reset_skips(filter).await
    }
}
