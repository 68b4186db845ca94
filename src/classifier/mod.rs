//! HTTP client for the LLM classification service
//!
//! The service exposes `/health`, `/classify`, `/validate`, and an
//! optional `/classify/batch`. Responses are cached by subject+sender for
//! 24 hours so re-syncs do not re-bill the LLM. Batch fan-out is bounded
//! by a counting semaphore; failures are recorded per slot and never
//! abort the batch.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::JobError;

/// Parallel in-flight classification calls.
const CONCURRENT_CLASSIFICATIONS: usize = 5;

/// How long a cached verdict stays valid.
const CACHE_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

/// Entry count that triggers a prune of expired cache entries.
const CACHE_PRUNE_SIZE: usize = 1000;

/// Per-request deadline; local LLM inference can be slow.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Called after each completed item in a batch with (done, total).
pub type BatchProgress = Arc<dyn Fn(usize, usize) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRequest {
    pub email_subject: String,
    pub email_body: String,
    pub email_from: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub is_job_related: bool,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recruiter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateRequest {
    pub email_subject: String,
    pub email_body: String,
    pub email_from: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub provider: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateResponse {
    pub final_verdict: bool,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub ollama_available: bool,
    #[serde(default)]
    pub openai_available: bool,
}

#[derive(Debug, Serialize)]
struct BatchClassifyHttpRequest<'a> {
    emails: &'a [BatchEmailItem],
    #[serde(skip_serializing_if = "String::is_empty")]
    provider: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEmailItem {
    pub subject: String,
    pub body: String,
    pub from_address: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchClassifyHttpResponse {
    pub results: Vec<ClassifyResponse>,
}

/// Result slot for one email in a parallel batch.
#[derive(Debug)]
pub struct BatchClassifyResult {
    pub index: usize,
    pub response: Option<ClassifyResponse>,
    pub error: Option<JobError>,
}

struct CacheEntry {
    response: ClassifyResponse,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub enabled: bool,
}

pub struct ClassifierClient {
    base_url: String,
    http: Client,
    cache: RwLock<HashMap<String, CacheEntry>>,
    cache_enabled: bool,
    min_confidence: f64,
}

impl ClassifierClient {
    pub fn new(base_url: &str) -> Result<Self, JobError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| JobError::Other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            cache: RwLock::new(HashMap::new()),
            cache_enabled: true,
            min_confidence: 0.5,
        })
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
    }

    pub fn set_min_confidence(&mut self, threshold: f64) {
        self.min_confidence = threshold;
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    pub fn cache_stats(&self) -> CacheStats {
        let cache = self.cache.read().expect("cache lock poisoned");
        CacheStats {
            entries: cache.len(),
            enabled: self.cache_enabled,
        }
    }

    pub fn clear_cache(&self) {
        self.cache.write().expect("cache lock poisoned").clear();
    }

    /// Cache key: SHA-256 of subject and sender. Bodies are long and
    /// noisy, so they stay out of the key.
    fn cache_key(req: &ClassifyRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(req.email_subject.as_bytes());
        hasher.update(b"|");
        hasher.update(req.email_from.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn get_cached(&self, key: &str) -> Option<ClassifyResponse> {
        if !self.cache_enabled {
            return None;
        }

        let cache = self.cache.read().expect("cache lock poisoned");
        cache
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() <= CACHE_EXPIRY)
            .map(|entry| entry.response.clone())
    }

    fn set_cached(&self, key: String, response: &ClassifyResponse) {
        if !self.cache_enabled {
            return;
        }

        let mut cache = self.cache.write().expect("cache lock poisoned");
        cache.insert(
            key,
            CacheEntry {
                response: response.clone(),
                inserted_at: Instant::now(),
            },
        );

        if cache.len() > CACHE_PRUNE_SIZE {
            cache.retain(|_, entry| entry.inserted_at.elapsed() <= CACHE_EXPIRY);
        }
    }

    /// Check whether the service is up and which LLM backends it can reach.
    pub async fn health(&self) -> Result<HealthResponse, JobError> {
        let url = format!("{}/health", self.base_url);
        let resp = self.http.get(&url).send().await.map_err(|e| {
            JobError::ClassifierUnavailable(format!("cannot reach {}: {}", url, e))
        })?;

        if !resp.status().is_success() {
            return Err(JobError::ClassifierUnavailable(format!(
                "health check failed with status {}",
                resp.status()
            )));
        }

        resp.json::<HealthResponse>()
            .await
            .map_err(|e| JobError::ClassifierUnavailable(format!("bad health response: {}", e)))
    }

    pub async fn is_running(&self) -> bool {
        matches!(self.health().await, Ok(h) if h.status == "ok")
    }

    /// Like [`Self::is_running`] but with an actionable error message.
    pub async fn ensure_running(&self) -> Result<(), JobError> {
        if self.is_running().await {
            return Ok(());
        }

        Err(JobError::ClassifierUnavailable(format!(
            "classification service not running at {}\n\n\
             Start it (see classifier.host/port in your config), or run\n\
             'jobtrail sync --no-classify' to skip LLM classification",
            self.base_url
        )))
    }

    /// Classify one email, consulting the cache first.
    pub async fn classify(&self, mut req: ClassifyRequest) -> Result<ClassifyResponse, JobError> {
        let key = Self::cache_key(&req);
        if let Some(cached) = self.get_cached(&key) {
            debug!(from = %req.email_from, "classification cache hit");
            return Ok(cached);
        }

        if req.provider.is_empty() {
            req.provider = "ollama".to_string();
        }

        let url = format!("{}/classify", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| JobError::Classify(format!("request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(JobError::Classify(format!(
                "status {}: {}",
                status, body
            )));
        }

        let result: ClassifyResponse = resp
            .json()
            .await
            .map_err(|e| JobError::Classify(format!("bad response: {}", e)))?;

        self.set_cached(key, &result);
        Ok(result)
    }

    /// Try the primary provider; on any failure retry once with the
    /// fallback, if one is configured.
    pub async fn classify_with_fallback(
        &self,
        req: ClassifyRequest,
        primary: &str,
        fallback: &str,
    ) -> Result<ClassifyResponse, JobError> {
        let mut primary_req = req.clone();
        primary_req.provider = primary.to_string();

        match self.classify(primary_req).await {
            Ok(resp) => Ok(resp),
            Err(err) if !fallback.is_empty() => {
                warn!(%err, fallback, "primary classification failed, trying fallback");
                let mut fallback_req = req;
                fallback_req.provider = fallback.to_string();
                self.classify(fallback_req).await
            }
            Err(err) => Err(err),
        }
    }

    /// Second-pass structured check for medium-confidence verdicts.
    pub async fn validate(&self, mut req: ValidateRequest) -> Result<ValidateResponse, JobError> {
        if req.provider.is_empty() {
            req.provider = "ollama".to_string();
        }

        let url = format!("{}/validate", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| JobError::Validate(format!("request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(JobError::Validate(format!("status {}", resp.status())));
        }

        resp.json::<ValidateResponse>()
            .await
            .map_err(|e| JobError::Validate(format!("bad response: {}", e)))
    }

    pub async fn validate_with_fallback(
        &self,
        req: ValidateRequest,
        primary: &str,
        fallback: &str,
    ) -> Result<ValidateResponse, JobError> {
        let mut primary_req = req.clone();
        primary_req.provider = primary.to_string();

        match self.validate(primary_req).await {
            Ok(resp) => Ok(resp),
            Err(err) if !fallback.is_empty() => {
                warn!(%err, fallback, "validation failed on primary, trying fallback");
                let mut fallback_req = req;
                fallback_req.provider = fallback.to_string();
                self.validate(fallback_req).await
            }
            Err(err) => Err(err),
        }
    }

    /// One round-trip classifying several emails, when the service
    /// supports it.
    pub async fn classify_batch_api(
        &self,
        emails: &[BatchEmailItem],
        provider: &str,
    ) -> Result<BatchClassifyHttpResponse, JobError> {
        let url = format!("{}/classify/batch", self.base_url);
        let body = BatchClassifyHttpRequest {
            emails,
            provider: provider.to_string(),
        };

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| JobError::Classify(format!("batch request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(JobError::Classify(format!(
                "batch status {}",
                resp.status()
            )));
        }

        resp.json::<BatchClassifyHttpResponse>()
            .await
            .map_err(|e| JobError::Classify(format!("bad batch response: {}", e)))
    }

    /// Classify a slice in parallel, at most [`CONCURRENT_CLASSIFICATIONS`]
    /// in flight. Results come back in input order; a failed item fills
    /// its slot with an error. The progress callback may be invoked from
    /// several tasks at once.
    pub async fn classify_batch(
        &self,
        requests: Vec<ClassifyRequest>,
        primary: &str,
        fallback: &str,
        cancel: &CancellationToken,
        progress: Option<BatchProgress>,
    ) -> Vec<BatchClassifyResult> {
        let total = requests.len();
        if let Some(cb) = &progress {
            cb(0, total);
        }

        let sem = Arc::new(Semaphore::new(CONCURRENT_CLASSIFICATIONS));
        let done = AtomicUsize::new(0);

        let tasks = requests.into_iter().enumerate().map(|(index, req)| {
            let sem = Arc::clone(&sem);
            let done = &done;
            let progress = progress.clone();
            async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return BatchClassifyResult {
                            index,
                            response: None,
                            error: Some(JobError::Cancelled),
                        }
                    }
                    permit = sem.acquire() => match permit {
                        Ok(p) => p,
                        Err(_) => {
                            return BatchClassifyResult {
                                index,
                                response: None,
                                error: Some(JobError::Cancelled),
                            }
                        }
                    },
                };

                let outcome = self.classify_with_fallback(req, primary, fallback).await;

                if let Some(cb) = &progress {
                    let current = done.fetch_add(1, Ordering::SeqCst) + 1;
                    cb(current, total);
                }

                match outcome {
                    Ok(resp) => BatchClassifyResult {
                        index,
                        response: Some(resp),
                        error: None,
                    },
                    Err(err) => BatchClassifyResult {
                        index,
                        response: None,
                        error: Some(err),
                    },
                }
            }
        });

        futures::future::join_all(tasks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(subject: &str, from: &str) -> ClassifyRequest {
        ClassifyRequest {
            email_subject: subject.to_string(),
            email_body: "body".to_string(),
            email_from: from.to_string(),
            provider: String::new(),
            model: None,
        }
    }

    fn make_response(confidence: f64) -> ClassifyResponse {
        ClassifyResponse {
            is_job_related: true,
            confidence,
            company: Some("Acme".into()),
            position: None,
            recruiter_name: None,
            classification: None,
            reasoning: None,
        }
    }

    #[test]
    fn cache_key_depends_on_subject_and_sender_only() {
        let a = ClassifierClient::cache_key(&make_request("Role", "x@y.com"));
        let mut req = make_request("Role", "x@y.com");
        req.email_body = "completely different body".into();
        let b = ClassifierClient::cache_key(&req);
        assert_eq!(a, b);

        let c = ClassifierClient::cache_key(&make_request("Role", "other@y.com"));
        assert_ne!(a, c);
    }

    #[test]
    fn cache_roundtrip_and_disable() {
        let mut client = ClassifierClient::new("http://localhost:1").unwrap();
        let req = make_request("Role", "x@y.com");
        let key = ClassifierClient::cache_key(&req);

        assert!(client.get_cached(&key).is_none());
        client.set_cached(key.clone(), &make_response(0.9));
        assert!(client.get_cached(&key).is_some());
        assert_eq!(client.cache_stats().entries, 1);

        client.clear_cache();
        assert!(client.get_cached(&key).is_none());

        client.set_cache_enabled(false);
        client.set_cached(key.clone(), &make_response(0.9));
        assert!(client.get_cached(&key).is_none());
    }

    #[tokio::test]
    async fn batch_keeps_input_order_and_records_errors() {
        // Nothing listens on this port, so every request errors; the batch
        // must still return one slot per input, in order.
        let client = ClassifierClient::new("http://127.0.0.1:1").unwrap();
        let cancel = CancellationToken::new();

        let requests = (0..4)
            .map(|i| make_request(&format!("subject {i}"), "x@y.com"))
            .collect();

        let results = client
            .classify_batch(requests, "ollama", "", &cancel, None)
            .await;

        assert_eq!(results.len(), 4);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.index, i);
            assert!(r.response.is_none());
            assert!(r.error.is_some());
        }
    }

    #[tokio::test]
    async fn cancelled_batch_returns_cancellation_errors() {
        let client = ClassifierClient::new("http://127.0.0.1:1").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let results = client
            .classify_batch(vec![make_request("s", "f@g.com")], "ollama", "", &cancel, None)
            .await;

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].error, Some(JobError::Cancelled)));
    }
}
