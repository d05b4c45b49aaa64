//! LLM classification client: guardrails, model-fallback chain, and the
//! actual chat-completion call (SPEC_FULL.md §4.9).

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vestnik_common::types::DecisionCode;

use crate::budget::{BudgetGuard, UsageLedger};
use crate::circuit_breaker::CircuitBreaker;
use crate::parse::{parse_classification, response_schema};
use crate::prompt::{system_message, user_message};
use crate::throttle::CycleThrottle;
use crate::types::{Classification, ClassificationRequest, UsageEntry};

const RETRY_BACKOFF_SECONDS: [u64; 5] = [2, 5, 10, 20, 40];

/// Per-million-token pricing for a model, used to turn token counts into an
/// approximate cost figure for the usage ledger.
#[derive(Debug, Clone)]
pub struct ModelPricing {
    pub model: String,
    pub prompt_cost_per_1k: f64,
    pub completion_cost_per_1k: f64,
}

#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub primary_model: ModelPricing,
    pub fallback_models: Vec<ModelPricing>,
    pub request_timeout: StdDuration,
    pub max_tokens: u32,
    pub daily_budget: f64,
    pub timezone: Tz,
}

pub struct LlmClient {
    config: LlmClientConfig,
    http: reqwest::Client,
    circuit_breaker: CircuitBreaker,
    throttle: CycleThrottle,
    ledger: UsageLedger,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaWrapper,
}

#[derive(Debug, Serialize)]
struct JsonSchemaWrapper {
    name: &'static str,
    schema: serde_json::Value,
}

fn response_format() -> ResponseFormat {
    ResponseFormat {
        kind: "json_schema",
        json_schema: JsonSchemaWrapper {
            name: "classification",
            schema: response_schema(),
        },
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl LlmClient {
    /// `throttle` is taken from the operator-tunable `Settings.llm_throttle`
    /// tree (loaded once at startup) rather than hardcoded, so an override
    /// applied through `vestnik_store::config_overrides` takes effect on the
    /// next orchestrator restart.
    pub fn new(config: LlmClientConfig, throttle: vestnik_common::LlmThrottleConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            circuit_breaker: CircuitBreaker::new(),
            throttle: CycleThrottle::new(throttle),
            ledger: UsageLedger::new(),
        }
    }

    pub fn reset_cycle(&mut self) {
        self.throttle.reset_cycle();
    }

    pub fn usage_ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Current circuit state, for the health endpoint (SPEC_FULL.md §6).
    pub fn circuit_open(&self, now: DateTime<Utc>) -> bool {
        self.circuit_breaker.is_open(now)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .expect("api key must be a valid header value"),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// Classifies one item. Returns `(parsed, raw_content, error_code)` per
    /// the documented contract — at most one of `parsed`/`error_code` is
    /// `Some` on return.
    pub async fn classify(
        &mut self,
        request: &ClassificationRequest<'_>,
    ) -> (Option<Classification>, Option<String>, Option<DecisionCode>) {
        let now = Utc::now();

        let guard = BudgetGuard {
            daily_limit: self.config.daily_budget,
        };
        if !guard.within_budget(&self.ledger, now, self.config.timezone) {
            return (None, None, Some(DecisionCode::BudgetExceeded));
        }

        if !self.circuit_breaker.allow_call(now) {
            return (None, None, Some(DecisionCode::CircuitOpen));
        }

        if self.throttle.exhausted() {
            return (None, None, Some(DecisionCode::LlmRateLimit));
        }

        let models = std::iter::once(self.config.primary_model.clone())
            .chain(self.config.fallback_models.iter().cloned());

        for pricing in models {
            if !self.throttle.can_call(Utc::now()) {
                return (None, None, Some(DecisionCode::LlmRateLimit));
            }

            match self.call_model(&pricing, request).await {
                ModelOutcome::Classified(classification, raw) => {
                    self.circuit_breaker.record_success();
                    self.throttle.record_success();
                    return (Some(classification), Some(raw), None);
                }
                ModelOutcome::RateLimited => {
                    self.circuit_breaker.record_error(Utc::now());
                    self.throttle.record_429();
                    let streak = self.throttle.consecutive_429() as usize;
                    let idx = streak.saturating_sub(1).min(RETRY_BACKOFF_SECONDS.len() - 1);
                    let jitter = rand::thread_rng().gen_range(0.5..1.5);
                    let delay = RETRY_BACKOFF_SECONDS[idx] as f64 * jitter;
                    tokio::time::sleep(StdDuration::from_secs_f64(delay)).await;
                    continue;
                }
                ModelOutcome::BillingLimitExceeded => {
                    return (None, None, Some(DecisionCode::LlmBillingLimit));
                }
                ModelOutcome::TransientFailure(code) => {
                    self.circuit_breaker.record_error(Utc::now());
                    warn!(model = %pricing.model, ?code, "llm call failed, trying next model");
                    continue;
                }
                ModelOutcome::InvalidJson(raw) => {
                    self.circuit_breaker.record_error(Utc::now());
                    debug!(model = %pricing.model, "invalid json on first attempt, retrying once");
                    match self.call_model_retry(&pricing, request).await {
                        ModelOutcome::Classified(classification, raw) => {
                            self.circuit_breaker.record_success();
                            self.throttle.record_success();
                            return (Some(classification), Some(raw), None);
                        }
                        _ => {
                            let _ = raw;
                            continue;
                        }
                    }
                }
            }
        }

        (None, None, Some(DecisionCode::LlmApiError))
    }

    async fn call_model(
        &mut self,
        pricing: &ModelPricing,
        request: &ClassificationRequest<'_>,
    ) -> ModelOutcome {
        self.throttle.record_call(Utc::now());
        self.dispatch(pricing, request, false).await
    }

    async fn call_model_retry(
        &mut self,
        pricing: &ModelPricing,
        request: &ClassificationRequest<'_>,
    ) -> ModelOutcome {
        self.dispatch(pricing, request, true).await
    }

    async fn dispatch(
        &mut self,
        pricing: &ModelPricing,
        request: &ClassificationRequest<'_>,
        retry: bool,
    ) -> ModelOutcome {
        let body = ChatRequest {
            model: pricing.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_message().to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_message(request, retry),
                },
            ],
            temperature: 0.0,
            max_tokens: self.config.max_tokens,
            response_format: response_format(),
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let started = std::time::Instant::now();

        let response = match self
            .http
            .post(&url)
            .headers(self.headers())
            .timeout(self.config.request_timeout)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                self.record_usage(pricing, 0, 0, started.elapsed(), "timeout", Some("LLM_TIMEOUT"));
                return ModelOutcome::TransientFailure(DecisionCode::LlmTimeout);
            }
            Err(_) => {
                self.record_usage(pricing, 0, 0, started.elapsed(), "error", Some("LLM_API_ERROR"));
                return ModelOutcome::TransientFailure(DecisionCode::LlmApiError);
            }
        };

        let status = response.status();

        if status.as_u16() == 429 {
            self.record_usage(pricing, 0, 0, started.elapsed(), "rate_limited", Some("LLM_RATE_LIMIT"));
            return ModelOutcome::RateLimited;
        }
        if status.as_u16() == 402 {
            self.record_usage(pricing, 0, 0, started.elapsed(), "billing_limit", Some("LLM_BILLING_LIMIT"));
            return ModelOutcome::BillingLimitExceeded;
        }
        if status.is_server_error() {
            self.record_usage(pricing, 0, 0, started.elapsed(), "server_error", Some("LLM_API_ERROR"));
            return ModelOutcome::TransientFailure(DecisionCode::LlmApiError);
        }
        if !status.is_success() {
            self.record_usage(pricing, 0, 0, started.elapsed(), "error", Some("LLM_API_ERROR"));
            return ModelOutcome::TransientFailure(DecisionCode::LlmApiError);
        }

        let parsed: ChatResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(_) => {
                self.record_usage(pricing, 0, 0, started.elapsed(), "invalid_json", Some("LLM_INVALID_JSON"));
                return ModelOutcome::InvalidJson(String::new());
            }
        };

        let usage = parsed.usage.unwrap_or_default();
        let raw = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        match parse_classification(&raw) {
            Ok(classification) => {
                self.record_usage(
                    pricing,
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    started.elapsed(),
                    "ok",
                    None,
                );
                ModelOutcome::Classified(classification, raw)
            }
            Err(_) => {
                self.record_usage(
                    pricing,
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    started.elapsed(),
                    "invalid_json",
                    Some("LLM_INVALID_JSON"),
                );
                ModelOutcome::InvalidJson(raw)
            }
        }
    }

    fn record_usage(
        &mut self,
        pricing: &ModelPricing,
        prompt_tokens: u32,
        completion_tokens: u32,
        elapsed: StdDuration,
        status: &'static str,
        error_category: Option<&'static str>,
    ) {
        let cost = (prompt_tokens as f64 / 1000.0) * pricing.prompt_cost_per_1k
            + (completion_tokens as f64 / 1000.0) * pricing.completion_cost_per_1k;
        self.ledger.record(UsageEntry {
            at: Utc::now(),
            model: pricing.model.clone(),
            prompt_tokens,
            completion_tokens,
            cost,
            latency_ms: elapsed.as_millis() as u64,
            status,
            error_category,
        });
    }
}

enum ModelOutcome {
    Classified(Classification, String),
    RateLimited,
    BillingLimitExceeded,
    TransientFailure(DecisionCode),
    InvalidJson(String),
}

/// Upper bound on how long a single classify call may block on retries
/// across the whole fallback chain, used by callers sizing their own
/// cycle deadline.
pub fn max_retry_window() -> Duration {
    Duration::seconds(RETRY_BACKOFF_SECONDS.iter().sum::<u64>() as i64)
}
