use std::env;

/// Infrastructure configuration loaded from environment variables.
///
/// This is deliberately separate from [`crate::types::Settings`], the typed
/// tunable tree (keywords, weights, thresholds): `Config` holds secrets and
/// deployment-topology values that are set once at process start, `Settings`
/// holds values an operator may want to override at runtime through the
/// override registry (SPEC_FULL.md §9).
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub admin_chat_id: i64,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_fallback_models: Vec<String>,
    pub database_url: String,
    pub app_timezone: String,
    pub check_interval_minutes: u64,
    pub max_signals_per_day: u32,
    pub max_processing_batch: usize,
    pub fetch_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub fetch_retries: u32,
    pub broadcast_messages_per_second: f64,
    pub health_port: u16,
    pub daily_llm_budget_cents: u64,
}

impl Config {
    /// Full configuration for the orchestrator binary. Panics with a clear
    /// message if a required variable is missing — this is a fatal,
    /// process-exiting condition by design (SPEC_FULL.md §7).
    pub fn from_env() -> Self {
        Self {
            bot_token: required_env("BOT_TOKEN"),
            admin_chat_id: required_env("ADMIN_CHAT_ID")
                .parse()
                .expect("ADMIN_CHAT_ID must be an integer chat id"),
            llm_api_key: required_env("LLM_API_KEY"),
            llm_base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            llm_fallback_models: env::var("LLM_FALLBACK_MODELS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://vestnik.db".to_string()),
            app_timezone: env::var("APP_TIMEZONE").unwrap_or_else(|_| "Europe/Moscow".to_string()),
            check_interval_minutes: env::var("CHECK_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            max_signals_per_day: env::var("MAX_SIGNALS_PER_DAY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            max_processing_batch: env::var("MAX_PROCESSING_BATCH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            fetch_concurrency: env::var("FETCH_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            fetch_retries: env::var("FETCH_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            broadcast_messages_per_second: env::var("BROADCAST_MESSAGES_PER_SECOND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15.0),
            health_port: env::var("HEALTH_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            daily_llm_budget_cents: env::var("DAILY_LLM_BUDGET_CENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }

    /// Configuration for the standalone health/metrics API process: only the
    /// fields it actually reads, so a missing `BOT_TOKEN` doesn't block it.
    pub fn api_from_env() -> Self {
        Self {
            bot_token: env::var("BOT_TOKEN").unwrap_or_default(),
            admin_chat_id: env::var("ADMIN_CHAT_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            llm_base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            llm_model: env::var("LLM_MODEL").unwrap_or_default(),
            llm_fallback_models: Vec::new(),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://vestnik.db".to_string()),
            app_timezone: env::var("APP_TIMEZONE").unwrap_or_else(|_| "Europe/Moscow".to_string()),
            check_interval_minutes: 0,
            max_signals_per_day: 0,
            max_processing_batch: 0,
            fetch_concurrency: 0,
            fetch_timeout_secs: 0,
            fetch_retries: 0,
            broadcast_messages_per_second: 0.0,
            health_port: env::var("HEALTH_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            daily_llm_budget_cents: 0,
        }
    }

    /// Logs presence/length of every sensitive value, never the value itself.
    pub fn log_redacted(&self) {
        let secrets = [
            ("BOT_TOKEN", &self.bot_token),
            ("LLM_API_KEY", &self.llm_api_key),
            ("DATABASE_URL", &self.database_url),
        ];
        for (name, value) in secrets {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
        tracing::info!(
            llm_base_url = %self.llm_base_url,
            llm_model = %self.llm_model,
            app_timezone = %self.app_timezone,
            check_interval_minutes = self.check_interval_minutes,
            max_signals_per_day = self.max_signals_per_day,
            "config loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
