//! Orchestrator binary: scheduler loop, source fan-out, and per-item
//! pipeline wiring (SPEC_FULL.md §4.15, §5, §7).

mod autoheal;
mod cycle;
mod decide;
mod pipeline;
mod sources;

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use chrono::{Timelike, Utc};
use teloxide::Bot;
use tokio::signal::ctrl_c;
use tokio::time::interval;
use tracing::{error, info, warn};
use uuid::Uuid;
use vestnik_common::Config;
use vestnik_filter::dedup::Deduplicator;
use vestnik_filter::region::{default_city_region_map, RegionDetector};
use vestnik_ingest::fanout::{fetch_all, FetchConfig};
use vestnik_ingest::types::{SourceHealth, SourceKind};
use vestnik_ingest::search_feed;
use vestnik_llm::{LlmClient, LlmClientConfig, ModelPricing};
use vestnik_broadcast::Broadcaster;
use vestnik_store::source_health::HealthUpdate;
use vestnik_store::Store;

use crate::cycle::CycleStats;
use crate::pipeline::{process_item, seed_deduplicator, PipelineContext};

const PROCESSING_LOCK_NAME: &str = "processing";
const PROCESSING_LOCK_MINUTES: i64 = 10;
const AUTOHEAL_INTERVAL_MINUTES: u64 = 30;
const RETENTION_CHECK_INTERVAL_MINUTES: u64 = 5;
const RETENTION_HOUR_LOCAL: u32 = 3;
const LLM_MAX_TOKENS: u32 = 800;
const LLM_REQUEST_TIMEOUT_SECS: u64 = 30;
const SEARCH_FEED_QUERY: &str = "авария водоканал теплосеть";
const SEARCH_FEED_LANG: &str = "ru";
const SEARCH_FEED_COUNTRY: &str = "RU";

fn pricing_for(model: &str) -> ModelPricing {
    ModelPricing {
        model: model.to_string(),
        prompt_cost_per_1k: 0.00015,
        completion_cost_per_1k: 0.0006,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = Config::from_env();
    config.log_redacted();

    let store = Store::connect(&config.database_url).await?;
    store.migrate().await?;
    info!("database connected and migrated");

    let settings = store.load_settings().await?;
    let timezone = vestnik_common::time::parse_zone(&config.app_timezone);

    let llm_config = LlmClientConfig {
        api_key: config.llm_api_key.clone(),
        base_url: config.llm_base_url.clone(),
        primary_model: pricing_for(&config.llm_model),
        fallback_models: config.llm_fallback_models.iter().map(|m| pricing_for(m)).collect(),
        request_timeout: StdDuration::from_secs(LLM_REQUEST_TIMEOUT_SECS),
        max_tokens: LLM_MAX_TOKENS,
        daily_budget: config.daily_llm_budget_cents as f64 / 100.0,
        timezone,
    };
    let mut llm = LlmClient::new(llm_config, settings.llm_throttle);

    let bot = Bot::new(&config.bot_token);
    let broadcaster = Broadcaster::with_rate(bot, Some(config.admin_chat_id), config.broadcast_messages_per_second);

    let region_detector = RegionDetector::new(default_city_region_map());
    let mut dedup = Deduplicator::new(settings.dedup.simhash_threshold);

    let all_sources = sources::default_sources();
    let mut health: HashMap<Uuid, SourceHealth> = HashMap::new();
    for source in &all_sources {
        if let Some(row) = store.get_health(source.id).await? {
            let mut h = SourceHealth::new(source.id);
            h.consecutive_failures = row.consecutive_failures.max(0) as u32;
            h.total_fetches = row.total_fetches.max(0) as u64;
            h.last_ok_at = row.last_ok_at;
            h.is_disabled = row.is_disabled;
            h.disabled_reason = row.disabled_reason;
            h.last_error = row.last_error_message;
            health.insert(source.id, h);
        } else {
            health.insert(source.id, SourceHealth::new(source.id));
        }
    }

    let fetch_config = FetchConfig {
        max_concurrency: config.fetch_concurrency,
        timeout: StdDuration::from_secs(config.fetch_timeout_secs),
        retries: config.fetch_retries,
    };

    let holder_id = Uuid::new_v4().to_string();
    let mut retention_fired_on: Option<chrono::NaiveDate> = None;

    let mut news_ticker = interval(StdDuration::from_secs(config.check_interval_minutes * 60));
    let mut autoheal_ticker = interval(StdDuration::from_secs(AUTOHEAL_INTERVAL_MINUTES * 60));
    let mut retention_ticker = interval(StdDuration::from_secs(RETENTION_CHECK_INTERVAL_MINUTES * 60));

    info!("orchestrator started");

    loop {
        tokio::select! {
            _ = ctrl_c() => {
                info!("shutdown signal received, letting any in-flight cycle finish");
                break;
            }
            _ = news_ticker.tick() => {
                run_news_cycle(
                    &store,
                    &mut llm,
                    &broadcaster,
                    &mut dedup,
                    &region_detector,
                    &settings,
                    timezone,
                    &all_sources,
                    &mut health,
                    &fetch_config,
                    &holder_id,
                ).await;
            }
            _ = autoheal_ticker.tick() => {
                if let Err(e) = autoheal::run(&store, Utc::now()).await {
                    warn!(error = %e, "auto-heal run failed");
                }
            }
            _ = retention_ticker.tick() => {
                run_retention_if_due(&store, &config, &mut retention_fired_on).await;
            }
        }
    }

    store.release_lock(PROCESSING_LOCK_NAME).await.ok();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_news_cycle(
    store: &Store,
    llm: &mut LlmClient,
    broadcaster: &Broadcaster,
    dedup: &mut Deduplicator,
    region_detector: &RegionDetector,
    settings: &vestnik_common::types::Settings,
    timezone: chrono_tz::Tz,
    all_sources: &[vestnik_ingest::types::Source],
    health: &mut HashMap<Uuid, SourceHealth>,
    fetch_config: &FetchConfig,
    holder_id: &str,
) {
    let now = Utc::now();

    let acquired = match store
        .acquire_lock(PROCESSING_LOCK_NAME, chrono::Duration::minutes(PROCESSING_LOCK_MINUTES), holder_id, now)
        .await
    {
        Ok(acquired) => acquired,
        Err(e) => {
            error!(error = %e, "failed to check processing lock, skipping cycle");
            return;
        }
    };
    if !acquired {
        info!("processing lock already held, skipping this cycle");
        return;
    }

    // Refresh from durable health rows first: auto-heal re-enables a source
    // by writing straight to the database, and the in-memory map otherwise
    // never learns about it until the process restarts.
    for source in all_sources {
        if let Ok(Some(row)) = store.get_health(source.id).await {
            if let Some(entry) = health.get_mut(&source.id) {
                entry.is_disabled = row.is_disabled;
                if !row.is_disabled {
                    entry.disabled_reason = None;
                    entry.consecutive_failures = 0;
                }
            }
        }
    }

    let mut items = fetch_all(all_sources, health, fetch_config).await;

    let search_items = fetch_search_feeds(all_sources, health).await;
    items.extend(search_items);

    for (source_id, health_entry) in health.iter() {
        // `disabled_at` anchors the auto-heal cooldown, so it must only
        // advance on the cycle a source actually transitions into disabled -
        // re-stamping it every cycle would mean a disabled source never
        // becomes eligible for auto-heal.
        let disabled_at = if health_entry.is_disabled {
            match store.get_health(*source_id).await {
                Ok(Some(row)) if row.is_disabled => row.disabled_at.or(Some(now)),
                _ => Some(now),
            }
        } else {
            None
        };

        let update = HealthUpdate {
            source_id: *source_id,
            consecutive_failures: health_entry.consecutive_failures as i64,
            total_fetches: health_entry.total_fetches as i64,
            last_ok_at: health_entry.last_ok_at,
            last_error_at: None,
            last_status_code: None,
            last_error_message: health_entry.last_error.clone(),
            is_disabled: health_entry.is_disabled,
            disabled_at,
            disabled_reason: health_entry.disabled_reason.clone(),
        };
        if let Err(e) = store.upsert_health(update).await {
            warn!(error = %e, "failed to persist source health");
        }
    }

    if let Err(e) = seed_deduplicator(store, dedup, now).await {
        warn!(error = %e, "failed to seed dedup cache, continuing with an empty one");
    }
    llm.reset_cycle();

    let mut stats = CycleStats::new();
    stats.fetched = items.len() as u32;

    let cap = settings.limits.max_processing_batch;
    if items.len() > cap {
        stats.dropped_backpressure = (items.len() - cap) as u32;
        warn!(dropped = stats.dropped_backpressure, cap, "backpressure cap exceeded, dropping excess items");
        items.truncate(cap);
    }

    let mut ctx = PipelineContext {
        store,
        llm,
        broadcaster,
        dedup,
        region_detector,
        settings,
        timezone,
    };

    for item in items {
        process_item(&mut ctx, item, &mut stats).await;
    }

    info!(stats = %stats, "news cycle complete");

    if let Err(e) = store.release_lock(PROCESSING_LOCK_NAME).await {
        warn!(error = %e, "failed to release processing lock");
    }
}

async fn fetch_search_feeds(
    all_sources: &[vestnik_ingest::types::Source],
    health: &mut HashMap<Uuid, SourceHealth>,
) -> Vec<vestnik_ingest::types::RawItem> {
    let client = reqwest::Client::new();
    let mut items = Vec::new();

    for source in all_sources.iter().filter(|s| s.kind == SourceKind::SearchFeed) {
        let entry = health.entry(source.id).or_insert_with(|| SourceHealth::new(source.id));
        if entry.is_disabled {
            continue;
        }

        match search_feed::fetch(&client, source, SEARCH_FEED_QUERY, Some(SEARCH_FEED_LANG), Some(SEARCH_FEED_COUNTRY)).await {
            Ok(mut fetched) => {
                entry.record_success(Utc::now());
                items.append(&mut fetched);
            }
            Err(e) => {
                warn!(source_id = %source.id, error = %e, "search-feed fetch failed");
                entry.record_failure(e.to_string());
            }
        }
    }

    items
}

async fn run_retention_if_due(store: &Store, config: &Config, fired_on: &mut Option<chrono::NaiveDate>) {
    let now = Utc::now();
    let zone = vestnik_common::time::parse_zone(&config.app_timezone);
    let local_now = now.with_timezone(&zone);
    let today = local_now.date_naive();

    if local_now.hour() != RETENTION_HOUR_LOCAL {
        return;
    }
    if *fired_on == Some(today) {
        return;
    }

    match store.run_retention(now).await {
        Ok(report) => info!(?report, "daily retention complete"),
        Err(e) => {
            warn!(error = %e, "daily retention failed");
            return;
        }
    }
    if let Err(e) = store.vacuum(&config.database_url).await {
        warn!(error = %e, "vacuum failed");
    }

    *fired_on = Some(today);
}
