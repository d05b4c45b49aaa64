//! Per-item pipeline: the sequence every fetched candidate runs through in
//! one news cycle (SPEC_FULL.md §4.15).
//!
//! The stage order here differs in one respect from the prose order in the
//! component design: the row is persisted (`insert_raw`) right after the
//! URL-dedup check passes, not after the simhash check. Every later stage
//! (`mark_duplicate`, `update_status`, `set_llm_result`) mutates an existing
//! row by id, and a freshness rejection still needs a persisted
//! `filtered_old` row — so the insert has to happen before either check can
//! produce a terminal state.

use chrono::Utc;
use tracing::{info, warn};
use vestnik_common::types::{DecisionCode, NewsStatus, Settings};
use vestnik_filter::dedup::{dedup_text, simhash, DedupVerdict, Deduplicator};
use vestnik_filter::filter1::KeywordFilter;
use vestnik_filter::freshness::check_freshness;
use vestnik_filter::noise::check_noise;
use vestnik_filter::normalize::{normalize_text, normalize_url};
use vestnik_filter::region::RegionDetector;
use vestnik_filter::resolved::check_resolved;
use vestnik_ingest::types::RawItem;
use vestnik_llm::{ClassificationRequest, LlmClient};
use vestnik_store::news::NewNewsItem;
use vestnik_store::signals::NewSignal;
use vestnik_store::Store;
use vestnik_broadcast::{format_signal, Broadcaster, SignalMessageInput};

use crate::cycle::CycleStats;
use crate::decide::decide;

const SIMHASH_TEXT_CHARS: usize = 400;
const SIMILARITY_WINDOW_HOURS: i64 = 24;

pub struct PipelineContext<'a> {
    pub store: &'a Store,
    pub llm: &'a mut LlmClient,
    pub broadcaster: &'a Broadcaster,
    pub dedup: &'a mut Deduplicator,
    pub region_detector: &'a RegionDetector,
    pub settings: &'a Settings,
    pub timezone: chrono_tz::Tz,
}

fn encode_simhash(hash: u64) -> String {
    format!("{hash:016x}")
}

fn decode_simhash(hex: &str) -> Option<u64> {
    u64::from_str_radix(hex, 16).ok()
}

/// Reloads the per-cycle near-duplicate cache from everything collected in
/// the last 72 hours. Rows with a malformed stored hash (should not happen
/// outside manual DB surgery) are skipped rather than failing the cycle.
pub async fn seed_deduplicator(store: &Store, dedup: &mut Deduplicator, now: chrono::DateTime<Utc>) -> vestnik_common::error::Result<()> {
    let since = now - chrono::Duration::hours(72);
    let rows = store.recent_simhashes(since).await?;
    let decoded = rows.into_iter().filter_map(|(id, hex)| decode_simhash(&hex).map(|hash| (hash, id)));
    dedup.load_existing(decoded);
    Ok(())
}

/// Processes one fetched item through the full funnel, mutating `stats` and
/// the shared `Deduplicator` along the way. Returns the final decision code
/// where one applies (not every stop has one — URL-level duplicates never
/// reach a `DecisionCode` at all, since they are never persisted).
pub async fn process_item(ctx: &mut PipelineContext<'_>, item: RawItem, stats: &mut CycleStats) {
    let now = Utc::now();
    let settings = ctx.settings;

    let title = normalize_text(&item.title);
    let text = normalize_text(&item.raw_html);

    let Some(normalized_url) = normalize_url(&item.url, &settings.dedup.url_params_to_remove) else {
        warn!(url = %item.url, "dropping item with an unparseable url");
        return;
    };

    match ctx.store.find_by_normalized_url(&normalized_url).await {
        Ok(Some(_)) => {
            stats.url_duplicate += 1;
            return;
        }
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "url dedup lookup failed, skipping item");
            return;
        }
    }

    let region = ctx.region_detector.detect(item.region_hint.as_deref(), &title, &text);
    let hash = simhash(&dedup_text(&title, &text, SIMHASH_TEXT_CHARS));
    let keyword_filter = KeywordFilter::new(
        &settings.keywords,
        &settings.weights,
        &settings.thresholds,
        &settings.filter1_gate,
    );
    let filter1 = keyword_filter.score(&title, &text);

    let id = match ctx
        .store
        .insert_raw(NewNewsItem {
            title: title.clone(),
            text: text.clone(),
            source_id: item.source_id.to_string(),
            source_name: item.source_name.clone(),
            raw_url: item.url.clone(),
            normalized_url,
            published_at: item.published_at,
            collected_at: now,
            region: region.clone(),
            filter1_score: filter1.score as i64,
            simhash: encode_simhash(hash),
        })
        .await
    {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "failed to persist raw news item, skipping");
            return;
        }
    };
    stats.persisted += 1;

    macro_rules! reject {
        ($status:expr, $code:expr) => {{
            let _ = ctx.store.update_status(id, $status).await;
            stats.record_decision($code);
            return;
        }};
    }

    let freshness = check_freshness(item.published_at, now, now, &settings.freshness);
    if !freshness.passed() {
        reject!(NewsStatus::FilteredOld, freshness.decision_code().unwrap());
    }

    match ctx.dedup.check(hash) {
        DedupVerdict::Duplicate { canonical_id } => {
            let _ = ctx.store.mark_duplicate(id, canonical_id).await;
            stats.simhash_duplicate += 1;
            stats.record_decision(DecisionCode::Duplicate);
            return;
        }
        DedupVerdict::Unique => ctx.dedup.record(hash, id),
    }

    let resolved = check_resolved(&title, &text, &settings.resolved_filter);
    if !resolved.passed() {
        reject!(NewsStatus::FilteredResolved, resolved.decision_code().unwrap());
    }

    let noise = check_noise(&title, &text, &settings.noise_filter);
    if !noise.passed() {
        reject!(NewsStatus::FilteredNoise, noise.decision_code().unwrap());
    }

    let (send_to_llm, gate_code) = keyword_filter.should_send_to_llm(&title, &text, &filter1);
    if !send_to_llm {
        reject!(NewsStatus::Filtered, gate_code);
    }

    let extract = vestnik_filter::normalize::extract_sentences(&text, 8, 1500);
    let request = ClassificationRequest {
        title: &title,
        source_name: &item.source_name,
        region: region.as_deref(),
        text: &extract,
    };

    let ledger_len_before = ctx.llm.usage_ledger().entries().len();
    let (classification, raw_response, error_code) = ctx.llm.classify(&request).await;
    bridge_usage_ledger(ctx, ledger_len_before).await;

    let Some(classification) = classification else {
        let code = error_code.unwrap_or(DecisionCode::LlmApiError);
        let status = match code {
            DecisionCode::BudgetExceeded | DecisionCode::CircuitOpen | DecisionCode::LlmRateLimit => {
                NewsStatus::LlmSkipped
            }
            _ => NewsStatus::LlmFailed,
        };
        reject!(status, code);
    };

    let classification_json = serde_json::to_string(&SerializableClassification::from(&classification)).ok();
    let _ = ctx
        .store
        .set_llm_result(id, classification_json.as_deref(), raw_response.as_deref())
        .await;

    if let Err(code) = decide(&classification, &settings.thresholds) {
        reject!(NewsStatus::Filtered, code);
    }

    match ctx
        .store
        .find_similar_recent(classification.event_type, region.as_deref(), classification.object, now, SIMILARITY_WINDOW_HOURS)
        .await
    {
        Ok(Some(_existing)) => {
            let _ = ctx.store.update_status(id, NewsStatus::SuppressedSimilar).await;
            let _ = ctx
                .store
                .record_suppressed(&title, region.as_deref(), classification.object, classification.event_type, now)
                .await;
            stats.suppressed_similar += 1;
            stats.record_decision(DecisionCode::SuppressedSimilar);
            return;
        }
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "similarity lookup failed, continuing without suppression");
        }
    }

    let message_body = format_signal(&SignalMessageInput {
        event_type: classification.event_type,
        urgency: classification.urgency,
        object_kind: classification.object,
        region: region.as_deref(),
        title: &title,
        why: &classification.why,
        source_url: &item.url,
    });

    let new_signal = NewSignal {
        news_item_id: id,
        event_type: classification.event_type,
        urgency: classification.urgency,
        object_kind: classification.object,
        region: region.clone(),
        why: classification.why.clone(),
        message_body: message_body.clone(),
        incident_title: title.clone(),
    };

    match ctx
        .store
        .try_create_if_under_limit(new_signal, now, ctx.timezone, settings.limits.max_signals_per_day as i64)
        .await
    {
        Ok(None) => {
            let _ = ctx.store.update_status(id, NewsStatus::SuppressedLimit).await;
            stats.suppressed_limit += 1;
            stats.record_decision(DecisionCode::SuppressedLimit);
        }
        Ok(Some(signal_id)) => {
            let _ = ctx.store.update_status(id, NewsStatus::Sent).await;
            match ctx.broadcaster.broadcast(ctx.store, &message_body, Some(signal_id)).await {
                Ok(report) => {
                    let _ = ctx.store.increment_recipient_count(signal_id, report.sent as i64).await;
                    info!(signal_id, sent = report.sent, failed = report.failed, "signal broadcast");
                }
                Err(e) => warn!(error = %e, signal_id, "broadcast failed"),
            }
            stats.sent += 1;
            stats.record_decision(DecisionCode::Passed);
        }
        Err(e) => warn!(error = %e, "signal creation failed"),
    }
}

async fn bridge_usage_ledger(ctx: &mut PipelineContext<'_>, seen_before: usize) {
    let entries: Vec<_> = ctx.llm.usage_ledger().entries()[seen_before..].to_vec();
    for entry in entries {
        let new_entry = vestnik_store::usage::NewUsageEntry {
            at: entry.at,
            provider: "openai".to_string(),
            model: entry.model.clone(),
            prompt_tokens: entry.prompt_tokens as i64,
            completion_tokens: entry.completion_tokens as i64,
            cost: entry.cost,
            latency_ms: entry.latency_ms as i64,
            status: entry.status.to_string(),
            error_category: entry.error_category.map(str::to_string),
            context_tag: None,
        };
        if let Err(e) = ctx.store.record_usage(new_entry).await {
            warn!(error = %e, "failed to record llm usage entry");
        }
    }
}

#[derive(serde::Serialize)]
struct SerializableClassification {
    event_type: &'static str,
    relevance: f64,
    urgency: u8,
    object: &'static str,
    why: String,
    action: &'static str,
}

impl From<&vestnik_llm::Classification> for SerializableClassification {
    fn from(c: &vestnik_llm::Classification) -> Self {
        Self {
            event_type: c.event_type.as_str(),
            relevance: c.relevance,
            urgency: c.urgency,
            object: c.object.as_str(),
            why: c.why.clone(),
            action: match c.action {
                vestnik_common::types::LlmAction::Call => "call",
                vestnik_common::types::LlmAction::Watch => "watch",
                vestnik_common::types::LlmAction::Ignore => "ignore",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use uuid::Uuid;
    use vestnik_common::types::{Filter1GateConfig, ResolvedFilterConfig};
    use vestnik_filter::region::default_city_region_map;
    use vestnik_ingest::types::RawItem;
    use vestnik_llm::LlmClientConfig;

    async fn test_store() -> Store {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn test_llm() -> LlmClient {
        let config = LlmClientConfig {
            api_key: "test-key".to_string(),
            base_url: "http://127.0.0.1:0".to_string(),
            primary_model: vestnik_llm::ModelPricing {
                model: "test-model".to_string(),
                prompt_cost_per_1k: 0.0,
                completion_cost_per_1k: 0.0,
            },
            fallback_models: Vec::new(),
            request_timeout: StdDuration::from_secs(1),
            max_tokens: 100,
            daily_budget: 10.0,
            timezone: chrono_tz::Europe::Moscow,
        };
        LlmClient::new(config, Settings::default().llm_throttle)
    }

    fn raw_item(title: &str, text: &str, url: &str, published_at: Option<chrono::DateTime<Utc>>) -> RawItem {
        RawItem {
            source_id: Uuid::new_v4(),
            source_name: "test-source".to_string(),
            url: url.to_string(),
            title: title.to_string(),
            raw_html: text.to_string(),
            published_at,
            region_hint: None,
        }
    }

    async fn process(ctx: &mut PipelineContext<'_>, item: RawItem) -> CycleStats {
        let mut stats = CycleStats::new();
        process_item(ctx, item, &mut stats).await;
        stats
    }

    /// Exercises the resolved-event gate end to end: a "fixed" item never
    /// reaches the LLM and is persisted with the matching terminal status.
    #[tokio::test]
    async fn resolved_item_is_filtered_before_llm() {
        let store = test_store().await;
        let mut llm = test_llm();
        let bot = teloxide::Bot::new("000:test");
        let broadcaster = Broadcaster::new(bot, None);
        let region_detector = RegionDetector::new(default_city_region_map());
        let mut dedup = Deduplicator::new(3);
        let mut settings = Settings::default();
        settings.resolved_filter = ResolvedFilterConfig {
            enabled: true,
            hard_resolved_phrases: vec!["устранена".to_string(), "восстановлена".to_string()],
            soft_resolved_words: Vec::new(),
            allow_if_still_ongoing_words: Vec::new(),
        };

        let mut ctx = PipelineContext {
            store: &store,
            llm: &mut llm,
            broadcaster: &broadcaster,
            dedup: &mut dedup,
            region_detector: &region_detector,
            settings: &settings,
            timezone: chrono_tz::Europe::Moscow,
        };

        let item = raw_item(
            "Авария на водоканале устранена, подача воды восстановлена",
            "Подача воды полностью восстановлена во всех районах.",
            "https://example.com/news/1",
            Some(Utc::now()),
        );
        let stats = process(&mut ctx, item).await;

        assert_eq!(stats.persisted, 1);
        assert_eq!(stats.decisions.get("RESOLVED_EVENT"), Some(&1));

        let row = store.find_by_normalized_url("https://example.com/news/1").await.unwrap().unwrap();
        assert_eq!(row.news_status().unwrap(), NewsStatus::FilteredResolved);
    }

    /// An item older than the configured freshness window is rejected with
    /// `filtered_old` and never reaches any later stage.
    #[tokio::test]
    async fn stale_item_is_rejected_on_freshness() {
        let store = test_store().await;
        let mut llm = test_llm();
        let bot = teloxide::Bot::new("000:test");
        let broadcaster = Broadcaster::new(bot, None);
        let region_detector = RegionDetector::new(default_city_region_map());
        let mut dedup = Deduplicator::new(3);
        let mut settings = Settings::default();
        settings.freshness.max_age_days = 2;

        let mut ctx = PipelineContext {
            store: &store,
            llm: &mut llm,
            broadcaster: &broadcaster,
            dedup: &mut dedup,
            region_detector: &region_detector,
            settings: &settings,
            timezone: chrono_tz::Europe::Moscow,
        };

        let item = raw_item(
            "Авария на теплотрассе в Екатеринбурге",
            "Жители остались без отопления, бригада выехала на место",
            "https://example.com/news/2",
            Some(Utc::now() - chrono::Duration::days(5)),
        );
        let stats = process(&mut ctx, item).await;

        assert_eq!(stats.decisions.get("STALE_NEWS"), Some(&1));
        let row = store.find_by_normalized_url("https://example.com/news/2").await.unwrap().unwrap();
        assert_eq!(row.news_status().unwrap(), NewsStatus::FilteredOld);
    }

    /// Two items that differ only by a tracked query parameter collapse at
    /// the url-normalization stage: the second is never even persisted.
    #[tokio::test]
    async fn url_level_duplicate_is_never_persisted() {
        let store = test_store().await;
        let mut llm = test_llm();
        let bot = teloxide::Bot::new("000:test");
        let broadcaster = Broadcaster::new(bot, None);
        let region_detector = RegionDetector::new(default_city_region_map());
        let mut dedup = Deduplicator::new(3);
        let settings = Settings::default();

        let mut ctx = PipelineContext {
            store: &store,
            llm: &mut llm,
            broadcaster: &broadcaster,
            dedup: &mut dedup,
            region_detector: &region_detector,
            settings: &settings,
            timezone: chrono_tz::Europe::Moscow,
        };

        let first = raw_item(
            "Прорыв трубы теплотрассы, дома без отопления",
            "Авария произошла ночью, бригада уже выехала на ремонт.",
            "https://example.com/news/3?utm_source=telegram",
            Some(Utc::now()),
        );
        let second = raw_item(
            "Прорыв трубы теплотрассы, дома без отопления",
            "Авария произошла ночью, бригада уже выехала на ремонт.",
            "https://example.com/news/3?utm_source=rss",
            Some(Utc::now()),
        );

        let stats_first = process(&mut ctx, first).await;
        assert_eq!(stats_first.persisted, 1);

        let stats_second = process(&mut ctx, second).await;
        assert_eq!(stats_second.persisted, 0);
        assert_eq!(stats_second.url_duplicate, 1);
    }

    /// Two items with distinct URLs but near-identical title/body text
    /// collapse at the simhash stage instead: the second is persisted, but
    /// pinned to `duplicate` with a canonical back-reference to the first.
    #[tokio::test]
    async fn near_duplicate_text_is_persisted_with_canonical_reference() {
        let store = test_store().await;
        let mut llm = test_llm();
        let bot = teloxide::Bot::new("000:test");
        let broadcaster = Broadcaster::new(bot, None);
        let region_detector = RegionDetector::new(default_city_region_map());
        let mut dedup = Deduplicator::new(3);
        let settings = Settings::default();

        let mut ctx = PipelineContext {
            store: &store,
            llm: &mut llm,
            broadcaster: &broadcaster,
            dedup: &mut dedup,
            region_detector: &region_detector,
            settings: &settings,
            timezone: chrono_tz::Europe::Moscow,
        };

        let first = raw_item(
            "Прорыв трубы теплотрассы в Екатеринбурге, дома без отопления",
            "Авария произошла ночью, бригада уже выехала на ремонт повреждённого участка.",
            "https://example.com/news/4",
            Some(Utc::now()),
        );
        let second = raw_item(
            "Прорыв трубы теплотрассы в Екатеринбурге, дома без отопления,",
            "Авария произошла ночью, бригада уже выехала на ремонт повреждённого участка.",
            "https://example.com/news/5",
            Some(Utc::now()),
        );

        let stats_first = process(&mut ctx, first).await;
        assert_eq!(stats_first.persisted, 1);

        let stats_second = process(&mut ctx, second).await;
        assert_eq!(stats_second.persisted, 1);
        assert_eq!(stats_second.simhash_duplicate, 1);
        assert_eq!(stats_second.decisions.get("DUPLICATE"), Some(&1));

        let first_row = store.find_by_normalized_url("https://example.com/news/4").await.unwrap().unwrap();
        let second_row = store.find_by_normalized_url("https://example.com/news/5").await.unwrap().unwrap();
        assert_eq!(second_row.news_status().unwrap(), NewsStatus::Duplicate);
        assert_eq!(second_row.canonical_reference, Some(first_row.id));
    }

    /// An item that fails the pre-LLM keyword gate never calls the LLM and
    /// is filtered with the gate's own decision code.
    #[tokio::test]
    async fn item_below_filter1_gate_is_rejected_without_llm_call() {
        let store = test_store().await;
        let mut llm = test_llm();
        let bot = teloxide::Bot::new("000:test");
        let broadcaster = Broadcaster::new(bot, None);
        let region_detector = RegionDetector::new(default_city_region_map());
        let mut dedup = Deduplicator::new(3);
        let mut settings = Settings::default();
        settings.filter1_gate = Filter1GateConfig {
            require_combo_to_llm: true,
            event_categories_required: vec!["accident".to_string()],
            object_categories_required: vec!["infrastructure".to_string()],
            strong_event_override_enabled: false,
            strong_event_override_phrases: Vec::new(),
        };

        let mut ctx = PipelineContext {
            store: &store,
            llm: &mut llm,
            broadcaster: &broadcaster,
            dedup: &mut dedup,
            region_detector: &region_detector,
            settings: &settings,
            timezone: chrono_tz::Europe::Moscow,
        };

        let item = raw_item(
            "Новый торговый центр открылся в городе",
            "Жители посетили новый торговый центр на выходных.",
            "https://example.com/news/6",
            Some(Utc::now()),
        );
        let stats = process(&mut ctx, item).await;

        assert_eq!(stats.persisted, 1);
        assert!(stats.decisions.values().sum::<u32>() >= 1);
        let row = store.find_by_normalized_url("https://example.com/news/6").await.unwrap().unwrap();
        assert_eq!(row.news_status().unwrap(), NewsStatus::Filtered);
    }
}
