//! Shared domain types: the sealed status tag union, classification
//! vocabularies, and the typed tunable-settings tree with its override
//! registry (SPEC_FULL.md §9 design notes).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Terminal (and the one non-terminal `Raw`) lifecycle state of a `NewsItem`.
///
/// A `NewsItem` transitions exactly once, from `Raw` to one of the other
/// variants (SPEC_FULL.md §3 invariant). Modeling this as a sealed enum
/// rather than a free-form string means every `match` over it is checked
/// exhaustively by the compiler — an illegal or unimagined status can't be
/// constructed from a typo the way a string-column value could.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NewsStatus {
    Raw,
    Duplicate,
    FilteredOld,
    FilteredResolved,
    FilteredNoise,
    Filtered,
    LlmFailed,
    LlmSkipped,
    LlmPassed,
    Sent,
    SuppressedLimit,
    SuppressedSimilar,
}

impl NewsStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, NewsStatus::Raw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NewsStatus::Raw => "raw",
            NewsStatus::Duplicate => "duplicate",
            NewsStatus::FilteredOld => "filtered_old",
            NewsStatus::FilteredResolved => "filtered_resolved",
            NewsStatus::FilteredNoise => "filtered_noise",
            NewsStatus::Filtered => "filtered",
            NewsStatus::LlmFailed => "llm_failed",
            NewsStatus::LlmSkipped => "llm_skipped",
            NewsStatus::LlmPassed => "llm_passed",
            NewsStatus::Sent => "sent",
            NewsStatus::SuppressedLimit => "suppressed_limit",
            NewsStatus::SuppressedSimilar => "suppressed_similar",
        }
    }
}

impl fmt::Display for NewsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown news status: {0}")]
pub struct ParseNewsStatusError(String);

impl FromStr for NewsStatus {
    type Err = ParseNewsStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "raw" => NewsStatus::Raw,
            "duplicate" => NewsStatus::Duplicate,
            "filtered_old" => NewsStatus::FilteredOld,
            "filtered_resolved" => NewsStatus::FilteredResolved,
            "filtered_noise" => NewsStatus::FilteredNoise,
            "filtered" => NewsStatus::Filtered,
            "llm_failed" => NewsStatus::LlmFailed,
            "llm_skipped" => NewsStatus::LlmSkipped,
            "llm_passed" => NewsStatus::LlmPassed,
            "sent" => NewsStatus::Sent,
            "suppressed_limit" => NewsStatus::SuppressedLimit,
            "suppressed_similar" => NewsStatus::SuppressedSimilar,
            other => return Err(ParseNewsStatusError(other.to_string())),
        })
    }
}

/// A short uppercase identifier emitted by every stage explaining why an
/// item was passed or rejected (SPEC_FULL.md glossary: "decision code").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionCode {
    Passed,
    MissingPublishedAt,
    StaleNews,
    Duplicate,
    ResolvedEvent,
    NoiseHardTopic,
    PassedWithException,
    Filter1BelowThreshold,
    ComboRuleFailed,
    StrongOverride,
    LlmFailed,
    LlmSkipped,
    LowRelevance,
    LowUrgency,
    LlmActionIgnore,
    SuppressedLimit,
    SuppressedSimilar,
    BudgetExceeded,
    CircuitOpen,
    LlmRateLimit,
    LlmBillingLimit,
    LlmInvalidJson,
    LlmTimeout,
    LlmApiError,
}

impl DecisionCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionCode::Passed => "PASSED",
            DecisionCode::MissingPublishedAt => "MISSING_PUBLISHED_AT",
            DecisionCode::StaleNews => "STALE_NEWS",
            DecisionCode::Duplicate => "DUPLICATE",
            DecisionCode::ResolvedEvent => "RESOLVED_EVENT",
            DecisionCode::NoiseHardTopic => "NOISE_HARD_TOPIC",
            DecisionCode::PassedWithException => "PASSED_WITH_EXCEPTION",
            DecisionCode::Filter1BelowThreshold => "FILTER1_BELOW_THRESHOLD",
            DecisionCode::ComboRuleFailed => "COMBO_RULE_FAILED",
            DecisionCode::StrongOverride => "STRONG_OVERRIDE",
            DecisionCode::LlmFailed => "llm_failed",
            DecisionCode::LlmSkipped => "llm_skipped",
            DecisionCode::LowRelevance => "low_relevance",
            DecisionCode::LowUrgency => "low_urgency",
            DecisionCode::LlmActionIgnore => "llm_action_ignore",
            DecisionCode::SuppressedLimit => "suppressed_limit",
            DecisionCode::SuppressedSimilar => "suppressed_similar",
            DecisionCode::BudgetExceeded => "BUDGET_EXCEEDED",
            DecisionCode::CircuitOpen => "CIRCUIT_OPEN",
            DecisionCode::LlmRateLimit => "LLM_RATE_LIMIT",
            DecisionCode::LlmBillingLimit => "LLM_BILLING_LIMIT",
            DecisionCode::LlmInvalidJson => "LLM_INVALID_JSON",
            DecisionCode::LlmTimeout => "LLM_TIMEOUT",
            DecisionCode::LlmApiError => "LLM_API_ERROR",
        }
    }
}

impl fmt::Display for DecisionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM-classified event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Accident,
    Outage,
    Repair,
    Other,
}

impl EventType {
    pub fn ru_label(self) -> &'static str {
        match self {
            EventType::Accident => "авария",
            EventType::Outage => "отключение",
            EventType::Repair => "ремонт",
            EventType::Other => "событие",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Accident => "accident",
            EventType::Outage => "outage",
            EventType::Repair => "repair",
            EventType::Other => "other",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ParseNewsStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "accident" => EventType::Accident,
            "outage" => EventType::Outage,
            "repair" => EventType::Repair,
            "other" => EventType::Other,
            other => return Err(ParseNewsStatusError(other.to_string())),
        })
    }
}

/// LLM-classified affected object kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Water,
    Heat,
    Industrial,
    Unknown,
}

impl ObjectKind {
    pub fn ru_label(self) -> &'static str {
        match self {
            ObjectKind::Water => "вода",
            ObjectKind::Heat => "тепло",
            ObjectKind::Industrial => "промышленность",
            ObjectKind::Unknown => "не определено",
        }
    }

    /// Derived two-valued label used in the formatted signal (SPEC_FULL.md §4.10).
    pub fn sphere(self) -> Sphere {
        match self {
            ObjectKind::Water | ObjectKind::Heat | ObjectKind::Unknown => Sphere::Utilities,
            ObjectKind::Industrial => Sphere::Industry,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Water => "water",
            ObjectKind::Heat => "heat",
            ObjectKind::Industrial => "industrial",
            ObjectKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = ParseNewsStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "water" => ObjectKind::Water,
            "heat" => ObjectKind::Heat,
            "industrial" => ObjectKind::Industrial,
            "unknown" => ObjectKind::Unknown,
            other => return Err(ParseNewsStatusError(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sphere {
    Utilities,
    Industry,
}

impl fmt::Display for Sphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sphere::Utilities => "utilities",
            Sphere::Industry => "industry",
        })
    }
}

impl FromStr for Sphere {
    type Err = ParseNewsStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "utilities" => Sphere::Utilities,
            "industry" => Sphere::Industry,
            other => return Err(ParseNewsStatusError(other.to_string())),
        })
    }
}

/// What the model recommends doing about the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmAction {
    Call,
    Watch,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncidentStatus {
    Open,
    Closed,
    Suppressed,
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Closed => "closed",
            IncidentStatus::Suppressed => "suppressed",
        })
    }
}

impl FromStr for IncidentStatus {
    type Err = ParseNewsStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "open" => IncidentStatus::Open,
            "closed" => IncidentStatus::Closed,
            "suppressed" => IncidentStatus::Suppressed,
            other => return Err(ParseNewsStatusError(other.to_string())),
        })
    }
}

// --- Typed tunable-settings tree -------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordsConfig {
    pub positive: HashMap<String, Vec<String>>,
    pub negative: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsConfig {
    pub weights: HashMap<String, i32>,
    pub negative: i32,
}

impl WeightsConfig {
    pub fn weight_for(&self, category: &str) -> i32 {
        self.weights.get(category).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    pub filter1_to_llm: i32,
    pub llm_relevance: f64,
    pub llm_urgency: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_signals_per_day: u32,
    pub max_processing_batch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    pub simhash_threshold: u32,
    pub url_params_to_remove: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FreshnessConfig {
    pub max_age_days: i64,
    pub allow_missing_published_at: bool,
    pub fallback_to_collected_at: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedFilterConfig {
    pub enabled: bool,
    pub hard_resolved_phrases: Vec<String>,
    pub soft_resolved_words: Vec<String>,
    pub allow_if_still_ongoing_words: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseFilterConfig {
    pub enabled: bool,
    pub hard_negative_topics: Vec<String>,
    pub household_noise: Vec<String>,
    pub exception_infra_phrases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter1GateConfig {
    pub require_combo_to_llm: bool,
    pub event_categories_required: Vec<String>,
    pub object_categories_required: Vec<String>,
    pub strong_event_override_enabled: bool,
    pub strong_event_override_phrases: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LlmThrottleConfig {
    pub max_requests_per_cycle: u32,
    pub max_requests_per_minute: u32,
    pub max_consecutive_429: u32,
    pub max_candidates_after_filter1: usize,
}

/// The complete set of operator-tunable values, equivalent to the source's
/// YAML-plus-override `AppConfig`. Loaded once with defaults matching the
/// reference deployment's seed data, then mutated only through
/// [`apply_override`], never by ad hoc field assignment from untyped input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub keywords: KeywordsConfig,
    pub weights: WeightsConfig,
    pub thresholds: ThresholdsConfig,
    pub limits: LimitsConfig,
    pub dedup: DedupConfig,
    pub freshness: FreshnessConfig,
    pub resolved_filter: ResolvedFilterConfig,
    pub noise_filter: NoiseFilterConfig,
    pub filter1_gate: Filter1GateConfig,
    pub llm_throttle: LlmThrottleConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let positive = HashMap::from([
            (
                "accident".to_string(),
                vec![
                    "авария", "прорыв", "утечка", "порыв", "остановка",
                    "вышел из строя", "ЧП", "чрезвычайная ситуация", "аварийный",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
            ),
            (
                "repair".to_string(),
                vec![
                    "ремонт", "срочный ремонт", "капремонт", "капитальный ремонт",
                    "замена", "реконструкция", "модернизация", "восстановление",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
            ),
            (
                "infrastructure".to_string(),
                vec![
                    "водоканал", "насосная станция", "КНС", "ВНС", "котельная",
                    "теплосети", "очистные сооружения", "водопровод", "канализация",
                    "теплотрасса",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
            ),
            (
                "industrial".to_string(),
                vec![
                    "цех", "агрегат", "производство", "простой",
                    "технологический сбой", "остановка производства",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
            ),
        ]);

        let negative = vec![
            "ДТП", "дорожно-транспортное происшествие", "ремонт дороги",
            "ремонт моста", "дорожные работы", "учения", "тренировка",
            "условная авария", "плановые учения", "квартира", "подъезд",
            "бытовой", "домашний", "автомобиль", "машина столкнулась",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        let weights = HashMap::from([
            ("accident".to_string(), 3),
            ("repair".to_string(), 2),
            ("infrastructure".to_string(), 4),
            ("industrial".to_string(), 2),
        ]);

        Settings {
            keywords: KeywordsConfig { positive, negative },
            weights: WeightsConfig { weights, negative: -5 },
            thresholds: ThresholdsConfig {
                filter1_to_llm: 4,
                llm_relevance: 0.6,
                llm_urgency: 3,
            },
            limits: LimitsConfig {
                max_signals_per_day: 5,
                max_processing_batch: 100,
            },
            dedup: DedupConfig {
                simhash_threshold: 3,
                url_params_to_remove: [
                    "utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content",
                    "yclid", "gclid", "fbclid", "ref", "from", "source", "rss", "tg",
                    "share", "partner", "erid", "ysclid", "rs", "_openstat",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
            },
            freshness: FreshnessConfig {
                max_age_days: 21,
                allow_missing_published_at: true,
                fallback_to_collected_at: true,
            },
            resolved_filter: ResolvedFilterConfig {
                enabled: true,
                hard_resolved_phrases: Vec::new(),
                soft_resolved_words: Vec::new(),
                allow_if_still_ongoing_words: Vec::new(),
            },
            noise_filter: NoiseFilterConfig {
                enabled: true,
                hard_negative_topics: Vec::new(),
                household_noise: Vec::new(),
                exception_infra_phrases: Vec::new(),
            },
            filter1_gate: Filter1GateConfig {
                require_combo_to_llm: true,
                event_categories_required: vec!["accident".to_string(), "repair".to_string()],
                object_categories_required: vec![
                    "infrastructure".to_string(),
                    "industrial".to_string(),
                ],
                strong_event_override_enabled: true,
                strong_event_override_phrases: vec![
                    "авария на водоканале",
                    "прорыв трубопровода",
                    "отключение отопления",
                    "затопление",
                    "ЧП на объекте",
                    "массовое отключение",
                    "разлив нефти",
                    "взрыв на производстве",
                    "обрушение",
                    "пожар на объекте",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
            },
            llm_throttle: LlmThrottleConfig {
                max_requests_per_cycle: 30,
                max_requests_per_minute: 30,
                max_consecutive_429: 3,
                max_candidates_after_filter1: 200,
            },
        }
    }
}

/// One overridable leaf of [`Settings`], identified by a dotted path.
/// Replaces the source's stringly-typed `setattr` reflection: applying an
/// override runs its own parse closure, so a malformed value is rejected at
/// apply time instead of silently coercing (SPEC_FULL.md §9).
pub struct OverrideEntry {
    pub path: &'static str,
    apply: fn(&mut Settings, &str) -> Result<(), String>,
}

fn registry() -> Vec<OverrideEntry> {
    vec![
        OverrideEntry {
            path: "limits.max_signals_per_day",
            apply: |s, v| {
                s.limits.max_signals_per_day = v.parse().map_err(|_| "expected integer")?;
                Ok(())
            },
        },
        OverrideEntry {
            path: "limits.max_processing_batch",
            apply: |s, v| {
                s.limits.max_processing_batch = v.parse().map_err(|_| "expected integer")?;
                Ok(())
            },
        },
        OverrideEntry {
            path: "thresholds.filter1_to_llm",
            apply: |s, v| {
                s.thresholds.filter1_to_llm = v.parse().map_err(|_| "expected integer")?;
                Ok(())
            },
        },
        OverrideEntry {
            path: "thresholds.llm_relevance",
            apply: |s, v| {
                s.thresholds.llm_relevance = v.parse().map_err(|_| "expected float")?;
                Ok(())
            },
        },
        OverrideEntry {
            path: "thresholds.llm_urgency",
            apply: |s, v| {
                s.thresholds.llm_urgency = v.parse().map_err(|_| "expected integer")?;
                Ok(())
            },
        },
        OverrideEntry {
            path: "freshness.max_age_days",
            apply: |s, v| {
                s.freshness.max_age_days = v.parse().map_err(|_| "expected integer")?;
                Ok(())
            },
        },
        OverrideEntry {
            path: "dedup.simhash_threshold",
            apply: |s, v| {
                s.dedup.simhash_threshold = v.parse().map_err(|_| "expected integer")?;
                Ok(())
            },
        },
        OverrideEntry {
            path: "filter1_gate.require_combo_to_llm",
            apply: |s, v| {
                s.filter1_gate.require_combo_to_llm = parse_bool(v)?;
                Ok(())
            },
        },
        OverrideEntry {
            path: "llm_throttle.max_requests_per_cycle",
            apply: |s, v| {
                s.llm_throttle.max_requests_per_cycle =
                    v.parse().map_err(|_| "expected integer")?;
                Ok(())
            },
        },
    ]
}

fn parse_bool(v: &str) -> Result<bool, &'static str> {
    match v.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err("expected boolean"),
    }
}

/// Apply a single dotted-path override to `settings`. Returns an error
/// naming the path if it isn't registered, or the parser's complaint if the
/// value doesn't fit the field's type.
pub fn apply_override(settings: &mut Settings, path: &str, value: &str) -> Result<(), String> {
    let entry = registry()
        .into_iter()
        .find(|e| e.path == path)
        .ok_or_else(|| format!("unknown override path: {path}"))?;
    (entry.apply)(settings, value)
}

/// All overridable paths, for admin-surface introspection (`get_stats`-style
/// callers can list what's tunable without guessing).
pub fn overridable_paths() -> Vec<&'static str> {
    registry().into_iter().map(|e| e.path).collect()
}
