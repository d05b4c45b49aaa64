//! Near-duplicate detection via simhash + Hamming distance (SPEC_FULL.md §4.3).
//! URL-exact dedup (level 1) is a storage-layer unique-constraint lookup and
//! lives in `vestnik-store`; this module is level 2 only.

use vestnik_common::fnv::fnv1a;

/// Builds the text simhash is computed over: title plus a bounded prefix of
/// the body, matching the reference dedup text construction.
pub fn dedup_text(title: &str, text: &str, max_text_chars: usize) -> String {
    let truncated: String = text.chars().take(max_text_chars).collect();
    format!("{title} {truncated}")
}

/// 64-bit locality-sensitive fingerprint over whitespace-split tokens longer
/// than 2 characters. Tokens are hashed with the project's deterministic
/// FNV-1a helper (not `DefaultHasher`, which is randomized per process).
pub fn simhash(text: &str) -> u64 {
    let lowered = text.to_lowercase();
    let mut weights = [0i64; 64];
    let mut saw_token = false;

    for token in lowered.split_whitespace() {
        let cleaned: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
        if cleaned.chars().count() <= 2 {
            continue;
        }
        saw_token = true;
        let hash = fnv1a(cleaned.as_bytes());
        for (bit, weight) in weights.iter_mut().enumerate() {
            if (hash >> bit) & 1 == 1 {
                *weight += 1;
            } else {
                *weight -= 1;
            }
        }
    }

    if !saw_token {
        return 0;
    }

    let mut result: u64 = 0;
    for (bit, weight) in weights.iter().enumerate() {
        if *weight > 0 {
            result |= 1 << bit;
        }
    }
    result
}

/// Bitwise XOR followed by population count, symmetric and in `[0, 64]`.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupVerdict {
    Unique,
    Duplicate { canonical_id: i64 },
}

/// Per-cycle in-memory simhash cache (SPEC_FULL.md §4.3, §5: "simhash cache:
/// per-cycle, loaded at start, mutated only by the orchestrator"). Owned
/// exclusively by the orchestrator for the duration of one cycle.
pub struct Deduplicator {
    threshold: u32,
    cache: Vec<(u64, i64)>,
}

impl Deduplicator {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            cache: Vec::new(),
        }
    }

    /// Seeds the cache with simhashes of items collected in the lookback
    /// window (72h per SPEC_FULL.md §4.3), oldest first so the earliest
    /// collected item wins ties as canonical.
    pub fn load_existing(&mut self, hashes: impl IntoIterator<Item = (u64, i64)>) {
        self.cache.extend(hashes);
    }

    /// Checks a new item's hash against the cache without mutating it.
    pub fn check(&self, hash: u64) -> DedupVerdict {
        for &(existing_hash, id) in &self.cache {
            if hamming_distance(hash, existing_hash) <= self.threshold {
                return DedupVerdict::Duplicate { canonical_id: id };
            }
        }
        DedupVerdict::Unique
    }

    /// Adds a unique item's hash to the cache so later items in the same
    /// cycle can be caught as its near-duplicates too.
    pub fn record(&mut self, hash: u64, id: i64) {
        self.cache.push((hash, id));
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hamming_distance_symmetric_and_bounded() {
        let a = 0x0F0F_0F0F_0F0F_0F0Fu64;
        let b = 0xFF00_FF00_FF00_FF00u64;
        assert_eq!(hamming_distance(a, b), hamming_distance(b, a));
        assert!(hamming_distance(a, b) <= 64);
    }

    #[test]
    fn hamming_distance_zero_iff_equal() {
        assert_eq!(hamming_distance(42, 42), 0);
        assert_ne!(hamming_distance(42, 43), 0);
    }

    #[test]
    fn simhash_stable_for_same_input() {
        let text = "Авария на водоканале в Екатеринбурге";
        assert_eq!(simhash(text), simhash(text));
    }

    #[test]
    fn simhash_near_duplicate_small_edit_has_small_distance() {
        let base = "Прорыв трубы теплотрассы в Екатеринбурге дома без отопления сегодня утром";
        let edited = "Прорыв трубы теплотрассы в Екатеринбурге дома без отопления сейчас утром";
        let d = hamming_distance(simhash(base), simhash(edited));
        assert!(d <= 8, "distance was {d}");
    }

    #[test]
    fn simhash_unrelated_texts_differ_substantially() {
        let a = simhash("Авария на водоканале привела к отключению воды в нескольких домах");
        let b = simhash("Местная футбольная команда выиграла товарищеский матч в минувшие выходные");
        assert!(hamming_distance(a, b) > 8);
    }

    #[test]
    fn empty_token_set_yields_zero_hash() {
        assert_eq!(simhash("a an at"), 0);
    }

    #[test]
    fn deduplicator_flags_within_threshold_and_records_canonical() {
        let mut dedup = Deduplicator::new(3);
        let first = simhash("Прорыв трубы теплотрассы в Екатеринбурге дома без отопления");
        dedup.record(first, 1);

        let second = simhash("Прорыв трубы теплотрассы в Екатеринбурге, дома без отопления");
        match dedup.check(second) {
            DedupVerdict::Duplicate { canonical_id } => assert_eq!(canonical_id, 1),
            DedupVerdict::Unique => panic!("expected near-duplicate to be flagged"),
        }
    }

    #[test]
    fn deduplicator_passes_unrelated_item() {
        let mut dedup = Deduplicator::new(3);
        dedup.record(simhash("Авария на водоканале в Москве"), 1);
        let verdict = dedup.check(simhash("Местная футбольная команда выиграла матч"));
        assert_eq!(verdict, DedupVerdict::Unique);
    }
}
