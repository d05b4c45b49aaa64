//! Region detection (SPEC_FULL.md §4.7): best-effort tagging of which
//! region/subject an item concerns, used for routing and display only — it
//! never gates a decision.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

fn region_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([А-Яа-яё]+(?:ая|ий|ый)?)\s+(область|край|республика)").unwrap()
    })
}

/// Default city → region map covering the reference deployment's core
/// coverage area. Operators extend it with a custom map via `with_custom_map`.
pub fn default_city_region_map() -> HashMap<String, String> {
    [
        ("москва", "Москва"),
        ("санкт-петербург", "Санкт-Петербург"),
        ("петербург", "Санкт-Петербург"),
        ("спб", "Санкт-Петербург"),
        ("екатеринбург", "Свердловская область"),
        ("новосибирск", "Новосибирская область"),
        ("казань", "Республика Татарстан"),
        ("нижний новгород", "Нижегородская область"),
        ("челябинск", "Челябинская область"),
        ("самара", "Самарская область"),
        ("уфа", "Республика Башкортостан"),
        ("ростов-на-дону", "Ростовская область"),
        ("ростов", "Ростовская область"),
        ("краснодар", "Краснодарский край"),
        ("воронеж", "Воронежская область"),
        ("пермь", "Пермский край"),
        ("красноярск", "Красноярский край"),
        ("волгоград", "Волгоградская область"),
        ("омск", "Омская область"),
        ("тюмень", "Тюменская область"),
        ("владивосток", "Приморский край"),
        ("хабаровск", "Хабаровский край"),
        ("ярославль", "Ярославская область"),
        ("архангельск", "Архангельская область"),
        ("сахалин", "Сахалинская область"),
        ("свердловская область", "Свердловская область"),
        ("ленобласть", "Ленинградская область"),
        ("ленинградская область", "Ленинградская область"),
        ("московская область", "Московская область"),
        ("подмосковье", "Московская область"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub struct RegionDetector {
    default_map: HashMap<String, String>,
    custom_map: HashMap<String, String>,
}

impl RegionDetector {
    pub fn new(default_map: HashMap<String, String>) -> Self {
        Self {
            default_map,
            custom_map: HashMap::new(),
        }
    }

    pub fn with_custom_map(mut self, custom_map: HashMap<String, String>) -> Self {
        self.custom_map = custom_map;
        self
    }

    /// Priority order: an explicit per-source region hint wins outright;
    /// then the title alone is scanned against the default map (a city named
    /// in the headline is the strongest organic signal); then the combined
    /// title+text is scanned against the operator's custom map; then against
    /// the default map again; finally a regex looks for a bare
    /// "<Adjective> область/край/республика" mention.
    pub fn detect(&self, source_hint: Option<&str>, title: &str, text: &str) -> Option<String> {
        if let Some(hint) = source_hint {
            if !hint.trim().is_empty() {
                return Some(hint.to_string());
            }
        }

        let title_lower = title.to_lowercase();
        if let Some(region) = find_in_map(&title_lower, &self.default_map) {
            return Some(region);
        }

        let combined = format!("{title} {text}").to_lowercase();
        if let Some(region) = find_in_map(&combined, &self.custom_map) {
            return Some(region);
        }
        if let Some(region) = find_in_map(&combined, &self.default_map) {
            return Some(region);
        }

        region_suffix_regex()
            .captures(&combined)
            .map(|caps| format!("{} {}", capitalize(&caps[1]), caps[2].to_string()))
    }
}

fn find_in_map(haystack: &str, map: &HashMap<String, String>) -> Option<String> {
    map.iter()
        .find(|(city, _)| haystack.contains(city.as_str()))
        .map(|(_, region)| region.clone())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_hint_wins_regardless_of_content() {
        let detector = RegionDetector::new(default_city_region_map());
        let region = detector.detect(Some("Свердловская область"), "Екатеринбург", "");
        assert_eq!(region, Some("Свердловская область".to_string()));
    }

    #[test]
    fn title_only_scan_against_default_map() {
        let detector = RegionDetector::new(default_city_region_map());
        let region = detector.detect(None, "Авария. Уфа сообщает о повреждении сетей", "текст без городов");
        assert_eq!(region, Some("Республика Башкортостан".to_string()));
    }

    #[test]
    fn custom_map_checked_before_default_map_on_combined_text() {
        let mut custom = HashMap::new();
        custom.insert("курган".to_string(), "Кастомный регион".to_string());
        let detector = RegionDetector::new(default_city_region_map()).with_custom_map(custom);
        let region = detector.detect(None, "Новости", "Авария произошла в Кургане вчера");
        assert_eq!(region, Some("Кастомный регион".to_string()));
    }

    #[test]
    fn regex_fallback_for_unmapped_region_mention() {
        let detector = RegionDetector::new(HashMap::new());
        let region = detector.detect(None, "Новости региона", "Авария случилась в Тульская область сегодня");
        assert_eq!(region, Some("Тульская область".to_string()));
    }

    #[test]
    fn none_when_nothing_matches() {
        let detector = RegionDetector::new(default_city_region_map());
        let region = detector.detect(None, "Заголовок без привязки", "Текст тоже без города");
        assert_eq!(region, None);
    }
}
