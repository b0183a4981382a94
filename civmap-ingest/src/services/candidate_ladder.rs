//! Address cleaning candidate ladder
//!
//! Free-text addresses often carry detail the geocoder cannot match (floors,
//! neighborhood numbers, annotations). The ladder yields progressively
//! simplified variants of one address, each step stripping one more kind of
//! detail on top of the previous step:
//!
//! 0. the trimmed original
//! 1. floor/unit suffix (`4樓`, `2F`, `四樓`)
//! 2. neighborhood number (`8鄰`)
//! 3. parenthetical annotations, ASCII or full-width
//! 4. trailing room qualifier (`205室`)
//! 5. leading county/city token
//! 6. house number (`100號`, `27-16號`)
//!
//! Variants are produced lazily and duplicates are skipped, so a caller that
//! stops at the first hit never pays for the remaining transforms.

use once_cell::sync::Lazy;
use regex::Regex;

static FLOOR_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\d+\s*[樓Ff]").expect("static regex"));
static FLOOR_NUMERALS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[一二三四五六七八九十]+\s*樓").expect("static regex"));
static NEIGHBORHOOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\d+\s*鄰").expect("static regex"));
static PARENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(\([^)]*\)|（[^）]*）)").expect("static regex"));
static TRAILING_ROOM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\d*\s*室$").expect("static regex"));
static HOUSE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:[-之]\d+)?\s*號").expect("static regex"));

/// Settings the transforms need beyond the address itself
#[derive(Debug, Clone, Default)]
pub struct LadderConfig {
    /// County/city names stripped when they lead the address
    pub county_prefixes: Vec<String>,
}

impl LadderConfig {
    pub fn new(county_prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut county_prefixes: Vec<String> =
            county_prefixes.into_iter().map(Into::into).collect();
        // Longest first so a longer name is never shadowed by its prefix
        county_prefixes.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));
        Self { county_prefixes }
    }
}

type Transform = fn(&str, &LadderConfig) -> String;

const STEPS: &[(&str, Transform)] = &[
    ("floor", strip_floor),
    ("neighborhood", strip_neighborhood),
    ("annotation", strip_annotations),
    ("room", strip_trailing_room),
    ("county", strip_county),
    ("house_number", strip_house_number),
];

/// One rung of the ladder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub query: String,
    /// Name of the last transform applied (`original` for rung 0)
    pub step: &'static str,
}

/// Lazily evaluated sequence of address variants
pub struct CandidateLadder<'a> {
    config: &'a LadderConfig,
    current: String,
    next_step: Option<usize>,
    seen: Vec<String>,
}

impl<'a> CandidateLadder<'a> {
    pub fn new(address: &str, config: &'a LadderConfig) -> Self {
        Self {
            config,
            current: address.trim().to_string(),
            next_step: None,
            seen: Vec::new(),
        }
    }

    fn accept(&mut self, query: String, step: &'static str) -> Option<Candidate> {
        if query.is_empty() || self.seen.contains(&query) {
            return None;
        }
        self.seen.push(query.clone());
        Some(Candidate { query, step })
    }
}

impl Iterator for CandidateLadder<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = match self.next_step {
                None => {
                    self.next_step = Some(0);
                    let original = self.current.clone();
                    if let Some(candidate) = self.accept(original, "original") {
                        return Some(candidate);
                    }
                    continue;
                }
                Some(step) if step >= STEPS.len() => return None,
                Some(step) => step,
            };

            self.next_step = Some(step + 1);
            let (name, transform) = STEPS[step];
            self.current = transform(&self.current, self.config);
            let query = self.current.clone();
            if let Some(candidate) = self.accept(query, name) {
                return Some(candidate);
            }
        }
    }
}

fn strip_floor(address: &str, _: &LadderConfig) -> String {
    let cleaned = FLOOR_DIGITS.replace_all(address, "");
    FLOOR_NUMERALS.replace_all(&cleaned, "").trim().to_string()
}

fn strip_neighborhood(address: &str, _: &LadderConfig) -> String {
    NEIGHBORHOOD.replace_all(address, "").trim().to_string()
}

fn strip_annotations(address: &str, _: &LadderConfig) -> String {
    PARENS.replace_all(address, "").trim().to_string()
}

fn strip_trailing_room(address: &str, _: &LadderConfig) -> String {
    TRAILING_ROOM.replace(address, "").trim().to_string()
}

fn strip_county(address: &str, config: &LadderConfig) -> String {
    config
        .county_prefixes
        .iter()
        .find_map(|prefix| address.strip_prefix(prefix.as_str()))
        .unwrap_or(address)
        .trim()
        .to_string()
}

fn strip_house_number(address: &str, _: &LadderConfig) -> String {
    HOUSE_NUMBER.replace_all(address, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hsinchu() -> LadderConfig {
        LadderConfig::new(["新竹縣", "新竹市"])
    }

    fn queries(address: &str, config: &LadderConfig) -> Vec<String> {
        CandidateLadder::new(address, config)
            .map(|c| c.query)
            .collect()
    }

    #[test]
    fn test_floor_address_ladder() {
        let config = hsinchu();
        assert_eq!(
            queries("新竹縣竹北市文興路100號4樓", &config),
            vec![
                "新竹縣竹北市文興路100號4樓",
                "新竹縣竹北市文興路100號",
                "竹北市文興路100號",
                "竹北市文興路",
            ]
        );
    }

    #[test]
    fn test_steps_are_cumulative_and_named() {
        let config = hsinchu();
        let ladder: Vec<Candidate> =
            CandidateLadder::new(" 新竹市東區8鄰光復路二段101號(清大) 3F ", &config).collect();

        let steps: Vec<&str> = ladder.iter().map(|c| c.step).collect();
        assert_eq!(
            steps,
            vec!["original", "floor", "neighborhood", "annotation", "county", "house_number"]
        );
        assert_eq!(ladder[0].query, "新竹市東區8鄰光復路二段101號(清大) 3F");
        assert_eq!(ladder[3].query, "新竹市東區光復路二段101號");
        assert_eq!(ladder[5].query, "東區光復路二段");
    }

    #[test]
    fn test_full_width_parentheses_and_room() {
        let config = hsinchu();
        let all = queries("竹東鎮東林路100號（活動中心）205室", &config);
        assert_eq!(all.first().unwrap(), "竹東鎮東林路100號（活動中心）205室");
        assert!(all.contains(&"竹東鎮東林路100號205室".to_string()));
        assert!(all.contains(&"竹東鎮東林路100號".to_string()));
        assert_eq!(all.last().unwrap(), "竹東鎮東林路");
    }

    #[test]
    fn test_chinese_numeral_floor() {
        let config = hsinchu();
        let all = queries("新竹縣竹北市光明二街91號四樓", &config);
        assert_eq!(all[1], "新竹縣竹北市光明二街91號");
    }

    #[test]
    fn test_clean_address_yields_few_distinct_rungs() {
        let config = hsinchu();
        assert_eq!(queries("竹北市博愛街", &config), vec!["竹北市博愛街"]);
    }

    #[test]
    fn test_blank_address_yields_nothing() {
        let config = hsinchu();
        assert!(queries("   ", &config).is_empty());
    }

    #[test]
    fn test_ladder_is_lazy() {
        let config = hsinchu();
        let mut ladder = CandidateLadder::new("新竹縣竹北市文興路100號4樓", &config);
        let first = ladder.next().unwrap();
        assert_eq!(first.step, "original");
        // No transform has run yet
        assert_eq!(ladder.current, "新竹縣竹北市文興路100號4樓");
    }

    #[test]
    fn test_longest_county_prefix_wins() {
        let config = LadderConfig::new(["新竹", "新竹縣"]);
        assert_eq!(config.county_prefixes[0], "新竹縣");
        assert_eq!(strip_county("新竹縣湖口鄉", &config), "湖口鄉");
    }
}
