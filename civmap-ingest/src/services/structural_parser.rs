//! Structural address parsing (fast path)
//!
//! Most source addresses spell out county, town and village in order, so the
//! village key can often be read straight off the string without touching
//! the network. The known names come from a [`Gazetteer`] built from the
//! canonical key set.

use civmap_common::VillageKey;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static VILLAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^\d\s區鄉鎮市路街巷弄號樓村里]{1,4}[村里]").expect("static regex")
});

/// Known county and town names
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    /// Longest first
    counties: Vec<String>,
    towns: BTreeMap<String, Vec<String>>,
}

impl Gazetteer {
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a VillageKey>) -> Self {
        let mut towns: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in keys {
            let list = towns.entry(key.county().to_string()).or_default();
            if !list.iter().any(|t| t == key.town()) {
                list.push(key.town().to_string());
            }
        }

        let mut counties: Vec<String> = towns.keys().cloned().collect();
        counties.sort_by_key(|c| std::cmp::Reverse(c.chars().count()));

        Self { counties, towns }
    }

    pub fn counties(&self) -> &[String] {
        &self.counties
    }

    pub fn towns(&self, county: &str) -> &[String] {
        self.towns.get(county).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Key read off an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub key: VillageKey,
    /// The village was not written in the address and was guessed from the
    /// town name
    pub guessed: bool,
}

/// `台` → `臺`, whitespace removed
pub fn normalize_address(address: &str) -> String {
    address
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '台' { '臺' } else { c })
        .collect()
}

/// Parse an address into a village key
///
/// The county is the leading known county name, else `default_county`. The
/// town is the earliest known town of that county found in the remainder;
/// without a default county every county's towns are searched. The village
/// is the first short run ending in `村`/`里` after the town. When only the
/// town is found the result is a guess of `{town stem}村`.
pub fn parse_address(
    address: &str,
    default_county: Option<&str>,
    gazetteer: &Gazetteer,
) -> Option<ParsedAddress> {
    let normalized = normalize_address(address);
    if normalized.is_empty() {
        return None;
    }

    let explicit = gazetteer
        .counties()
        .iter()
        .find(|c| normalized.starts_with(c.as_str()));
    let rest = match explicit {
        Some(county) => &normalized[county.len()..],
        None => normalized.as_str(),
    };

    let (county, town, town_end) = match explicit.map(String::as_str).or(default_county) {
        Some(county) => {
            let (town, end) = find_town(rest, gazetteer.towns(county))?;
            (county.to_string(), town, end)
        }
        None => gazetteer
            .counties()
            .iter()
            .filter_map(|county| {
                find_town(rest, gazetteer.towns(county)).map(|(town, end)| (county.clone(), town, end))
            })
            .min_by_key(|(_, _, end)| *end)?,
    };

    let after_town = &rest[town_end..];
    match VILLAGE.find(after_town) {
        Some(m) => Some(ParsedAddress {
            key: VillageKey::new(county, town, m.as_str()),
            guessed: false,
        }),
        None => {
            let stem: String = town
                .chars()
                .filter(|c| !matches!(c, '鄉' | '鎮' | '市' | '區'))
                .collect();
            let village = format!("{}村", stem);
            Some(ParsedAddress {
                key: VillageKey::new(county, town, village),
                guessed: true,
            })
        }
    }
}

/// Earliest-starting town token; longer name wins a tie
fn find_town(text: &str, towns: &[String]) -> Option<(String, usize)> {
    towns
        .iter()
        .filter_map(|town| text.find(town.as_str()).map(|start| (start, town)))
        .min_by(|(a_start, a), (b_start, b)| {
            a_start
                .cmp(b_start)
                .then_with(|| b.len().cmp(&a.len()))
        })
        .map(|(start, town)| (town.clone(), start + town.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gazetteer() -> Gazetteer {
        let keys = [
            VillageKey::new("新竹縣", "竹北市", "北崙里"),
            VillageKey::new("新竹縣", "竹北市", "竹北里"),
            VillageKey::new("新竹縣", "橫山鄉", "橫山村"),
            VillageKey::new("新竹縣", "竹東鎮", "竹東里"),
            VillageKey::new("新竹市", "東區", "光復里"),
            VillageKey::new("新竹市", "北區", "中山里"),
            VillageKey::new("臺中市", "東區", "東門里"),
        ];
        Gazetteer::from_keys(keys.iter())
    }

    fn parse(address: &str, county: Option<&str>) -> Option<ParsedAddress> {
        parse_address(address, county, &gazetteer())
    }

    #[test]
    fn test_full_address() {
        let parsed = parse("新竹縣竹北市北崙里博愛街100號", None).unwrap();
        assert_eq!(parsed.key.to_string(), "新竹縣_竹北市_北崙里");
        assert!(!parsed.guessed);
    }

    #[test]
    fn test_default_county_applies_without_prefix() {
        let parsed = parse("東區光復里光復路二段101號", Some("新竹市")).unwrap();
        assert_eq!(parsed.key.to_string(), "新竹市_東區_光復里");
    }

    #[test]
    fn test_explicit_county_overrides_default() {
        let parsed = parse("台中市東區東門里1號", Some("新竹市")).unwrap();
        assert_eq!(parsed.key.county(), "臺中市");
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let parsed = parse("新竹縣 竹北市 北崙里 博愛街", None).unwrap();
        assert_eq!(parsed.key.village(), "北崙里");
    }

    #[test]
    fn test_street_before_village_is_not_a_village() {
        let parsed = parse("新竹縣竹東鎮中正路竹東里5號", None).unwrap();
        assert_eq!(parsed.key.village(), "竹東里");
    }

    #[test]
    fn test_missing_village_yields_guess() {
        let parsed = parse("新竹縣橫山鄉中豐路一段100號", None).unwrap();
        assert_eq!(parsed.key.to_string(), "新竹縣_橫山鄉_橫山村");
        assert!(parsed.guessed);
    }

    #[test]
    fn test_unknown_town_is_none() {
        assert!(parse("新竹縣某某鄉中正路1號", None).is_none());
        assert!(parse("高雄市苓雅區四維三路2號", Some("新竹縣")).is_none());
        assert!(parse("", Some("新竹縣")).is_none());
    }

    #[test]
    fn test_no_default_county_searches_all() {
        let parsed = parse("竹北市竹北里中正西路1號", None).unwrap();
        assert_eq!(parsed.key.to_string(), "新竹縣_竹北市_竹北里");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_address(" 台中市 東區 "), "臺中市東區");
    }
}
