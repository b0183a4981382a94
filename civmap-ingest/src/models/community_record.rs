//! Per-village community records
//!
//! A record exists in two tiers. The base tier is written by offline
//! generation and batch enrichment; the override tier holds live edits as a
//! partial [`RecordPatch`]. The reader always sees the merged result, which
//! is recomputed on every read and never stored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form JSON object
pub type Fields = Map<String, Value>;

/// Item of a keyed collection
///
/// Everything beyond `id` is preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedItem {
    /// Unique within its collection
    pub id: String,

    /// Remaining item fields
    #[serde(flatten)]
    pub fields: Fields,
}

impl KeyedItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Fields::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.get_str("title")
    }
}

/// Collections merged item-by-item on `id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyedCollection {
    Events,
    Projects,
    TravelSpots,
    CultureHeritages,
    CareActions,
    CommunityBuildings,
}

impl KeyedCollection {
    pub const ALL: [KeyedCollection; 6] = [
        KeyedCollection::Events,
        KeyedCollection::Projects,
        KeyedCollection::TravelSpots,
        KeyedCollection::CultureHeritages,
        KeyedCollection::CareActions,
        KeyedCollection::CommunityBuildings,
    ];

    /// JSON field name
    pub fn field_name(self) -> &'static str {
        match self {
            KeyedCollection::Events => "events",
            KeyedCollection::Projects => "projects",
            KeyedCollection::TravelSpots => "travelSpots",
            KeyedCollection::CultureHeritages => "cultureHeritages",
            KeyedCollection::CareActions => "careActions",
            KeyedCollection::CommunityBuildings => "communityBuildings",
        }
    }
}

/// Nested object field merged one level deep
pub const WIKI_FIELD: &str = "wiki";

/// Complete village record (base tier, or the merged read view)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityRecord {
    /// Free-text village description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Village chief name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub chief: String,

    /// Population as text (sources disagree on number formatting)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub population: String,

    #[serde(default)]
    pub events: Vec<KeyedItem>,
    #[serde(default)]
    pub projects: Vec<KeyedItem>,
    #[serde(default)]
    pub travel_spots: Vec<KeyedItem>,
    #[serde(default)]
    pub culture_heritages: Vec<KeyedItem>,
    #[serde(default)]
    pub care_actions: Vec<KeyedItem>,
    #[serde(default)]
    pub community_buildings: Vec<KeyedItem>,

    /// Public persons (`name`, `role`, `title`, ...), kept as written
    #[serde(default)]
    pub people: Vec<Fields>,
    #[serde(default)]
    pub tags: Vec<String>,

    /// Structured encyclopedia-style sub-object
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub wiki: Fields,

    /// Unrecognized top-level fields, carried through untouched
    #[serde(flatten)]
    pub extra: Fields,
}

impl CommunityRecord {
    pub fn collection(&self, kind: KeyedCollection) -> &Vec<KeyedItem> {
        match kind {
            KeyedCollection::Events => &self.events,
            KeyedCollection::Projects => &self.projects,
            KeyedCollection::TravelSpots => &self.travel_spots,
            KeyedCollection::CultureHeritages => &self.culture_heritages,
            KeyedCollection::CareActions => &self.care_actions,
            KeyedCollection::CommunityBuildings => &self.community_buildings,
        }
    }

    pub fn collection_mut(&mut self, kind: KeyedCollection) -> &mut Vec<KeyedItem> {
        match kind {
            KeyedCollection::Events => &mut self.events,
            KeyedCollection::Projects => &mut self.projects,
            KeyedCollection::TravelSpots => &mut self.travel_spots,
            KeyedCollection::CultureHeritages => &mut self.culture_heritages,
            KeyedCollection::CareActions => &mut self.care_actions,
            KeyedCollection::CommunityBuildings => &mut self.community_buildings,
        }
    }

    /// Every full record is also a patch that sets all of its fields
    pub fn into_patch(self) -> RecordPatch {
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
        RecordPatch {
            description: non_empty(self.description),
            chief: non_empty(self.chief),
            population: non_empty(self.population),
            events: Some(self.events),
            projects: Some(self.projects),
            travel_spots: Some(self.travel_spots),
            culture_heritages: Some(self.culture_heritages),
            care_actions: Some(self.care_actions),
            community_buildings: Some(self.community_buildings),
            people: Some(self.people),
            tags: Some(self.tags),
            wiki: if self.wiki.is_empty() { None } else { Some(self.wiki) },
            extra: self.extra,
        }
    }
}

/// Read-time merge of base and override; never persisted
pub type MergedRecord = CommunityRecord;

/// Partial record; absent fields leave the lower tier untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chief: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<KeyedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<KeyedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_spots: Option<Vec<KeyedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub culture_heritages: Option<Vec<KeyedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub care_actions: Option<Vec<KeyedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_buildings: Option<Vec<KeyedItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people: Option<Vec<Fields>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki: Option<Fields>,

    #[serde(flatten)]
    pub extra: Fields,
}

impl RecordPatch {
    pub fn collection(&self, kind: KeyedCollection) -> Option<&Vec<KeyedItem>> {
        match kind {
            KeyedCollection::Events => self.events.as_ref(),
            KeyedCollection::Projects => self.projects.as_ref(),
            KeyedCollection::TravelSpots => self.travel_spots.as_ref(),
            KeyedCollection::CultureHeritages => self.culture_heritages.as_ref(),
            KeyedCollection::CareActions => self.care_actions.as_ref(),
            KeyedCollection::CommunityBuildings => self.community_buildings.as_ref(),
        }
    }

    pub fn collection_mut(&mut self, kind: KeyedCollection) -> &mut Option<Vec<KeyedItem>> {
        match kind {
            KeyedCollection::Events => &mut self.events,
            KeyedCollection::Projects => &mut self.projects,
            KeyedCollection::TravelSpots => &mut self.travel_spots,
            KeyedCollection::CultureHeritages => &mut self.culture_heritages,
            KeyedCollection::CareActions => &mut self.care_actions,
            KeyedCollection::CommunityBuildings => &mut self.community_buildings,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_camel_case() {
        let mut record = CommunityRecord {
            chief: "陳里長".to_string(),
            ..Default::default()
        };
        record
            .travel_spots
            .push(KeyedItem::new("spot-1").with("title", "頭前溪步道"));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["chief"], "陳里長");
        assert_eq!(value["travelSpots"][0]["id"], "spot-1");
        assert_eq!(value["travelSpots"][0]["title"], "頭前溪步道");
        assert!(value.get("description").is_none());
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = json!({
            "description": "河岸社區",
            "careActions": [{"id": "c1", "title": "共餐", "status": "ongoing"}],
            "name": "竹北里",
            "coordinates": [121.0, 24.8]
        });
        let record: CommunityRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.extra["name"], "竹北里");
        assert_eq!(record.care_actions[0].get_str("status"), Some("ongoing"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["coordinates"], raw["coordinates"]);
        assert_eq!(back["careActions"], raw["careActions"]);
    }

    #[test]
    fn test_collection_accessors_cover_all_kinds() {
        let mut record = CommunityRecord::default();
        for kind in KeyedCollection::ALL {
            record.collection_mut(kind).push(KeyedItem::new(kind.field_name()));
        }
        let value = serde_json::to_value(&record).unwrap();
        for kind in KeyedCollection::ALL {
            assert_eq!(value[kind.field_name()][0]["id"], kind.field_name());
        }
    }

    #[test]
    fn test_patch_skips_absent_fields() {
        let patch = RecordPatch {
            tags: Some(vec!["長照".to_string()]),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"tags": ["長照"]}));
        assert!(!patch.is_empty());
        assert!(RecordPatch::default().is_empty());
    }
}
