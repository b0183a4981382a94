//! Raw JSON → typed record coercion
//!
//! Records arrive from hand-edited files, generators and live edit requests
//! with inconsistent shapes (an object where a name is expected, a number
//! where text is expected, a bare string instead of a list). Each field shape
//! has its own sanitizer. Coercions are logged at debug level and never fail.
//!
//! Sanitizing already-sanitized output is a no-op.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::IngestError;
use crate::models::community_record::{
    CommunityRecord, Fields, KeyedCollection, KeyedItem, RecordPatch, WIKI_FIELD,
};

/// Keys tried, in order, when an object stands in for a scalar
const OBJECT_LABEL_KEYS: [&str; 3] = ["name", "id", "title"];

/// Keys a keyed item's id may be derived from, in order
const ID_SOURCE_KEYS: [&str; 2] = ["title", "name"];

/// Hex digits of the content digest used when an item has no label
const CONTENT_DIGEST_CHARS: usize = 12;

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn log_fallback(field: &str, from: &'static str, to: &'static str) {
    let fallback = IngestError::SanitizationFallback {
        field: field.to_string(),
        from,
        to,
    };
    tracing::debug!(%fallback, "Sanitization fallback");
}

/// Coerce a value expected to be text
///
/// `None` for null. Objects yield their `name`, `id` or `title`, else their
/// JSON text; arrays join their sanitized elements.
pub fn sanitize_scalar(field: &str, value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            log_fallback(field, "number", "string");
            Some(n.to_string())
        }
        Value::Bool(b) => {
            log_fallback(field, "bool", "string");
            Some(b.to_string())
        }
        Value::Object(map) => {
            log_fallback(field, "object", "string");
            let label = OBJECT_LABEL_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .filter(|v| !v.is_null())
                .find_map(|v| sanitize_scalar(field, v));
            Some(label.unwrap_or_else(|| value.to_string()))
        }
        Value::Array(items) => {
            log_fallback(field, "array", "string");
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| sanitize_scalar(field, v))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            Some(parts.join("、"))
        }
    }
}

/// Coerce a value expected to be a list of strings
///
/// Elements are sanitized as scalars, trimmed, and dropped when empty. A bare
/// scalar becomes a one-element list.
pub fn sanitize_string_list(field: &str, value: &Value) -> Option<Vec<String>> {
    let clean = |v: &Value| {
        sanitize_scalar(field, v)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    match value {
        Value::Null => None,
        Value::Array(items) => {
            let list: Vec<String> = items.iter().filter_map(clean).collect();
            if list.len() != items.len() {
                log_fallback(field, "array", "filtered array");
            }
            Some(list)
        }
        other => {
            log_fallback(field, value_kind(other), "array");
            Some(clean(other).into_iter().collect())
        }
    }
}

/// Coerce a list of free-form objects
///
/// Objects are kept verbatim. Any other element becomes `{"name": text}`;
/// null and blank elements are dropped. A bare value becomes a one-element
/// list.
pub fn sanitize_object_list(field: &str, value: &Value) -> Option<Vec<Fields>> {
    let element = |v: &Value| -> Option<Fields> {
        match v {
            Value::Object(map) => Some(map.clone()),
            Value::Null => {
                log_fallback(field, "null", "dropped element");
                None
            }
            other => {
                log_fallback(field, value_kind(other), "object");
                let name = sanitize_scalar(field, other)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())?;
                let mut map = Map::new();
                map.insert("name".to_string(), Value::String(name));
                Some(map)
            }
        }
    };

    match value {
        Value::Null => None,
        Value::Array(items) => Some(items.iter().filter_map(element).collect()),
        other => {
            log_fallback(field, value_kind(other), "array");
            Some(element(other).into_iter().collect())
        }
    }
}

/// Coerce a keyed collection
///
/// Items without a usable id get one derived from their title/name, else
/// from a digest of their content. Duplicate ids collapse onto the first
/// position holding the last value.
pub fn sanitize_keyed_items(field: &str, value: &Value) -> Option<Vec<KeyedItem>> {
    let raw_items: Vec<&Value> = match value {
        Value::Null => return None,
        Value::Array(items) => items.iter().collect(),
        other => {
            log_fallback(field, value_kind(other), "array");
            vec![other]
        }
    };

    let mut items: Vec<KeyedItem> = Vec::with_capacity(raw_items.len());
    for raw in raw_items {
        let Some(item) = sanitize_item(field, raw) else {
            continue;
        };

        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                log_fallback(field, "duplicate id", "last value");
                *existing = item;
            }
            None => items.push(item),
        }
    }

    Some(items)
}

fn sanitize_item(field: &str, raw: &Value) -> Option<KeyedItem> {
    let mut fields: Fields = match raw {
        Value::Null => {
            log_fallback(field, "null", "dropped item");
            return None;
        }
        Value::Object(map) => map.clone(),
        other => {
            log_fallback(field, value_kind(other), "object");
            let mut map = Map::new();
            map.insert("title".to_string(), Value::String(sanitize_scalar(field, other)?));
            map
        }
    };

    let explicit_id = fields
        .remove("id")
        .and_then(|id| sanitize_scalar(field, &id))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    let id = match explicit_id {
        Some(id) => id,
        None => {
            log_fallback(field, "missing id", "derived id");
            derive_id(field, &fields)
        }
    };

    Some(KeyedItem { id, fields })
}

fn derive_id(field: &str, fields: &Fields) -> String {
    let label = ID_SOURCE_KEYS
        .iter()
        .filter_map(|key| fields.get(*key))
        .filter_map(|v| sanitize_scalar(field, v))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty());

    match label {
        Some(label) => format!("{}-{}", field, label),
        None => format!("{}-{}", field, content_digest(fields)),
    }
}

/// Leading hex of the SHA-256 of an item's JSON text
fn content_digest(fields: &Fields) -> String {
    let text = serde_json::to_string(fields).unwrap_or_default();
    let digest = format!("{:x}", Sha256::digest(text.as_bytes()));
    digest[..CONTENT_DIGEST_CHARS].to_string()
}

/// Coerce a nested object; anything else is dropped
pub fn sanitize_object(field: &str, value: &Value) -> Option<Fields> {
    match value {
        Value::Null => None,
        Value::Object(map) => Some(map.clone()),
        other => {
            log_fallback(field, value_kind(other), "absent");
            None
        }
    }
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, IngestError> {
    value.as_object().ok_or_else(|| {
        IngestError::Common(civmap_common::Error::InvalidInput(format!(
            "{} must be a JSON object, got {}",
            what,
            value_kind(value)
        )))
    })
}

/// Sanitize a raw JSON document into a partial record
pub fn sanitize_patch(value: &Value) -> Result<RecordPatch, IngestError> {
    let object = as_object(value, "record patch")?;
    let mut patch = RecordPatch::default();

    for (name, raw) in object {
        match name.as_str() {
            "description" => patch.description = sanitize_scalar(name, raw),
            "chief" => patch.chief = sanitize_scalar(name, raw),
            "population" => patch.population = sanitize_scalar(name, raw),
            "people" => patch.people = sanitize_object_list(name, raw),
            "tags" => patch.tags = sanitize_string_list(name, raw),
            WIKI_FIELD => patch.wiki = sanitize_object(name, raw),
            other => match keyed_collection(other) {
                Some(kind) => *patch.collection_mut(kind) = sanitize_keyed_items(name, raw),
                None => {
                    patch.extra.insert(name.clone(), raw.clone());
                }
            },
        }
    }

    Ok(patch)
}

/// Sanitize a raw JSON document into a full record
pub fn sanitize_record(value: &Value) -> Result<CommunityRecord, IngestError> {
    let patch = sanitize_patch(value)?;
    let mut record = CommunityRecord {
        description: patch.description.unwrap_or_default(),
        chief: patch.chief.unwrap_or_default(),
        population: patch.population.unwrap_or_default(),
        people: patch.people.unwrap_or_default(),
        tags: patch.tags.unwrap_or_default(),
        wiki: patch.wiki.unwrap_or_default(),
        extra: patch.extra,
        ..Default::default()
    };

    let mut keyed = [
        (KeyedCollection::Events, patch.events),
        (KeyedCollection::Projects, patch.projects),
        (KeyedCollection::TravelSpots, patch.travel_spots),
        (KeyedCollection::CultureHeritages, patch.culture_heritages),
        (KeyedCollection::CareActions, patch.care_actions),
        (KeyedCollection::CommunityBuildings, patch.community_buildings),
    ];
    for (kind, items) in keyed.iter_mut() {
        *record.collection_mut(*kind) = items.take().unwrap_or_default();
    }

    Ok(record)
}

fn keyed_collection(name: &str) -> Option<KeyedCollection> {
    KeyedCollection::ALL
        .into_iter()
        .find(|kind| kind.field_name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_scalar_prefers_name_then_id_then_title() {
        assert_eq!(
            sanitize_scalar("chief", &json!({"name": "林美玲", "id": "p1"})),
            Some("林美玲".to_string())
        );
        assert_eq!(
            sanitize_scalar("chief", &json!({"id": "p1", "title": "里長"})),
            Some("p1".to_string())
        );
        assert_eq!(
            sanitize_scalar("chief", &json!({"title": "里長"})),
            Some("里長".to_string())
        );
        assert_eq!(
            sanitize_scalar("chief", &json!({"phone": "03-1234567"})),
            Some(r#"{"phone":"03-1234567"}"#.to_string())
        );
    }

    #[test]
    fn test_numbers_and_bools_become_text() {
        assert_eq!(sanitize_scalar("population", &json!(3214)), Some("3214".to_string()));
        assert_eq!(sanitize_scalar("description", &json!(true)), Some("true".to_string()));
        assert_eq!(sanitize_scalar("description", &Value::Null), None);
    }

    #[test]
    fn test_string_list_coercions() {
        assert_eq!(
            sanitize_string_list("tags", &json!(["老人共餐", "", {"name": "長照"}, 3, "  "])),
            Some(vec!["老人共餐".to_string(), "長照".to_string(), "3".to_string()])
        );
        assert_eq!(
            sanitize_string_list("tags", &json!("社區照顧")),
            Some(vec!["社區照顧".to_string()])
        );
        assert_eq!(sanitize_string_list("tags", &json!("")), Some(vec![]));
        assert_eq!(sanitize_string_list("tags", &Value::Null), None);
    }

    #[test]
    fn test_people_objects_kept_verbatim() {
        let people = sanitize_object_list(
            "people",
            &json!([
                {"role": "理事長", "name": "張三", "title": "北崙社區發展協會", "phone": 35550000},
                "  王五 ",
                "",
                7
            ]),
        )
        .unwrap();

        assert_eq!(people.len(), 3);
        assert_eq!(
            Value::Object(people[0].clone()),
            json!({"role": "理事長", "name": "張三", "title": "北崙社區發展協會", "phone": 35550000})
        );
        assert_eq!(people[1]["name"], "王五");
        assert_eq!(people[2]["name"], "7");

        let single = sanitize_object_list("people", &json!({"name": "陳六"})).unwrap();
        assert_eq!(single[0]["name"], "陳六");
        assert_eq!(sanitize_object_list("people", &Value::Null), None);
    }

    #[test]
    fn test_keyed_items_get_ids_and_collapse_duplicates() {
        let items = sanitize_keyed_items(
            "events",
            &json!([
                {"id": "e1", "title": "淨灘"},
                {"title": "中秋晚會"},
                {"date": "2024-01-01"},
                {"id": "e1", "title": "淨灘 (改期)"},
                {"id": 7, "title": "健走"},
                "市集",
                null
            ]),
        )
        .unwrap();

        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["e1", "events-中秋晚會", "events-065d305acccd", "7", "events-市集"]
        );
        assert_eq!(items[0].title(), Some("淨灘 (改期)"));
        assert!(!items[0].fields.contains_key("id"));
    }

    #[test]
    fn test_untitled_items_in_different_tiers_keep_distinct_ids() {
        use crate::services::record_reconciler::merge_by_id;

        let base = sanitize_keyed_items("events", &json!([{"note": "舊"}])).unwrap();
        let overrides = sanitize_keyed_items("events", &json!([{"note": "新"}])).unwrap();
        assert_eq!(base[0].id, "events-b837d6e83fd8");
        assert_ne!(base[0].id, overrides[0].id);

        let merged = merge_by_id(&base, &overrides);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].get_str("note"), Some("舊"));
        assert_eq!(merged[1].get_str("note"), Some("新"));

        // Same content, same id, wherever it sits
        let again = sanitize_keyed_items("events", &json!([{"title": "x"}, {"note": "舊"}])).unwrap();
        assert_eq!(again[1].id, base[0].id);
    }

    #[test]
    fn test_single_object_becomes_one_item_list() {
        let items = sanitize_keyed_items("projects", &json!({"id": "p1", "title": "綠美化"})).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "p1");
    }

    #[test]
    fn test_non_object_wiki_dropped() {
        assert!(sanitize_object("wiki", &json!("text")).is_none());
        assert!(sanitize_object("wiki", &json!({"history": "清代"})).is_some());
    }

    #[test]
    fn test_sanitize_record_routes_fields() {
        let record = sanitize_record(&json!({
            "description": "河岸聚落",
            "chief": {"name": "林美玲"},
            "population": 4521,
            "tags": "農村",
            "people": ["張三", null, {"role": "理事長", "name": "李四", "title": "北崙社區發展協會"}],
            "careActions": [{"title": "共餐"}],
            "wiki": {"history": "清代開墾"},
            "villageCode": "10004010-001"
        }))
        .unwrap();

        assert_eq!(record.chief, "林美玲");
        assert_eq!(record.population, "4521");
        assert_eq!(record.tags, vec!["農村"]);
        assert_eq!(record.people.len(), 2);
        assert_eq!(record.people[0]["name"], "張三");
        assert_eq!(record.people[1]["role"], "理事長");
        assert_eq!(record.people[1]["title"], "北崙社區發展協會");
        assert_eq!(record.care_actions[0].id, "careActions-共餐");
        assert_eq!(record.wiki["history"], "清代開墾");
        assert_eq!(record.extra["villageCode"], "10004010-001");
    }

    #[test]
    fn test_sanitization_is_idempotent() {
        let raw = json!({
            "description": ["河岸", "聚落"],
            "chief": {"id": "chief-1"},
            "population": 1200.5,
            "people": ["張三", {"name": "李四", "role": "理事長"}],
            "tags": ["a", "", " b "],
            "events": [{"title": "x"}, {"title": "x"}, {"id": 3}]
        });

        let once = sanitize_record(&raw).unwrap();
        let twice = sanitize_record(&serde_json::to_value(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.description, "河岸、聚落");
        assert_eq!(once.tags, vec!["a", "b"]);
        assert_eq!(once.events.len(), 2);
    }

    #[test]
    fn test_non_object_document_rejected() {
        assert!(sanitize_patch(&json!([1, 2])).is_err());
        assert!(sanitize_record(&json!("record")).is_err());
    }
}
