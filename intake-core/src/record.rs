//! Schema-agnostic record helpers.
//!
//! A record is a JSON object. The store never interprets fields beyond `id`,
//! `createdAt` and `updatedAt`.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// One entry in a table: a JSON object with string keys.
pub type Record = Map<String, Value>;

/// Field holding the caller-assigned record identifier.
pub const ID_FIELD: &str = "id";

/// Field stamped on append when absent.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Field stamped on every update.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Read the record's `id` as a string.
///
/// String ids are returned as-is; numeric ids are rendered in decimal so
/// `{"id": 7}` matches lookups for `"7"`.
pub fn record_id(record: &Record) -> Option<String> {
    match record.get(ID_FIELD)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// True when the record's `id` equals `id`.
pub fn has_id(record: &Record, id: &str) -> bool {
    match record.get(ID_FIELD) {
        Some(Value::String(s)) => s == id,
        Some(Value::Number(n)) => n.to_string() == id,
        _ => false,
    }
}

/// Stamp `createdAt` unless the caller already supplied one.
pub fn stamp_created(record: &mut Record) {
    if !record.contains_key(CREATED_AT_FIELD) {
        record.insert(CREATED_AT_FIELD.to_string(), Value::String(timestamp_now()));
    }
}

/// Shallow-merge `patch` onto `record` and stamp `updatedAt`.
pub fn merge_patch(record: &mut Record, patch: Record) {
    for (key, value) in patch {
        record.insert(key, value);
    }
    record.insert(UPDATED_AT_FIELD.to_string(), Value::String(timestamp_now()));
}

/// Table names map directly to file names, so only a conservative
/// character set is accepted.
pub fn is_valid_table_name(table: &str) -> bool {
    !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_record_id_string_and_number() {
        assert_eq!(record_id(&obj(json!({"id": "abc"}))), Some("abc".to_string()));
        assert_eq!(record_id(&obj(json!({"id": 7}))), Some("7".to_string()));
        assert_eq!(record_id(&obj(json!({"id": null}))), None);
        assert_eq!(record_id(&obj(json!({"name": "x"}))), None);
    }

    #[test]
    fn test_has_id() {
        let record = obj(json!({"id": 12, "name": "A"}));
        assert!(has_id(&record, "12"));
        assert!(!has_id(&record, "13"));
    }

    #[test]
    fn test_stamp_created_preserves_existing() {
        let mut record = obj(json!({"id": "1", "createdAt": "2020-01-01T00:00:00.000Z"}));
        stamp_created(&mut record);
        assert_eq!(record[CREATED_AT_FIELD], json!("2020-01-01T00:00:00.000Z"));

        let mut fresh = obj(json!({"id": "2"}));
        stamp_created(&mut fresh);
        assert!(fresh[CREATED_AT_FIELD].is_string());
    }

    #[test]
    fn test_merge_patch_is_shallow() {
        let mut record = obj(json!({"id": "1", "name": "A", "meta": {"a": 1, "b": 2}}));
        merge_patch(&mut record, obj(json!({"name": "B", "meta": {"a": 3}})));
        assert_eq!(record["name"], json!("B"));
        assert_eq!(record["meta"], json!({"a": 3}));
        assert!(record[UPDATED_AT_FIELD].is_string());
    }

    proptest::proptest! {
        #[test]
        fn prop_merge_patch_overwrites_every_patched_key(
            base in proptest::collection::btree_map("[a-z]{1,6}", 0i64..100, 0..8),
            patch in proptest::collection::btree_map("[a-z]{1,6}", 0i64..100, 0..8),
        ) {
            let mut record: Record = base.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let patch_record: Record = patch.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            merge_patch(&mut record, patch_record);

            for (key, value) in &patch {
                proptest::prop_assert_eq!(&record[key.as_str()], &json!(value));
            }
            for (key, value) in &base {
                if !patch.contains_key(key) && key != UPDATED_AT_FIELD {
                    proptest::prop_assert_eq!(&record[key.as_str()], &json!(value));
                }
            }
        }
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp_now();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("reports"));
        assert!(is_valid_table_name("audit_log-2"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("../secrets"));
        assert!(!is_valid_table_name("a/b"));
        assert!(!is_valid_table_name("reports.json"));
    }
}
