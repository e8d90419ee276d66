//! Conversion between plain JSON values and Firestore's typed value wire
//! format (`{"stringValue": ...}`, `{"mapValue": {"fields": ...}}`, ...).

use contactbook_core::Document;
use serde_json::{Map, Number, Value, json};

use crate::error::RemoteError;

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or_default() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn encode_fields(fields: &Document) -> Value {
    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    Value::Object(encoded)
}

pub fn decode_value(value: &Value) -> Result<Value, RemoteError> {
    let Some(map) = value.as_object() else {
        return Err(RemoteError::Decode(format!("typed value is not an object: {value}")));
    };
    let Some((kind, inner)) = map.iter().next() else {
        return Err(RemoteError::Decode("empty typed value".into()));
    };
    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or_default())),
        "integerValue" => match inner {
            Value::String(s) => Ok(s
                .parse::<i64>()
                .map(|i| Value::Number(i.into()))
                .unwrap_or_else(|_| Value::String(s.clone()))),
            Value::Number(n) => Ok(Value::Number(n.clone())),
            other => Err(RemoteError::Decode(format!("bad integerValue: {other}"))),
        },
        "doubleValue" => match inner {
            Value::Number(n) => Ok(Value::Number(n.clone())),
            // NaN and infinities arrive as strings and have no JSON form.
            Value::String(s) => Ok(s
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number)),
            other => Err(RemoteError::Decode(format!("bad doubleValue: {other}"))),
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            Ok(Value::String(inner.as_str().unwrap_or_default().to_string()))
        }
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let items = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(items))
        }
        "mapValue" => {
            let fields = match inner.get("fields").and_then(Value::as_object) {
                Some(fields) => decode_fields(fields)?,
                None => Document::new(),
            };
            Ok(Value::Object(fields))
        }
        other => Err(RemoteError::Decode(format!("unknown value type: {other}"))),
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Document, RemoteError> {
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

/// Last path segment of a document resource name.
pub fn document_id(name: &str) -> Option<&str> {
    name.rsplit('/').next().filter(|id| !id.is_empty())
}

/// Quote a field path segment unless it is a plain identifier.
pub fn field_path(key: &str) -> String {
    let simple = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        key.to_string()
    } else {
        format!("`{}`", key.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalars() {
        assert_eq!(encode_value(&json!("Ann")), json!({ "stringValue": "Ann" }));
        assert_eq!(encode_value(&json!(42)), json!({ "integerValue": "42" }));
        assert_eq!(encode_value(&json!(1.5)), json!({ "doubleValue": 1.5 }));
        assert_eq!(encode_value(&json!(null)), json!({ "nullValue": null }));
    }

    #[test]
    fn decodes_nested_document() -> Result<(), RemoteError> {
        let wire = json!({
            "name": { "stringValue": "Ann" },
            "age": { "integerValue": "31" },
            "created_at": { "timestampValue": "2024-01-01T00:00:00Z" },
            "tags": { "arrayValue": { "values": [{ "stringValue": "vip" }] } },
            "empty": { "arrayValue": {} },
            "meta": { "mapValue": { "fields": { "ok": { "booleanValue": true } } } }
        });
        let doc = decode_fields(wire.as_object().unwrap())?;
        assert_eq!(doc["name"], json!("Ann"));
        assert_eq!(doc["age"], json!(31));
        assert_eq!(doc["created_at"], json!("2024-01-01T00:00:00Z"));
        assert_eq!(doc["tags"], json!(["vip"]));
        assert_eq!(doc["empty"], json!([]));
        assert_eq!(doc["meta"], json!({ "ok": true }));
        Ok(())
    }

    #[test]
    fn encode_decode_preserves_document() -> Result<(), RemoteError> {
        let doc = json!({ "name": "Ann", "phone": null, "n": 7, "nested": { "a": [1, "b"] } });
        let doc = doc.as_object().unwrap().clone();
        let encoded = encode_fields(&doc);
        assert_eq!(decode_fields(encoded.as_object().unwrap())?, doc);
        Ok(())
    }

    #[test]
    fn rejects_unknown_types() {
        assert!(decode_value(&json!({ "mysteryValue": 1 })).is_err());
        assert!(decode_value(&json!("bare")).is_err());
    }

    #[test]
    fn document_ids_and_field_paths() {
        assert_eq!(
            document_id("projects/p/databases/(default)/documents/contacts/abc"),
            Some("abc")
        );
        assert_eq!(document_id("trailing/"), None);
        assert_eq!(field_path("avatar_url"), "avatar_url");
        assert_eq!(field_path("first name"), "`first name`");
        assert_eq!(field_path("9lives"), "`9lives`");
    }
}
