//! Sanitizing of persisted check documents.
//!
//! Every field is judged on its own so a single report lists everything that
//! is wrong with a document. Only the seven user-controlled fields are
//! required; `state` and `lastChecked` fall back to "down, never probed".

use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{
    CHECK_ID_LEN, Check, CheckState, MAX_TIMEOUT_SECONDS, MIN_TIMEOUT_SECONDS, Method, PHONE_LEN,
    Protocol,
};

/// A check document that cannot be monitored
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("check document has missing or invalid fields: {}", .fields.join(", "))]
pub struct ValidationError {
    /// Id of the document, when it was readable
    pub id: Option<String>,
    /// Names of the rejected fields, in document order
    pub fields: Vec<&'static str>,
}

/// Validate a raw persisted check document
pub fn validate_check(document: &Value) -> Result<Check, ValidationError> {
    let empty = Map::new();
    let doc = document.as_object().unwrap_or(&empty);

    let id = fixed_length_string(doc.get("id"), CHECK_ID_LEN);
    // Documents written by the API layer use `userPhone`.
    let owner_phone =
        fixed_length_string(doc.get("userPhone").or_else(|| doc.get("ownerId")), PHONE_LEN);
    let protocol = doc.get("protocol").and_then(Value::as_str).and_then(Protocol::parse);
    let url = doc
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string);
    let method = doc.get("method").and_then(Value::as_str).and_then(Method::parse);
    let success_codes = success_codes(doc.get("successCodes"));
    let timeout_seconds = timeout_seconds(doc.get("timeoutSeconds"));

    let state = doc
        .get("state")
        .and_then(Value::as_str)
        .and_then(CheckState::parse)
        .unwrap_or_default();
    let last_checked = doc
        .get("lastChecked")
        .and_then(Value::as_f64)
        .filter(|millis| *millis > 0.0)
        .map(|millis| millis as i64);

    match (id, owner_phone, protocol, url, method, success_codes, timeout_seconds) {
        (
            Some(id),
            Some(owner_phone),
            Some(protocol),
            Some(url),
            Some(method),
            Some(success_codes),
            Some(timeout_seconds),
        ) => Ok(Check {
            id,
            owner_phone,
            protocol,
            url,
            method,
            success_codes,
            timeout_seconds,
            state,
            last_checked,
        }),
        (id, owner_phone, protocol, url, method, success_codes, timeout_seconds) => {
            let mut fields = Vec::new();
            if id.is_none() {
                fields.push("id");
            }
            if owner_phone.is_none() {
                fields.push("userPhone");
            }
            if protocol.is_none() {
                fields.push("protocol");
            }
            if url.is_none() {
                fields.push("url");
            }
            if method.is_none() {
                fields.push("method");
            }
            if success_codes.is_none() {
                fields.push("successCodes");
            }
            if timeout_seconds.is_none() {
                fields.push("timeoutSeconds");
            }
            Err(ValidationError { id, fields })
        }
    }
}

fn fixed_length_string(value: Option<&Value>, len: usize) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| s.chars().count() == len)
        .map(str::to_string)
}

/// Non-empty list; entries that are not HTTP status codes can never match a
/// response and are dropped.
fn success_codes(value: Option<&Value>) -> Option<Vec<u16>> {
    let codes: Vec<u16> = value?
        .as_array()?
        .iter()
        .filter_map(Value::as_u64)
        .filter_map(|code| u16::try_from(code).ok())
        .collect();

    (!codes.is_empty()).then_some(codes)
}

fn timeout_seconds(value: Option<&Value>) -> Option<u64> {
    let raw = value?.as_f64()?;
    if raw.fract() != 0.0 {
        return None;
    }
    let seconds = raw as u64;
    (MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&seconds).then_some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_document() -> Value {
        json!({
            "id": "abcdefghij0123456789",
            "userPhone": "5551234567",
            "protocol": "http",
            "url": "example.test",
            "method": "get",
            "successCodes": [200, 201],
            "timeoutSeconds": 2
        })
    }

    #[test]
    fn test_valid_document_gets_defaults() {
        let check = validate_check(&valid_document()).unwrap();
        assert_eq!(check.id, "abcdefghij0123456789");
        assert_eq!(check.owner_phone, "5551234567");
        assert_eq!(check.protocol, Protocol::Http);
        assert_eq!(check.method, Method::Get);
        assert_eq!(check.success_codes, vec![200, 201]);
        assert_eq!(check.timeout_seconds, 2);
        assert_eq!(check.state, CheckState::Down);
        assert_eq!(check.last_checked, None);
    }

    #[test]
    fn test_recorded_state_is_kept() {
        let mut doc = valid_document();
        doc["state"] = json!("up");
        doc["lastChecked"] = json!(1_700_000_000_000i64);

        let check = validate_check(&doc).unwrap();
        assert_eq!(check.state, CheckState::Up);
        assert_eq!(check.last_checked, Some(1_700_000_000_000));
    }

    #[test]
    fn test_bad_optional_fields_fall_back() {
        let mut doc = valid_document();
        doc["state"] = json!("sideways");
        doc["lastChecked"] = json!(-5);

        let check = validate_check(&doc).unwrap();
        assert_eq!(check.state, CheckState::Down);
        assert_eq!(check.last_checked, None);

        doc["lastChecked"] = json!("yesterday");
        assert_eq!(validate_check(&doc).unwrap().last_checked, None);
    }

    #[test]
    fn test_each_required_field_is_enforced() {
        for (field, reported) in [
            ("id", "id"),
            ("userPhone", "userPhone"),
            ("protocol", "protocol"),
            ("url", "url"),
            ("method", "method"),
            ("successCodes", "successCodes"),
            ("timeoutSeconds", "timeoutSeconds"),
        ] {
            let mut doc = valid_document();
            doc.as_object_mut().unwrap().remove(field);

            let err = validate_check(&doc).unwrap_err();
            assert_eq!(err.fields, vec![reported], "removing {field}");
        }
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cases = [
            ("id", json!("too-short")),
            ("userPhone", json!("555")),
            ("protocol", json!("ftp")),
            ("url", json!("   ")),
            ("method", json!("patch")),
            ("method", json!("GET")),
            ("successCodes", json!([])),
            ("successCodes", json!("200")),
            ("timeoutSeconds", json!(0)),
            ("timeoutSeconds", json!(6)),
            ("timeoutSeconds", json!(2.5)),
        ];

        for (field, value) in cases {
            let mut doc = valid_document();
            doc[field] = value.clone();
            assert!(validate_check(&doc).is_err(), "{field} = {value} should be rejected");
        }
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let mut doc = valid_document();
        doc["id"] = json!("  abcdefghij0123456789 ");
        doc["url"] = json!(" example.test/path ");

        let check = validate_check(&doc).unwrap();
        assert_eq!(check.id, "abcdefghij0123456789");
        assert_eq!(check.url, "example.test/path");
    }

    #[test]
    fn test_integral_float_timeout_is_accepted() {
        let mut doc = valid_document();
        doc["timeoutSeconds"] = json!(5.0);
        assert_eq!(validate_check(&doc).unwrap().timeout_seconds, 5);
    }

    #[test]
    fn test_owner_id_alias() {
        let mut doc = valid_document();
        let phone = doc.as_object_mut().unwrap().remove("userPhone").unwrap();
        doc["ownerId"] = phone;
        assert_eq!(validate_check(&doc).unwrap().owner_phone, "5551234567");
    }

    #[test]
    fn test_non_object_lists_every_field() {
        let err = validate_check(&json!("not a check")).unwrap_err();
        assert_eq!(err.id, None);
        assert_eq!(err.fields.len(), 7);
    }

    #[test]
    fn test_error_keeps_readable_id() {
        let mut doc = valid_document();
        doc["url"] = json!("");
        let err = validate_check(&doc).unwrap_err();
        assert_eq!(err.id.as_deref(), Some("abcdefghij0123456789"));
        assert_eq!(err.to_string(), "check document has missing or invalid fields: url");
    }

    #[test]
    fn test_non_numeric_codes_are_dropped() {
        let mut doc = valid_document();
        doc["successCodes"] = json!([200, "abc", 70000]);
        assert_eq!(validate_check(&doc).unwrap().success_codes, vec![200]);

        doc["successCodes"] = json!(["abc"]);
        assert!(validate_check(&doc).is_err());
    }
}
