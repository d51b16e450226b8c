//! Consent normalization
//!
//! Every stored shape the banner has ever written maps onto the canonical
//! four-category [`ConsentRecord`]:
//!
//!   v2:     { "analytics_storage": "granted", "ad_storage": "denied", ... }
//!   v1:     { "v": 1, "analytics": true, "retargeting": false, "ts": ... }
//!   mixed:  both of the above in one blob (written during the migration)
//!
//! Canonical keys are applied first, then legacy booleans overwrite the
//! categories they map to. Anything else degrades to all-denied.

use serde_json::Value;

use crate::types::{Category, ConsentRecord, Signal};

const LEGACY_ANALYTICS: &str = "analytics";
const LEGACY_RETARGETING: &str = "retargeting";

/// Normalize any JSON value into a canonical record. Never fails.
pub fn normalize(input: &Value) -> ConsentRecord {
    let mut record = ConsentRecord::denied();
    let Some(obj) = input.as_object() else {
        return record;
    };

    for category in Category::ALL {
        if let Some(signal) = obj
            .get(category.key())
            .and_then(Value::as_str)
            .and_then(Signal::from_literal)
        {
            record.set(category, signal);
        }
    }

    if let Some(analytics) = obj.get(LEGACY_ANALYTICS).and_then(Value::as_bool) {
        record.analytics_storage = Signal::from_bool(analytics);
    }

    if let Some(retargeting) = obj.get(LEGACY_RETARGETING).and_then(Value::as_bool) {
        let signal = Signal::from_bool(retargeting);
        for category in Category::ADS {
            record.set(category, signal);
        }
    }

    if let Some(ts) = obj
        .get("timestamp")
        .or_else(|| obj.get("ts"))
        .and_then(Value::as_i64)
        .filter(|ts| *ts > 0)
    {
        record.timestamp = ts;
    }

    record
}

/// Normalize raw JSON text. Unparseable text yields the default-denied record.
pub fn normalize_str(raw: &str) -> ConsentRecord {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => normalize(&value),
        Err(e) => {
            tracing::debug!("consent payload is not JSON ({}), using defaults", e);
            ConsentRecord::denied()
        }
    }
}

/// True when the value carries at least one recognizable consent field:
/// a canonical key with a literal signal, or a legacy boolean.
pub fn has_valid_consent(input: &Value) -> bool {
    let Some(obj) = input.as_object() else {
        return false;
    };

    let canonical = Category::ALL.iter().any(|c| {
        obj.get(c.key())
            .and_then(Value::as_str)
            .and_then(Signal::from_literal)
            .is_some()
    });

    canonical
        || obj.get(LEGACY_ANALYTICS).is_some_and(Value::is_boolean)
        || obj.get(LEGACY_RETARGETING).is_some_and(Value::is_boolean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SCHEMA_VERSION;
    use serde_json::json;

    fn all_denied(r: &ConsentRecord) -> bool {
        Category::ALL.iter().all(|c| r.get(*c) == Signal::Denied)
    }

    #[test]
    fn null_and_scalars_are_denied() {
        for v in [json!(null), json!(1), json!("granted"), json!([true, true]), json!(true)] {
            let r = normalize(&v);
            assert!(all_denied(&r), "{v} should normalize to denied");
            assert_eq!(r.version, SCHEMA_VERSION);
        }
    }

    #[test]
    fn canonical_values_must_be_literal() {
        let r = normalize(&json!({
            "analytics_storage": "GRANTED",
            "ad_storage": true,
            "ad_user_data": "granted",
            "ad_personalization": "yes"
        }));
        assert_eq!(r.analytics_storage, Signal::Denied);
        assert_eq!(r.ad_storage, Signal::Denied);
        assert_eq!(r.ad_user_data, Signal::Granted);
        assert_eq!(r.ad_personalization, Signal::Denied);
    }

    #[test]
    fn legacy_truthy_non_bool_is_ignored() {
        let r = normalize(&json!({"analytics": 1, "retargeting": "true"}));
        assert!(all_denied(&r));
    }

    #[test]
    fn stored_timestamp_is_kept() {
        let r = normalize(&json!({"analytics": true, "ts": 1_700_000_000_000_i64}));
        assert_eq!(r.timestamp, 1_700_000_000_000);
        let r = normalize(&json!({"analytics_storage": "granted", "timestamp": 42}));
        assert_eq!(r.timestamp, 42);
    }

    #[test]
    fn normalize_str_garbage() {
        assert!(all_denied(&normalize_str("{not json")));
        assert!(all_denied(&normalize_str("")));
    }

    #[test]
    fn presence_check() {
        assert!(has_valid_consent(&json!({"ad_storage": "denied"})));
        assert!(has_valid_consent(&json!({"retargeting": false})));
        assert!(!has_valid_consent(&json!({"analytics_storage": "maybe"})));
        assert!(!has_valid_consent(&json!({"essential": true})));
        assert!(!has_valid_consent(&json!("granted")));
    }
}
