//! Serde roundtrip and JsonSchema validation tests for the record wire format.

use chrono::{TimeZone, Utc};
use schemars::schema_for;
use serde_json::json;
use trellis_core::entities::*;
use trellis_core::enums::*;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

macro_rules! roundtrip_and_validate {
    ($name:ident, $instance:expr) => {
        #[test]
        fn $name() {
            let val: LogRecord = $instance;

            let json_str = serde_json::to_string_pretty(&val).unwrap();
            let recovered: LogRecord = serde_json::from_str(&json_str).unwrap();
            assert_eq!(recovered, val, "serde roundtrip failed");

            let schema = serde_json::to_value(schema_for!(LogRecord)).unwrap();
            let instance = serde_json::to_value(&val).unwrap();
            let errors = validate_against_schema(&schema, &instance);
            assert!(errors.is_empty(), "Schema validation failed: {errors:?}");
        }
    };
}

roundtrip_and_validate!(
    session_log_roundtrip,
    LogRecord::new(
        "slog-a3f8b2c1",
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
        LogLevel::Info,
        "session started",
    )
    .with_session("ses-a3f8b2c1")
    .with_source("orchestrator")
);

roundtrip_and_validate!(
    task_log_roundtrip,
    LogRecord {
        metadata: [
            ("exit_code".to_string(), json!(137)),
            ("retryable".to_string(), json!(false)),
        ]
        .into(),
        details: Some("killed by OOM reaper".into()),
        ..LogRecord::new(
            "tlog-77e1",
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 31, 12).unwrap(),
            LogLevel::Error,
            "step failed",
        )
        .with_session("ses-a3f8b2c1")
        .with_task("tsk-0042")
        .with_source("runner")
    }
);

#[test]
fn diff_with_mixed_casing_decodes() {
    let diff: LogDiff = serde_json::from_value(json!({
        "added": [{
            "id": "slog-1",
            "timestamp": "2026-03-01T10:00:00.250Z",
            "level": "debug",
            "message": "tick"
        }],
        "deleted_ids": ["slog-0"],
        "version": "42"
    }))
    .unwrap();

    assert_eq!(diff.added.len(), 1);
    assert_eq!(diff.added[0].kind, LogKind::Session);
    assert!(diff.deleted_ids.contains("slog-0"));
    assert_eq!(
        diff.size(),
        DiffSize {
            added_count: 1,
            updated_count: 0,
            deleted_count: 1,
        }
    );
}
