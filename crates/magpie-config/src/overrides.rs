use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use serde_json::Value;
use tracing::debug;

use crate::error::ConfigError;
use crate::record::{ConfigurationRecord, FIELD_PATHS};
use crate::render::record_from_document;

/// Parses `key=value` pairs into field-path keyed bindings.
///
/// Keys may use `.` or `/` as separator (`stimuli.main`, `/stimuli/main`);
/// they are normalized to the dotted form. Values are kept verbatim.
pub fn parse_set_bindings(values: &[String]) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for raw in values {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid --set '{}': expected k=v", raw))?;
        let key = normalize_field_path(key);
        if key.is_empty() {
            return Err(anyhow!("invalid --set '{}': key cannot be empty", raw));
        }
        out.insert(key, value.to_string());
    }
    Ok(out)
}

fn normalize_field_path(key: &str) -> String {
    key.trim()
        .trim_start_matches('/')
        .split(|c: char| c == '.' || c == '/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Returns a new record with `bindings` written over `record`'s fields.
pub fn apply_overrides(
    record: &ConfigurationRecord,
    bindings: &BTreeMap<String, String>,
) -> Result<ConfigurationRecord> {
    if bindings.is_empty() {
        return Ok(record.clone());
    }
    let mut document = serde_json::to_value(record)?;
    for (path, value) in bindings {
        if !FIELD_PATHS.contains(&path.as_str()) {
            return Err(ConfigError::UnknownField(path.clone()).into());
        }
        let pointer = format!("/{}", path.replace('.', "/"));
        set_json_pointer_value(&mut document, &pointer, Value::String(value.clone()))?;
        debug!(field = %path, value = %value, "applied override");
    }
    record_from_document(document, "overrides")
}

fn set_json_pointer_value(root: &mut Value, pointer: &str, new_value: Value) -> Result<()> {
    let tokens: Vec<&str> = pointer.split('/').skip(1).collect();
    let (last, parents) = tokens
        .split_last()
        .ok_or_else(|| anyhow!("json_pointer must name a field: {}", pointer))?;

    let mut cur = root;
    for token in parents {
        cur = match cur {
            Value::Object(map) => map
                .get_mut(*token)
                .ok_or_else(|| anyhow!("json_pointer token '{}' not found in {}", token, pointer))?,
            _ => {
                return Err(anyhow!(
                    "json_pointer traversal hit non-object at token '{}' in {}",
                    token,
                    pointer
                ))
            }
        };
    }
    match cur {
        Value::Object(map) => {
            map.insert(last.to_string(), new_value);
            Ok(())
        }
        _ => Err(anyhow!("json_pointer target is not an object for {}", pointer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::profiles::ProfileSet;

    fn sets(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn bindings_accept_dotted_and_slashed_keys() {
        let bindings = parse_set_bindings(&sets(&[
            "stimuli.main=stimuli/pilot.csv",
            "/serverUrl=https://x.example",
            "experimentId=9",
            "completionUrl=https://a.example/?cc=1=2",
        ]))
        .expect("parse");
        assert_eq!(bindings["stimuli.main"], "stimuli/pilot.csv");
        assert_eq!(bindings["serverUrl"], "https://x.example");
        assert_eq!(bindings["experimentId"], "9");
        assert_eq!(bindings["completionUrl"], "https://a.example/?cc=1=2");
        assert_eq!(
            parse_set_bindings(&sets(&["stimuli/main=x.csv"])).expect("slash")["stimuli.main"],
            "x.csv"
        );
    }

    #[test]
    fn bindings_reject_malformed_pairs() {
        assert!(parse_set_bindings(&sets(&["mode"])).is_err());
        let err = parse_set_bindings(&sets(&[" =debug"])).expect_err("empty key");
        assert!(err.to_string().contains("key cannot be empty"), "{}", err);
    }

    #[test]
    fn overrides_produce_a_new_validated_record() {
        let base = ProfileSet::builtin().get("debug").expect("debug").clone();
        let bindings = parse_set_bindings(&sets(&[
            "mode=directLink",
            "experimentId=43",
            "stimuli.main=stimuli/main.csv",
        ]))
        .expect("parse");
        let updated = apply_overrides(&base, &bindings).expect("apply");
        assert_eq!(updated.mode(), Mode::DirectLink);
        assert_eq!(updated.experiment_id(), "43");
        assert_eq!(updated.stimuli_main(), "stimuli/main.csv");
        assert_eq!(updated.server_url(), base.server_url());
        assert_eq!(base.experiment_id(), "9");
    }

    #[test]
    fn overrides_reject_unknown_fields_and_modes() {
        let base = ProfileSet::builtin().get("debug").expect("debug").clone();
        let unknown = parse_set_bindings(&sets(&["stimuli.extra=x.csv"])).expect("parse");
        let err = apply_overrides(&base, &unknown).expect_err("unknown field");
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownField(f)) if f == "stimuli.extra"
        ));

        let bad_mode = parse_set_bindings(&sets(&["mode=prolific"])).expect("parse");
        assert!(apply_overrides(&base, &bad_mode).is_err());

        let bad_url = parse_set_bindings(&sets(&["socketUrl=https://x.example"])).expect("parse");
        assert!(apply_overrides(&base, &bad_url).is_err());
    }

    #[test]
    fn empty_bindings_return_the_same_record() {
        let base = ProfileSet::builtin().get("production").expect("prod").clone();
        assert_eq!(apply_overrides(&base, &BTreeMap::new()).expect("apply"), base);
    }
}
