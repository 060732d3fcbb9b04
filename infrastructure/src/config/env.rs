//! Environment-variable substitution in config string values
//!
//! Supports `${VAR}` and `${VAR:-default}`. An unset variable without a
//! default leaves the placeholder untouched, so a typo is visible instead of
//! silently becoming an empty string.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .unwrap_or_else(|e| panic!("invalid env substitution pattern: {e}"))
    })
}

/// Expand every `${VAR}` / `${VAR:-default}` occurrence in a string.
pub fn expand_str(input: &str) -> String {
    pattern()
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let var = &caps[1];
            match std::env::var(var) {
                Ok(value) => value,
                Err(_) => match caps.get(2) {
                    Some(default) => default.as_str().to_string(),
                    None => caps[0].to_string(),
                },
            }
        })
        .into_owned()
}

/// Recursively expand string values inside a JSON tree.
pub fn expand_value(value: &mut Value) {
    match value {
        Value::String(s) => *s = expand_str(s),
        Value::Array(items) => items.iter_mut().for_each(expand_value),
        Value::Object(map) => map.values_mut().for_each(expand_value),
        _ => {}
    }
}

/// Expand every string value of a loaded config document.
pub fn expand_config(config: &mut super::file_config::FileConfig) {
    config.server.listen_addr = expand_str(&config.server.listen_addr);
    for section in config.resources.values_mut() {
        for value in section.config.values_mut() {
            expand_value(value);
        }
    }
    for block in config.apis.values_mut() {
        for value in block.values_mut() {
            expand_value(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Env mutation: each test uses its own uniquely named variable to stay
    // independent of test ordering.

    #[test]
    fn test_expand_set_variable() {
        unsafe { std::env::set_var("SANDBOX_TEST_HOST", "10.1.2.3") };
        assert_eq!(expand_str("http://${SANDBOX_TEST_HOST}:80"), "http://10.1.2.3:80");
    }

    #[test]
    fn test_expand_default_used_when_unset() {
        assert_eq!(
            expand_str("${SANDBOX_TEST_UNSET_A:-fallback}/x"),
            "fallback/x"
        );
    }

    #[test]
    fn test_expand_set_variable_beats_default() {
        unsafe { std::env::set_var("SANDBOX_TEST_REGION", "eu-1") };
        assert_eq!(expand_str("${SANDBOX_TEST_REGION:-us-1}"), "eu-1");
    }

    #[test]
    fn test_unset_without_default_is_left_alone() {
        assert_eq!(
            expand_str("${SANDBOX_TEST_UNSET_B}"),
            "${SANDBOX_TEST_UNSET_B}"
        );
    }

    #[test]
    fn test_expand_value_recurses() {
        unsafe { std::env::set_var("SANDBOX_TEST_KEY", "secret") };
        let mut value = json!({
            "auth": {"key": "${SANDBOX_TEST_KEY}"},
            "hosts": ["${SANDBOX_TEST_KEY}", 42],
        });
        expand_value(&mut value);
        assert_eq!(value["auth"]["key"], json!("secret"));
        assert_eq!(value["hosts"][0], json!("secret"));
        assert_eq!(value["hosts"][1], json!(42));
    }
}
