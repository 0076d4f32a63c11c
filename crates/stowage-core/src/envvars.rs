//! Environment access for config reconstruction

use std::collections::BTreeMap;

/// Source of environment variables
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

const TRUTHY: &[&str] = &["1", "y", "yes", "on", "true", "t"];

/// Whether a raw value reads as true
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    TRUTHY.contains(&value.as_str())
}

/// Read a boolean flag, unset is false
pub fn flag(env: &dyn EnvSource, key: &str) -> bool {
    env.var(key).is_some_and(|v| is_truthy(&v))
}

/// Read a variable, empty reads as unset
pub fn string(env: &dyn EnvSource, key: &str) -> Option<String> {
    env.var(key).filter(|v| !v.is_empty())
}

/// Read a variable or fall back
pub fn string_or(env: &dyn EnvSource, key: &str, fallback: &str) -> String {
    string(env, key).unwrap_or_else(|| fallback.to_string())
}

/// Read a comma separated list, dropping blank entries
pub fn list(env: &dyn EnvSource, key: &str) -> Vec<String> {
    env.var(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_truthy_values() {
        for v in ["1", "y", "YES", "On", "true", "T", " true "] {
            assert!(is_truthy(v), "{v} should be truthy");
        }
        for v in ["0", "no", "false", "", "enabled"] {
            assert!(!is_truthy(v), "{v} should not be truthy");
        }
    }

    #[test]
    fn test_flag_and_string() {
        let env = env(&[("A", "yes"), ("B", ""), ("C", "value")]);
        assert!(flag(&env, "A"));
        assert!(!flag(&env, "MISSING"));
        assert_eq!(string(&env, "B"), None);
        assert_eq!(string(&env, "C").as_deref(), Some("value"));
        assert_eq!(string_or(&env, "B", "fallback"), "fallback");
    }

    #[test]
    fn test_list_filters_blank_entries() {
        let env = env(&[("L", "a@x.com, ,b@y.com,")]);
        assert_eq!(list(&env, "L"), vec!["a@x.com", "b@y.com"]);
        assert!(list(&env, "MISSING").is_empty());
    }
}
