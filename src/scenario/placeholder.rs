//! `${CONFIG.KEY}` substitution in prompt templates

use std::collections::BTreeMap;

use crate::common::{Error, Result};

/// Flat configuration map consulted by placeholder resolution
pub type ConfigMap = BTreeMap<String, String>;

const PREFIX: &str = "${CONFIG.";

/// Replace every `${CONFIG.KEY}` in `template` with its value
///
/// Values are inserted verbatim. An unknown key fails with the full list of
/// available keys; an unterminated placeholder is left as written.
pub fn resolve_placeholders(template: &str, config: &ConfigMap, tag: &str) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(PREFIX) {
        let after = &rest[start + PREFIX.len()..];
        let Some(end) = after.find('}') else {
            break;
        };

        let key = after[..end].trim();
        let value = config.get(key).ok_or_else(|| Error::UnknownPlaceholder {
            tag: tag.to_string(),
            key: key.to_string(),
            available: config.keys().cloned().collect(),
        })?;

        out.push_str(&rest[..start]);
        out.push_str(value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Keys referenced by a template, in order of appearance
pub fn placeholder_keys(template: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find(PREFIX) {
        let after = &rest[start + PREFIX.len()..];
        match after.find('}') {
            Some(end) => {
                keys.push(after[..end].trim().to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> ConfigMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolves_known_key() {
        let cfg = config(&[("BASE_URL", "https://x")]);
        let resolved = resolve_placeholders("go to ${CONFIG.BASE_URL}", &cfg, "nav").unwrap();
        assert_eq!(resolved, "go to https://x");
    }

    #[test]
    fn test_missing_key_lists_available() {
        let cfg = config(&[("BASE_URL", "https://x"), ("USER", "bob")]);
        let err = resolve_placeholders("open ${CONFIG.MISSING}", &cfg, "nav").unwrap_err();
        match err {
            Error::UnknownPlaceholder { tag, key, available } => {
                assert_eq!(tag, "nav");
                assert_eq!(key, "MISSING");
                assert_eq!(available, vec!["BASE_URL", "USER"]);
            }
            other => panic!("Expected UnknownPlaceholder, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_value_and_repeats() {
        let cfg = config(&[("A", ""), ("B", "b")]);
        let resolved =
            resolve_placeholders("[${CONFIG.A}][${CONFIG.B}][${CONFIG.B}]", &cfg, "t").unwrap();
        assert_eq!(resolved, "[][b][b]");
    }

    #[test]
    fn test_unterminated_placeholder_is_kept() {
        let cfg = config(&[("A", "a")]);
        let resolved = resolve_placeholders("${CONFIG.A} then ${CONFIG.B", &cfg, "t").unwrap();
        assert_eq!(resolved, "a then ${CONFIG.B");
    }

    #[test]
    fn test_value_is_not_rescanned() {
        let cfg = config(&[("A", "${CONFIG.B}")]);
        let resolved = resolve_placeholders("${CONFIG.A}", &cfg, "t").unwrap();
        assert_eq!(resolved, "${CONFIG.B}");
    }

    #[test]
    fn test_placeholder_keys() {
        assert_eq!(
            placeholder_keys("${CONFIG.A} and ${CONFIG.B} and ${CONFIG.A}"),
            vec!["A", "B", "A"]
        );
        assert!(placeholder_keys("no placeholders").is_empty());
    }
}
