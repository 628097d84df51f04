//! Label filter validation and selector rendering.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ConfigError;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

lazy_static! {
    static ref NAME_RE: Regex =
        Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").expect("valid name regex");
    static ref DNS_SUBDOMAIN_RE: Regex =
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
            .expect("valid subdomain regex");
}

fn check_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name part must not be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("name part must be no more than {MAX_NAME_LEN} characters"));
    }
    if !NAME_RE.is_match(name) {
        return Err(concat!(
            "name part must consist of alphanumeric characters, '-', '_' or '.', ",
            "and must start and end with an alphanumeric character"
        )
        .to_string());
    }
    Ok(())
}

/// Validate a label key: `[prefix/]name`.
pub fn validate_key(key: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidLabelKey {
        key: key.to_string(),
        reason,
    };

    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() {
                return Err(invalid("prefix part must not be empty".to_string()));
            }
            if prefix.len() > MAX_PREFIX_LEN {
                return Err(invalid(format!(
                    "prefix part must be no more than {MAX_PREFIX_LEN} characters"
                )));
            }
            if !DNS_SUBDOMAIN_RE.is_match(prefix) {
                return Err(invalid(
                    "prefix part must be a lowercase RFC 1123 subdomain".to_string(),
                ));
            }
            name
        }
        None => key,
    };

    check_name(name).map_err(invalid)
}

/// Validate a label value. Empty values are allowed.
pub fn validate_value(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Ok(());
    }
    check_name(value).map_err(|reason| ConfigError::InvalidLabelValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.replace("name part", "value"),
    })
}

/// Validate every entry of a label filter.
pub fn validate(labels: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    for (key, value) in labels {
        validate_key(key)?;
        validate_value(key, value)?;
    }
    Ok(())
}

/// Render an equality selector (`k1=v1,k2=v2`), or `None` for an empty filter.
pub fn to_selector(labels: &BTreeMap<String, String>) -> Option<String> {
    if labels.is_empty() {
        return None;
    }
    Some(
        labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(","),
    )
}
