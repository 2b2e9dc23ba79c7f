use crate::{constants::ENV_VARS_TO_TRANSFER, error::ConfigError};
use std::{
    collections::{BTreeMap, HashMap},
    str::FromStr,
};

/// Read-only view over the environment map handed off by the launcher.
#[derive(Debug, Clone, Copy)]
pub struct EnvView<'a> {
    vars: &'a HashMap<String, String>,
}

impl<'a> EnvView<'a> {
    pub fn new(vars: &'a HashMap<String, String>) -> Self {
        Self { vars }
    }

    /// Blank values count as unset.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// The value exactly as handed off. An empty string is a real value here.
    pub fn raw(&self, key: &str) -> Option<&'a str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn parse_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value: raw.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    /// The subset of variables forwarded to launched execution units.
    pub fn forwarded(&self) -> BTreeMap<String, String> {
        ENV_VARS_TO_TRANSFER
            .iter()
            .filter_map(|key| self.get(key).map(|v| (key.to_string(), v.to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn blank_values_are_unset() {
        let map = vars(&[("A", "  "), ("B", " x ")]);
        let env = EnvView::new(&map);
        assert_eq!(env.get("A"), None);
        assert_eq!(env.get("B"), Some("x"));
        assert_eq!(env.get_or("A", "fallback"), "fallback");
        assert_eq!(env.raw("A"), Some("  "));
    }

    #[test]
    fn parse_reports_offending_key() {
        let map = vars(&[("HEARTBEAT_PORT", "nine")]);
        let env = EnvView::new(&map);
        let err = env.parse_or::<u16>("HEARTBEAT_PORT", 9000).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "HEARTBEAT_PORT", .. }));
    }

    #[test]
    fn forwards_only_listed_variables() {
        let map = vars(&[("LOG_LEVEL", "debug"), ("SECRET_TOKEN", "s3cr3t")]);
        let forwarded = EnvView::new(&map).forwarded();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded["LOG_LEVEL"], "debug");
    }
}
