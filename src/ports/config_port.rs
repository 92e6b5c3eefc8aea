//! Configuration access port trait.

use crate::domain::error::RsitraderError;
use std::str::FromStr;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;

    /// `default` when the key is absent; `ConfigInvalid` when it is not a boolean.
    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, RsitraderError> {
        let Some(raw) = self.get_string(section, key) else {
            return Ok(default);
        };
        match raw.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            other => Err(RsitraderError::invalid(
                section,
                key,
                format!("'{}' is not a boolean", other),
            )),
        }
    }

    /// A non-empty value, or `ConfigMissing`.
    fn require_string(&self, section: &str, key: &str) -> Result<String, RsitraderError> {
        self.get_string(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RsitraderError::missing(section, key))
    }
}

/// A present value parsed with `FromStr`, or `ConfigMissing` / `ConfigInvalid`.
pub fn require_parsed<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<T, RsitraderError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = config.require_string(section, key)?;
    raw.parse::<T>()
        .map_err(|e| RsitraderError::invalid(section, key, format!("'{}': {}", raw, e)))
}
