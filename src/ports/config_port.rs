//! Configuration access port trait.

use crate::domain::error::StratsimError;

/// INI-style `[section] key = value` lookup with typed defaults.
pub trait ConfigPort: Send + Sync {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    fn require_string(&self, section: &str, key: &str) -> Result<String, StratsimError> {
        self.get_string(section, key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| StratsimError::ConfigMissing {
                section: section.into(),
                key: key.into(),
            })
    }
}
