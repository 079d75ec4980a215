//! General application configuration.

use serde::{Deserialize, Serialize};

/// Default result limit.
const fn default_limit() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Student used by `lec` commands when `--student` is omitted.
    #[serde(default)]
    pub default_student: String,

    /// Course used by `lec` commands when `--course` is omitted.
    #[serde(default)]
    pub default_course: String,

    /// Default result limit for list commands.
    #[serde(default = "default_limit")]
    pub default_limit: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_student: String::new(),
            default_course: String::new(),
            default_limit: default_limit(),
        }
    }
}

impl GeneralConfig {
    /// The configured default student, if any.
    #[must_use]
    pub fn student(&self) -> Option<&str> {
        Some(self.default_student.as_str()).filter(|s| !s.is_empty())
    }

    /// The configured default course, if any.
    #[must_use]
    pub fn course(&self) -> Option<&str> {
        Some(self.default_course.as_str()).filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = GeneralConfig::default();
        assert!(config.student().is_none());
        assert!(config.course().is_none());
        assert_eq!(config.default_limit, 20);
    }
}
