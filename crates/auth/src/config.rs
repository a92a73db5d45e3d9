//! Session policy configuration.

use chrono::Duration;

pub const SESSION_MAX_AGE_ENV: &str = "EDUGATE_SESSION_MAX_AGE_MINUTES";
pub const SESSION_REVALIDATE_ENV: &str = "EDUGATE_SESSION_REVALIDATE";

const DEFAULT_MAX_AGE_MINUTES: i64 = 12 * 60;

/// How long a persisted session stays usable and whether it is checked
/// against the live directory on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// `None` disables expiry.
    pub max_age: Option<Duration>,
    /// End the session once the account is locked, suspended or removed.
    pub revalidate: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_age: Some(Duration::minutes(DEFAULT_MAX_AGE_MINUTES)),
            revalidate: true,
        }
    }
}

impl SessionPolicy {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a policy from a key lookup; invalid values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_age = match lookup(SESSION_MAX_AGE_ENV) {
            None => defaults.max_age,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(0) => None,
                Ok(minutes) if minutes > 0 => match Duration::try_minutes(minutes) {
                    Some(age) => Some(age),
                    None => {
                        tracing::warn!(value = %raw, "{} is out of range; using default", SESSION_MAX_AGE_ENV);
                        defaults.max_age
                    }
                },
                _ => {
                    tracing::warn!(value = %raw, "{} is not a non-negative integer; using default", SESSION_MAX_AGE_ENV);
                    defaults.max_age
                }
            },
        };

        let revalidate = match lookup(SESSION_REVALIDATE_ENV) {
            None => defaults.revalidate,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    tracing::warn!(value = %raw, "{} is not a boolean; using default", SESSION_REVALIDATE_ENV);
                    defaults.revalidate
                }
            },
        };

        Self { max_age, revalidate }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn policy(pairs: &[(&str, &str)]) -> SessionPolicy {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SessionPolicy::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        assert_eq!(policy(&[]), SessionPolicy::default());
        assert_eq!(SessionPolicy::default().max_age, Some(Duration::hours(12)));
    }

    #[test]
    fn zero_disables_expiry() {
        let p = policy(&[(SESSION_MAX_AGE_ENV, "0"), (SESSION_REVALIDATE_ENV, "off")]);
        assert_eq!(p.max_age, None);
        assert!(!p.revalidate);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let p = policy(&[(SESSION_MAX_AGE_ENV, "-5"), (SESSION_REVALIDATE_ENV, "maybe")]);
        assert_eq!(p, SessionPolicy::default());
    }

    #[test]
    fn explicit_minutes() {
        let p = policy(&[(SESSION_MAX_AGE_ENV, " 30 ")]);
        assert_eq!(p.max_age, Some(Duration::minutes(30)));
        assert!(p.revalidate);
    }
}
