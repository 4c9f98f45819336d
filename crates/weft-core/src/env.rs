//! Environment variable utilities
//!
//! All weft tunables are `WEFT_*` variables read through these helpers.
//! A value that is unset or fails to parse falls back to the default; it
//! never aborts configuration.

use std::str::FromStr;
use std::time::Duration;

/// Get environment variable parsed as type T, or return default
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as optional value
///
/// `None` when unset, empty, or unparsable.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" (case-insensitive) are true; any other set value
/// is false. Unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(
            val.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

/// Get a millisecond count as a `Duration`
#[inline]
pub fn env_get_millis(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_get(key, default_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__WEFT_TEST_UNSET__", 42);
        assert_eq!(val, 42);
        assert!(env_get_opt::<u32>("__WEFT_TEST_UNSET__").is_none());
    }

    #[test]
    fn test_env_get_parses_trimmed() {
        std::env::set_var("__WEFT_TEST_NUM__", " 123 ");
        let val: usize = env_get("__WEFT_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__WEFT_TEST_NUM__");
    }

    #[test]
    fn test_env_get_invalid_falls_back() {
        std::env::set_var("__WEFT_TEST_BAD__", "lots");
        let val: u32 = env_get("__WEFT_TEST_BAD__", 7);
        assert_eq!(val, 7);
        std::env::remove_var("__WEFT_TEST_BAD__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        for yes in ["1", "true", "TRUE", "yes", "on"] {
            std::env::set_var("__WEFT_TEST_BOOL__", yes);
            assert!(env_get_bool("__WEFT_TEST_BOOL__", false), "{}", yes);
        }
        for no in ["0", "false", "garbage"] {
            std::env::set_var("__WEFT_TEST_BOOL__", no);
            assert!(!env_get_bool("__WEFT_TEST_BOOL__", true), "{}", no);
        }
        std::env::remove_var("__WEFT_TEST_BOOL__");
        assert!(env_get_bool("__WEFT_TEST_BOOL__", true));
    }

    #[test]
    fn test_env_get_millis() {
        assert_eq!(
            env_get_millis("__WEFT_TEST_UNSET__", 250),
            Duration::from_millis(250)
        );
    }
}
