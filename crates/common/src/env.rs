//! Environment variable accessors with defaults.
//!
//! All launchdeck tunables are read through these helpers so that every
//! `LAUNCHDECK_*` variable behaves the same way: unset or unparsable values
//! fall back to the documented default.

/// Read an environment variable, falling back to `default` when unset or empty.
pub fn var_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

/// Read a numeric environment variable, falling back to `default` when unset
/// or not a valid number. Values that do not fit the target width fall back
/// to the default rather than truncating.
pub fn var_u16_or(key: &str, default: u16) -> u16 {
    match std::env::var(key) {
        Ok(value) => parse_num(&value, default),
        Err(_) => default,
    }
}

pub fn var_u32_or(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(value) => parse_num(&value, default),
        Err(_) => default,
    }
}

pub fn var_u64_or(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(value) => parse_num(&value, default),
        Err(_) => default,
    }
}

/// Read a boolean flag. Only an explicit `false` / `0` / `no` disables a
/// flag that defaults to on; only an explicit `true` / `1` / `yes` enables
/// one that defaults to off.
pub fn var_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => parse_flag(&value, default),
        Err(_) => default,
    }
}

fn parse_num<T: std::str::FromStr>(value: &str, default: T) -> T {
    value.trim().parse().unwrap_or(default)
}

fn parse_flag(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "false" | "0" | "no" => false,
        "true" | "1" | "yes" => true,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_var_or_unset_returns_default() {
        assert_eq!(var_or("LAUNCHDECK_TEST_UNSET_VAR", "fallback"), "fallback");
    }

    #[test]
    fn test_parse_num() {
        assert_eq!(parse_num::<u64>("42", 7), 42);
        assert_eq!(parse_num::<u64>(" 42 ", 7), 42);
        assert_eq!(parse_num::<u64>("not-a-number", 7), 7);
    }

    #[test]
    fn test_parse_num_rejects_oversized_values() {
        // A value too wide for the target type keeps the default instead
        // of being truncated to whatever the low bits say.
        assert_eq!(parse_num::<u16>("70000", 4500), 4500);
        assert_eq!(parse_num::<u32>("99999999999", 10), 10);
        assert_eq!(parse_num::<u16>("-1", 4500), 4500);
    }

    #[test]
    fn test_parse_flag_spellings() {
        assert!(!parse_flag("false", true));
        assert!(!parse_flag("0", true));
        assert!(!parse_flag("No", true));
        assert!(parse_flag("YES", false));
        assert!(parse_flag("1", false));
        // Unrecognized values keep the default.
        assert!(parse_flag("maybe", true));
        assert!(!parse_flag("maybe", false));
    }
}
