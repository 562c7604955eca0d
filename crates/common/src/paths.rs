//! Path expansion for app working directories.
//!
//! App catalog entries may reference their project directory with `~` or
//! environment variables (`$HOME/code/web`, `${PROJECTS}/api`). Expansion
//! happens once, at catalog load time, so the manager only ever sees
//! resolved absolute paths.

use std::path::PathBuf;

/// Expand `~`, `$VAR` and `${VAR}` in a path string.
///
/// Unknown variables are left in place rather than erased, so a bad
/// reference surfaces as a "directory does not exist" validation warning
/// instead of silently pointing somewhere else.
pub fn expand(input: &str) -> PathBuf {
    let mut expanded = expand_vars(input);

    if expanded == "~" || expanded.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let rest = expanded.trim_start_matches('~').trim_start_matches('/');
            return if rest.is_empty() {
                home
            } else {
                home.join(rest)
            };
        }
    }

    // Normalize trailing slashes for consistent registry keys.
    while expanded.len() > 1 && expanded.ends_with('/') {
        expanded.pop();
    }

    PathBuf::from(expanded)
}

fn expand_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }

        // ${VAR} form
        if chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            for inner in chars.by_ref() {
                if inner == '}' {
                    closed = true;
                    break;
                }
                name.push(inner);
            }
            match std::env::var(&name) {
                Ok(value) if closed => out.push_str(&value),
                _ => {
                    out.push_str("${");
                    out.push_str(&name);
                    if closed {
                        out.push('}');
                    }
                }
            }
            continue;
        }

        // $VAR form: name runs until a non [A-Za-z0-9_] character
        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            out.push('$');
        } else {
            match std::env::var(&name) {
                Ok(value) => out.push_str(&value),
                Err(_) => {
                    out.push('$');
                    out.push_str(&name);
                }
            }
        }
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_plain_path_unchanged() {
        assert_eq!(expand("/opt/apps/web"), PathBuf::from("/opt/apps/web"));
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/code/web"), home.join("code/web"));
        assert_eq!(expand("~"), home);
    }

    #[test]
    fn test_expand_known_var() {
        // HOME is always present in the test environment.
        let home = std::env::var("HOME").unwrap();
        assert_eq!(expand("$HOME/code"), PathBuf::from(format!("{home}/code")));
        assert_eq!(
            expand("${HOME}/code"),
            PathBuf::from(format!("{home}/code"))
        );
    }

    #[test]
    fn test_expand_unknown_var_left_in_place() {
        assert_eq!(
            expand("/data/$LAUNCHDECK_NO_SUCH_VAR/web"),
            PathBuf::from("/data/$LAUNCHDECK_NO_SUCH_VAR/web")
        );
        assert_eq!(
            expand("/data/${LAUNCHDECK_NO_SUCH_VAR}/web"),
            PathBuf::from("/data/${LAUNCHDECK_NO_SUCH_VAR}/web")
        );
    }

    #[test]
    fn test_expand_trailing_slash_trimmed() {
        assert_eq!(expand("/opt/apps/web/"), PathBuf::from("/opt/apps/web"));
    }
}
