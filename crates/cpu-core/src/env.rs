//! Session environment helpers

/// Session environment variable carrying the per-session nonce
pub const NONCE_ENV: &str = "CPU_NONCE";

/// Split a `NAME=value` string on its first `=`.
///
/// A string without `=` names a variable with an empty value.
pub fn split_env(var: &str) -> (String, String) {
    match var.split_once('=') {
        Some((name, value)) => (name.to_string(), value.to_string()),
        None => (var.to_string(), String::new()),
    }
}

/// The local process environment followed by `extra` variables, as
/// name/value pairs in sending order.
pub fn session_env(extra: &[String]) -> Vec<(String, String)> {
    std::env::vars_os()
        .map(|(name, value)| {
            (
                name.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .chain(extra.iter().map(|v| split_env(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_env() {
        assert_eq!(split_env("TERM=xterm"), ("TERM".into(), "xterm".into()));
        assert_eq!(split_env("A=b=c"), ("A".into(), "b=c".into()));
        assert_eq!(split_env("EMPTY"), ("EMPTY".into(), String::new()));
    }

    #[test]
    fn test_session_env_appends_extras() {
        let vars = session_env(&["CPU_TEST_EXTRA=1".to_string()]);
        assert_eq!(
            vars.last(),
            Some(&("CPU_TEST_EXTRA".to_string(), "1".to_string()))
        );
    }
}
