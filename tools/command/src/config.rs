//! Startup resolution of the output line limit.
//!
//! Layers are consulted in order and the first valid value wins:
//!
//! 1. `RUN_COMMAND_MAX_LINES`
//! 2. `MAX_OUTPUT_LINES`
//! 3. the JSON config file, `run_command.max_lines` before top-level `max_lines`
//! 4. [`DEFAULT_MAX_LINES`]
//!
//! Malformed or non-positive values are skipped, never fatal.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::limit::{DEFAULT_MAX_LINES, OutputLimiter};

/// Primary environment variable for the line limit.
pub const MAX_LINES_ENV: &str = "RUN_COMMAND_MAX_LINES";
/// Fallback environment variable for the line limit.
pub const FALLBACK_MAX_LINES_ENV: &str = "MAX_OUTPUT_LINES";
/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "FILE_SERVER_CONFIG_PATH";
/// File name of the config file looked up next to the executable.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Where the resolved line limit came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitSource {
    /// An environment variable.
    Env(&'static str),
    /// A config file.
    ConfigFile(PathBuf),
    /// Nothing was configured.
    Default,
}

impl fmt::Display for LimitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env(name) => write!(f, "${name}"),
            Self::ConfigFile(path) => path.display().fmt(f),
            Self::Default => f.write_str("default"),
        }
    }
}

/// The resolved output line limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLimitConfig {
    /// Maximum lines kept per output stream.
    pub max_lines: NonZeroUsize,
    /// Which layer supplied `max_lines`.
    pub source: LimitSource,
}

impl Default for OutputLimitConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            source: LimitSource::Default,
        }
    }
}

impl OutputLimitConfig {
    /// Resolves the limit from `env` and an optional config file.
    ///
    /// `env` looks up an environment variable by name, so tests can supply a map instead
    /// of the process environment. A missing or unreadable config file is skipped.
    pub fn resolve(env: impl Fn(&str) -> Option<String>, config_file: Option<&Path>) -> Self {
        for name in [MAX_LINES_ENV, FALLBACK_MAX_LINES_ENV] {
            let Some(raw) = env(name) else {
                continue;
            };
            match parse_positive(&raw) {
                Some(max_lines) => {
                    return Self {
                        max_lines,
                        source: LimitSource::Env(name),
                    };
                }
                None => warn!(name, value = %raw, "ignoring invalid line limit"),
            }
        }

        config_file
            .and_then(|path| {
                read_config_file(path).map(|max_lines| Self {
                    max_lines,
                    source: LimitSource::ConfigFile(path.to_path_buf()),
                })
            })
            .unwrap_or_default()
    }

    /// Resolves the limit from the process environment.
    ///
    /// The config file is taken from `FILE_SERVER_CONFIG_PATH`, or else
    /// [`default_config_path`].
    #[must_use]
    pub fn from_env() -> Self {
        let env = |name: &str| std::env::var(name).ok();
        let config_file = config_path_from(env);
        Self::resolve(env, config_file.as_deref())
    }

    /// A limiter enforcing this limit.
    #[must_use]
    pub const fn limiter(&self) -> OutputLimiter {
        OutputLimiter::new(self.max_lines)
    }
}

/// `config.json` in the directory of the running executable.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(CONFIG_FILE_NAME))
}

/// The config file named by `FILE_SERVER_CONFIG_PATH` in `env`, else [`default_config_path`].
pub fn config_path_from(env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    env(CONFIG_PATH_ENV)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .or_else(default_config_path)
}

/// Parses a positive integer, ignoring surrounding whitespace.
#[must_use]
pub fn parse_positive(raw: &str) -> Option<NonZeroUsize> {
    raw.trim().parse().ok()
}

/// Accepts positive JSON integers and strings that [`parse_positive`] accepts.
fn positive_value(value: &Value) -> Option<NonZeroUsize> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .and_then(NonZeroUsize::new),
        Value::String(raw) => parse_positive(raw),
        _ => None,
    }
}

/// Extracts the line limit from a parsed config document.
fn max_lines_from(config: &Value) -> Option<NonZeroUsize> {
    let nested = config
        .get("run_command")
        .filter(|section| section.is_object())
        .and_then(|section| section.get("max_lines"))
        .and_then(positive_value);
    nested.or_else(|| config.get("max_lines").and_then(positive_value))
}

fn read_config_file(path: &Path) -> Option<NonZeroUsize> {
    if !path.is_file() {
        debug!(path = %path.display(), "no config file");
        return None;
    }
    let config = std::fs::read_to_string(path)
        .map_err(|err| err.to_string())
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|err| err.to_string()));
    match config {
        Ok(config) => {
            let max_lines = max_lines_from(&config);
            if max_lines.is_none() {
                debug!(path = %path.display(), "config file sets no line limit");
            }
            max_lines
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable config file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn lines(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn default_when_nothing_is_set() {
        let config = OutputLimitConfig::resolve(env(&[]), None);
        assert_eq!(config.max_lines, lines(1000));
        assert_eq!(config.source, LimitSource::Default);
    }

    #[test]
    fn primary_env_wins() {
        let file = config_file(r#"{"max_lines": 7}"#);
        let config = OutputLimitConfig::resolve(
            env(&[(MAX_LINES_ENV, "50"), (FALLBACK_MAX_LINES_ENV, "60")]),
            Some(file.path()),
        );
        assert_eq!(config.max_lines, lines(50));
        assert_eq!(config.source, LimitSource::Env(MAX_LINES_ENV));
    }

    #[test]
    fn invalid_env_values_fall_through() {
        let config = OutputLimitConfig::resolve(
            env(&[(MAX_LINES_ENV, "0"), (FALLBACK_MAX_LINES_ENV, " 25 ")]),
            None,
        );
        assert_eq!(config.max_lines, lines(25));
        assert_eq!(config.source, LimitSource::Env(FALLBACK_MAX_LINES_ENV));

        let file = config_file(r#"{"max_lines": 9}"#);
        let config = OutputLimitConfig::resolve(
            env(&[(MAX_LINES_ENV, "lots"), (FALLBACK_MAX_LINES_ENV, "-3")]),
            Some(file.path()),
        );
        assert_eq!(config.max_lines, lines(9));
        assert_eq!(
            config.source,
            LimitSource::ConfigFile(file.path().to_path_buf())
        );
    }

    #[test]
    fn nested_config_value_is_preferred() {
        let file = config_file(r#"{"max_lines": 9, "run_command": {"max_lines": "12"}}"#);
        let config = OutputLimitConfig::resolve(env(&[]), Some(file.path()));
        assert_eq!(config.max_lines, lines(12));
    }

    #[test]
    fn invalid_nested_value_falls_back_to_top_level() {
        let file = config_file(r#"{"max_lines": 9, "run_command": {"max_lines": -1}}"#);
        let config = OutputLimitConfig::resolve(env(&[]), Some(file.path()));
        assert_eq!(config.max_lines, lines(9));

        let file = config_file(r#"{"max_lines": 9, "run_command": 4}"#);
        let config = OutputLimitConfig::resolve(env(&[]), Some(file.path()));
        assert_eq!(config.max_lines, lines(9));
    }

    #[test]
    fn unusable_config_files_are_ignored() {
        for contents in [
            "not json",
            "[1, 2]",
            r#"{"max_lines": 2.5}"#,
            r#"{"max_lines": true}"#,
            r#"{"max_lines": "0"}"#,
            "{}",
        ] {
            let file = config_file(contents);
            let config = OutputLimitConfig::resolve(env(&[]), Some(file.path()));
            assert_eq!(config, OutputLimitConfig::default(), "{contents}");
        }

        let missing = Path::new("/definitely/not/here/config.json");
        assert_eq!(
            OutputLimitConfig::resolve(env(&[]), Some(missing)),
            OutputLimitConfig::default()
        );
    }

    #[test]
    fn config_path_prefers_env() {
        let path = config_path_from(env(&[(CONFIG_PATH_ENV, "/etc/confine.json")]));
        assert_eq!(path, Some(PathBuf::from("/etc/confine.json")));

        let fallback = config_path_from(env(&[(CONFIG_PATH_ENV, "")]));
        assert_eq!(fallback, default_config_path());
        assert!(fallback.is_some_and(|p| p.ends_with(CONFIG_FILE_NAME)));
    }

    #[test]
    fn limiter_uses_resolved_limit() {
        let config = OutputLimitConfig::resolve(env(&[(MAX_LINES_ENV, "2")]), None);
        assert_eq!(config.limiter().limit("a\nb\nc"), ("a\nb", true));
    }

    #[test]
    fn source_display() {
        assert_eq!(LimitSource::Env(MAX_LINES_ENV).to_string(), "$RUN_COMMAND_MAX_LINES");
        assert_eq!(LimitSource::Default.to_string(), "default");
    }
}
