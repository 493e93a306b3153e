use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::paths::bookmark_file_path;

pub const DEFAULT_API_URL: &str = "https://api.estrategiaconcursos.com.br/api/aluno/curso";
pub const DEFAULT_TOKEN_URL: &str = "https://teal-crostata-aea03c.netlify.app/api/config";
pub const DEFAULT_PLAYER: &str = "mpv";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

const API_URL_VAR: &str = "LESSONMARK_API_URL";
const TOKEN_URL_VAR: &str = "LESSONMARK_TOKEN_URL";
const PLAYER_VAR: &str = "LESSONMARK_PLAYER";
const BOOKMARKS_VAR: &str = "LESSONMARK_BOOKMARKS";
const HTTP_TIMEOUT_VAR: &str = "LESSONMARK_HTTP_TIMEOUT_SECS";

/// Runtime settings resolved from `LESSONMARK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub token_url: String,
    pub player_bin: PathBuf,
    pub bookmarks_path: PathBuf,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var_os(key))
    }

    /// Resolves the configuration through `lookup` instead of the process
    /// environment. Unset and empty values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let api_url = non_empty(API_URL_VAR)
            .map(|value| value.to_string_lossy().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let token_url = non_empty(TOKEN_URL_VAR)
            .map(|value| value.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string());
        let player_bin = non_empty(PLAYER_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PLAYER));
        let bookmarks_path = match non_empty(BOOKMARKS_VAR) {
            Some(value) => PathBuf::from(value),
            None => bookmark_file_path()?,
        };
        let http_timeout = match non_empty(HTTP_TIMEOUT_VAR) {
            Some(value) => {
                let raw = value.to_string_lossy();
                let secs = raw.trim().parse::<u64>().with_context(|| {
                    format!("{HTTP_TIMEOUT_VAR} must be a whole number of seconds, got '{raw}'")
                })?;
                Duration::from_secs(secs.max(1))
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            api_url,
            token_url,
            player_bin,
            bookmarks_path,
            http_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), OsString::from(value)))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            (API_URL_VAR, "http://127.0.0.1:9000/api/curso/"),
            (TOKEN_URL_VAR, "http://127.0.0.1:9000/config"),
            (PLAYER_VAR, "/opt/bin/mpv"),
            (BOOKMARKS_VAR, "/tmp/marks.json"),
            (HTTP_TIMEOUT_VAR, "3"),
        ]))
        .expect("config should resolve");

        assert_eq!(config.api_url, "http://127.0.0.1:9000/api/curso");
        assert_eq!(config.token_url, "http://127.0.0.1:9000/config");
        assert_eq!(config.player_bin, PathBuf::from("/opt/bin/mpv"));
        assert_eq!(config.bookmarks_path, PathBuf::from("/tmp/marks.json"));
        assert_eq!(config.http_timeout, Duration::from_secs(3));
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            (API_URL_VAR, ""),
            (PLAYER_VAR, ""),
            (BOOKMARKS_VAR, "/tmp/marks.json"),
        ]))
        .expect("config should resolve");

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.player_bin, PathBuf::from(DEFAULT_PLAYER));
        assert_eq!(
            config.http_timeout,
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)
        );
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        let err = Config::from_lookup(lookup_from(&[
            (BOOKMARKS_VAR, "/tmp/marks.json"),
            (HTTP_TIMEOUT_VAR, "soon"),
        ]))
        .expect_err("timeout must be numeric");
        assert!(
            err.to_string().contains(HTTP_TIMEOUT_VAR),
            "unexpected error message: {err}"
        );
    }
}
