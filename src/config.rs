use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    data_dir: PathBuf,
    artifacts_dir: PathBuf,
    http_bind: SocketAddr,
    arxiv_base_url: String,
    arxiv_connect_timeout: Duration,
    arxiv_total_timeout: Duration,
    http_max_retries: usize,
    http_backoff_base_ms: u64,
    http_backoff_cap_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から設定値を読み込み、検証する。
    ///
    /// すべての値にデフォルトがあるため、未設定の変数はエラーにならない。
    ///
    /// # Errors
    /// 数値／アドレスのパースに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = parse_path("RADAR_DATA_DIR", "data");
        let artifacts_dir = parse_path("RADAR_ARTIFACTS_DIR", "artifacts");
        let http_bind = parse_socket_addr("RADAR_HTTP_BIND", "0.0.0.0:8000")?;

        let arxiv_base_url = env::var("ARXIV_API_BASE_URL")
            .unwrap_or_else(|_| "http://export.arxiv.org/api/query".to_string());
        let arxiv_connect_timeout = parse_duration_ms("ARXIV_CONNECT_TIMEOUT_MS", 3000)?;
        let arxiv_total_timeout = parse_duration_ms("ARXIV_TOTAL_TIMEOUT_MS", 30000)?;

        // Retry settings (exponential backoff + jitter)
        let http_max_retries = parse_non_zero("HTTP_MAX_RETRIES", 3)?;
        let http_backoff_base_ms = parse_u64("HTTP_BACKOFF_BASE_MS", 250)?;
        let http_backoff_cap_ms = parse_u64("HTTP_BACKOFF_CAP_MS", 10000)?;

        Ok(Self {
            data_dir,
            artifacts_dir,
            http_bind,
            arxiv_base_url,
            arxiv_connect_timeout,
            arxiv_total_timeout,
            http_max_retries,
            http_backoff_base_ms,
            http_backoff_cap_ms,
        })
    }

    #[must_use]
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    #[must_use]
    pub fn artifacts_dir(&self) -> &PathBuf {
        &self.artifacts_dir
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn arxiv_base_url(&self) -> &str {
        &self.arxiv_base_url
    }

    #[must_use]
    pub fn arxiv_connect_timeout(&self) -> Duration {
        self.arxiv_connect_timeout
    }

    #[must_use]
    pub fn arxiv_total_timeout(&self) -> Duration {
        self.arxiv_total_timeout
    }

    #[must_use]
    pub fn http_max_retries(&self) -> usize {
        self.http_max_retries
    }

    #[must_use]
    pub fn http_backoff_base_ms(&self) -> u64 {
        self.http_backoff_base_ms
    }

    #[must_use]
    pub fn http_backoff_cap_ms(&self) -> u64 {
        self.http_backoff_cap_ms
    }
}

fn parse_path(name: &'static str, default: &str) -> PathBuf {
    env::var(name)
        .ok()
        .filter(|raw| !raw.trim().is_empty())
        .map_or_else(|| PathBuf::from(default), PathBuf::from)
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());

    raw.parse().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let ms = parse_u64(name, default_ms)?;
    Ok(Duration::from_millis(ms))
}

fn parse_non_zero(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    if parsed == 0 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("must be greater than zero"),
        });
    }
    Ok(parsed)
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 9] = [
        "RADAR_DATA_DIR",
        "RADAR_ARTIFACTS_DIR",
        "RADAR_HTTP_BIND",
        "ARXIV_API_BASE_URL",
        "ARXIV_CONNECT_TIMEOUT_MS",
        "ARXIV_TOTAL_TIMEOUT_MS",
        "HTTP_MAX_RETRIES",
        "HTTP_BACKOFF_BASE_MS",
        "HTTP_BACKOFF_CAP_MS",
    ];

    fn vars_with(
        overrides: &[(&'static str, &'static str)],
    ) -> Vec<(&'static str, Option<&'static str>)> {
        KEYS.iter()
            .map(|key| {
                let value = overrides
                    .iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, value)| *value);
                (*key, value)
            })
            .collect()
    }

    #[test]
    fn from_env_uses_defaults_when_optional_missing() {
        temp_env::with_vars(vars_with(&[]), || {
            let config = Config::from_env().expect("config should load");

            assert_eq!(config.data_dir(), &PathBuf::from("data"));
            assert_eq!(config.artifacts_dir(), &PathBuf::from("artifacts"));
            assert_eq!(config.http_bind(), "0.0.0.0:8000".parse().unwrap());
            assert_eq!(
                config.arxiv_base_url(),
                "http://export.arxiv.org/api/query"
            );
            assert_eq!(config.arxiv_connect_timeout(), Duration::from_millis(3000));
            assert_eq!(config.arxiv_total_timeout(), Duration::from_millis(30000));
            assert_eq!(config.http_max_retries(), 3);
            assert_eq!(config.http_backoff_base_ms(), 250);
            assert_eq!(config.http_backoff_cap_ms(), 10000);
        });
    }

    #[test]
    fn from_env_overrides_values() {
        let vars = vars_with(&[
            ("RADAR_DATA_DIR", "/srv/radar/data"),
            ("RADAR_ARTIFACTS_DIR", "/srv/radar/artifacts"),
            ("RADAR_HTTP_BIND", "127.0.0.1:8088"),
            ("ARXIV_API_BASE_URL", "http://mirror.example.com/api/query"),
            ("HTTP_MAX_RETRIES", "5"),
        ]);
        temp_env::with_vars(vars, || {
            let config = Config::from_env().expect("config should load");

            assert_eq!(config.data_dir(), &PathBuf::from("/srv/radar/data"));
            assert_eq!(
                config.artifacts_dir(),
                &PathBuf::from("/srv/radar/artifacts")
            );
            assert_eq!(config.http_bind(), "127.0.0.1:8088".parse().unwrap());
            assert_eq!(
                config.arxiv_base_url(),
                "http://mirror.example.com/api/query"
            );
            assert_eq!(config.http_max_retries(), 5);
        });
    }

    #[test]
    fn from_env_rejects_invalid_bind_address() {
        let vars = vars_with(&[("RADAR_HTTP_BIND", "not-an-address")]);
        temp_env::with_vars(vars, || {
            let error = Config::from_env().expect_err("invalid bind should fail");
            assert!(matches!(
                error,
                ConfigError::Invalid {
                    name: "RADAR_HTTP_BIND",
                    ..
                }
            ));
        });
    }

    #[test]
    fn from_env_rejects_zero_retries() {
        let vars = vars_with(&[("HTTP_MAX_RETRIES", "0")]);
        temp_env::with_vars(vars, || {
            let error = Config::from_env().expect_err("zero retries should fail");
            assert!(matches!(
                error,
                ConfigError::Invalid {
                    name: "HTTP_MAX_RETRIES",
                    ..
                }
            ));
        });
    }
}
