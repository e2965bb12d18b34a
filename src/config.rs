use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

use crate::constants::{defaults, envvars, topics};
use crate::data_mgmt::windowing::{Windowing, WindowingError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Windowing(#[from] WindowingError),
}

#[derive(Clone, Debug)]
pub struct PvOutputSettings {
    pub base_url: String,
    pub api_key: String,
    pub system_id: String,
    pub request_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct FeedSettings {
    pub host: String,
    pub port: u16,
    pub topic: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub pvoutput: PvOutputSettings,
    pub feed: FeedSettings,
    pub windowing: Windowing,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            pvoutput: PvOutputSettings::from_env()?,
            feed: FeedSettings::from_env()?,
            windowing: windowing_from_env()?,
        })
    }
}

impl PvOutputSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(PvOutputSettings {
            base_url: env_or(envvars::PVOUTPUT_BASE_URL, defaults::PVOUTPUT_BASE_URL.to_string())?,
            api_key: required(envvars::PVOUTPUT_API_KEY)?,
            system_id: required(envvars::PVOUTPUT_SYSTEM_ID)?,
            request_timeout: env_or(
                envvars::PVOUTPUT_REQUEST_TIMEOUT_SECS,
                defaults::PVOUTPUT_REQUEST_TIMEOUT.as_secs(),
            )
            .map(Duration::from_secs)?,
        })
    }
}

impl FeedSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(FeedSettings {
            host: env_or(envvars::MQTT_HOST, defaults::MQTT_HOST.to_string())?,
            port: env_or(envvars::MQTT_PORT, defaults::MQTT_PORT)?,
            topic: env_or(envvars::MQTT_TOPIC, topics::LIVE_MEASUREMENT.to_string())?,
        })
    }
}

fn windowing_from_env() -> Result<Windowing, ConfigError> {
    let timezone_name = env_or(envvars::LOCAL_TIMEZONE, defaults::LOCAL_TIMEZONE.to_string())?;
    let timezone: Tz = timezone_name
        .parse()
        .map_err(|e| invalid(envvars::LOCAL_TIMEZONE, &timezone_name, e))?;
    let width = env_or(envvars::WINDOW_MINUTES, defaults::WINDOW_MINUTES)?;
    let offset = env_or(
        envvars::WINDOW_PHASE_OFFSET_MINUTES,
        defaults::WINDOW_PHASE_OFFSET_MINUTES,
    )?;
    Ok(Windowing::new(width, offset, timezone)?)
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn env_or<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match env::var(var) {
        Ok(value) => value.parse().map_err(|e| invalid(var, &value, e)),
        Err(_) => Ok(default),
    }
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_VARS: [(&str, Option<&str>); 2] = [
        (envvars::PVOUTPUT_API_KEY, Some("secret")),
        (envvars::PVOUTPUT_SYSTEM_ID, Some("12345")),
    ];

    #[test]
    fn defaults_apply() {
        temp_env::with_vars(
            [
                BASE_VARS[0],
                BASE_VARS[1],
                (envvars::PVOUTPUT_BASE_URL, None),
                (envvars::PVOUTPUT_REQUEST_TIMEOUT_SECS, None),
                (envvars::MQTT_PORT, None),
                (envvars::MQTT_TOPIC, None),
                (envvars::LOCAL_TIMEZONE, None),
                (envvars::WINDOW_MINUTES, None),
                (envvars::WINDOW_PHASE_OFFSET_MINUTES, None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.pvoutput.base_url, "https://pvoutput.org");
                assert_eq!(config.pvoutput.api_key, "secret");
                assert_eq!(config.pvoutput.request_timeout, Duration::from_secs(60));
                assert_eq!(config.feed.port, 1883);
                assert_eq!(config.feed.topic, "tibber/live");
                assert_eq!(config.windowing.timezone(), chrono_tz::Europe::Amsterdam);
                assert_eq!(config.windowing.width(), chrono::Duration::minutes(5));
            },
        );
    }

    #[test]
    fn overrides_apply() {
        temp_env::with_vars(
            [
                BASE_VARS[0],
                BASE_VARS[1],
                (envvars::MQTT_PORT, Some("8883")),
                (envvars::LOCAL_TIMEZONE, Some("UTC")),
                (envvars::WINDOW_MINUTES, Some("15")),
                (envvars::WINDOW_PHASE_OFFSET_MINUTES, Some("0")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.feed.port, 8883);
                assert_eq!(config.windowing.timezone(), chrono_tz::UTC);
                assert_eq!(config.windowing.width(), chrono::Duration::minutes(15));
            },
        );
    }

    #[test]
    fn missing_api_key() {
        temp_env::with_vars(
            [
                (envvars::PVOUTPUT_API_KEY, None),
                (envvars::PVOUTPUT_SYSTEM_ID, Some("12345")),
            ],
            || {
                assert!(matches!(
                    PvOutputSettings::from_env(),
                    Err(ConfigError::Missing(envvars::PVOUTPUT_API_KEY))
                ));
            },
        );
    }

    #[test]
    fn invalid_values() {
        temp_env::with_vars(
            [
                BASE_VARS[0],
                BASE_VARS[1],
                (envvars::MQTT_PORT, Some("not-a-port")),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(matches!(
                    err,
                    ConfigError::Invalid { var: envvars::MQTT_PORT, .. }
                ));
            },
        );

        temp_env::with_vars(
            [
                BASE_VARS[0],
                BASE_VARS[1],
                (envvars::MQTT_PORT, None),
                (envvars::LOCAL_TIMEZONE, Some("Mars/Olympus_Mons")),
            ],
            || {
                assert!(matches!(
                    Config::from_env(),
                    Err(ConfigError::Invalid { var: envvars::LOCAL_TIMEZONE, .. })
                ));
            },
        );

        temp_env::with_vars(
            [
                BASE_VARS[0],
                BASE_VARS[1],
                (envvars::LOCAL_TIMEZONE, None),
                (envvars::WINDOW_MINUTES, Some("7")),
            ],
            || {
                assert!(matches!(
                    Config::from_env(),
                    Err(ConfigError::Windowing(WindowingError::Width(7)))
                ));
            },
        );
    }
}
