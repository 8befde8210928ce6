use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::answers::ResolverSettings;
use crate::browser::{DriverSettings, RetryPolicy, WebDriverSettings};
use crate::engine::EngineSettings;
use crate::llm_client::{LlmSettings, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub llm_model: String,
    pub webdriver_url: String,
    pub browser_headless: bool,
    pub port: u16,
    pub rust_log: String,
    pub engine: EngineSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            llm_model: optional_env("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            webdriver_url: optional_env("WEBDRIVER_URL")
                .unwrap_or_else(|| "http://localhost:4444".to_string()),
            browser_headless: parse_flag_env("BROWSER_HEADLESS", true)?,
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            engine: engine_settings_from_env()?,
        })
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            api_key: self.anthropic_api_key.clone(),
            model: self.llm_model.clone(),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn webdriver_settings(&self) -> WebDriverSettings {
        WebDriverSettings {
            url: self.webdriver_url.clone(),
            headless: self.browser_headless,
            // outer bound only; each driver operation has its own shorter timeout
            request_timeout: self.engine.driver.retry.op_timeout * 2,
        }
    }
}

fn engine_settings_from_env() -> Result<EngineSettings> {
    let defaults = EngineSettings::default();
    let retry_defaults = &defaults.driver.retry;

    let retry = RetryPolicy {
        max_attempts: parse_env("DRIVER_MAX_ATTEMPTS", retry_defaults.max_attempts)?.max(1),
        base_delay: Duration::from_millis(parse_env(
            "DRIVER_BACKOFF_BASE_MS",
            retry_defaults.base_delay.as_millis() as u64,
        )?),
        jitter: parse_env("DRIVER_BACKOFF_JITTER", retry_defaults.jitter)?.max(0.0),
        op_timeout: Duration::from_secs(parse_env(
            "DRIVER_OP_TIMEOUT_SECS",
            retry_defaults.op_timeout.as_secs(),
        )?),
    };

    Ok(EngineSettings {
        field_match_threshold: parse_env("FIELD_MATCH_THRESHOLD", defaults.field_match_threshold)?,
        resolver: ResolverSettings {
            option_threshold: parse_env(
                "OPTION_MATCH_THRESHOLD",
                defaults.resolver.option_threshold,
            )?,
            long_text_max_chars: parse_env(
                "LONG_TEXT_MAX_CHARS",
                defaults.resolver.long_text_max_chars,
            )?,
            default_confidence: parse_env(
                "GENERATOR_DEFAULT_CONFIDENCE",
                defaults.resolver.default_confidence,
            )?,
        },
        driver: DriverSettings {
            submit_selector: optional_env("SUBMIT_SELECTOR")
                .unwrap_or(defaults.driver.submit_selector),
            max_sessions_per_source: parse_env(
                "MAX_SESSIONS_PER_SOURCE",
                defaults.driver.max_sessions_per_source,
            )?
            .max(1),
            element_wait: Duration::from_millis(parse_env(
                "DRIVER_ELEMENT_WAIT_MS",
                defaults.driver.element_wait.as_millis() as u64,
            )?)
            .min(retry.op_timeout),
            retry,
        },
    })
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'"))
}

fn parse_flag_env(key: &str, default: bool) -> Result<bool> {
    let Some(raw) = optional_env(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("Environment variable '{key}' must be true or false, got '{raw}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_reports_variable_name() {
        assert_eq!(parse_value::<u16>("PORT", " 9090 ").unwrap(), 9090);
        assert!((parse_value::<f64>("FIELD_MATCH_THRESHOLD", "0.75").unwrap() - 0.75).abs() < 1e-9);

        let err = parse_value::<u32>("DRIVER_MAX_ATTEMPTS", "three").unwrap_err();
        assert!(err.to_string().contains("DRIVER_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_defaults_without_tunables() {
        let settings = engine_settings_from_env().unwrap();
        assert_eq!(settings.driver.retry, RetryPolicy::default());
        assert_eq!(settings.driver.max_sessions_per_source, 2);
        assert_eq!(settings.driver.element_wait, Duration::from_secs(10));
        assert_eq!(settings.resolver.long_text_max_chars, 4000);
    }
}
