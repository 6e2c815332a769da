use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::env;
use config;

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // Populated from the .env file
    pub database_path: String,
    pub media_path: String,
    pub site_url: String,
    pub republish_endpoint: String,
    pub image_credits_enabled: bool,
    pub allowed_origins: String,
    pub log_level: String,
}

pub const DEFAULT_REPUBLISH_ENDPOINT: &str = "republish";

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| config::ConfigError::Message(format!(
        "FATAL: Environment variable '{}' is not set in your .env file.", name
    )))
}

/// Endpoint prefixes end up in a route pattern, so only a conservative charset is accepted.
pub fn validate_endpoint(endpoint: &str) -> Result<(), config::ConfigError> {
    if endpoint.is_empty() || !endpoint.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(config::ConfigError::Message(
            "FATAL: 'REPUBLISH_ENDPOINT' must not be empty and can only contain letters, numbers, underscores, and hyphens.".to_string()
        ));
    }
    Ok(())
}

pub fn validate_site_url(site_url: &str) -> Result<String, config::ConfigError> {
    let parsed = url::Url::parse(site_url).map_err(|e| config::ConfigError::Message(format!(
        "FATAL: 'SITE_URL' ('{}') is not a valid URL: {}", site_url, e
    )))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(config::ConfigError::Message(format!(
            "FATAL: 'SITE_URL' ('{}') must be an absolute http(s) URL.", site_url
        )));
    }
    Ok(site_url.trim_end_matches('/').to_string())
}

/// Parses an on/off switch. Accepts `true`/`false`, `1`/`0`, `yes`/`no` and `on`/`off`.
pub fn parse_flag(name: &str, value: &str) -> Result<bool, config::ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(config::ConfigError::Message(format!(
            "FATAL: '{}' ('{}') must be one of true/false, 1/0, yes/no, on/off.", name, other
        ))),
    }
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path)
            .map_err(|e| config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}", env_path.display(), e
            )))?;

        let database_path = required_var("DATABASE_PATH")?;
        let media_path = required_var("MEDIA_PATH")?;
        let site_url = validate_site_url(&required_var("SITE_URL")?)?;

        let republish_endpoint = env::var("REPUBLISH_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_REPUBLISH_ENDPOINT.to_string());
        validate_endpoint(&republish_endpoint)?;

        // Whether the image credits subsystem is installed; without it no image is ever redacted.
        let image_credits_enabled = parse_flag(
            "IMAGE_CREDITS_ENABLED",
            &env::var("IMAGE_CREDITS_ENABLED").unwrap_or_default(),
        )?;

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        for (name, path) in [("DATABASE_PATH", &database_path), ("MEDIA_PATH", &media_path)] {
            if Path::new(path).is_relative() {
                return Err(config::ConfigError::Message(format!(
                    "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                    name, path
                )));
            }
        }

        let builder = config::Config::builder()
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("media_path", media_path)?
            .set_override("site_url", site_url)?
            .set_override("republish_endpoint", republish_endpoint)?
            .set_override("image_credits_enabled", image_credits_enabled)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .build()?;

        builder.try_deserialize()
    }

    /// Returns the full path to the site options database file inside its own folder.
    pub fn site_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path)
            .join("site")
            .join("site.db")
    }

    /// Returns the full path to the posts database file inside its own folder.
    pub fn posts_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path)
            .join("posts")
            .join("posts.db")
    }
}
