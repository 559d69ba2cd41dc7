use std::env;
use std::fs;
use serde::Deserialize;
use crate::errors::ConfigError;
use crate::logging::setup_logging;
use crate::manager_sheet::models::ServiceAccountCreds;

#[derive(Deserialize)]
pub struct WebServer {
    pub bind_address: String,
    pub bind_port: u16,
}

#[derive(Deserialize)]
pub struct Location {
    pub name: String,
    pub nx: i32,
    pub ny: i32,
}

#[derive(Deserialize)]
pub struct Schedule {
    /// Legacy behavior: minutes after the issue hour before a batch counts
    /// as published. 0 means a batch is valid at the top of its hour.
    #[serde(default)]
    pub publication_delay_minutes: u32,
    #[serde(default = "default_refresh_offset")]
    pub refresh_offset_minute: u32,
    #[serde(default = "default_morning_hour")]
    pub morning_hour: u32,
    #[serde(default = "default_morning_minute")]
    pub morning_minute: u32,
}

#[derive(Deserialize, Default)]
pub struct DiscordSection {
    /// Channel to mention newly registered members in, if any
    pub welcome_channel: Option<String>,
}

#[derive(Deserialize)]
struct FileConfig {
    web_server: WebServer,
    location: Location,
    #[serde(default = "default_schedule")]
    schedule: Schedule,
    #[serde(default)]
    discord: DiscordSection,
}

/// Secrets, only ever read from the environment
pub struct Secrets {
    pub bot_token: String,
    pub client_id: String,
    pub gemini_api_key: String,
    pub data_api_key: String,
    pub spreadsheet_id: String,
    pub webhook_secret: String,
    pub google_creds: ServiceAccountCreds,
}

pub struct Config {
    pub web_server: WebServer,
    pub location: Location,
    pub schedule: Schedule,
    pub discord: DiscordSection,
    pub secrets: Secrets,
}

/// Reads configuration and sets up logging.
///
/// The config file path is the first program argument, defaulting to
/// ./config.toml. Secrets come from the environment only; a missing one is
/// fatal here rather than somewhere mid-request.
pub fn config() -> Result<Config, ConfigError> {
    setup_logging()?;

    let path = env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let raw = fs::read_to_string(&path)?;
    let file: FileConfig = toml::from_str(&raw)?;
    validate_schedule(&file.schedule)?;

    let google_creds: ServiceAccountCreds =
        serde_json::from_str(&require("GOOGLE_SERVICE_ACCOUNT_CREDS")?)?;

    let secrets = Secrets {
        bot_token: require("BOT_TOKEN")?,
        client_id: require("CLIENT_ID")?,
        gemini_api_key: require("GEMINI_API_KEY")?,
        data_api_key: require("DATA_API_KEY")?,
        spreadsheet_id: require("SPREADSHEET_ID")?,
        webhook_secret: require("WEBHOOK_SECRET")?,
        google_creds,
    };

    Ok(Config {
        web_server: file.web_server,
        location: file.location,
        schedule: file.schedule,
        discord: file.discord,
        secrets,
    })
}

fn require(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError(format!("missing required environment variable {}", name)))
}

/// Rejects out-of-range clock values here, so the scheduled loops never
/// see them at steady state
fn validate_schedule(schedule: &Schedule) -> Result<(), ConfigError> {
    if schedule.morning_hour > 23 {
        return Err(ConfigError(format!("morning_hour {} out of range 0-23", schedule.morning_hour)));
    }
    if schedule.morning_minute > 59 {
        return Err(ConfigError(format!("morning_minute {} out of range 0-59", schedule.morning_minute)));
    }
    if schedule.refresh_offset_minute > 59 {
        return Err(ConfigError(format!(
            "refresh_offset_minute {} out of range 0-59", schedule.refresh_offset_minute
        )));
    }
    if schedule.publication_delay_minutes > 59 {
        return Err(ConfigError(format!(
            "publication_delay_minutes {} out of range 0-59", schedule.publication_delay_minutes
        )));
    }
    Ok(())
}

fn default_refresh_offset() -> u32 { 10 }
fn default_morning_hour() -> u32 { 6 }
fn default_morning_minute() -> u32 { 50 }

fn default_schedule() -> Schedule {
    Schedule {
        publication_delay_minutes: 0,
        refresh_offset_minute: default_refresh_offset(),
        morning_hour: default_morning_hour(),
        morning_minute: default_morning_minute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(validate_schedule(&default_schedule()).is_ok());
    }

    #[test]
    fn out_of_range_clock_values_are_fatal_at_startup() {
        let mut schedule = default_schedule();
        schedule.morning_hour = 24;
        assert!(validate_schedule(&schedule).is_err());

        let mut schedule = default_schedule();
        schedule.morning_minute = 60;
        assert!(validate_schedule(&schedule).is_err());

        let mut schedule = default_schedule();
        schedule.refresh_offset_minute = 60;
        assert!(validate_schedule(&schedule).is_err());

        let mut schedule = default_schedule();
        schedule.publication_delay_minutes = 60;
        assert!(validate_schedule(&schedule).is_err());
    }
}
