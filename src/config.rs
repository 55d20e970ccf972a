use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveTime, Weekday};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".sitepulse";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_REPORT_DAY: &str = "mon";
const DEFAULT_REPORT_TIME: &str = "08:30";

const DEFAULT_BUSINESS_CONTEXT: &str = "A luxury yacht charter marketing website. \
Visitors browse yachts and destinations; the conversion actions are the WhatsApp, \
phone and email contact buttons and the inquiry form submission. Traffic is mostly \
organic search and paid social; peak season is summer.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub api_port: u16,
    pub trigger_token: Option<String>,

    pub provider_base_url: String,
    pub provider_property_id: String,
    pub provider_api_key: Option<String>,
    pub provider_timeout_seconds: u64,

    pub model_base_url: String,
    pub model_name: String,
    pub model_api_key: Option<String>,
    pub model_timeout_seconds: u64,

    pub notify_enabled: bool,
    pub notify_bot_token: Option<String>,
    pub notify_chat_id: String,
    pub notify_timeout_seconds: u64,

    pub report_day: String,
    pub report_time: String,
    pub business_context: String,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            db_path: root.join("db").join("sitepulse.db"),
            api_port: 7855,
            trigger_token: None,
            provider_base_url: "https://analyticsdata.googleapis.com/v1beta".to_string(),
            provider_property_id: String::new(),
            provider_api_key: None,
            provider_timeout_seconds: 30,
            model_base_url: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-4o-mini".to_string(),
            model_api_key: None,
            model_timeout_seconds: 60,
            notify_enabled: true,
            notify_bot_token: None,
            notify_chat_id: String::new(),
            notify_timeout_seconds: 10,
            report_day: DEFAULT_REPORT_DAY.to_string(),
            report_time: DEFAULT_REPORT_TIME.to_string(),
            business_context: DEFAULT_BUSINESS_CONTEXT.to_string(),
        }
    }
}

impl Config {
    pub fn root_dir() -> PathBuf {
        default_root_dir()
    }

    pub fn config_path() -> PathBuf {
        default_root_dir().join(CONFIG_FILE)
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        Ok(())
    }

    pub fn parse_report_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.report_time)
    }

    pub fn parse_report_day(&self) -> Result<Weekday> {
        parse_weekday(&self.report_day)
    }

    /// Secrets resolve from the environment first so deployments can keep
    /// them out of the config file entirely.
    pub fn resolve_provider_key(&self) -> Option<String> {
        resolve_secret("SITEPULSE_PROVIDER_KEY", self.provider_api_key.as_deref())
    }

    pub fn resolve_model_key(&self) -> Option<String> {
        resolve_secret("SITEPULSE_MODEL_KEY", self.model_api_key.as_deref())
    }

    pub fn resolve_trigger_token(&self) -> Option<String> {
        resolve_secret("SITEPULSE_TRIGGER_TOKEN", self.trigger_token.as_deref())
    }

    pub fn resolve_bot_token(&self) -> Option<String> {
        resolve_secret("SITEPULSE_BOT_TOKEN", self.notify_bot_token.as_deref())
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "db_path" => self.db_path = expand_home(value),
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "trigger_token" => {
                self.trigger_token = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "provider_base_url" => {
                self.provider_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "provider_property_id" => self.provider_property_id = value.trim().to_string(),
            "provider_api_key" => {
                self.provider_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "provider_timeout_seconds" => {
                self.provider_timeout_seconds = parse_timeout("provider_timeout_seconds", value)?;
            }
            "model_base_url" => {
                self.model_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "model_name" => self.model_name = value.trim().to_string(),
            "model_api_key" => {
                self.model_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "model_timeout_seconds" => {
                self.model_timeout_seconds = parse_timeout("model_timeout_seconds", value)?;
            }
            "notify_enabled" => {
                self.notify_enabled = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("notify_enabled must be true/false"))?;
            }
            "notify_bot_token" => {
                self.notify_bot_token = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "notify_chat_id" => self.notify_chat_id = value.trim().to_string(),
            "notify_timeout_seconds" => {
                self.notify_timeout_seconds = parse_timeout("notify_timeout_seconds", value)?;
            }
            "report_day" => {
                parse_weekday(value)?;
                self.report_day = value.trim().to_lowercase();
            }
            "report_time" => {
                parse_hhmm(value)?;
                self.report_time = value.to_string();
            }
            "business_context" => {
                if value.trim().is_empty() {
                    bail!("business_context must not be empty");
                }
                self.business_context = value.trim().to_string();
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: db_path|db.path, \
                     api_port|api.port, trigger_token|api.trigger_token, \
                     provider_base_url|provider.base_url, provider_property_id|provider.property_id, \
                     provider_api_key|provider.api_key, provider_timeout_seconds|provider.timeout_seconds, \
                     model_base_url|model.base_url, model_name|model.name, model_api_key|model.api_key, \
                     model_timeout_seconds|model.timeout_seconds, notify_enabled|notify.enabled, \
                     notify_bot_token|notify.bot_token, notify_chat_id|notify.chat_id, \
                     notify_timeout_seconds|notify.timeout_seconds, report_day|report.day, \
                     report_time|report.time, business_context|report.business_context"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "db_path" => Some(self.db_path.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "trigger_token" => Some(mask_secret(self.trigger_token.as_deref())),
            "provider_base_url" => Some(self.provider_base_url.clone()),
            "provider_property_id" => Some(self.provider_property_id.clone()),
            "provider_api_key" => Some(mask_secret(self.provider_api_key.as_deref())),
            "provider_timeout_seconds" => Some(self.provider_timeout_seconds.to_string()),
            "model_base_url" => Some(self.model_base_url.clone()),
            "model_name" => Some(self.model_name.clone()),
            "model_api_key" => Some(mask_secret(self.model_api_key.as_deref())),
            "model_timeout_seconds" => Some(self.model_timeout_seconds.to_string()),
            "notify_enabled" => Some(self.notify_enabled.to_string()),
            "notify_bot_token" => Some(mask_secret(self.notify_bot_token.as_deref())),
            "notify_chat_id" => Some(self.notify_chat_id.clone()),
            "notify_timeout_seconds" => Some(self.notify_timeout_seconds.to_string()),
            "report_day" => Some(self.report_day.clone()),
            "report_time" => Some(self.report_time.clone()),
            "business_context" => Some(self.business_context.clone()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "db_path" | "db.path" => "db_path",
        "api_port" | "api.port" => "api_port",
        "trigger_token" | "api.trigger_token" => "trigger_token",
        "provider_base_url" | "provider.base_url" => "provider_base_url",
        "provider_property_id" | "provider.property_id" => "provider_property_id",
        "provider_api_key" | "provider.api_key" => "provider_api_key",
        "provider_timeout_seconds" | "provider.timeout_seconds" => "provider_timeout_seconds",
        "model_base_url" | "model.base_url" => "model_base_url",
        "model_name" | "model.name" => "model_name",
        "model_api_key" | "model.api_key" => "model_api_key",
        "model_timeout_seconds" | "model.timeout_seconds" => "model_timeout_seconds",
        "notify_enabled" | "notify.enabled" => "notify_enabled",
        "notify_bot_token" | "notify.bot_token" => "notify_bot_token",
        "notify_chat_id" | "notify.chat_id" => "notify_chat_id",
        "notify_timeout_seconds" | "notify.timeout_seconds" => "notify_timeout_seconds",
        "report_day" | "report.day" => "report_day",
        "report_time" | "report.time" => "report_time",
        "business_context" | "report.business_context" => "business_context",
        _ => key,
    }
}

fn resolve_secret(env_key: &str, configured: Option<&str>) -> Option<String> {
    std::env::var(env_key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            configured
                .filter(|value| !value.trim().is_empty())
                .map(ToOwned::to_owned)
        })
}

fn mask_secret(value: Option<&str>) -> String {
    value
        .map(|_| "***set***".to_string())
        .unwrap_or_else(|| "not_set".to_string())
}

fn parse_timeout(key: &str, value: &str) -> Result<u64> {
    let parsed = value
        .parse::<u64>()
        .map_err(|_| anyhow!("{key} must be a number of seconds"))?;

    Ok(parsed.max(1))
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("Invalid time format: {value}. Example: 08:30 (24-hour format)"))
}

pub fn parse_weekday(value: &str) -> Result<Weekday> {
    match value.trim().to_lowercase().as_str() {
        "mon" | "monday" => Ok(Weekday::Mon),
        "tue" | "tuesday" => Ok(Weekday::Tue),
        "wed" | "wednesday" => Ok(Weekday::Wed),
        "thu" | "thursday" => Ok(Weekday::Thu),
        "fri" | "friday" => Ok(Weekday::Fri),
        "sat" | "saturday" => Ok(Weekday::Sat),
        "sun" | "sunday" => Ok(Weekday::Sun),
        other => bail!("Invalid weekday: {other}. Example: mon"),
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
