use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

pub use config::ConfigError;

use crate::campaign::{BusinessHours, GateFlags, SelectionPolicy};
use crate::mail::MailerConfig;

/// Deserialize any serde type from process environment variables.
///
/// Keys are matched case-insensitively, so `CSV_FILE_PATH` fills a
/// `csv_file_path` field.
pub trait EnvConfig: Sized {
    fn from_env() -> Result<Self, ConfigError>;
    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError>;
}

impl<D> EnvConfig for D
where
    D: DeserializeOwned,
{
    fn from_env() -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix(prefix))
            .build()?
            .try_deserialize()
    }
}

/// Everything a campaign needs, read from `KEY=value` environment entries.
///
/// Credentials are optional here; their absence is reported per invocation
/// rather than at startup so `status` keeps working on a half-configured host.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
    #[serde(default = "default_csv_file_path")]
    pub csv_file_path: PathBuf,

    #[serde(default = "default_cv_file_path")]
    pub cv_file_path: PathBuf,

    #[serde(default)]
    pub email_address: Option<String>,

    #[serde(default)]
    pub email_password: Option<String>,

    /// Name used in the signature. Falls back to the sender address.
    #[serde(default)]
    pub sender_name: String,

    /// Extra signature lines separated by `;`.
    #[serde(default)]
    pub sender_links: String,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// `starttls` (default), `tls`, or `none`.
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: String,

    /// Relay connection timeout in seconds.
    #[serde(default = "default_smtp_timeout")]
    pub smtp_timeout: u64,

    /// Upper bound for one whole send, in seconds.
    #[serde(default = "default_send_timeout")]
    pub send_timeout: u64,

    #[serde(default = "default_start_hour")]
    pub start_hour: u8,

    #[serde(default = "default_end_hour")]
    pub end_hour: u8,

    #[serde(default)]
    pub test_mode: bool,

    #[serde(default)]
    pub production_mode: bool,

    #[serde(default)]
    pub ignore_business_hours: bool,

    #[serde(default)]
    pub selection_policy: SelectionPolicy,

    #[serde(default = "default_counter_file_path")]
    pub counter_file_path: PathBuf,

    #[serde(default = "default_failed_emails_file")]
    pub failed_emails_file: PathBuf,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_csv_file_path() -> PathBuf {
    PathBuf::from("data/contacts_real.csv")
}

fn default_cv_file_path() -> PathBuf {
    PathBuf::from("assets/cv.pdf")
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> String {
    "starttls".to_string()
}

fn default_smtp_timeout() -> u64 {
    30
}

fn default_send_timeout() -> u64 {
    60
}

fn default_start_hour() -> u8 {
    9
}

fn default_end_hour() -> u8 {
    17
}

// Lives in the temp area so restarts keep progress but rebuilds may not.
fn default_counter_file_path() -> PathBuf {
    std::env::temp_dir().join("coldmail_email_counter.txt")
}

fn default_failed_emails_file() -> PathBuf {
    PathBuf::from("data/Failed.csv")
}

fn default_port() -> u16 {
    8080
}

impl CampaignConfig {
    /// Load a `.env` file if one exists, then read the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn business_hours(&self) -> BusinessHours {
        BusinessHours {
            start_hour: self.start_hour,
            end_hour: self.end_hour,
        }
    }

    pub fn gate_flags(&self) -> GateFlags {
        GateFlags {
            test_mode: self.test_mode,
            production_mode: self.production_mode,
            ignore_business_hours: self.ignore_business_hours,
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout)
    }

    /// Both the sender address and its credential are present and non-blank.
    pub fn email_configured(&self) -> bool {
        self.credentials().is_some()
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.email_address.as_deref(), self.email_password.as_deref()) {
            (Some(address), Some(password))
                if !address.trim().is_empty() && !password.is_empty() =>
            {
                Some((address.trim(), password))
            }
            _ => None,
        }
    }

    /// SMTP settings for [`SmtpMailer`](crate::mail::SmtpMailer), or `None`
    /// when credentials are missing.
    pub fn mailer_config(&self) -> Option<MailerConfig> {
        let (address, password) = self.credentials()?;
        Some(MailerConfig {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username: Some(address.to_string()),
            password: Some(password.to_string()),
            from: address.to_string(),
            tls: self.smtp_tls.clone(),
            timeout: self.smtp_timeout,
        })
    }

    pub fn signature_links(&self) -> Vec<String> {
        self.sender_links
            .split(';')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()
    }
}
