pub mod campaign;
pub mod config;
pub mod error;
pub mod mail;
pub mod routing;
mod serve;

pub use campaign::{Campaign, CampaignSettings, DispatchReport, SelectionPolicy, Trigger};
pub use config::{CampaignConfig, EnvConfig};
pub use error::{Error, Result};
pub use serve::{serve, serve_campaign, shutdown_signal};
