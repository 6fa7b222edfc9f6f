pub mod config;
pub mod record;

pub use config::{load_app_config, load_app_config_from_env, AppConfig, ConfigError};
pub use record::{derive_domain, CompanyRecord, Portal, RecordDraft, Region};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown portal: {0}")]
    UnknownPortal(String),

    #[error("region must not be empty")]
    EmptyRegion,
}
