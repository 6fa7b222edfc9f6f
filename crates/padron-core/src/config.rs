//! Runtime configuration for scrape runs.
//!
//! Every knob has a default matching the behavior the portals tolerate
//! (4–7 s delays, 300 s challenge ceiling). Values come from `PADRON_*`
//! environment variables and may be overridden by CLI flags before
//! [`AppConfig::validated`] is called.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("invalid {what} range: {min} exceeds {max}")]
    InvalidRange {
        what: &'static str,
        min: String,
        max: String,
    },

    #[error("{what} must be non-zero")]
    ZeroValue { what: &'static str },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding per-portal session blobs.
    pub state_dir: PathBuf,
    pub log_level: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Inter-request delay range, seconds. Drawn uniformly per request.
    pub delay_min_secs: f64,
    pub delay_max_secs: f64,
    /// Ceiling on waiting for an anti-bot challenge to clear.
    pub challenge_timeout_secs: u64,
    /// Interval between challenge re-classification polls.
    pub challenge_poll_secs: u64,
    /// Additional attempts after a transport failure before skipping.
    pub fetch_retries: u32,
    /// Total-attempts guard: at most `attempts_factor × limit` candidates
    /// are processed per run.
    pub attempts_factor: u32,
    /// Whether browser-backed portals run without a visible window. Headless
    /// sessions cannot expect manual challenge resolution.
    pub headless: bool,
    /// Whether to fetch candidate pages for optional detail enrichment on
    /// portals whose listings already carry the mandatory fields.
    pub details: bool,
    /// Empresite discovery filter: employee count range.
    pub employee_min: u32,
    pub employee_max: u32,
}

impl AppConfig {
    /// Checks cross-field invariants, returning the config on success.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRange`] when a min exceeds its max and
    /// [`ConfigError::ZeroValue`] for zero timeouts or poll intervals.
    pub fn validated(self) -> Result<Self, ConfigError> {
        if !(self.delay_min_secs >= 0.0 && self.delay_max_secs >= self.delay_min_secs) {
            return Err(ConfigError::InvalidRange {
                what: "delay",
                min: self.delay_min_secs.to_string(),
                max: self.delay_max_secs.to_string(),
            });
        }
        if self.employee_min > self.employee_max {
            return Err(ConfigError::InvalidRange {
                what: "employee",
                min: self.employee_min.to_string(),
                max: self.employee_max.to_string(),
            });
        }
        if self.challenge_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue {
                what: "challenge timeout",
            });
        }
        if self.challenge_poll_secs == 0 {
            return Err(ConfigError::ZeroValue {
                what: "challenge poll interval",
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue {
                what: "request timeout",
            });
        }
        Ok(self)
    }
}

/// Load configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading.
///
/// # Errors
///
/// Returns [`ConfigError`] if a variable is present but unparseable.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns [`ConfigError`] if a variable is present but unparseable.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build configuration using the provided env-var lookup function.
///
/// The parsing/validation logic is decoupled from the actual environment so
/// it can be tested with a pure `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default =
        |var: &str, default: &str| -> String { lookup(var).unwrap_or_else(|_| default.to_string()) };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        or_default(var, default)
            .parse::<f64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected a boolean, got \"{other}\""),
            }),
        }
    };

    let state_dir = lookup("PADRON_STATE_DIR").map_or_else(
        |_| default_state_dir(&lookup),
        PathBuf::from,
    );

    Ok(AppConfig {
        state_dir,
        log_level: or_default("PADRON_LOG_LEVEL", "info"),
        user_agent: or_default(
            "PADRON_USER_AGENT",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
             Chrome/124.0.0.0 Safari/537.36",
        ),
        request_timeout_secs: parse_u64("PADRON_REQUEST_TIMEOUT_SECS", "30")?,
        delay_min_secs: parse_f64("PADRON_DELAY_MIN_SECS", "4.0")?,
        delay_max_secs: parse_f64("PADRON_DELAY_MAX_SECS", "7.0")?,
        challenge_timeout_secs: parse_u64("PADRON_CHALLENGE_TIMEOUT_SECS", "300")?,
        challenge_poll_secs: parse_u64("PADRON_CHALLENGE_POLL_SECS", "5")?,
        fetch_retries: parse_u32("PADRON_FETCH_RETRIES", "2")?,
        attempts_factor: parse_u32("PADRON_ATTEMPTS_FACTOR", "3")?,
        headless: parse_bool("PADRON_HEADLESS", "false")?,
        details: parse_bool("PADRON_DETAILS", "false")?,
        employee_min: parse_u32("PADRON_EMPLOYEE_MIN", "10")?,
        employee_max: parse_u32("PADRON_EMPLOYEE_MAX", "200")?,
    })
}

fn default_state_dir<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    lookup("HOME").map_or_else(
        |_| PathBuf::from(".padron"),
        |home| PathBuf::from(home).join(".padron"),
    )
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
