use crate::utils::error::AppError;
use std::env;
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = ".";
const DEFAULT_QR_OUTPUT_PATH: &str = "qr.png";
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration, read from the environment (after `.env` is loaded)
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub data_dir: PathBuf,
    /// Link encoded in the QR code; falls back to the bot's t.me address
    pub bot_link: Option<String>,
    pub qr_output_path: PathBuf,
    pub poll_timeout_secs: u64,
    /// Bind address for /health and /metrics; None disables the server
    pub health_addr: Option<String>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = non_empty("TOKEN")
            .ok_or_else(|| AppError::ConfigError("TOKEN must be set".to_string()))?;

        let poll_timeout_secs = match non_empty("POLL_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                AppError::ConfigError(format!("POLL_TIMEOUT_SECS '{}' is invalid: {}", raw, e))
            })?,
            None => DEFAULT_POLL_TIMEOUT_SECS,
        };

        Ok(Self {
            token,
            data_dir: PathBuf::from(
                non_empty("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            ),
            bot_link: non_empty("BOT_LINK"),
            qr_output_path: PathBuf::from(
                non_empty("QR_OUTPUT_PATH").unwrap_or_else(|| DEFAULT_QR_OUTPUT_PATH.to_string()),
            ),
            poll_timeout_secs,
            health_addr: non_empty("HEALTH_ADDR"),
        })
    }
}
