//! Process configuration, loaded once at startup.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Which macro event types get persisted to the combat/chat log — §6.3
/// `WS_LOG_VERBOSITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsLogVerbosity {
    Macros,
    Minimal,
    Off,
}

impl WsLogVerbosity {
    fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "macros" => Ok(Self::Macros),
            "minimal" => Ok(Self::Minimal),
            "off" => Ok(Self::Off),
            other => anyhow::bail!("invalid WS_LOG_VERBOSITY: {other}"),
        }
    }
}

/// Whether an SW-only command invoked by a player rejects with a private
/// reply or is silently ignored — §6.3 `VISIBILITY_POLICY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityPolicy {
    Reject,
    SilentIgnore,
}

impl VisibilityPolicy {
    fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "silent" | "silent_ignore" => Ok(Self::SilentIgnore),
            other => anyhow::bail!("invalid VISIBILITY_POLICY: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub listen_port: u16,
    pub rust_log: String,
    pub macro_throttle: Duration,
    pub ws_log_verbosity: WsLogVerbosity,
    pub visibility_policy: VisibilityPolicy,
    pub ability_max_uses_per_level: i32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
        let listen_port = env::var("LISTEN_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("LISTEN_PORT must be a valid port number")?;
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let macro_throttle_ms = env::var("MACRO_THROTTLE_MS")
            .unwrap_or_else(|_| "700".to_string())
            .parse::<u64>()
            .context("MACRO_THROTTLE_MS must be an integer")?;

        let ws_log_verbosity = match env::var("WS_LOG_VERBOSITY") {
            Ok(raw) => WsLogVerbosity::parse(&raw)?,
            Err(_) => WsLogVerbosity::Macros,
        };

        let visibility_policy = match env::var("VISIBILITY_POLICY") {
            Ok(raw) => VisibilityPolicy::parse(&raw)?,
            Err(_) => VisibilityPolicy::Reject,
        };

        let ability_max_uses_per_level = env::var("ABILITY_MAX_USES_PER_LEVEL")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<i32>()
            .context("ABILITY_MAX_USES_PER_LEVEL must be an integer")?;

        Ok(Self {
            bind_addr,
            listen_port,
            rust_log,
            macro_throttle: Duration::from_millis(macro_throttle_ms),
            ws_log_verbosity,
            visibility_policy,
            ability_max_uses_per_level,
        })
    }
}
