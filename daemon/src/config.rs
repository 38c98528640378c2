use log::warn;
use serde::{Deserialize, Serialize};

use modemtrace::platform::PlatformInfo;

use crate::error::DaemonError;

/// The structure of a valid modemtraced configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// AT control device of the modem
    pub at_device: String,
    /// Listening port
    pub port: u16,
    /// Total wait per AT exchange, in milliseconds
    pub at_timeout_ms: u64,
    /// Platform catalog record for this device
    pub platform: PlatformInfo,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            at_device: "/dev/gsmtty18".to_string(),
            port: 8088,
            at_timeout_ms: 2500,
            platform: PlatformInfo::default(),
        }
    }
}

pub async fn parse_config<P>(path: P) -> Result<Config, DaemonError>
where
    P: AsRef<std::path::Path>,
{
    if let Ok(config_file) = tokio::fs::read_to_string(&path).await {
        Ok(toml::from_str(&config_file).map_err(DaemonError::ConfigFileParsingError)?)
    } else {
        warn!("unable to read config file, using default config");
        Ok(Config::default())
    }
}

pub struct Args {
    pub config_path: String,
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        println!("Usage: {} /path/to/config/file", args[0]);
        std::process::exit(1);
    }
    Args {
        config_path: args[1].clone(),
    }
}
