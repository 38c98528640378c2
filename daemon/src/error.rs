use modemtrace::at_channel::AtChannelError;
use modemtrace::controller::ModemError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Config file parsing error: {0}")]
    ConfigFileParsingError(#[from] toml::de::Error),
    #[error("AT channel error: {0}")]
    ChannelError(#[from] AtChannelError),
    #[error("Modem error: {0}")]
    ModemError(#[from] ModemError),
    #[error("Tokio error: {0}")]
    TokioError(#[from] tokio::io::Error),
}
