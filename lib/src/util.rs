use nix::sys::utsname::uname;
use serde::Serialize;

/// Expose binary and system information.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeMetadata {
    pub name: String,
    pub version: String,
    pub os: String,
    pub arch: String,
}

impl RuntimeMetadata {
    pub fn new() -> Self {
        match uname() {
            Ok(utsname) => RuntimeMetadata {
                name: env!("CARGO_PKG_NAME").to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                arch: utsname.machine().to_string_lossy().into_owned(),
                os: format!(
                    "{} {}",
                    utsname.sysname().to_string_lossy(),
                    utsname.release().to_string_lossy(),
                ),
            },
            Err(_) => RuntimeMetadata {
                name: env!("CARGO_PKG_NAME").to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                arch: std::env::consts::ARCH.to_string(),
                os: std::env::consts::OS.to_string(),
            },
        }
    }
}

impl Default for RuntimeMetadata {
    fn default() -> Self {
        Self::new()
    }
}
