//! Data model for modem trace configurations: trace levels, XSIO routing
//! values, the named predefined configurations and the user-assembled custom
//! configuration, plus the bidirectional table tying predefined names to the
//! (XSIO, trace level, logging service) triples that realize them.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::mts::LoggingService;
use crate::platform::PlatformInfo;

/// Modem trace verbosity preset. Levels are mutually exclusive AT command
/// presets, not bitsets: selecting a richer level replaces the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TraceLevel {
    #[default]
    None,
    Baseband,
    Baseband3G,
    Baseband3GDigrf,
}

impl TraceLevel {
    pub fn is_enabled(self) -> bool {
        self != TraceLevel::None
    }
}

/// Physical trace-output routing selected with `AT+XSIO=<n>`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
pub enum XsioValue {
    /// USB-ACM, also the disabled baseline.
    UsbAcm = 0,
    /// Generic USB routing.
    UsbGeneric = 1,
    /// Coredump routing.
    Coredump = 2,
    /// HSI routing.
    Hsi = 4,
}

/// The fixed set of named configurations, plus `Custom` for user-assembled
/// combinations and `Unknown` when the observed state matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredefinedConfig {
    Coredump,
    OfflineBpLog,
    OnlineBpLog,
    OfflineUsbBpLog,
    PtiBpLog,
    TraceDisable,
    Custom,
    Unknown,
}

/// Where trace output lands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceLocation {
    #[default]
    None,
    Emmc,
    Sdcard,
    Coredump,
    UsbApe,
    UsbModem,
    PtiModem,
}

/// Log file size class for filesystem-backed capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceFileSize {
    #[default]
    None,
    Small,
    Large,
}

/// Transport carrying offline (filesystem-bound) logs off the modem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfflineLogging {
    #[default]
    None,
    Hsi,
    Usb,
}

/// A user-assembled configuration. `file_size` and `offline` are only
/// meaningful when `location` is `Emmc` or `Sdcard`; they stay `None`
/// otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomConfig {
    pub location: TraceLocation,
    pub level: TraceLevel,
    pub file_size: TraceFileSize,
    pub offline: OfflineLogging,
    pub mux_trace: bool,
    pub additional_traces: bool,
}

/// Forward direction of the predefined-configuration table: the
/// (XSIO, trace level, logging service) triple realizing `cfg` on the given
/// platform. `Custom` and `Unknown` have no fixed triple.
///
/// Coredump is the platform-sensitive row: with USB-ACM available the dump is
/// routed over the ACM function (XSIO 0, coredump AT variants), without it
/// the dedicated coredump routing (XSIO 2) is used.
pub fn forward(
    cfg: PredefinedConfig,
    platform: &PlatformInfo,
) -> Option<(XsioValue, TraceLevel, LoggingService)> {
    let triple = match cfg {
        PredefinedConfig::Coredump => {
            let xsio = if platform.flags.usb_acm_enabled {
                XsioValue::UsbAcm
            } else {
                platform.coredump_xsio
            };
            (xsio, TraceLevel::Baseband3G, LoggingService::Disabled)
        }
        PredefinedConfig::OfflineBpLog => (
            platform.offline_hsi_xsio,
            TraceLevel::Baseband3G,
            LoggingService::FsSmallEmmc,
        ),
        PredefinedConfig::OfflineUsbBpLog => (
            platform.offline_usb_xsio,
            TraceLevel::Baseband3G,
            LoggingService::FsSmallEmmc,
        ),
        PredefinedConfig::OnlineBpLog => (
            platform.online_usb_xsio,
            TraceLevel::Baseband3G,
            LoggingService::OnlineUsbModem,
        ),
        PredefinedConfig::PtiBpLog => (
            platform.online_pti_xsio,
            TraceLevel::Baseband3GDigrf,
            LoggingService::PtiOneshot,
        ),
        PredefinedConfig::TraceDisable => {
            (XsioValue::UsbAcm, TraceLevel::None, LoggingService::Disabled)
        }
        PredefinedConfig::Custom | PredefinedConfig::Unknown => return None,
    };
    Some(triple)
}

/// Inverse of [`forward`]: given what was actually observed on the modem,
/// name the predefined configuration it corresponds to, or `Unknown`.
///
/// `xsio` is the *requested* side of the XSIO transition (the value that is,
/// or will be after reboot, in effect). Holds `classify(forward(cfg)) == cfg`
/// for every non-Custom `cfg` and every flag combination.
pub fn classify(
    xsio: XsioValue,
    level: TraceLevel,
    service: LoggingService,
    platform: &PlatformInfo,
) -> PredefinedConfig {
    match service {
        LoggingService::Disabled => {
            if level == TraceLevel::None && xsio == XsioValue::UsbAcm {
                PredefinedConfig::TraceDisable
            } else if level.is_enabled() && xsio == platform.coredump_xsio {
                PredefinedConfig::Coredump
            } else if level.is_enabled()
                && xsio == XsioValue::UsbAcm
                && platform.flags.usb_acm_enabled
            {
                PredefinedConfig::Coredump
            } else {
                PredefinedConfig::Unknown
            }
        }
        LoggingService::FsSmallEmmc if level == TraceLevel::Baseband3G => {
            if xsio == platform.offline_hsi_xsio {
                PredefinedConfig::OfflineBpLog
            } else if xsio == platform.offline_usb_xsio {
                PredefinedConfig::OfflineUsbBpLog
            } else {
                PredefinedConfig::Unknown
            }
        }
        LoggingService::OnlineUsbModem
            if level == TraceLevel::Baseband3G && xsio == platform.online_usb_xsio =>
        {
            PredefinedConfig::OnlineBpLog
        }
        LoggingService::PtiOneshot
            if level == TraceLevel::Baseband3GDigrf && xsio == platform.online_pti_xsio =>
        {
            PredefinedConfig::PtiBpLog
        }
        _ => PredefinedConfig::Unknown,
    }
}
