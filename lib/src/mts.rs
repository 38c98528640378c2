//! Selection and control of the on-device MTS log-capture service family.
//!
//! The services themselves are external init-managed daemons; this module
//! decides which one realizes a requested capture, computes the property set
//! parameterizing it, and drives start/stop through the property store. The
//! property key strings are consumed by existing init scripts and must be
//! preserved bit for bit.

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::modem_config::{OfflineLogging, TraceFileSize, TraceLocation};
use crate::platform::PlatformInfo;
use crate::response_parser::{ServiceStatus, parse_service_status};

pub const MTS_NAME_PROP: &str = "persist.service.mts.name";
pub const MTS_INPUT_PROP: &str = "persist.service.mts.input";
pub const MTS_OUTPUT_TYPE_PROP: &str = "persist.service.mts.output_type";
pub const MTS_OUTPUT_PROP: &str = "persist.service.mts.output";
pub const MTS_ROTATE_SIZE_PROP: &str = "persist.service.mts.rotate_size";
pub const MTS_ROTATE_NUM_PROP: &str = "persist.service.mts.rotate_num";
pub const USBMODEM_ENABLE_PROP: &str = "persist.service.usbmodem.enable";
pub const MTSP_ENABLE_PROP: &str = "persist.service.mtsp.enable";

/// TCP port the online capture service listens on.
pub const ONLINE_SOCKET_PORT: u16 = 6700;

/// Every service name we may ever have started. `stop` sweeps all of them;
/// the capture daemons are exclusive and must never overlay.
const ALL_SERVICE_NAMES: [&str; 9] = [
    "mtsfs", "mtsextfs", "mtssd", "mtsextsd", "mtsusb", "mtspti", "mtso", "mtsp", "usbmodem",
];

#[derive(Error, Debug)]
pub enum MtsError {
    #[error("failed to run {command:?}: {source}")]
    Exec {
        command: String,
        source: std::io::Error,
    },
    #[error("{command:?} failed: {detail}")]
    CommandFailed { command: String, detail: String },
}

/// Boundary to the Android property store and init service control.
/// Implementations live outside the core (the daemon shells out to
/// `getprop`/`setprop`/`start`/`stop`; tests use an in-memory map).
#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn set_property(&self, key: &str, value: &str) -> Result<(), MtsError>;
    async fn get_property(&self, key: &str) -> Result<Option<String>, MtsError>;
    async fn exec(&self, command: &str) -> Result<(), MtsError>;
}

/// The fixed logging-service identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoggingService {
    Disabled,
    FsSmallEmmc,
    FsLargeEmmc,
    FsSmallSdcard,
    FsLargeSdcard,
    UsbOneshot,
    PtiOneshot,
    OnlineUsbModem,
}

impl LoggingService {
    /// Init service name, `None` for `Disabled`.
    pub fn service_name(self) -> Option<&'static str> {
        match self {
            LoggingService::Disabled => None,
            LoggingService::FsSmallEmmc => Some("mtsfs"),
            LoggingService::FsLargeEmmc => Some("mtsextfs"),
            LoggingService::FsSmallSdcard => Some("mtssd"),
            LoggingService::FsLargeSdcard => Some("mtsextsd"),
            LoggingService::UsbOneshot => Some("mtsusb"),
            LoggingService::PtiOneshot => Some("mtspti"),
            LoggingService::OnlineUsbModem => Some("usbmodem"),
        }
    }

    pub fn from_service_name(name: &str) -> Option<LoggingService> {
        match name {
            "mtsfs" => Some(LoggingService::FsSmallEmmc),
            "mtsextfs" => Some(LoggingService::FsLargeEmmc),
            "mtssd" => Some(LoggingService::FsSmallSdcard),
            "mtsextsd" => Some(LoggingService::FsLargeSdcard),
            "mtsusb" => Some(LoggingService::UsbOneshot),
            "mtspti" => Some(LoggingService::PtiOneshot),
            "usbmodem" => Some(LoggingService::OnlineUsbModem),
            _ => None,
        }
    }

    /// The trace location this service captures for.
    pub fn location(self) -> TraceLocation {
        match self {
            LoggingService::Disabled => TraceLocation::None,
            LoggingService::FsSmallEmmc | LoggingService::FsLargeEmmc => TraceLocation::Emmc,
            LoggingService::FsSmallSdcard | LoggingService::FsLargeSdcard => TraceLocation::Sdcard,
            LoggingService::UsbOneshot => TraceLocation::UsbApe,
            LoggingService::PtiOneshot => TraceLocation::PtiModem,
            LoggingService::OnlineUsbModem => TraceLocation::UsbModem,
        }
    }

    /// Size class, for the filesystem-backed services only.
    pub fn file_size(self) -> TraceFileSize {
        match self {
            LoggingService::FsSmallEmmc | LoggingService::FsSmallSdcard => TraceFileSize::Small,
            LoggingService::FsLargeEmmc | LoggingService::FsLargeSdcard => TraceFileSize::Large,
            _ => TraceFileSize::None,
        }
    }

    fn is_mts_family(self) -> bool {
        !matches!(self, LoggingService::Disabled | LoggingService::OnlineUsbModem)
    }
}

/// The five-property parameter set written for a capture service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceProperties {
    pub input: String,
    pub output_type: String,
    pub output: String,
    pub rotate_size: u32,
    pub rotate_num: u32,
}

/// Maps (service, requested offline transport) to the property set realizing
/// it, and drives enable/stop through the property store. The per-platform
/// constants are picked once at construction.
pub struct LoggingServiceSelector {
    store: Arc<dyn PropertyStore>,
    rotate_size: u32,
    rotate_num: u32,
    hsi_log_tty: String,
    usb_log_tty: String,
    pti_device: String,
    emmc_output: String,
    sdcard_output: String,
}

impl LoggingServiceSelector {
    pub fn new(store: Arc<dyn PropertyStore>, platform: &PlatformInfo) -> Self {
        let (rotate_size, rotate_num) = platform.rotate_config();
        LoggingServiceSelector {
            store,
            rotate_size,
            rotate_num,
            hsi_log_tty: platform.hsi_log_tty.clone(),
            usb_log_tty: platform.usb_log_tty.clone(),
            pti_device: platform.pti_device.clone(),
            emmc_output: platform.emmc_output.clone(),
            sdcard_output: platform.sdcard_output.clone(),
        }
    }

    /// Pure lookup of the property set for a service. Filesystem services
    /// read from the HSI tty unless USB offline transport was requested;
    /// oneshot services never rotate.
    pub fn properties_for(
        &self,
        service: LoggingService,
        offline: OfflineLogging,
    ) -> ServiceProperties {
        let fs_input = if offline == OfflineLogging::Usb {
            self.usb_log_tty.clone()
        } else {
            self.hsi_log_tty.clone()
        };
        match service {
            LoggingService::Disabled => ServiceProperties::default(),
            LoggingService::FsSmallEmmc | LoggingService::FsLargeEmmc => ServiceProperties {
                input: fs_input,
                output_type: "f".to_string(),
                output: self.emmc_output.clone(),
                rotate_size: self.rotate_size,
                rotate_num: self.rotate_num,
            },
            LoggingService::FsSmallSdcard | LoggingService::FsLargeSdcard => ServiceProperties {
                input: fs_input,
                output_type: "f".to_string(),
                output: self.sdcard_output.clone(),
                rotate_size: self.rotate_size,
                rotate_num: self.rotate_num,
            },
            LoggingService::UsbOneshot => ServiceProperties {
                input: self.usb_log_tty.clone(),
                output_type: "f".to_string(),
                output: self.emmc_output.clone(),
                rotate_size: 0,
                rotate_num: 0,
            },
            LoggingService::PtiOneshot => ServiceProperties {
                input: self.hsi_log_tty.clone(),
                output_type: "p".to_string(),
                output: self.pti_device.clone(),
                rotate_size: 0,
                rotate_num: 0,
            },
            LoggingService::OnlineUsbModem => ServiceProperties {
                input: self.usb_log_tty.clone(),
                output_type: "s".to_string(),
                output: ONLINE_SOCKET_PORT.to_string(),
                rotate_size: 0,
                rotate_num: 0,
            },
        }
    }

    /// Which capture service is live right now.
    ///
    /// The mts family is probed through `init.svc.*`; the online USB modem
    /// family is probed through its persistent enable flag instead, because
    /// its init script starts and exits continuously and `init.svc.*` never
    /// settles for it.
    pub async fn active_service(&self) -> Result<LoggingService, MtsError> {
        if let Some(flag) = self.store.get_property(USBMODEM_ENABLE_PROP).await? {
            if flag.trim() == "1" {
                return Ok(LoggingService::OnlineUsbModem);
            }
        }
        let name = match self.store.get_property(MTS_NAME_PROP).await? {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => return Ok(LoggingService::Disabled),
        };
        let status = self
            .store
            .get_property(&format!("init.svc.{name}"))
            .await?
            .map(|raw| parse_service_status(&raw))
            .unwrap_or(ServiceStatus::Unknown);
        if status != ServiceStatus::Running {
            return Ok(LoggingService::Disabled);
        }
        Ok(LoggingService::from_service_name(&name).unwrap_or(LoggingService::Disabled))
    }

    /// The tty the mts service is currently configured to read from.
    pub async fn current_input(&self) -> Result<Option<String>, MtsError> {
        self.store.get_property(MTS_INPUT_PROP).await
    }

    pub fn hsi_log_tty(&self) -> &str {
        &self.hsi_log_tty
    }

    /// Write the parameter set and start `service`. Callers must have
    /// stopped the previously active service first; the capture daemons are
    /// exclusive.
    pub async fn enable(
        &self,
        service: LoggingService,
        properties: &ServiceProperties,
    ) -> Result<(), MtsError> {
        let Some(name) = service.service_name() else {
            info!("logging service disabled, nothing to start");
            return Ok(());
        };
        if service.is_mts_family() {
            self.store.set_property(MTS_NAME_PROP, name).await?;
            self.store
                .set_property(MTS_INPUT_PROP, &properties.input)
                .await?;
            self.store
                .set_property(MTS_OUTPUT_TYPE_PROP, &properties.output_type)
                .await?;
            self.store
                .set_property(MTS_OUTPUT_PROP, &properties.output)
                .await?;
            self.store
                .set_property(MTS_ROTATE_SIZE_PROP, &properties.rotate_size.to_string())
                .await?;
            self.store
                .set_property(MTS_ROTATE_NUM_PROP, &properties.rotate_num.to_string())
                .await?;
        }
        match service {
            LoggingService::OnlineUsbModem => {
                // The usbmodem init script watches this flag and keeps
                // relaunching itself; there is no start command to issue.
                self.store.set_property(USBMODEM_ENABLE_PROP, "1").await?;
            }
            LoggingService::PtiOneshot => {
                self.store.set_property(MTSP_ENABLE_PROP, "1").await?;
                self.store.exec(&format!("start {name}")).await?;
            }
            _ => {
                self.store.exec(&format!("start {name}")).await?;
            }
        }
        info!("enabled logging service {name}");
        Ok(())
    }

    /// Stop every capture service and clear the enable flags. Failures to
    /// stop individual services are logged and skipped so one wedged daemon
    /// cannot block disabling the rest.
    pub async fn stop(&self) -> Result<(), MtsError> {
        self.store.set_property(USBMODEM_ENABLE_PROP, "0").await?;
        self.store.set_property(MTSP_ENABLE_PROP, "0").await?;
        self.store.set_property(MTS_NAME_PROP, "").await?;
        for name in ALL_SERVICE_NAMES {
            if let Err(err) = self.store.exec(&format!("stop {name}")).await {
                warn!("failed to stop {name}: {err}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformFamily;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        properties: Mutex<HashMap<String, String>>,
        commands: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PropertyStore for MemoryStore {
        async fn set_property(&self, key: &str, value: &str) -> Result<(), MtsError> {
            self.properties
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get_property(&self, key: &str) -> Result<Option<String>, MtsError> {
            Ok(self.properties.lock().unwrap().get(key).cloned())
        }

        async fn exec(&self, command: &str) -> Result<(), MtsError> {
            self.commands.lock().unwrap().push(command.to_string());
            Ok(())
        }
    }

    fn selector(platform: &PlatformInfo) -> (Arc<MemoryStore>, LoggingServiceSelector) {
        let store = Arc::new(MemoryStore::default());
        let selector = LoggingServiceSelector::new(store.clone(), platform);
        (store, selector)
    }

    #[tokio::test]
    async fn enable_writes_the_five_mts_properties_and_starts() {
        let platform = PlatformInfo::default();
        let (store, selector) = selector(&platform);
        let props = selector.properties_for(LoggingService::FsLargeEmmc, OfflineLogging::Hsi);
        selector
            .enable(LoggingService::FsLargeEmmc, &props)
            .await
            .unwrap();

        let properties = store.properties.lock().unwrap();
        assert_eq!(properties.get(MTS_NAME_PROP).unwrap(), "mtsextfs");
        assert_eq!(properties.get(MTS_INPUT_PROP).unwrap(), "/dev/gsmtty1");
        assert_eq!(properties.get(MTS_OUTPUT_TYPE_PROP).unwrap(), "f");
        assert_eq!(properties.get(MTS_OUTPUT_PROP).unwrap(), "/logs/bplog");
        assert_eq!(properties.get(MTS_ROTATE_SIZE_PROP).unwrap(), "200000");
        assert_eq!(properties.get(MTS_ROTATE_NUM_PROP).unwrap(), "3");
        drop(properties);
        assert_eq!(store.commands.lock().unwrap().as_slice(), ["start mtsextfs"]);
    }

    #[tokio::test]
    async fn online_usb_modem_is_flag_driven() {
        let platform = PlatformInfo::default();
        let (store, selector) = selector(&platform);
        let props = selector.properties_for(LoggingService::OnlineUsbModem, OfflineLogging::None);
        selector
            .enable(LoggingService::OnlineUsbModem, &props)
            .await
            .unwrap();

        assert_eq!(
            store
                .properties
                .lock()
                .unwrap()
                .get(USBMODEM_ENABLE_PROP)
                .unwrap(),
            "1"
        );
        // No start command: the init script relaunches on its own.
        assert!(store.commands.lock().unwrap().is_empty());
        assert_eq!(
            selector.active_service().await.unwrap(),
            LoggingService::OnlineUsbModem
        );
    }

    #[tokio::test]
    async fn active_service_needs_init_to_report_running() {
        let platform = PlatformInfo::default();
        let (store, selector) = selector(&platform);
        store.set_property(MTS_NAME_PROP, "mtssd").await.unwrap();

        store.set_property("init.svc.mtssd", "stopped").await.unwrap();
        assert_eq!(
            selector.active_service().await.unwrap(),
            LoggingService::Disabled
        );

        store.set_property("init.svc.mtssd", "running").await.unwrap();
        assert_eq!(
            selector.active_service().await.unwrap(),
            LoggingService::FsSmallSdcard
        );
    }

    #[tokio::test]
    async fn stop_sweeps_every_service_and_clears_flags() {
        let platform = PlatformInfo::default();
        let (store, selector) = selector(&platform);
        store.set_property(USBMODEM_ENABLE_PROP, "1").await.unwrap();
        selector.stop().await.unwrap();

        let properties = store.properties.lock().unwrap();
        assert_eq!(properties.get(USBMODEM_ENABLE_PROP).unwrap(), "0");
        assert_eq!(properties.get(MTSP_ENABLE_PROP).unwrap(), "0");
        assert_eq!(properties.get(MTS_NAME_PROP).unwrap(), "");
        drop(properties);
        let commands = store.commands.lock().unwrap();
        for name in ALL_SERVICE_NAMES {
            assert!(commands.contains(&format!("stop {name}")), "missing stop {name}");
        }
    }

    #[test]
    fn rotation_follows_platform_family() {
        let lexington = PlatformInfo {
            family: PlatformFamily::Lexington,
            ..PlatformInfo::default()
        };
        let store: Arc<dyn PropertyStore> = Arc::new(MemoryStore::default());
        let selector = LoggingServiceSelector::new(store, &lexington);
        let props = selector.properties_for(LoggingService::FsSmallSdcard, OfflineLogging::Hsi);
        assert_eq!((props.rotate_size, props.rotate_num), (25000, 6));
        assert_eq!(props.output, "/sdcard/logs/bplog");
    }

    #[test]
    fn offline_transport_selects_the_input_tty() {
        let platform = PlatformInfo::default();
        let store: Arc<dyn PropertyStore> = Arc::new(MemoryStore::default());
        let selector = LoggingServiceSelector::new(store, &platform);
        let hsi = selector.properties_for(LoggingService::FsSmallEmmc, OfflineLogging::Hsi);
        assert_eq!(hsi.input, "/dev/gsmtty1");
        let usb = selector.properties_for(LoggingService::FsSmallEmmc, OfflineLogging::Usb);
        assert_eq!(usb.input, "/dev/ttyACM1");
    }
}
