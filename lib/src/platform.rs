//! The immutable platform-catalog record the core consumes. The catalog
//! itself (an XML file on the device) is parsed by an external collaborator;
//! the core only ever sees this typed record.

use serde::{Deserialize, Serialize};

use crate::modem_config::XsioValue;

/// Capability flags that change how configurations map onto the modem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformFlags {
    /// The modem exposes a USB-ACM function; coredump goes over it (XSIO 0)
    /// instead of the dedicated coredump routing (XSIO 2).
    pub usb_acm_enabled: bool,
    /// The USB mux can be switched between APE and modem.
    pub usbswitch_enabled: bool,
    /// A PTI connector is wired out.
    pub pti_enabled: bool,
}

/// Platform family, selecting the log rotation constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformFamily {
    Lexington,
    Clovertrail,
    Medfield,
}

impl PlatformFamily {
    /// (rotate_size, rotate_num) for filesystem-backed capture services.
    pub fn rotate_config(self) -> (u32, u32) {
        match self {
            PlatformFamily::Lexington => (25000, 6),
            PlatformFamily::Clovertrail | PlatformFamily::Medfield => (200000, 3),
        }
    }
}

/// One platform's trace plumbing: which XSIO value realizes each routing,
/// which ttys the capture services read from, and where log files land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformInfo {
    pub family: PlatformFamily,
    pub flags: PlatformFlags,
    pub coredump_xsio: XsioValue,
    pub offline_usb_xsio: XsioValue,
    pub offline_hsi_xsio: XsioValue,
    pub online_usb_xsio: XsioValue,
    pub online_pti_xsio: XsioValue,
    pub hsi_log_tty: String,
    pub usb_log_tty: String,
    pub pti_device: String,
    pub emmc_output: String,
    pub sdcard_output: String,
}

impl Default for PlatformInfo {
    fn default() -> Self {
        PlatformInfo {
            family: PlatformFamily::Medfield,
            flags: PlatformFlags::default(),
            coredump_xsio: XsioValue::Coredump,
            offline_usb_xsio: XsioValue::UsbGeneric,
            offline_hsi_xsio: XsioValue::Hsi,
            online_usb_xsio: XsioValue::UsbAcm,
            online_pti_xsio: XsioValue::UsbGeneric,
            hsi_log_tty: "/dev/gsmtty1".to_string(),
            usb_log_tty: "/dev/ttyACM1".to_string(),
            pti_device: "/dev/pti".to_string(),
            emmc_output: "/logs/bplog".to_string(),
            sdcard_output: "/sdcard/logs/bplog".to_string(),
        }
    }
}

impl PlatformInfo {
    /// The five configured XSIO routing offsets, in catalog order.
    pub fn xsio_offsets(&self) -> [XsioValue; 5] {
        [
            self.coredump_xsio,
            self.offline_usb_xsio,
            self.offline_hsi_xsio,
            self.online_usb_xsio,
            self.online_pti_xsio,
        ]
    }

    /// The distinct XSIO values this platform can actually be asked for.
    /// Sized to the populated offsets, not a fixed loop bound.
    pub fn allowed_xsio(&self) -> Vec<XsioValue> {
        let mut allowed = Vec::with_capacity(5);
        for value in self.xsio_offsets() {
            if !allowed.contains(&value) {
                allowed.push(value);
            }
        }
        allowed
    }

    pub fn is_xsio_allowed(&self, value: XsioValue) -> bool {
        self.xsio_offsets().contains(&value)
    }

    /// Rotation pair for filesystem capture, selected once per family.
    pub fn rotate_config(&self) -> (u32, u32) {
        self.family.rotate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_xsio_is_sized_to_populated_offsets() {
        // Five offsets, four distinct values on the default catalog. The
        // allowed set must cover exactly the distinct populated values and
        // never index past the offset array.
        let platform = PlatformInfo::default();
        let allowed = platform.allowed_xsio();
        assert_eq!(allowed.len(), 4);
        for value in [
            XsioValue::UsbAcm,
            XsioValue::UsbGeneric,
            XsioValue::Coredump,
            XsioValue::Hsi,
        ] {
            assert!(platform.is_xsio_allowed(value));
        }
    }

    #[test]
    fn allowed_xsio_shrinks_with_the_catalog() {
        let platform = PlatformInfo {
            offline_hsi_xsio: XsioValue::UsbGeneric,
            ..PlatformInfo::default()
        };
        let allowed = platform.allowed_xsio();
        assert_eq!(allowed.len(), 3);
        assert!(!platform.is_xsio_allowed(XsioValue::Hsi));
    }

    #[test]
    fn rotate_config_per_family() {
        assert_eq!(PlatformFamily::Lexington.rotate_config(), (25000, 6));
        assert_eq!(PlatformFamily::Clovertrail.rotate_config(), (200000, 3));
        assert_eq!(PlatformFamily::Medfield.rotate_config(), (200000, 3));
    }
}
