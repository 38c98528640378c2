//! Stateless extraction of typed values from raw AT command responses.
//!
//! The modem's response grammar is not formally specified, so these parsers
//! deliberately use permissive substring matching against known response
//! fragments rather than strict tokenizing. The substring literals must stay
//! exactly as they are to remain compatible with real firmware output.
//! A parse miss degrades to a documented sentinel value, never an error.

use serde::Serialize;

use crate::modem_config::{TraceLevel, XsioValue};

/// The modem reports XSIO as `"<active>, *<requested>"`: the routing in
/// effect now, and the routing that will be in effect after the next reboot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum XsioTransition {
    Xsio00,
    Xsio01,
    Xsio02,
    Xsio04,
    Xsio10,
    Xsio11,
    Xsio12,
    Xsio14,
    Xsio20,
    Xsio22,
    Xsio24,
    Xsio40,
    Xsio42,
    Xsio44,
}

/// Whether the requested XSIO value has taken effect. `Ok<d>` means value `d`
/// is requested and active, `Ko<d>` means `d` is requested but a reboot is
/// still needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RebootClass {
    Ok0,
    Ko0,
    Ok1,
    Ko1,
    Ok2,
    Ko2,
    Ok4,
    Ko4,
}

impl RebootClass {
    pub fn requested(self) -> XsioValue {
        match self {
            RebootClass::Ok0 | RebootClass::Ko0 => XsioValue::UsbAcm,
            RebootClass::Ok1 | RebootClass::Ko1 => XsioValue::UsbGeneric,
            RebootClass::Ok2 | RebootClass::Ko2 => XsioValue::Coredump,
            RebootClass::Ok4 | RebootClass::Ko4 => XsioValue::Hsi,
        }
    }

    /// True once the requested routing is active (no reboot pending).
    pub fn is_applied(self) -> bool {
        matches!(
            self,
            RebootClass::Ok0 | RebootClass::Ok1 | RebootClass::Ok2 | RebootClass::Ok4
        )
    }
}

impl XsioTransition {
    pub fn active(self) -> XsioValue {
        match self {
            XsioTransition::Xsio00
            | XsioTransition::Xsio01
            | XsioTransition::Xsio02
            | XsioTransition::Xsio04 => XsioValue::UsbAcm,
            XsioTransition::Xsio10
            | XsioTransition::Xsio11
            | XsioTransition::Xsio12
            | XsioTransition::Xsio14 => XsioValue::UsbGeneric,
            XsioTransition::Xsio20 | XsioTransition::Xsio22 | XsioTransition::Xsio24 => {
                XsioValue::Coredump
            }
            XsioTransition::Xsio40 | XsioTransition::Xsio42 | XsioTransition::Xsio44 => {
                XsioValue::Hsi
            }
        }
    }

    pub fn requested(self) -> XsioValue {
        self.reboot_class().requested()
    }

    /// Total mapping of each transition onto its reboot classification.
    pub fn reboot_class(self) -> RebootClass {
        match self {
            XsioTransition::Xsio00 => RebootClass::Ok0,
            XsioTransition::Xsio10 | XsioTransition::Xsio20 | XsioTransition::Xsio40 => {
                RebootClass::Ko0
            }
            XsioTransition::Xsio11 => RebootClass::Ok1,
            XsioTransition::Xsio01 => RebootClass::Ko1,
            XsioTransition::Xsio22 => RebootClass::Ok2,
            XsioTransition::Xsio02 | XsioTransition::Xsio12 | XsioTransition::Xsio42 => {
                RebootClass::Ko2
            }
            XsioTransition::Xsio44 => RebootClass::Ok4,
            XsioTransition::Xsio04 | XsioTransition::Xsio14 | XsioTransition::Xsio24 => {
                RebootClass::Ko4
            }
        }
    }
}

/// State of an init-managed service, as read back from the property store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceStatus {
    Running,
    Stopped,
    Unknown,
}

/// Opaque OCT mode indicator from the `AT+XSYSTRACE=11` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OctMode {
    Unknown,
    Mode(u8),
}

/// `"0, *0"` is the parse-miss default; the other thirteen transitions each
/// have a concrete pattern.
const XSIO_PATTERNS: [(&str, XsioTransition); 13] = [
    ("0, *1", XsioTransition::Xsio01),
    ("0, *2", XsioTransition::Xsio02),
    ("0, *4", XsioTransition::Xsio04),
    ("1, *0", XsioTransition::Xsio10),
    ("1, *1", XsioTransition::Xsio11),
    ("1, *2", XsioTransition::Xsio12),
    ("1, *4", XsioTransition::Xsio14),
    ("2, *0", XsioTransition::Xsio20),
    ("2, *2", XsioTransition::Xsio22),
    ("2, *4", XsioTransition::Xsio24),
    ("4, *0", XsioTransition::Xsio40),
    ("4, *2", XsioTransition::Xsio42),
    ("4, *4", XsioTransition::Xsio44),
];

/// Extract the XSIO transition from an `AT+XSIO?` response. Unmatched input
/// defaults to `Xsio00`.
pub fn parse_xsio(raw: &str) -> XsioTransition {
    for (pattern, transition) in XSIO_PATTERNS {
        if raw.contains(pattern) {
            return transition;
        }
    }
    XsioTransition::Xsio00
}

/// Extract the active trace level from an `AT+XSYSTRACE=10` response.
///
/// The subsystem fragments are checked richest-first; a masterlist with
/// `bb_sw` and `3g_sw` active but not `digrf` is `Baseband3G`, not
/// `Baseband`.
pub fn parse_trace_level(raw: &str) -> TraceLevel {
    if raw.contains("digrf: Oct") {
        TraceLevel::Baseband3GDigrf
    } else if raw.contains("3g_sw: Oct") {
        TraceLevel::Baseband3G
    } else if raw.contains("bb_sw: Oct") {
        TraceLevel::Baseband
    } else {
        TraceLevel::None
    }
}

/// True iff the MUX trace is enabled, read from an `AT+XMUX?` response.
pub fn parse_mux_state(raw: &str) -> bool {
    raw.contains("1,3,-1")
}

/// Classify an `init.svc.*` property value. Anything unrecognized is
/// `Unknown` so a misbehaving init never wedges the caller.
pub fn parse_service_status(raw: &str) -> ServiceStatus {
    if raw.contains("running") {
        ServiceStatus::Running
    } else if raw.contains("stopped") {
        ServiceStatus::Stopped
    } else {
        ServiceStatus::Unknown
    }
}

/// Extract the OCT mode digit from an `AT+XSYSTRACE=11` response.
pub fn parse_oct_mode(raw: &str) -> OctMode {
    if let Some(index) = raw.find("oct=") {
        if let Some(digit) = raw[index + 4..].chars().next().and_then(|c| c.to_digit(10)) {
            return OctMode::Mode(digit as u8);
        }
    }
    OctMode::Unknown
}

/// Extract the quoted trace profile name, e.g. from
/// `profile: "bplog_hsi"`. `None` when no profile is reported.
pub fn parse_profile_name(raw: &str) -> Option<String> {
    let after = &raw[raw.find("profile:")? + "profile:".len()..];
    let start = after.find('"')? + 1;
    let end = after[start..].find('"')? + start;
    Some(after[start..end].to_string())
}
