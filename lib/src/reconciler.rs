//! The configuration reconciliation state machine: folds raw modem signals
//! into a model of the currently active configuration, and turns a desired
//! configuration into the ordered action plan that realizes it.
//!
//! Everything in here is pure bookkeeping over a current/desired
//! configuration pair; executing a plan against the device is the
//! controller's job and is deliberately not modeled as a state here.

use serde::Serialize;
use thiserror::Error;

use crate::modem_config::{
    self, CustomConfig, OfflineLogging, PredefinedConfig, TraceFileSize, TraceLocation, TraceLevel,
    XsioValue,
};
use crate::mts::{LoggingService, LoggingServiceSelector, ServiceProperties};
use crate::platform::PlatformInfo;
use crate::response_parser::XsioTransition;

/// One read cycle's worth of raw observations, already parsed into typed
/// values by the response parsers and the property probes.
#[derive(Debug, Clone)]
pub struct ObservedSignals {
    /// Which capture service is live (`Disabled` if none).
    pub service: LoggingService,
    pub trace_level: TraceLevel,
    pub xsio: XsioTransition,
    pub mux_trace: bool,
    /// `AT+XL1SET` has no query form; this is the last value known to have
    /// been applied.
    pub additional_traces: bool,
    /// Current value of the mts input property, used to tell HSI from USB
    /// offline routing.
    pub mts_input: Option<String>,
}

/// A single step of an apply sequence, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ApplyAction {
    StopCurrentService,
    SetXsio(XsioValue),
    SetTraceLevel { level: TraceLevel, coredump: bool },
    SetMuxTrace(bool),
    SetAdditionalTraces(bool),
    EnableService(LoggingService),
}

impl ApplyAction {
    pub fn describe(&self) -> &'static str {
        match self {
            ApplyAction::StopCurrentService => "stop logging services",
            ApplyAction::SetXsio(_) => "set XSIO routing",
            ApplyAction::SetTraceLevel { .. } => "set trace level",
            ApplyAction::SetMuxTrace(_) => "set MUX trace",
            ApplyAction::SetAdditionalTraces(_) => "set additional traces",
            ApplyAction::EnableService(_) => "enable logging service",
        }
    }
}

/// Everything needed to transition the device to a desired configuration.
#[derive(Debug, Clone)]
pub struct ApplyPlan {
    pub xsio: XsioValue,
    pub trace_level: TraceLevel,
    /// Selects the coredump variants of the trace-level AT presets.
    pub is_coredump: bool,
    pub service: LoggingService,
    pub offline: OfflineLogging,
    pub properties: ServiceProperties,
    pub actions: Vec<ApplyAction>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("configuration {0:?} cannot be applied")]
    UnsupportedConfig(PredefinedConfig),
    #[error("XSIO value {0:?} is not configured on this platform")]
    XsioNotAllowed(XsioValue),
}

/// Holds the current-vs-desired configuration pair for one modem.
///
/// `current` is only ever rebuilt by [`observe`](Self::observe);
/// `desired` only by [`set_desired`](Self::set_desired). The very first
/// observation seeds `desired` from `current` so that nothing reports a
/// pending change the user never asked for.
pub struct ModemConfigReconciler {
    platform: PlatformInfo,
    current: PredefinedConfig,
    current_custom: CustomConfig,
    desired: PredefinedConfig,
    desired_custom: CustomConfig,
    first_read_done: bool,
}

impl ModemConfigReconciler {
    pub fn new(platform: PlatformInfo) -> Self {
        ModemConfigReconciler {
            platform,
            current: PredefinedConfig::Unknown,
            current_custom: CustomConfig::default(),
            desired: PredefinedConfig::Unknown,
            desired_custom: CustomConfig::default(),
            first_read_done: false,
        }
    }

    pub fn current(&self) -> (PredefinedConfig, CustomConfig) {
        (self.current, self.current_custom)
    }

    pub fn desired(&self) -> (PredefinedConfig, CustomConfig) {
        (self.desired, self.desired_custom)
    }

    /// Fold one cycle of observations into the current-state model and
    /// classify it against the predefined table. Returns the detailed and
    /// the classified view of what the modem is doing right now.
    pub fn observe(&mut self, signals: &ObservedSignals) -> (CustomConfig, PredefinedConfig) {
        let custom = self.derive_custom(signals);
        let classified = modem_config::classify(
            signals.xsio.requested(),
            signals.trace_level,
            signals.service,
            &self.platform,
        );
        self.current = classified;
        self.current_custom = custom;
        if !self.first_read_done {
            self.desired = classified;
            self.desired_custom = custom;
            self.first_read_done = true;
        }
        (custom, classified)
    }

    fn derive_custom(&self, signals: &ObservedSignals) -> CustomConfig {
        let flags = self.platform.flags;
        let requested = signals.xsio.requested();
        let location = if signals.service != LoggingService::Disabled {
            signals.service.location()
        } else if signals.trace_level.is_enabled()
            && (requested == self.platform.coredump_xsio
                || (requested == XsioValue::UsbAcm && flags.usb_acm_enabled))
        {
            TraceLocation::Coredump
        } else {
            TraceLocation::None
        };
        let filesystem_backed = matches!(location, TraceLocation::Emmc | TraceLocation::Sdcard);
        let file_size = if filesystem_backed {
            signals.service.file_size()
        } else {
            TraceFileSize::None
        };
        let offline = if !filesystem_backed {
            OfflineLogging::None
        } else if requested == self.platform.offline_hsi_xsio
            && signals.mts_input.as_deref() == Some(self.platform.hsi_log_tty.as_str())
        {
            OfflineLogging::Hsi
        } else {
            OfflineLogging::Usb
        };
        CustomConfig {
            location,
            level: signals.trace_level,
            file_size,
            offline,
            mux_trace: signals.mux_trace,
            additional_traces: signals.additional_traces,
        }
    }

    /// Record the user's choice. `Unknown` is rejected before any AT
    /// command is ever issued for it.
    pub fn set_desired(
        &mut self,
        config: PredefinedConfig,
        custom: CustomConfig,
    ) -> Result<(), PlanError> {
        if config == PredefinedConfig::Unknown {
            return Err(PlanError::UnsupportedConfig(config));
        }
        self.desired = config;
        self.desired_custom = custom;
        Ok(())
    }

    /// Compute the plan realizing the desired configuration. Pure; the
    /// selector is only consulted for its constant property tables.
    pub fn plan_apply(&self, selector: &LoggingServiceSelector) -> Result<ApplyPlan, PlanError> {
        plan_for(self.desired, &self.desired_custom, &self.platform, selector)
    }

    /// Whether moving from the current to the desired configuration needs a
    /// modem reboot / service restart. Pure comparison, callable anytime.
    pub fn reboot_needed(&self) -> bool {
        if self.desired == PredefinedConfig::Custom {
            let (c, d) = (&self.current_custom, &self.desired_custom);
            c.location != d.location
                || c.level != d.level
                || c.file_size != d.file_size
                || c.offline != d.offline
        } else {
            self.desired != self.current
        }
    }
}

/// The apply decision table. For predefined configurations this is the
/// forward table plus the fixed four-step action order; for `Custom` the
/// service follows (location, file size) and the XSIO value follows
/// (location, offline transport).
pub fn plan_for(
    config: PredefinedConfig,
    custom: &CustomConfig,
    platform: &PlatformInfo,
    selector: &LoggingServiceSelector,
) -> Result<ApplyPlan, PlanError> {
    let flags = platform.flags;
    let (xsio, level, service, offline, mux_actions) = match config {
        PredefinedConfig::Custom => {
            let service = match (custom.location, custom.file_size) {
                (TraceLocation::Emmc, TraceFileSize::Small) => LoggingService::FsSmallEmmc,
                (TraceLocation::Emmc, _) => LoggingService::FsLargeEmmc,
                (TraceLocation::Sdcard, TraceFileSize::Small) => LoggingService::FsSmallSdcard,
                (TraceLocation::Sdcard, _) => LoggingService::FsLargeSdcard,
                (TraceLocation::UsbApe, _) => LoggingService::UsbOneshot,
                (TraceLocation::UsbModem, _) => LoggingService::OnlineUsbModem,
                (TraceLocation::PtiModem, _) => LoggingService::PtiOneshot,
                _ => LoggingService::Disabled,
            };
            let xsio = match custom.location {
                TraceLocation::Emmc | TraceLocation::Sdcard => {
                    if custom.offline == OfflineLogging::Usb {
                        platform.offline_usb_xsio
                    } else {
                        platform.offline_hsi_xsio
                    }
                }
                TraceLocation::Coredump => {
                    if flags.usb_acm_enabled {
                        XsioValue::UsbAcm
                    } else {
                        platform.coredump_xsio
                    }
                }
                TraceLocation::PtiModem => platform.online_pti_xsio,
                _ => XsioValue::UsbAcm,
            };
            (xsio, custom.level, service, custom.offline, true)
        }
        PredefinedConfig::Unknown => {
            return Err(PlanError::UnsupportedConfig(config));
        }
        named => {
            let (xsio, level, service) = modem_config::forward(named, platform)
                .ok_or(PlanError::UnsupportedConfig(named))?;
            // Filesystem services still need to know which transport feeds
            // them so the right input tty gets configured.
            let offline = if service.location() == TraceLocation::Emmc {
                if xsio == platform.offline_usb_xsio {
                    OfflineLogging::Usb
                } else {
                    OfflineLogging::Hsi
                }
            } else {
                OfflineLogging::None
            };
            (xsio, level, service, offline, false)
        }
    };

    if !platform.is_xsio_allowed(xsio) {
        return Err(PlanError::XsioNotAllowed(xsio));
    }

    let is_coredump = if config == PredefinedConfig::Custom {
        xsio == XsioValue::UsbAcm && level.is_enabled() && flags.usb_acm_enabled
    } else {
        config == PredefinedConfig::Coredump && flags.usb_acm_enabled
    };

    let mut actions = vec![
        ApplyAction::StopCurrentService,
        ApplyAction::SetXsio(xsio),
        ApplyAction::SetTraceLevel {
            level,
            coredump: is_coredump,
        },
    ];
    if mux_actions {
        actions.push(ApplyAction::SetMuxTrace(custom.mux_trace));
        actions.push(ApplyAction::SetAdditionalTraces(custom.additional_traces));
    }
    actions.push(ApplyAction::EnableService(service));

    Ok(ApplyPlan {
        xsio,
        trace_level: level,
        is_coredump,
        service,
        offline,
        properties: selector.properties_for(service, offline),
        actions,
    })
}
