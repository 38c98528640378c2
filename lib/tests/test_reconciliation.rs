//! Cross-module checks: raw response text in, classified configuration out,
//! for every named configuration and platform flag combination.

use modemtrace::modem_config::{
    CustomConfig, OfflineLogging, PredefinedConfig, TraceLevel, TraceLocation, forward,
};
use modemtrace::mts::{LoggingService, LoggingServiceSelector, MtsError, PropertyStore};
use modemtrace::platform::{PlatformFlags, PlatformInfo};
use modemtrace::reconciler::{ModemConfigReconciler, ObservedSignals, plan_for};
use modemtrace::response_parser::{parse_trace_level, parse_xsio};

use async_trait::async_trait;
use std::sync::Arc;

struct NullStore;

#[async_trait]
impl PropertyStore for NullStore {
    async fn set_property(&self, _key: &str, _value: &str) -> Result<(), MtsError> {
        Ok(())
    }
    async fn get_property(&self, _key: &str) -> Result<Option<String>, MtsError> {
        Ok(None)
    }
    async fn exec(&self, _command: &str) -> Result<(), MtsError> {
        Ok(())
    }
}

const NAMED_CONFIGS: [PredefinedConfig; 6] = [
    PredefinedConfig::Coredump,
    PredefinedConfig::OfflineBpLog,
    PredefinedConfig::OnlineBpLog,
    PredefinedConfig::OfflineUsbBpLog,
    PredefinedConfig::PtiBpLog,
    PredefinedConfig::TraceDisable,
];

/// Synthesize the raw modem responses a device configured as `cfg` would
/// produce, then check that folding them back through the parsers and the
/// reconciler names `cfg` again.
#[test]
fn every_named_config_survives_an_observe_cycle() {
    for acm in [false, true] {
        for usbswitch in [false, true] {
            let platform = PlatformInfo {
                flags: PlatformFlags {
                    usb_acm_enabled: acm,
                    usbswitch_enabled: usbswitch,
                    pti_enabled: true,
                },
                ..PlatformInfo::default()
            };
            for cfg in NAMED_CONFIGS {
                let (xsio, level, service) = forward(cfg, &platform).unwrap();
                let digit = u8::from(xsio);
                let xsio_raw = format!("+XSIO: {digit}, *{digit}\r\n\r\nOK\r\n");
                let trace_raw = match level {
                    TraceLevel::None => "OK\r\n".to_string(),
                    TraceLevel::Baseband => "bb_sw: Oct\r\nOK\r\n".to_string(),
                    TraceLevel::Baseband3G => "bb_sw: Oct\r\n3g_sw: Oct\r\nOK\r\n".to_string(),
                    TraceLevel::Baseband3GDigrf => {
                        "bb_sw: Oct\r\n3g_sw: Oct\r\ndigrf: Oct\r\nOK\r\n".to_string()
                    }
                };
                let signals = ObservedSignals {
                    service,
                    trace_level: parse_trace_level(&trace_raw),
                    xsio: parse_xsio(&xsio_raw),
                    mux_trace: false,
                    additional_traces: false,
                    mts_input: Some(platform.hsi_log_tty.clone()),
                };
                let mut reconciler = ModemConfigReconciler::new(platform.clone());
                let (_, classified) = reconciler.observe(&signals);
                assert_eq!(
                    classified, cfg,
                    "observe cycle failed for {cfg:?} acm={acm} usbswitch={usbswitch}"
                );
                // First observation seeds desired from current.
                assert!(!reconciler.reboot_needed());
            }
        }
    }
}

#[test]
fn observed_offline_bp_log_round_trips_through_planning() {
    let platform = PlatformInfo::default();
    let selector = LoggingServiceSelector::new(Arc::new(NullStore), &platform);
    let signals = ObservedSignals {
        service: LoggingService::FsSmallEmmc,
        trace_level: TraceLevel::Baseband3G,
        xsio: parse_xsio("+XSIO: 4, *4\r\nOK\r\n"),
        mux_trace: false,
        additional_traces: false,
        mts_input: Some(platform.hsi_log_tty.clone()),
    };
    let mut reconciler = ModemConfigReconciler::new(platform.clone());
    let (custom, classified) = reconciler.observe(&signals);
    assert_eq!(classified, PredefinedConfig::OfflineBpLog);
    assert_eq!(custom.offline, OfflineLogging::Hsi);

    // Planning the exact observed state goes back to the same triple.
    let plan = plan_for(classified, &custom, &platform, &selector).unwrap();
    assert_eq!(plan.service, LoggingService::FsSmallEmmc);
    assert_eq!(u8::from(plan.xsio), 4);
    assert_eq!(plan.properties.input, platform.hsi_log_tty);
}

#[test]
fn reboot_needed_tracks_custom_field_changes() {
    let platform = PlatformInfo::default();
    let mut reconciler = ModemConfigReconciler::new(platform.clone());
    let signals = ObservedSignals {
        service: LoggingService::FsLargeSdcard,
        trace_level: TraceLevel::Baseband,
        xsio: parse_xsio("1, *1"),
        mux_trace: true,
        additional_traces: false,
        mts_input: Some(platform.usb_log_tty.clone()),
    };
    reconciler.observe(&signals);

    let (_, observed_custom) = reconciler.current();
    reconciler
        .set_desired(PredefinedConfig::Custom, observed_custom)
        .unwrap();
    assert!(!reconciler.reboot_needed(), "identical custom config");

    let mut changed = observed_custom;
    changed.level = TraceLevel::Baseband3G;
    reconciler
        .set_desired(PredefinedConfig::Custom, changed)
        .unwrap();
    assert!(reconciler.reboot_needed(), "level change requires a reboot");

    // MUX trace is applied live and never forces a reboot on its own.
    let mut mux_only = observed_custom;
    mux_only.mux_trace = !mux_only.mux_trace;
    reconciler
        .set_desired(PredefinedConfig::Custom, mux_only)
        .unwrap();
    assert!(!reconciler.reboot_needed());
}

#[test]
fn custom_none_location_plans_a_full_teardown() {
    let platform = PlatformInfo::default();
    let selector = LoggingServiceSelector::new(Arc::new(NullStore), &platform);
    let custom = CustomConfig {
        location: TraceLocation::None,
        ..CustomConfig::default()
    };
    let plan = plan_for(PredefinedConfig::Custom, &custom, &platform, &selector).unwrap();
    assert_eq!(plan.service, LoggingService::Disabled);
    assert_eq!(u8::from(plan.xsio), 0);
    assert!(!plan.is_coredump);
}
