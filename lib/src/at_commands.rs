//! The fixed AT command literals spoken to the modem. Everything here is
//! transmitted verbatim, `\r\n` included; the strings are part of the wire
//! contract with the modem firmware and must not be reformatted.

use crate::modem_config::{TraceLevel, XsioValue};

pub const XSIO_QUERY: &str = "AT+XSIO?\r\n";
pub const XSYSTRACE_QUERY: &str = "AT+XSYSTRACE=10\r\n";
pub const OCT_QUERY: &str = "AT+XSYSTRACE=11\r\n";
pub const XMUX_QUERY: &str = "AT+XMUX?\r\n";

pub const XMUX_ENABLE: &str = "AT+XMUX=1,3,-1\r\n";
pub const XMUX_DISABLE: &str = "AT+XMUX=1,1,0\r\n";

pub const XL1SET_ENABLE: &str = "AT+XL1SET=\"L6L7L8L9\"\r\n";
pub const XL1SET_DISABLE: &str = "AT+XL1SET=\"\"\r\n";

/// Core dump trigger. The modem dumps and resets without replying.
pub const COREDUMP: &str = "AT+XLOG=4\r\n";

/// Full modem reset, also with no useful reply before the link drops.
pub const MODEM_RESET: &str = "AT+CFUN=15\r\n";

pub fn xsio_set(value: XsioValue) -> String {
    format!("AT+XSIO={}\r\n", u8::from(value))
}

/// The four `AT+TRACE` presets, one per trace level.
pub fn trace_preset(level: TraceLevel) -> &'static str {
    match level {
        TraceLevel::None => "AT+TRACE=0\r\n",
        TraceLevel::Baseband => {
            "AT+TRACE=1,115200,\"st=1,pr=1,bt=1,ap=0,db=1,lt=0,li=0,ga=0,ae=0\"\r\n"
        }
        TraceLevel::Baseband3G => {
            "AT+TRACE=1,115200,\"st=1,pr=1,bt=1,ap=0,db=1,lt=0,li=1,ga=0,ae=0\"\r\n"
        }
        TraceLevel::Baseband3GDigrf => {
            "AT+TRACE=1,115200,\"st=1,pr=1,bt=1,ap=0,db=1,lt=1,li=1,ga=0,ae=0\"\r\n"
        }
    }
}

/// The `AT+XSYSTRACE` masterlist preset for a trace level. The coredump
/// variants route the OCT output to the dump collector (`oct=0`) instead of
/// the trace port (`oct=4`).
pub fn xsystrace_preset(level: TraceLevel, coredump: bool) -> &'static str {
    match (level, coredump) {
        (TraceLevel::None, _) => "AT+XSYSTRACE=0\r\n",
        (TraceLevel::Baseband, false) => {
            "AT+XSYSTRACE=0,\"bb_sw=1\",\"bb_sw=oct:4\",\"oct=4\"\r\n"
        }
        (TraceLevel::Baseband, true) => {
            "AT+XSYSTRACE=0,\"bb_sw=1\",\"bb_sw=oct:4\",\"oct=0\"\r\n"
        }
        (TraceLevel::Baseband3G, false) => {
            "AT+XSYSTRACE=0,\"bb_sw=1;3g_sw=1\",\"bb_sw=oct:4;3g_sw=oct:4\",\"oct=4\"\r\n"
        }
        (TraceLevel::Baseband3G, true) => {
            "AT+XSYSTRACE=0,\"bb_sw=1;3g_sw=1\",\"bb_sw=oct:4;3g_sw=oct:4\",\"oct=0\"\r\n"
        }
        (TraceLevel::Baseband3GDigrf, false) => {
            "AT+XSYSTRACE=0,\"bb_sw=1;3g_sw=1;digrf=1\",\"bb_sw=oct:4;3g_sw=oct:4\",\"oct=4\"\r\n"
        }
        (TraceLevel::Baseband3GDigrf, true) => {
            "AT+XSYSTRACE=0,\"bb_sw=1;3g_sw=1;digrf=1\",\"bb_sw=oct:4;3g_sw=oct:4\",\"oct=0\"\r\n"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_is_crlf_terminated() {
        let mut commands = vec![
            XSIO_QUERY.to_string(),
            XSYSTRACE_QUERY.to_string(),
            OCT_QUERY.to_string(),
            XMUX_QUERY.to_string(),
            XMUX_ENABLE.to_string(),
            XMUX_DISABLE.to_string(),
            XL1SET_ENABLE.to_string(),
            XL1SET_DISABLE.to_string(),
            COREDUMP.to_string(),
            MODEM_RESET.to_string(),
            xsio_set(XsioValue::Hsi),
        ];
        for level in [
            TraceLevel::None,
            TraceLevel::Baseband,
            TraceLevel::Baseband3G,
            TraceLevel::Baseband3GDigrf,
        ] {
            commands.push(trace_preset(level).to_string());
            commands.push(xsystrace_preset(level, false).to_string());
            commands.push(xsystrace_preset(level, true).to_string());
        }
        for command in commands {
            assert!(command.ends_with("\r\n"), "{command:?}");
        }
    }

    #[test]
    fn xsio_set_uses_raw_value() {
        assert_eq!(xsio_set(XsioValue::UsbAcm), "AT+XSIO=0\r\n");
        assert_eq!(xsio_set(XsioValue::Hsi), "AT+XSIO=4\r\n");
    }
}
