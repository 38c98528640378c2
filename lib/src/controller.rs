//! Orchestrates the AT channel, parsers, reconciler and logging-service
//! selector into the operations the caller sees: read current state, apply a
//! configuration, trigger a core dump, restart the modem.
//!
//! One controller owns one modem. `read_current` and `apply` are multi-command
//! exchanges and must not interleave; callers hold the controller exclusively
//! (`&mut self`) for the duration of a whole operation, not per AT command.

use log::{error, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::at_channel::{AtChannel, AtChannelError};
use crate::at_commands;
use crate::modem_config::{CustomConfig, PredefinedConfig};
use crate::mts::{LoggingServiceSelector, MtsError};
use crate::platform::PlatformInfo;
use crate::reconciler::{
    ApplyAction, ApplyPlan, ModemConfigReconciler, ObservedSignals, PlanError,
};
use crate::response_parser::{
    OctMode, parse_mux_state, parse_oct_mode, parse_profile_name, parse_trace_level, parse_xsio,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModemStatus {
    Up,
    Down,
}

#[derive(Error, Debug)]
pub enum ModemError {
    #[error("modem transport error: {0}")]
    Channel(#[from] AtChannelError),
    #[error("modem is not ready")]
    NotReady,
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("logging service control failed: {0}")]
    Service(#[from] MtsError),
    #[error("apply failed at {step:?} with {completed} of {total} steps done: {source}")]
    PartiallyApplied {
        step: &'static str,
        completed: usize,
        total: usize,
        #[source]
        source: Box<ModemError>,
    },
    #[error("operation cancelled after {completed} of {total} steps")]
    Cancelled { completed: usize, total: usize },
}

/// Snapshot returned by [`ModemController::read_current`].
#[derive(Debug, Clone, Serialize)]
pub struct CurrentState {
    pub predefined: PredefinedConfig,
    pub custom: CustomConfig,
    pub reboot_needed: bool,
    pub mux_trace: bool,
    pub oct_mode: OctMode,
    pub profile: Option<String>,
}

pub struct ModemController<T> {
    channel: AtChannel<T>,
    reconciler: ModemConfigReconciler,
    selector: LoggingServiceSelector,
    status: ModemStatus,
    /// `AT+XL1SET` cannot be queried back; remember what we last applied.
    additional_traces: bool,
    cancel: CancellationToken,
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ModemController<T> {
    /// The modem starts out `Down`; the transport owner reports it up once
    /// the control device is usable.
    pub fn new(
        channel: AtChannel<T>,
        selector: LoggingServiceSelector,
        platform: PlatformInfo,
    ) -> Self {
        ModemController {
            channel,
            reconciler: ModemConfigReconciler::new(platform),
            selector,
            status: ModemStatus::Down,
            additional_traces: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn status(&self) -> ModemStatus {
        self.status
    }

    pub fn on_modem_up(&mut self) {
        info!("modem reported up");
        self.status = ModemStatus::Up;
    }

    pub fn on_modem_down(&mut self) {
        warn!("modem reported down");
        self.status = ModemStatus::Down;
    }

    /// Token cancelling any in-flight operation at its next inter-command
    /// checkpoint.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn reboot_needed(&self) -> bool {
        self.reconciler.reboot_needed()
    }

    /// Query the modem and the property store, rebuild the current-state
    /// model and classify it. Nothing is committed until every probe has
    /// answered, so a failed or cancelled read leaves the previous model
    /// untouched.
    pub async fn read_current(&mut self) -> Result<CurrentState, ModemError> {
        self.ensure_ready()?;
        self.check_cancel(0, 4)?;
        let xsio_raw = self.channel.send_and_receive(at_commands::XSIO_QUERY).await?;
        self.check_cancel(1, 4)?;
        let trace_raw = self
            .channel
            .send_and_receive(at_commands::XSYSTRACE_QUERY)
            .await?;
        self.check_cancel(2, 4)?;
        let oct_raw = self.channel.send_and_receive(at_commands::OCT_QUERY).await?;
        self.check_cancel(3, 4)?;
        let mux_raw = self.channel.send_and_receive(at_commands::XMUX_QUERY).await?;

        let service = self.selector.active_service().await?;
        let mts_input = self.selector.current_input().await?;
        let signals = ObservedSignals {
            service,
            trace_level: parse_trace_level(&trace_raw),
            xsio: parse_xsio(&xsio_raw),
            mux_trace: parse_mux_state(&mux_raw),
            additional_traces: self.additional_traces,
            mts_input,
        };
        let (custom, predefined) = self.reconciler.observe(&signals);
        info!("current modem configuration classified as {predefined:?}");
        Ok(CurrentState {
            predefined,
            custom,
            reboot_needed: self.reconciler.reboot_needed(),
            mux_trace: signals.mux_trace,
            oct_mode: parse_oct_mode(&oct_raw),
            profile: parse_profile_name(&oct_raw),
        })
    }

    /// Apply a desired configuration: stop capture, reroute XSIO, set the
    /// trace level, re-enable the target service, in that fixed order.
    ///
    /// Execution stops at the first failure. The current-state model is left
    /// unrefreshed either way; callers re-run [`read_current`] to learn the
    /// post-apply truth rather than assuming success. On any failure or
    /// cancellation with steps already executed, all logging services are
    /// stopped again rather than leaving a partial mix capturing.
    pub async fn apply(
        &mut self,
        config: PredefinedConfig,
        custom: CustomConfig,
    ) -> Result<(), ModemError> {
        self.ensure_ready()?;
        self.reconciler.set_desired(config, custom)?;
        let plan = self.reconciler.plan_apply(&self.selector)?;
        let total = plan.actions.len();
        for (index, action) in plan.actions.iter().enumerate() {
            if self.cancel.is_cancelled() {
                if index > 0 {
                    self.recover_stop_all().await;
                }
                return Err(ModemError::Cancelled {
                    completed: index,
                    total,
                });
            }
            if let Err(err) = self.execute(action, &plan).await {
                error!("apply step {:?} failed: {err}", action.describe());
                self.recover_stop_all().await;
                if index == 0 {
                    return Err(err);
                }
                return Err(ModemError::PartiallyApplied {
                    step: action.describe(),
                    completed: index,
                    total,
                    source: Box::new(err),
                });
            }
        }
        info!("applied configuration {config:?}");
        Ok(())
    }

    /// Trigger a modem core dump. `AT+XLOG=4` produces no reply; the modem
    /// dumps and resets on its own schedule.
    pub async fn generate_coredump(&mut self) -> Result<(), ModemError> {
        self.ensure_ready()?;
        self.channel.send_no_response(at_commands::COREDUMP).await?;
        info!("core dump requested");
        Ok(())
    }

    /// Reset the modem. The link drops, so the modem is marked down until
    /// the transport owner reports it back.
    pub async fn restart_modem(&mut self) -> Result<(), ModemError> {
        self.ensure_ready()?;
        self.channel
            .send_no_response(at_commands::MODEM_RESET)
            .await?;
        self.status = ModemStatus::Down;
        info!("modem reset requested");
        Ok(())
    }

    async fn execute(&mut self, action: &ApplyAction, plan: &ApplyPlan) -> Result<(), ModemError> {
        match action {
            ApplyAction::StopCurrentService => {
                self.selector.stop().await?;
            }
            ApplyAction::SetXsio(value) => {
                self.channel
                    .send_and_receive(&at_commands::xsio_set(*value))
                    .await?;
            }
            ApplyAction::SetTraceLevel { level, coredump } => {
                self.channel
                    .send_and_receive(at_commands::trace_preset(*level))
                    .await?;
                self.channel
                    .send_and_receive(at_commands::xsystrace_preset(*level, *coredump))
                    .await?;
            }
            ApplyAction::SetMuxTrace(enabled) => {
                let command = if *enabled {
                    at_commands::XMUX_ENABLE
                } else {
                    at_commands::XMUX_DISABLE
                };
                self.channel.send_and_receive(command).await?;
            }
            ApplyAction::SetAdditionalTraces(enabled) => {
                let command = if *enabled {
                    at_commands::XL1SET_ENABLE
                } else {
                    at_commands::XL1SET_DISABLE
                };
                self.channel.send_and_receive(command).await?;
                self.additional_traces = *enabled;
            }
            ApplyAction::EnableService(service) => {
                self.selector.enable(*service, &plan.properties).await?;
            }
        }
        Ok(())
    }

    async fn recover_stop_all(&self) {
        if let Err(err) = self.selector.stop().await {
            warn!("failed to stop logging services while recovering: {err}");
        }
    }

    fn ensure_ready(&self) -> Result<(), ModemError> {
        if self.status != ModemStatus::Up {
            return Err(ModemError::NotReady);
        }
        Ok(())
    }

    fn check_cancel(&self, completed: usize, total: usize) -> Result<(), ModemError> {
        if self.cancel.is_cancelled() {
            return Err(ModemError::Cancelled { completed, total });
        }
        Ok(())
    }
}
