use std::sync::Arc;

use serde::Serialize;
use shared::{domain::PumpCommand, error::FetchError};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    animation::{displayed_command, project_with_policy, AnimationDirective},
    config::UpdatePolicy,
    error::ErrorInfo,
    transport::SignalTransport,
    ClientEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpPhase {
    Idle,
    Pending,
    /// Idle, but the last request failed.
    Error,
}

/// Local view of the remote pump.
///
/// `confirmed` is only written by a successful acknowledgment of the latest
/// issued request. `None` means no acknowledgment has been seen since
/// startup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpState {
    pub requested: PumpCommand,
    pub confirmed: Option<PumpCommand>,
    pub in_flight: bool,
    pub last_error: Option<ErrorInfo>,
    pub(crate) latest_seq: u64,
}

impl Default for PumpState {
    fn default() -> Self {
        Self {
            requested: PumpCommand::Off,
            confirmed: None,
            in_flight: false,
            last_error: None,
            latest_seq: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalTicket {
    pub seq: u64,
    pub command: PumpCommand,
    pub previous_confirmed: Option<PumpCommand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Confirmed {
        seq: u64,
        command: PumpCommand,
    },
    RolledBack {
        seq: u64,
        restored: Option<PumpCommand>,
        error: FetchError,
    },
    /// A newer request was issued before this one resolved; its result was
    /// discarded.
    Superseded {
        seq: u64,
        latest: u64,
    },
}

impl PumpState {
    pub fn phase(&self) -> PumpPhase {
        if self.in_flight {
            PumpPhase::Pending
        } else if self.last_error.is_some() {
            PumpPhase::Error
        } else {
            PumpPhase::Idle
        }
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    /// Output literal shown next to the toggle.
    pub fn output(&self) -> &'static str {
        self.requested.as_wire()
    }

    pub fn begin(&mut self, command: PumpCommand) -> SignalTicket {
        self.latest_seq += 1;
        self.requested = command;
        self.in_flight = true;
        SignalTicket {
            seq: self.latest_seq,
            command,
            previous_confirmed: self.confirmed,
        }
    }

    pub fn resolve(
        &mut self,
        ticket: SignalTicket,
        result: Result<(), FetchError>,
    ) -> SignalOutcome {
        if ticket.seq != self.latest_seq {
            return SignalOutcome::Superseded {
                seq: ticket.seq,
                latest: self.latest_seq,
            };
        }

        self.in_flight = false;
        match result {
            Ok(()) => {
                self.confirmed = Some(ticket.command);
                self.last_error = None;
                SignalOutcome::Confirmed {
                    seq: ticket.seq,
                    command: ticket.command,
                }
            }
            Err(error) => {
                self.confirmed = ticket.previous_confirmed;
                self.requested = ticket.previous_confirmed.unwrap_or(PumpCommand::Off);
                self.last_error = Some(ErrorInfo::new(ticket.seq, error.clone()));
                SignalOutcome::RolledBack {
                    seq: ticket.seq,
                    restored: ticket.previous_confirmed,
                    error,
                }
            }
        }
    }
}

/// Owns the pump state and drives the signal endpoint.
///
/// Every request carries a sequence number; only the latest issued request
/// may change the state when it resolves, so a slow response can never
/// overwrite a newer confirmation.
pub struct PumpController {
    signal: Arc<dyn SignalTransport>,
    policy: UpdatePolicy,
    state: Mutex<PumpState>,
    events: broadcast::Sender<ClientEvent>,
}

impl PumpController {
    pub fn new(
        signal: Arc<dyn SignalTransport>,
        policy: UpdatePolicy,
        events: broadcast::Sender<ClientEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            signal,
            policy,
            state: Mutex::new(PumpState::default()),
            events,
        })
    }

    pub fn policy(&self) -> UpdatePolicy {
        self.policy
    }

    pub async fn snapshot(&self) -> PumpState {
        self.state.lock().await.clone()
    }

    pub async fn animation(&self) -> AnimationDirective {
        project_with_policy(&*self.state.lock().await, self.policy)
    }

    /// Issues `command` and returns immediately; the handle resolves once the
    /// actuator answers.
    pub async fn set_state(self: &Arc<Self>, command: PumpCommand) -> JoinHandle<SignalOutcome> {
        let ticket = self.issue(|_| command).await;
        self.spawn_dispatch(ticket)
    }

    /// Issues the opposite of what is currently displayed.
    pub async fn toggle(self: &Arc<Self>) -> JoinHandle<SignalOutcome> {
        let policy = self.policy;
        let ticket = self
            .issue(|state| match displayed_command(state, policy) {
                Some(PumpCommand::On) => PumpCommand::Off,
                _ => PumpCommand::On,
            })
            .await;
        self.spawn_dispatch(ticket)
    }

    /// Issues `command` and waits for the actuator in the current task.
    pub async fn set_state_and_wait(&self, command: PumpCommand) -> SignalOutcome {
        let ticket = self.issue(|_| command).await;
        self.dispatch(ticket).await
    }

    async fn issue(&self, choose: impl FnOnce(&PumpState) -> PumpCommand) -> SignalTicket {
        let mut state = self.state.lock().await;
        let command = choose(&state);
        let ticket = state.begin(command);
        self.publish(&state);
        info!(seq = ticket.seq, %command, "pump: signal issued");
        ticket
    }

    fn spawn_dispatch(self: &Arc<Self>, ticket: SignalTicket) -> JoinHandle<SignalOutcome> {
        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.dispatch(ticket).await })
    }

    async fn dispatch(&self, ticket: SignalTicket) -> SignalOutcome {
        let result = self.signal.send_signal(ticket.command).await;

        let mut state = self.state.lock().await;
        let outcome = state.resolve(ticket, result);
        log_outcome(&ticket, &outcome);
        if !matches!(outcome, SignalOutcome::Superseded { .. }) {
            self.publish(&state);
        }
        outcome
    }

    fn publish(&self, state: &PumpState) {
        let _ = self.events.send(ClientEvent::PumpStateChanged {
            state: state.clone(),
            animation: project_with_policy(state, self.policy),
        });
    }
}

fn log_outcome(ticket: &SignalTicket, outcome: &SignalOutcome) {
    match outcome {
        SignalOutcome::Confirmed { seq, command } => {
            info!(seq = *seq, %command, "pump: signal confirmed");
        }
        SignalOutcome::RolledBack {
            seq,
            restored,
            error,
        } => {
            warn!(
                seq = *seq,
                command = %ticket.command,
                restored = ?restored,
                %error,
                "pump: signal failed, rolled back"
            );
        }
        SignalOutcome::Superseded { seq, latest } => {
            debug!(
                seq = *seq,
                latest = *latest,
                "pump: discarding superseded response"
            );
        }
    }
}

#[cfg(test)]
#[path = "tests/pump_controller_tests.rs"]
mod tests;
