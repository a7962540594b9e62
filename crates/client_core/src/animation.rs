//! Projection of pump state onto the water-flow animation.
//!
//! The bridge keeps no state of its own: a directive is recomputed from the
//! current [`PumpState`] every time that state changes.

use std::time::Duration;

use serde::Serialize;
use shared::domain::PumpCommand;

use crate::{config::UpdatePolicy, pump_controller::PumpState};

pub const OPACITY_TRANSITION: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnimationDirective {
    /// Loop playback while true, freeze on the current frame otherwise.
    pub playing: bool,
    pub target_opacity: f32,
}

impl AnimationDirective {
    pub const PLAYING: Self = Self {
        playing: true,
        target_opacity: 1.0,
    };
    pub const STOPPED: Self = Self {
        playing: false,
        target_opacity: 0.0,
    };

    pub fn transition(&self) -> Duration {
        OPACITY_TRANSITION
    }
}

/// Confirmation-gated projection: only an acknowledged `On` plays.
pub fn project(state: &PumpState) -> AnimationDirective {
    project_with_policy(state, UpdatePolicy::ConfirmationGated)
}

pub fn project_with_policy(state: &PumpState, policy: UpdatePolicy) -> AnimationDirective {
    match displayed_command(state, policy) {
        Some(PumpCommand::On) => AnimationDirective::PLAYING,
        Some(PumpCommand::Off) | None => AnimationDirective::STOPPED,
    }
}

/// The command the user should currently see. `None` means unknown and is
/// rendered as off.
pub fn displayed_command(state: &PumpState, policy: UpdatePolicy) -> Option<PumpCommand> {
    match policy {
        UpdatePolicy::Optimistic if state.in_flight => Some(state.requested),
        _ => state.confirmed,
    }
}

/// Linear opacity interpolation driven by the rendering loop's frame deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpacityTween {
    from: f32,
    to: f32,
    elapsed: Duration,
}

impl OpacityTween {
    pub fn settled(opacity: f32) -> Self {
        Self {
            from: opacity,
            to: opacity,
            elapsed: OPACITY_TRANSITION,
        }
    }

    /// Starts a new transition from the current sample when the target
    /// changes; a repeated directive leaves the running transition alone.
    pub fn retarget(&mut self, directive: &AnimationDirective) {
        if directive.target_opacity == self.to {
            return;
        }
        self.from = self.sample();
        self.to = directive.target_opacity;
        self.elapsed = Duration::ZERO;
    }

    pub fn advance(&mut self, delta: Duration) {
        self.elapsed = (self.elapsed + delta).min(OPACITY_TRANSITION);
    }

    pub fn sample(&self) -> f32 {
        let progress = self.elapsed.as_secs_f32() / OPACITY_TRANSITION.as_secs_f32();
        self.from + (self.to - self.from) * progress.clamp(0.0, 1.0)
    }

    pub fn is_settled(&self) -> bool {
        self.elapsed >= OPACITY_TRANSITION
    }
}

impl Default for OpacityTween {
    fn default() -> Self {
        Self::settled(AnimationDirective::STOPPED.target_opacity)
    }
}
