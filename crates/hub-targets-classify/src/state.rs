use log::info;
use serde::{Deserialize, Serialize};

use crate::{LockPolicy, ProfileError};

/// Lock state reported to the operator and the shooter.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetingState {
    #[default]
    Searching,
    Acquiring,
    Locked,
}

impl TargetingState {
    /// Numeric code published to telemetry.
    pub fn code(self) -> u8 {
        match self {
            TargetingState::Searching => 0,
            TargetingState::Acquiring => 1,
            TargetingState::Locked => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetingState::Searching => "SEARCHING",
            TargetingState::Acquiring => "ACQUIRING",
            TargetingState::Locked => "LOCKED",
        }
    }
}

/// Transition for one frame.
///
/// `streak` counts consecutive successful frames *including* this one and is
/// ignored on failure.
pub fn next_state(
    current: TargetingState,
    succeeded: bool,
    streak: u32,
    policy: &LockPolicy,
) -> TargetingState {
    if !succeeded {
        return TargetingState::Searching;
    }
    match current {
        TargetingState::Searching => TargetingState::Acquiring,
        TargetingState::Acquiring if streak >= policy.frames_to_lock => TargetingState::Locked,
        TargetingState::Acquiring => TargetingState::Acquiring,
        TargetingState::Locked => TargetingState::Locked,
    }
}

/// Owns the targeting state and the consecutive-success streak.
#[derive(Clone, Debug)]
pub struct TargetLock {
    policy: LockPolicy,
    state: TargetingState,
    streak: u32,
}

impl TargetLock {
    pub fn new(policy: LockPolicy) -> Result<Self, ProfileError> {
        policy.validate()?;
        Ok(Self {
            policy,
            state: TargetingState::Searching,
            streak: 0,
        })
    }

    pub fn state(&self) -> TargetingState {
        self.state
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn policy(&self) -> &LockPolicy {
        &self.policy
    }

    /// Record one frame's classification result and return the new state.
    pub fn update(&mut self, succeeded: bool) -> TargetingState {
        self.streak = if succeeded {
            self.streak.saturating_add(1)
        } else {
            0
        };
        let next = next_state(self.state, succeeded, self.streak, &self.policy);
        if next != self.state {
            info!(
                "targeting {} -> {} (streak {})",
                self.state.as_str(),
                next.as_str(),
                self.streak
            );
        }
        self.state = next;
        next
    }
}
