//! Status polling controller.
//!
//! The phase lives in [`AppState`](super::state::AppState) and only the reducer
//! moves it. [`poll_effects`] turns a phase change into timer and fetch effects
//! for the runtime to carry out.

use std::fmt;

use super::effects::{Effect, Request};

/// Identity of one polling session, from its first fetch until it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollCycle(pub u64);

impl fmt::Display for PollCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    #[default]
    Idle,
    /// `in_flight` is true while a status fetch is outstanding; otherwise the
    /// timer is armed for the next tick.
    Polling { cycle: PollCycle, in_flight: bool },
    /// Stopped while a fetch was outstanding; its response will be dropped.
    Stopping { stale: PollCycle },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollController {
    phase: PollPhase,
    next_cycle: u64,
}

impl PollController {
    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, PollPhase::Idle)
    }

    pub fn is_polling(&self) -> bool {
        matches!(self.phase, PollPhase::Polling { .. })
    }

    pub fn is_fetching(&self) -> bool {
        matches!(
            self.phase,
            PollPhase::Polling {
                in_flight: true,
                ..
            }
        )
    }

    pub fn current_cycle(&self) -> Option<PollCycle> {
        match self.phase {
            PollPhase::Polling { cycle, .. } => Some(cycle),
            PollPhase::Idle | PollPhase::Stopping { .. } => None,
        }
    }

    /// Number of polling cycles opened so far.
    pub fn cycles_started(&self) -> u64 {
        self.next_cycle
    }

    /// Whether a response for `cycle` may be applied to state.
    pub fn accepts(&self, cycle: PollCycle) -> bool {
        matches!(
            self.phase,
            PollPhase::Polling { cycle: current, in_flight: true } if current == cycle
        )
    }

    /// Explicit status fetch request. Starts a cycle when idle, supersedes a
    /// stopping one, fetches early when the timer is armed, and waits when a
    /// fetch is already outstanding.
    pub fn request_fetch(self) -> Self {
        match self.phase {
            PollPhase::Idle | PollPhase::Stopping { .. } => self.open_cycle(),
            PollPhase::Polling {
                cycle,
                in_flight: false,
            } => Self {
                phase: PollPhase::Polling {
                    cycle,
                    in_flight: true,
                },
                ..self
            },
            PollPhase::Polling {
                in_flight: true, ..
            } => self,
        }
    }

    pub fn tick(self, cycle: PollCycle) -> Self {
        match self.phase {
            PollPhase::Polling {
                cycle: current,
                in_flight: false,
            } if current == cycle => Self {
                phase: PollPhase::Polling {
                    cycle,
                    in_flight: true,
                },
                ..self
            },
            _ => self,
        }
    }

    /// A fetch for `cycle` resolved. `done` ends the cycle; otherwise the
    /// controller waits for the next tick.
    pub fn complete(self, cycle: PollCycle, done: bool) -> Self {
        match self.phase {
            PollPhase::Polling {
                cycle: current,
                in_flight: true,
            } if current == cycle => {
                let phase = if done {
                    PollPhase::Idle
                } else {
                    PollPhase::Polling {
                        cycle,
                        in_flight: false,
                    }
                };
                Self { phase, ..self }
            }
            PollPhase::Stopping { stale } if stale == cycle => Self {
                phase: PollPhase::Idle,
                ..self
            },
            _ => self,
        }
    }

    pub fn stop(self) -> Self {
        let phase = match self.phase {
            PollPhase::Polling {
                cycle,
                in_flight: true,
            } => PollPhase::Stopping { stale: cycle },
            PollPhase::Polling {
                in_flight: false, ..
            } => PollPhase::Idle,
            other => other,
        };
        Self { phase, ..self }
    }

    fn open_cycle(self) -> Self {
        let cycle = PollCycle(self.next_cycle);
        Self {
            phase: PollPhase::Polling {
                cycle,
                in_flight: true,
            },
            next_cycle: self.next_cycle.wrapping_add(1),
        }
    }
}

/// Effects needed to move the runtime from `prev` to `next`.
pub fn poll_effects(prev: &PollController, next: &PollController) -> Vec<Effect> {
    use PollPhase::{Idle, Polling, Stopping};

    match (prev.phase, next.phase) {
        (a, b) if a == b => Vec::new(),
        (
            Stopping { .. },
            Polling {
                cycle,
                in_flight: true,
            },
        ) => vec![
            Effect::AbortStatusFetch,
            Effect::Request(Request::SystemStatus { cycle }),
        ],
        (
            Polling {
                in_flight: false, ..
            },
            Polling {
                cycle,
                in_flight: true,
            },
        ) => vec![
            Effect::CancelPollTimer,
            Effect::Request(Request::SystemStatus { cycle }),
        ],
        (
            _,
            Polling {
                cycle,
                in_flight: true,
            },
        ) => vec![Effect::Request(Request::SystemStatus { cycle })],
        (
            _,
            Polling {
                cycle,
                in_flight: false,
            },
        ) => vec![Effect::ArmPollTimer { cycle }],
        (
            Polling {
                in_flight: false, ..
            },
            Idle,
        )
        | (
            Polling {
                in_flight: true, ..
            },
            Stopping { .. },
        ) => vec![Effect::CancelPollTimer],
        _ => Vec::new(),
    }
}
