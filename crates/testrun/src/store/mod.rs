//! Event-driven state container for the Testrun client.
//!
//! Intents flow through [`reduce`] on a single task owned by [`Store`]; effects
//! run on spawned tasks and report back as further intents. Readers get
//! snapshots and use [`selectors`] to project them.

pub mod effects;
pub mod intent;
pub mod poll;
pub mod reducer;
pub mod runtime;
pub mod selectors;
pub mod state;
pub mod timer;

pub use effects::{Effect, Request};
pub use intent::{FailureKind, FetchFailure, Intent, Resource};
pub use poll::{PollController, PollCycle, PollPhase};
pub use reducer::reduce;
pub use runtime::{Store, StoreClosed, StoreHandle, StoreSettings};
pub use state::{AppState, InterfacesValidation, SettingMissedError, UiFlags};
pub use timer::{Timer, TimerCallback, TimerHandle, TokioTimer};
