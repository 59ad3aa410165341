use std::sync::Arc;
use std::time::Duration;

use testrun_core::config::DEFAULT_POLL_INTERVAL_MS;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::TestrunClient;

use super::effects::{effects_for, perform, Effect, Request};
use super::intent::Intent;
use super::reducer::reduce;
use super::state::AppState;
use super::timer::{Timer, TimerHandle};

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub poll_interval: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("store is shut down")]
pub struct StoreClosed;

/// An intent on its way to the store. `applied` fires once it has been
/// reduced and the resulting state published.
#[derive(Debug)]
struct Envelope {
    intent: Intent,
    applied: Option<oneshot::Sender<()>>,
}

impl From<Intent> for Envelope {
    fn from(intent: Intent) -> Self {
        Self {
            intent,
            applied: None,
        }
    }
}

/// Owns [`AppState`] on a single task and applies intents in arrival order.
pub struct Store {
    client: Arc<dyn TestrunClient>,
    timer: Arc<dyn Timer>,
    settings: StoreSettings,
    intent_tx: mpsc::UnboundedSender<Envelope>,
    state: AppState,
    state_tx: watch::Sender<AppState>,
    poll_timer: Option<TimerHandle>,
    status_fetch: Option<JoinHandle<()>>,
}

impl Store {
    pub fn spawn(
        client: Arc<dyn TestrunClient>,
        timer: Arc<dyn Timer>,
        settings: StoreSettings,
    ) -> (StoreHandle, JoinHandle<()>) {
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(AppState::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let store = Store {
            client,
            timer,
            settings,
            intent_tx: intent_tx.clone(),
            state: AppState::new(),
            state_tx,
            poll_timer: None,
            status_fetch: None,
        };
        let task = tokio::spawn(store.run(intent_rx, shutdown_rx));

        let handle = StoreHandle {
            intent_tx,
            state_rx,
            shutdown_tx: Arc::new(shutdown_tx),
        };
        (handle, task)
    }

    async fn run(
        mut self,
        mut intent_rx: mpsc::UnboundedReceiver<Envelope>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!(
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            "store started"
        );

        loop {
            tokio::select! {
                envelope = intent_rx.recv() => {
                    let Some(Envelope { intent, applied }) = envelope else { break };
                    self.apply(intent);
                    if let Some(applied) = applied {
                        let _ = applied.send(());
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        if let Some(timer) = self.poll_timer.take() {
            timer.cancel();
        }
        if let Some(task) = self.status_fetch.take() {
            task.abort();
        }
        info!("store stopped");
    }

    fn apply(&mut self, intent: Intent) {
        debug!(intent = intent.name(), "dispatch");

        let next = reduce(self.state.clone(), &intent);
        let effects = effects_for(&self.state, &next, &intent);
        if self.state.poll.is_idle() && !next.poll.is_idle() {
            info!(cycle = ?next.poll.current_cycle(), "status polling started");
        } else if !self.state.poll.is_idle() && next.poll.is_idle() {
            info!(status = %next.testrun_status.status, "status polling stopped");
        }
        self.state = next;

        let state = &self.state;
        self.state_tx.send_if_modified(|current| {
            if current == state {
                return false;
            }
            *current = state.clone();
            true
        });

        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Request(request @ Request::SystemStatus { .. }) => {
                self.status_fetch = Some(self.spawn_request(request));
            }
            Effect::Request(request) => {
                self.spawn_request(request);
            }
            Effect::ArmPollTimer { cycle } => {
                let tx = self.intent_tx.clone();
                debug!(%cycle, "arm poll timer");
                let handle = self.timer.schedule(
                    self.settings.poll_interval,
                    Box::new(move || {
                        let _ = tx.send(Intent::PollTick { cycle }.into());
                    }),
                );
                if let Some(previous) = self.poll_timer.replace(handle) {
                    previous.cancel();
                }
            }
            Effect::CancelPollTimer => {
                if let Some(timer) = self.poll_timer.take() {
                    timer.cancel();
                }
            }
            Effect::AbortStatusFetch => {
                if let Some(task) = self.status_fetch.take() {
                    task.abort();
                }
            }
        }
    }

    fn spawn_request(&self, request: Request) -> JoinHandle<()> {
        let client = self.client.clone();
        let tx = self.intent_tx.clone();
        tokio::spawn(async move {
            for intent in perform(client.as_ref(), request).await {
                if tx.send(intent.into()).is_err() {
                    break;
                }
            }
        })
    }
}

/// Cloneable entry point for dispatching intents and reading state.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    intent_tx: mpsc::UnboundedSender<Envelope>,
    state_rx: watch::Receiver<AppState>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl StoreHandle {
    pub fn dispatch(&self, intent: Intent) -> Result<(), StoreClosed> {
        self.intent_tx.send(intent.into()).map_err(|_| StoreClosed)
    }

    pub fn snapshot(&self) -> AppState {
        self.state_rx.borrow().clone()
    }

    /// Applies a selector to the latest published state.
    pub fn select<T>(&self, selector: impl FnOnce(&AppState) -> T) -> T {
        selector(&self.state_rx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state_rx.clone()
    }

    /// Waits until the published state satisfies `pred` and returns it.
    pub async fn wait_for(
        &self,
        pred: impl FnMut(&AppState) -> bool,
    ) -> Result<AppState, StoreClosed> {
        let mut rx = self.state_rx.clone();
        let state = rx.wait_for(pred).await.map_err(|_| StoreClosed)?;
        Ok(state.clone())
    }

    /// Dispatches `intents` and, once all of them have been applied, waits for
    /// a state that satisfies `pred`. Returns at once when the state after the
    /// last intent already does, even if the intents changed nothing.
    pub async fn dispatch_and_wait(
        &self,
        intents: impl IntoIterator<Item = Intent>,
        pred: impl FnMut(&AppState) -> bool,
    ) -> Result<AppState, StoreClosed> {
        let mut intents = intents.into_iter().peekable();
        let mut applied = None;
        while let Some(intent) = intents.next() {
            let mut envelope = Envelope::from(intent);
            if intents.peek().is_none() {
                let (tx, rx) = oneshot::channel();
                envelope.applied = Some(tx);
                applied = Some(rx);
            }
            self.intent_tx.send(envelope).map_err(|_| StoreClosed)?;
        }
        if let Some(applied) = applied {
            applied.await.map_err(|_| StoreClosed)?;
        }
        self.wait_for(pred).await
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
