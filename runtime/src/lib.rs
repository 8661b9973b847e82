//! # Ticket Scan Runtime
//!
//! The Store that drives a scan session.
//!
//! ## Core Components
//!
//! - **Store**: owns the session state and executes effects
//! - **Effect Executor**: spawns effect futures and feeds produced actions back
//! - **Teardown**: a cancellation scope shared by every spawned effect, so a
//!   late result can never reach a discarded session
//!
//! ## Example
//!
//! ```ignore
//! use ticket_scan_runtime::Store;
//!
//! let store = Store::new(ScanState::default(), ScanReducer::new(), environment);
//!
//! store.send(ScanAction::StartSession).await?;
//! let phase = store.state(ScanState::phase).await;
//!
//! // Screen goes away: in-flight verification is dropped
//! store.teardown().await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use ticket_scan_core::{effect::Effect, reducer::Reducer};
use tokio::sync::{watch, RwLock};

pub use store::Store;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// The session was torn down and accepts no more actions
        #[error("Session has been torn down")]
        SessionTornDown,

        /// Waiting for effects took longer than allowed
        #[error("Timed out waiting for effects to settle")]
        Timeout,
    }
}

pub use error::StoreError;

/// Handle for waiting on the effects started by one `send()`
///
/// Only the direct effects of the action are tracked; an action fed back by
/// one of those effects has been reduced by the time the effect counts as
/// complete.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(ScanAction::CodeDecoded { raw }).await?;
/// handle.wait().await;
/// // The verification result has been applied
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Number of effects from this action still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // Every tracker is gone, nothing left to wait for
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires first.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: per-send effect counter
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements effect counter on drop
///
/// Runs even if the effect panics or is cancelled.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements the store-wide pending counter on drop
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store module - the runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicCounterGuard, AtomicUsize, DecrementGuard, Duration, Effect, EffectHandle,
        EffectTracking, Ordering, Reducer, RwLock, StoreError,
    };
    use tokio::sync::broadcast;
    use tokio_util::sync::CancellationToken;

    /// Capacity of the action broadcast channel
    const BROADCAST_CAPACITY: usize = 16;

    /// Poll interval used while waiting for the store to go idle
    const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(5);

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution, scoped to the store's cancellation token
    ///
    /// Cloning a Store yields another handle to the same session.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        cancellation: CancellationToken,
        pending_effects: Arc<AtomicUsize>,
        /// Actions produced by effects, for observers such as a UI layer
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + std::fmt::Debug + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            let (action_broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                cancellation: CancellationToken::new(),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                action_broadcast,
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires the write lock on state
        /// 2. Refuses the action if the session was torn down
        /// 3. Calls the reducer with (state, action, environment)
        /// 4. Spawns the returned effects
        ///
        /// `send()` returns once the reducer ran; the state change is visible
        /// to the next reader. Effects keep running in the background.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::SessionTornDown`] after [`Store::teardown`].
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            self.apply(action, false).await
        }

        /// Reduce `action` and spawn its effects, broadcasting it when
        /// `broadcast` is set.
        ///
        /// The broadcast happens under the write lock right after the
        /// reducer ran, so subscribers see actions in reduction order and
        /// never before the state reflects them. Refused actions are not
        /// broadcast.
        async fn apply(&self, action: A, broadcast: bool) -> Result<EffectHandle, StoreError> {
            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;

                if self.cancellation.is_cancelled() {
                    tracing::debug!(?action, "Action refused, session torn down");
                    metrics::counter!("store.actions.refused").increment(1);
                    return Err(StoreError::SessionTornDown);
                }

                let echo = broadcast.then(|| action.clone());

                tracing::trace!(?action, "Reducing action");
                metrics::counter!("store.actions.processed").increment(1);
                let effects = self.reducer.reduce(&mut state, action, &self.environment);

                if let Some(echo) = echo {
                    // No receivers is fine
                    let _ = self.action_broadcast.send(echo);
                }
                effects
            };

            for effect in effects {
                self.execute_effect(effect, tracking.clone());
            }

            Ok(handle)
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let locked = store.state(|s| s.locked).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Subscribe to actions produced by effects
        ///
        /// An action is delivered only after the reducer applied it, so a
        /// subscriber reading state on receipt already sees its effect.
        /// Actions refused after teardown are never delivered, and the
        /// initial actions passed to `send()` are not broadcast.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Number of effects currently running in this session
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::SeqCst)
        }

        /// Wait until no effect of this session is running
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::Timeout`] if effects are still running after `timeout`.
        pub async fn wait_idle(&self, timeout: Duration) -> Result<(), StoreError> {
            let start = tokio::time::Instant::now();

            loop {
                let pending = self.pending_effects.load(Ordering::SeqCst);
                if pending == 0 {
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::warn!(pending_effects = pending, "Effects did not settle in time");
                    return Err(StoreError::Timeout);
                }

                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            }
        }

        /// Tear the session down
        ///
        /// Cancels every running effect and refuses further actions. Once this
        /// returns, no reducer call is in progress and none will start, so the
        /// state is frozen.
        pub async fn teardown(&self) {
            if self.cancellation.is_cancelled() {
                return;
            }

            let pending = self.pending_effects.load(Ordering::SeqCst);
            tracing::info!(pending_effects = pending, "Tearing down session");
            metrics::counter!("store.teardown").increment(1);

            self.cancellation.cancel();

            // Barrier: wait out a reducer that was already running
            drop(self.state.write().await);
        }

        /// Whether [`Store::teardown`] has been called
        #[must_use]
        pub fn is_torn_down(&self) -> bool {
            self.cancellation.is_cancelled()
        }

        /// Execute an effect with tracking
        ///
        /// Futures race against the cancellation token. A future that loses
        /// the race is dropped, along with any request it had outstanding.
        #[allow(clippy::needless_pass_by_value)] // tracking is cloned into the task
        fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking) {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    metrics::counter!("store.effects.executed").increment(1);
                    tracking.increment();

                    self.pending_effects.fetch_add(1, Ordering::SeqCst);
                    let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

                    let store = self.clone();
                    let token = self.cancellation.clone();

                    tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking);
                        let _pending_guard = pending_guard;

                        tokio::select! {
                            biased;
                            () = token.cancelled() => {
                                tracing::debug!("Effect cancelled by session teardown");
                                metrics::counter!("store.effects.cancelled").increment(1);
                            }
                            produced = fut => {
                                let Some(action) = produced else {
                                    tracing::trace!("Effect::Future completed with no action");
                                    return;
                                };

                                if let Err(error) = store.apply(action, true).await {
                                    tracing::debug!(%error, "Dropped effect result");
                                    metrics::counter!("store.effects.cancelled").increment(1);
                                }
                            }
                        }
                    });
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                cancellation: self.cancellation.clone(),
                pending_effects: Arc::clone(&self.pending_effects),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}
