//! Shutdown coordination.
//!
//! Signal handling only cancels a [`CancellationToken`]. A supervisor task
//! waits on the token, runs every registered [`CompensatingAction`] in order,
//! then applies the [`ExitPolicy`]. Failed or hung actions are logged and
//! reported but never keep the process alive: each action gets a deadline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ShutdownConfig;
use crate::core::coordinator::SlotCoordinator;
use crate::core::SlotError;

/// Deadline applied to each compensating action unless configured otherwise.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Idempotent cleanup step run when the process is going away.
#[async_trait]
pub trait CompensatingAction: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Run the cleanup; returns how many records were changed.
    async fn compensate(&self) -> Result<usize, SlotError>;
}

/// Store of in-progress business processes, owned outside this crate.
pub trait ProcessLedger: Send + Sync {
    /// Move every started process back to pending; returns how many moved.
    fn reset_started_to_pending(&self) -> Result<usize, SlotError>;
}

/// Run synchronous store work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, SlotError>
where
    F: FnOnce() -> Result<T, SlotError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SlotError::Backend(format!("blocking task failed: {e}")))?
}

/// Close every running lane with the stop flag raised.
#[derive(Debug, Clone)]
pub struct InterruptRunningSlots {
    coordinator: Arc<SlotCoordinator>,
}

impl InterruptRunningSlots {
    /// Action over the given coordinator.
    #[must_use]
    pub const fn new(coordinator: Arc<SlotCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl CompensatingAction for InterruptRunningSlots {
    fn name(&self) -> &str {
        "interrupt_running_slots"
    }

    async fn compensate(&self) -> Result<usize, SlotError> {
        let coordinator = Arc::clone(&self.coordinator);
        run_blocking(move || coordinator.interrupt_all_running()).await
    }
}

/// Return started business processes to pending so they are picked up again.
#[derive(Clone)]
pub struct ResetStartedProcesses {
    ledger: Arc<dyn ProcessLedger>,
}

impl ResetStartedProcesses {
    /// Action over the given ledger.
    #[must_use]
    pub fn new(ledger: Arc<dyn ProcessLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl CompensatingAction for ResetStartedProcesses {
    fn name(&self) -> &str {
        "reset_started_processes"
    }

    async fn compensate(&self) -> Result<usize, SlotError> {
        let ledger = Arc::clone(&self.ledger);
        run_blocking(move || ledger.reset_started_to_pending()).await
    }
}

/// What the supervisor does after the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Terminate the process with this code.
    Exit(i32),
    /// Return the report from the supervisor task.
    Return,
}

/// Result of one compensating action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Action name.
    pub action: String,
    /// Records changed, or the error message.
    pub result: Result<usize, String>,
}

/// Results of one sweep, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// One entry per action.
    pub outcomes: Vec<ActionOutcome>,
}

impl SweepReport {
    /// Whether every action succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Records changed by the named action, if it succeeded.
    #[must_use]
    pub fn changed_by(&self, action: &str) -> Option<usize> {
        self.outcomes
            .iter()
            .find(|o| o.action == action)
            .and_then(|o| o.result.as_ref().ok().copied())
    }
}

/// Whether the calling thread is the process's main thread.
#[must_use]
pub fn is_primary_thread() -> bool {
    std::thread::current().name() == Some("main")
}

#[cfg(unix)]
async fn wait_for_termination() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

async fn listen_for_signals(token: CancellationToken) {
    tokio::select! {
        () = token.cancelled() => {}
        res = wait_for_termination() => match res {
            Ok(()) => {
                tracing::info!("termination signal received");
                token.cancel();
            }
            Err(e) => tracing::error!("failed to listen for termination signals: {}", e),
        },
    }
}

/// Runs compensating actions once the shutdown token is cancelled.
pub struct ShutdownHook {
    actions: Vec<Arc<dyn CompensatingAction>>,
    action_timeout: Duration,
    token: CancellationToken,
    installed: Mutex<bool>,
    sweep_lock: tokio::sync::Mutex<()>,
}

impl Default for ShutdownHook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHook")
            .field(
                "actions",
                &self.actions.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .field("action_timeout", &self.action_timeout)
            .field("installed", &*self.installed.lock())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl ShutdownHook {
    /// Hook with no actions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            token: CancellationToken::new(),
            installed: Mutex::new(false),
            sweep_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Standard hook: close running lanes, then reset started processes when
    /// a ledger is supplied.
    #[must_use]
    pub fn for_coordinator(
        coordinator: Arc<SlotCoordinator>,
        ledger: Option<Arc<dyn ProcessLedger>>,
    ) -> Self {
        let hook = Self::new().with_action(Arc::new(InterruptRunningSlots::new(coordinator)));
        match ledger {
            Some(ledger) => hook.with_action(Arc::new(ResetStartedProcesses::new(ledger))),
            None => hook,
        }
    }

    /// Append an action; actions run in insertion order.
    #[must_use]
    pub fn with_action(mut self, action: Arc<dyn CompensatingAction>) -> Self {
        self.actions.push(action);
        self
    }

    /// Deadline for each action; a hung action is reported as failed.
    #[must_use]
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Token whose cancellation starts the sweep.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Start shutdown without a signal, e.g. on a normal exit path.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Whether [`install`](Self::install) has taken effect.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        *self.installed.lock()
    }

    /// Run every action in order. Errors are logged and recorded, and later
    /// actions still run. Concurrent calls are serialized.
    pub async fn run_compensations(&self) -> SweepReport {
        let _guard = self.sweep_lock.lock().await;
        let mut report = SweepReport::default();
        for action in &self.actions {
            let result = match tokio::time::timeout(self.action_timeout, action.compensate()).await {
                Ok(Ok(changed)) => {
                    tracing::info!(action = action.name(), changed, "compensating action done");
                    Ok(changed)
                }
                Ok(Err(e)) => {
                    tracing::error!(action = action.name(), "compensating action failed: {}", e);
                    Err(e.to_string())
                }
                Err(_) => {
                    tracing::error!(
                        action = action.name(),
                        timeout = ?self.action_timeout,
                        "compensating action timed out"
                    );
                    Err(format!("timed out after {:?}", self.action_timeout))
                }
            };
            report.outcomes.push(ActionOutcome {
                action: action.name().to_string(),
                result,
            });
        }
        report
    }

    /// Install signal listening and the supervisor task.
    ///
    /// Takes effect at most once per hook. Returns `None` when already
    /// installed, when called outside a Tokio runtime, or when the config
    /// requires the main thread and this is not it.
    pub fn install(self: &Arc<Self>, config: &ShutdownConfig) -> Option<JoinHandle<SweepReport>> {
        if config.require_primary_thread && !is_primary_thread() {
            tracing::debug!("not on the main thread; shutdown hook not installed");
            return None;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no tokio runtime; shutdown hook not installed");
            return None;
        };
        {
            let mut installed = self.installed.lock();
            if *installed {
                return None;
            }
            *installed = true;
        }

        if config.listen_for_signals {
            runtime.spawn(listen_for_signals(self.token.clone()));
        }

        let hook = Arc::clone(self);
        let policy = config.exit_policy();
        tracing::info!(actions = self.actions.len(), ?policy, "shutdown hook installed");
        Some(runtime.spawn(async move {
            hook.token.cancelled().await;
            let report = hook.run_compensations().await;
            if !report.is_clean() {
                tracing::warn!("shutdown sweep finished with errors");
            }
            if let ExitPolicy::Exit(code) = policy {
                tracing::info!(code, "exiting after shutdown sweep");
                std::process::exit(code);
            }
            report
        }))
    }
}
