//! Supervisor for the service's long-running processes.
//!
//! Every process receives a clone of one shared `CancellationToken`. The
//! token is cancelled when the process receives SIGINT/SIGTERM, when any
//! process fails, or when any process returns. Closers run afterwards,
//! bounded by a timeout, whatever the outcome.
//!
//! # Example
//!
//! ```no_run
//! use ac_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Runner::new()
//!         .with_app_process("ticker", |ctx| async move {
//!             ctx.cancelled().await;
//!             Ok(())
//!         })
//!         .with_closer(|| async move { Ok(()) })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await;
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

/// Boxed long-running process. Receives the shared cancellation token.
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

/// Boxed cleanup step run after all processes have stopped.
pub type Closer = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

/// How the supervised processes ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Cancelled by a signal or the token, or every process returned cleanly.
    Clean,
    /// A process failed or panicked; carries the first failure.
    Failed(anyhow::Error),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Clean => 0,
            RunOutcome::Failed(_) => 1,
        }
    }
}

pub struct Runner {
    processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Closer timeout defaults to 10 seconds.
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_app_process<F, Fut>(self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.with_named_process(name, Box::new(move |token| Box::pin(process(token))))
    }

    /// Add an already boxed process, as returned by the modules' `into_runner_process`.
    pub fn with_named_process(mut self, name: impl Into<String>, process: AppProcess) -> Self {
        self.processes.push((name.into(), process));
        self
    }

    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(move || Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally owned token, so callers can trigger shutdown.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run to completion and exit the process with the outcome's exit code.
    pub async fn run(self) {
        let outcome = self.execute().await;
        match &outcome {
            RunOutcome::Clean => info!("application exiting normally"),
            RunOutcome::Failed(err) => error!(error = ?err, "application exiting with error"),
        }
        std::process::exit(outcome.exit_code());
    }

    /// Run processes and closers without exiting.
    pub async fn execute(self) -> RunOutcome {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for (name, process) in self.processes {
            let process_token = token.clone();
            let span = tracing::info_span!("process", name = %name);
            join_set.spawn(
                async move {
                    debug!("process starting");
                    (name, process(process_token).await)
                }
                .instrument(span),
            );
        }

        let signal_task = tokio::spawn(wait_for_shutdown_signal(token.clone()));

        let mut first_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "process finished");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        error!(process = %name, error = ?err, "process failed");
                        first_error = Some(err.context(format!("process '{}' failed", name)));
                    }
                }
                Err(join_err) => {
                    error!(error = %join_err, "process panicked");
                    if first_error.is_none() {
                        first_error = Some(anyhow::anyhow!("process panicked: {}", join_err));
                    }
                }
            }
            token.cancel();
        }

        signal_task.abort();
        run_closers(self.closers, self.closer_timeout).await;

        match first_error {
            Some(err) => RunOutcome::Failed(err),
            None => RunOutcome::Clean,
        }
    }
}

async fn wait_for_shutdown_signal(token: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("received SIGINT"),
            Err(err) => {
                warn!(error = %err, "unable to listen for SIGINT");
                return;
            }
        },
        _ = terminate => info!("received SIGTERM"),
        _ = token.cancelled() => return,
    }
    token.cancel();
}

async fn run_closers(closers: Vec<Closer>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }
    info!(timeout = ?timeout, "running closers");

    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    let drain = async {
        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => debug!("closer completed"),
                Ok(Err(err)) => error!(error = ?err, "closer failed"),
                Err(err) => error!(error = %err, "closer panicked"),
            }
        }
    };

    if tokio::time::timeout(timeout, drain).await.is_err() {
        error!(timeout = ?timeout, "closers timed out");
    }
}
