//! Process runner for the ingestion service.
//!
//! Runs named long-lived processes side by side, stops all of them when one
//! fails or a SIGINT/SIGTERM arrives, then runs the closers under a timeout.
//!
//! # Example
//!
//! ```no_run
//! use meshlog_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Runner::new()
//!         .with_named_process("ticker", |ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {
//!                         tracing::info!("tick");
//!                     }
//!                 }
//!             }
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

/// Boxed app process: takes the shared cancellation token
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

/// Boxed cleanup function
pub type Closer = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

pub struct Runner {
    app_processes: Vec<(String, AppProcess)>,
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
    /// Runner with no processes and a 10 second closer timeout
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds an unnamed app process
    pub fn with_app_process<F, Fut>(self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = format!("process-{}", self.app_processes.len());
        self.with_named_process(name, process)
    }

    /// Adds an app process identified by `name` in logs.
    ///
    /// If any process returns an error, all processes are cancelled.
    pub fn with_named_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.app_processes
            .push((name.into(), Box::new(|token| Box::pin(process(token)))));
        self
    }

    /// Adds an already boxed process, as returned by the worker modules
    pub fn with_boxed_process(mut self, name: impl Into<String>, process: AppProcess) -> Self {
        self.app_processes.push((name.into(), process));
        self
    }

    /// Adds a closer. Closers run after every process has stopped, whatever
    /// the reason, and a failing closer does not stop the others.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally controlled cancellation token
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run until completion, then exit the process with 0 or 1
    pub async fn run(self) {
        let token = self.cancellation_token.clone();
        spawn_signal_handlers(token);

        match self.run_until_complete().await {
            Ok(()) => {
                tracing::info!("application exiting normally");
                std::process::exit(0);
            }
            Err(err) => {
                tracing::error!("application exiting with error: {:#}", err);
                std::process::exit(1);
            }
        }
    }

    /// Run every process until all finish, one fails, or the token is
    /// cancelled; then run the closers. Returns the first process error.
    pub async fn run_until_complete(self) -> anyhow::Result<()> {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for (name, process) in self.app_processes {
            let process_token = token.clone();
            join_set.spawn(async move { (name, process(process_token).await) });
        }

        let mut first_error = None;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((name, Ok(()))) => {
                    tracing::debug!(process = %name, "app process completed");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        tracing::error!(process = %name, "app process error: {:#}", err);
                        first_error = Some(err.context(format!("process '{}' failed", name)));
                        token.cancel();
                    }
                }
                Err(err) => {
                    tracing::error!("app process panicked: {}", err);
                    if !token.is_cancelled() {
                        first_error = Some(anyhow::anyhow!("app process panicked: {}", err));
                        token.cancel();
                    }
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        join_set.shutdown().await;

        if !self.closers.is_empty() {
            tracing::info!("running closers with timeout of {:?}", self.closer_timeout);
            match tokio::time::timeout(self.closer_timeout, run_closers(self.closers)).await {
                Ok(()) => tracing::info!("all closers completed"),
                Err(_) => tracing::error!("closers timed out after {:?}", self.closer_timeout),
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => {
                tracing::error!("error setting up signal handler: {}", err);
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("received SIGTERM signal");
                token.cancel();
            }
            Err(err) => {
                tracing::error!("error setting up SIGTERM handler: {}", err);
            }
        }
    });
}

async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();

    for closer in closers {
        closer_set.spawn(async move { closer().await });
    }

    while let Some(result) = closer_set.join_next().await {
        match result {
            Ok(Ok(())) => tracing::debug!("closer completed"),
            Ok(Err(err)) => tracing::error!("closer error: {:#}", err),
            Err(err) => tracing::error!("closer panicked: {}", err),
        }
    }
}
