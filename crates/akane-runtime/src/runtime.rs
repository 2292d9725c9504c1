//! Runtime orchestration: config, logging, persistence and the event loop.
//!
//! ```text
//!  transport ──raw──▶ mpsc::Receiver ──▶ Normalizer ──▶ roles from config
//!                                                          │
//!                                           TaskTracker::spawn(dispatch)
//!                                                          │
//!                          JsonFileStore ◀── DispatchEngine ──▶ Responder
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use akane_runtime::AkaneRuntime;
//!
//! let runtime = AkaneRuntime::builder()
//!     .config_file("akane.toml")
//!     .linked_handlers()
//!     .responder(Arc::new(MyResponder::connect().await?))
//!     .build()
//!     .await?;
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(64);
//! transport.forward_into(tx);
//! runtime.run(&MyNormalizer::new(runtime.config()), rx).await?;
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use akane_core::{BoxedResponder, InboundMessage, Normalizer};
use akane_framework::{
    Clock, DispatchEngine, DispatchReport, Extensions, HandlerRegistry, RegistryError,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::{AkaneConfig, ConfigLoader, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::store::JsonFileStore;

/// How long in-flight dispatches may run after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A configured bot: dispatch engine, record store and event loop.
pub struct AkaneRuntime {
    config: AkaneConfig,
    store: Arc<JsonFileStore>,
    engine: DispatchEngine,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl AkaneRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &AkaneConfig {
        &self.config
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<JsonFileStore> {
        &self.store
    }

    /// Normalizes one raw event and dispatches it in the background.
    ///
    /// Returns `None` when the event is dropped: the normalizer rejected it,
    /// it was sent by the bot itself or its body is empty.
    pub fn submit<N: Normalizer>(
        &self,
        normalizer: &N,
        raw: N::Raw,
    ) -> Option<JoinHandle<DispatchReport>> {
        let mut message = normalizer.normalize(raw)?;
        if message.from_me || message.body.trim().is_empty() {
            return None;
        }
        self.apply_configured_roles(&mut message);

        let engine = self.engine.clone();
        Some(self.tracker.spawn(async move { engine.dispatch(message).await }))
    }

    fn apply_configured_roles(&self, message: &mut InboundMessage) {
        let configured = self.config.bot.roles_for(&message.sender);
        message.roles.real_owner |= configured.real_owner;
        message.roles.owner |= configured.owner || message.roles.real_owner;
    }

    /// Runs until Ctrl+C, SIGTERM or the event channel closes.
    pub async fn run<N: Normalizer>(
        &self,
        normalizer: &N,
        events: mpsc::Receiver<N::Raw>,
    ) -> RuntimeResult<()> {
        let mut signal_error = None;
        let shutdown = async {
            if let Err(e) = shutdown_signal().await {
                signal_error = Some(e);
            }
        };
        self.run_until(normalizer, events, shutdown).await?;

        match signal_error {
            Some(e) => Err(RuntimeError::Signal(e)),
            None => Ok(()),
        }
    }

    /// Runs until `shutdown` completes or the event channel closes.
    ///
    /// On the way out, in-flight dispatches get a short grace period and the
    /// store is saved one last time.
    pub async fn run_until<N, F>(
        &self,
        normalizer: &N,
        mut events: mpsc::Receiver<N::Raw>,
        shutdown: F,
    ) -> RuntimeResult<()>
    where
        N: Normalizer,
        F: Future<Output = ()>,
    {
        let autosave = match self.config.store.autosave_secs {
            0 => None,
            secs => Some(
                self.store
                    .spawn_autosave(Duration::from_secs(secs), self.shutdown.child_token()),
            ),
        };

        info!(
            bot = %self.config.bot.name,
            handlers = self.engine.registry().len(),
            "Akane runtime is now running"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                raw = events.recv() => match raw {
                    Some(raw) => {
                        self.submit(normalizer, raw);
                    }
                    None => {
                        info!("Event channel closed");
                        break;
                    }
                },
            }
        }

        self.stop(autosave).await
    }

    async fn stop(&self, autosave: Option<JoinHandle<()>>) -> RuntimeResult<()> {
        self.tracker.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                pending = self.tracker.len(),
                "Dispatches still running after the grace period"
            );
        }

        self.shutdown.cancel();
        if let Some(handle) = autosave
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Autosave task ended abnormally");
        }

        self.store.save().await?;
        info!("Runtime stopped");
        Ok(())
    }
}

impl std::fmt::Debug for AkaneRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AkaneRuntime")
            .field("bot", &self.config.bot.name)
            .field("store", &self.store.path())
            .field("engine", &self.engine)
            .finish()
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

enum RegistrySource {
    Ready(Arc<HandlerRegistry>),
    Linked,
}

/// Builder for [`AkaneRuntime`].
pub struct RuntimeBuilder {
    loader: ConfigLoader,
    config: Option<AkaneConfig>,
    registry: Option<RegistrySource>,
    responder: Option<BoxedResponder>,
    clock: Option<Arc<dyn Clock>>,
    extensions: Extensions,
    init_logging: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
            config: None,
            registry: None,
            responder: None,
            clock: None,
            extensions: Extensions::new(),
            init_logging: true,
        }
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.loader = self.loader.file(path.into());
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.loader = self.loader.search_path(path.into());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Layers `config` over whatever the loader finds.
    pub fn merge(mut self, config: AkaneConfig) -> Self {
        self.loader = self.loader.merge(config);
        self
    }

    /// Uses `config` as is, skipping file and environment loading.
    pub fn config(mut self, config: AkaneConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn registry(mut self, registry: impl Into<Arc<HandlerRegistry>>) -> Self {
        self.registry = Some(RegistrySource::Ready(registry.into()));
        self
    }

    /// Uses every handler submitted with `submit_handler!`.
    pub fn linked_handlers(mut self) -> Self {
        self.registry = Some(RegistrySource::Linked);
        self
    }

    pub fn responder(mut self, responder: BoxedResponder) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn extension<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Leaves the global `tracing` subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub async fn build(self) -> RuntimeResult<AkaneRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let registry = match self.registry.ok_or(RuntimeError::RegistryMissing)? {
            RegistrySource::Ready(registry) => registry,
            RegistrySource::Linked => match HandlerRegistry::linked() {
                Ok(registry) => Arc::new(registry),
                Err(RegistryError::Empty) => return Err(RuntimeError::RegistryMissing),
                Err(e) => return Err(e.into()),
            },
        };
        let responder = self.responder.ok_or(RuntimeError::ResponderMissing)?;

        let store = Arc::new(JsonFileStore::open(&config.store.path).await?);

        let mut engine = DispatchEngine::builder(registry, store.clone(), responder)
            .replies(config.replies.clone())
            .extensions(self.extensions);
        if let Some(clock) = self.clock {
            engine = engine.clock(clock);
        }
        let engine = engine.build();

        debug!(
            handlers = engine.registry().len(),
            store = %store.path().display(),
            "Runtime built"
        );

        Ok(AkaneRuntime {
            config,
            store,
            engine,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        })
    }
}
