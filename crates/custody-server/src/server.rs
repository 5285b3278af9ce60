use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use custody_ledger::{
    BroadcastSink, EventStream, LedgerEvent, LedgerReader, LedgerSnapshot, PackageLedger,
};
use custody_types::Identity;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, error, info, warn};

use crate::auth::{AuthProvider, OperatorAuth, TokenAuth};
use crate::config::{AuthConfig, ServerConfig};
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Custody ledger HTTP server.
pub struct CustodyServer {
    config: ServerConfig,
    state: AppState,
    events: BroadcastSink,
    /// Subscribed at construction so events committed before `serve` still
    /// reach the snapshot writer.
    recorder: EventStream,
}

impl CustodyServer {
    /// Open the ledger described by `config` (restoring its snapshot when one
    /// exists) and wire up authentication and event fan-out.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let events = BroadcastSink::new(config.event_channel_capacity);
        let recorder = events.subscribe();
        let ledger = open_ledger(&config)?.with_sink(Arc::new(events.clone()));

        let auth: Arc<dyn AuthProvider> = match &config.auth {
            AuthConfig::Operator => Arc::new(OperatorAuth::new(ledger.owner())),
            AuthConfig::Tokens { tokens } => Arc::new(TokenAuth::new(tokens.clone())),
        };

        Ok(Self {
            state: AppState::new(Arc::new(ledger), auth),
            config,
            events,
            recorder,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Receive every ledger event published from now on.
    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Bind the configured address and serve until SIGINT or SIGTERM.
    pub async fn serve(self) -> ServerResult<()> {
        let shutdown = ShutdownSignal::install()?;
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_with_shutdown(listener, shutdown.wait()).await
    }

    /// Serve on `listener` until `shutdown` resolves, then write the snapshot
    /// if one is configured.
    ///
    /// While serving, the snapshot is also rewritten after every committed
    /// mutation, so a crash loses nothing the ledger acknowledged.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(%addr, owner = %self.state.ledger.owner(), "custody server listening");

        let CustodyServer {
            config,
            state,
            recorder,
            ..
        } = self;
        let recorder = tokio::spawn(record_events(
            recorder,
            Arc::clone(&state.ledger),
            config.snapshot_path.clone(),
        ));

        let served = axum::serve(listener, build_router(state.clone()))
            .with_graceful_shutdown(shutdown)
            .await;
        recorder.abort();
        // Wait for the recorder to stop so it cannot race the final write.
        let _ = recorder.await;

        let saved = save_snapshot(&state.ledger, config.snapshot_path.as_deref());
        match (served, saved) {
            (Ok(()), saved) => saved,
            (Err(serve_err), Ok(())) => Err(serve_err.into()),
            (Err(serve_err), Err(save_err)) => {
                error!(error = %serve_err, "server stopped with an error");
                Err(save_err)
            }
        }
    }

    /// Write the ledger to the configured snapshot path, if any.
    pub fn save_snapshot(&self) -> ServerResult<()> {
        save_snapshot(&self.state.ledger, self.config.snapshot_path.as_deref())
    }
}

/// Waits for SIGINT, or SIGTERM on unix.
///
/// Handlers are registered by [`install`](Self::install), so a signal that
/// arrives before [`wait`](Self::wait) is first polled is not lost.
pub struct ShutdownSignal {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    pub fn install() -> ServerResult<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            )?,
        })
    }

    #[cfg(unix)]
    pub async fn wait(self) {
        let mut terminate = self.terminate;
        tokio::select! {
            _ = interrupt() => info!("interrupt received, shutting down"),
            _ = terminate.recv() => info!("terminate received, shutting down"),
        }
    }

    #[cfg(not(unix))]
    pub async fn wait(self) {
        interrupt().await;
        info!("interrupt received, shutting down");
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for interrupt");
        std::future::pending::<()>().await;
    }
}

fn open_ledger(config: &ServerConfig) -> ServerResult<PackageLedger> {
    if let Some(path) = config.snapshot_path.as_deref().filter(|p| p.exists()) {
        let snapshot = LedgerSnapshot::read_from(path)?;
        require_writer(snapshot.owner)?;
        if let Some(owner) = config.owner {
            if owner != snapshot.owner {
                return Err(ServerError::Config(format!(
                    "configured owner {owner} does not match snapshot owner {}",
                    snapshot.owner
                )));
            }
        }
        info!(path = %path.display(), "loading ledger snapshot");
        return Ok(PackageLedger::restore(snapshot)?);
    }

    let owner = config.owner.ok_or_else(|| {
        ServerError::Config("an owner identity is required to start an empty ledger".into())
    })?;
    require_writer(owner)?;
    Ok(PackageLedger::new(owner))
}

/// The zero address is what unauthenticated callers resolve to; it can never
/// be the writer.
fn require_writer(owner: Identity) -> ServerResult<()> {
    if owner.is_zero() {
        return Err(ServerError::Config("owner must not be the zero address".into()));
    }
    Ok(())
}

fn save_snapshot(ledger: &PackageLedger, path: Option<&Path>) -> ServerResult<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let snapshot = ledger.snapshot()?;
    snapshot.write_to(path)?;
    debug!(
        path = %path.display(),
        packages = snapshot.packages.len(),
        "snapshot written"
    );
    Ok(())
}

fn log_event(event: &LedgerEvent) {
    info!(
        kind = %event.kind(),
        package = %event.package_id(),
        timestamp = %event.timestamp(),
        "ledger event"
    );
}

/// Log every ledger event and rewrite the snapshot after each burst.
async fn record_events(mut stream: EventStream, ledger: Arc<PackageLedger>, path: Option<PathBuf>) {
    loop {
        match stream.recv().await {
            Ok(event) => {
                log_event(&event);
                loop {
                    match stream.try_recv() {
                        Ok(event) => log_event(&event),
                        Err(TryRecvError::Lagged(skipped)) => {
                            warn!(skipped, "event log fell behind")
                        }
                        Err(_) => break,
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log fell behind"),
            Err(RecvError::Closed) => break,
        }
        if let Err(e) = save_snapshot(&ledger, path.as_deref()) {
            warn!(error = %e, "failed to persist snapshot after commit");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use custody_ledger::{LedgerError, LedgerWriter};
    use custody_types::PackageId;
    use tokio::sync::oneshot;

    use super::*;

    fn owner() -> Identity {
        Identity::from_raw([7; 20])
    }

    fn config() -> ServerConfig {
        ServerConfig {
            owner: Some(owner()),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn empty_ledger_needs_owner() {
        let err = CustodyServer::new(ServerConfig::default()).err().unwrap();
        assert!(matches!(err, ServerError::Config(_)));

        let zero = ServerConfig {
            owner: Some(Identity::zero()),
            ..ServerConfig::default()
        };
        assert!(matches!(
            CustodyServer::new(zero).err().unwrap(),
            ServerError::Config(_)
        ));
    }

    #[test]
    fn server_construction() {
        let server = CustodyServer::new(config()).unwrap();
        assert_eq!(server.state().ledger.owner(), owner());
        assert_eq!(server.config().bind_addr.port(), 3000);
        let _router = server.router();
    }

    #[tokio::test]
    async fn mutations_reach_subscribers() {
        let server = CustodyServer::new(config()).unwrap();
        let mut events = server.subscribe();
        let id = PackageId::new("pkg1").unwrap();
        server
            .state()
            .ledger
            .create(&owner(), &id, "Madrid", "Barcelona")
            .unwrap();

        let event = events.recv().await.unwrap();
        assert!(matches!(event, LedgerEvent::PackageCreated { id: ref got, .. } if *got == id));
    }

    #[test]
    fn snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            snapshot_path: Some(dir.path().join("ledger.json")),
            ..config()
        };
        let id = PackageId::new("pkg1").unwrap();

        let first = CustodyServer::new(config.clone()).unwrap();
        first
            .state()
            .ledger
            .create(&owner(), &id, "Madrid", "Barcelona")
            .unwrap();
        first.save_snapshot().unwrap();

        let second = CustodyServer::new(config).unwrap();
        assert_eq!(second.state().ledger.get(&id).unwrap().origin, "Madrid");
    }

    #[test]
    fn snapshot_owner_must_match_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        PackageLedger::new(Identity::from_raw([8; 20]))
            .snapshot()
            .unwrap()
            .write_to(&path)
            .unwrap();

        let config = ServerConfig {
            snapshot_path: Some(path),
            ..config()
        };
        assert!(matches!(
            CustodyServer::new(config).err().unwrap(),
            ServerError::Config(_)
        ));
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let server = CustodyServer::new(ServerConfig {
            snapshot_path: Some(path.clone()),
            ..config()
        })
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        server
            .serve_with_shutdown(listener, async {})
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn zero_owner_snapshot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        PackageLedger::new(Identity::zero())
            .snapshot()
            .unwrap()
            .write_to(&path)
            .unwrap();

        let config = ServerConfig {
            owner: None,
            auth: AuthConfig::Tokens {
                tokens: Default::default(),
            },
            snapshot_path: Some(path),
            ..ServerConfig::default()
        };
        assert!(matches!(
            CustodyServer::new(config).err().unwrap(),
            ServerError::Config(_)
        ));
    }

    fn restored(path: &Path) -> Option<PackageLedger> {
        let snapshot = LedgerSnapshot::read_from(path).ok()?;
        PackageLedger::restore(snapshot).ok()
    }

    #[tokio::test]
    async fn commits_are_persisted_while_serving() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let server = CustodyServer::new(ServerConfig {
            snapshot_path: Some(path.clone()),
            ..config()
        })
        .unwrap();
        let ledger = Arc::clone(&server.state().ledger);
        let id = PackageId::new("pkg1").unwrap();
        ledger.create(&owner(), &id, "Madrid", "Barcelona").unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let serving = tokio::spawn(server.serve_with_shutdown(listener, async {
            let _ = stopped.await;
        }));

        let mut persisted = false;
        for _ in 0..100 {
            if restored(&path).is_some_and(|l| l.contains(&id).unwrap()) {
                persisted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(persisted, "snapshot not written before shutdown");

        stop.send(()).unwrap();
        serving.await.unwrap().unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminate_signal_stops_server_and_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let server = CustodyServer::new(ServerConfig {
            snapshot_path: Some(path.clone()),
            ..config()
        })
        .unwrap();
        let ledger = Arc::clone(&server.state().ledger);
        let id = PackageId::new("pkg1").unwrap();

        let shutdown = ShutdownSignal::install().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let serving = tokio::spawn(server.serve_with_shutdown(listener, shutdown.wait()));
        ledger.create(&owner(), &id, "Madrid", "Barcelona").unwrap();

        let status = std::process::Command::new("sh")
            .arg("-c")
            .arg(format!("kill -TERM {}", std::process::id()))
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(10), serving)
            .await
            .expect("server did not stop on SIGTERM")
            .unwrap()
            .unwrap();
        let ledger = restored(&path).unwrap();
        assert_eq!(ledger.get(&id).unwrap().origin, "Madrid");
    }

    #[tokio::test]
    async fn snapshot_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let server = CustodyServer::new(ServerConfig {
            snapshot_path: Some(dir.path().join("missing").join("ledger.json")),
            ..config()
        })
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let err = server
            .serve_with_shutdown(listener, async {})
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Ledger(LedgerError::Io(_))));
    }
}
