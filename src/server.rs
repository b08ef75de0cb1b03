//! Static file server exposing annotated snapshots over HTTP.
//!
//! Runs on its own thread with a single-threaded tokio runtime so the blocking monitor
//! loop is never affected by file requests. No authentication: deploy on a trusted
//! network only.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use log::{error, info, warn};
use tokio::sync::oneshot;

use crate::snapshot_store::{is_plain_file_name, normalize_mount};

/// Handle to the running snapshot server.
pub struct SnapshotServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<std::io::Result<()>>>,
}

impl SnapshotServer {
    /// Bind `addr` and serve files from `dir` under `mount`.
    ///
    /// When `termination` is given, SIGINT and SIGTERM are forwarded to it so the
    /// monitoring loop can wind down; the server keeps serving until
    /// [`SnapshotServer::shutdown`] is called. The signal handlers are installed
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound, the signal handlers cannot be
    /// installed or the server thread cannot start.
    pub fn start(
        addr: SocketAddr,
        mount: &str,
        dir: PathBuf,
        termination: Option<mpsc::Sender<()>>,
    ) -> Result<Self> {
        let listener = std::net::TcpListener::bind(addr)
            .with_context(|| format!("failed to bind snapshot server to {}", addr))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let router = router(mount, dir);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("snapshot-server".to_string())
            .spawn(move || -> std::io::Result<()> {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(serve(listener, router, shutdown_rx, termination, ready_tx))
            })
            .context("failed to spawn snapshot server thread")?;

        // The sender is dropped without a message if startup fails.
        if ready_rx.recv().is_err() {
            return match handle.join() {
                Ok(Ok(())) => Err(anyhow::anyhow!("snapshot server exited during startup")),
                Ok(Err(e)) => Err(e).context("snapshot server failed to start"),
                Err(_) => Err(anyhow::anyhow!("snapshot server thread panicked")),
            };
        }

        info!("Snapshot server listening on {}", local_addr);

        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections, finish in-flight requests and join the server thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the server stopped with an I/O error or its thread panicked.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result.context("snapshot server failed"),
                Err(_) => Err(anyhow::anyhow!("snapshot server thread panicked")),
            },
            None => Ok(()),
        }
    }
}

impl Drop for SnapshotServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("{}", e);
        }
    }
}

async fn serve(
    listener: std::net::TcpListener,
    router: Router,
    shutdown: oneshot::Receiver<()>,
    termination: Option<mpsc::Sender<()>>,
    ready: mpsc::Sender<()>,
) -> std::io::Result<()> {
    if let Some(termination) = termination {
        let signals = TerminationSignals::install()?;
        tokio::spawn(forward_termination(signals, termination));
    }

    let listener = tokio::net::TcpListener::from_std(listener)?;
    let _ = ready.send(());

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.await;
        })
        .await
}

/// Routes `GET {mount}/{file_name}` to files in `dir`.
pub fn router(mount: &str, dir: PathBuf) -> Router {
    Router::new()
        .route(
            &format!("{}/{{file_name}}", normalize_mount(mount)),
            get(serve_snapshot),
        )
        .with_state(Arc::new(dir))
}

async fn serve_snapshot(
    State(dir): State<Arc<PathBuf>>,
    Path(file_name): Path<String>,
) -> Response {
    if !is_plain_file_name(&file_name) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read(dir.join(&file_name)).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(&file_name))], bytes).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!("Failed to read snapshot {}: {}", file_name, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn content_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Forward the first SIGINT or SIGTERM to the monitoring loop.
async fn forward_termination(mut signals: TerminationSignals, termination: mpsc::Sender<()>) {
    signals.recv().await;
    info!("Termination signal received");
    let _ = termination.send(());
}

/// SIGINT and SIGTERM listeners, registered with the OS when created.
struct TerminationSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
}

impl TerminationSignals {
    /// Must run inside the tokio runtime.
    fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(windows)]
        {
            Ok(Self {
                ctrl_c: tokio::signal::windows::ctrl_c()?,
            })
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        tokio::select! {
            _ = self.interrupt.recv() => {},
            _ = self.terminate.recv() => {},
        }

        #[cfg(windows)]
        self.ctrl_c.recv().await;
    }
}
