use std::fmt;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::settings::ServerConfig;
use crate::errors::BridgeError;
use crate::observability::metrics::get_metrics;
use crate::server::tls;
use crate::utils::constants::SHUTDOWN_GRACE_SECS;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Http,
    Https,
    Metrics,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerKind::Http => write!(f, "http"),
            ListenerKind::Https => write!(f, "https"),
            ListenerKind::Metrics => write!(f, "metrics"),
        }
    }
}

struct ListenerSpec {
    kind: ListenerKind,
    addr: SocketAddr,
    router: Router,
}

/// Owns the plain and TLS listeners that share one router, and stops them
/// all on a single cancellation token.
pub struct ListenerManager {
    config: ServerConfig,
    specs: Vec<ListenerSpec>,
    shutdown: CancellationToken,
}

impl ListenerManager {
    pub fn new(
        config: ServerConfig,
        app: Router,
        shutdown: CancellationToken,
    ) -> Result<Self, BridgeError> {
        if config.http_port.is_none() && config.https_port.is_none() {
            return Err(BridgeError::Config(
                "neither http port or https port was specified".to_owned(),
            ));
        }

        let mut specs = Vec::new();
        if let Some(addr) = config.http_addr() {
            specs.push(ListenerSpec {
                kind: ListenerKind::Http,
                addr,
                router: app.clone(),
            });
        }
        if let Some(addr) = config.https_addr() {
            specs.push(ListenerSpec {
                kind: ListenerKind::Https,
                addr,
                router: app,
            });
        }

        Ok(Self {
            config,
            specs,
            shutdown,
        })
    }

    /// Serve `router` on a separate plain listener at the bind address.
    pub fn with_metrics_listener(mut self, port: u16, router: Router) -> Self {
        self.specs.push(ListenerSpec {
            kind: ListenerKind::Metrics,
            addr: SocketAddr::new(self.config.bind_address, port),
            router,
        });
        self
    }

    /// Load TLS material and bind every socket, then start serving.
    pub async fn start(self) -> Result<ListenerHandle, BridgeError> {
        let acceptor = if self.config.tls_enabled() {
            Some(tls::acceptor(
                &self.config.tls_cert_path,
                &self.config.tls_key_path,
            )?)
        } else {
            None
        };

        let mut bound = Vec::with_capacity(self.specs.len());
        for spec in self.specs {
            let listener = TcpListener::bind(spec.addr)
                .await
                .map_err(|source| BridgeError::Listener {
                    name: spec.kind.to_string(),
                    source,
                })?;
            let local_addr = listener
                .local_addr()
                .map_err(|source| BridgeError::Listener {
                    name: spec.kind.to_string(),
                    source,
                })?;
            bound.push((spec, listener, local_addr));
        }

        let mut tasks = JoinSet::new();
        let mut addrs = Vec::with_capacity(bound.len());
        for (spec, listener, local_addr) in bound {
            info!(
                address = %local_addr.ip(),
                port = local_addr.port(),
                tls = spec.kind == ListenerKind::Https,
                "{} listening",
                self.config.service_name
            );
            addrs.push((spec.kind, local_addr));
            let shutdown = self.shutdown.clone();
            match (spec.kind, &acceptor) {
                (ListenerKind::Https, Some(acceptor)) => {
                    tasks.spawn(serve_tls(listener, acceptor.clone(), spec.router, shutdown));
                }
                (kind, _) => {
                    tasks.spawn(serve_plain(kind, listener, spec.router, shutdown));
                }
            }
        }

        get_metrics().await.up.set(1);
        Ok(ListenerHandle {
            tasks,
            addrs,
            shutdown: self.shutdown,
        })
    }

    /// Start every listener and block until all of them have stopped.
    pub async fn run(self) -> Result<(), BridgeError> {
        self.start().await?.wait().await
    }
}

/// Running listeners.
pub struct ListenerHandle {
    tasks: JoinSet<Result<(), BridgeError>>,
    addrs: Vec<(ListenerKind, SocketAddr)>,
    shutdown: CancellationToken,
}

impl ListenerHandle {
    pub fn local_addrs(&self) -> &[(ListenerKind, SocketAddr)] {
        &self.addrs
    }

    pub fn local_addr(&self, kind: ListenerKind) -> Option<SocketAddr> {
        self.addrs
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, addr)| *addr)
    }

    /// Wait for every serving routine to return. A listener failing outside
    /// shutdown stops the others and its error is returned.
    pub async fn wait(mut self) -> Result<(), BridgeError> {
        let mut first_err = None;
        while let Some(joined) = self.tasks.join_next().await {
            let result = joined.map_err(|err| BridgeError::Listener {
                name: "task".to_owned(),
                source: std::io::Error::other(err),
            });
            if let Err(err) = result.and_then(|r| r) {
                error!("{}", err);
                self.shutdown.cancel();
                first_err.get_or_insert(err);
            }
        }
        get_metrics().await.up.set(0);
        info!("all listeners stopped");
        first_err.map_or(Ok(()), Err)
    }
}

fn grace_period() -> Duration {
    Duration::from_secs(SHUTDOWN_GRACE_SECS)
}

/// Pause after a failed accept (e.g. EMFILE) so the loop does not spin.
/// Returns false when shutdown fired during the pause.
async fn back_off(shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => true,
    }
}

async fn serve_plain(
    kind: ListenerKind,
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), BridgeError> {
    let serve = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();
    tokio::pin!(serve);

    tokio::select! {
        res = &mut serve => {
            return res.map_err(|source| BridgeError::Listener { name: kind.to_string(), source });
        }
        _ = shutdown.cancelled() => {}
    }

    info!("shutting down {} listener", kind);
    match timeout(grace_period(), &mut serve).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!("{} listener shutdown: {}", kind, err),
        Err(_) => warn!("Forcibly shutting down {} listener: grace period elapsed", kind),
    }
    Ok(())
}

async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), BridgeError> {
    let kind = ListenerKind::Https;
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("{} accept: {}", kind, err);
                        if back_off(&shutdown).await {
                            continue;
                        }
                        break;
                    }
                };
                connections.spawn(serve_tls_connection(
                    stream,
                    peer,
                    acceptor.clone(),
                    router.clone(),
                    shutdown.clone(),
                ));
            }
        }
        while connections.try_join_next().is_some() {}
    }

    info!("shutting down {} listener", kind);
    drop(listener);
    let drained = timeout(grace_period(), async {
        while connections.join_next().await.is_some() {}
    })
    .await
    .is_ok();
    if !drained {
        warn!(
            "Forcibly shutting down {} listener: {} connections still open",
            kind,
            connections.len()
        );
        connections.abort_all();
    }
    Ok(())
}

async fn serve_tls_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    router: Router,
    shutdown: CancellationToken,
) {
    let tls_stream = match acceptor.accept(stream).await {
        Ok(stream) => stream,
        Err(err) => {
            debug!(peer = %peer, "tls handshake: {}", err);
            return;
        }
    };

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(
        TokioIo::new(tls_stream),
        TowerToHyperService::new(router),
    );
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            res = conn.as_mut() => {
                if let Err(err) = res {
                    debug!(peer = %peer, "serving tls connection: {}", err);
                }
                break;
            }
            _ = shutdown.cancelled(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accept_back_off_waits_before_retrying() {
        let shutdown = CancellationToken::new();
        let start = tokio::time::Instant::now();
        assert!(back_off(&shutdown).await);
        assert!(start.elapsed() >= ACCEPT_ERROR_BACKOFF);
    }

    #[tokio::test]
    async fn accept_back_off_ends_on_shutdown() {
        let shutdown = CancellationToken::new();
        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let stopped = timeout(Duration::from_millis(500), back_off(&shutdown)).await;
        assert_eq!(stopped.ok(), Some(false));
    }
}
