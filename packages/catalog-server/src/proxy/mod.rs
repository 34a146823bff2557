//! Intercepting Proxy (MITM): accept loop, TLS interception,
//! raw tunneling, and graceful shutdown.

pub mod cert;
pub mod mitm;
pub mod shutdown;
pub mod tunnel;

pub use cert::{CertError, CertificateAuthority, LeafCertificate};
pub use mitm::{ConnectionState, MitmProxy, ProxyConfig, ProxyError};
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};

use std::sync::Arc;

use tokio::net::TcpListener;

/// Runs the proxy's accept loop: one task per accepted connection, with
/// construction kept separate from serving so the listener can be bound
/// before the health probe reports ready. Exits once the shutdown
/// controller signals a drain and the caller's own timeout wrapping this
/// future elapses.
pub async fn serve(listener: TcpListener, proxy: Arc<MitmProxy>, shutdown: Arc<ShutdownController>) {
    let mut shutdown_rx = shutdown.shutdown_receiver();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        let proxy = Arc::clone(&proxy);
                        let guard = shutdown.in_flight_guard();
                        tracing::debug!(%peer, "mitm: accepted connection");
                        tokio::spawn(async move {
                            proxy.handle_connection(socket).await;
                            drop(guard);
                        });
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "mitm: accept failed");
                    }
                }
            }
            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("mitm: shutdown signaled, no longer accepting connections");
                    break;
                }
            }
        }
    }
}
