use axum::Router;
use if_addrs::get_if_addrs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};

use crate::campaign::Campaign;
use crate::routing::api_router;

/// Log the effective campaign setup, then serve the HTTP API on all
/// interfaces until a shutdown signal arrives.
pub async fn serve_campaign(campaign: Arc<Campaign>, port: u16) -> std::io::Result<()> {
    let settings = campaign.settings();
    let current_counter = campaign.current_counter().await;
    tracing::info!(
        policy = %settings.policy,
        business_hours = %settings.hours,
        counter_file = %campaign.counter_location(),
        current_counter,
        email_configured = campaign.email_configured(),
        "starting cold outreach service"
    );
    if settings.flags.test_mode {
        tracing::warn!("TEST_MODE is on, business hours are ignored");
    }
    if settings.flags.production_mode && settings.flags.ignore_business_hours {
        tracing::warn!("PRODUCTION_MODE with IGNORE_BUSINESS_HOURS, sending at any time");
    }
    if !campaign.email_configured() {
        tracing::warn!("EMAIL_ADDRESS or EMAIL_PASSWORD missing, sends will be rejected");
    }

    serve((Ipv4Addr::UNSPECIFIED, port), api_router(campaign)).await
}

pub async fn serve<S: ToSocketAddrs>(addr: S, router: Router) -> std::io::Result<()> {
    let tcp_listener = TcpListener::bind(addr).await?;
    print_listener_urls(&tcp_listener);

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

fn print_listener_urls(listener: &TcpListener) {
    if let Ok(addr) = listener.local_addr() {
        let port = addr.port();
        tracing::info!("Listening on port {}", port);
        match addr {
            SocketAddr::V4(addr4) if addr4.ip().is_unspecified() => {
                for ip in get_interface_ips(false) {
                    print_addr(ip, port)
                }
            }
            SocketAddr::V6(addr6) if addr6.ip().is_unspecified() => {
                for ip in get_interface_ips(true) {
                    print_addr(ip, port)
                }
            }
            _ => print_addr(addr.ip(), port),
        }
    } else {
        tracing::warn!("could not determine the address the server is listening on");
    }
}

fn get_interface_ips(ipv6: bool) -> Vec<IpAddr> {
    get_if_addrs()
        .into_iter()
        .flatten()
        .map(|i| i.ip())
        .filter(|ip| (ipv6 && ip.is_ipv6()) || (!ipv6 && ip.is_ipv4()))
        .collect()
}

fn print_addr(addr: IpAddr, port: u16) {
    match addr {
        _ if addr.is_loopback() => tracing::info!("➜  Local:   http://localhost:{}", port),
        IpAddr::V4(_) => tracing::info!("➜  Network: http://{}:{}", addr, port),
        // Enclose IPv6 addresses in square brackets
        IpAddr::V6(_) => tracing::info!("➜  Network: http://[{}]:{}", addr, port),
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
