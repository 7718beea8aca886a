use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use room_gateway::config::Config;
use room_gateway::gateway::{ConfirmPoll, EndRoomPolicy, Gateway, RecordingSettings};
use room_gateway::host::MemoryHostStore;
use room_gateway::livekit::{TwirpClient, TwirpEgressClient, TwirpRoomClient};
use room_gateway::token::JwtTokenIssuer;
use room_gateway::{api, AppState};

// ─── Logging ────────────────────────────────────────────────────────────────

fn init_tracing() {
    let log_level = std::env::var("GATEWAY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let json = std::env::var("GATEWAY_LOG_JSON")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},tower_http=debug")));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

// ─── Shutdown ───────────────────────────────────────────────────────────────

/// Resolves on Ctrl-C or SIGTERM and cancels `token`.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
    token.cancel();
}

// ─── Gateway wiring ─────────────────────────────────────────────────────────

fn build_gateway(cfg: &Config, shutdown: CancellationToken) -> anyhow::Result<Gateway> {
    let issuer = JwtTokenIssuer::new(&cfg.api_key, &cfg.api_secret, cfg.token_ttl_secs);

    let twirp = TwirpClient::new(&cfg.livekit_url, issuer.clone(), cfg.upstream_timeout)
        .context("failed to build media server client")?;
    info!("Media server API at {}", twirp.base_url());

    let end_room = EndRoomPolicy {
        require_host: cfg.end_room_require_host,
        confirm: cfg.end_room_confirm.then_some(ConfirmPoll {
            attempts: cfg.end_room_poll_attempts,
            interval: cfg.end_room_poll_interval,
        }),
    };

    let recording = RecordingSettings {
        output_dir: cfg.egress_output_dir.clone(),
        segment_secs: cfg.egress_segment_secs,
        ..RecordingSettings::default()
    };

    let gateway = Gateway::new(
        Arc::new(TwirpRoomClient::new(twirp.clone())),
        Arc::new(TwirpEgressClient::new(twirp)),
        Arc::new(issuer),
        Arc::new(MemoryHostStore::new()),
    )
    .with_recording(recording)
    .with_end_room_policy(end_room)
    .with_shutdown(shutdown);

    Ok(gateway)
}

// ─── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Must happen before any TLS operation (rustls 0.23+).
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Load .env before anything else so GATEWAY_LOG_LEVEL is available.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::from_env();
    let shutdown = CancellationToken::new();

    let state = Arc::new(AppState {
        gateway: build_gateway(&cfg, shutdown.clone())?,
    });
    let app = api::router(state, &cfg.allowed_origins);

    let bind_addr = cfg.bind_addr();

    if cfg.tls_enabled {
        let cert_path = cfg
            .tls_cert_path
            .as_deref()
            .context("GATEWAY_TLS_CERT_PATH must be set when TLS is enabled")?;
        let key_path = cfg
            .tls_key_path
            .as_deref()
            .context("GATEWAY_TLS_KEY_PATH must be set when TLS is enabled")?;

        info!("Loading TLS certificate from: {}", cert_path);
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .context("failed to load TLS configuration")?;

        let addr: std::net::SocketAddr = bind_addr
            .parse()
            .with_context(|| format!("invalid bind address '{bind_addr}'"))?;

        let handle = axum_server::Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            let shutdown = shutdown.clone();
            async move {
                shutdown_signal(shutdown).await;
                handle.graceful_shutdown(Some(Duration::from_secs(10)));
            }
        });

        info!("Room gateway listening on https://{bind_addr}");
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind {bind_addr}"))?;

        info!("Room gateway listening on http://{bind_addr}");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;
    }

    info!("Room gateway stopped");
    Ok(())
}
