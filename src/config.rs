use std::time::Duration;

use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Gateway configuration — loaded from environment variables
// ---------------------------------------------------------------------------

/// Complete gateway configuration loaded at startup.
///
/// Media server credentials come from the `LIVEKIT_*` variables, the listen
/// port from `PORT`, and everything else from variables prefixed with
/// `GATEWAY_`. Defaults match a local `livekit-server --dev` instance.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Network ─────────────────────────────────────────────────────────
    pub bind_host: String,
    pub port: u16,

    // ── Media server ────────────────────────────────────────────────────
    /// Media server endpoint. `ws://` and `wss://` are accepted and mapped
    /// to their HTTP equivalents for server API calls.
    pub livekit_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Timeout applied by the HTTP client to every server API call.
    pub upstream_timeout: Duration,

    // ── Tokens ──────────────────────────────────────────────────────────
    pub token_ttl_secs: u64,

    // ── Recording ───────────────────────────────────────────────────────
    /// Path prefix under which segmented recordings are written.
    pub egress_output_dir: String,
    pub egress_segment_secs: u32,

    // ── End-room policy ─────────────────────────────────────────────────
    pub end_room_require_host: bool,
    pub end_room_confirm: bool,
    pub end_room_poll_attempts: u32,
    pub end_room_poll_interval: Duration,

    // ── TLS ─────────────────────────────────────────────────────────────
    pub tls_enabled: bool,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,

    // ── CORS / logging ──────────────────────────────────────────────────
    pub allowed_origins: String,
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Automatically loads a `.env` file if present (via `dotenvy`).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let api_key = match std::env::var("LIVEKIT_API_KEY") {
            Ok(k) if !k.is_empty() => k,
            _ => {
                warn!("LIVEKIT_API_KEY not set — using dev key (not suitable for production)");
                "devkey".to_string()
            }
        };
        let api_secret = match std::env::var("LIVEKIT_API_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ => {
                warn!("LIVEKIT_API_SECRET not set — using dev secret (not suitable for production)");
                "secret".to_string()
            }
        };

        let config = Config {
            bind_host: env_or("GATEWAY_BIND_HOST", "0.0.0.0"),
            port: env_parse("PORT", 3000),
            livekit_url: env_or("LIVEKIT_URL", "http://localhost:7880"),
            api_key,
            api_secret,
            upstream_timeout: Duration::from_secs(env_parse("GATEWAY_UPSTREAM_TIMEOUT_SECS", 30)),
            token_ttl_secs: env_parse("GATEWAY_TOKEN_TTL_SECS", 6 * 3600),
            egress_output_dir: env_or("GATEWAY_EGRESS_OUTPUT_DIR", "recordings"),
            egress_segment_secs: env_parse("GATEWAY_EGRESS_SEGMENT_SECS", 10),
            end_room_require_host: env_bool("GATEWAY_END_ROOM_REQUIRE_HOST", true),
            end_room_confirm: env_bool("GATEWAY_END_ROOM_CONFIRM", true),
            end_room_poll_attempts: env_parse("GATEWAY_END_ROOM_POLL_ATTEMPTS", 10),
            end_room_poll_interval: Duration::from_millis(env_parse(
                "GATEWAY_END_ROOM_POLL_INTERVAL_MS",
                500,
            )),
            tls_enabled: env_bool("GATEWAY_TLS_ENABLED", false),
            tls_cert_path: std::env::var("GATEWAY_TLS_CERT_PATH").ok(),
            tls_key_path: std::env::var("GATEWAY_TLS_KEY_PATH").ok(),
            allowed_origins: env_or("GATEWAY_ALLOWED_ORIGINS", "*"),
            log_level: env_or("GATEWAY_LOG_LEVEL", "info"),
            log_json: env_bool("GATEWAY_LOG_JSON", false),
        };

        config.log_summary();
        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    fn log_summary(&self) {
        info!("──── Gateway Configuration ────");
        info!("  bind_addr          : {}", self.bind_addr());
        info!("  livekit_url        : {}", self.livekit_url);
        info!("  api_key            : {}", mask(&self.api_key));
        info!("  upstream_timeout   : {:?}", self.upstream_timeout);
        info!("  token_ttl_secs     : {}", self.token_ttl_secs);
        info!("  egress_output_dir  : {}", self.egress_output_dir);
        info!("  egress_segment_secs: {}", self.egress_segment_secs);
        info!("  end_room_host_only : {}", self.end_room_require_host);
        if self.end_room_confirm {
            info!(
                "  end_room_confirm   : {} x {:?}",
                self.end_room_poll_attempts, self.end_room_poll_interval
            );
        } else {
            info!("  end_room_confirm   : off");
        }
        info!("  tls_enabled        : {}", self.tls_enabled);
        info!(
            "  cors_origins       : {}",
            if self.allowed_origins == "*" {
                "* (permissive)"
            } else {
                &self.allowed_origins
            }
        );
        info!("───────────────────────────────");
    }
}

// ---------------------------------------------------------------------------
// Environment helpers
// ---------------------------------------------------------------------------

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(v) => v.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("{key}={v:?} is not valid — using default");
            default
        }),
        Err(_) => default,
    }
}

/// Keep the first four characters of a credential for log output.
fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{visible}***")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
