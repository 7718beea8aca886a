//! Clients for the media server's server API.
//!
//! The server API is Twirp over HTTP with JSON bodies: every call is a
//! `POST {host}/twirp/livekit.<Service>/<Method>` authorized by a short-lived
//! token the gateway signs itself with the grant the method requires.

mod egress;
mod room;

pub use egress::{
    EgressInfo, EgressService, RoomCompositeEgressRequest, SegmentedFileOutput,
    TwirpEgressClient,
};
pub use room::{RoomInfo, RoomService, TwirpRoomClient};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::token::{JwtTokenIssuer, TokenError, VideoGrant};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ServerApiError {
    /// The media server answered with a Twirp error. Displays the server's
    /// message unchanged.
    #[error("{msg}")]
    Twirp { code: String, msg: String },

    #[error("media server request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Error body returned by Twirp servers.
#[derive(Debug, Deserialize)]
struct TwirpErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    msg: String,
}

// ---------------------------------------------------------------------------
// TwirpClient
// ---------------------------------------------------------------------------

/// Shared transport for the room and egress clients.
#[derive(Clone)]
pub struct TwirpClient {
    http: reqwest::Client,
    base_url: String,
    signer: JwtTokenIssuer,
}

impl TwirpClient {
    pub fn new(
        host: &str,
        signer: JwtTokenIssuer,
        timeout: Duration,
    ) -> Result<Self, ServerApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: http_base_url(host),
            signer,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) async fn call<Req, Resp>(
        &self,
        service: &str,
        method: &str,
        grant: VideoGrant,
        body: &Req,
    ) -> Result<Resp, ServerApiError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/twirp/livekit.{service}/{method}", self.base_url);
        let token = self.signer.service_token(grant)?;

        debug!(%url, "media server call");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Resp>().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let err = match serde_json::from_str::<TwirpErrorBody>(&text) {
            Ok(body) if !body.msg.is_empty() => ServerApiError::Twirp {
                code: body.code,
                msg: body.msg,
            },
            _ => ServerApiError::Twirp {
                code: status.as_str().to_string(),
                msg: if text.is_empty() {
                    status.to_string()
                } else {
                    text
                },
            },
        };
        Err(err)
    }
}

/// Map a `ws://` / `wss://` endpoint onto the HTTP scheme the server API
/// listens on, dropping any trailing slash.
fn http_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if let Some(rest) = host.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = host.strip_prefix("ws://") {
        format!("http://{rest}")
    } else if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
