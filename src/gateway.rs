use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::host::{self, HostStore, Role};
use crate::livekit::{
    EgressInfo, EgressService, RoomCompositeEgressRequest, RoomInfo, RoomService,
    SegmentedFileOutput,
};
use crate::token::TokenIssuer;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Bounded poll used to confirm that a deleted room is gone upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmPoll {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ConfirmPoll {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(500),
        }
    }
}

/// How `end_room` authorizes and confirms a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndRoomPolicy {
    /// Only the recorded host may end a room.
    pub require_host: bool,
    /// Poll the room listing after deletion; `None` skips the poll.
    pub confirm: Option<ConfirmPoll>,
}

impl Default for EndRoomPolicy {
    fn default() -> Self {
        Self {
            require_host: true,
            confirm: Some(ConfirmPoll::default()),
        }
    }
}

/// Where and how room recordings are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSettings {
    pub output_dir: String,
    pub segment_secs: u32,
    pub layout: String,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_dir: "recordings".to_string(),
            segment_secs: 10,
            layout: "grid".to_string(),
        }
    }
}

impl RecordingSettings {
    /// Segmented output for a recording named `filename`: every chunk and the
    /// playlist live under `{output_dir}/{filename}/`.
    pub fn segmented_output(&self, filename: &str) -> SegmentedFileOutput {
        let dir = self.output_dir.trim_end_matches('/');
        let base = if dir.is_empty() {
            format!("{filename}/{filename}")
        } else {
            format!("{dir}/{filename}/{filename}")
        };
        SegmentedFileOutput {
            playlist_name: format!("{base}.m3u8"),
            filename_prefix: base,
            segment_duration: self.segment_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStarted {
    pub egress_id: String,
    pub status: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoomEnded {
    pub success: bool,
    /// Outcome of the deletion poll; absent when the poll is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Room/session gateway: room lifecycle, host election, access tokens and
/// recording control over injected media-server collaborators.
pub struct Gateway {
    rooms: Arc<dyn RoomService>,
    egress: Arc<dyn EgressService>,
    tokens: Arc<dyn TokenIssuer>,
    hosts: Arc<dyn HostStore>,
    recording: RecordingSettings,
    end_room: EndRoomPolicy,
    shutdown: CancellationToken,
}

impl Gateway {
    pub fn new(
        rooms: Arc<dyn RoomService>,
        egress: Arc<dyn EgressService>,
        tokens: Arc<dyn TokenIssuer>,
        hosts: Arc<dyn HostStore>,
    ) -> Self {
        Self {
            rooms,
            egress,
            tokens,
            hosts,
            recording: RecordingSettings::default(),
            end_room: EndRoomPolicy::default(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_recording(mut self, recording: RecordingSettings) -> Self {
        self.recording = recording;
        self
    }

    pub fn with_end_room_policy(mut self, policy: EndRoomPolicy) -> Self {
        self.end_room = policy;
        self
    }

    /// Token that aborts in-flight deletion polls when cancelled.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn hosts(&self) -> &dyn HostStore {
        self.hosts.as_ref()
    }

    // ── CreateRoom ──────────────────────────────────────────────────────

    pub async fn create_room(&self, name: &str) -> Result<RoomInfo, GatewayError> {
        let name = required(name, "name")?;

        let room = self
            .rooms
            .create_room(name)
            .await
            .map_err(GatewayError::upstream)?;

        info!(room = name, sid = %room.sid, "room created");
        Ok(room)
    }

    // ── IssueToken ──────────────────────────────────────────────────────

    pub fn issue_token(&self, room: &str, identity: &str) -> Result<IssuedToken, GatewayError> {
        let room = required(room, "room")?;
        let identity = required(identity, "identity")?;

        let role = host::elect(self.hosts.as_ref(), room, identity);

        let token = self
            .tokens
            .issue(room, identity, role)
            .map_err(GatewayError::upstream)?;

        info!(room, identity, role = role.as_str(), "token issued");
        Ok(IssuedToken { token, role })
    }

    // ── RoomExists ──────────────────────────────────────────────────────

    /// Probe the media server for `room`. Never fails: an empty name or any
    /// upstream error reads as "does not exist".
    pub async fn room_exists(&self, room: &str) -> bool {
        if room.is_empty() {
            return false;
        }

        match self.rooms.list_rooms(&[room.to_string()]).await {
            Ok(rooms) => rooms.iter().any(|r| r.name == room),
            Err(e) => {
                debug!(room, error = %e, "room lookup failed, reporting absent");
                false
            }
        }
    }

    // ── StartRecording / StopRecording ──────────────────────────────────

    pub async fn start_recording(
        &self,
        room: &str,
        filename: &str,
    ) -> Result<RecordingStarted, GatewayError> {
        let room = required(room, "room")?;
        let filename = required(filename, "filename")?;

        let request = RoomCompositeEgressRequest {
            room_name: room.to_string(),
            layout: self.recording.layout.clone(),
            segment_outputs: vec![self.recording.segmented_output(filename)],
        };

        let info = self
            .egress
            .start_room_composite_egress(request)
            .await
            .map_err(GatewayError::upstream)?;

        info!(room, egress_id = %info.egress_id, "recording started");
        Ok(RecordingStarted {
            egress_id: info.egress_id,
            status: info.status,
        })
    }

    pub async fn stop_recording(&self, egress_id: &str) -> Result<EgressInfo, GatewayError> {
        let egress_id = required(egress_id, "egressId")?;

        let info = self
            .egress
            .stop_egress(egress_id)
            .await
            .map_err(GatewayError::upstream)?;

        info!(egress_id, status = %info.status, "recording stopped");
        Ok(info)
    }

    // ── EndRoom ─────────────────────────────────────────────────────────

    pub async fn end_room(
        &self,
        room: &str,
        identity: Option<&str>,
    ) -> Result<RoomEnded, GatewayError> {
        let room = required(room, "room")?;

        if self.end_room.require_host {
            let identity = required(identity.unwrap_or_default(), "identity")?;
            if let Some(host) = self.hosts.get(room) {
                if host != identity {
                    return Err(GatewayError::Forbidden(format!(
                        "identity '{identity}' is not the host of room '{room}'"
                    )));
                }
            }
        }

        self.rooms
            .delete_room(room)
            .await
            .map_err(GatewayError::upstream)?;

        if let Some(previous) = self.hosts.delete(room) {
            debug!(room, host = %previous, "host record cleared");
        }

        let confirmed = match self.end_room.confirm {
            Some(poll) => Some(self.await_room_gone(room, poll).await),
            None => None,
        };

        info!(room, ?confirmed, "room ended");
        Ok(RoomEnded {
            success: true,
            confirmed,
        })
    }

    /// Poll the room listing until `room` disappears. Returns `false` when
    /// the attempts run out or shutdown is signalled first.
    async fn await_room_gone(&self, room: &str, poll: ConfirmPoll) -> bool {
        let names = [room.to_string()];

        for attempt in 1..=poll.attempts {
            match self.rooms.list_rooms(&names).await {
                Ok(rooms) if !rooms.iter().any(|r| r.name == room) => return true,
                Ok(_) => debug!(room, attempt, "room still listed"),
                Err(e) => warn!(room, attempt, error = %e, "deletion check failed"),
            }

            if attempt == poll.attempts {
                break;
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!(room, "deletion check cancelled");
                    return false;
                }
                _ = tokio::time::sleep(poll.interval) => {}
            }
        }

        warn!(room, attempts = poll.attempts, "room deletion not confirmed");
        false
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, GatewayError> {
    if value.is_empty() {
        Err(GatewayError::missing(field))
    } else {
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
