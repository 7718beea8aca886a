use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ServerApiError, TwirpClient};
use crate::token::VideoGrant;

const SERVICE: &str = "Egress";

/// Segmented (HLS) file output: fixed-duration chunks plus a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentedFileOutput {
    pub filename_prefix: String,
    pub playlist_name: String,
    /// Segment length in seconds.
    pub segment_duration: u32,
}

/// Composite recording of a whole room rendered with a named layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCompositeEgressRequest {
    pub room_name: String,
    pub layout: String,
    pub segment_outputs: Vec<SegmentedFileOutput>,
}

/// Recording job as reported by the media server. Unread fields are kept in
/// `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EgressInfo {
    #[serde(default)]
    pub egress_id: String,
    #[serde(default)]
    pub room_name: String,
    /// Job status exactly as the server encodes it (e.g. `"EGRESS_STARTING"`).
    #[serde(default)]
    pub status: serde_json::Value,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Recording management on the media server.
#[async_trait]
pub trait EgressService: Send + Sync {
    async fn start_room_composite_egress(
        &self,
        request: RoomCompositeEgressRequest,
    ) -> Result<EgressInfo, ServerApiError>;

    async fn stop_egress(&self, egress_id: &str) -> Result<EgressInfo, ServerApiError>;
}

#[derive(Serialize)]
struct StopEgressRequest<'a> {
    egress_id: &'a str,
}

#[derive(Clone)]
pub struct TwirpEgressClient {
    twirp: TwirpClient,
}

impl TwirpEgressClient {
    pub fn new(twirp: TwirpClient) -> Self {
        Self { twirp }
    }
}

fn record_grant(room: Option<&str>) -> VideoGrant {
    VideoGrant {
        room_record: true,
        room: room.map(str::to_string),
        ..VideoGrant::default()
    }
}

#[async_trait]
impl EgressService for TwirpEgressClient {
    async fn start_room_composite_egress(
        &self,
        request: RoomCompositeEgressRequest,
    ) -> Result<EgressInfo, ServerApiError> {
        let grant = record_grant(Some(&request.room_name));
        self.twirp
            .call(SERVICE, "StartRoomCompositeEgress", grant, &request)
            .await
    }

    async fn stop_egress(&self, egress_id: &str) -> Result<EgressInfo, ServerApiError> {
        self.twirp
            .call(SERVICE, "StopEgress", record_grant(None), &StopEgressRequest { egress_id })
            .await
    }
}
