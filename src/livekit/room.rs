use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ServerApiError, TwirpClient};
use crate::token::VideoGrant;

const SERVICE: &str = "RoomService";

/// Room descriptor as reported by the media server.
///
/// Only the fields the gateway reads are typed; everything else the server
/// sends is kept in `extra` so the descriptor can be returned as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Room management on the media server.
#[async_trait]
pub trait RoomService: Send + Sync {
    async fn create_room(&self, name: &str) -> Result<RoomInfo, ServerApiError>;

    async fn delete_room(&self, name: &str) -> Result<(), ServerApiError>;

    /// List rooms whose names are in `names`; an empty slice lists every room.
    async fn list_rooms(&self, names: &[String]) -> Result<Vec<RoomInfo>, ServerApiError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CreateRoomRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct DeleteRoomRequest<'a> {
    room: &'a str,
}

#[derive(Serialize)]
struct ListRoomsRequest<'a> {
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    names: &'a [String],
}

#[derive(Deserialize)]
struct ListRoomsResponse {
    #[serde(default)]
    rooms: Vec<RoomInfo>,
}

#[derive(Deserialize)]
struct Empty {}

// ---------------------------------------------------------------------------
// TwirpRoomClient
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TwirpRoomClient {
    twirp: TwirpClient,
}

impl TwirpRoomClient {
    pub fn new(twirp: TwirpClient) -> Self {
        Self { twirp }
    }
}

#[async_trait]
impl RoomService for TwirpRoomClient {
    async fn create_room(&self, name: &str) -> Result<RoomInfo, ServerApiError> {
        let grant = VideoGrant {
            room_create: true,
            ..VideoGrant::default()
        };
        self.twirp
            .call(SERVICE, "CreateRoom", grant, &CreateRoomRequest { name })
            .await
    }

    async fn delete_room(&self, name: &str) -> Result<(), ServerApiError> {
        let grant = VideoGrant {
            room_create: true,
            ..VideoGrant::default()
        };
        let _: Empty = self
            .twirp
            .call(SERVICE, "DeleteRoom", grant, &DeleteRoomRequest { room: name })
            .await?;
        Ok(())
    }

    async fn list_rooms(&self, names: &[String]) -> Result<Vec<RoomInfo>, ServerApiError> {
        let grant = VideoGrant {
            room_list: true,
            ..VideoGrant::default()
        };
        let response: ListRoomsResponse = self
            .twirp
            .call(SERVICE, "ListRooms", grant, &ListRoomsRequest { names })
            .await?;
        Ok(response.rooms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::JwtTokenIssuer;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> TwirpRoomClient {
        let twirp = TwirpClient::new(
            &server.uri(),
            JwtTokenIssuer::new("key", "secret", 60),
            Duration::from_secs(5),
        )
        .unwrap();
        TwirpRoomClient::new(twirp)
    }

    #[tokio::test]
    async fn create_room_keeps_unknown_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/twirp/livekit.RoomService/CreateRoom"))
            .and(body_json(serde_json::json!({ "name": "alpha" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sid": "RM_abc",
                "name": "alpha",
                "empty_timeout": 300,
                "creation_time": "1700000000"
            })))
            .mount(&server)
            .await;

        let room = client(&server).await.create_room("alpha").await.unwrap();
        assert_eq!(room.sid, "RM_abc");
        assert_eq!(room.name, "alpha");

        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["empty_timeout"], 300);
        assert_eq!(json["creation_time"], "1700000000");
    }

    #[tokio::test]
    async fn list_rooms_filters_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/twirp/livekit.RoomService/ListRooms"))
            .and(body_json(serde_json::json!({ "names": ["alpha"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rooms": [{ "sid": "RM_abc", "name": "alpha" }]
            })))
            .mount(&server)
            .await;

        let rooms = client(&server)
            .await
            .list_rooms(&["alpha".to_string()])
            .await
            .unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, "alpha");
    }

    #[tokio::test]
    async fn list_rooms_tolerates_missing_rooms_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/twirp/livekit.RoomService/ListRooms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let rooms = client(&server).await.list_rooms(&[]).await.unwrap();
        assert!(rooms.is_empty());
    }

    #[tokio::test]
    async fn delete_room_sends_room_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/twirp/livekit.RoomService/DeleteRoom"))
            .and(body_json(serde_json::json!({ "room": "alpha" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).await.delete_room("alpha").await.unwrap();
    }
}
