//! In-memory stand-ins for the media server collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::host::Role;
use crate::livekit::{
    EgressInfo, EgressService, RoomCompositeEgressRequest, RoomInfo, RoomService, ServerApiError,
};
use crate::token::{TokenError, TokenIssuer};

fn twirp(code: &str, msg: &str) -> ServerApiError {
    ServerApiError::Twirp {
        code: code.to_string(),
        msg: msg.to_string(),
    }
}

// ---------------------------------------------------------------------------
// FakeRoomService
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeRoomService {
    rooms: Mutex<HashMap<String, RoomInfo>>,
    /// Deleted rooms that keep showing up in listings for a number of calls.
    lingering: Mutex<HashMap<String, (RoomInfo, usize)>>,
    linger: AtomicUsize,
    failing: AtomicBool,
    list_calls: AtomicUsize,
}

impl FakeRoomService {
    /// Make every call fail with a connectivity-style error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Rooms deleted from now on stay listed for `calls` more listings.
    pub fn linger_after_delete(&self, calls: usize) {
        self.linger.store(calls, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check_failing(&self) -> Result<(), ServerApiError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(twirp("unavailable", "media server unreachable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RoomService for FakeRoomService {
    async fn create_room(&self, name: &str) -> Result<RoomInfo, ServerApiError> {
        self.check_failing()?;

        let mut rooms = self.rooms.lock().unwrap();
        if rooms.contains_key(name) {
            return Err(twirp("already_exists", "room already exists"));
        }

        let mut extra = serde_json::Map::new();
        extra.insert("empty_timeout".into(), serde_json::json!(300));
        extra.insert("num_participants".into(), serde_json::json!(0));

        let room = RoomInfo {
            sid: format!("RM_{}", uuid::Uuid::new_v4().simple()),
            name: name.to_string(),
            extra,
        };
        rooms.insert(name.to_string(), room.clone());
        Ok(room)
    }

    async fn delete_room(&self, name: &str) -> Result<(), ServerApiError> {
        self.check_failing()?;

        let room = self
            .rooms
            .lock()
            .unwrap()
            .remove(name)
            .ok_or_else(|| twirp("not_found", "requested room does not exist"))?;

        let linger = self.linger.load(Ordering::SeqCst);
        if linger > 0 {
            self.lingering
                .lock()
                .unwrap()
                .insert(name.to_string(), (room, linger));
        }
        Ok(())
    }

    async fn list_rooms(&self, names: &[String]) -> Result<Vec<RoomInfo>, ServerApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;

        let wanted = |name: &str| names.is_empty() || names.iter().any(|n| n == name);

        let mut listed: Vec<RoomInfo> = self
            .rooms
            .lock()
            .unwrap()
            .values()
            .filter(|r| wanted(r.name.as_str()))
            .cloned()
            .collect();

        let mut lingering = self.lingering.lock().unwrap();
        lingering.retain(|name, (room, remaining)| {
            if *remaining == 0 {
                return false;
            }
            if wanted(name.as_str()) {
                listed.push(room.clone());
                *remaining -= 1;
            }
            true
        });

        Ok(listed)
    }
}

// ---------------------------------------------------------------------------
// FakeEgressService
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeEgressService {
    jobs: Mutex<HashMap<String, EgressInfo>>,
    last_request: Mutex<Option<RoomCompositeEgressRequest>>,
}

impl FakeEgressService {
    pub fn last_request(&self) -> Option<RoomCompositeEgressRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl EgressService for FakeEgressService {
    async fn start_room_composite_egress(
        &self,
        request: RoomCompositeEgressRequest,
    ) -> Result<EgressInfo, ServerApiError> {
        let info = EgressInfo {
            egress_id: format!("EG_{}", uuid::Uuid::new_v4().simple()),
            room_name: request.room_name.clone(),
            status: serde_json::json!("EGRESS_STARTING"),
            extra: serde_json::Map::new(),
        };

        self.jobs
            .lock()
            .unwrap()
            .insert(info.egress_id.clone(), info.clone());
        *self.last_request.lock().unwrap() = Some(request);
        Ok(info)
    }

    async fn stop_egress(&self, egress_id: &str) -> Result<EgressInfo, ServerApiError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(egress_id)
            .ok_or_else(|| twirp("not_found", "egress not found"))?;

        job.status = serde_json::json!("EGRESS_COMPLETE");
        Ok(job.clone())
    }
}

// ---------------------------------------------------------------------------
// FailingTokenIssuer
// ---------------------------------------------------------------------------

pub struct FailingTokenIssuer;

impl TokenIssuer for FailingTokenIssuer {
    fn issue(&self, _room: &str, _identity: &str, _role: Role) -> Result<String, TokenError> {
        let err = jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidKeyFormat);
        Err(TokenError::Signing(err))
    }
}
