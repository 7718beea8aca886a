pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod host;
pub mod livekit;
pub mod token;

#[cfg(test)]
mod testing;

pub struct AppState {
    pub gateway: gateway::Gateway,
}
