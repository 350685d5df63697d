//! Runtime adapters and the transport-facing API surface.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

pub use api::{
    end_session, health, hub_status, new_session, register_node, request_status, Health,
    NewSessionPayload, NewSessionResponse, RequestStatusResponse,
};
#[cfg(feature = "tokio-runtime")]
pub use api::new_session_async;
#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;
