pub mod gateway;
pub mod handler;
pub mod registry;

pub use gateway::{BroadcastGateway, SessionState};
pub use registry::SessionRegistry;
