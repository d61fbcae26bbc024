pub mod api_client;
pub mod connection;
pub mod debounce;
pub mod error;
pub mod sync;

pub use api_client::DocumentApiClient;
pub use connection::CollabConnection;
pub use debounce::Debouncer;
pub use error::ClientError;
pub use sync::{DocumentPersister, DocumentSync, Peer, DEFAULT_SAVE_DELAY};
