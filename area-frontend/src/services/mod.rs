pub mod area_api;
pub mod authed_client;
pub mod backend_client;
pub mod error;
pub mod oauth;
pub mod proxy;

pub use authed_client::{AuthedClient, MemoryTokenStore, SessionTokenStore, TokenStore};
pub use backend_client::BackendClient;
pub use error::{ApiError, ErrorKind};
pub use proxy::ProxyClient;
