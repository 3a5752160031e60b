pub mod area;
pub mod connection;
pub mod service;
pub mod user;

pub use area::{Area, AreaEndpoint, AreaForm, AreaPatch, NewArea};
pub use connection::{ConnectionCard, ConnectionStatus, DiscordChannel, Provider};
pub use service::{ServiceCapability, ServiceInfo};
pub use user::{AuthUser, StorageScope, TokenPair, UserRecord};
