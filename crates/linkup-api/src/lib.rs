// linkup-api: Async Rust client for the LibreLinkUp follower API

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::{Credentials, RequestContext, account_id_for};
pub use client::{LinkUpClient, region_base_url};
pub use error::Error;
pub use models::{AuthTicket, Connection, LoginGrant};
pub use transport::{ClientIdentity, TransportConfig};
