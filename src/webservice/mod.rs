//! Typed HTTP resources, the network transport, and the cached webservice.

mod cache;
mod cached_client;
mod client;
mod delivery;
mod resource;
mod types;

pub use cached_client::CachedWebservice;
pub use client::{HttpTransport, Transport, Webservice};
pub use delivery::{Load, Update};
pub use resource::{HttpMethod, Resource};
pub use types::Episode;
