//! Read-through HTTP cache.
//!
//! Resources are served from local storage right away, then refreshed from
//! the network. See [`webservice::CachedWebservice`].

pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod webservice;
