//! Live arrival board for a single transit stop.
//!
//! A [`session::BoardSession`] polls the arrivals endpoint on a jittered timer,
//! falls back to the last cached snapshot, and re-projects countdowns every
//! second. HTTP, storage and time are injected through [`http::HttpClient`],
//! [`store::KeyValueStore`] and [`clock::Clock`].

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod http;
pub mod model;
pub mod projector;
pub mod render;
pub mod schedule;
pub mod session;
pub mod store;
