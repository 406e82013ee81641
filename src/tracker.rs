//! HTTP and UDP tracker clients (BEP-3, BEP-15)
//!
//! A [`TrackerClient`] selects its transport from the announce URL's scheme
//! and issues announces, returning discovered peers and swarm statistics.
//! The peer-id it reports is generated once at construction.

mod client;
mod error;
mod http;
mod request;
mod response;
mod udp;

pub use client::TrackerClient;
pub use error::TrackerError;
pub use http::HttpTracker;
pub use request::AnnounceRequest;
pub use response::{parse_compact_peers, AnnounceResponse, Peer, TrackerEvent};
pub use udp::UdpTracker;

#[cfg(test)]
mod tests;
