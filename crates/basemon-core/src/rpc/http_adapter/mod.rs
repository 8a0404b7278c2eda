//! JSON-RPC over HTTP transport for bitcoind's RPC port.
//!
//! An alternative to shelling out to `bitcoin-cli`: supports basic auth from
//! explicit credentials or a cookie file, and a per-request timeout.

mod client;
mod connection;
mod protocol;

pub use client::HttpTransport;
