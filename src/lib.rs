//! Core protocol engine for talking to a Gearman job server as a client,
//! worker, or admin.
//!
//! The Gearman server itself is out of scope: this crate is a TCP client
//! library. See `gearman::client`, `gearman::worker`, and `gearman::admin`
//! for the three public front-ends, all built on the shared connection
//! manager in `gearman::manager`.

pub mod admin;
pub mod client;
pub mod codec;
pub mod config;
pub mod conn;
pub mod errors;
pub mod handler;
pub mod manager;
pub mod poller;
pub mod types;
pub mod wire;
pub mod worker;

pub use admin::GearmanAdminClient;
pub use client::GearmanClient;
pub use codec::PayloadCodec;
pub use config::GearmanConfig;
pub use errors::Error;
pub use worker::GearmanWorker;
