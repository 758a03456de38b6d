//! # Redlog
//!
//! A small Redis-compatible in-memory key-value server.
//!
//! Redlog speaks RESP2 over TCP and serves string keys, hash keys and
//! channel-based pub/sub. Every accepted write is appended to a log that is
//! replayed on startup, so the keyspaces survive a restart.

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod persistence;
pub mod pubsub;
pub mod resp;
pub mod server;
pub mod store;
