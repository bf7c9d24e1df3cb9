//! Central collector of an electronic toll network.
//!
//! Toll booths connect over TCP and report vehicles entering and leaving
//! the highway as newline terminated `TYPE;PLATE;TIMESTAMP;BOOTH_ID` records.
//!
//! - [`protocol`] decodes records and frames them over the byte stream.
//! - [`fee`] prices a trip.
//! - [`ledger`] tracks the vehicles on the highway, guarded by a single lock.
//! - [`stats`] holds the counters updated alongside the ledger.
//! - [`client`] serves a single booth connection.
//! - [`server`] accepts booths and supervises their handlers.

pub mod client;
pub mod config;
pub mod fee;
pub mod ledger;
pub mod protocol;
pub mod server;
pub mod stats;
