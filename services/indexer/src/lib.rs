//! DataONE event indexer library.
//!
//! The crate ships the `dataone-indexer` binary, which subscribes to the data
//! store's AMQP exchange and records file-access events for the DataONE member
//! node event log. The library surface exists so the pieces can be exercised
//! by integration tests.

pub mod broker;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod handlers;
pub mod recorder;
pub mod supervisor;
pub mod telemetry;
