//! # dataone-events
//!
//! Wire model for the file-access notifications that the iRODS data store
//! publishes on its AMQP exchange, and the set of event kinds recorded in the
//! DataONE event log.
//!
//! ## Design Principles
//!
//! - Decoding is pure: the same bytes always produce the same [`Message`]
//! - Unknown fields are ignored so publishers can extend their payloads
//! - `entity` and `path` are mandatory; everything else is optional
//!
//! ## Event Kinds
//!
//! [`EventKind`] is the closed set of DataONE event types understood by the
//! event log schema. Configuration refers to them by their lowercase name
//! (`read`, `create`, ...) when mapping routing keys.

mod error;
mod kind;
mod message;

pub use error::DecodeError;
pub use kind::EventKind;
pub use message::{decode, Author, Message, TIMESTAMP_FORMAT};
