//! Bayeux Core
//!
//! Message model and wire codec for the Bayeux publish/subscribe
//! protocol as spoken over HTTP long-polling.
//!
//! This crate provides:
//! - The JSON value tree and hand-rolled wire codec ([`BayeuxValue`], [`json`])
//! - The message model and serialization ([`BayeuxMessage`])
//! - Message construction and classification ([`factory`])
//! - Channel naming and wildcard matching ([`channel`])
//! - Timestamp formatting ([`time`])

pub mod channel;
pub mod error;
pub mod factory;
pub mod json;
pub mod message;
pub mod time;
pub mod value;

pub use error::{Error, Result};
pub use factory::MessageKind;
pub use message::{
    advice, messages_to_json, BayeuxMessage, ConnectionType, ProtocolError,
    BAYEUX_MINIMUM_VERSION, BAYEUX_VERSION, SERVER_CONNECTION_TYPES,
};
pub use value::BayeuxValue;
