//! Bayeux Router
//!
//! The server half of the Bayeux protocol engine:
//! - Per-client connection state machine ([`Connection`])
//! - Connection registry and publish fan-out ([`Router`])
//! - Request dispatch from decoded payloads ([`dispatch`])
//! - The transport seam the host environment implements ([`Transport`])
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bayeux_router::{dispatch, Router, RouterConfig, Transport, TransportHandle};
//! use bayeux_router::dispatch::RequestContext;
//!
//! struct Reply; // wraps the pending HTTP response in a real server
//! impl Transport for Reply {
//!     fn is_writable(&self) -> bool { true }
//!     fn write(&self, _payload: &str) {}
//!     fn close(&self) {}
//! }
//!
//! let router = Router::new(RouterConfig::default());
//! let transport: TransportHandle = Arc::new(Reply);
//! let body = r#"[{"channel":"/meta/handshake","version":"1.0beta","supportedConnectionTypes":["long-polling"]}]"#;
//! dispatch::process_payload(&router, body, &RequestContext::default(), &transport).unwrap();
//! ```

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod router;
pub mod transport;

pub use connection::{Connection, ConnectionState, PeerInfo};
pub use dispatch::RequestContext;
pub use error::{Result, RouterError};
pub use router::{Router, RouterConfig};
pub use transport::{Transport, TransportHandle};
