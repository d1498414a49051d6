//! Broadcast WebSocket Chat Relay Library
//!
//! Every client that connects to `/ws` receives every message any client sends.
//!
//! # Architecture
//! - `Registry`: the set of live connections behind a single lock
//! - `FanOut`: one task draining an unbounded FIFO queue, delivering each
//!   message to every registered connection and pruning those that fail
//! - `handle_connection`: one task per client, decoding inbound frames onto
//!   the queue and deregistering on the first failure
//! - `Relay`: the context object (registry + queue) passed to every task
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use chat_relay::{server, Relay, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let listener = TcpListener::bind(&config.addr).await.unwrap();
//!     let (relay, fanout) = Relay::new();
//!
//!     tokio::spawn(fanout.run());
//!     server::serve(listener, relay, &config, server::shutdown_signal())
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod relay;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use connection::Connection;
pub use error::{AppError, DecodeError, SendError};
pub use handler::handle_connection;
pub use message::ChatMessage;
pub use registry::{Delivery, Registry};
pub use relay::{FanOut, Relay};
pub use types::ConnectionId;
