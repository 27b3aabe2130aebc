//! Riva client connection layer
//!
//! Opens the gRPC channel to a Riva server and supplies the authorization
//! metadata attached to outgoing requests:
//! - Channel creation, plaintext or TLS with default or custom roots
//! - Connection configuration and channel options
//! - Authorization metadata providers and the request interceptor
//! - Common error types

pub mod auth;
pub mod channel;
pub mod config;
pub mod error;
pub mod options;

pub use auth::{Auth, AuthInterceptor, AuthMetadata, NoAuth};
pub use channel::{create_channel, create_channel_with_trust};
pub use config::{ChannelConfig, DEFAULT_URI, TrustMode};
pub use error::{Error, Result};
pub use options::ChannelOptions;
