//! Connection configuration.
//!
//! [`ChannelConfig`] carries the four connection inputs with their
//! defaults. [`TrustMode`] is the resolved form of the certificate/flag
//! pair that channel creation matches on.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::options::ChannelOptions;

/// Default Riva server address.
pub const DEFAULT_URI: &str = "localhost:50051";

/// Connection inputs for a channel to a Riva server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Root certificate file. When set, TLS is used even if `use_ssl` is false.
    pub ssl_cert: Option<PathBuf>,
    /// Use TLS. Without `ssl_cert` the bundled default roots are trusted.
    pub use_ssl: bool,
    /// Server address (`host:port`).
    pub uri: String,
    /// gRPC channel arguments, passed through in order.
    pub channel_options: Option<ChannelOptions>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ssl_cert: None,
            use_ssl: false,
            uri: DEFAULT_URI.to_string(),
            channel_options: None,
        }
    }
}

impl ChannelConfig {
    /// Create a config for `uri` with every other field defaulted.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_ssl_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_cert = Some(path.into());
        self
    }

    #[must_use]
    pub const fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    #[must_use]
    pub fn with_channel_options(mut self, options: ChannelOptions) -> Self {
        self.channel_options = Some(options);
        self
    }

    /// Whether the resulting channel will be encrypted.
    pub const fn is_secure(&self) -> bool {
        self.use_ssl || self.ssl_cert.is_some()
    }

    /// Copy of this config with `~` expanded in the certificate path.
    #[must_use]
    pub fn resolved(&self) -> Self {
        Self {
            ssl_cert: self.ssl_cert.as_deref().map(expand_home),
            ..self.clone()
        }
    }
}

/// How the server identity is verified.
#[derive(Clone, PartialEq, Eq)]
pub enum TrustMode {
    /// Plaintext HTTP/2.
    Insecure,
    /// TLS against the bundled default roots.
    SecureDefaultRoots,
    /// TLS against the PEM bytes read from a certificate file.
    SecureWithCertificate(Vec<u8>),
}

impl TrustMode {
    /// Resolve the trust mode from the certificate path and TLS flag.
    ///
    /// Reads the certificate file on every call; nothing is cached.
    pub fn resolve(ssl_cert: Option<&Path>, use_ssl: bool) -> Result<Self> {
        match ssl_cert {
            Some(path) => {
                let path = expand_home(path);
                let pem = std::fs::read(&path).map_err(|source| Error::FileAccess {
                    path: path.clone(),
                    source,
                })?;
                info!(ca_cert = %path.display(), bytes = pem.len(), "Loaded root certificate");
                Ok(Self::SecureWithCertificate(pem))
            }
            None if use_ssl => Ok(Self::SecureDefaultRoots),
            None => Ok(Self::Insecure),
        }
    }

    pub const fn is_secure(&self) -> bool {
        !matches!(self, Self::Insecure)
    }
}

impl std::fmt::Debug for TrustMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insecure => f.write_str("Insecure"),
            Self::SecureDefaultRoots => f.write_str("SecureDefaultRoots"),
            Self::SecureWithCertificate(pem) => f
                .debug_struct("SecureWithCertificate")
                .field("bytes", &pem.len())
                .finish(),
        }
    }
}

/// Expand a leading `~` or `~user` component to that user's home directory.
///
/// Paths are returned unchanged when the home directory cannot be
/// determined, including unknown users.
pub fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    let Some(Component::Normal(first)) = components.next() else {
        return path.to_path_buf();
    };
    let Some(user) = first.to_str().and_then(|s| s.strip_prefix('~')) else {
        return path.to_path_buf();
    };
    let home = if user.is_empty() {
        dirs::home_dir()
    } else {
        user_home(user)
    };
    match home {
        Some(home) if components.as_path().as_os_str().is_empty() => home,
        Some(home) => home.join(components.as_path()),
        None => path.to_path_buf(),
    }
}

#[cfg(unix)]
fn user_home(name: &str) -> Option<PathBuf> {
    nix::unistd::User::from_name(name)
        .ok()
        .flatten()
        .map(|user| user.dir)
}

#[cfg(not(unix))]
fn user_home(_name: &str) -> Option<PathBuf> {
    None
}
