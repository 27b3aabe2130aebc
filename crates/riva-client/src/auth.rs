//! Connection holder and request authorization metadata.
//!
//! [`Auth`] owns the channel to a Riva server together with the resolved
//! connection inputs, and hands out the metadata every outgoing call should
//! carry. Metadata comes from an [`AuthMetadata`] provider; the default
//! [`NoAuth`] provider contributes nothing.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, MetadataMap};
use tonic::service::Interceptor;
use tonic::transport::Channel;
use tonic::{Request, Status};

use crate::channel::create_channel_with_trust;
use crate::config::{ChannelConfig, TrustMode};
use crate::error::Result;
use crate::options::ChannelOptions;

/// Source of authorization metadata for outgoing calls.
///
/// Callers merge the returned pairs with their own metadata; an empty list
/// today does not mean an empty list from every provider.
pub trait AuthMetadata: fmt::Debug + Send + Sync {
    fn metadata(&self) -> Vec<(String, String)>;
}

/// Provider for servers that need no credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl AuthMetadata for NoAuth {
    fn metadata(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Connection to a Riva server plus the metadata used to authorize requests.
#[derive(Debug)]
pub struct Auth {
    config: ChannelConfig,
    trust: TrustMode,
    channel: Channel,
    provider: Arc<dyn AuthMetadata>,
}

impl Auth {
    /// Resolve `config` and open the channel, authorizing with [`NoAuth`].
    pub fn new(config: ChannelConfig) -> Result<Self> {
        Self::with_provider(config, NoAuth)
    }

    /// Resolve `config` and open the channel, authorizing with `provider`.
    ///
    /// The certificate path is expanded and, when present, read before the
    /// channel is created. A missing certificate fails the whole construction.
    pub fn with_provider(
        config: ChannelConfig,
        provider: impl AuthMetadata + 'static,
    ) -> Result<Self> {
        let config = config.resolved();
        let trust = TrustMode::resolve(config.ssl_cert.as_deref(), config.use_ssl)?;
        let channel =
            create_channel_with_trust(&trust, &config.uri, config.channel_options.as_ref())?;
        Ok(Self {
            config,
            trust,
            channel,
            provider: Arc::new(provider),
        })
    }

    /// Certificate path after `~` expansion, if one was given.
    pub fn ssl_cert(&self) -> Option<&Path> {
        self.config.ssl_cert.as_deref()
    }

    pub const fn use_ssl(&self) -> bool {
        self.config.use_ssl
    }

    pub fn uri(&self) -> &str {
        &self.config.uri
    }

    pub const fn channel_options(&self) -> Option<&ChannelOptions> {
        self.config.channel_options.as_ref()
    }

    pub const fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Whether the channel is encrypted.
    pub const fn is_secure(&self) -> bool {
        self.trust.is_secure()
    }

    pub const fn trust_mode(&self) -> &TrustMode {
        &self.trust
    }

    /// The channel to hand to generated clients. Clones share one connection.
    pub const fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Metadata to attach to every request made over [`Self::channel`].
    pub fn auth_metadata(&self) -> Vec<(String, String)> {
        self.provider.metadata()
    }

    /// Interceptor that attaches [`Self::auth_metadata`] to each request.
    ///
    /// ```ignore
    /// let client = RivaSpeechRecognitionClient::with_interceptor(
    ///     auth.channel().clone(),
    ///     auth.interceptor(),
    /// );
    /// ```
    pub fn interceptor(&self) -> AuthInterceptor {
        AuthInterceptor {
            provider: Arc::clone(&self.provider),
        }
    }
}

/// Adds the provider's metadata to outgoing requests.
#[derive(Debug, Clone)]
pub struct AuthInterceptor {
    provider: Arc<dyn AuthMetadata>,
}

impl Interceptor for AuthInterceptor {
    fn call(&mut self, mut req: Request<()>) -> std::result::Result<Request<()>, Status> {
        apply_metadata(req.metadata_mut(), self.provider.metadata())?;
        Ok(req)
    }
}

/// Append `pairs` to `map` in order. Repeated keys keep every value.
#[allow(clippy::result_large_err)]
fn apply_metadata(
    map: &mut MetadataMap,
    pairs: Vec<(String, String)>,
) -> std::result::Result<(), Status> {
    for (key, value) in pairs {
        let key: AsciiMetadataKey = key
            .parse()
            .map_err(|_| Status::internal(format!("Invalid auth metadata key: {key}")))?;
        let value: AsciiMetadataValue = value.parse().map_err(|_| {
            Status::internal(format!("Invalid auth metadata value for {}", key.as_str()))
        })?;
        map.append(key, value);
    }
    Ok(())
}
