//! gRPC channel construction.
//!
//! Channels are created lazily at the transport level: building one never
//! dials the server, so an unreachable address only fails on the first call.
//! A Tokio runtime must be running when a channel is created.

use std::path::Path;

use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tracing::info;

use crate::config::TrustMode;
use crate::error::{Error, Result};
use crate::options::ChannelOptions;

/// Build a channel to `uri`, secure when a certificate is given or
/// `use_ssl` is set.
///
/// A certificate path may start with `~` or `~user`. A missing or unreadable
/// certificate fails with [`Error::FileAccess`] before any channel exists.
///
/// `uri` is `host:port`, an `http://`/`https://` URI matching the channel
/// kind, or a `dns:` target (`dns:///host:port`, `dns://resolver/host:port`,
/// `dns:host:port`). The system resolver is always used; a resolver
/// authority is ignored. Other gRPC target schemes (`unix:`, `ipv4:`,
/// `ipv6:`, `xds:`) are rejected with [`Error::InvalidAddress`].
pub fn create_channel(
    ssl_cert: Option<&Path>,
    use_ssl: bool,
    uri: &str,
    options: Option<&ChannelOptions>,
) -> Result<Channel> {
    let trust = TrustMode::resolve(ssl_cert, use_ssl)?;
    create_channel_with_trust(&trust, uri, options)
}

/// Build a channel to `uri` for an already resolved [`TrustMode`].
pub fn create_channel_with_trust(
    trust: &TrustMode,
    uri: &str,
    options: Option<&ChannelOptions>,
) -> Result<Channel> {
    let mut endpoint = Endpoint::from_shared(endpoint_uri(uri, trust.is_secure())?)?;
    if let Some(options) = options {
        endpoint = options.apply_to_endpoint(endpoint);
    }

    let tls_config = match trust {
        TrustMode::Insecure => None,
        TrustMode::SecureDefaultRoots => Some(ClientTlsConfig::new().with_webpki_roots()),
        TrustMode::SecureWithCertificate(pem) => {
            Some(ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem)))
        }
    };
    if let Some(tls_config) = tls_config {
        let tls_config = match options {
            Some(options) => options.apply_to_tls(tls_config),
            None => tls_config,
        };
        endpoint = endpoint.tls_config(tls_config)?;
    }

    info!(uri, trust = ?trust, "Created gRPC channel");
    Ok(endpoint.connect_lazy())
}

/// Turn a `host:port` address into the URI tonic expects.
///
/// Addresses that already carry a scheme are kept, provided the scheme
/// agrees with the channel kind.
fn endpoint_uri(uri: &str, secure: bool) -> Result<String> {
    let wanted = if secure { "https" } else { "http" };
    let uri = strip_dns_scheme(uri);
    match uri.split_once("://") {
        None => Ok(format!("{wanted}://{uri}")),
        Some((scheme, _)) if scheme.eq_ignore_ascii_case(wanted) => Ok(uri.to_string()),
        Some((scheme, _)) => Err(Error::InvalidAddress(format!(
            "{uri}: scheme {scheme} does not match a {} channel",
            if secure { "secure" } else { "insecure" }
        ))),
    }
}

/// Reduce a gRPC `dns:` target to its `host:port` part.
fn strip_dns_scheme(uri: &str) -> &str {
    let rest = match uri.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("dns:") => &uri[4..],
        _ => return uri,
    };
    match rest.strip_prefix("//") {
        Some(target) => target.split_once('/').map_or(target, |(_, host)| host),
        None => rest,
    }
}
