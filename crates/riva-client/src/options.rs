//! Channel options.
//!
//! Options are gRPC channel-argument pairs (`grpc.keepalive_time_ms`,
//! `grpc.max_receive_message_length`, ...). They are stored verbatim and in
//! order. The keys tonic can honour at the endpoint level are applied when a
//! channel is built; everything else is carried along untouched.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tonic::transport::{ClientTlsConfig, Endpoint};
use tracing::{debug, warn};

/// HTTP/2 keep-alive ping interval, in milliseconds.
pub const KEEPALIVE_TIME_MS: &str = "grpc.keepalive_time_ms";
/// Keep-alive ping acknowledgement timeout, in milliseconds.
pub const KEEPALIVE_TIMEOUT_MS: &str = "grpc.keepalive_timeout_ms";
/// Send keep-alive pings while no call is in flight (`0` or `1`).
pub const KEEPALIVE_PERMIT_WITHOUT_CALLS: &str = "grpc.keepalive_permit_without_calls";
/// User agent sent with every request.
pub const PRIMARY_USER_AGENT: &str = "grpc.primary_user_agent";
/// Server name checked against the certificate instead of the address host.
pub const SSL_TARGET_NAME_OVERRIDE: &str = "grpc.ssl_target_name_override";
/// Largest message the client accepts, in bytes.
pub const MAX_RECEIVE_MESSAGE_LENGTH: &str = "grpc.max_receive_message_length";
/// Largest message the client sends, in bytes.
pub const MAX_SEND_MESSAGE_LENGTH: &str = "grpc.max_send_message_length";

/// Ordered list of `(key, value)` channel arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelOptions(Vec<(String, String)>);

impl ChannelOptions {
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append an option, keeping insertion order.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Value for `key`. When a key is repeated the last occurrence wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Receive limit for the stub layer (`max_decoding_message_size`).
    pub fn max_receive_message_length(&self) -> Option<usize> {
        self.parsed(MAX_RECEIVE_MESSAGE_LENGTH)
    }

    /// Send limit for the stub layer (`max_encoding_message_size`).
    pub fn max_send_message_length(&self) -> Option<usize> {
        self.parsed(MAX_SEND_MESSAGE_LENGTH)
    }

    /// Apply the endpoint-level options to `endpoint`.
    pub(crate) fn apply_to_endpoint(&self, mut endpoint: Endpoint) -> Endpoint {
        for (key, value) in self.iter() {
            match key {
                KEEPALIVE_TIME_MS => {
                    if let Some(ms) = parse_value::<u64>(key, value) {
                        endpoint = endpoint.http2_keep_alive_interval(Duration::from_millis(ms));
                    }
                }
                KEEPALIVE_TIMEOUT_MS => {
                    if let Some(ms) = parse_value::<u64>(key, value) {
                        endpoint = endpoint.keep_alive_timeout(Duration::from_millis(ms));
                    }
                }
                KEEPALIVE_PERMIT_WITHOUT_CALLS => {
                    if let Some(flag) = parse_flag(key, value) {
                        endpoint = endpoint.keep_alive_while_idle(flag);
                    }
                }
                PRIMARY_USER_AGENT => match endpoint.clone().user_agent(value.to_string()) {
                    Ok(with_agent) => endpoint = with_agent,
                    Err(e) => warn!(key, value, error = %e, "Ignoring invalid user agent"),
                },
                // Consumed by the TLS config or the stub layer.
                SSL_TARGET_NAME_OVERRIDE | MAX_RECEIVE_MESSAGE_LENGTH | MAX_SEND_MESSAGE_LENGTH => {}
                _ => debug!(key, value, "Channel option not applied at endpoint level"),
            }
        }
        endpoint
    }

    /// Apply TLS-only options to `tls`.
    pub(crate) fn apply_to_tls(&self, tls: ClientTlsConfig) -> ClientTlsConfig {
        match self.get(SSL_TARGET_NAME_OVERRIDE) {
            Some(domain) => tls.domain_name(domain),
            None => tls,
        }
    }

    fn parsed(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|value| parse_value(key, value))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ChannelOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<Vec<(String, String)>> for ChannelOptions {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value, "Ignoring channel option with invalid value");
            None
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => {
            warn!(key, value, "Ignoring channel option with invalid value");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let opts = ChannelOptions::new()
            .with("b", "2")
            .with("a", "1")
            .with("c", "3");
        let keys: Vec<_> = opts.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["b", "a", "c"]);
        assert_eq!(opts.len(), 3);
    }

    #[test]
    fn last_duplicate_wins() {
        let opts: ChannelOptions = [
            (MAX_RECEIVE_MESSAGE_LENGTH, "1024"),
            (MAX_RECEIVE_MESSAGE_LENGTH, "4096"),
        ]
        .into_iter()
        .collect();
        assert_eq!(opts.max_receive_message_length(), Some(4096));
        // Both entries are still kept verbatim.
        assert_eq!(opts.len(), 2);
    }

    #[test]
    fn message_limits() {
        let opts = ChannelOptions::new()
            .with(MAX_RECEIVE_MESSAGE_LENGTH, "52428800")
            .with(MAX_SEND_MESSAGE_LENGTH, "not-a-number");
        assert_eq!(opts.max_receive_message_length(), Some(50 * 1024 * 1024));
        assert_eq!(opts.max_send_message_length(), None);
        assert_eq!(ChannelOptions::new().max_receive_message_length(), None);
    }

    #[test]
    fn flag_values() {
        assert_eq!(parse_flag("k", "1"), Some(true));
        assert_eq!(parse_flag("k", "false"), Some(false));
        assert_eq!(parse_flag("k", "yes"), None);
    }

    #[test]
    fn endpoint_accepts_known_and_unknown_keys() {
        let opts = ChannelOptions::new()
            .with(KEEPALIVE_TIME_MS, "30000")
            .with(KEEPALIVE_TIMEOUT_MS, "bogus")
            .with(KEEPALIVE_PERMIT_WITHOUT_CALLS, "1")
            .with(PRIMARY_USER_AGENT, "riva-client-test")
            .with("grpc.lb_policy_name", "round_robin");
        let endpoint = Endpoint::from_static("http://localhost:50051");
        let endpoint = opts.apply_to_endpoint(endpoint);
        assert_eq!(endpoint.uri().host(), Some("localhost"));
    }

    #[test]
    fn invalid_user_agent_is_skipped() {
        let opts = ChannelOptions::new()
            .with(PRIMARY_USER_AGENT, "bad\nagent")
            .with(KEEPALIVE_TIME_MS, "30000");
        let endpoint = opts.apply_to_endpoint(Endpoint::from_static("http://localhost:50051"));
        assert_eq!(endpoint.uri().host(), Some("localhost"));
    }

    #[test]
    fn serde_as_pair_list() {
        let opts: ChannelOptions =
            serde_json::from_str(r#"[["grpc.keepalive_time_ms", "10000"]]"#).unwrap();
        assert_eq!(opts.get(KEEPALIVE_TIME_MS), Some("10000"));
        assert_eq!(
            serde_json::to_string(&opts).unwrap(),
            r#"[["grpc.keepalive_time_ms","10000"]]"#
        );
    }
}
