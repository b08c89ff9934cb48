use std::sync::Arc;

use thiserror::Error;

use crate::sender::{self, NonBlockingSender};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8125;

/// Errors that could occur while configuring or installing a sender.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to parse the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the parsing failure.
        reason: String,
    },

    /// A process-wide sender already exists, either installed explicitly or
    /// constructed lazily by an earlier client.
    #[error("a process-wide statsd sender is already installed")]
    AlreadyInstalled,
}

/// Builder for a non-blocking statsd sender.
pub struct StatsdBuilder {
    host: String,
    port: u16,
}

impl StatsdBuilder {
    /// Set the remote address to deliver metrics to.
    ///
    /// The address must be in `<host>:<port>` form. The host part is either
    /// a literal IP address, used as-is, or a DNS name resolved exactly once
    /// when the sender is built.
    ///
    /// Defaults to sending to `127.0.0.1:8125`.
    ///
    /// # Errors
    ///
    /// If the given address cannot be split into a host and a valid port, an
    /// error is returned indicating the reason. Whether the host actually
    /// resolves is not checked here; that happens when the sender is built,
    /// and a resolution failure produces an unhealthy sender rather than an
    /// error.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        let addr = addr.as_ref();
        let (host, port) =
            addr.rsplit_once(':').ok_or_else(|| BuildError::InvalidRemoteAddress {
                reason: format!("'{addr}' is missing a ':<port>' suffix"),
            })?;
        let port = port.parse::<u16>().map_err(|e| BuildError::InvalidRemoteAddress {
            reason: format!("invalid port in '{addr}': {e}"),
        })?;

        self.host = host.to_string();
        self.port = port;
        Ok(self)
    }

    /// Builds the sender and starts its delivery worker.
    ///
    /// If the destination cannot be resolved or the socket cannot be
    /// created, the returned sender is permanently unhealthy: the cause is
    /// logged once and every line handed to it is dropped. That state is
    /// never an error observable by metric-emitting code.
    pub fn build(self) -> NonBlockingSender {
        NonBlockingSender::new(&self.host, self.port)
    }

    /// Builds the sender and installs it as the process-wide instance used
    /// by [`StatsdClient::new`](crate::StatsdClient::new).
    ///
    /// # Errors
    ///
    /// Fails if a process-wide sender already exists. Install before the
    /// first `StatsdClient::new` call, which otherwise lazily constructs
    /// one with the default configuration.
    pub fn install(self) -> Result<(), BuildError> {
        sender::install_global(Arc::new(self.build()))
    }
}

impl Default for StatsdBuilder {
    fn default() -> Self {
        StatsdBuilder { host: DEFAULT_HOST.to_string(), port: DEFAULT_PORT }
    }
}

#[cfg(test)]
mod tests {
    use super::StatsdBuilder;

    #[test]
    fn default_remote_address() {
        let builder = StatsdBuilder::default();
        assert_eq!(builder.host, "127.0.0.1");
        assert_eq!(builder.port, 8125);
    }

    #[test]
    fn remote_address_parsing() {
        let builder = StatsdBuilder::default()
            .with_remote_address("statsd.internal:9125")
            .expect("host:port must parse");
        assert_eq!(builder.host, "statsd.internal");
        assert_eq!(builder.port, 9125);
    }

    #[test]
    fn remote_address_without_port_is_rejected() {
        assert!(StatsdBuilder::default().with_remote_address("statsd.internal").is_err());
        assert!(StatsdBuilder::default().with_remote_address("statsd.internal:nope").is_err());
    }
}
