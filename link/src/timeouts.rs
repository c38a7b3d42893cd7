//! Timeout configuration for tryout-link client operations.
//!
//! Centralizes the timeouts applied to API requests, the token refresh call
//! and connection establishment.

use std::time::Duration;

/// Timeout configuration for client operations.
///
/// # Examples
///
/// ```rust
/// use tryout_link::TryoutLinkTimeouts;
/// use std::time::Duration;
///
/// // Use defaults (recommended for most cases)
/// let timeouts = TryoutLinkTimeouts::default();
///
/// // Custom timeouts for high-latency environments
/// let timeouts = TryoutLinkTimeouts::builder()
///     .connection_timeout(Duration::from_secs(60))
///     .receive_timeout(Duration::from_secs(120))
///     .build();
///
/// // Aggressive timeouts for local development
/// let timeouts = TryoutLinkTimeouts::fast();
/// ```
#[derive(Debug, Clone)]
pub struct TryoutLinkTimeouts {
    /// Timeout for establishing connections (TCP + TLS handshake).
    /// Default: 10 seconds
    pub connection_timeout: Duration,

    /// Timeout for a whole API request, from send until the body is read.
    /// Default: 30 seconds
    pub receive_timeout: Duration,

    /// Timeout for the token refresh call. Kept short so a hung refresh does
    /// not stall every request waiting on it.
    /// Default: 10 seconds
    pub refresh_timeout: Duration,
}

impl Default for TryoutLinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            receive_timeout: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(10),
        }
    }
}

impl TryoutLinkTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> TryoutLinkTimeoutsBuilder {
        TryoutLinkTimeoutsBuilder::new()
    }

    /// Shorter timeouts suitable for localhost backends.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            receive_timeout: Duration::from_secs(5),
            refresh_timeout: Duration::from_secs(3),
        }
    }

    /// Longer timeouts for high-latency or unreliable networks.
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            receive_timeout: Duration::from_secs(120),
            refresh_timeout: Duration::from_secs(30),
        }
    }
}

/// Builder for creating custom [`TryoutLinkTimeouts`] configurations.
#[derive(Debug, Clone)]
pub struct TryoutLinkTimeoutsBuilder {
    timeouts: TryoutLinkTimeouts,
}

impl TryoutLinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: TryoutLinkTimeouts::default(),
        }
    }

    /// Set the connection timeout (TCP + TLS handshake).
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    pub fn connection_timeout_secs(self, secs: u64) -> Self {
        self.connection_timeout(Duration::from_secs(secs))
    }

    /// Set the per-request timeout.
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.receive_timeout = timeout;
        self
    }

    pub fn receive_timeout_secs(self, secs: u64) -> Self {
        self.receive_timeout(Duration::from_secs(secs))
    }

    /// Set the token refresh timeout.
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.refresh_timeout = timeout;
        self
    }

    pub fn refresh_timeout_secs(self, secs: u64) -> Self {
        self.refresh_timeout(Duration::from_secs(secs))
    }

    /// Build the timeout configuration.
    pub fn build(self) -> TryoutLinkTimeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = TryoutLinkTimeouts::default();
        assert_eq!(timeouts.connection_timeout, Duration::from_secs(10));
        assert_eq!(timeouts.receive_timeout, Duration::from_secs(30));
        assert_eq!(timeouts.refresh_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder() {
        let timeouts = TryoutLinkTimeouts::builder()
            .connection_timeout_secs(60)
            .receive_timeout_secs(120)
            .refresh_timeout_secs(15)
            .build();

        assert_eq!(timeouts.connection_timeout, Duration::from_secs(60));
        assert_eq!(timeouts.receive_timeout, Duration::from_secs(120));
        assert_eq!(timeouts.refresh_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_presets() {
        let fast = TryoutLinkTimeouts::fast();
        assert!(fast.connection_timeout <= Duration::from_secs(5));

        let relaxed = TryoutLinkTimeouts::relaxed();
        assert!(relaxed.receive_timeout >= Duration::from_secs(60));
        assert!(relaxed.refresh_timeout > fast.refresh_timeout);
    }
}
