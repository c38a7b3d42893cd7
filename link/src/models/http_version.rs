use serde::{Deserialize, Serialize};

/// HTTP protocol version used by the underlying reqwest client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpVersion {
    /// HTTP/1.1 only (maximum compatibility)
    #[default]
    Http1,
    /// HTTP/2 with prior knowledge
    Http2,
    /// Negotiate via ALPN
    Auto,
}

impl std::str::FromStr for HttpVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http1" | "http/1.1" | "1.1" => Ok(HttpVersion::Http1),
            "http2" | "http/2" | "2" => Ok(HttpVersion::Http2),
            "auto" => Ok(HttpVersion::Auto),
            other => Err(format!("unknown http version '{}'", other)),
        }
    }
}
