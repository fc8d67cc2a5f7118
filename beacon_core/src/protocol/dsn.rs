/**
 * DSN parsing and endpoint derivation.
 *
 * A project is addressed by a DSN of the form
 *
 * ```text
 * https://<public_key>@<host>[:port][/path]/<project_id>
 * ```
 *
 * The flow:
 * 1. Receive the raw DSN string from the user.
 * 2. Parse it as a URL and pull out the public key and project id.
 * 3. Build the envelope endpoint: `<scheme>://<host>[:port][/path]/api/<project_id>/envelope/`
 * 4. Build the auth header value from the key and the client identifier.
 */
use std::fmt;

use url::Url;

use super::constants::{CLIENT_IDENTIFIER, PROTOCOL_VERSION};
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Dsn
// ---------------------------------------------------------------------------

/// A parsed DSN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    raw: String,
    scheme: String,
    public_key: String,
    host: String,
    port: Option<u16>,
    /// Path prefix before the project id, without trailing slash.
    path: String,
    project_id: String,
}

impl Dsn {
    /**
     * Parses a DSN string.
     *
     * # Returns
     * * `Ok(Dsn)` with all parts extracted.
     * * `Err(ConfigError::InvalidDsn)` if the URL is malformed, the scheme is
     *   not http(s), or the public key or project id is missing.
     */
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw.trim()).map_err(|e| ConfigError::invalid_dsn(e.to_string()))?;

        let scheme = url.scheme().to_string();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::invalid_dsn(format!("unsupported scheme `{scheme}`")));
        }

        let public_key = url.username().to_string();
        if public_key.is_empty() {
            return Err(ConfigError::invalid_dsn("missing public key"));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::invalid_dsn("missing host"))?
            .to_string();

        /*
         * The last non-empty path segment is the project id; anything before
         * it is a prefix the collector is mounted under.
         */
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let (project_id, prefix) = match segments.split_last() {
            Some((last, rest)) => (last.to_string(), rest.join("/")),
            None => return Err(ConfigError::invalid_dsn("missing project id")),
        };

        let path = if prefix.is_empty() { String::new() } else { format!("/{prefix}") };

        Ok(Self {
            raw: raw.trim().to_string(),
            scheme,
            public_key,
            host,
            port: url.port(),
            path,
            project_id,
        })
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// URL that envelopes are POSTed to.
    pub fn envelope_endpoint(&self) -> String {
        let port = self.port.map(|p| format!(":{p}")).unwrap_or_default();
        format!(
            "{}://{}{}{}/api/{}/envelope/",
            self.scheme, self.host, port, self.path, self.project_id
        )
    }

    /// Value of the auth header sent with every request.
    pub fn auth_header(&self) -> String {
        format!(
            "Sentry sentry_version={PROTOCOL_VERSION}, sentry_key={}, sentry_client={CLIENT_IDENTIFIER}",
            self.public_key
        )
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for Dsn {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
