//! Derived control-channel credentials
//!
//! The daemon and the control client talk over either a unix socket or a
//! local HTTP port. Unless the project configures them, the port, username
//! and password are derived from the project secret with SHA-256, so they
//! are stable for one project and differ between projects.

use sha2::{Digest, Sha256};
use sup_ini::IniDocument;

use super::defaults::RPCINTERFACE_FACTORY;
use super::effective::ConfigError;

pub const UNIX_SERVER_SECTION: &str = "unix_http_server";
pub const INET_SERVER_SECTION: &str = "inet_http_server";
pub const CLIENT_SECTION: &str = "supervisorctl";
pub const RPCINTERFACE_SECTION: &str = "rpcinterface:supervisor";
pub const RPCINTERFACE_OPTION: &str = "supervisor.rpcinterface_factory";

/// Lowest derived port; derived ports fall in `[BASE_PORT, BASE_PORT + 1000)`.
pub const BASE_PORT: u16 = 9000;

/// Host the derived HTTP server binds to.
pub const LOCALHOST: &str = "127.0.0.1";

/// Credentials and port derived from the project secret
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedSecurityParams {
    pub username: String,
    pub password: String,
    pub port: u16,
}

impl std::fmt::Debug for DerivedSecurityParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedSecurityParams")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("port", &self.port)
            .finish()
    }
}

fn derive(secret: &str, label: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update([0u8]);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

impl DerivedSecurityParams {
    /// Derive parameters from the project secret
    pub fn derive(secret: &str) -> Self {
        let username = derive(secret, "username")[..12].to_string();
        let password = derive(secret, "password");
        let port_hash = derive(secret, "port");
        // 16 bits of the hash, reduced into the port window.
        let raw = u16::from_str_radix(&port_hash[..4], 16).unwrap_or(0);
        let port = BASE_PORT + raw % 1000;

        Self {
            username,
            password,
            port,
        }
    }

    /// `host:port` value for `inet_http_server.port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", LOCALHOST, self.port)
    }
}

/// Resolved control channel
#[derive(Clone, PartialEq, Eq)]
pub struct ControlChannel {
    /// `unix:///path` or `http://host:port`
    pub server_url: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ControlChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlChannel")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Configure the server and client control sections.
///
/// A user-supplied `unix_http_server` governs the channel and must name its
/// socket `file`. Otherwise `inet_http_server` is used (and synthesized when
/// absent). Only missing options are filled; the client section receives the
/// server's effective credentials so both sides always agree. An
/// `inet_http_server` declared alongside the unix socket is filled with the
/// same credentials.
pub fn apply_control_channel(
    doc: &mut IniDocument,
    params: &DerivedSecurityParams,
) -> Result<ControlChannel, ConfigError> {
    let (server_section, server_url) = if doc.has_section(UNIX_SERVER_SECTION) {
        let file = doc
            .get(UNIX_SERVER_SECTION, "file")
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "[{}]: no socket path configured (set 'file')",
                    UNIX_SERVER_SECTION
                ))
            })?
            .to_string();
        (UNIX_SERVER_SECTION, format!("unix://{}", file))
    } else {
        doc.set_if_missing(INET_SERVER_SECTION, "port", &params.bind_address());
        let addr = doc
            .get(INET_SERVER_SECTION, "port")
            .unwrap_or_default()
            .trim()
            .to_string();
        (INET_SERVER_SECTION, format!("http://{}", addr))
    };

    doc.set_if_missing(server_section, "username", &params.username);
    doc.set_if_missing(server_section, "password", &params.password);
    let username = doc.get(server_section, "username").unwrap_or_default().to_string();
    let password = doc.get(server_section, "password").unwrap_or_default().to_string();

    // A secondary inet listener next to the unix socket gets the same login.
    if server_section == UNIX_SERVER_SECTION && doc.has_section(INET_SERVER_SECTION) {
        doc.set_if_missing(INET_SERVER_SECTION, "username", &username);
        doc.set_if_missing(INET_SERVER_SECTION, "password", &password);
    }

    doc.set_if_missing(CLIENT_SECTION, "serverurl", &server_url);
    doc.set_if_missing(CLIENT_SECTION, "username", &username);
    doc.set_if_missing(CLIENT_SECTION, "password", &password);
    doc.set_if_missing(RPCINTERFACE_SECTION, RPCINTERFACE_OPTION, RPCINTERFACE_FACTORY);

    let channel = ControlChannel {
        server_url: doc
            .get(CLIENT_SECTION, "serverurl")
            .unwrap_or(server_url.as_str())
            .to_string(),
        username: doc.get(CLIENT_SECTION, "username").unwrap_or_default().to_string(),
        password: doc.get(CLIENT_SECTION, "password").unwrap_or_default().to_string(),
    };

    if channel.username != username || channel.password != password {
        return Err(ConfigError::ValidationError(format!(
            "[{}] credentials do not match [{}]",
            CLIENT_SECTION, server_section
        )));
    }

    Ok(channel)
}
