//! Helpers for the absolute URLs a record points the runtime at.
//!
//! Only the scheme and authority are inspected; nothing here resolves
//! or contacts a host.

use anyhow::Result;

use crate::error::ConfigError;

/// Path the runtime's socket endpoint is mounted under.
pub const SOCKET_PATH: &str = "/socket";

/// Returns the lowercase scheme of an absolute URL (`https` for `https://host`).
pub fn url_scheme(url: &str) -> Option<String> {
    let (scheme, _) = url.split_once("://")?;
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
    {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}

/// Returns the authority of an absolute URL with userinfo stripped.
pub fn url_host(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let end = rest.find(|c: char| matches!(c, '/' | '?' | '#')).unwrap_or(rest.len());
    let authority = &rest[..end];
    let host = match authority.rfind('@') {
        Some(at) => &authority[at + 1..],
        None => authority,
    };
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Maps a server URL onto the socket endpoint on the same host.
///
/// `https` becomes `wss` and `http` becomes `ws`; host and port are kept.
pub fn derive_socket_url(server_url: &str) -> Result<String> {
    let socket_scheme = match url_scheme(server_url).as_deref() {
        Some("https") => "wss",
        Some("http") => "ws",
        _ => {
            return Err(ConfigError::UnsupportedScheme {
                url: server_url.to_string(),
                expected: "http or https",
            }
            .into())
        }
    };
    let host = url_host(server_url).ok_or_else(|| ConfigError::Invalid {
        problems: vec![format!("serverUrl has no host: {}", server_url)],
    })?;
    Ok(format!("{}://{}{}", socket_scheme, host, SOCKET_PATH))
}

pub(crate) fn is_http_url(url: &str) -> bool {
    matches!(url_scheme(url).as_deref(), Some("http" | "https")) && url_host(url).is_some()
}

pub(crate) fn is_socket_url(url: &str) -> bool {
    matches!(url_scheme(url).as_deref(), Some("ws" | "wss")) && url_host(url).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_strips_path_userinfo_and_query() {
        assert_eq!(
            url_host("wss://magpie-cogsciprag.fly.dev/socket"),
            Some("magpie-cogsciprag.fly.dev")
        );
        assert_eq!(
            url_host("https://user:pw@localhost:4000?x=1"),
            Some("localhost:4000")
        );
        assert_eq!(url_host("https://"), None);
        assert_eq!(url_host("stimuli/vignettes.csv"), None);
    }

    #[test]
    fn scheme_is_lowercased_and_checked() {
        assert_eq!(url_scheme("HTTPS://x").as_deref(), Some("https"));
        assert_eq!(url_scheme("://x"), None);
        assert_eq!(url_scheme("mailto:exprag@gmail.com"), None);
    }

    #[test]
    fn socket_url_uses_secure_scheme_for_https() {
        let socket = derive_socket_url("https://magpie-cogsciprag.fly.dev").expect("derive");
        assert_eq!(socket, "wss://magpie-cogsciprag.fly.dev/socket");
        assert!(socket.starts_with("wss://"));
        assert_eq!(url_host(&socket), Some("magpie-cogsciprag.fly.dev"));
    }

    #[test]
    fn socket_url_keeps_port_and_drops_path() {
        let socket = derive_socket_url("http://localhost:4000/api/").expect("derive");
        assert_eq!(socket, "ws://localhost:4000/socket");
    }

    #[test]
    fn socket_url_rejects_non_http_server() {
        let err = derive_socket_url("ftp://example.org").expect_err("should fail");
        assert!(
            err.to_string().contains("unsupported url scheme"),
            "unexpected error: {}",
            err
        );
    }
}
