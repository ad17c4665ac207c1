use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use url::Url;

use crate::error::{CypherpunkError, Result};

/// Parse and check a user-supplied RPC endpoint.
pub fn parse_endpoint(raw: &str, allowed_schemes: &[String]) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|err| CypherpunkError::validation(format!("{raw}: {err}")))?;

    if !allowed_schemes
        .iter()
        .any(|scheme| scheme.eq_ignore_ascii_case(url.scheme()))
    {
        return Err(CypherpunkError::validation(format!(
            "{raw}: scheme '{}' is not one of {}",
            url.scheme(),
            allowed_schemes.join(", ")
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(CypherpunkError::validation(format!("{raw}: missing host")));
    }

    Ok(url)
}

/// TCP reachability check against the endpoint's host and port.
pub fn check_reachable(raw: &str, timeout: Duration) -> Result<SocketAddr> {
    let url = Url::parse(raw.trim())
        .map_err(|err| CypherpunkError::validation(format!("{raw}: {err}")))?;

    let host = url
        .host_str()
        .ok_or_else(|| CypherpunkError::validation(format!("{raw}: missing host")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| CypherpunkError::validation(format!("{raw}: unknown port")))?;

    let refused = |reason: String| CypherpunkError::ConnectionRefused {
        url: raw.to_string(),
        reason,
    };

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|err| refused(err.to_string()))?
        .collect();

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => return Ok(addr),
            Err(err) => last_err = Some(err),
        }
    }

    Err(refused(
        last_err
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no addresses resolved".to_string()),
    ))
}
