//! Minimal SSDP (UPnP) M-SEARCH client used by vendor discovery.

use super::{CameraError, Result};
use crate::interfaces::NetworkInterface;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;

/// Well-known SSDP multicast group and port
pub const SSDP_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900);

const RECV_BUFFER: usize = 2048;

/// One unicast answer to an M-SEARCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsdpResponse {
    pub location: String,
    pub server: String,
    pub st: String,
}

/// Build the M-SEARCH datagram for a search target.
pub fn search_request(search_target: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 1\r\n\
         ST: {}\r\n\
         \r\n",
        SSDP_ADDR, search_target
    )
}

/// Parse an SSDP response. Returns `None` for anything that is not a
/// `200 OK` carrying a `LOCATION` header.
pub fn parse_response(text: &str) -> Option<SsdpResponse> {
    let mut lines = text.lines();
    let status = lines.next()?.trim();
    let mut parts = status.split_whitespace();
    if !parts.next()?.to_ascii_uppercase().starts_with("HTTP/") || parts.next()? != "200" {
        return None;
    }

    let mut location = None;
    let mut server = String::new();
    let mut st = String::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match name.trim().to_ascii_lowercase().as_str() {
            "location" => location = Some(value),
            "server" => server = value,
            "st" => st = value,
            _ => {}
        }
    }

    Some(SsdpResponse {
        location: location?,
        server,
        st,
    })
}

/// Multicast one M-SEARCH out of `interface` and collect answers for `window`.
///
/// The socket is bound to the interface's IPv4 address so the query leaves
/// through that interface.
pub async fn m_search(
    interface: &NetworkInterface,
    search_target: &str,
    window: Duration,
) -> Result<Vec<SsdpResponse>> {
    let local = interface.ipv4.ok_or_else(|| {
        CameraError::Discovery(format!("interface {} has no IPv4 address", interface.name))
    })?;

    let socket = UdpSocket::bind(SocketAddrV4::new(local, 0))
        .await
        .map_err(CameraError::discovery)?;
    socket
        .send_to(search_request(search_target).as_bytes(), SSDP_ADDR)
        .await
        .map_err(CameraError::discovery)?;

    let deadline = Instant::now() + window;
    let mut buf = [0u8; RECV_BUFFER];
    let mut responses: Vec<SsdpResponse> = Vec::new();

    loop {
        match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Err(_) => break,
            Ok(Err(e)) => return Err(CameraError::discovery(e)),
            Ok(Ok((len, from))) => {
                let text = String::from_utf8_lossy(&buf[..len]);
                match parse_response(&text) {
                    Some(resp) if !responses.iter().any(|r| r.location == resp.location) => {
                        log::debug!("SSDP answer from {}: {}", from, resp.location);
                        responses.push(resp);
                    }
                    Some(_) => {}
                    None => log::trace!("Ignoring non-SSDP datagram from {}", from),
                }
            }
        }
    }

    Ok(responses)
}

/// Host part of a `LOCATION` URL (`http://192.168.54.1:60606/desc.xml` -> `192.168.54.1`).
pub fn location_host(location: &str) -> Option<String> {
    let url = reqwest::Url::parse(location).ok()?;
    url.host_str().map(|h| h.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LUMIX_ANSWER: &str = "HTTP/1.1 200 OK\r\n\
        CACHE-CONTROL: max-age=1800\r\n\
        Location: http://192.168.54.1:60606/Server0/ddd\r\n\
        SERVER: Linux/2.6 UPnP/1.0 Panasonic-UPnP-MW/1.0\r\n\
        ST: urn:schemas-upnp-org:service:ContentDirectory:1\r\n\
        \r\n";

    #[test]
    fn test_search_request_format() {
        let req = search_request("urn:schemas-sony-com:service:ScalarWebAPI:1");
        assert!(req.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(req.contains("HOST: 239.255.255.250:1900\r\n"));
        assert!(req.contains("MAN: \"ssdp:discover\"\r\n"));
        assert!(req.contains("ST: urn:schemas-sony-com:service:ScalarWebAPI:1\r\n"));
        assert!(req.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_parse_response_headers_case_insensitive() {
        let resp = parse_response(LUMIX_ANSWER).unwrap();
        assert_eq!(resp.location, "http://192.168.54.1:60606/Server0/ddd");
        assert!(resp.server.contains("Panasonic-UPnP"));
        assert_eq!(resp.st, "urn:schemas-upnp-org:service:ContentDirectory:1");
    }

    #[test]
    fn test_parse_response_rejects_requests_and_errors() {
        assert!(parse_response(&search_request("ssdp:all")).is_none());
        assert!(parse_response("HTTP/1.1 404 Not Found\r\n\r\n").is_none());
        assert!(parse_response("HTTP/1.1 200 OK\r\nSERVER: x\r\n\r\n").is_none());
    }

    #[test]
    fn test_location_host() {
        assert_eq!(
            location_host("http://192.168.54.1:60606/Server0/ddd").as_deref(),
            Some("192.168.54.1")
        );
        assert_eq!(location_host("not a url"), None);
    }

    #[tokio::test]
    async fn test_m_search_requires_ipv4() {
        let iface = NetworkInterface {
            name: "wlan9".to_string(),
            ipv4: None,
        };
        let err = m_search(&iface, "ssdp:all", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, CameraError::Discovery(_)));
    }
}
