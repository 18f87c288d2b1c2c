//! SSDP wire format and socket setup.
//!
//! Only the subset the tracker needs: building M-SEARCH requests, reading
//! header blocks from responses and NOTIFY announcements, and binding
//! per-interface UDP sockets.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use local_ip_address::list_afinet_netifas;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::protocol_constants::{SSDP_MULTICAST_ADDR, SSDP_MULTICAST_TTL, SSDP_PORT};
use crate::utils::{contains_ignore_ascii_case, find_ignore_ascii_case};

use super::types::{is_virtual_interface, DiscoveryError, DiscoveryResult};

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// Start line of an SSDP datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsdpKind {
    /// `HTTP/1.1 200 OK` reply to an M-SEARCH.
    Response,
    /// Unsolicited `NOTIFY * HTTP/1.1` announcement.
    Notify,
    /// Another control point's `M-SEARCH`.
    Search,
}

/// A parsed SSDP datagram borrowing from the raw text.
#[derive(Debug, Clone)]
pub struct SsdpMessage<'a> {
    pub kind: SsdpKind,
    headers: Vec<(&'a str, &'a str)>,
}

impl<'a> SsdpMessage<'a> {
    /// Parses the start line and header block. Returns `None` for anything
    /// that is not an SSDP message.
    #[must_use]
    pub fn parse(text: &'a str) -> Option<Self> {
        let mut lines = text.lines();
        let start = lines.next()?.trim();
        let kind = if start.starts_with("HTTP/") {
            SsdpKind::Response
        } else if start.starts_with("NOTIFY ") {
            SsdpKind::Notify
        } else if start.starts_with("M-SEARCH ") {
            SsdpKind::Search
        } else {
            return None;
        };

        let headers = lines
            .take_while(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let (name, value) = line.split_once(':')?;
                Some((name.trim(), value.trim()))
            })
            .collect();

        Some(Self { kind, headers })
    }

    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }

    /// Whether this is an `ssdp:byebye` announcement.
    #[must_use]
    pub fn is_byebye(&self) -> bool {
        self.kind == SsdpKind::Notify
            && self
                .header("NTS")
                .is_some_and(|nts| nts.eq_ignore_ascii_case("ssdp:byebye"))
    }

    /// Whether the USN, ST or NT header mentions `target`.
    #[must_use]
    pub fn mentions(&self, target: &str) -> bool {
        ["USN", "ST", "NT"]
            .iter()
            .filter_map(|name| self.header(name))
            .any(|value| contains_ignore_ascii_case(value, target))
    }
}

/// Extracts the device identity from a USN header.
///
/// The identity is the text between `uuid:` and the following `::`, or the
/// rest of the value when there is no `::`.
#[must_use]
pub fn identity_from_usn(usn: &str) -> Option<String> {
    const MARKER: &str = "uuid:";
    let start = find_ignore_ascii_case(usn, MARKER)? + MARKER.len();
    let rest = &usn[start..];
    let identity = match rest.find("::") {
        Some(end) => &rest[..end],
        None => rest,
    }
    .trim();
    (!identity.is_empty()).then(|| identity.to_string())
}

/// Builds an M-SEARCH request for `search_target`.
///
/// HOST always names the multicast group, per SSDP.
#[must_use]
pub fn build_msearch_message(search_target: &str, mx: u8) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {SSDP_MULTICAST_ADDR}:{SSDP_PORT}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {mx}\r\n\
         ST: {search_target}\r\n\r\n"
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Interfaces & Sockets
// ─────────────────────────────────────────────────────────────────────────────

/// Network interface information for discovery.
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    /// Interface name (e.g., "en0", "eth0").
    pub name: String,
    /// IPv4 address bound to this interface.
    pub ip: Ipv4Addr,
}

/// Gets all usable network interfaces for discovery.
///
/// Filters out virtual/container interfaces and loopback.
pub fn get_interfaces() -> Vec<InterfaceInfo> {
    list_afinet_netifas()
        .unwrap_or_else(|e| {
            log::warn!("[Discovery] Failed to list network interfaces: {}", e);
            Vec::new()
        })
        .into_iter()
        .filter_map(|(name, addr)| {
            if is_virtual_interface(&name) {
                log::debug!("[Discovery] Skipping virtual interface: {}", name);
                return None;
            }
            match addr {
                IpAddr::V4(ip) if !ip.is_loopback() => {
                    log::debug!("[Discovery] Using interface {} ({})", name, ip);
                    Some(InterfaceInfo { name, ip })
                }
                _ => None,
            }
        })
        .collect()
}

fn new_udp_socket() -> DiscoveryResult<Socket> {
    Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(DiscoveryError::SocketBind)
}

fn set_reuse(socket: &Socket, label: &str) {
    if let Err(e) = socket.set_reuse_address(true) {
        log::warn!("[Discovery] Failed to set SO_REUSEADDR on {}: {}", label, e);
    }
    #[cfg(unix)]
    if let Err(e) = socket.set_reuse_port(true) {
        log::warn!("[Discovery] Failed to set SO_REUSEPORT on {}: {}", label, e);
    }
}

fn into_tokio(socket: Socket, bind_addr: SocketAddr) -> DiscoveryResult<UdpSocket> {
    socket
        .set_nonblocking(true)
        .map_err(DiscoveryError::SocketBind)?;
    socket
        .bind(&bind_addr.into())
        .map_err(DiscoveryError::SocketBind)?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(DiscoveryError::SocketBind)
}

/// Creates the M-SEARCH socket for one interface.
///
/// Bound to an ephemeral port on the interface address so unicast search
/// responses come back to it.
pub fn create_search_socket(iface_ip: Ipv4Addr) -> DiscoveryResult<UdpSocket> {
    let socket = new_udp_socket()?;
    let label = iface_ip.to_string();
    set_reuse(&socket, &label);
    if let Err(e) = socket.set_multicast_ttl_v4(SSDP_MULTICAST_TTL) {
        log::warn!("[Discovery] Failed to set multicast TTL on {}: {}", label, e);
    }
    if let Err(e) = socket.set_multicast_if_v4(&iface_ip) {
        log::warn!("[Discovery] Failed to set multicast interface {}: {}", label, e);
    }
    into_tokio(socket, SocketAddr::new(IpAddr::V4(iface_ip), 0))
}

/// Creates the shared `0.0.0.0:1900` listener and joins the SSDP group on
/// every interface, so NOTIFY announcements from all segments arrive.
pub fn create_notify_socket(interfaces: &[InterfaceInfo]) -> DiscoveryResult<UdpSocket> {
    let socket = new_udp_socket()?;
    set_reuse(&socket, "notify listener");
    let mut joined = 0usize;
    for iface in interfaces {
        match socket.join_multicast_v4(&SSDP_MULTICAST_ADDR, &iface.ip) {
            Ok(()) => joined += 1,
            Err(e) => log::warn!(
                "[Discovery] Failed to join {} on {} ({}): {}",
                SSDP_MULTICAST_ADDR,
                iface.name,
                iface.ip,
                e
            ),
        }
    }
    if joined == 0 {
        return Err(DiscoveryError::NoInterfaces);
    }
    into_tokio(
        socket,
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), SSDP_PORT),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
        CACHE-CONTROL: max-age=1800\r\n\
        EXT:\r\n\
        LOCATION: http://192.168.1.20:60006/upnp/desc/aios_device/aios_device.xml\r\n\
        SERVER: KnOS/3.2 UPnP/1.0 DMP/3.5\r\n\
        ST: urn:schemas-denon-com:device:ACT-DenonAVR:1\r\n\
        USN: uuid:AB12::urn:schemas-denon-com:device:ACT-DenonAVR:1\r\n\r\n";

    #[test]
    fn identity_is_text_between_uuid_and_double_colon() {
        assert_eq!(
            identity_from_usn("uuid:AB12::urn:schemas-denon-com:device:ACT-DenonAVR:1"),
            Some("AB12".to_string())
        );
    }

    #[test]
    fn identity_without_suffix_takes_the_rest() {
        assert_eq!(
            identity_from_usn("UUID:5f9ec1b3-ed59"),
            Some("5f9ec1b3-ed59".to_string())
        );
    }

    #[test]
    fn usn_without_uuid_has_no_identity() {
        assert_eq!(identity_from_usn("urn:schemas-upnp-org:device:Basic:1"), None);
        assert_eq!(identity_from_usn("uuid:::urn:x"), None);
    }

    #[test]
    fn parses_response_headers_case_insensitively() {
        let message = SsdpMessage::parse(RESPONSE).unwrap();
        assert_eq!(message.kind, SsdpKind::Response);
        assert_eq!(
            message.header("location"),
            Some("http://192.168.1.20:60006/upnp/desc/aios_device/aios_device.xml")
        );
        assert_eq!(message.header("Ext"), Some(""));
        assert!(message.mentions("urn:schemas-denon-com:device:act-denonavr:1"));
        assert!(!message.is_byebye());
    }

    #[test]
    fn parses_notify_and_byebye() {
        let alive = "NOTIFY * HTTP/1.1\r\n\
                     NT: upnp:rootdevice\r\n\
                     NTS: ssdp:alive\r\n\
                     USN: uuid:AB12::upnp:rootdevice\r\n\r\n";
        let message = SsdpMessage::parse(alive).unwrap();
        assert_eq!(message.kind, SsdpKind::Notify);
        assert!(!message.mentions("urn:schemas-denon-com:device:ACT-DenonAVR:1"));

        let bye = "NOTIFY * HTTP/1.1\r\nNTS: ssdp:byebye\r\n\r\n";
        assert!(SsdpMessage::parse(bye).unwrap().is_byebye());
    }

    #[test]
    fn recognises_other_searches_and_rejects_garbage() {
        let search = build_msearch_message("ssdp:all", 2);
        assert_eq!(SsdpMessage::parse(&search).unwrap().kind, SsdpKind::Search);
        assert!(SsdpMessage::parse("hello world").is_none());
        assert!(SsdpMessage::parse("").is_none());
    }

    #[test]
    fn msearch_names_target_and_mx() {
        let message = build_msearch_message("urn:schemas-denon-com:device:ACT-DenonAVR:1", 3);
        assert!(message.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(message.contains("HOST: 239.255.255.250:1900\r\n"));
        assert!(message.contains("MAN: \"ssdp:discover\"\r\n"));
        assert!(message.contains("MX: 3\r\n"));
        assert!(message.contains("ST: urn:schemas-denon-com:device:ACT-DenonAVR:1\r\n"));
        assert!(message.ends_with("\r\n\r\n"));
    }

    #[test]
    fn interfaces_exclude_loopback() {
        for iface in get_interfaces() {
            assert!(!iface.ip.is_loopback());
            assert!(!is_virtual_interface(&iface.name));
        }
    }
}
