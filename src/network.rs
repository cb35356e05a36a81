use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use ts_rs::TS;
use utoipa::ToSchema;

/// HostResolver
///
/// Supplies the host part of the public base URL. Resolved once at startup.
pub trait HostResolver: Send + Sync {
    fn resolve_host(&self) -> String;
}

/// Always answers the configured host (`SERVER_HOST`, or a fixed value in tests).
pub struct FixedResolver(pub String);

impl HostResolver for FixedResolver {
    fn resolve_host(&self) -> String {
        self.0.clone()
    }
}

/// ProbeResolver
///
/// Asks the kernel which local address it would route from, via connected UDP
/// sockets (nothing is sent). One unicast host per private range is probed next to a
/// public one, so that a LAN address can win over a public one. Broadcast targets are
/// avoided: `connect()` to them fails without `SO_BROADCAST`.
pub struct ProbeResolver {
    targets: Vec<&'static str>,
}

const PROBE_TARGETS: [&str; 4] = ["192.168.0.1:9", "10.0.0.1:9", "172.16.0.1:9", "8.8.8.8:80"];

impl Default for ProbeResolver {
    fn default() -> Self {
        Self {
            targets: PROBE_TARGETS.to_vec(),
        }
    }
}

impl ProbeResolver {
    fn probe(target: &str) -> Option<Ipv4Addr> {
        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect(target).ok()?;
        match socket.local_addr().ok()?.ip() {
            IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
            _ => None,
        }
    }
}

impl HostResolver for ProbeResolver {
    fn resolve_host(&self) -> String {
        let candidates: Vec<Ipv4Addr> = self.targets.iter().filter_map(|t| Self::probe(t)).collect();
        select_host(&candidates).to_string()
    }
}

/// Private range first, then any non-loopback address, then loopback.
pub fn select_host(candidates: &[Ipv4Addr]) -> Ipv4Addr {
    candidates
        .iter()
        .find(|ip| ip.is_private())
        .or_else(|| candidates.iter().find(|ip| !ip.is_loopback()))
        .copied()
        .unwrap_or(Ipv4Addr::LOCALHOST)
}

/// ServerInfo
///
/// Process-wide, immutable after startup. Every file URL in a response is built from it.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub server_ip: String,
    pub port: u16,
    pub base_url: String,
}

impl ServerInfo {
    pub fn resolve(resolver: &dyn HostResolver, port: u16) -> Self {
        let server_ip = resolver.resolve_host();
        let base_url = format!("http://{}:{}", server_ip, port);
        Self {
            server_ip,
            port,
            base_url,
        }
    }

    /// `<base_url>/<relative_path>`, or an empty string when nothing is stored.
    pub fn absolute_url(&self, relative_path: &str) -> String {
        if relative_path.is_empty() {
            return String::new();
        }
        format!("{}/{}", self.base_url, relative_path.trim_start_matches('/'))
    }

    pub fn snapshot(&self) -> ServerInfoResponse {
        ServerInfoResponse {
            server_ip: self.server_ip.clone(),
            base_url: self.base_url.clone(),
            port: self.port,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ServerInfoResponse {
    pub server_ip: String,
    pub base_url: String,
    pub port: u16,
    pub timestamp: String,
}
