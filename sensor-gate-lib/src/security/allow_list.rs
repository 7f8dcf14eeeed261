use ipnet::IpNet;
use std::net::IpAddr;
use tracing::error;

use crate::security::ClientAddress;

/// Static set of networks permitted to reach the service.
///
/// # Logic:
/// - No networks configured: every address is permitted
/// - Otherwise: permitted if the address falls in any configured network
/// - Unparseable address: never permitted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllowList {
    networks: Vec<IpNet>,
}

impl AllowList {
    pub fn new(networks: Vec<IpNet>) -> Self {
        Self { networks }
    }

    /// Build from configured range expressions.
    ///
    /// Each entry is parsed independently. An invalid entry is logged and
    /// skipped; it never fails the whole list.
    pub fn from_expressions<I, S>(expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let networks = expressions
            .into_iter()
            .filter_map(|expr| {
                let expr = expr.as_ref();
                match parse_network(expr) {
                    Ok(net) => Some(net),
                    Err(e) => {
                        error!(range = %expr, error = %e, "invalid allowed network ignored");
                        None
                    }
                }
            })
            .collect();
        Self { networks }
    }

    pub fn is_permitted(&self, address: &ClientAddress) -> bool {
        if self.networks.is_empty() {
            return true;
        }
        let ip = address.ip();
        self.networks.iter().any(|net| net.contains(&ip))
    }

    /// No configured networks means no restriction
    pub fn is_unrestricted(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn networks(&self) -> &[IpNet] {
        &self.networks
    }
}

/// Parse a range expression.
///
/// Accepts CIDR notation (host bits are allowed and masked off) and bare
/// addresses, which become a single-host network.
pub fn parse_network(expr: &str) -> Result<IpNet, String> {
    let expr = expr.trim();
    if let Ok(net) = expr.parse::<IpNet>() {
        return Ok(net.trunc());
    }
    match expr.parse::<IpAddr>() {
        Ok(ip) => {
            let ip = ip.to_canonical();
            let prefix = match ip {
                IpAddr::V4(_) => 32,
                IpAddr::V6(_) => 128,
            };
            IpNet::new(ip, prefix).map_err(|e| e.to_string())
        }
        Err(e) => Err(format!("not a network or address: {e}")),
    }
}
