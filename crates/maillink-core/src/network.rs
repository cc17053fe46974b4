//! Name resolution and local interface enumeration.

use std::future::Future;
use std::io;
use std::net::IpAddr;

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4.
    V4,
    /// IPv6.
    V6,
}

impl AddressFamily {
    /// Returns the family of an address.
    #[must_use]
    pub const fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }
}

/// A local network interface and its addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    /// Interface name, e.g. `eth0` or `wlan0`.
    pub name: String,
    /// Interface is administratively up.
    pub is_up: bool,
    /// Interface is a loopback device.
    pub is_loopback: bool,
    /// Addresses assigned to the interface.
    pub addresses: Vec<IpAddr>,
}

impl LocalInterface {
    /// Creates an interface that is up and not loopback.
    #[must_use]
    pub fn up(name: impl Into<String>, addresses: Vec<IpAddr>) -> Self {
        Self {
            name: name.into(),
            is_up: true,
            is_loopback: false,
            addresses,
        }
    }

    /// Returns true if the interface can carry a fallback connection.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.is_up && !self.is_loopback
    }

    /// Returns the addresses of one family, in assignment order.
    pub fn addresses_of(&self, family: AddressFamily) -> impl Iterator<Item = IpAddr> + '_ {
        self.addresses
            .iter()
            .copied()
            .filter(move |addr| AddressFamily::of(addr) == family)
    }
}

/// Access to the host's network stack.
pub trait NetworkStack: Send + Sync {
    /// Resolves all addresses of `host`, in resolver order.
    fn resolve(&self, host: &str) -> impl Future<Output = io::Result<Vec<IpAddr>>> + Send;

    /// Enumerates local interfaces, in system order.
    ///
    /// # Errors
    ///
    /// Returns an error if the interfaces cannot be listed.
    fn interfaces(&self) -> io::Result<Vec<LocalInterface>>;

    /// Returns this machine's own address in the given family.
    ///
    /// # Errors
    ///
    /// Returns an error if no such address exists.
    fn local_address(&self, family: AddressFamily) -> io::Result<IpAddr>;
}

/// The operating system's network stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNetwork;

impl NetworkStack for SystemNetwork {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let mut addresses: Vec<IpAddr> = Vec::new();
        for addr in tokio::net::lookup_host((host, 0)).await? {
            if !addresses.contains(&addr.ip()) {
                addresses.push(addr.ip());
            }
        }
        Ok(addresses)
    }

    fn interfaces(&self) -> io::Result<Vec<LocalInterface>> {
        Ok(netdev::get_interfaces()
            .into_iter()
            .map(|iface| LocalInterface {
                is_up: iface.is_up(),
                is_loopback: iface.is_loopback(),
                addresses: iface
                    .ipv4
                    .iter()
                    .map(|net| IpAddr::V4(net.addr()))
                    .chain(iface.ipv6.iter().map(|net| IpAddr::V6(net.addr())))
                    .collect(),
                name: iface.name,
            })
            .collect())
    }

    fn local_address(&self, family: AddressFamily) -> io::Result<IpAddr> {
        self.interfaces()?
            .iter()
            .filter(|iface| iface.is_usable())
            .find_map(|iface| iface.addresses_of(family).next())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no local {family:?} address"),
                )
            })
    }
}

/// Formats an address as an SMTP address literal (RFC 5321 section 4.1.3).
///
/// `[192.0.2.1]` for IPv4, `[IPv6:2001:db8::1]` for IPv6.
#[must_use]
pub fn address_literal(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => format!("[{v4}]"),
        IpAddr::V6(v6) => format!("[IPv6:{v6}]"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_address_literal() {
        assert_eq!(address_literal("192.0.2.7".parse().unwrap()), "[192.0.2.7]");
        assert_eq!(
            address_literal("2001:db8::7".parse().unwrap()),
            "[IPv6:2001:db8::7]"
        );
    }

    #[test]
    fn test_interface_usability() {
        let mut iface = LocalInterface::up("eth0", vec!["192.0.2.1".parse().unwrap()]);
        assert!(iface.is_usable());
        iface.is_loopback = true;
        assert!(!iface.is_usable());
        iface.is_loopback = false;
        iface.is_up = false;
        assert!(!iface.is_usable());
    }

    #[test]
    fn test_addresses_of_family() {
        let iface = LocalInterface::up(
            "wlan0",
            vec![
                "fe80::1".parse().unwrap(),
                "10.0.0.2".parse().unwrap(),
                "2001:db8::2".parse().unwrap(),
            ],
        );
        let v6: Vec<IpAddr> = iface.addresses_of(AddressFamily::V6).collect();
        assert_eq!(v6, vec!["fe80::1".parse::<IpAddr>().unwrap(), "2001:db8::2".parse().unwrap()]);
        assert_eq!(iface.addresses_of(AddressFamily::V4).count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_literal() {
        let addresses = SystemNetwork.resolve("127.0.0.1").await.unwrap();
        assert_eq!(addresses, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_system_interfaces_enumerate() {
        // Contents depend on the host; only the call itself is checked.
        assert!(SystemNetwork.interfaces().is_ok());
    }
}
