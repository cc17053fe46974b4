//! Fallback candidates: remote addresses paired with local addresses.

use std::net::IpAddr;

use crate::network::{AddressFamily, LocalInterface};

/// One fallback attempt: connect to `remote` bound to `local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    /// Remote server address.
    pub remote: IpAddr,
    /// Name of the interface owning `local`.
    pub interface: &'a str,
    /// Local address to bind.
    pub local: IpAddr,
}

/// Pairs every remote address with every same-family address of every
/// usable interface.
///
/// Order is remote addresses first, then interfaces, then the addresses
/// on each interface. The iterator is lazy so a caller can stop at the
/// first candidate that connects.
pub fn candidates<'a>(
    remotes: &'a [IpAddr],
    interfaces: &'a [LocalInterface],
) -> impl Iterator<Item = Candidate<'a>> + 'a {
    remotes.iter().flat_map(move |&remote| {
        let family = AddressFamily::of(&remote);
        interfaces
            .iter()
            .filter(|iface| iface.is_usable())
            .flat_map(move |iface| {
                iface.addresses_of(family).map(move |local| Candidate {
                    remote,
                    interface: &iface.name,
                    local,
                })
            })
    })
}
