use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;

mod diff;
mod error;
pub use diff::*;
pub use error::*;

/// Maximum interface name length including the terminating NUL.
pub const IF_NAMESIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteChange {
    Add(RouteEntry),
    Delete(RouteEntry),
}

/// Name of an outgoing network interface, e.g. `eth0`.
///
/// The name is kept NUL-terminated in a fixed buffer of [`IF_NAMESIZE`]
/// bytes, which is the layout the kernel expects in a route request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IfName {
    buf: [u8; IF_NAMESIZE],
}

impl IfName {
    pub fn new(name: &str) -> Result<Self> {
        let invalid = |reason: &'static str| RouteError::InvalidInterfaceName {
            name: name.to_string(),
            reason,
        };
        if name.is_empty() {
            return Err(invalid("empty"));
        }
        if name.len() >= IF_NAMESIZE {
            return Err(invalid("longer than 15 bytes"));
        }
        if name
            .bytes()
            .any(|b| b == 0 || b == b'/' || b.is_ascii_whitespace())
        {
            return Err(invalid("contains NUL, '/' or whitespace"));
        }
        let mut buf = [0u8; IF_NAMESIZE];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self { buf })
    }
    pub fn len(&self) -> usize {
        self.buf.iter().position(|&b| b == 0).unwrap_or(IF_NAMESIZE)
    }
    pub fn is_empty(&self) -> bool {
        self.buf[0] == 0
    }
    pub fn as_str(&self) -> &str {
        // validated as UTF-8 in `new`
        std::str::from_utf8(&self.buf[..self.len()]).unwrap_or_default()
    }
    /// The name followed by NUL padding, as handed to the kernel.
    pub fn as_bytes_with_nul(&self) -> &[u8; IF_NAMESIZE] {
        &self.buf
    }
}

impl std::str::FromStr for IfName {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self> {
        IfName::new(s)
    }
}

impl TryFrom<&str> for IfName {
    type Error = RouteError;

    fn try_from(value: &str) -> Result<Self> {
        IfName::new(value)
    }
}

impl fmt::Debug for IfName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for IfName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One IPv4 route: destination network, mask, next hop and egress interface.
///
/// A `next_hop` of `0.0.0.0` describes a directly attached route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteEntry {
    pub(crate) destination: Ipv4Addr,
    pub(crate) mask: Ipv4Addr,
    pub(crate) next_hop: Ipv4Addr,
    pub(crate) if_name: IfName,
}
impl RouteEntry {
    pub fn destination(&self) -> Ipv4Addr {
        self.destination
    }
    pub fn mask(&self) -> Ipv4Addr {
        self.mask
    }
    pub fn next_hop(&self) -> Ipv4Addr {
        self.next_hop
    }
    pub fn if_name(&self) -> &IfName {
        &self.if_name
    }
}
impl RouteEntry {
    pub fn new(destination: Ipv4Addr, mask: Ipv4Addr, if_name: IfName) -> Self {
        Self {
            destination,
            mask,
            next_hop: Ipv4Addr::UNSPECIFIED,
            if_name,
        }
    }
    /// Builds an entry from a prefix length, e.g. `10.0.0.0/8`.
    /// Returns `None` when `prefix` is greater than 32.
    pub fn from_prefix(destination: Ipv4Addr, prefix: u8, if_name: IfName) -> Option<Self> {
        prefix_to_mask(prefix).map(|mask| Self::new(destination, mask, if_name))
    }
    /// Sets the gateway (next hop) for the route.
    pub fn with_next_hop(mut self, next_hop: Ipv4Addr) -> Self {
        self.next_hop = next_hop;
        self
    }
}
impl RouteEntry {
    /// Checks that the outgoing interface exists on this host.
    #[cfg(unix)]
    pub fn check(&self) -> Result<()> {
        crate::if_name_to_index(self.if_name.as_str())
            .map(|_| ())
            .map_err(|source| RouteError::UnknownInterface {
                name: self.if_name,
                source,
            })
    }
    /// Prefix length of the mask, or `None` if the mask is not contiguous.
    pub fn prefix_len(&self) -> Option<u8> {
        mask_to_prefix(self.mask)
    }
    /// `destination & mask == destination`
    pub fn is_consistent(&self) -> bool {
        self.network() == self.destination
    }
    /// network address
    pub fn network(&self) -> Ipv4Addr {
        self.destination & self.mask
    }
    /// Determine whether the target address is covered by the route
    pub fn contains(&self, dest: &Ipv4Addr) -> bool {
        *dest & self.mask == self.network()
    }
    pub fn is_gateway(&self) -> bool {
        !self.next_hop.is_unspecified()
    }
}

/// Whether `mask` is a run of ones followed by a run of zeros.
pub fn is_contiguous_mask(mask: Ipv4Addr) -> bool {
    let bits = u32::from(mask);
    bits.leading_ones() + bits.trailing_zeros() == 32
}

pub fn prefix_to_mask(prefix: u8) -> Option<Ipv4Addr> {
    if prefix > 32 {
        return None;
    }
    Some(Ipv4Addr::from(
        u32::MAX.checked_shl(32 - prefix as u32).unwrap_or(0),
    ))
}

pub fn mask_to_prefix(mask: Ipv4Addr) -> Option<u8> {
    if is_contiguous_mask(mask) {
        Some(u32::from(mask).leading_ones() as u8)
    } else {
        None
    }
}

/// Longest-prefix match of `dest` over `entries`.
pub fn longest_match<'a, I>(entries: I, dest: &Ipv4Addr) -> Option<&'a RouteEntry>
where
    I: IntoIterator<Item = &'a RouteEntry>,
{
    entries
        .into_iter()
        .filter(|v| v.contains(dest))
        .max_by(|v1, v2| by_specificity(v1, v2))
}

fn by_specificity(v1: &RouteEntry, v2: &RouteEntry) -> Ordering {
    u32::from(v1.mask)
        .count_ones()
        .cmp(&u32::from(v2.mask).count_ones())
}

impl fmt::Display for RouteChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteChange::Add(route) => write!(f, "Add({})", route),
            RouteChange::Delete(route) => write!(f, "Delete({})", route),
        }
    }
}
impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix_len() {
            Some(prefix) => write!(f, "{}/{}", self.destination, prefix)?,
            None => write!(f, "{} mask {}", self.destination, self.mask)?,
        }
        write!(f, " via {} dev {}", self.next_hop, self.if_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth0() -> IfName {
        IfName::new("eth0").unwrap()
    }

    #[test]
    fn if_name_limits() {
        assert_eq!(eth0().as_str(), "eth0");
        assert_eq!(eth0().len(), 4);
        assert!(IfName::new("0123456789abcde").is_ok());
        assert!(IfName::new("0123456789abcdef").is_err());
        assert!(IfName::new("").is_err());
        assert!(IfName::new("eth 0").is_err());
        assert!(IfName::new("eth/0").is_err());
        assert!(IfName::new("eth\0").is_err());
        let name: IfName = "wlan0".parse().unwrap();
        assert_eq!(&name.as_bytes_with_nul()[..6], b"wlan0\0");
    }

    #[test]
    fn masks() {
        assert!(is_contiguous_mask(Ipv4Addr::new(255, 255, 255, 0)));
        assert!(is_contiguous_mask(Ipv4Addr::UNSPECIFIED));
        assert!(is_contiguous_mask(Ipv4Addr::BROADCAST));
        assert!(!is_contiguous_mask(Ipv4Addr::new(255, 0, 255, 0)));
        assert_eq!(prefix_to_mask(24), Some(Ipv4Addr::new(255, 255, 255, 0)));
        assert_eq!(prefix_to_mask(0), Some(Ipv4Addr::UNSPECIFIED));
        assert_eq!(prefix_to_mask(33), None);
        assert_eq!(mask_to_prefix(Ipv4Addr::new(255, 255, 240, 0)), Some(20));
    }

    #[test]
    fn entry_helpers() {
        let entry = RouteEntry::from_prefix(Ipv4Addr::new(10, 10, 1, 0), 24, eth0())
            .unwrap()
            .with_next_hop(Ipv4Addr::new(192, 168, 1, 1));
        assert!(entry.is_consistent());
        assert!(entry.is_gateway());
        assert_eq!(entry.prefix_len(), Some(24));
        assert!(entry.contains(&Ipv4Addr::new(10, 10, 1, 77)));
        assert!(!entry.contains(&Ipv4Addr::new(10, 10, 2, 1)));
        assert_eq!(entry.to_string(), "10.10.1.0/24 via 192.168.1.1 dev eth0");

        let sloppy = RouteEntry::new(
            Ipv4Addr::new(10, 10, 1, 5),
            Ipv4Addr::new(255, 255, 255, 0),
            eth0(),
        );
        assert!(!sloppy.is_consistent());
        assert_eq!(sloppy.network(), Ipv4Addr::new(10, 10, 1, 0));
    }

    #[test]
    fn longest_prefix_wins() {
        let default = RouteEntry::from_prefix(Ipv4Addr::UNSPECIFIED, 0, eth0()).unwrap();
        let lan = RouteEntry::from_prefix(Ipv4Addr::new(192, 168, 4, 0), 24, eth0()).unwrap();
        let wide = RouteEntry::from_prefix(Ipv4Addr::new(192, 168, 0, 0), 16, eth0()).unwrap();
        let list = [default, lan, wide];
        assert_eq!(
            longest_match(&list, &Ipv4Addr::new(192, 168, 4, 10)),
            Some(&lan)
        );
        assert_eq!(
            longest_match(&list, &Ipv4Addr::new(192, 168, 9, 1)),
            Some(&wide)
        );
        assert_eq!(longest_match(&list, &Ipv4Addr::new(8, 8, 8, 8)), Some(&default));
        assert_eq!(longest_match(&list[1..], &Ipv4Addr::new(8, 8, 8, 8)), None);
    }
}
