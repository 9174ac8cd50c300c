use netlink_packet_core::{NetlinkMessage, NetlinkPayload};
use netlink_packet_route::route::{RouteAddress, RouteAttribute, RouteMessage, RouteType};
use netlink_packet_route::{AddressFamily, RouteNetlinkMessage};
use netlink_sys::{protocols::NETLINK_ROUTE, Socket, SocketAddr};
use std::collections::VecDeque;
use std::io;
use std::net::Ipv4Addr;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

use crate::{prefix_to_mask, RouteChange, RouteDiff, RouteEntry, RouteError};
#[cfg(feature = "async")]
pub(crate) mod async_route;
#[cfg(feature = "async")]
pub use async_route::*;
pub mod ffi;
mod ioctl;
mod proc_route;
use ioctl::{route_ioctl, RouteOp};
pub use proc_route::{MalformedLine, ReaderConfig, RouteList, PROC_NET_ROUTE};

/// RouteListener for receiving IPv4 route change events of the main table.
pub struct RouteListener {
    list: VecDeque<RouteChange>,
    route_socket: RouteSocket,
}
impl AsRawFd for RouteListener {
    fn as_raw_fd(&self) -> RawFd {
        self.route_socket.as_raw_fd()
    }
}

impl RouteListener {
    /// Creates a new RouteListener.
    pub fn new() -> crate::Result<Self> {
        let route_socket = RouteSocket::subscribe()
            .map_err(|source| RouteError::ResourceUnavailable { source })?;
        Ok(Self {
            list: Default::default(),
            route_socket,
        })
    }
    /// Blocks until a route change event arrives.
    pub fn listen(&mut self) -> crate::Result<RouteChange> {
        if let Some(route) = self.list.pop_front() {
            return Ok(route);
        }
        let mut buf = vec![0; 4096];
        loop {
            let len = self
                .route_socket
                .recv(&mut buf)
                .map_err(|source| RouteError::ResourceUnavailable { source })?;
            deserialize_res(
                |route| {
                    self.list.push_back(route);
                },
                &buf[..len],
            )
            .map_err(|source| RouteError::ResourceUnavailable { source })?;
            if let Some(route) = self.list.pop_front() {
                return Ok(route);
            }
        }
    }
}

pub(crate) struct RouteSocket(Socket);
impl AsRawFd for RouteSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}
impl AsFd for RouteSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}
impl RouteSocket {
    /// Netlink socket joined to the IPv4 route multicast group.
    pub(crate) fn subscribe() -> io::Result<Self> {
        let mut socket = Socket::new(NETLINK_ROUTE)?;
        socket.bind_auto()?;
        socket.connect(&SocketAddr::new(0, 0))?;
        socket.add_membership(libc::RTNLGRP_IPV4_ROUTE)?;
        Ok(Self(socket))
    }
    pub(crate) fn recv(&self, mut buf: &mut [u8]) -> io::Result<usize> {
        self.0.recv(&mut buf, 0)
    }
}

/// Reads and modifies the kernel's IPv4 forwarding table.
///
/// Every call opens and closes its own kernel handle, so a `RouteTable`
/// holds no state beyond its [`ReaderConfig`]. Nothing serializes a
/// listing against later changes: the table may move between a
/// [`list`](Self::list) and an [`add`](Self::add).
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    config: ReaderConfig,
}

impl RouteTable {
    /// Creates a RouteTable reading from `/proc/net/route`.
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_config(config: ReaderConfig) -> Self {
        Self { config }
    }
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }
    /// Returns a new instance of RouteListener.
    pub fn listener() -> crate::Result<RouteListener> {
        RouteListener::new()
    }

    /// Lists all active routes.
    pub fn list(&mut self) -> crate::Result<RouteList> {
        self.list_active(usize::MAX)
    }
    /// Lists at most `max_entries` active routes.
    ///
    /// Routes without the up flag are left out and do not count toward
    /// the bound. An unreadable record ends the listing early unless the
    /// config says [`MalformedLine::Skip`]; see [`RouteList::truncation`].
    pub fn list_active(&mut self, max_entries: usize) -> crate::Result<RouteList> {
        let list = proc_route::read_route_file(&self.config, max_entries)?;
        log::debug!(
            "read {} active routes from {}",
            list.len(),
            self.config.path.display()
        );
        Ok(list)
    }
    /// Installs a gateway route.
    pub fn add(&mut self, route: &RouteEntry) -> crate::Result<()> {
        route_ioctl(route, RouteOp::Add)
    }
    /// Removes a route, matched on destination, mask and interface.
    pub fn delete(&mut self, route: &RouteEntry) -> crate::Result<()> {
        route_ioctl(route, RouteOp::Delete)
    }
    /// Installs a route, first removing an existing one for the same
    /// destination if the kernel reports a conflict.
    pub fn replace(&mut self, route: &RouteEntry) -> crate::Result<()> {
        match self.add(route) {
            Err(e) if e.is_already_exists() => {
                log::debug!("route {route} exists, replacing");
                self.delete(route)?;
                self.add(route)
            }
            any => any,
        }
    }
    /// Removes a route; a route that is already gone is not an error.
    /// Returns whether a route was removed.
    pub fn delete_if_present(&mut self, route: &RouteEntry) -> crate::Result<bool> {
        match self.delete(route) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
    /// Route Lookup by Destination Address
    pub fn find_route(&mut self, dest: &Ipv4Addr) -> crate::Result<Option<RouteEntry>> {
        let list = self.list()?;
        Ok(crate::longest_match(&list, dest).copied())
    }
    /// Applies `diff`: removals first, then installs.
    ///
    /// Each entry is one independent kernel request; failures are collected
    /// and the remaining entries are still attempted.
    pub fn apply(&mut self, diff: &RouteDiff) -> Vec<RouteError> {
        let mut errors = Vec::new();
        for route in &diff.to_remove {
            if let Err(e) = self.delete(route) {
                log::warn!("{e}");
                errors.push(e);
            }
        }
        for route in &diff.to_install {
            if let Err(e) = self.add(route) {
                log::warn!("{e}");
                errors.push(e);
            }
        }
        errors
    }
}

/// Installs `route` in the kernel forwarding table.
pub fn add_route(route: &RouteEntry) -> crate::Result<()> {
    RouteTable::new().add(route)
}
/// Removes `route` from the kernel forwarding table.
pub fn delete_route(route: &RouteEntry) -> crate::Result<()> {
    RouteTable::new().delete(route)
}
/// Reads up to `capacity` active routes from `/proc/net/route`.
pub fn get_route_table(capacity: usize) -> crate::Result<RouteList> {
    RouteTable::new().list_active(capacity)
}

pub(crate) fn deserialize_res<F: FnMut(RouteChange)>(
    mut add_fn: F,
    receive_buffer: &[u8],
) -> io::Result<bool> {
    let mut offset = 0;
    loop {
        let bytes = &receive_buffer[offset..];
        if bytes.is_empty() {
            return Ok(false);
        }
        let rx_packet = <NetlinkMessage<RouteNetlinkMessage>>::deserialize(bytes)
            .map_err(|e| io::Error::other(format!("{e:?}")))?;
        match rx_packet.payload {
            NetlinkPayload::Done(_) => return Ok(true),
            NetlinkPayload::Error(e) => {
                if e.code.is_none() {
                    return Ok(true);
                }
                return Err(e.to_io());
            }
            NetlinkPayload::InnerMessage(msg) => match msg {
                RouteNetlinkMessage::NewRoute(msg) => {
                    if let Some(route) = route_entry_from_msg(msg) {
                        add_fn(RouteChange::Add(route))
                    }
                }
                RouteNetlinkMessage::DelRoute(msg) => {
                    if let Some(route) = route_entry_from_msg(msg) {
                        add_fn(RouteChange::Delete(route))
                    }
                }
                _ => {}
            },
            _ => {}
        }

        offset += rx_packet.header.length as usize;
        if rx_packet.header.length == 0 {
            return Ok(false);
        }
    }
}

/// Projects a netlink route onto a [`RouteEntry`].
///
/// Only IPv4 unicast routes of the main table with an output interface
/// have a counterpart; everything else yields `None`.
pub(crate) fn route_entry_from_msg(msg: RouteMessage) -> Option<RouteEntry> {
    if msg.header.address_family != AddressFamily::Inet || msg.header.kind != RouteType::Unicast {
        return None;
    }
    let mut table = u32::from(msg.header.table);
    let mut destination = Ipv4Addr::UNSPECIFIED;
    let mut next_hop = Ipv4Addr::UNSPECIFIED;
    let mut if_index = None;
    for x in msg.attributes {
        match x {
            RouteAttribute::Destination(addr) => {
                destination = route_address_to_ipv4(addr)?;
            }
            RouteAttribute::Gateway(addr) => {
                next_hop = route_address_to_ipv4(addr)?;
            }
            RouteAttribute::Oif(v) => {
                if_index = Some(v);
            }
            RouteAttribute::Table(v) => table = v,
            _ => {}
        }
    }
    if table != libc::RT_TABLE_MAIN as u32 {
        return None;
    }
    let mask = prefix_to_mask(msg.header.destination_prefix_length)?;
    let if_name = match crate::if_index_to_name(if_index?) {
        Ok(name) => name,
        Err(e) => {
            log::debug!("route to {destination} on vanished interface: {e}");
            return None;
        }
    };
    Some(RouteEntry::new(destination, mask, if_name).with_next_hop(next_hop))
}

fn route_address_to_ipv4(addr: RouteAddress) -> Option<Ipv4Addr> {
    match addr {
        RouteAddress::Inet(ip) => Some(ip),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IfName;
    use netlink_packet_core::{NetlinkHeader, NLM_F_REQUEST};
    use netlink_packet_route::route::{RouteProtocol, RouteScope};

    fn lo_route(prefix: u8) -> RouteMessage {
        let mut msg = RouteMessage::default();
        msg.header.address_family = AddressFamily::Inet;
        msg.header.destination_prefix_length = prefix;
        msg.header.protocol = RouteProtocol::Static;
        msg.header.scope = RouteScope::Universe;
        msg.header.kind = RouteType::Unicast;
        msg.header.table = libc::RT_TABLE_MAIN as u8;
        msg.attributes.push(RouteAttribute::Destination(RouteAddress::Inet(
            Ipv4Addr::new(10, 20, 0, 0),
        )));
        msg.attributes.push(RouteAttribute::Gateway(RouteAddress::Inet(
            Ipv4Addr::new(127, 0, 0, 2),
        )));
        msg.attributes
            .push(RouteAttribute::Oif(crate::if_name_to_index("lo").unwrap()));
        msg
    }

    fn serialize(payload: RouteNetlinkMessage) -> Vec<u8> {
        let mut nl_hdr = NetlinkHeader::default();
        nl_hdr.flags = NLM_F_REQUEST;
        let mut packet = NetlinkMessage::new(nl_hdr, NetlinkPayload::from(payload));
        packet.finalize();
        let mut buf = vec![0; packet.header.length as usize];
        packet.serialize(&mut buf[..]);
        buf
    }

    #[test]
    fn netlink_route_projection() {
        let entry = route_entry_from_msg(lo_route(16)).unwrap();
        assert_eq!(entry.destination(), Ipv4Addr::new(10, 20, 0, 0));
        assert_eq!(entry.mask(), Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(entry.next_hop(), Ipv4Addr::new(127, 0, 0, 2));
        assert_eq!(entry.if_name(), &IfName::new("lo").unwrap());
    }

    #[test]
    fn netlink_other_tables_ignored() {
        let mut msg = lo_route(16);
        msg.header.table = libc::RT_TABLE_LOCAL as u8;
        assert!(route_entry_from_msg(msg).is_none());

        let mut msg = lo_route(16);
        msg.header.kind = RouteType::Local;
        assert!(route_entry_from_msg(msg).is_none());

        let mut msg = lo_route(16);
        msg.attributes
            .retain(|v| !matches!(v, RouteAttribute::Oif(_)));
        assert!(route_entry_from_msg(msg).is_none());
    }

    #[test]
    fn deserialize_change_events() {
        let mut buf = serialize(RouteNetlinkMessage::NewRoute(lo_route(16)));
        buf.extend(serialize(RouteNetlinkMessage::DelRoute(lo_route(24))));
        let mut changes = Vec::new();
        let done = deserialize_res(|v| changes.push(v), &buf).unwrap();
        assert!(!done);
        assert_eq!(changes.len(), 2);
        assert!(matches!(changes[0], RouteChange::Add(r) if r.prefix_len() == Some(16)));
        assert!(matches!(changes[1], RouteChange::Delete(r) if r.prefix_len() == Some(24)));
    }

    #[test]
    fn table_reads_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("route");
        std::fs::write(
            &path,
            "Iface\tDestination\tGateway\tFlags\tRefCnt\tUse\tMetric\tMask\tMTU\tWindow\tIRTT\n\
             lo\t0000007F\t00000000\t0001\t0\t0\t0\t000000FF\t0\t0\t0\n\
             lo\t0000007F\t00000000\t0000\t0\t0\t0\t000000FF\t0\t0\t0\n",
        )
        .unwrap();
        let mut table = RouteTable::with_config(ReaderConfig::default().with_path(&path));
        let list = table.list().unwrap();
        assert_eq!(list.len(), 1);
        let found = table
            .find_route(&Ipv4Addr::from(0x0100007F_u32.to_ne_bytes()))
            .unwrap();
        assert_eq!(found, Some(list.entries()[0]));
    }

    #[test]
    fn table_missing_file() {
        let mut table =
            RouteTable::with_config(ReaderConfig::default().with_path("/nonexistent/route"));
        assert!(matches!(
            table.list_active(8),
            Err(RouteError::ResourceUnavailable { .. })
        ));
    }
}
