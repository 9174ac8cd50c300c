//! Route install/remove through the `SIOCADDRT` / `SIOCDELRT` ioctls.

use std::io;
use std::marker::PhantomData;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::{fmt, mem};

use crate::{RouteEntry, RouteError};

/// Flags sent with every request. The kernel wants `RTF_GATEWAY` on
/// removal as well, even though no gateway is supplied then.
pub(crate) const ROUTE_FLAGS: libc::c_ushort = (libc::RTF_UP | libc::RTF_GATEWAY) as libc::c_ushort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RouteOp {
    Add,
    Delete,
}
impl RouteOp {
    fn request(self) -> libc::c_ulong {
        match self {
            RouteOp::Add => libc::SIOCADDRT as libc::c_ulong,
            RouteOp::Delete => libc::SIOCDELRT as libc::c_ulong,
        }
    }
}

/// A kernel `struct rtentry` built from a [`RouteEntry`].
///
/// `rt_dev` points into the borrowed entry's interface name, so the
/// request cannot outlive it.
pub(crate) struct RouteReq<'a> {
    raw: libc::rtentry,
    _dev: PhantomData<&'a RouteEntry>,
}
impl fmt::Debug for RouteReq<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteReq")
            .field("rt_dst", &sockaddr_to_ipv4(&self.raw.rt_dst))
            .field("rt_gateway", &sockaddr_to_ipv4(&self.raw.rt_gateway))
            .field("rt_genmask", &sockaddr_to_ipv4(&self.raw.rt_genmask))
            .field("rt_flags", &self.raw.rt_flags)
            .finish()
    }
}

pub(crate) fn add_route_req(entry: &RouteEntry) -> RouteReq<'_> {
    let mut req = route_req(entry);
    req.raw.rt_gateway = sockaddr_in(entry.next_hop);
    req
}

pub(crate) fn delete_route_req(entry: &RouteEntry) -> RouteReq<'_> {
    route_req(entry)
}

fn route_req(entry: &RouteEntry) -> RouteReq<'_> {
    // SAFETY: rtentry is plain data; an all-zero value is what the kernel
    // expects for the fields left unset.
    let mut raw: libc::rtentry = unsafe { mem::zeroed() };
    raw.rt_dst = sockaddr_in(entry.destination);
    raw.rt_genmask = sockaddr_in(entry.mask);
    raw.rt_flags = ROUTE_FLAGS;
    raw.rt_dev = entry.if_name.as_bytes_with_nul().as_ptr() as *mut libc::c_char;
    RouteReq {
        raw,
        _dev: PhantomData,
    }
}

/// Lays out `addr` as a `sockaddr_in` inside a generic `sockaddr`:
/// family, zero port, then the address bytes in network order.
pub(crate) fn sockaddr_in(addr: Ipv4Addr) -> libc::sockaddr {
    let mut sa_data = [0 as libc::c_char; 14];
    for (dst, src) in sa_data[2..6].iter_mut().zip(addr.octets()) {
        *dst = src as libc::c_char;
    }
    libc::sockaddr {
        sa_family: libc::AF_INET as libc::sa_family_t,
        sa_data,
    }
}

/// Inverse of [`sockaddr_in`]; `None` for any other address family.
pub(crate) fn sockaddr_to_ipv4(sa: &libc::sockaddr) -> Option<Ipv4Addr> {
    if sa.sa_family != libc::AF_INET as libc::sa_family_t {
        return None;
    }
    let b = &sa.sa_data;
    Some(Ipv4Addr::new(b[2] as u8, b[3] as u8, b[4] as u8, b[5] as u8))
}

/// Datagram socket used only as an ioctl handle.
fn control_socket() -> io::Result<OwnedFd> {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn send_route_req(fd: &OwnedFd, op: RouteOp, req: &mut RouteReq<'_>) -> io::Result<()> {
    let ret = unsafe { libc::ioctl(fd.as_raw_fd(), op.request() as _, &mut req.raw) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Issues one request on a fresh control socket.
pub(crate) fn route_ioctl(entry: &RouteEntry, op: RouteOp) -> crate::Result<()> {
    let fd = control_socket().map_err(|source| RouteError::ResourceUnavailable { source })?;
    let mut req = match op {
        RouteOp::Add => add_route_req(entry),
        RouteOp::Delete => delete_route_req(entry),
    };
    log::debug!("route {op:?} {req:?} dev {}", entry.if_name);
    send_route_req(&fd, op, &mut req).map_err(|source| match op {
        RouteOp::Add => RouteError::Install {
            entry: *entry,
            source,
        },
        RouteOp::Delete => RouteError::Remove {
            entry: *entry,
            source,
        },
    })
}
