//! C ABI for agents that link the static or shared library.
//!
//! ```c
//! typedef struct routing_item_t {
//!     in_addr_t dest;
//!     in_addr_t mask;
//!     in_addr_t nexthop;
//!     char ifname[IF_NAMESIZE];
//! } routing_item_t;
//!
//! int add_route(const routing_item_t *);
//! int delete_route(const routing_item_t *);   /* nexthop may be left zero */
//! int get_route_table(routing_item_t *, int);
//! ```
//!
//! Each call returns `-1` and sets `errno` on failure.
#![allow(non_camel_case_types)]

use libc::{c_char, c_int, in_addr_t};
use std::ffi::CStr;
use std::net::Ipv4Addr;

use crate::{IfName, RouteEntry, RouteError, RouteTable, IF_NAMESIZE};

/// Addresses are in network byte order.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct routing_item_t {
    pub dest: in_addr_t,
    pub mask: in_addr_t,
    pub nexthop: in_addr_t,
    pub ifname: [c_char; IF_NAMESIZE],
}

impl TryFrom<&routing_item_t> for RouteEntry {
    type Error = RouteError;

    fn try_from(item: &routing_item_t) -> Result<Self, Self::Error> {
        let bytes: [u8; IF_NAMESIZE] = item.ifname.map(|c| c as u8);
        let name = CStr::from_bytes_until_nul(&bytes)
            .ok()
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RouteError::InvalidInterfaceName {
                name: String::from_utf8_lossy(&bytes).into_owned(),
                reason: "not a NUL-terminated UTF-8 string",
            })?;
        Ok(RouteEntry::new(addr_from_c(item.dest), addr_from_c(item.mask), IfName::new(name)?)
            .with_next_hop(addr_from_c(item.nexthop)))
    }
}

impl From<&RouteEntry> for routing_item_t {
    fn from(entry: &RouteEntry) -> Self {
        Self {
            dest: addr_to_c(entry.destination),
            mask: addr_to_c(entry.mask),
            nexthop: addr_to_c(entry.next_hop),
            ifname: entry.if_name.as_bytes_with_nul().map(|b| b as c_char),
        }
    }
}

fn addr_from_c(addr: in_addr_t) -> Ipv4Addr {
    Ipv4Addr::from(addr.to_ne_bytes())
}

fn addr_to_c(addr: Ipv4Addr) -> in_addr_t {
    in_addr_t::from_ne_bytes(addr.octets())
}

fn set_errno(code: c_int) {
    unsafe { *libc::__errno_location() = code };
}

fn with_entry<F>(r: *const routing_item_t, op: F) -> c_int
where
    F: FnOnce(&mut RouteTable, &RouteEntry) -> crate::Result<()>,
{
    // SAFETY: the caller guarantees `r` is null or valid.
    let Some(item) = (unsafe { r.as_ref() }) else {
        set_errno(libc::EFAULT);
        return -1;
    };
    match RouteEntry::try_from(item).and_then(|entry| op(&mut RouteTable::new(), &entry)) {
        Ok(()) => 0,
        Err(e) => {
            log::debug!("{e}");
            set_errno(e.raw_os_error().unwrap_or(libc::EINVAL));
            -1
        }
    }
}

/// # Safety
/// `r` must be null or point to a valid `routing_item_t`.
#[no_mangle]
pub unsafe extern "C" fn add_route(r: *const routing_item_t) -> c_int {
    with_entry(r, RouteTable::add)
}

/// # Safety
/// `r` must be null or point to a valid `routing_item_t`.
#[no_mangle]
pub unsafe extern "C" fn delete_route(r: *const routing_item_t) -> c_int {
    with_entry(r, RouteTable::delete)
}

/// # Safety
/// `arr` must point to at least `size` writable `routing_item_t` values.
#[no_mangle]
pub unsafe extern "C" fn get_route_table(arr: *mut routing_item_t, size: c_int) -> c_int {
    let Ok(capacity) = usize::try_from(size) else {
        set_errno(libc::EINVAL);
        return -1;
    };
    if arr.is_null() && capacity > 0 {
        set_errno(libc::EFAULT);
        return -1;
    }
    match RouteTable::new().list_active(capacity) {
        Ok(list) => {
            for (i, entry) in list.iter().enumerate() {
                arr.add(i).write(entry.into());
            }
            list.len() as c_int
        }
        Err(e) => {
            log::debug!("{e}");
            set_errno(e.raw_os_error().unwrap_or(libc::EIO));
            -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn item_conversion() {
        let entry = RouteEntry::from_prefix(
            Ipv4Addr::new(10, 10, 1, 0),
            24,
            IfName::new("ens33").unwrap(),
        )
        .unwrap()
        .with_next_hop(Ipv4Addr::new(10, 0, 0, 1));
        let item = routing_item_t::from(&entry);
        assert_eq!(item.dest.to_ne_bytes(), [10, 10, 1, 0]);
        assert_eq!(item.mask.to_ne_bytes(), [255, 255, 255, 0]);
        assert_eq!(item.nexthop, u32::from(Ipv4Addr::new(10, 0, 0, 1)).to_be());
        assert_eq!(RouteEntry::try_from(&item).unwrap(), entry);
    }

    #[test]
    fn unterminated_name_rejected() {
        let mut item = routing_item_t::from(
            &RouteEntry::from_prefix(Ipv4Addr::UNSPECIFIED, 0, IfName::new("lo").unwrap())
                .unwrap(),
        );
        item.ifname = [b'x' as c_char; IF_NAMESIZE];
        assert!(matches!(
            RouteEntry::try_from(&item),
            Err(RouteError::InvalidInterfaceName { .. })
        ));
    }

    #[test]
    fn null_pointer_is_efault() {
        assert_eq!(unsafe { add_route(std::ptr::null()) }, -1);
        assert_eq!(io::Error::last_os_error().raw_os_error(), Some(libc::EFAULT));
        assert_eq!(unsafe { get_route_table(std::ptr::null_mut(), -1) }, -1);
        assert_eq!(io::Error::last_os_error().raw_os_error(), Some(libc::EINVAL));
    }
}
