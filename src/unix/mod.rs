#[cfg(feature = "async")]
mod async_route;
#[cfg(feature = "async")]
pub(crate) use async_route::*;
use libc::c_char;
use std::ffi::{CStr, CString};
use std::io;

use crate::IfName;

pub fn if_name_to_index(name: &str) -> io::Result<u32> {
    let name = CString::new(name)?;
    let idx = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if idx != 0 {
        Ok(idx)
    } else {
        Err(io::Error::last_os_error())
    }
}
pub fn if_index_to_name(index: u32) -> io::Result<IfName> {
    let mut ifname: [c_char; libc::IF_NAMESIZE] = [0; libc::IF_NAMESIZE];

    let name = unsafe {
        if libc::if_indextoname(index as libc::c_uint, ifname.as_mut_ptr()).is_null() {
            return Err(io::Error::last_os_error());
        }
        CStr::from_ptr(ifname.as_ptr())
    };
    let name = name
        .to_str()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid UTF-8"))?;
    IfName::new(name).map_err(io::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_lookup() {
        let index = if_name_to_index("lo").unwrap();
        assert_eq!(if_index_to_name(index).unwrap().as_str(), "lo");
    }

    #[test]
    fn unknown_interface() {
        assert!(if_name_to_index("no-such-if0").is_err());
        assert!(if_name_to_index("bad\0name").is_err());
    }
}
