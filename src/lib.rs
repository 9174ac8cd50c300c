/*!
Install, remove and enumerate routes in the kernel's IPv4 forwarding table.

Routes are read from `/proc/net/route` and changed with the
`SIOCADDRT`/`SIOCDELRT` ioctls. Every operation is a single blocking
request; nothing is cached between calls.

## Example:
### Synchronous API
```rust,no_run
use kroute::{IfName, RouteDiff, RouteEntry, RouteTable};
use std::net::Ipv4Addr;

let mut table = RouteTable::new();
let current = table.list().unwrap();
if current.is_truncated() {
    println!("listing incomplete: {:?}", current.truncation());
}
// Need to set up the correct gateway
let route = RouteEntry::from_prefix(
    Ipv4Addr::new(10, 10, 1, 0),
    24,
    IfName::new("eth0").unwrap(),
)
.unwrap()
.with_next_hop(Ipv4Addr::new(192, 168, 1, 1));

let result = table.add(&route);
println!("route add {route} {result:?}");
let result = table.delete(&route);
println!("route delete {route} {result:?}");

let desired = vec![route];
let diff = RouteDiff::between(current.entries(), &desired);
for e in table.apply(&diff) {
    println!("{e}");
}
```
### Listening for changes
```rust,no_run
use kroute::RouteTable;
use std::thread;

let mut route_listener = RouteTable::listener().unwrap();
thread::spawn(move || {
    while let Ok(route) = route_listener.listen() {
        println!("listen {route}");
    }
});
```
 */
mod common;
pub use common::*;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::*;
#[cfg(unix)]
mod unix;
#[cfg(unix)]
#[allow(unused_imports)]
pub use crate::unix::*;
