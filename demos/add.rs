use kroute::{IfName, RouteEntry, RouteTable};
use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;

pub fn main() {
    let mut route_listener = RouteTable::listener().unwrap();
    thread::spawn(move || {
        while let Ok(change) = route_listener.listen() {
            println!("========= listen {change} =========");
        }
    });
    // Need to set up the correct gateway and interface
    let route = RouteEntry::from_prefix(
        Ipv4Addr::new(192, 168, 2, 0),
        24,
        IfName::new("eth0").unwrap(),
    )
    .unwrap()
    .with_next_hop(Ipv4Addr::new(192, 168, 1, 1));
    let mut table = RouteTable::new();
    let result = table.add(&route);
    println!("route add {route} {result:?}");
    thread::sleep(Duration::from_secs(1));
    let result = table.delete(&route);
    println!("route delete {route} {result:?}");
    thread::sleep(Duration::from_secs(1));
}
