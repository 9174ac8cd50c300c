use kroute::RouteTable;
use std::net::Ipv4Addr;

pub fn main() {
    let mut table = RouteTable::new();
    let list = table.list().unwrap();
    for route in &list {
        println!("{route}");
    }
    if let Some(truncation) = list.truncation() {
        println!("listing stopped early: {truncation}");
    }
    let ip = Ipv4Addr::new(8, 8, 8, 8);
    let find_route = table.find_route(&ip).unwrap();
    println!("find route: {ip} -> {find_route:?}");
}
