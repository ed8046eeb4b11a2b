use dv_network::network::InMemoryNetwork;
use dv_network::trace::stats::NetworkStats;

pub fn print_routing_tables(network: &InMemoryNetwork) {
    println!("--- Routing tables ---");
    for (router_id, table) in network.routing_tables() {
        println!("* {router_id}");
        println!("{table}");
    }
}

pub fn print_node_stats(stats: &NetworkStats, network: &InMemoryNetwork) {
    println!("--- Node stats ---");
    for host in network.hosts() {
        let host_stats = stats.node(host.id());
        println!("* {} (host)", host.id());
        println!("  * Sent packets: {}", host_stats.sent);
        println!("  * Received packets: {}", host_stats.delivered);
        println!("    | {} packets dropped", host_stats.dropped);
    }

    for router in network.routers() {
        let router_stats = stats.node(router.id());
        println!("* {} (router)", router.id());
        println!("  * Forwarded packets: {}", router_stats.forwarded);
        println!("    | {} packets dropped", router_stats.dropped);
        println!(
            "  * Advertisements: {} sent, {} received",
            router_stats.advertisements_sent, router_stats.advertisements_received
        );
        println!("  * Routing table updates: {}", router_stats.route_updates);
    }
}

pub fn print_link_stats(stats: &NetworkStats) {
    if !stats.by_link.is_empty() {
        println!("--- Link stats ---");
    }

    for (link_id, link_stats) in &stats.by_link {
        println!("* {link_id}: lost {} packets in transit", link_stats.lost);
    }
}

pub fn print_received_data(network: &InMemoryNetwork) {
    println!("--- Received data ---");
    for host in network.hosts() {
        let received = host.received();
        println!("* {}: {} packets", host.id(), received.len());
        for packet in received {
            println!("  | {}", String::from_utf8_lossy(&packet.payload));
        }
    }
}
