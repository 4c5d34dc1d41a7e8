use serde_json::json;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use lsr_router::network::{AddressBook, TcpTransport};
use lsr_router::{Router, RouterConfig};

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn config(id: &str, neighbor: &str) -> RouterConfig {
    let mut config = RouterConfig::new(id);
    config.neighbors.insert(neighbor.to_string(), 2.0);
    config.timers.initial_delay_ms = 3_600_000;
    config
}

#[tokio::test]
async fn test_two_routers_over_loopback() {
    let mut book = AddressBook::new();
    book.insert("A", format!("127.0.0.1:{}", free_port()).parse().unwrap());
    book.insert("B", format!("127.0.0.1:{}", free_port()).parse().unwrap());

    let connect_timeout = Duration::from_secs(2);
    let a = Router::new(config("A", "B"), TcpTransport::new("A", book.clone(), connect_timeout));
    let b = Router::new(config("B", "A"), TcpTransport::new("B", book, connect_timeout));
    a.start().await.unwrap();
    b.start().await.unwrap();

    assert_eq!(a.send_hellos().await, 1);
    a.originate_lsp().await.unwrap();
    b.originate_lsp().await.unwrap();

    timeout(Duration::from_secs(5), async {
        while a.status().await.lsdb_entries < 2 || b.status().await.lsdb_entries < 2 {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("LSPs were not exchanged");

    let route = a.route_to("B").await;
    assert_eq!(route.cost, 2.0);
    assert_eq!(route.next_hop.as_deref(), Some("B"));

    let mut at_b = b.subscribe_deliveries();
    a.send_message("B", json!({"text": "over tcp"})).await.unwrap();
    let packet = timeout(Duration::from_secs(5), at_b.recv())
        .await
        .expect("no delivery at B")
        .unwrap();
    assert_eq!(packet.payload["text"], "over tcp");
    assert_eq!(packet.hops, 8);

    a.stop().await.unwrap();
    b.stop().await.unwrap();
}
