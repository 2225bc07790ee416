use std::sync::{Arc, Mutex};

use idnet_shared::{ConnectEvent, LockExt, Node, NodeId, NodeKind, NodeRef};
use idnet_test::{assert_eventually, init_logger, TestPair};

type Seen = Arc<Mutex<Vec<(NodeKind, NodeId, NodeKind, NodeId)>>>;

fn recording(seen: &Seen) -> ConnectEvent {
    let seen = seen.clone();
    ConnectEvent::new(move |connected: &NodeRef, connector: &NodeRef| {
        seen.lock_or_recover().push((
            connected.kind(),
            connected.id(),
            connector.kind(),
            connector.id(),
        ));
    })
}

#[test]
fn connect_events_fire_on_both_sides() {
    init_logger();
    let pair = TestPair::new();
    let server_seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let client_seen: Seen = Arc::new(Mutex::new(Vec::new()));
    pair.server.set_on_connect(Some(recording(&server_seen)));

    let client = pair.client();
    client.set_on_connect(Some(recording(&client_seen)));
    client.connect("127.0.0.1", pair.port()).expect("connect");

    assert_eq!(
        *client_seen.lock_or_recover(),
        vec![(NodeKind::Client, client.id(), NodeKind::Client, client.id())]
    );

    assert_eventually!(
        server_seen.lock_or_recover().len() == 1,
        "server connect event never fired"
    );
    let (connected_kind, connected_id, connector_kind, connector_id) =
        server_seen.lock_or_recover()[0];
    assert_eq!(connected_kind, NodeKind::Server);
    assert_eq!(connected_id, pair.server.id());
    assert_eq!(connector_kind, NodeKind::RemoteClient);
    let accepted: Vec<NodeId> = pair.server.clients().iter().map(|client| client.id()).collect();
    assert_eq!(accepted, vec![connector_id]);
}

#[test]
fn added_connect_events_run_in_order() {
    init_logger();
    let pair = TestPair::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let client = pair.client();
    for name in ["first", "second", "third"] {
        let order = order.clone();
        client.add_on_connect(ConnectEvent::new(move |_: &NodeRef, _: &NodeRef| {
            order.lock_or_recover().push(name);
        }));
    }
    client.connect("127.0.0.1", pair.port()).expect("connect");

    assert_eq!(*order.lock_or_recover(), vec!["first", "second", "third"]);
}

#[test]
fn composed_connect_events_run_both_operands() {
    init_logger();
    let pair = TestPair::new();
    let first: Seen = Arc::new(Mutex::new(Vec::new()));
    let second: Seen = Arc::new(Mutex::new(Vec::new()));

    let composed = ConnectEvent::add(Some(recording(&first)), Some(recording(&second)));
    assert!(ConnectEvent::add(None, None).is_none());
    pair.server.set_on_connect(composed);

    let _clients = pair.connect_clients(1);

    assert_eventually!(
        first.lock_or_recover().len() == 1 && second.lock_or_recover().len() == 1,
        "both composed callbacks run"
    );
}

#[test]
fn clearing_the_connect_event() {
    init_logger();
    let pair = TestPair::new();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));

    let client = pair.client();
    client.set_on_connect(Some(recording(&seen)));
    client.set_on_connect(None);
    client.connect("127.0.0.1", pair.port()).expect("connect");

    assert!(seen.lock_or_recover().is_empty());
}
