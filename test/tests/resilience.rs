use std::{
    io::Write,
    net::TcpStream,
    sync::{Arc, Mutex},
};

use idnet_shared::{
    error_handler_fn, ConnectionError, LockExt, NetError, Node, NodeKind, NodeRef, Packet,
};
use idnet_test::{assert_eventually, init_logger, Recorder, TestPair, DEFAULT_WAIT};

type Errors = Arc<Mutex<Vec<(NetError, Option<NodeKind>)>>>;

fn collect_remote_client_errors(pair: &TestPair) -> Errors {
    let errors: Errors = Arc::new(Mutex::new(Vec::new()));
    let log = errors.clone();
    pair.server_engine.register_dynamic_error_handler(
        |node: &NodeRef| node.kind() == NodeKind::RemoteClient,
        vec![error_handler_fn(move |error: &NetError, node: Option<&NodeRef>| {
            log.lock_or_recover()
                .push((error.clone(), node.map(|node| node.kind())));
        })],
    );
    errors
}

#[test]
fn panicking_handler_does_not_block_other_connections() {
    init_logger();
    let pair = TestPair::new();
    let errors = collect_remote_client_errors(&pair);
    pair.server_engine
        .register_handler(40, |_: &Packet, _: &NodeRef| -> Result<(), NetError> {
            panic!("handler blew up")
        })
        .expect("ordinary id");
    let recorder = Recorder::new();
    recorder.register(&pair.server_engine, 41);

    let clients = pair.connect_clients(2);
    clients[0]
        .send_packet(&Packet::new_reserved(40, Vec::new()))
        .expect("send");
    assert_eventually!(!errors.lock_or_recover().is_empty(), "panic was reported");

    clients[1]
        .send_packet(&Packet::new_reserved(41, vec![1]))
        .expect("send");
    assert!(recorder.wait_for(1, DEFAULT_WAIT), "dispatch stopped after a panic");

    assert_eq!(
        errors.lock_or_recover()[0],
        (
            NetError::HandlerPanicked {
                packet_id: 40,
                message: "handler blew up".to_string(),
            },
            Some(NodeKind::RemoteClient)
        )
    );
    // the panicking sender stays connected too
    clients[0]
        .send_packet(&Packet::new_reserved(41, vec![2]))
        .expect("send");
    assert!(recorder.wait_for(2, DEFAULT_WAIT));
}

#[test]
fn failing_handler_is_reported_with_its_node() {
    init_logger();
    let pair = TestPair::new();
    let errors = collect_remote_client_errors(&pair);
    pair.server_engine
        .register_handler(42, |packet: &Packet, _: &NodeRef| {
            Err(NetError::handler(packet.id(), "bad payload"))
        })
        .expect("ordinary id");

    let clients = pair.connect_clients(1);
    clients[0]
        .send_packet(&Packet::new_reserved(42, Vec::new()))
        .expect("send");

    assert_eventually!(errors.lock_or_recover().len() == 1, "failure was reported");
    assert_eq!(
        errors.lock_or_recover()[0],
        (
            NetError::handler(42, "bad payload"),
            Some(NodeKind::RemoteClient)
        )
    );
}

#[test]
fn corrupt_stream_drops_only_that_client() {
    init_logger();
    let pair = TestPair::new();
    let errors = collect_remote_client_errors(&pair);
    let recorder = Recorder::new();
    recorder.register(&pair.server_engine, 43);

    let clients = pair.connect_clients(1);
    let mut raw = TcpStream::connect(pair.addr).expect("raw connect");
    assert_eventually!(pair.server.client_count() == 2, "raw socket accepted");

    // a frame announcing more than the allowed maximum
    raw.write_all(&[0xff, 0xff, 0xff, 0xff]).expect("write garbage");

    assert_eventually!(pair.server.client_count() == 1, "corrupt client dropped");
    assert!(matches!(
        errors.lock_or_recover().first(),
        Some((
            NetError::Connection(ConnectionError::CorruptStream { .. }),
            Some(NodeKind::RemoteClient)
        ))
    ));

    clients[0]
        .send_packet(&Packet::new_reserved(43, Vec::new()))
        .expect("send");
    assert!(recorder.wait_for(1, DEFAULT_WAIT));
}

#[test]
fn server_going_away_disconnects_clients() {
    init_logger();
    let pair = TestPair::new();
    let clients = pair.connect_clients(2);

    pair.server.disconnect();

    assert_eventually!(
        clients.iter().all(|client| !client.is_connected()),
        "clients noticed the server leaving"
    );
    assert!(clients[0]
        .send_packet(&Packet::new_reserved(1, Vec::new()))
        .is_err());
}

#[test]
fn unknown_errors_reach_the_catch_all() {
    init_logger();
    let pair = TestPair::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    pair.server_engine
        .register_unknown_error_handler(error_handler_fn(move |error: &NetError, node| {
            log.lock_or_recover().push((error.clone(), node.is_some()));
        }));

    let error = NetError::handler(1, "no origin");
    assert!(pair.server_engine.report_error(&error, None));
    assert_eq!(*seen.lock_or_recover(), vec![(error, false)]);
}
