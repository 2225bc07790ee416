use std::net::{IpAddr, Ipv4Addr};

use idnet_shared::{Node, NodeKind, Packet};
use idnet_test::{init_logger, Recorder, TestPair, DEFAULT_WAIT};

#[test]
fn handler_sees_sender_address() {
    init_logger();
    let pair = TestPair::new();
    let recorder = Recorder::new();
    recorder.register(&pair.server_engine, 30);

    let clients = pair.connect_clients(1);
    let local = clients[0].local_addr().expect("connected client has a local address");
    clients[0]
        .send_packet(&Packet::new_reserved(30, Vec::new()))
        .expect("send");

    assert!(recorder.wait_for(1, DEFAULT_WAIT));
    let sender_addr = recorder.received()[0]
        .sender_addr
        .expect("remote clients know their peer");
    assert_eq!(sender_addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    assert_eq!(sender_addr.port(), local.port());
}

#[test]
fn client_sees_server_address() {
    init_logger();
    let pair = TestPair::new();
    let recorder = Recorder::new();
    recorder.register(&pair.client_engine, 31);

    let clients = pair.connect_clients(1);
    assert_eq!(clients[0].remote_address(), Ok(pair.addr));

    pair.server
        .send_packet(&Packet::new_reserved(31, Vec::new()))
        .expect("broadcast");

    assert!(recorder.wait_for(1, DEFAULT_WAIT));
    let received = &recorder.received()[0];
    assert_eq!(received.sender_kind, NodeKind::Client);
    assert_eq!(received.sender_addr, Some(pair.addr));
}

#[test]
fn server_address_is_its_bound_address() {
    init_logger();
    let pair = TestPair::new();

    assert_eq!(pair.server.remote_address(), Ok(pair.addr));
    assert_eq!(pair.server.local_addr(), Some(pair.addr));
    assert_eq!(pair.addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
}

#[test]
fn remote_client_addresses_match_client_sockets() {
    init_logger();
    let pair = TestPair::new();
    let clients = pair.connect_clients(2);

    let mut client_ports: Vec<u16> = clients
        .iter()
        .filter_map(|client| client.local_addr())
        .map(|addr| addr.port())
        .collect();
    let mut remote_ports: Vec<u16> = pair
        .server
        .clients()
        .iter()
        .filter_map(|remote| remote.remote_address().ok())
        .map(|addr| addr.port())
        .collect();
    client_ports.sort_unstable();
    remote_ports.sort_unstable();

    assert_eq!(client_ports, remote_ports);
}
