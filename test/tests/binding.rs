use std::{
    io,
    net::{TcpListener, TcpStream},
    time::Duration,
};

use idnet_client::{Client, ClientConfig, ClientError};
use idnet_server::{Server, ServerError};
use idnet_shared::{ConnectionError, Engine, EngineConfig, Node, NodeState};
use idnet_test::{init_logger, TestPair};

#[test]
fn port_can_be_rebound_after_disconnect() {
    init_logger();
    let engine = Engine::new(EngineConfig::default());

    for _ in 0..3 {
        let server = Server::new(&engine, TestPair::server_config());
        let addr = server.listen(0).expect("listen");
        server.disconnect();

        let rebound = Server::new(&engine, TestPair::server_config());
        assert_eq!(rebound.listen(addr.port()), Ok(addr));
        rebound.disconnect();
    }

    engine.shutdown();
}

#[test]
fn rebinding_works_with_clients_connected() {
    init_logger();
    let pair = TestPair::new();
    let _clients = pair.connect_clients(2);
    let port = pair.port();

    pair.server.disconnect();
    assert_eq!(pair.server.state(), NodeState::Closed);

    let rebound = Server::new(&pair.server_engine, TestPair::server_config());
    assert!(rebound.listen(port).is_ok());
    rebound.disconnect();
}

#[test]
fn binding_a_taken_port_fails() {
    init_logger();
    let pair = TestPair::new();
    let second = Server::new(&pair.server_engine, TestPair::server_config());

    assert!(matches!(
        second.listen(pair.port()),
        Err(ServerError::Bind {
            kind: io::ErrorKind::AddrInUse,
            ..
        })
    ));
    assert!(!second.is_listening());
}

#[test]
fn dialing_a_closed_port_is_refused() {
    init_logger();
    let engine = Engine::new(EngineConfig::default());
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr").port()
    };
    let client = Client::new(&engine, ClientConfig::default());

    assert!(matches!(
        client.connect("127.0.0.1", port),
        Err(ClientError::Connection(
            ConnectionError::ConnectionRefused { .. }
        ))
    ));
    assert_eq!(client.state(), NodeState::Disconnected);
    assert!(client.remote_address().is_err());
    engine.shutdown();
}

#[test]
fn connect_timeout_still_connects_to_live_servers() {
    init_logger();
    let pair = TestPair::new();
    let client = pair.client();

    let addr = client
        .connect_timeout("localhost", pair.port(), Duration::from_secs(2))
        .or_else(|_| client.connect_timeout("127.0.0.1", pair.port(), Duration::from_secs(2)))
        .expect("connect");

    assert_eq!(addr.port(), pair.port());
    assert!(client.is_connected());
}

#[test]
fn server_drop_releases_the_port() {
    init_logger();
    let engine = Engine::new(EngineConfig::default());
    let addr = {
        let server = Server::new(&engine, TestPair::server_config());
        let addr = server.listen(0).expect("listen");
        let _raw = TcpStream::connect(addr).expect("connect");
        addr
    };

    assert!(TcpListener::bind(addr).is_ok());
    engine.shutdown();
}
