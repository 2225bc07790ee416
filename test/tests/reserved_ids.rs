use std::collections::HashSet;

use idnet_shared::{
    IdRange, Node, NodeRef, Packet, PacketIdError, INTERNAL_RANGE_FROM,
    INTERNAL_RANGE_TO,
};
use idnet_test::{init_logger, Recorder, TestPair, DEFAULT_WAIT};

#[test]
fn internal_range_is_reserved_by_default() {
    init_logger();
    let pair = TestPair::new();
    let engine = &pair.client_engine;

    assert!(engine.is_reserved(INTERNAL_RANGE_FROM));
    assert!(engine.is_reserved(INTERNAL_RANGE_TO));
    assert!(!engine.is_reserved(INTERNAL_RANGE_TO + 1));
    assert_eq!(
        engine.packet(-999_500, vec![1]),
        Err(PacketIdError::ReservedIdViolation { id: -999_500 })
    );
    assert_eq!(engine.reserved_packet(-999_500, vec![1]).id(), -999_500);
}

#[test]
fn reserved_ids_travel_with_the_override() {
    init_logger();
    let pair = TestPair::new();
    let id = pair.server_engine.allocate_reserved_id().expect("free reserved id");

    let recorder = Recorder::new();
    assert_eq!(
        pair.server_engine
            .register_handler(id, |_: &Packet, _: &NodeRef| Ok(())),
        Err(PacketIdError::ReservedIdViolation { id })
    );

    let received = recorder.clone();
    pair.server_engine
        .register_reserved_handler(id, move |packet: &Packet, sender: &NodeRef| {
            received.record(packet, sender);
            Ok(())
        });

    let clients = pair.connect_clients(1);
    let packet = pair.client_engine.reserved_packet(id, vec![8]);
    clients[0].send_packet(&packet).expect("send");

    assert!(recorder.wait_for(1, DEFAULT_WAIT));
    assert_eq!(recorder.received()[0].packet_id, id);
    assert_eq!(recorder.received()[0].payload, vec![8]);
}

#[test]
fn removed_ranges_stay_reserved() {
    init_logger();
    let pair = TestPair::new();
    let engine = &pair.server_engine;

    engine.add_reserved_range(IdRange::new(500, 600));
    engine.remove_reserved_range(IdRange::new(500, 600));

    assert!(engine.is_reserved(550));
    assert_eq!(
        engine.packet(550, Vec::new()),
        Err(PacketIdError::ReservedIdViolation { id: 550 })
    );
    assert!(!engine.reserved_ranges().contains(&IdRange::new(500, 600)));
}

#[test]
fn allocated_ids_are_unique_and_reserved() {
    init_logger();
    let pair = TestPair::new();
    let engine = &pair.server_engine;
    engine.add_reserved_range(IdRange::new(-10, -5));

    let mut seen = HashSet::new();
    for _ in 0..20 {
        let id = engine.allocate_reserved_id().expect("plenty of ids left");
        assert!(engine.is_reserved(id));
        assert!(seen.insert(id), "id {id} handed out twice");
    }
}
