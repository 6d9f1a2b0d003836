//! End-to-end continuous read against a scripted module

use std::time::Duration;

use pretty_assertions::assert_eq;
use rfidlink::{
    Error, ModuleFamily, Opcode, Reader, ReaderConfig, ReportKind, SessionState, StreamEvent,
    TagMetadata,
};
use rfidlink_core::frame;
use rfidlink_transport::MockTransport;

fn encoded(opcode: u8, payload: &[u8]) -> Vec<u8> {
    frame::encode(opcode, payload).unwrap().to_vec()
}

fn tag_report(epc: &[u8], rssi: i8) -> Vec<u8> {
    let flags = TagMetadata::READ_COUNT
        | TagMetadata::RSSI
        | TagMetadata::ANTENNA_ID
        | TagMetadata::FREQUENCY
        | TagMetadata::TIMESTAMP;

    let mut p = vec![0x00, 0x00, 0x10, 0x00, 0x1B];
    p.extend_from_slice(&flags.bits().to_be_bytes());
    p.push(0x00);
    p.push(0x01);
    p.push(rssi as u8);
    p.push(0x11);
    p.extend_from_slice(&[0x0D, 0xEC, 0x2C]); // 912428 kHz
    p.extend_from_slice(&[0x00, 0x00, 0x03, 0xE8]);
    p.extend_from_slice(&(((epc.len() + 4) * 8) as u16).to_be_bytes());
    p.extend_from_slice(&[0x30, 0x00]);
    p.extend_from_slice(epc);
    p.extend_from_slice(&[0x12, 0x34]);

    encoded(0x22, &p)
}

fn keep_alive() -> Vec<u8> {
    encoded(0x22, &[0x04, 0x00])
}

fn script_start(mock: &mut MockTransport) {
    let start = ModuleFamily::M6eNano.profile().start_request();
    mock.expect(&encoded(0x9A, &[0x01, 0x0C, 0x00]), &encoded(0x9A, &[0x00, 0x00]));
    mock.expect(
        &encoded(start.opcode, &start.payload),
        &encoded(0x2F, &[0x00, 0x00, 0x00, 0x00, 0x01]),
    );
}

fn stop_request() -> Vec<u8> {
    let stop = ModuleFamily::M6eNano.profile().stop_request();
    encoded(stop.opcode, &stop.payload)
}

async fn open(mock: MockTransport) -> Reader<MockTransport> {
    let config = ReaderConfig::default()
        .with_startup_drain(Duration::ZERO)
        .with_stop_grace(Duration::from_millis(1000));
    Reader::open(mock, config).await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn start_poll_stop() {
    let mut mock = MockTransport::new();
    script_start(&mut mock);

    let tag_a = tag_report(&[0xE2, 0x00, 0x00, 0x01], -60);
    let tag_b = tag_report(&[0xE2, 0x00, 0x00, 0x02], -45);
    let in_flight = tag_report(&[0xE2, 0x00, 0x00, 0x03], -50);
    let late = tag_report(&[0xE2, 0x00, 0x00, 0x04], -50);
    let ack = encoded(0x2F, &[0x00, 0x00, 0x00, 0x00, 0x02]);

    mock.expect_timed(
        &stop_request(),
        &[
            (Duration::from_millis(30), &in_flight[..]),
            (Duration::from_millis(60), &ack[..]),
            (Duration::from_millis(60), &late[..]),
        ],
    );

    let mut reader = open(mock).await;
    reader.start_reading().await.unwrap();
    assert_eq!(reader.state(), SessionState::Streaming);

    // Two reports and a keep-alive, the second report split across reads
    reader.transport_mut().push_incoming_after(Duration::from_millis(10), &tag_a);
    reader.transport_mut().push_incoming_after(Duration::from_millis(20), &keep_alive());
    reader.transport_mut().push_incoming_after(Duration::from_millis(30), &tag_b[..9]);
    reader.transport_mut().push_incoming_after(Duration::from_millis(40), &tag_b[9..]);

    let mut seen = Vec::new();
    for _ in 0..4 {
        reader.pump(Duration::from_millis(100)).await.unwrap();
        seen.extend(reader.poll_tags().unwrap());
    }

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].epc_hex(), "E2000001");
    assert_eq!(seen[0].rssi, -60);
    assert_eq!(seen[0].frequency_khz, 912_428);
    assert_eq!(seen[0].timestamp, 1000);
    assert_eq!(seen[0].antenna, Some(0x11));
    assert_eq!(seen[1].epc_hex(), "E2000002");

    let outcome = reader.stop_reading().await.unwrap();
    assert!(outcome.acknowledged);
    assert_eq!(outcome.tags.len(), 1);
    assert_eq!(outcome.tags[0].epc_hex(), "E2000003");
    assert_eq!(reader.state(), SessionState::Idle);

    // Report that followed the ack is never yielded
    reader.pump(Duration::from_millis(10)).await.unwrap();
    assert!(reader.poll_tags().unwrap().is_empty());

    reader.close().await.unwrap();
    assert!(!reader.is_connected());
}

#[tokio::test(start_paused = true)]
async fn notices_and_corruption_while_streaming() {
    let mut mock = MockTransport::new();
    script_start(&mut mock);
    let mut reader = open(mock).await;
    reader.start_reading().await.unwrap();

    let mut corrupt = tag_report(&[0xAA, 0xBB, 0xCC, 0xDD], -70);
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0x01;

    let mut burst = vec![0x13, 0x37]; // line noise
    burst.extend_from_slice(&corrupt);
    burst.extend_from_slice(&encoded(0x22, &[0x05, 0x05]));
    burst.extend_from_slice(&tag_report(&[0x01, 0x02, 0x03, 0x04], -40));
    reader.transport_mut().push_incoming(&burst);

    reader.pump(Duration::from_millis(10)).await.unwrap();
    let events = reader.poll_events().unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], StreamEvent::Notice(ReportKind::HighReturnLoss));
    assert!(matches!(&events[1], StreamEvent::Tag(tag) if tag.epc_hex() == "01020304"));
    assert!(reader.is_streaming());
}

#[tokio::test(start_paused = true)]
async fn garbage_flood_ends_session() {
    let mut mock = MockTransport::new();
    script_start(&mut mock);
    let mut reader = open(mock).await;
    reader.start_reading().await.unwrap();

    reader.transport_mut().push_incoming(&[0x55; 700]);
    reader.pump(Duration::from_millis(10)).await.unwrap();

    let err = reader.poll_tags().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, Error::Core(rfidlink_core::Error::StreamDesynchronized { .. })));
    assert_eq!(reader.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn abandoned_start_recovered_by_reset() {
    let mut mock = MockTransport::new();
    let start = ModuleFamily::M6eNano.profile().start_request();
    mock.expect(&encoded(0x9A, &[0x01, 0x0C, 0x00]), &encoded(0x9A, &[0x00, 0x00]));
    mock.expect_silent(&encoded(start.opcode, &start.payload));
    let mut reader = open(mock).await;

    // Give up on the start long before the command timeout
    let abandoned = tokio::time::timeout(Duration::from_millis(100), reader.start_reading()).await;
    assert!(abandoned.is_err());
    assert_eq!(reader.state(), SessionState::Requesting);

    reader.reset();
    assert_eq!(reader.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn command_after_stop_ignores_late_reports() {
    let mut mock = MockTransport::new();
    script_start(&mut mock);

    let ack = encoded(0x2F, &[0x00, 0x00, 0x00, 0x00, 0x02]);
    let late = tag_report(&[0xDE, 0xAD, 0xBE, 0xEF], -50);
    let mut burst = ack.clone();
    burst.extend_from_slice(&late);
    mock.expect_timed(&stop_request(), &[(Duration::from_millis(20), &burst[..])]);

    let single_read = encoded(0x22, &[0x00, 0x00, 0x03, 0xE8]);
    let reply = encoded(0x22, &[0x00, 0x00, 0x07]);
    mock.expect_timed(&single_read, &[(Duration::from_millis(50), &reply[..])]);

    let mut reader = open(mock).await;
    reader.start_reading().await.unwrap();

    let outcome = reader.stop_reading().await.unwrap();
    assert!(outcome.acknowledged);
    assert!(outcome.tags.is_empty());

    let frame = reader
        .send_command(
            Opcode::ReadTagIdMultiple,
            vec![0x00, 0x00, 0x03, 0xE8],
            Duration::from_millis(500),
        )
        .await
        .unwrap();

    assert_eq!(frame.payload.as_ref(), &[0x00, 0x00, 0x07]);
    assert_eq!(reader.transport().remaining_expectations(), 0);
}
