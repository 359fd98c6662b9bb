//! End-to-end exercises of the public API, one per concrete scenario in
//! spec §8, driven through `Trace`/`ControlParser` rather than the lower
//! `entry`/`buffer` modules those scenarios are also unit-tested against.

use flux_trace::{
    ControlHandler, ControlParser, FluxError, LinearBuffer, MemberType, MessageDirection,
    ParamAccept, ParamValue, RingBuffer, SignalType, Trace,
};

fn head_trace(max_item_id: u64) -> Trace<LinearBuffer> {
    let mut trace = Trace::new(0, 0, max_item_id, 0x0fff);
    trace.set_buffer(LinearBuffer::new(4096)).unwrap();
    trace
}

#[test]
fn scenario_1_head_round_trip() {
    let mut trace = head_trace(0);
    trace.write_head("probe", "t").unwrap();
    let bytes = trace.buffer().unwrap().get();
    assert_eq!(
        bytes,
        &[
            0x00, 0x01, b'f', b'l', b'u', b'x', 0x04, 0x00, 0x05, b'p', b'r', b'o', b'b', b'e',
            0x01, b't', 0x00, 0x00, 0xff, 0x1f,
        ]
    );
}

#[test]
fn scenario_2_minimal_signal_and_sample() {
    let mut trace = head_trace(2);
    trace.define_scope(1, 0, "top", "").unwrap();
    trace
        .define_signal(2, 1, "sig", "", SignalType::Logic, None)
        .unwrap();
    trace.open(0, "ns", 0, 0).unwrap();

    let before = trace.buffer().unwrap().get().len();
    trace
        .write_logic(2, false, 10, false, 0, &[1])
        .unwrap();
    let after = trace.buffer().unwrap().get();
    let sample = &after[before..];
    assert_eq!(sample, &[0x12, 0x0a, 0x11, 0x01]);
}

#[test]
fn scenario_3_monotonicity_violation_commits_nothing() {
    let mut trace = head_trace(2);
    trace.define_scope(1, 0, "top", "").unwrap();
    trace
        .define_signal(2, 1, "sig", "", SignalType::Logic, None)
        .unwrap();
    trace.open(0, "ns", 0, 0).unwrap();
    trace.write_logic(2, false, 10, false, 0, &[1]).unwrap();

    let before = trace.buffer().unwrap().get().len();
    let result = trace.write_logic(2, false, 5, false, 0, &[1]);
    assert!(matches!(result, Err(FluxError::PositionLessThanCurrent)));
    let after = trace.buffer().unwrap().get().len();
    assert_eq!(before, after, "no bytes should be committed on rejection");
}

#[test]
fn scenario_4_ring_recycle() {
    let mut ring = RingBuffer::new(256 * 3);
    ring.write_section_entries(256, 3).unwrap();
    ring.seccommit(
        256,
        3,
        Box::new(|slice| {
            slice[0] = b'H';
            Ok(1)
        }),
    )
    .unwrap();

    // Writing 700 bytes in 40-byte chunks across 3x256-byte sections advances
    // twice (section 0 -> 1 -> 2), so the last section is entered once: its
    // counter is 1 with the 0x80 "last section" bit set.
    let mut remaining = 700usize;
    while remaining > 0 {
        let chunk = remaining.min(40);
        ring.request(chunk).unwrap();
        ring.commit(&vec![0xab; chunk]).unwrap();
        remaining -= chunk;
    }
    assert_eq!(ring.section_counter(2).unwrap(), 1 | 0x80);
}

#[derive(Default)]
struct EchoHandler {
    entered: Vec<(u64, u64)>,
    left: Vec<(u64, u64)>,
}

impl ControlHandler for EchoHandler {
    fn enter_message(&mut self, _direction: MessageDirection, control_id: u64, message_id: u64) {
        self.entered.push((control_id, message_id));
    }

    fn accept_parameter(
        &mut self,
        _control_id: u64,
        _message_id: u64,
        _member_id: u64,
        _kind: MemberType,
    ) -> ParamAccept {
        ParamAccept::Skip
    }

    fn parameter(&mut self, _control_id: u64, _message_id: u64, _member_id: u64, _value: ParamValue) {}

    fn leave_message(&mut self, _direction: MessageDirection, control_id: u64, message_id: u64) {
        self.left.push((control_id, message_id));
    }
}

#[test]
fn scenario_5_control_round_trip() {
    use flux_trace::SinkCommand;
    use flux_trace::SinkHandle;

    let inbound = [0x00u8, 0x80, 0x01, 0x02, 0x00];
    let mut parser = ControlParser::new(EchoHandler::default());
    let consumed = parser.handle(SinkCommand::Flush, &inbound).unwrap();
    assert_eq!(consumed, inbound.len());
    assert_eq!(&parser.handler().entered, &[(1, 2)]);
    assert_eq!(&parser.handler().left, &[(1, 2)]);

    let mut out = LinearBuffer::new(64);
    flux_trace::entry::write_control_res(&mut out, 1, 2, &[]).unwrap();
    assert_eq!(out.get(), &[0x00, 0x81, 0x01, 0x02, 0x00]);
}

#[test]
fn scenario_6_open_propagation() {
    let mut trace = head_trace(5);
    trace.define_scope(1, 0, "a", "").unwrap();
    trace.define_scope(2, 1, "b", "").unwrap();
    trace.define_scope(3, 2, "c", "").unwrap();
    trace
        .define_signal(4, 2, "s4", "", SignalType::Event, None)
        .unwrap();
    trace
        .define_signal(5, 3, "s5", "", SignalType::Event, None)
        .unwrap();

    trace.open(2, "ns", 0, 0).unwrap();
    let result = trace.open(1, "ns", 0, 0);
    assert!(matches!(result, Err(FluxError::ChildrenAlreadyOpen)));
}
