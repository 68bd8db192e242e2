// Heartbeat producer timing (spec.md Section 8, scenario 3).

mod support;

use canopen_rs::nmt::NmtState;
use canopen_rs::od::ObjectValue;
use canopen_rs::{Node, NodeId};
use core::convert::TryFrom;
use support::{run_ticks, TestCan, TestNvm, TestTimer};

#[test]
fn heartbeat_producer_time_arms_a_cyclic_frame_on_0x701() {
    let mut can = TestCan::new();
    let mut timer = TestTimer::new();
    let handle = timer.handle();
    let mut nvm = TestNvm::new();
    let node_id = NodeId::try_from(0x10u8).unwrap();
    let mut node = Node::new(node_id, &mut can, &mut timer, Some(&mut nvm), 1000);

    // 1000 Hz tick rate, so 100ms of producer period is 100 ticks.
    node.write_object(0x1017, 0, ObjectValue::Unsigned16(100)).unwrap();
    node.start(125_000).unwrap();
    can.sent.clear();

    run_ticks(&mut node, &handle, 99);
    assert!(can.sent.is_empty(), "heartbeat must not fire before its period elapses");

    run_ticks(&mut node, &handle, 1);
    assert_eq!(can.sent.len(), 1);
    assert_eq!(can.sent[0].id, 0x710);
    assert_eq!(can.sent[0].payload(), &[0x7F], "Pre-Operational heartbeat byte is 0x7F");
    can.sent.clear();

    run_ticks(&mut node, &handle, 100);
    assert_eq!(can.sent.len(), 1, "heartbeat producer rearms itself every period");

    can.push(canopen_rs::CanFrame::new(0x000, false, &[0x01, 0x10]).unwrap());
    node.process().unwrap();
    assert_eq!(node.nmt_state(), NmtState::Operational);
    can.sent.clear();

    run_ticks(&mut node, &handle, 100);
    assert_eq!(can.sent.len(), 1);
    assert_eq!(can.sent[0].payload(), &[0x05], "Operational heartbeat byte is 0x05");
}
