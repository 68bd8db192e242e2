// Boot sequence, NMT command handling, and SYNC-triggered PDO
// transmission (spec.md Section 8, scenario 2).

mod support;

use canopen_rs::nmt::NmtState;
use canopen_rs::od::{AccessFlags, ObjectEntry, ObjectValue};
use canopen_rs::{CanFrame, Node, NodeId};
use core::convert::TryFrom;
use support::{TestCan, TestTimer};

#[test]
fn boot_up_emits_one_frame_then_start_enters_operational_and_sync_triggers_tpdo() {
    let mut can = TestCan::new();
    let mut timer = TestTimer::new();
    let node_id = NodeId::try_from(1u8).unwrap();
    let mut node = Node::new(node_id, &mut can, &mut timer, None, 1000);

    node.dictionary_mut().insert(ObjectEntry::scalar(
        0x2000,
        0,
        ObjectValue::Unsigned16(0),
        AccessFlags::RW.rw_async(),
    ));
    node.add_tpdo(0);
    node.write_object(0x1A00, 1, ObjectValue::Unsigned32(0x2000_00_10))
        .unwrap();
    node.write_object(0x1A00, 0, ObjectValue::Unsigned8(1)).unwrap();
    // Synchronous, every SYNC (transmission type 1).
    node.write_object(0x1800, 2, ObjectValue::Unsigned8(1)).unwrap();

    node.start(125_000).unwrap();
    assert_eq!(node.nmt_state(), NmtState::PreOperational);
    assert_eq!(can.sent.len(), 1, "boot-up emits exactly one frame");
    assert_eq!(can.sent[0].id, 0x701);
    assert_eq!(can.sent[0].payload(), &[0x00]);
    can.sent.clear();

    can.push(CanFrame::new(0x000, false, &[0x01, 0x01]).unwrap());
    node.process().unwrap();
    assert_eq!(node.nmt_state(), NmtState::Operational);

    // Write the mapped object once; nothing has gone out onto the SYNC
    // COB-ID yet, so no TPDO has fired.
    node.write_object(0x2000, 0, ObjectValue::Unsigned16(0x1234))
        .unwrap();
    assert!(can.sent.is_empty(), "transmission type 1 only fires on SYNC");

    can.push(CanFrame::new(0x080, false, &[]).unwrap());
    node.process().unwrap();
    assert_eq!(can.sent.len(), 1, "SYNC must trigger the due cyclic TPDO");
    assert_eq!(can.sent[0].id, 0x181);
    assert_eq!(can.sent[0].payload(), &[0x34, 0x12]);
}
