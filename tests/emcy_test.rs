// Error set/clear and history ordering (spec.md Section 8, scenario 6).

mod support;

use canopen_rs::emcy::ErrorClass;
use canopen_rs::od::ObjectValue;
use canopen_rs::{Node, NodeId};
use core::convert::TryFrom;
use support::{TestCan, TestTimer};

#[test]
fn three_errors_populate_history_newest_first_and_clearing_one_keeps_history() {
    let mut can = TestCan::new();
    let mut timer = TestTimer::new();
    let node_id = NodeId::try_from(5u8).unwrap();
    let mut node = Node::new(node_id, &mut can, &mut timer, None, 1000);
    node.start(125_000).unwrap();
    can.sent.clear();

    node.raise_error(0xE1, ErrorClass::Generic, [0; 5]).unwrap();
    node.raise_error(0xE2, ErrorClass::Communication, [0; 5]).unwrap();
    node.raise_error(0xE3, ErrorClass::Voltage, [0; 5]).unwrap();
    assert_eq!(can.sent.len(), 3, "each distinct error emits its own EMCY frame");

    assert_eq!(node.read_object(0x1003, 0).unwrap(), ObjectValue::Unsigned32(3));
    assert_eq!(node.read_object(0x1003, 1).unwrap(), ObjectValue::Unsigned32(0xE3));
    assert_eq!(node.read_object(0x1003, 2).unwrap(), ObjectValue::Unsigned32(0xE2));
    assert_eq!(node.read_object(0x1003, 3).unwrap(), ObjectValue::Unsigned32(0xE1));

    can.sent.clear();
    node.clear_error(0xE2, ErrorClass::Communication).unwrap();
    assert!(can.sent.is_empty(), "clearing one error of several leaves the register nonzero");

    // History is untouched by a clear: 0x1003 only resets via an
    // explicit write to sub-index 0.
    assert_eq!(node.read_object(0x1003, 0).unwrap(), ObjectValue::Unsigned32(3));
    assert_eq!(node.read_object(0x1003, 1).unwrap(), ObjectValue::Unsigned32(0xE3));

    can.sent.clear();
    node.clear_error(0xE1, ErrorClass::Generic).unwrap();
    assert!(can.sent.is_empty(), "one error (E3) is still active");

    node.clear_error(0xE3, ErrorClass::Voltage).unwrap();
    assert_eq!(can.sent.len(), 1, "clearing the last active error emits a no-error frame");
    assert_eq!(can.sent[0].payload()[0..3], [0x00, 0x00, 0x00]);
}
