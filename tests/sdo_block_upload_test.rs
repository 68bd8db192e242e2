// SDO block upload of a large domain object (spec.md Section 8,
// scenario 5): a 200-byte domain split into 7-byte segments needs 29 of
// them, so the single block (size 127) finishes the whole transfer and
// the trailing segment carries only 4 valid bytes.

mod support;

use canopen_rs::od::{AccessFlags, ObjectEntry, ObjectValue};
use canopen_rs::{CanFrame, Node, NodeId};
use core::convert::TryFrom;
use support::{TestCan, TestTimer};

#[test]
fn block_upload_of_200_byte_domain_completes_in_one_block() {
    let mut can = TestCan::new();
    let mut timer = TestTimer::new();
    let node_id = NodeId::try_from(1u8).unwrap();
    let mut node = Node::new(node_id, &mut can, &mut timer, None, 1000);

    let payload: Vec<u8> = (0..200u32).map(|i| (i % 256) as u8).collect();
    node.dictionary_mut().insert(ObjectEntry::scalar(
        0x3000,
        0,
        ObjectValue::Domain(vec![0u8; 200]),
        AccessFlags::RW,
    ));
    node.write_object(0x3000, 0, ObjectValue::Domain(payload.clone()))
        .unwrap();
    node.start(125_000).unwrap();
    can.sent.clear();

    // Initiate block upload, requesting block size 127.
    can.push(
        CanFrame::new_padded(0x601, false, &[0xA0, 0x00, 0x30, 0x00, 127, 0, 0, 0]).unwrap(),
    );
    node.process().unwrap();
    assert_eq!(can.sent.len(), 1);
    assert_eq!(can.sent[0].payload()[0], 0xC2);
    assert_eq!(
        u32::from_le_bytes(can.sent[0].payload()[3..7].try_into().unwrap()),
        200
    );
    can.sent.clear();

    // Start the block transfer (0xA3).
    can.push(CanFrame::new_padded(0x601, false, &[0xA3, 0, 0, 0, 0, 0, 0, 0]).unwrap());
    node.process().unwrap();
    assert_eq!(can.sent.len(), 29, "200 bytes / 7 per segment rounds up to 29 segments");
    for (i, frame) in can.sent.iter().enumerate() {
        let seq = (i + 1) as u8;
        if i + 1 < 29 {
            assert_eq!(frame.payload()[0], seq);
        } else {
            assert_eq!(frame.payload()[0], seq | 0x80, "last segment sets the continuation bit");
        }
    }
    assert_eq!(&can.sent[0].payload()[1..8], &payload[0..7]);
    assert_eq!(&can.sent[28].payload()[1..5], &payload[196..200]);
    can.sent.clear();

    // Ack the whole block at seq 29, keeping the block size.
    can.push(CanFrame::new_padded(0x601, false, &[0xA2, 29, 0, 0, 0, 0, 0, 0]).unwrap());
    node.process().unwrap();
    assert_eq!(can.sent.len(), 1);
    // 4 valid bytes in the last segment means 3 unused trailing bytes.
    assert_eq!(can.sent[0].payload()[0], 0xA1 | (3 << 2));
}
