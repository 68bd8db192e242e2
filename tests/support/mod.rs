// tests/support/mod.rs
//
// In-memory driver test doubles shared across the integration tests,
// in the spirit of the teacher's `tests/simulator/` harness: a virtual
// bus standing in for the CAN transceiver, a manually-advanced timer,
// and a byte-vector NVM. None of these ever block.

use canopen_rs::{CanFrame, CanOpenError, CanInterface, NvmInterface, TimerInterface};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A CAN transceiver double: frames `send` writes land in `sent`;
/// frames queued onto `inbox` are handed back in order by `receive`.
pub struct TestCan {
    pub inbox: VecDeque<CanFrame>,
    pub sent: Vec<CanFrame>,
}

impl TestCan {
    pub fn new() -> Self {
        Self {
            inbox: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    pub fn push(&mut self, frame: CanFrame) {
        self.inbox.push_back(frame);
    }
}

impl CanInterface for TestCan {
    fn init(&mut self) -> Result<(), CanOpenError> {
        Ok(())
    }
    fn enable(&mut self, _baudrate: u32) -> Result<(), CanOpenError> {
        Ok(())
    }
    fn send(&mut self, frame: &CanFrame) -> Result<(), CanOpenError> {
        self.sent.push(*frame);
        Ok(())
    }
    fn receive(&mut self) -> Result<Option<CanFrame>, CanOpenError> {
        Ok(self.inbox.pop_front())
    }
    fn reset(&mut self) -> Result<(), CanOpenError> {
        Ok(())
    }
    fn close(&mut self) -> Result<(), CanOpenError> {
        Ok(())
    }
}

/// A timer driver double. `Node` takes its `TimerInterface` by exclusive
/// reference for the node's whole lifetime, so the pending-tick counter
/// lives behind an `Rc<Cell<_>>` the test keeps a second handle to —
/// the same shared-ownership trick the teacher's harness uses for its
/// `Rc<RefCell<SimulatedInterface>>` network handle. `TestTimerHandle::advance`
/// is how a test queues elapsed ticks without fighting the node's borrow.
pub struct TestTimer {
    pending_ticks: Rc<Cell<u32>>,
}

#[derive(Clone)]
pub struct TestTimerHandle {
    pending_ticks: Rc<Cell<u32>>,
}

impl TestTimerHandle {
    /// Queues `ticks` worth of elapsed time for the next `update()` call.
    pub fn advance(&self, ticks: u32) {
        self.pending_ticks.set(self.pending_ticks.get() + ticks);
    }
}

impl TestTimer {
    pub fn new() -> Self {
        Self {
            pending_ticks: Rc::new(Cell::new(0)),
        }
    }

    pub fn handle(&self) -> TestTimerHandle {
        TestTimerHandle {
            pending_ticks: self.pending_ticks.clone(),
        }
    }
}

impl TimerInterface for TestTimer {
    fn init(&mut self, _freq_hz: u32) -> Result<(), CanOpenError> {
        Ok(())
    }
    fn reload(&mut self, _ticks: u32) -> Result<(), CanOpenError> {
        Ok(())
    }
    fn delay(&mut self) -> Result<u32, CanOpenError> {
        Ok(self.pending_ticks.get())
    }
    fn stop(&mut self) -> Result<(), CanOpenError> {
        Ok(())
    }
    fn start(&mut self) -> Result<(), CanOpenError> {
        Ok(())
    }
    fn update(&mut self) -> Result<bool, CanOpenError> {
        let remaining = self.pending_ticks.get();
        if remaining > 0 {
            self.pending_ticks.set(remaining - 1);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// A flat byte-vector standing in for non-volatile storage, backing
/// parameter store/restore (Object 0x1010/0x1011).
pub struct TestNvm {
    bytes: Vec<u8>,
}

impl TestNvm {
    pub fn new() -> Self {
        Self {
            bytes: vec![0u8; 4096],
        }
    }
}

impl NvmInterface for TestNvm {
    fn init(&mut self) -> Result<(), CanOpenError> {
        Ok(())
    }
    fn read(&mut self, offset: u32, buffer: &mut [u8], size: usize) -> Result<usize, CanOpenError> {
        let offset = offset as usize;
        let n = size.min(buffer.len()).min(self.bytes.len().saturating_sub(offset));
        buffer[..n].copy_from_slice(&self.bytes[offset..offset + n]);
        Ok(n)
    }
    fn write(&mut self, offset: u32, buffer: &[u8], size: usize) -> Result<usize, CanOpenError> {
        let offset = offset as usize;
        let n = size.min(buffer.len());
        if offset + n > self.bytes.len() {
            self.bytes.resize(offset + n, 0);
        }
        self.bytes[offset..offset + n].copy_from_slice(&buffer[..n]);
        Ok(n)
    }
}

/// Advances the wheel by one tick and drains `node.process()`, repeated
/// `ticks` times, so cyclic actions fire in the right order relative to
/// any frames queued in between.
pub fn run_ticks(node: &mut canopen_rs::Node<'_>, timer: &TestTimerHandle, ticks: u32) {
    for _ in 0..ticks {
        timer.advance(1);
        node.process().unwrap();
    }
}
