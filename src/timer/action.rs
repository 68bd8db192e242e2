// src/timer/action.rs

/// What a fired timer action means to the rest of the stack. The wheel
/// itself never calls back into `Node` directly — it only ever hands
/// these tags back from `TimerWheel::process`, and `Node` matches on
/// them. This keeps the wheel ignorant of NMT/PDO/SDO state, the same
/// separation the originating C implementation gets for free by storing
/// a raw function pointer per action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCallback {
    /// 0x1017 elapsed: time to transmit another heartbeat.
    HeartbeatProducer,
    /// A consumed node's guard time elapsed without a heartbeat.
    HeartbeatConsumer { index: u8 },
    /// 0x1006 elapsed: time to transmit SYNC.
    SyncProducer,
    /// A TPDO's event timer (0x1800 sub 5) elapsed.
    PdoEventTimer { channel: u8 },
    /// A TPDO's inhibit window (0x1800 sub 3) elapsed; a pending
    /// on-change transmission may now go out.
    PdoInhibitElapsed { channel: u8 },
    /// An SDO server segment/block transfer's idle timeout elapsed.
    SdoServerTimeout,
    /// An SDO client transfer's response timeout elapsed.
    SdoClientTimeout,
}

/// One scheduled timer action. `cycle_ticks == 0` marks a one-shot
/// action that is not re-armed after it fires.
#[derive(Debug, Clone, Copy)]
pub struct TimerAction {
    pub id: u32,
    pub cycle_ticks: u32,
    pub callback: TimerCallback,
}
