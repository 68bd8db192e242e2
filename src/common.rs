use crate::types::UNSIGNED32;

/// A 64-bit TIME_OF_DAY value: days since the CANopen epoch plus
/// milliseconds since midnight. (CiA 301, Section 7.1.6.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub milliseconds: UNSIGNED32,
    pub days: u16,
}

/// A 64-bit TIME_DIFFERENCE value, same wire shape as `TimeOfDay`.
/// (CiA 301, Section 7.1.6.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeDifference {
    pub milliseconds: UNSIGNED32,
    pub days: u16,
}

/// A timer-wheel-relative timestamp, used by EMCY history entries to
/// record the tick count at which an error was set or cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetTime {
    pub seconds: UNSIGNED32,
    pub nanoseconds: UNSIGNED32,
}
