// src/hal.rs
//
// Boundary traits a host application implements once per platform. The
// core stack never touches a peripheral register directly; it only ever
// calls through these three traits, so the same `Node` runs unmodified
// against a socketCAN driver, a microcontroller's bxCAN peripheral, or a
// bus simulator under test.
use crate::frame::CanFrame;
use crate::CanOpenError;

/// Drives a single CAN controller. All methods are non-blocking:
/// `receive` returns `Ok(None)` rather than waiting when no frame is
/// pending, and `send` returns an error rather than blocking when the
/// transmit queue is full.
pub trait CanInterface {
    /// One-time hardware initialisation. Called once before `enable`.
    fn init(&mut self) -> Result<(), CanOpenError>;

    /// Sets the bus bit rate (in bit/s) and moves the controller onto
    /// the bus. Safe to call again after `reset` to change bit rate.
    fn enable(&mut self, baudrate: u32) -> Result<(), CanOpenError>;

    /// Queues a frame for transmission. Returns `CanSendError` if the
    /// transmit queue is full or the controller is bus-off.
    fn send(&mut self, frame: &CanFrame) -> Result<(), CanOpenError>;

    /// Polls for one received frame, if any is pending.
    fn receive(&mut self) -> Result<Option<CanFrame>, CanOpenError>;

    /// Takes the controller off the bus without losing configuration.
    fn reset(&mut self) -> Result<(), CanOpenError>;

    /// Releases the underlying peripheral entirely.
    fn close(&mut self) -> Result<(), CanOpenError>;
}

/// Drives the single hardware timer backing the timer wheel. The
/// stack only ever asks for "how many ticks have elapsed" and "call me
/// back in N ticks" — it never assumes a particular tick frequency.
pub trait TimerInterface {
    /// Configures the timer to free-run at `freq_hz` ticks per second.
    fn init(&mut self, freq_hz: u32) -> Result<(), CanOpenError>;

    /// Arms the timer to fire after `ticks` counts from now.
    fn reload(&mut self, ticks: u32) -> Result<(), CanOpenError>;

    /// Returns the number of ticks elapsed since the timer was last
    /// reloaded or started, without side effects.
    fn delay(&mut self) -> Result<u32, CanOpenError>;

    fn stop(&mut self) -> Result<(), CanOpenError>;
    fn start(&mut self) -> Result<(), CanOpenError>;

    /// Called from interrupt or poll context; returns `true` exactly
    /// once per elapsed period so the caller knows to drive the timer
    /// wheel's `service` step.
    fn update(&mut self) -> Result<bool, CanOpenError>;
}

/// Drives the non-volatile storage region backing parameter group
/// store/restore (Object 0x1010/0x1011).
pub trait NvmInterface {
    fn init(&mut self) -> Result<(), CanOpenError>;

    /// Reads up to `size` bytes starting at `offset` into `buffer`.
    /// Returns the number of bytes actually read.
    fn read(&mut self, offset: u32, buffer: &mut [u8], size: usize) -> Result<usize, CanOpenError>;

    /// Writes up to `size` bytes from `buffer` starting at `offset`.
    /// Returns the number of bytes actually written.
    fn write(&mut self, offset: u32, buffer: &[u8], size: usize) -> Result<usize, CanOpenError>;
}
