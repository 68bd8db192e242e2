// src/nmt/states.rs

/// The five CiA 301 NMT states a slave can occupy (Section 7.3.2). A
/// node transitions through `Initialisation` once at power-up before
/// ever being addressable, then moves freely between
/// `PreOperational`/`Operational`/`Stopped` under NMT master control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NmtState {
    Initialisation = 0,
    Stopped = 4,
    Operational = 5,
    PreOperational = 127,
}

impl NmtState {
    /// True if PDOs may be exchanged in this state (CiA 301 Table 68).
    pub fn pdo_active(&self) -> bool {
        matches!(self, NmtState::Operational)
    }

    /// True if NMT and SDO services are processed in this state.
    pub fn services_active(&self) -> bool {
        !matches!(self, NmtState::Initialisation)
    }
}
