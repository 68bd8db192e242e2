// src/nmt/state_machine.rs
use super::events::NmtEvent;
use super::states::NmtState;
use crate::types::NodeId;

/// Protocol categories an inbound frame can belong to, gated per NMT
/// state (spec.md Section 4.7 "allowed-messages mask").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCategory {
    Nmt,
    Sync,
    Emcy,
    Pdo,
    Sdo,
    Heartbeat,
}

/// A bitmask of `MessageCategory` values permitted in a given NMT
/// state. NMT commands themselves are always accepted in every state;
/// this mask governs everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedMessages(u8);

impl AllowedMessages {
    const NMT: u8 = 1 << 0;
    const SYNC: u8 = 1 << 1;
    const EMCY: u8 = 1 << 2;
    const PDO: u8 = 1 << 3;
    const SDO: u8 = 1 << 4;
    const HEARTBEAT: u8 = 1 << 5;

    pub const fn for_state(state: NmtState) -> Self {
        match state {
            NmtState::Initialisation => Self(Self::NMT),
            NmtState::Stopped => Self(Self::NMT | Self::HEARTBEAT),
            NmtState::PreOperational => {
                Self(Self::NMT | Self::SYNC | Self::EMCY | Self::SDO | Self::HEARTBEAT)
            }
            NmtState::Operational => Self(
                Self::NMT | Self::SYNC | Self::EMCY | Self::PDO | Self::SDO | Self::HEARTBEAT,
            ),
        }
    }

    pub fn allows(&self, category: MessageCategory) -> bool {
        let bit = match category {
            MessageCategory::Nmt => Self::NMT,
            MessageCategory::Sync => Self::SYNC,
            MessageCategory::Emcy => Self::EMCY,
            MessageCategory::Pdo => Self::PDO,
            MessageCategory::Sdo => Self::SDO,
            MessageCategory::Heartbeat => Self::HEARTBEAT,
        };
        self.0 & bit != 0
    }
}

/// Outcome of feeding an `NmtEvent` through the state machine: the new
/// state, whether it changed, and whether a reset cascade (and which
/// one) must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NmtTransition {
    pub state: NmtState,
    pub changed: bool,
    pub reset: Option<ResetScope>,
}

/// Which parameter groups a reset command re-initialises (spec.md
/// Section 4.7's NMT command table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// NMT command 0x81: restores parameters of type "node" then
    /// reinitialises the whole stack.
    Node,
    /// NMT command 0x82: restores communication parameters and
    /// reinitialises SDO/PDO/SYNC/EMCY/LSS.
    Communication,
}

/// CiA 301's five-mode NMT slave state machine (spec.md Section 4.7).
/// Owns only the current mode; `Node` holds the `NodeId` this machine
/// reasons about and drives heartbeat production/consumption off of
/// `TimerCallback` events the timer wheel reports back.
#[derive(Debug, Clone, Copy)]
pub struct NmtStateMachine {
    node_id: NodeId,
    state: NmtState,
}

impl NmtStateMachine {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            state: NmtState::Initialisation,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn state(&self) -> NmtState {
        self.state
    }

    pub fn allowed_messages(&self) -> AllowedMessages {
        AllowedMessages::for_state(self.state)
    }

    /// Applies one NMT event (spec.md Section 4.7 transition table),
    /// returning the resulting state and, for reset commands, which
    /// reset cascade the caller must run before re-entering
    /// Pre-Operational.
    pub fn process(&mut self, event: NmtEvent) -> NmtTransition {
        let previous = self.state;
        let (next, reset) = match event {
            NmtEvent::PowerOn => (NmtState::Initialisation, None),
            NmtEvent::Start => (NmtState::Operational, None),
            NmtEvent::Stop => (NmtState::Stopped, None),
            NmtEvent::EnterPreOperational => (NmtState::PreOperational, None),
            NmtEvent::ResetNode => (NmtState::Initialisation, Some(ResetScope::Node)),
            NmtEvent::ResetCommunication => {
                (NmtState::Initialisation, Some(ResetScope::Communication))
            }
        };
        self.state = next;
        NmtTransition {
            state: next,
            changed: next != previous,
            reset,
        }
    }

    /// Completes the boot sequence: Initialisation -> Pre-Operational,
    /// emitting the bootup heartbeat (spec.md Section 4.7, "Init ->
    /// boot-up complete -> PreOperational").
    pub fn finish_boot(&mut self) {
        self.state = NmtState::PreOperational;
    }

    /// The one data byte a heartbeat/bootup frame carries for the
    /// current state (spec.md Section 4.7).
    pub fn heartbeat_byte(&self) -> u8 {
        self.state as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::TryFrom;

    fn machine() -> NmtStateMachine {
        NmtStateMachine::new(NodeId::try_from(1u8).unwrap())
    }

    #[test]
    fn boot_sequence_reaches_pre_operational() {
        let mut nmt = machine();
        assert_eq!(nmt.state(), NmtState::Initialisation);
        nmt.finish_boot();
        assert_eq!(nmt.state(), NmtState::PreOperational);
        assert_eq!(nmt.heartbeat_byte(), 127);
    }

    #[test]
    fn start_command_enters_operational_and_enables_pdo() {
        let mut nmt = machine();
        nmt.finish_boot();
        let t = nmt.process(NmtEvent::Start);
        assert_eq!(t.state, NmtState::Operational);
        assert!(t.changed);
        assert!(nmt.allowed_messages().allows(MessageCategory::Pdo));
    }

    #[test]
    fn pre_operational_disallows_pdo() {
        let mut nmt = machine();
        nmt.finish_boot();
        assert!(!nmt.allowed_messages().allows(MessageCategory::Pdo));
        assert!(nmt.allowed_messages().allows(MessageCategory::Sdo));
    }

    #[test]
    fn reset_node_reports_node_scope() {
        let mut nmt = machine();
        nmt.finish_boot();
        let t = nmt.process(NmtEvent::ResetNode);
        assert_eq!(t.state, NmtState::Initialisation);
        assert_eq!(t.reset, Some(ResetScope::Node));
    }

    #[test]
    fn stopped_state_only_allows_nmt_and_heartbeat() {
        let mut nmt = machine();
        nmt.finish_boot();
        nmt.process(NmtEvent::Stop);
        let mask = nmt.allowed_messages();
        assert!(mask.allows(MessageCategory::Heartbeat));
        assert!(!mask.allows(MessageCategory::Sdo));
        assert!(!mask.allows(MessageCategory::Pdo));
    }
}
