// src/timer/event.rs
use super::action::TimerAction;
use alloc::vec::Vec;

/// A bucket of actions due to fire at the same tick, plus the delta
/// (in ticks) from the previous event in the wheel's ordered list.
///
/// The originating C implementation links events through a delta chain
/// so `service()` only has to decrement one counter per ISR tick
/// regardless of how many actions are pending; this struct keeps that
/// shape, backed by a plain sorted `Vec` instead of an intrusive linked
/// list since the crate already uses `alloc` freely elsewhere.
#[derive(Debug)]
pub struct TimerEvent {
    pub delta: u32,
    pub actions: Vec<TimerAction>,
}

impl TimerEvent {
    pub fn new(delta: u32, action: TimerAction) -> Self {
        let mut actions = Vec::with_capacity(1);
        actions.push(action);
        Self { delta, actions }
    }
}
