// src/timer/wheel.rs
use super::action::{TimerAction, TimerCallback};
use super::event::TimerEvent;
use crate::CanOpenError;
use alloc::vec::Vec;

/// Cooperative software timer wheel driving every periodic service in
/// the stack: heartbeat production, heartbeat consumer guard timeouts,
/// SYNC production, PDO event/inhibit timers, and SDO transfer
/// timeouts (CiA 301 Section 7.4).
///
/// `service` is the only method meant to run from interrupt context —
/// it does a bounded amount of work (decrement the head event, move
/// any now-due events' actions into `elapsed`) and never allocates.
/// `process` drains `elapsed` from the main loop, which is where
/// callbacks actually run and cyclic actions get re-armed.
pub struct TimerWheel {
    events: Vec<TimerEvent>,
    elapsed: Vec<TimerAction>,
    next_id: u32,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            elapsed: Vec::new(),
            next_id: 1,
        }
    }

    /// Schedules `callback` to fire after `ticks` ticks from now. If
    /// `cycle_ticks` is non-zero, the action re-arms itself for that
    /// many ticks every time it fires. Returns an id usable with
    /// `cancel`.
    pub fn schedule(&mut self, ticks: u32, cycle_ticks: u32, callback: TimerCallback) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        let action = TimerAction {
            id,
            cycle_ticks,
            callback,
        };
        self.insert_action(ticks, action);
        id
    }

    fn insert_action(&mut self, ticks: u32, action: TimerAction) {
        let mut remaining = ticks;
        let mut idx = 0;
        while idx < self.events.len() {
            if remaining < self.events[idx].delta {
                self.events[idx].delta -= remaining;
                self.events.insert(idx, TimerEvent::new(remaining, action));
                return;
            }
            remaining -= self.events[idx].delta;
            idx += 1;
        }
        self.events.push(TimerEvent::new(remaining, action));
    }

    /// Cancels a previously scheduled action. Returns
    /// `TimerActionNotFound` if no action with that id is still
    /// pending (it may already have fired as a one-shot).
    pub fn cancel(&mut self, id: u32) -> Result<(), CanOpenError> {
        for event in self.events.iter_mut() {
            if let Some(pos) = event.actions.iter().position(|a| a.id == id) {
                event.actions.remove(pos);
                self.events.retain(|e| !e.actions.is_empty());
                return Ok(());
            }
        }
        Err(CanOpenError::TimerActionNotFound)
    }

    /// ISR-context step: advances the wheel by `ticks` and moves any
    /// action whose event has now elapsed into the `elapsed` queue for
    /// `process` to drain. Bounded by the number of events that fire
    /// within this call, never by the total number of pending events.
    pub fn service(&mut self, ticks: u32) {
        let mut remaining = ticks;
        while remaining > 0 && !self.events.is_empty() {
            if remaining < self.events[0].delta {
                self.events[0].delta -= remaining;
                remaining = 0;
            } else {
                remaining -= self.events[0].delta;
                let event = self.events.remove(0);
                self.elapsed.extend(event.actions);
            }
        }
    }

    /// Main-loop step: drains every elapsed action, invokes `on_fire`
    /// for each, and re-arms cyclic actions for their next period.
    /// Returns the number of actions processed.
    pub fn process<F: FnMut(TimerCallback)>(&mut self, mut on_fire: F) -> usize {
        let fired: Vec<TimerAction> = self.elapsed.drain(..).collect();
        let count = fired.len();
        for action in fired {
            on_fire(action.callback);
            if action.cycle_ticks > 0 {
                self.insert_action(action.cycle_ticks, action);
            }
        }
        count
    }

    /// True if no actions are pending or elapsed.
    pub fn is_idle(&self) -> bool {
        self.events.is_empty() && self.elapsed.is_empty()
    }
}

impl Default for TimerWheel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_action_fires_once() {
        let mut wheel = TimerWheel::new();
        wheel.schedule(5, 0, TimerCallback::SyncProducer);
        wheel.service(4);
        assert_eq!(wheel.process(|_| {}), 0);
        wheel.service(1);
        let mut fired = 0;
        wheel.process(|_| fired += 1);
        assert_eq!(fired, 1);
        assert!(wheel.is_idle());
    }

    #[test]
    fn cyclic_action_rearms_after_firing() {
        let mut wheel = TimerWheel::new();
        wheel.schedule(10, 10, TimerCallback::HeartbeatProducer);
        wheel.service(10);
        let mut fired = 0;
        wheel.process(|_| fired += 1);
        assert_eq!(fired, 1);
        assert!(!wheel.is_idle());
        wheel.service(10);
        wheel.process(|_| fired += 1);
        assert_eq!(fired, 2);
    }

    #[test]
    fn cancel_removes_pending_action() {
        let mut wheel = TimerWheel::new();
        let id = wheel.schedule(100, 0, TimerCallback::SdoClientTimeout);
        wheel.cancel(id).unwrap();
        wheel.service(100);
        assert_eq!(wheel.process(|_| {}), 0);
    }

    #[test]
    fn multiple_actions_interleave_by_due_time() {
        let mut wheel = TimerWheel::new();
        wheel.schedule(20, 0, TimerCallback::SyncProducer);
        wheel.schedule(5, 0, TimerCallback::HeartbeatProducer);
        wheel.service(5);
        let mut fired = Vec::new();
        wheel.process(|cb| fired.push(cb));
        assert_eq!(fired, alloc::vec![TimerCallback::HeartbeatProducer]);
        wheel.service(15);
        fired.clear();
        wheel.process(|cb| fired.push(cb));
        assert_eq!(fired, alloc::vec![TimerCallback::SyncProducer]);
    }
}
