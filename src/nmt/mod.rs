// src/nmt/mod.rs
pub mod events;
pub mod heartbeat;
pub mod state_machine;
pub mod states;

pub use events::NmtEvent;
pub use heartbeat::{decode_consumer_entry, HeartbeatConsumerEntry, HeartbeatConsumers};
pub use state_machine::{AllowedMessages, MessageCategory, NmtStateMachine, NmtTransition, ResetScope};
pub use states::NmtState;
