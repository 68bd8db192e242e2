#![cfg_attr(not(feature = "std"), no_std)]

// `alloc` backs the Object Dictionary's entry map and every variable-length
// buffer (strings, domains, SDO transfer buffers). The stack never pulls in
// a full allocator story beyond that — no threads, no async runtime.
extern crate alloc;

// --- Foundation modules ---
pub mod common;
pub mod error;
pub mod hal;
pub mod log;
pub mod types;

// --- Data link layer ---
pub mod frame;

// --- Protocol layers, leaves first (see spec.md Section 2) ---
pub mod timer;
pub mod emcy;
pub mod sdo;
pub mod pdo;
pub mod sync;
pub mod nmt;
pub mod od;

// --- Composition root ---
pub mod node;

// --- Top-level re-exports ---
pub use error::CanOpenError;
pub use frame::CanFrame;
pub use hal::{CanInterface, NvmInterface, TimerInterface};
pub use node::{Node, NodeCallbacks};
pub use types::NodeId;
