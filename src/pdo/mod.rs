// src/pdo/mod.rs
pub mod error;
pub mod link;
pub mod mapping;
pub mod rpdo;
pub mod tpdo;

pub use error::PdoError;
pub use link::{MappingLink, MappingLinkTable};
pub use mapping::{PdoMapping, PdoMappingEntry};
pub use rpdo::Rpdo;
pub use tpdo::{Tpdo, TransmissionType};
