//! External collaborators of the store
//!
//! This module contains the persistence gateway and the import/export file
//! contract.

pub mod storage;
pub mod transfer;

// Re-export main types
pub use storage::*;
pub use transfer::{export_timers, parse_import, read_import_file, TransferError};
