//! File and process collaborators.
//!
//! The protocol core treats storage and command execution as black boxes
//! behind the [`FileStore`] and [`CommandRunner`] traits. Std-backed
//! implementations live here; hosts with unusual environments (no
//! filesystem, sandboxed exec) supply their own.

mod exec;
mod file;

pub use exec::{CommandRunner, ProcessRunner};
pub use file::{DiskStore, FileStore, MemStore};
