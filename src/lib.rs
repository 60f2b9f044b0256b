//! Device-side ServiceInfo module for onboarding protocols.
//!
//! During onboarding, an owner service pushes configuration down to a
//! device and pulls results back through ServiceInfo key-value pairs. This
//! crate implements the device half of the `sys` management module: the
//! owner sends file descriptors, file content, command vectors and status
//! polls, and the device answers with chunked file data, end-of-transfer
//! markers and command progress reports, all inside an MTU budget
//! negotiated by the outer protocol.
//!
//! # Architecture
//!
//! - [`DeviceModule`] is the lifecycle controller the host dispatcher
//!   drives, one operation per protocol round ([`Command`] / [`Reply`]).
//! - [`Session`] carries state across rounds; every `hasmore` transition
//!   flows through a pure state machine in [`session`].
//! - [`handler::owner`] and [`handler::device`] are the two round
//!   handlers, plain functions over the session and the collaborators.
//! - [`codec`] wraps the MessagePack wire format in bounded sequential
//!   readers and writers.
//! - [`sys`] holds the [`FileStore`] and [`CommandRunner`] seams with
//!   `std`-backed implementations, so hosts on exotic targets can swap in
//!   their own.
//!
//! # Example
//!
//! ```
//! use serviceinfo_device::{Command, DeviceModule, MemStore, Reply};
//!
//! # fn main() -> serviceinfo_device::Result<()> {
//! struct NoExec;
//! impl serviceinfo_device::CommandRunner for NoExec {
//!     fn run(&mut self, _: &[String]) -> serviceinfo_device::Result<()> { Ok(()) }
//!     fn spawn_monitored(
//!         &mut self,
//!         _: &[String],
//!     ) -> serviceinfo_device::Result<serviceinfo_device::CommandStatus> {
//!         Ok(serviceinfo_device::CommandStatus::default())
//!     }
//!     fn refresh(
//!         &mut self,
//!         _: &mut serviceinfo_device::CommandStatus,
//!     ) -> serviceinfo_device::Result<()> { Ok(()) }
//!     fn cleanup(&mut self) {}
//! }
//!
//! let mut module = DeviceModule::new(MemStore::new(), NoExec);
//! module.dispatch(Command::Start)?;
//!
//! // Owner names a file, then sends its content.
//! let mut name = Vec::new();
//! rmp::encode::write_str(&mut name, "greeting.txt").unwrap();
//! module.dispatch(Command::SetOsi { message: "filedesc", value: &name })?;
//!
//! let mut content = Vec::new();
//! rmp::encode::write_bin(&mut content, b"hello").unwrap();
//! module.dispatch(Command::SetOsi { message: "write", value: &content })?;
//!
//! assert_eq!(module.dispatch(Command::HasMoreDsi)?, Reply::HasMore(false));
//! module.dispatch(Command::End)?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod handler;
pub mod module;
pub mod protocol;
pub mod session;
pub mod sys;

pub use error::{status_of, Result, ServiceInfoError, SiStatus};
pub use handler::DeviceMessage;
pub use module::{Command, DeviceModule, Reply};
pub use protocol::{DeviceKind, OwnerKind};
pub use session::{CommandStatus, ProducerState, Session, TransferStatus};
pub use sys::{CommandRunner, DiskStore, FileStore, MemStore, ProcessRunner};
