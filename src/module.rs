//! Lifecycle controller - maps dispatcher operations onto the module.
//!
//! The external dispatcher drives one operation per protocol round:
//! Start/End/Failure manage the codec contexts, HasMoreDsi/IsMoreDsi/
//! GetDsiCount are pure queries, SetOsi feeds one owner message in and
//! GetDsi asks for the next device message. Any failed round resets the
//! transient session flags so the next round starts clean.

use log::{debug, warn};

use crate::codec::{Reader, Writer};
use crate::error::{Result, ServiceInfoError};
use crate::handler::{device, owner, DeviceMessage};
use crate::protocol::{OwnerKind, MAX_BUFFER_SIZE};
use crate::session::Session;
use crate::sys::{CommandRunner, DiskStore, FileStore, ProcessRunner};

/// One dispatcher operation.
#[derive(Debug, Clone, Copy)]
pub enum Command<'a> {
    /// Allocate the codec contexts for a new onboarding exchange.
    Start,
    /// Exchange finished; release everything.
    End,
    /// Exchange failed upstream; release everything.
    Failure,
    /// Does the device have a message ready to send now?
    HasMoreDsi,
    /// Will the device have a message ready next round?
    IsMoreDsi,
    /// How many messages will GetDsi produce this round? (Always 1.)
    GetDsiCount,
    /// Produce the next device message under the MTU budget.
    GetDsi { mtu: usize },
    /// Consume one owner message.
    SetOsi { message: &'a str, value: &'a [u8] },
}

/// Reply to a dispatcher operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The operation completed with nothing to report.
    Done,
    /// Answer to [`Command::HasMoreDsi`].
    HasMore(bool),
    /// Answer to [`Command::IsMoreDsi`].
    IsMore(bool),
    /// Answer to [`Command::GetDsiCount`].
    Count(u16),
    /// Answer to [`Command::GetDsi`].
    Message(DeviceMessage),
}

/// The device-side ServiceInfo module.
///
/// Owns the session, one codec reader and one codec writer (created at
/// Start, reused across rounds) and the file/execution collaborators.
/// Single-threaded by contract: the dispatcher waits for each call to
/// return before issuing the next one.
pub struct DeviceModule<F: FileStore, R: CommandRunner> {
    files: F,
    runner: R,
    session: Session,
    reader: Option<Reader>,
    writer: Option<Writer>,
}

impl DeviceModule<DiskStore, ProcessRunner> {
    /// Module wired to the local filesystem and `std::process`.
    pub fn with_defaults() -> Self {
        Self::new(DiskStore::new(), ProcessRunner::new())
    }
}

impl<F: FileStore, R: CommandRunner> DeviceModule<F, R> {
    /// Create a module over the given collaborators. No codec context
    /// exists until [`start`](Self::start).
    pub fn new(files: F, runner: R) -> Self {
        Self {
            files,
            runner,
            session: Session::new(),
            reader: None,
            writer: None,
        }
    }

    /// Begin an onboarding exchange: fresh session, codec contexts with a
    /// fixed maximum buffer size. Idempotent.
    pub fn start(&mut self) -> Result<()> {
        self.session = Session::new();
        self.reader = Some(Reader::new(MAX_BUFFER_SIZE));
        self.writer = Some(Writer::new(MAX_BUFFER_SIZE));
        debug!("module started (buffer capacity {MAX_BUFFER_SIZE})");
        Ok(())
    }

    /// Tear down after End or Failure: exit cleanup pass through the
    /// execution collaborator, then release the codec contexts. Safe to
    /// call at any round, whatever branch was mid-flight.
    pub fn end(&mut self) -> Result<()> {
        self.runner.cleanup();
        self.reader = None;
        self.writer = None;
        self.session = Session::new();
        debug!("module stopped");
        Ok(())
    }

    /// Whether the device has a message ready to send now.
    pub fn has_more_dsi(&self) -> bool {
        self.session.hasmore
    }

    /// Whether the device will have a message ready next round.
    /// Conservatively always `false`.
    pub fn is_more_dsi(&self) -> bool {
        self.session.ismore()
    }

    /// Number of messages the next GetDsi round emits. Always 1.
    pub fn dsi_count(&self) -> u16 {
        1
    }

    /// Current session, for host introspection.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The file collaborator.
    pub fn files(&self) -> &F {
        &self.files
    }

    /// The file collaborator, mutably. Hosts preload files the owner may
    /// fetch through here.
    pub fn files_mut(&mut self) -> &mut F {
        &mut self.files
    }

    /// The execution collaborator.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// The execution collaborator, mutably.
    pub fn runner_mut(&mut self) -> &mut R {
        &mut self.runner
    }

    /// Consume one owner message. On failure the transient session flags
    /// are reset so the protocol can continue on the next round.
    pub fn set_osi(&mut self, message: &str, value: &[u8]) -> Result<()> {
        let result = self.process_osi(message, value);
        if let Err(e) = &result {
            warn!("SetOsi '{message}' failed: {e}");
            self.session.reset_transient();
        }
        result
    }

    /// Produce the next device message under `mtu`. On failure the
    /// transient session flags are reset.
    pub fn get_dsi(&mut self, mtu: usize) -> Result<DeviceMessage> {
        let result = self.produce_dsi(mtu);
        if let Err(e) = &result {
            warn!("GetDsi failed: {e}");
            self.session.reset_transient();
        }
        result
    }

    /// Dispatcher entry point: one call per protocol round.
    pub fn dispatch(&mut self, command: Command<'_>) -> Result<Reply> {
        match command {
            Command::Start => self.start().map(|_| Reply::Done),
            Command::End | Command::Failure => self.end().map(|_| Reply::Done),
            Command::HasMoreDsi => Ok(Reply::HasMore(self.has_more_dsi())),
            Command::IsMoreDsi => Ok(Reply::IsMore(self.is_more_dsi())),
            Command::GetDsiCount => Ok(Reply::Count(self.dsi_count())),
            Command::GetDsi { mtu } => self.get_dsi(mtu).map(Reply::Message),
            Command::SetOsi { message, value } => {
                self.set_osi(message, value).map(|_| Reply::Done)
            }
        }
    }

    fn process_osi(&mut self, message: &str, value: &[u8]) -> Result<()> {
        let kind = OwnerKind::parse(message)?;
        if value.len() > MAX_BUFFER_SIZE {
            return Err(ServiceInfoError::content(format!(
                "owner value size {} exceeds buffer capacity {MAX_BUFFER_SIZE}",
                value.len()
            )));
        }
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| ServiceInfoError::state("module not started"))?;
        reader.reset(value)?;
        owner::process(
            &mut self.session,
            reader,
            &mut self.files,
            &mut self.runner,
            kind,
        )
    }

    fn produce_dsi(&mut self, mtu: usize) -> Result<DeviceMessage> {
        if mtu == 0 {
            return Err(ServiceInfoError::content("MTU must be positive"));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ServiceInfoError::state("module not started"))?;
        if !self.session.hasmore {
            return Err(ServiceInfoError::state("no ServiceInfo pending"));
        }
        device::produce(&mut self.session, writer, &self.files, mtu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DeviceKind;
    use crate::session::{CommandStatus, ProducerState};
    use crate::sys::MemStore;

    #[derive(Default)]
    struct MockRunner {
        spawned: usize,
        cleanups: usize,
    }

    impl CommandRunner for MockRunner {
        fn run(&mut self, _args: &[String]) -> Result<()> {
            Ok(())
        }
        fn spawn_monitored(&mut self, _args: &[String]) -> Result<CommandStatus> {
            self.spawned += 1;
            Ok(CommandStatus::default())
        }
        fn refresh(&mut self, _status: &mut CommandStatus) -> Result<()> {
            Ok(())
        }
        fn cleanup(&mut self) {
            self.cleanups += 1;
        }
    }

    fn started_module() -> DeviceModule<MemStore, MockRunner> {
        let mut module = DeviceModule::new(MemStore::new(), MockRunner::default());
        module.start().unwrap();
        module
    }

    fn text_value(s: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        rmp::encode::write_str(&mut buf, s).unwrap();
        buf
    }

    fn fetch_value(args: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        rmp::encode::write_array_len(&mut buf, args.len() as u32).unwrap();
        for arg in args {
            rmp::encode::write_str(&mut buf, arg).unwrap();
        }
        buf
    }

    #[test]
    fn test_queries_before_any_osi() {
        let module = started_module();
        assert!(!module.has_more_dsi());
        assert!(!module.is_more_dsi());
        assert_eq!(module.dsi_count(), 1);
    }

    #[test]
    fn test_set_osi_before_start_fails() {
        let mut module = DeviceModule::new(MemStore::new(), MockRunner::default());
        let err = module.set_osi("filedesc", &text_value("f.bin")).unwrap_err();
        assert!(err.to_string().contains("module not started"));
    }

    #[test]
    fn test_unknown_label_is_content_error() {
        let mut module = started_module();
        let err = module.set_osi("reboot", &[]).unwrap_err();
        assert!(err.to_string().contains("unknown owner message"));
    }

    #[test]
    fn test_oversized_value_is_content_error() {
        let mut module = started_module();
        let big = vec![0u8; MAX_BUFFER_SIZE + 1];
        let err = module.set_osi("write", &big).unwrap_err();
        assert!(err.to_string().contains("exceeds buffer capacity"));
    }

    #[test]
    fn test_get_dsi_zero_mtu_fails() {
        let mut module = started_module();
        let err = module.get_dsi(0).unwrap_err();
        assert!(err.to_string().contains("MTU must be positive"));
    }

    #[test]
    fn test_get_dsi_with_nothing_pending_fails() {
        let mut module = started_module();
        let err = module.get_dsi(64).unwrap_err();
        assert!(err.to_string().contains("no ServiceInfo pending"));
    }

    #[test]
    fn test_failed_round_resets_transients_keeps_identity() {
        let mut module = started_module();
        module.files.put("f.log", b"0123456789");
        module
            .set_osi("fetch", &fetch_value(&["f.log", "key-1"]))
            .unwrap();
        assert!(module.has_more_dsi());

        // A malformed round must not wedge the session.
        assert!(module.set_osi("status_cb", &fetch_value(&["bad"])).is_err());

        assert!(!module.has_more_dsi());
        assert_eq!(module.session().state, ProducerState::Idle);
        assert_eq!(module.session().file_sz, 0);
        // Identity survives for the filedesc-then-write pattern.
        assert_eq!(module.session().filename, "f.log");
        assert_eq!(module.session().svi_map_key, "key-1");
    }

    #[test]
    fn test_end_runs_cleanup_and_releases_contexts() {
        let mut module = started_module();
        module.files.put("f.log", b"abc");
        module.set_osi("fetch", &fetch_value(&["f.log"])).unwrap();

        module.end().unwrap();
        assert_eq!(module.runner.cleanups, 1);
        assert!(!module.has_more_dsi());
        let err = module.set_osi("filedesc", &text_value("x")).unwrap_err();
        assert!(err.to_string().contains("module not started"));
    }

    #[test]
    fn test_dispatch_covers_all_operations() {
        let mut module = DeviceModule::new(MemStore::new(), MockRunner::default());
        assert_eq!(module.dispatch(Command::Start).unwrap(), Reply::Done);
        assert_eq!(
            module.dispatch(Command::HasMoreDsi).unwrap(),
            Reply::HasMore(false)
        );
        assert_eq!(
            module.dispatch(Command::IsMoreDsi).unwrap(),
            Reply::IsMore(false)
        );
        assert_eq!(
            module.dispatch(Command::GetDsiCount).unwrap(),
            Reply::Count(1)
        );
        assert_eq!(module.dispatch(Command::Failure).unwrap(), Reply::Done);
    }

    #[test]
    fn test_fetch_then_get_dsi_round() {
        let mut module = started_module();
        module.files.put("f.log", b"hello world");
        module
            .set_osi("fetch", &fetch_value(&["f.log", "key"]))
            .unwrap();

        let msg = module.get_dsi(1024).unwrap();
        assert_eq!(msg.kind, DeviceKind::Data);
        assert!(module.has_more_dsi()); // eot still pending

        let msg = module.get_dsi(1024).unwrap();
        assert_eq!(msg.kind, DeviceKind::Eot);
        assert!(!module.has_more_dsi());

        // Stream finished; another GetDsi is invalid until re-armed.
        assert!(module.get_dsi(1024).is_err());
    }
}
