//! Session state for one onboarding exchange.
//!
//! Exactly one session exists per exchange. It is created at Start,
//! carried across dispatcher rounds, and dropped at End/Failure. All
//! `hasmore`/producer-state changes flow through the pure [`step`]
//! transition function so the backpressure machine can be tested without
//! touching the codec or the collaborators.

/// Which outgoing message the producer must emit next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProducerState {
    /// Nothing to produce; GetDsi is invalid in this state.
    #[default]
    Idle,
    /// Report command progress with a `status_cb` message.
    SendStatus,
    /// Send the next chunk of the fetched file.
    SendData,
    /// Send the end-of-transfer terminator.
    SendEot,
}

/// End-of-transfer status carried by the `eot` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferStatus {
    /// All bytes delivered.
    Complete,
    /// Transfer aborted or never produced a byte. Default until a
    /// delivery round completes.
    #[default]
    Aborted,
}

impl TransferStatus {
    /// Wire code: 0 for success, 1 for failure.
    pub fn code(&self) -> i64 {
        match self {
            Self::Complete => 0,
            Self::Aborted => 1,
        }
    }
}

/// Progress snapshot of the owner-driven remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatus {
    /// Whether the command has finished. Terminal once `true`.
    pub is_complete: bool,
    /// Exit status; `-1` until the command completes.
    pub result_code: i64,
    /// Owner-suggested delay before the next poll (advisory).
    pub wait_sec: u64,
    /// Captured stdout of the command so far.
    pub output: String,
}

impl Default for CommandStatus {
    /// A command that has not finished: the result code must not read as
    /// a success exit status while the command is still running.
    fn default() -> Self {
        Self {
            is_complete: false,
            result_code: -1,
            wait_sec: 0,
            output: String::new(),
        }
    }
}

/// Events that drive the producer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// An `exec_cb` command was started; report initial status next round.
    ExecCbStarted,
    /// The owner polled with `status_cb`.
    OwnerStatus { is_complete: bool },
    /// The owner requested a file with `fetch`.
    FetchRequested,
    /// A `status_cb` device message went out.
    StatusSent,
    /// A `data` chunk went out.
    ChunkSent { transfer_done: bool },
    /// The `eot` terminator went out.
    EotSent,
    /// The transfer was aborted; the terminator already carried status 1.
    TransferAborted,
    /// The round failed; start the next one clean.
    RoundFailed,
}

/// Pure transition function: `(state, event) -> (state, hasmore)`.
///
/// `hasmore` is the answer the dispatcher gets from HAS_MORE_DSI: whether
/// the device has a message ready to send now.
pub fn step(state: ProducerState, event: Event) -> (ProducerState, bool) {
    match event {
        Event::ExecCbStarted => (ProducerState::SendStatus, true),
        Event::OwnerStatus { is_complete: true } => (ProducerState::Idle, false),
        Event::OwnerStatus { is_complete: false } => (ProducerState::SendStatus, true),
        Event::FetchRequested => (ProducerState::SendData, true),
        // One-shot per round; the owner's next status_cb re-arms the producer.
        Event::StatusSent => (state, false),
        Event::ChunkSent {
            transfer_done: false,
        } => (ProducerState::SendData, true),
        Event::ChunkSent {
            transfer_done: true,
        } => (ProducerState::SendEot, true),
        Event::EotSent | Event::TransferAborted | Event::RoundFailed => {
            (ProducerState::Idle, false)
        }
    }
}

/// Mutable state that persists across dispatcher rounds.
#[derive(Debug, Default)]
pub struct Session {
    /// Target/source file path for write/fetch. Set by `filedesc`,
    /// `exec`/`exec_cb` (2nd argument) or `fetch` (1st argument).
    pub filename: String,
    /// Correlation key echoed back in `data`/`status_cb` responses.
    pub svi_map_key: String,
    /// Bytes of the current file already sent.
    pub file_seek_pos: u64,
    /// File size frozen at `fetch` time; the transfer aborts if the live
    /// size disagrees.
    pub file_sz: u64,
    /// End-of-transfer status for the next `eot`.
    pub fetch_status: TransferStatus,
    /// Progress of the command launched via `exec_cb`.
    pub command: CommandStatus,
    /// Device has a message ready to send now.
    pub hasmore: bool,
    /// Which message the producer emits next.
    pub state: ProducerState,
}

impl Session {
    /// Fresh session for a new onboarding exchange.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the device will have a message ready next round.
    ///
    /// Always `false`: lookahead is advisory for the host and managing it
    /// is error-prone, so the conservative answer is reported.
    pub fn ismore(&self) -> bool {
        false
    }

    /// Apply an event through the transition function.
    pub fn apply(&mut self, event: Event) {
        let (state, hasmore) = step(self.state, event);
        self.state = state;
        self.hasmore = hasmore;
    }

    /// Reset the transient flags after a failed round so the protocol can
    /// continue cleanly. `filename` and `svi_map_key` survive: `filedesc`
    /// may precede `write` by one round.
    pub fn reset_transient(&mut self) {
        self.file_sz = 0;
        self.file_seek_pos = 0;
        self.fetch_status = TransferStatus::Aborted;
        self.apply(Event::RoundFailed);
    }
}
