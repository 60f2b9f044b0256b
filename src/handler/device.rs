//! Device-message producer (GET_DSI).
//!
//! Emits exactly one message per invocation: a `status_cb` progress report,
//! a `data` chunk bounded by the MTU, or the `eot` terminator. A transfer
//! that can no longer proceed (file gone, size changed, read failure) still
//! produces a successful protocol round carrying `eot` with status 1 - the
//! owner must always receive a terminating message.

use bytes::Bytes;
use log::{debug, warn};

use crate::codec::Writer;
use crate::error::{Result, ServiceInfoError};
use crate::protocol::DeviceKind;
use crate::session::{Event, ProducerState, Session, TransferStatus};
use crate::sys::FileStore;

/// One outgoing device ServiceInfo message: the wire label plus the
/// encoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMessage {
    /// Which device message kind this is; `kind.label()` is the wire label.
    pub kind: DeviceKind,
    /// The encoded value.
    pub value: Bytes,
}

impl DeviceMessage {
    fn new(kind: DeviceKind, writer: &Writer) -> Self {
        Self {
            kind,
            value: writer.take(),
        }
    }
}

/// Produce the next device message.
///
/// Preconditions (`hasmore`, MTU, module started) are enforced by the
/// lifecycle controller; this function only requires a non-idle producer.
pub fn produce<F: FileStore>(
    session: &mut Session,
    writer: &mut Writer,
    files: &F,
    mtu: usize,
) -> Result<DeviceMessage> {
    writer.reset();
    match session.state {
        ProducerState::Idle => Err(ServiceInfoError::state("no device message pending")),
        ProducerState::SendStatus => {
            encode_status(writer, session)?;
            session.apply(Event::StatusSent);
            debug!(
                "responded with status_cb [{}, {}, {}]",
                session.command.is_complete, session.command.result_code, session.command.wait_sec
            );
            Ok(DeviceMessage::new(DeviceKind::StatusCb, writer))
        }
        ProducerState::SendData => next_chunk(session, writer, files, mtu),
        ProducerState::SendEot => {
            encode_eot(writer, session.fetch_status.code())?;
            session.apply(Event::EotSent);
            debug!("responded with eot status {}", session.fetch_status.code());
            Ok(DeviceMessage::new(DeviceKind::Eot, writer))
        }
    }
}

/// One `data` round of the chunked transfer.
fn next_chunk<F: FileStore>(
    session: &mut Session,
    writer: &mut Writer,
    files: &F,
    mtu: usize,
) -> Result<DeviceMessage> {
    // If anything goes wrong from here, the terminator carries failure.
    session.fetch_status = TransferStatus::Aborted;

    let live_sz = files.size_of(&session.filename);
    if session.file_sz == 0 || live_sz != session.file_sz || session.file_seek_pos > session.file_sz
    {
        warn!(
            "aborting transfer of '{}': frozen size {}, live size {}, offset {}",
            session.filename, session.file_sz, live_sz, session.file_seek_pos
        );
        return abort_transfer(session, writer);
    }

    let remaining = session.file_sz - session.file_seek_pos;
    let chunk_len = remaining.min(mtu as u64) as usize;
    let chunk = match files.read_at(&session.filename, session.file_seek_pos, chunk_len) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("failed to read chunk from '{}': {e}", session.filename);
            return abort_transfer(session, writer);
        }
    };

    session.file_seek_pos += chunk_len as u64;
    encode_data(writer, &chunk, &session.svi_map_key)?;

    let transfer_done = session.file_seek_pos == session.file_sz;
    if transfer_done {
        session.fetch_status = TransferStatus::Complete;
    }
    session.apply(Event::ChunkSent { transfer_done });
    debug!(
        "responded with data chunk of {} bytes ({}/{})",
        chunk_len, session.file_seek_pos, session.file_sz
    );
    Ok(DeviceMessage::new(DeviceKind::Data, writer))
}

/// Emit the failure terminator immediately. The protocol round is a
/// success even though the transfer is not.
fn abort_transfer(session: &mut Session, writer: &mut Writer) -> Result<DeviceMessage> {
    encode_eot(writer, TransferStatus::Aborted.code())?;
    session.apply(Event::TransferAborted);
    Ok(DeviceMessage::new(DeviceKind::Eot, writer))
}

/// `["status_cb" : [isComplete, resultCode, waitSec, execResult, sviMapKey]]`
fn encode_status(writer: &mut Writer, session: &Session) -> Result<()> {
    writer.start_array(5)?;
    writer.write_bool(session.command.is_complete)?;
    writer.write_i64(session.command.result_code)?;
    writer.write_u64(session.command.wait_sec)?;
    writer.write_text(&session.command.output)?;
    writer.write_text(&session.svi_map_key)?;
    Ok(())
}

/// `["data" : [chunk, sviMapKey]]`
fn encode_data(writer: &mut Writer, chunk: &[u8], svi_map_key: &str) -> Result<()> {
    writer.start_array(2)?;
    writer.write_bytes(chunk)?;
    writer.write_text(svi_map_key)?;
    Ok(())
}

/// `["eot" : [status]]`
fn encode_eot(writer: &mut Writer, status: i64) -> Result<()> {
    writer.start_array(1)?;
    writer.write_i64(status)?;
    Ok(())
}
