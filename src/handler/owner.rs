//! Owner-message processor (SET_OSI).
//!
//! Decodes one of the six owner message kinds from the codec reader and
//! updates the session or triggers the collaborators. Every branch decodes
//! into locals first and commits to the session only after the full value
//! parsed, so a malformed message never leaves partial state behind.

use log::debug;

use crate::codec::Reader;
use crate::error::{Result, ServiceInfoError};
use crate::protocol::{
    OwnerKind, MAX_BUFFER_SIZE, MAX_EXEC_ARG_LEN, MAX_FETCH_ARG_LEN, MAX_FILE_NAME_LEN,
    MAX_SVI_KEY_LEN,
};
use crate::session::{Event, Session};
use crate::sys::{CommandRunner, FileStore};

/// Consume one owner message.
///
/// The reader is already loaded with the message value; `kind` was parsed
/// from the message label by the lifecycle controller.
pub fn process<F, R>(
    session: &mut Session,
    reader: &mut Reader,
    files: &mut F,
    runner: &mut R,
    kind: OwnerKind,
) -> Result<()>
where
    F: FileStore,
    R: CommandRunner,
{
    match kind {
        OwnerKind::Filedesc => filedesc(session, reader, files),
        OwnerKind::Write => write(session, reader, files),
        OwnerKind::Exec => exec(session, reader, runner),
        OwnerKind::ExecCb => exec_cb(session, reader, runner),
        OwnerKind::StatusCb => status_cb(session, reader, runner),
        OwnerKind::Fetch => fetch(session, reader, files),
    }
}

/// `filedesc`: the file a subsequent `write` targets. Any pre-existing
/// file at that path is deleted so writes never append to stale content.
fn filedesc<F: FileStore>(session: &mut Session, reader: &mut Reader, files: &mut F) -> Result<()> {
    let name = reader.read_text(MAX_FILE_NAME_LEN)?;
    if name.is_empty() {
        return Err(ServiceInfoError::content(
            "empty value received for filedesc",
        ));
    }
    session.filename = name;
    if files.delete(&session.filename) {
        debug!("filedesc: removed pre-existing file '{}'", session.filename);
    }
    Ok(())
}

/// `write`: file content for the current filename. Empty content is a
/// valid empty file and touches nothing.
fn write<F: FileStore>(session: &mut Session, reader: &mut Reader, files: &mut F) -> Result<()> {
    let data = reader.read_bytes(MAX_BUFFER_SIZE)?;
    if data.is_empty() {
        debug!("write: empty content accepted for '{}'", session.filename);
        return Ok(());
    }
    if session.filename.is_empty() {
        return Err(ServiceInfoError::content("write with no target filename"));
    }
    files.append(&session.filename, &data)?;
    debug!(
        "write: appended {} bytes to '{}'",
        data.len(),
        session.filename
    );
    Ok(())
}

/// `exec`: run the instruction vector to completion, fire-and-forget.
fn exec<R: CommandRunner>(session: &mut Session, reader: &mut Reader, runner: &mut R) -> Result<()> {
    let args = read_instructions(reader, MAX_EXEC_ARG_LEN)?;
    commit_exec_identity(session, &args)?;
    runner.run(&args)?;
    debug!("exec: ran {:?}", args.first());
    Ok(())
}

/// `exec_cb`: start the command in the background and arm the producer to
/// report initial status next round.
fn exec_cb<R: CommandRunner>(
    session: &mut Session,
    reader: &mut Reader,
    runner: &mut R,
) -> Result<()> {
    let args = read_instructions(reader, MAX_EXEC_ARG_LEN)?;
    commit_exec_identity(session, &args)?;
    session.command = runner.spawn_monitored(&args)?;
    session.apply(Event::ExecCbStarted);
    debug!("exec_cb: started {:?}", args.first());
    Ok(())
}

/// `status_cb`: the owner's poll of the asynchronous command, a fixed
/// `[isComplete, resultCode, waitSec]` triple.
fn status_cb<R: CommandRunner>(
    session: &mut Session,
    reader: &mut Reader,
    runner: &mut R,
) -> Result<()> {
    let arity = reader.array_len()?;
    if arity != 3 {
        return Err(ServiceInfoError::content(format!(
            "status_cb expects exactly 3 items, got {arity}"
        )));
    }
    let is_complete = reader.read_bool()?;
    let result_code = reader.read_i64()?;
    let wait_sec = reader.read_u64()?;

    session.command.is_complete = is_complete;
    session.command.result_code = result_code;
    session.command.wait_sec = wait_sec;
    // If the owner is done, the handshake is over; otherwise report again.
    session.apply(Event::OwnerStatus { is_complete });

    // Let the execution collaborator overwrite the triple with live
    // progress before the next report goes out.
    runner.refresh(&mut session.command)?;
    debug!(
        "status_cb: [{}, {}, {}]",
        session.command.is_complete, session.command.result_code, session.command.wait_sec
    );
    Ok(())
}

/// `fetch`: stream a device file back. The size is frozen here; a transfer
/// whose live size disagrees later is aborted by the producer.
fn fetch<F: FileStore>(session: &mut Session, reader: &mut Reader, files: &mut F) -> Result<()> {
    let args = read_instructions(reader, MAX_FETCH_ARG_LEN)?;
    commit_identity(session, Some(&args[0]), args.get(1).map(String::as_str))?;
    session.file_sz = files.size_of(&session.filename);
    session.file_seek_pos = 0;
    session.apply(Event::FetchRequested);
    debug!(
        "fetch: '{}' ({} bytes frozen)",
        session.filename, session.file_sz
    );
    Ok(())
}

/// Decode a non-empty array of text arguments, each capped at `max_arg`.
/// Nothing is committed to the session until the whole vector parsed.
fn read_instructions(reader: &mut Reader, max_arg: usize) -> Result<Vec<String>> {
    let arity = reader.array_len()? as usize;
    if arity == 0 {
        return Err(ServiceInfoError::content(
            "empty instruction array received",
        ));
    }
    let mut args = Vec::with_capacity(arity);
    for _ in 0..arity {
        args.push(reader.read_text(max_arg)?);
    }
    Ok(args)
}

/// exec/exec_cb convention: the 2nd argument is the target filename and
/// the last argument is the SVI map key.
fn commit_exec_identity(session: &mut Session, args: &[String]) -> Result<()> {
    let filename = if args.len() >= 2 {
        Some(args[1].as_str())
    } else {
        None
    };
    let key = args.last().map(String::as_str).unwrap_or("");
    commit_identity(session, filename, Some(key))
}

/// Validate the identity fields together, then commit both. A cap
/// violation leaves the session untouched.
fn commit_identity(
    session: &mut Session,
    filename: Option<&str>,
    svi_map_key: Option<&str>,
) -> Result<()> {
    if let Some(name) = filename {
        if name.len() > MAX_FILE_NAME_LEN {
            return Err(ServiceInfoError::content(format!(
                "filename length {} exceeds limit {MAX_FILE_NAME_LEN}",
                name.len()
            )));
        }
    }
    if let Some(key) = svi_map_key {
        if key.len() > MAX_SVI_KEY_LEN {
            return Err(ServiceInfoError::content(format!(
                "SVI map key length {} exceeds limit {MAX_SVI_KEY_LEN}",
                key.len()
            )));
        }
    }
    if let Some(name) = filename {
        session.filename = name.to_owned();
    }
    if let Some(key) = svi_map_key {
        session.svi_map_key = key.to_owned();
    }
    Ok(())
}
