//! Message kinds and size limits for the ServiceInfo wire protocol.
//!
//! Each protocol round carries a case-sensitive message-kind label plus a
//! MessagePack-encoded value. Owner→device kinds are a closed enum so the
//! compiler enforces that every kind is handled; device→owner kinds carry
//! the label the module writes back into the outgoing message slot.

use crate::error::{Result, ServiceInfoError};

/// Maximum size of one encoded owner/device value, and the capacity of the
/// codec reader/writer buffers allocated at Start.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Maximum length of a target/source file path.
pub const MAX_FILE_NAME_LEN: usize = 150;

/// Maximum length of the ServiceInfo map correlation key.
pub const MAX_SVI_KEY_LEN: usize = 150;

/// Maximum length of a single `exec`/`exec_cb` argument.
pub const MAX_EXEC_ARG_LEN: usize = 512;

/// Maximum length of a single `fetch` argument.
pub const MAX_FETCH_ARG_LEN: usize = 150;

/// Owner→device message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    /// Name of the file a subsequent `write` targets.
    Filedesc,
    /// File content to append to the named file.
    Write,
    /// Run a command, fire-and-forget.
    Exec,
    /// Start a command asynchronously; device reports progress via `status_cb`.
    ExecCb,
    /// Owner-side poll of an asynchronous command.
    StatusCb,
    /// Stream a device file back to the owner.
    Fetch,
}

impl OwnerKind {
    /// Parse a message-kind label. Labels are case-sensitive literals;
    /// anything else is not a recognized owner message.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "filedesc" => Some(Self::Filedesc),
            "write" => Some(Self::Write),
            "exec" => Some(Self::Exec),
            "exec_cb" => Some(Self::ExecCb),
            "status_cb" => Some(Self::StatusCb),
            "fetch" => Some(Self::Fetch),
            _ => None,
        }
    }

    /// Parse a label, failing with a content error on unknown labels.
    pub fn parse(label: &str) -> Result<Self> {
        Self::from_label(label)
            .ok_or_else(|| ServiceInfoError::content(format!("unknown owner message '{label}'")))
    }

    /// The wire label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Filedesc => "filedesc",
            Self::Write => "write",
            Self::Exec => "exec",
            Self::ExecCb => "exec_cb",
            Self::StatusCb => "status_cb",
            Self::Fetch => "fetch",
        }
    }
}

/// Device→owner message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// One chunk of a fetched file.
    Data,
    /// End-of-transfer terminator with a status code.
    Eot,
    /// Progress report for an asynchronous command.
    StatusCb,
}

impl DeviceKind {
    /// The wire label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Eot => "eot",
            Self::StatusCb => "status_cb",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_labels_roundtrip() {
        for kind in [
            OwnerKind::Filedesc,
            OwnerKind::Write,
            OwnerKind::Exec,
            OwnerKind::ExecCb,
            OwnerKind::StatusCb,
            OwnerKind::Fetch,
        ] {
            assert_eq!(OwnerKind::from_label(kind.label()), Some(kind));
        }
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        assert_eq!(OwnerKind::from_label("Filedesc"), None);
        assert_eq!(OwnerKind::from_label("EXEC"), None);
        assert_eq!(OwnerKind::from_label(""), None);
    }

    #[test]
    fn test_parse_unknown_is_content_error() {
        let err = OwnerKind::parse("reboot").unwrap_err();
        assert!(err.to_string().contains("unknown owner message"));
    }

    #[test]
    fn test_device_labels() {
        assert_eq!(DeviceKind::Data.label(), "data");
        assert_eq!(DeviceKind::Eot.label(), "eot");
        assert_eq!(DeviceKind::StatusCb.label(), "status_cb");
    }
}
