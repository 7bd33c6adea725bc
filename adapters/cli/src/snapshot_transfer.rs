use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use bid_leveling_session::SessionSnapshot;
use thiserror::Error;

const SNAPSHOT_DOMAIN: &str = "bidmatrix";
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded snapshot payload.
pub(crate) const SNAPSHOT_HEADER: &str = "bidmatrix:v1";
const FIELD_DELIMITER: char = ':';

/// Errors that can occur while decoding session transfer strings.
#[derive(Debug, Error)]
pub(crate) enum SnapshotTransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("snapshot string was empty")]
    EmptyPayload,
    /// The encoded snapshot did not contain a version segment.
    #[error("snapshot string is missing the version")]
    MissingVersion,
    /// The encoded snapshot did not include the payload segment.
    #[error("snapshot string is missing the payload")]
    MissingPayload,
    /// The encoded snapshot used an unexpected prefix segment.
    #[error("snapshot prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The encoded snapshot used an unsupported version identifier.
    #[error("snapshot version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode snapshot payload")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The decoded payload could not be deserialised.
    #[error("could not parse snapshot payload")]
    InvalidPayload(#[source] serde_json::Error),
}

/// Encodes the snapshot into a single-line string suitable for clipboard transfer.
pub(crate) fn encode(snapshot: &SessionSnapshot) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(snapshot)?;
    Ok(format!("{SNAPSHOT_HEADER}:{}", STANDARD_NO_PAD.encode(json)))
}

/// Decodes a snapshot from the provided string representation.
pub(crate) fn decode(value: &str) -> Result<SessionSnapshot, SnapshotTransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SnapshotTransferError::EmptyPayload);
    }

    let mut parts = trimmed.splitn(3, FIELD_DELIMITER);
    let domain = parts.next().unwrap_or_default();
    let version = parts.next().ok_or(SnapshotTransferError::MissingVersion)?;
    let payload = parts.next().ok_or(SnapshotTransferError::MissingPayload)?;

    if domain != SNAPSHOT_DOMAIN {
        return Err(SnapshotTransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotTransferError::UnsupportedVersion(version.to_owned()));
    }

    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(SnapshotTransferError::InvalidEncoding)?;
    serde_json::from_slice(&bytes).map_err(SnapshotTransferError::InvalidPayload)
}
