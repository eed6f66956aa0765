//! Protobuf parser for GTFS Realtime feeds.

use prost::Message;

use crate::error::DecodeError;
use crate::gtfs_rt::FeedMessage;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the bytes are not valid protobuf for a
/// `FeedMessage`. Nothing is salvaged from a broken message.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage, DecodeError> {
    Ok(FeedMessage::decode(bytes)?)
}
