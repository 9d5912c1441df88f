//! Protobuf decoding for GTFS Realtime feeds.

use prost::Message;

use crate::error::Result;
use crate::gtfs_rt::FeedMessage;

/// Decodes one real-time endpoint's payload.
///
/// A truncated or non-protobuf body surfaces as [`crate::Error::Parse`]
/// tagged "GTFS-RT feed"; the merge cycle logs it and moves on to the next
/// endpoint. An empty body is a valid, empty feed.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage> {
    Ok(FeedMessage::decode(bytes)?)
}
