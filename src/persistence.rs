//! Size-bounded stream encoding for storing events
//!
//! An event is stored as one metadata stream plus one stream per activity,
//! each holding a slice of the canonical JSON document. A stream that is
//! over the ceiling gets gzip-compressed; if it is still over, the write
//! is refused.

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{Read, Write};

use crate::error::{PersistError, SportsError};
use crate::export::json::{activity_to_document, stats_to_map, ActivityDocument, EventDocument};
use crate::import::json::event_from_document;
use crate::models::Event;

/// Serialized-size ceiling of a single stored stream
pub const MAX_STREAM_BYTES: usize = 1_048_487;

/// One stored stream, plain or gzip-compressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedStream {
    Plain(Vec<u8>),
    Gzip(Vec<u8>),
}

impl EncodedStream {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            EncodedStream::Plain(bytes) | EncodedStream::Gzip(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, EncodedStream::Gzip(_))
    }
}

/// Streams making up one stored event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedEvent {
    pub meta: EncodedStream,
    pub activities: Vec<EncodedStream>,
}

impl PersistedEvent {
    pub fn total_bytes(&self) -> usize {
        self.meta.len() + self.activities.iter().map(EncodedStream::len).sum::<usize>()
    }
}

/// Keeps the bytes as is when they fit, otherwise compresses them
pub fn encode_stream(bytes: Vec<u8>, limit: usize) -> Result<EncodedStream, PersistError> {
    if bytes.len() <= limit {
        return Ok(EncodedStream::Plain(bytes));
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&bytes)?;
    let compressed = encoder.finish()?;

    if compressed.len() > limit {
        tracing::error!(
            original = bytes.len(),
            compressed = compressed.len(),
            limit,
            "Stream over limit even after compression"
        );
        return Err(PersistError::CannotCompress {
            size: compressed.len(),
            limit,
        });
    }

    tracing::debug!(
        original = bytes.len(),
        compressed = compressed.len(),
        ratio = bytes.len() as f64 / compressed.len() as f64,
        "Compressed stream"
    );
    Ok(EncodedStream::Gzip(compressed))
}

pub fn decode_stream(stream: &EncodedStream) -> Result<Vec<u8>, PersistError> {
    match stream {
        EncodedStream::Plain(bytes) => Ok(bytes.clone()),
        EncodedStream::Gzip(bytes) => {
            let mut decoder = GzDecoder::new(bytes.as_slice());
            let mut decompressed = Vec::new();
            decoder.read_to_end(&mut decompressed)?;
            Ok(decompressed)
        }
    }
}

fn to_bytes<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, PersistError> {
    serde_json::to_vec(value).map_err(|e| PersistError::Serialization(e.to_string()))
}

fn from_bytes<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, PersistError> {
    serde_json::from_slice(bytes).map_err(|e| PersistError::Serialization(e.to_string()))
}

/// Splits the canonical document into size-checked streams
#[tracing::instrument(skip_all, fields(event = %event.name, activities = event.activities.len()))]
pub fn persist_event(event: &Event, limit: usize) -> Result<PersistedEvent, PersistError> {
    let meta = EventDocument {
        name: event.name.clone(),
        stats: stats_to_map(&event.stats),
        activities: Vec::new(),
    };
    let meta = encode_stream(to_bytes(&meta)?, limit)?;

    let activities = event
        .activities
        .iter()
        .map(|activity| encode_stream(to_bytes(&activity_to_document(activity))?, limit))
        .collect::<Result<Vec<_>, _>>()?;

    let persisted = PersistedEvent { meta, activities };
    tracing::info!(bytes = persisted.total_bytes(), "Persisted event");
    Ok(persisted)
}

/// Reassembles an event from its streams
pub fn restore_event(persisted: &PersistedEvent) -> Result<Event, SportsError> {
    let mut document: EventDocument = from_bytes(&decode_stream(&persisted.meta)?)?;
    for stream in &persisted.activities {
        let activity: ActivityDocument = from_bytes(&decode_stream(stream)?)?;
        document.activities.push(activity);
    }
    Ok(event_from_document(document)?)
}
