//! Work-unit fan-out.
//!
//! The pipeline publishes its work units and completion events to an
//! [`EventBus`]. A single-process run uses [`LogBus`], which records the
//! fan-out in the log while the same process works through the units;
//! deployments with a real queue implement the trait over it. Payloads are
//! JSON so units survive the trip through an external bus unchanged.
//!
//! Work-unit `token()`s feed the pending sets of
//! [`coordination`](crate::coordination): a token is unique within its
//! aggregate because slices never share a start offset and windows never
//! share a start position.

use crate::errors::{Result, VarsumError};
use crate::variant::CoordinateWindow;
use log::info;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use varsum_bgzf::VirtualOffset;

/// Topic carrying [`SliceWorkUnit`] messages.
pub const SLICE_TOPIC: &str = "varsum/slices";
/// Topic carrying [`WindowWorkUnit`] messages.
pub const WINDOW_TOPIC: &str = "varsum/windows";
/// Topic carrying [`DatasetReady`] events.
pub const DATASET_READY_TOPIC: &str = "varsum/dataset-ready";

/// Message fan-out collaborator.
pub trait EventBus: Send + Sync {
    /// Publish one message to `topic`.
    ///
    /// # Errors
    ///
    /// Implementations surface their transport errors.
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;
}

/// One scan work unit: a virtual-offset slice of one source object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceWorkUnit {
    /// Source object location, scheme included.
    pub location: String,
    /// Slice start as a packed virtual offset value.
    pub virtual_start: u64,
    /// First virtual offset past the slice.
    pub virtual_end: u64,
}

impl SliceWorkUnit {
    pub fn new(location: impl Into<String>, start: VirtualOffset, end: VirtualOffset) -> Self {
        Self { location: location.into(), virtual_start: start.value(), virtual_end: end.value() }
    }

    #[must_use]
    pub fn start(&self) -> VirtualOffset {
        VirtualOffset::from_value(self.virtual_start)
    }

    #[must_use]
    pub fn end(&self) -> VirtualOffset {
        VirtualOffset::from_value(self.virtual_end)
    }

    /// Pending-set token identifying this slice within its aggregate.
    #[must_use]
    pub fn token(&self) -> String {
        format!("{}-{}", self.virtual_start, self.virtual_end)
    }
}

/// One duplicate-search work unit: a coordinate window on one contig plus
/// the summary objects overlapping it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowWorkUnit {
    pub contig: String,
    pub range_start: u64,
    pub range_end: u64,
    /// Keys of the summary objects whose span overlaps the window.
    pub summary_keys: Vec<String>,
}

impl WindowWorkUnit {
    pub fn new(
        contig: impl Into<String>,
        window: CoordinateWindow,
        summary_keys: Vec<String>,
    ) -> Self {
        Self {
            contig: contig.into(),
            range_start: window.start,
            range_end: window.end,
            summary_keys,
        }
    }

    #[must_use]
    pub fn window(&self) -> CoordinateWindow {
        CoordinateWindow::new(self.range_start, self.range_end)
    }

    /// Pending-set token identifying this window within its aggregate.
    #[must_use]
    pub fn token(&self) -> String {
        format!("{}-{}", self.range_start, self.range_end)
    }
}

/// Published when a dataset's summarization aggregate completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetReady {
    /// Source object location as given to the run.
    pub location: String,
    /// Canonical dataset identifier derived from the location.
    pub dataset: String,
}

/// Serialize `message` as JSON and publish it to `topic`.
///
/// # Errors
///
/// Propagates the bus transport error.
pub fn publish_json<T: Serialize>(bus: &dyn EventBus, topic: &str, message: &T) -> Result<()> {
    let payload = serde_json::to_vec(message).map_err(io::Error::other)?;
    bus.publish(topic, &payload)
}

/// Decode one JSON work-unit payload.
///
/// # Errors
///
/// Returns [`VarsumError::InvalidInput`] when the payload does not parse.
pub fn decode_json<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload).map_err(|e| VarsumError::InvalidInput {
        location: "work-unit payload".to_string(),
        reason: e.to_string(),
    })
}

/// Bus that writes publications to the log, for single-process runs.
#[derive(Debug, Default)]
pub struct LogBus;

impl EventBus for LogBus {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        info!("[{topic}] {}", String::from_utf8_lossy(payload));
        Ok(())
    }
}

/// Bus that records publications in memory, for tests.
#[derive(Default)]
pub struct MemoryBus {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far as (topic, payload) pairs.
    #[must_use]
    pub fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.messages.lock().clone()
    }

    /// Payloads published to one topic, in publication order.
    #[must_use]
    pub fn topic_payloads(&self, topic: &str) -> Vec<Vec<u8>> {
        self.messages
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl EventBus for MemoryBus {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        self.messages.lock().push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}
