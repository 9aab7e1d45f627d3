//! Data models shared between the poller, the session query, and their
//! consumers.

mod sample;
mod session;

pub use sample::{ClassifiedSample, MetricValue, ResourceReport, ResourceSample, Thresholds};
pub use session::{RawSessionRow, SessionRecord, NOT_AVAILABLE};
