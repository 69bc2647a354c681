//! Schedules Direct to XMLTV exporter.
//!
//! The library is layered so the document assembly core stays testable
//! without any network: [`models`] holds the read-only record snapshots,
//! [`xmltv`] derives wire-format fields and streams the markup, and
//! [`pipeline`] drives one two-phase export pass over any
//! [`pipeline::ListingsSource`]. The [`client`] and [`store`] modules supply
//! the real Schedules Direct source with delta-aware fetching.

pub mod client;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod xmltv;

pub use client::SchedulesDirect;
pub use errors::{ExportError, FormatError, RecordFormatError, ScopeError, SourceError};
pub use models::{Actor, Airing, Lineup, Program, Station};
pub use pipeline::{export, ExportReport, ListingsSource};
pub use store::{HashStore, JsonStore, NullStore};
