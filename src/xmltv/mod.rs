//! XMLTV document assembly
//!
//! Split the way the output pipeline is layered: [`time`] derives wire-format
//! timestamps, [`builders`] turns records into markup instructions, and
//! [`writer`] executes those instructions against a forward-only sink.

pub mod builders;
pub mod time;
pub mod writer;

pub use builders::{build_channel, build_programme, Instruction};
pub use writer::XmltvWriter;

/// Provenance attributes for the root `tv` element. Fixed constants, part of
/// the output contract.
pub const SOURCE_INFO_URL: &str = "https://www.schedulesdirect.org/";
pub const SOURCE_INFO_NAME: &str = "Schedules Direct";
pub const GENERATOR_INFO_NAME: &str = "sd-xmltv";
pub const GENERATOR_INFO_URL: &str = "https://github.com/jmylchreest/sd-xmltv";
