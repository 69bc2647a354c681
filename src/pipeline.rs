//! Export pipeline driver
//!
//! A two-phase forward pass: emit every channel element, then stream one
//! programme element per record. Lineups are materialized once and handed
//! back to the source for the programme fetch; the programme sequence itself
//! is consumed strictly forward, one record at a time, so the driver never
//! holds more than one record's markup in memory.

use std::io::Write;

use crate::errors::{ExportError, SourceError};
use crate::models::{Lineup, Program};
use crate::xmltv::{
    build_channel, build_programme, XmltvWriter, GENERATOR_INFO_NAME, GENERATOR_INFO_URL,
    SOURCE_INFO_NAME, SOURCE_INFO_URL,
};

/// Where the pipeline gets its records.
///
/// `lineups` must return a reusable, fully materialized sequence: the driver
/// walks it to emit channels and then passes it back to `programs`, which
/// saves the source a duplicate lineup fetch. The programme sequence is the
/// opposite: a one-shot lazy iterator that must not be materialized, or the
/// export loses its memory bound.
pub trait ListingsSource {
    type Programs: Iterator<Item = Result<Program, SourceError>>;

    fn lineups(&mut self) -> Result<Vec<Lineup>, SourceError>;

    fn programs(&mut self, lineups: &[Lineup]) -> Result<Self::Programs, SourceError>;
}

/// Counts from one completed export run.
///
/// Reported back to the caller instead of logged from inside the core, so
/// the pipeline stays free of global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportReport {
    pub lineups: usize,
    pub channels: usize,
    pub programmes: usize,
}

/// Run one full export against the given sink.
///
/// Either completes and leaves one well-formed document in the sink, or
/// fails with the sink's contents unspecified. Callers wanting atomicity
/// should write to a temporary path and rename on success.
pub fn export<S, W>(source: &mut S, sink: W) -> Result<ExportReport, ExportError>
where
    S: ListingsSource,
    W: Write,
{
    let mut writer = XmltvWriter::new(sink)?;
    let mut report = ExportReport::default();

    writer.open_scope(
        "tv",
        &[
            ("source-info-url", SOURCE_INFO_URL.to_string()),
            ("source-info-name", SOURCE_INFO_NAME.to_string()),
            ("generator-info-name", GENERATOR_INFO_NAME.to_string()),
            ("generator-info-url", GENERATOR_INFO_URL.to_string()),
        ],
    )?;

    // Phase one: every station of every lineup becomes a channel element.
    let lineups = source.lineups()?;
    report.lineups = lineups.len();
    for lineup in &lineups {
        for station in &lineup.stations {
            writer.execute(&build_channel(station))?;
            report.channels += 1;
        }
    }

    // Phase two: one programme element per yielded record. The already
    // materialized lineups go back to the source so it does not re-fetch.
    for program in source.programs(&lineups)? {
        let program = program?;
        writer.execute(&build_programme(&program)?)?;
        report.programmes += 1;
    }

    writer.close_scope()?;
    let mut sink = writer.finish()?;
    sink.flush()?;

    Ok(report)
}
