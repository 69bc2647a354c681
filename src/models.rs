//! Record model for one export run
//!
//! Everything here is a read-only snapshot produced by the listings source and
//! consumed exactly once by the pipeline. Optional provider fields map to
//! `Option<T>` so that "absent" and "empty string" never blur together; the
//! element builders resolve each option exactly once per record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A provider-defined grouping of stations available to one subscriber/region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lineup {
    /// Provider lineup identifier, e.g. `USA-OTA-90210`
    pub name: String,
    pub stations: Vec<Station>,
}

/// One broadcast station within a lineup.
///
/// `id` doubles as the `channel` XML attribute and as the foreign key the
/// programme records reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    /// Station logo URL; absent means no `icon` element is emitted.
    pub logo: Option<String>,
}

/// One broadcast instance of a program: start time plus duration.
///
/// Stop time is always derived as `airdatetime + duration`, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airing {
    pub airdatetime: DateTime<Utc>,
    /// Duration in seconds; zero is valid and yields `start == stop`.
    pub duration: u32,
}

/// A cast member. Only the name reaches the XMLTV output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
}

/// One program record, merged from the provider's schedule and program data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Provider program identifier, carried for error reporting.
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    /// Cast in billing order; empty means no `credits` element.
    pub actors: Vec<Actor>,
    /// Genres in provider order; each becomes one `category` element.
    pub genres: Vec<String>,
    pub orig_airdate: Option<NaiveDate>,
    pub schedule: Airing,
    /// Raw station id this program airs on. Referenced by value, not looked
    /// up: a programme whose station is outside the emitted lineups is
    /// permissible, matching real provider data.
    pub station_id: String,
}
