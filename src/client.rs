//! Schedules Direct JSON API client
//!
//! Implements the delta-aware fetch flow the provider expects: the status
//! endpoint exposes per-lineup modified dates, and the schedule and program
//! endpoints expose md5 hashes, so a client with a [`HashStore`] only
//! re-downloads what actually changed since its last run.
//!
//! The export pipeline is one sequential pass, so the client is blocking.
//! Programs are fetched in chunks of [`PROGRAM_CHUNK`] ids and yielded one at
//! a time through [`ProgramsIter`], which keeps memory bounded no matter how
//! large the subscription is.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use serde_json::Value;
use sha1::{Digest, Sha1};
use tracing::{debug, warn};
use url::Url;

use crate::errors::{SourceError, StoreError};
use crate::models::{Actor, Airing, Lineup, Program, Station};
use crate::pipeline::ListingsSource;
use crate::store::{HashStore, ScheduleKey};

const BASE_URL: &str = "https://json.schedulesdirect.org/20141201/";
const USER_AGENT: &str = concat!(
    "sd-xmltv/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/jmylchreest/sd-xmltv)"
);

/// The schedules endpoints accept at most 5000 stations per request.
const SCHEDULE_CHUNK: usize = 5000;
/// The metadata endpoints cap batches at 500 program ids.
const PROGRAM_CHUNK: usize = 500;

/// Blocking Schedules Direct client with delta-aware fetching.
pub struct SchedulesDirect {
    http: HttpClient,
    base_url: Url,
    username: String,
    password: String,
    token: Option<String>,
    store: Box<dyn HashStore>,
}

impl SchedulesDirect {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        store: Box<dyn HashStore>,
    ) -> Result<Self, SourceError> {
        let http = HttpClient::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url: Url::parse(BASE_URL).expect("base URL is valid"),
            username: username.into(),
            password: password.into(),
            token: None,
            store,
        })
    }

    /// Obtain a session token. Must be called before any fetch.
    ///
    /// The provider wants the SHA-1 digest of the password, not the password
    /// itself.
    pub fn login(&mut self) -> Result<(), SourceError> {
        let password_hash = hex::encode(Sha1::digest(self.password.as_bytes()));
        let response: TokenResponse = self.request(
            Method::Post,
            "token",
            Some(serde_json::json!({
                "username": self.username,
                "password": password_hash,
            })),
        )?;
        self.token = Some(response.token);
        Ok(())
    }

    /// Persist the delta store. Call only after a fully successful export.
    pub fn commit_store(&mut self) -> Result<(), StoreError> {
        self.store.save()
    }

    /// Fetch the lineups whose modified date changed since the last saved
    /// run, materialized with their full station lists.
    pub fn get_lineups(&mut self) -> Result<Vec<Lineup>, SourceError> {
        self.require_token()?;

        let status: StatusResponse = self.request(Method::Get, "status", None)?;
        // The modified date is not a hash, but it behaves like one: a lineup
        // whose date matches the store has not changed since our last run.
        let lineup_hashes: Vec<(String, String)> = status
            .lineups
            .into_iter()
            .map(|l| (l.lineup, l.modified))
            .collect();

        let mut lineups = Vec::new();
        for name in self.store.diff_lineups(&lineup_hashes) {
            let response: LineupResponse =
                self.request(Method::Get, &format!("lineups/{name}"), None)?;
            let stations = response
                .stations
                .into_iter()
                .map(|s| {
                    let name = s.name.unwrap_or_else(|| s.station_id.clone());
                    Station {
                        id: s.station_id,
                        name,
                        logo: s.logo.map(|l| l.url),
                    }
                })
                .collect();
            lineups.push(Lineup { name, stations });
        }
        debug!(lineups = lineups.len(), "fetched changed lineups");
        Ok(lineups)
    }

    /// Lazy programme stream for the given lineups' stations.
    ///
    /// Runs the schedule diff eagerly (it is small: hashes and airing info),
    /// then hands the changed program ids to an iterator that downloads and
    /// merges them chunk by chunk as it is driven.
    pub fn get_programs(&mut self, lineups: &[Lineup]) -> Result<ProgramsIter, SourceError> {
        let token = self.require_token()?.to_string();

        let stations: HashMap<String, Station> = lineups
            .iter()
            .flat_map(|l| l.stations.iter())
            .map(|s| (s.id.clone(), s.clone()))
            .collect();

        let (airings, program_hashes) = self.fetch_schedule_airings(lineups)?;
        let changed = self.store.diff_programs(&program_hashes);
        debug!(
            changed = changed.len(),
            known = program_hashes.len(),
            "diffed programs"
        );

        let chunks = changed
            .chunks(PROGRAM_CHUNK)
            .map(<[String]>::to_vec)
            .collect();

        Ok(ProgramsIter {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token,
            chunks,
            airings,
            stations,
            pending: VecDeque::new(),
            failed: false,
        })
    }

    /// Download schedule hashes and the schedules that changed, collecting
    /// per-program airing info and (programID, md5) pairs.
    fn fetch_schedule_airings(
        &mut self,
        lineups: &[Lineup],
    ) -> Result<(HashMap<String, SlotInfo>, Vec<(String, String)>), SourceError> {
        let station_ids: Vec<&str> = lineups
            .iter()
            .flat_map(|l| l.stations.iter())
            .map(|s| s.id.as_str())
            .collect();

        // First pass: md5 per station per day. BTreeMaps keep the diff (and
        // with it the final document) deterministic across runs.
        let mut schedule_hashes: Vec<(ScheduleKey, String)> = Vec::new();
        for chunk in station_ids.chunks(SCHEDULE_CHUNK) {
            let body: Vec<Value> = chunk
                .iter()
                .map(|id| serde_json::json!({ "stationID": id }))
                .collect();
            let response: BTreeMap<String, BTreeMap<String, DayHash>> =
                self.request(Method::Post, "schedules/md5", Some(Value::Array(body)))?;
            for (station_id, days) in response {
                for (day, hash) in days {
                    schedule_hashes.push(((station_id.clone(), day), hash.md5));
                }
            }
        }

        let changed = self.store.diff_schedules(&schedule_hashes);
        debug!(
            changed = changed.len(),
            known = schedule_hashes.len(),
            "diffed schedules"
        );

        // Regroup changed (station, day) pairs by station. The diff preserves
        // the sorted order, so equal stations are adjacent.
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (station_id, day) in changed {
            match grouped.last_mut() {
                Some((last, days)) if *last == station_id => days.push(day),
                _ => grouped.push((station_id, vec![day])),
            }
        }

        // Second pass: the actual schedules for the changed station/days.
        let mut airings: HashMap<String, SlotInfo> = HashMap::new();
        let mut program_hashes: Vec<(String, String)> = Vec::new();
        for chunk in grouped.chunks(SCHEDULE_CHUNK) {
            let body: Vec<Value> = chunk
                .iter()
                .map(|(station_id, days)| {
                    serde_json::json!({ "stationID": station_id, "days": days })
                })
                .collect();
            let response: Vec<WireSchedule> =
                self.request(Method::Post, "schedules", Some(Value::Array(body)))?;
            for schedule in response {
                for slot in schedule.programs {
                    program_hashes.push((slot.program_id.clone(), slot.md5));
                    airings.insert(
                        slot.program_id,
                        SlotInfo {
                            airdatetime: slot.air_date_time,
                            duration: slot.duration,
                            station_id: schedule.station_id.clone(),
                        },
                    );
                }
            }
        }

        Ok((airings, program_hashes))
    }

    fn require_token(&self) -> Result<&str, SourceError> {
        self.token.as_deref().ok_or(SourceError::LoginRequired)
    }

    fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, SourceError> {
        request_raw(
            &self.http,
            &self.base_url,
            self.token.as_deref(),
            method,
            path,
            body,
        )
    }
}

impl ListingsSource for SchedulesDirect {
    type Programs = ProgramsIter;

    fn lineups(&mut self) -> Result<Vec<Lineup>, SourceError> {
        self.get_lineups()
    }

    fn programs(&mut self, lineups: &[Lineup]) -> Result<Self::Programs, SourceError> {
        self.get_programs(lineups)
    }
}

#[derive(Clone, Copy)]
enum Method {
    Get,
    Post,
}

fn request_raw<T: serde::de::DeserializeOwned>(
    http: &HttpClient,
    base_url: &Url,
    token: Option<&str>,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> Result<T, SourceError> {
    let url = base_url.join(path)?;
    debug!(%url, "requesting");

    let mut request = match method {
        Method::Get => http.get(url),
        Method::Post => http.post(url),
    };
    if let Some(token) = token {
        request = request.header("Token", token);
    }
    if let Some(body) = body {
        request = request.json(&body);
    }

    let value: Value = request.send()?.json()?;
    // Error envelopes are JSON objects carrying a `response` key; everything
    // else is payload.
    if let Value::Object(ref map) = value {
        if map.contains_key("response") {
            return Err(SourceError::Api {
                code: map.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
    }
    Ok(serde_json::from_value(value)?)
}

/// Airing info captured from the schedule pass, keyed by program id. When a
/// program airs more than once, the last slot wins.
struct SlotInfo {
    airdatetime: DateTime<Utc>,
    duration: u32,
    station_id: String,
}

/// One-shot lazy programme sequence.
///
/// Owns its own HTTP handle so it can download the next chunk of program
/// records whenever the consumer drives it past the current one. After an
/// error the iterator is exhausted; the pipeline aborts the run anyway.
pub struct ProgramsIter {
    http: HttpClient,
    base_url: Url,
    token: String,
    chunks: VecDeque<Vec<String>>,
    airings: HashMap<String, SlotInfo>,
    stations: HashMap<String, Station>,
    pending: VecDeque<Program>,
    failed: bool,
}

impl ProgramsIter {
    fn fetch_next_chunk(&mut self) -> Result<(), SourceError> {
        let Some(ids) = self.chunks.pop_front() else {
            return Ok(());
        };
        let body = Value::Array(ids.into_iter().map(Value::String).collect());
        let records: Vec<WireProgram> = request_raw(
            &self.http,
            &self.base_url,
            Some(&self.token),
            Method::Post,
            "programs",
            Some(body),
        )?;

        for record in records {
            if let Some(program) = self.merge(record) {
                self.pending.push_back(program);
            }
        }
        Ok(())
    }

    /// Merge one program record with its schedule slot and station data.
    fn merge(&mut self, record: WireProgram) -> Option<Program> {
        let Some(slot) = self.airings.remove(&record.program_id) else {
            warn!(program = %record.program_id, "program without schedule slot, skipping");
            return None;
        };
        let Some(title) = pick_title(&record.titles) else {
            warn!(program = %record.program_id, "program without title, skipping");
            return None;
        };

        // Stations outside the fetched lineups are permissible; the id is
        // still emitted as the channel reference.
        if !self.stations.contains_key(&slot.station_id) {
            debug!(
                program = %record.program_id,
                station = %slot.station_id,
                "program references station outside fetched lineups"
            );
        }

        let subtitle = pick_subtitle(&record.titles).filter(|s| *s != title);

        Some(Program {
            id: record.program_id,
            title,
            subtitle,
            description: pick_description(record.descriptions.as_ref()),
            actors: pick_cast(record.cast.unwrap_or_default()),
            genres: record.genres.unwrap_or_default(),
            orig_airdate: record.original_air_date,
            schedule: Airing {
                airdatetime: slot.airdatetime,
                duration: slot.duration,
            },
            station_id: slot.station_id,
        })
    }
}

impl Iterator for ProgramsIter {
    type Item = Result<Program, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(program) = self.pending.pop_front() {
                return Some(Ok(program));
            }
            if self.chunks.is_empty() {
                return None;
            }
            if let Err(e) = self.fetch_next_chunk() {
                self.failed = true;
                return Some(Err(e));
            }
        }
    }
}

// Wire types, mirroring the provider's JSON shapes.

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(default)]
    lineups: Vec<StatusLineup>,
}

#[derive(Deserialize)]
struct StatusLineup {
    lineup: String,
    modified: String,
}

#[derive(Deserialize)]
struct LineupResponse {
    #[serde(default)]
    stations: Vec<WireStation>,
}

#[derive(Deserialize)]
struct WireStation {
    #[serde(rename = "stationID")]
    station_id: String,
    name: Option<String>,
    logo: Option<WireLogo>,
}

#[derive(Deserialize)]
struct WireLogo {
    #[serde(rename = "URL")]
    url: String,
}

#[derive(Deserialize)]
struct DayHash {
    md5: String,
}

#[derive(Deserialize)]
struct WireSchedule {
    #[serde(rename = "stationID")]
    station_id: String,
    #[serde(default)]
    programs: Vec<WireSlot>,
}

#[derive(Deserialize)]
struct WireSlot {
    #[serde(rename = "programID")]
    program_id: String,
    #[serde(rename = "airDateTime")]
    air_date_time: DateTime<Utc>,
    duration: u32,
    md5: String,
}

#[derive(Deserialize)]
struct WireProgram {
    #[serde(rename = "programID")]
    program_id: String,
    #[serde(default)]
    titles: Vec<HashMap<String, String>>,
    descriptions: Option<WireDescriptions>,
    #[serde(rename = "originalAirDate")]
    original_air_date: Option<NaiveDate>,
    genres: Option<Vec<String>>,
    cast: Option<Vec<WirePerson>>,
}

/// Keys are `description100`, `description1000`, ...; values are per-language
/// variants of that length.
#[derive(Deserialize)]
struct WireDescriptions(HashMap<String, Vec<WireDescription>>);

#[derive(Deserialize)]
struct WireDescription {
    description: String,
}

#[derive(Deserialize)]
struct WirePerson {
    name: String,
    #[serde(rename = "billingOrder")]
    billing_order: Option<String>,
}

/// Shortest title variant (`title120` etc., smallest length suffix).
fn pick_title(titles: &[HashMap<String, String>]) -> Option<String> {
    titles
        .iter()
        .flat_map(|t| t.iter())
        .filter_map(|(key, value)| {
            key.strip_prefix("title")
                .and_then(|n| n.parse::<u32>().ok())
                .map(|n| (n, value))
        })
        .min_by_key(|(n, _)| *n)
        .map(|(_, value)| value.clone())
}

/// Longest title variant, used as the sub-title when it differs.
fn pick_subtitle(titles: &[HashMap<String, String>]) -> Option<String> {
    titles
        .iter()
        .flat_map(|t| t.iter())
        .filter_map(|(key, value)| {
            key.strip_prefix("title")
                .and_then(|n| n.parse::<u32>().ok())
                .map(|n| (n, value))
        })
        .max_by_key(|(n, _)| *n)
        .map(|(_, value)| value.clone())
}

/// Longest description variant.
fn pick_description(descriptions: Option<&WireDescriptions>) -> Option<String> {
    descriptions?
        .0
        .iter()
        .filter_map(|(key, variants)| {
            key.strip_prefix("description")
                .and_then(|n| n.parse::<u32>().ok())
                .map(|n| (n, variants))
        })
        .max_by_key(|(n, _)| *n)
        .and_then(|(_, variants)| variants.first())
        .map(|v| v.description.clone())
}

/// Cast in billing order.
fn pick_cast(mut cast: Vec<WirePerson>) -> Vec<Actor> {
    cast.sort_by(|a, b| a.billing_order.cmp(&b.billing_order));
    cast.into_iter().map(|p| Actor { name: p.name }).collect()
}
