//! Typed schema for the upstream data feeds.
//!
//! The VATSIM v3 data feed and the airplanes.live callsign API are decoded
//! into these structures at the boundary. Unknown fields are ignored and
//! optional fields default, so a feed that grows new keys keeps working,
//! while a structurally broken document is rejected as a whole.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::client::FeedError;

/// Header block of the VATSIM data feed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct General {
    pub version: u32,
    pub update_timestamp: String,
    pub connected_clients: u32,
    pub unique_users: u32,
}

/// Flight plan filed by a pilot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FlightPlan {
    pub flight_rules: String,
    pub aircraft_faa: String,
    pub aircraft_short: String,
    pub departure: String,
    pub arrival: String,
    pub altitude: String,
    pub route: String,
}

/// A connected pilot.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Pilot {
    pub cid: u64,
    pub name: String,
    pub callsign: String,
    #[serde(default)]
    pub server: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: i32,
    pub groundspeed: i32,
    #[serde(default)]
    pub heading: i32,
    #[serde(default)]
    pub transponder: String,
    #[serde(default)]
    pub qnh_mb: i32,
    #[serde(default)]
    pub flight_plan: Option<FlightPlan>,
    pub logon_time: String,
}

impl Pilot {
    /// FAA aircraft type from the flight plan, or `N/A` without one.
    pub fn aircraft(&self) -> &str {
        self.flight_plan
            .as_ref()
            .map(|fp| fp.aircraft_faa.as_str())
            .filter(|a| !a.is_empty())
            .unwrap_or("N/A")
    }
}

/// Controller facility type as published in the feed (0..=6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Facility {
    Observer,
    FlightService,
    Delivery,
    Ground,
    Tower,
    Approach,
    Center,
    Other(i32),
}

impl From<i32> for Facility {
    fn from(v: i32) -> Self {
        match v {
            0 => Facility::Observer,
            1 => Facility::FlightService,
            2 => Facility::Delivery,
            3 => Facility::Ground,
            4 => Facility::Tower,
            5 => Facility::Approach,
            6 => Facility::Center,
            other => Facility::Other(other),
        }
    }
}

impl From<Facility> for i32 {
    fn from(f: Facility) -> Self {
        match f {
            Facility::Observer => 0,
            Facility::FlightService => 1,
            Facility::Delivery => 2,
            Facility::Ground => 3,
            Facility::Tower => 4,
            Facility::Approach => 5,
            Facility::Center => 6,
            Facility::Other(other) => other,
        }
    }
}

impl Facility {
    /// Short name as used in callsign suffixes (`TWR`, `CTR`, ...).
    pub fn short_name(&self) -> &'static str {
        match self {
            Facility::Observer => "OBS",
            Facility::FlightService => "FSS",
            Facility::Delivery => "DEL",
            Facility::Ground => "GND",
            Facility::Tower => "TWR",
            Facility::Approach => "APP",
            Facility::Center => "CTR",
            Facility::Other(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// A connected controller or ATIS station.
///
/// The feed lists ATIS stations separately but with the same shape plus
/// an optional information letter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Controller {
    pub cid: u64,
    pub name: String,
    pub callsign: String,
    pub frequency: String,
    pub facility: Facility,
    #[serde(default)]
    pub rating: i32,
    #[serde(default)]
    pub text_atis: Option<Vec<String>>,
    #[serde(default)]
    pub atis_code: Option<String>,
    pub logon_time: String,
}

impl Controller {
    /// ATIS text lines joined with newlines (empty if none).
    pub fn atis_text(&self) -> String {
        self.text_atis
            .as_ref()
            .map(|lines| lines.join("\n"))
            .unwrap_or_default()
    }

    /// ATIS information letter, or `N/A`.
    pub fn atis_code_or_na(&self) -> &str {
        self.atis_code.as_deref().unwrap_or("N/A")
    }
}

/// A VATSIM FSD server.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Server {
    pub ident: String,
    pub hostname_or_ip: String,
    pub location: String,
    pub name: String,
}

/// One snapshot of the VATSIM v3 data feed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VatsimData {
    pub general: Option<General>,
    pub pilots: Vec<Pilot>,
    pub controllers: Vec<Controller>,
    pub atis: Vec<Controller>,
    pub servers: Vec<Server>,
}

/// Matches for a callsign search across pilots, controllers and ATIS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchResult<'a> {
    pub pilot: Option<&'a Pilot>,
    pub controller: Option<&'a Controller>,
    pub atis: Option<&'a Controller>,
}

impl SearchResult<'_> {
    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.pilot.is_none() && self.controller.is_none() && self.atis.is_none()
    }
}

impl VatsimData {
    /// Decode a feed document.
    pub fn from_json(json: &str) -> Result<Self, FeedError> {
        Ok(serde_json::from_str(json)?)
    }

    /// First ATIS station whose callsign starts with the given ICAO code.
    pub fn find_atis(&self, icao: &str) -> Option<&Controller> {
        let icao = icao.to_ascii_uppercase();
        self.atis.iter().find(|a| a.callsign.starts_with(&icao))
    }

    /// Case-insensitive exact callsign lookup in every client list.
    pub fn search(&self, callsign: &str) -> SearchResult<'_> {
        let matches = |other: &str| other.eq_ignore_ascii_case(callsign);
        SearchResult {
            pilot: self.pilots.iter().find(|p| matches(&p.callsign)),
            controller: self.controllers.iter().find(|c| matches(&c.callsign)),
            atis: self.atis.iter().find(|a| matches(&a.callsign)),
        }
    }
}

/// Barometric altitude from airplanes.live: feet, or `"ground"`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BaroAltitude {
    Feet(i64),
    Label(String),
}

impl fmt::Display for BaroAltitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaroAltitude::Feet(feet) => write!(f, "{}", feet),
            BaroAltitude::Label(label) => write!(f, "{}", label),
        }
    }
}

/// Last known position reported by airplanes.live for stale aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LastPosition {
    pub lat: f64,
    pub lon: f64,
}

/// A real-world aircraft from airplanes.live.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Aircraft {
    pub hex: Option<String>,
    #[serde(rename = "t")]
    pub type_code: Option<String>,
    pub desc: Option<String>,
    #[serde(rename = "r")]
    pub registration: Option<String>,
    pub alt_baro: Option<BaroAltitude>,
    pub gs: Option<f64>,
    pub track: Option<f64>,
    pub squawk: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(rename = "lastPosition")]
    pub last_position: Option<LastPosition>,
    pub seen: Option<f64>,
}

impl Aircraft {
    /// Best known position: the stale-position block if present, otherwise
    /// the live coordinates.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.last_position, self.lat, self.lon) {
            (Some(pos), _, _) => Some((pos.lat, pos.lon)),
            (None, Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Response envelope of the airplanes.live callsign endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AircraftResponse {
    pub ac: Vec<Aircraft>,
}

impl AircraftResponse {
    /// Decode a response document.
    pub fn from_json(json: &str) -> Result<Self, FeedError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The first matching aircraft.
    pub fn first(&self) -> Option<&Aircraft> {
        self.ac.first()
    }
}
