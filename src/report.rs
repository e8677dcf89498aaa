//! Data structures representing a decoded METAR.
//!
//! Every element type renders itself (via `Display`) as the single
//! human-readable line that appears in a decoded report. The report keeps
//! the typed elements so callers can use the values without re-parsing the
//! rendered lines.

use chrono::NaiveTime;
use serde::{Serialize, Serializer};
use std::fmt;

/// Observation time reported when the METAR carries no `DDHHMMZ` group.
pub const UNKNOWN_OBSERVATION_TIME: &str = "Unknown";

/// The only line of a report in which no element could be decoded.
pub const NO_SIGNIFICANT_WEATHER: &str = "No significant weather observed.";

/// Surface wind group, e.g. `24015G25KT`.
///
/// Values keep the digits exactly as they appeared in the report, so a
/// speed written `05` renders as `05` and one written `105` as `105`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wind {
    /// True direction the wind blows from, three digits.
    pub direction: String,

    /// Mean speed in knots, two or three digits.
    pub speed: String,

    /// Gust speed in knots, without the leading `G`.
    pub gust: Option<String>,
}

impl Wind {
    /// Direction in degrees.
    pub fn direction_degrees(&self) -> Option<u16> {
        self.direction.parse().ok()
    }

    /// Mean speed in knots.
    pub fn speed_knots(&self) -> Option<u16> {
        self.speed.parse().ok()
    }

    /// Gust speed in knots, if the report has one.
    pub fn gust_knots(&self) -> Option<u16> {
        self.gust.as_deref().and_then(|g| g.parse().ok())
    }
}

impl fmt::Display for Wind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wind: {}° at {} KT", self.direction, self.speed)?;
        if let Some(ref gust) = self.gust {
            write!(f, ", gusting to {} KT", gust)?;
        }
        Ok(())
    }
}

/// Prevailing visibility in meters (four-digit group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Visibility(pub u16);

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Visibility: {:04} meters", self.0)
    }
}

/// A whole-degree Celsius value as written in a METAR (`05`, `M05`).
///
/// The sign is kept separately from the magnitude because `M00` (just below
/// zero) and `00` are different observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Celsius {
    pub negative: bool,
    pub magnitude: u8,
}

impl Celsius {
    /// Signed value in degrees.
    pub fn degrees(&self) -> i16 {
        if self.negative {
            -(self.magnitude as i16)
        } else {
            self.magnitude as i16
        }
    }
}

impl fmt::Display for Celsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "{:02}", self.magnitude)
    }
}

/// Temperature and dew point group, e.g. `M05/M10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Temperature {
    pub air: Celsius,
    pub dew_point: Celsius,
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Temperature: {}°C, Dew Point: {}°C",
            self.air, self.dew_point
        )
    }
}

/// Pressure group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum Pressure {
    /// `QNH1013`: hectopascals.
    Hectopascals(u16),
    /// `A3012`: altimeter setting in hundredths of an inch of mercury.
    InchesOfMercury(u16),
}

impl fmt::Display for Pressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pressure::Hectopascals(value) => write!(f, "Pressure: {:04} hPa", value),
            Pressure::InchesOfMercury(value) => {
                write!(f, "Pressure: {:02}.{:02} inHg", value / 100, value % 100)
            }
        }
    }
}

/// Intensity or proximity qualifier of a weather group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intensity {
    /// `-`
    Light,
    /// `+`
    Heavy,
    /// `VC`
    Vicinity,
}

impl Intensity {
    pub fn code(&self) -> &'static str {
        match self {
            Intensity::Light => "-",
            Intensity::Heavy => "+",
            Intensity::Vicinity => "VC",
        }
    }
}

/// Weather descriptor codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Descriptor {
    Shallow,
    Partial,
    Patches,
    LowDrifting,
    Blowing,
    Showers,
    Thunderstorm,
    Freezing,
}

const DESCRIPTOR_CODES: &[(Descriptor, &str)] = &[
    (Descriptor::Shallow, "MI"),
    (Descriptor::Partial, "PR"),
    (Descriptor::Patches, "BC"),
    (Descriptor::LowDrifting, "DR"),
    (Descriptor::Blowing, "BL"),
    (Descriptor::Showers, "SH"),
    (Descriptor::Thunderstorm, "TS"),
    (Descriptor::Freezing, "FZ"),
];

impl Descriptor {
    /// Look up a descriptor by its two-letter code (case-sensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        DESCRIPTOR_CODES
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(d, _)| *d)
    }

    pub fn code(&self) -> &'static str {
        DESCRIPTOR_CODES
            .iter()
            .find(|(d, _)| d == self)
            .map(|(_, c)| *c)
            .unwrap_or_default()
    }
}

/// Weather phenomenon codes (precipitation, obscuration and other).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phenomenon {
    Drizzle,
    Rain,
    Snow,
    SnowGrains,
    IceCrystals,
    IcePellets,
    Hail,
    SmallHail,
    UnknownPrecipitation,
    Haze,
    Mist,
    Fog,
    Smoke,
    VolcanicAsh,
    Dust,
    Sand,
    Sandstorm,
    Duststorm,
}

const PHENOMENON_CODES: &[(Phenomenon, &str)] = &[
    (Phenomenon::Drizzle, "DZ"),
    (Phenomenon::Rain, "RA"),
    (Phenomenon::Snow, "SN"),
    (Phenomenon::SnowGrains, "SG"),
    (Phenomenon::IceCrystals, "IC"),
    (Phenomenon::IcePellets, "PL"),
    (Phenomenon::Hail, "GR"),
    (Phenomenon::SmallHail, "GS"),
    (Phenomenon::UnknownPrecipitation, "UP"),
    (Phenomenon::Haze, "HZ"),
    (Phenomenon::Mist, "BR"),
    (Phenomenon::Fog, "FG"),
    (Phenomenon::Smoke, "FU"),
    (Phenomenon::VolcanicAsh, "VA"),
    (Phenomenon::Dust, "DU"),
    (Phenomenon::Sand, "SA"),
    (Phenomenon::Sandstorm, "SS"),
    (Phenomenon::Duststorm, "DS"),
];

impl Phenomenon {
    /// Look up a phenomenon by its two-letter code (case-sensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        PHENOMENON_CODES
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(p, _)| *p)
    }

    pub fn code(&self) -> &'static str {
        PHENOMENON_CODES
            .iter()
            .find(|(p, _)| p == self)
            .map(|(_, c)| *c)
            .unwrap_or_default()
    }
}

// Weather codes serialize as the codes that appear in the report.
impl Serialize for Intensity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl Serialize for Descriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl Serialize for Phenomenon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// Present weather group, e.g. `+TSRA`, `-DZ`, `VCSH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Weather {
    pub intensity: Option<Intensity>,
    pub descriptor: Option<Descriptor>,
    pub phenomenon: Option<Phenomenon>,
}

impl Weather {
    /// Whether any of the three parts was found.
    ///
    /// The weather pattern is entirely optional and therefore always
    /// matches; a group with no parts must not produce a line.
    pub fn is_present(&self) -> bool {
        self.intensity.is_some() || self.descriptor.is_some() || self.phenomenon.is_some()
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [
            self.intensity.map(|i| i.code()),
            self.descriptor.map(|d| d.code()),
            self.phenomenon.map(|p| p.code()),
        ]
        .into_iter()
        .flatten()
        .collect();
        write!(f, "Weather: {}", parts.join(" "))
    }
}

/// Cloud amount of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CloudCover {
    #[serde(rename = "FEW")]
    Few,
    #[serde(rename = "SCT")]
    Scattered,
    #[serde(rename = "BKN")]
    Broken,
    #[serde(rename = "OVC")]
    Overcast,
}

impl fmt::Display for CloudCover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudCover::Few => write!(f, "FEW"),
            CloudCover::Scattered => write!(f, "SCT"),
            CloudCover::Broken => write!(f, "BKN"),
            CloudCover::Overcast => write!(f, "OVC"),
        }
    }
}

/// A single cloud layer, e.g. `BKN020`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CloudLayer {
    pub cover: CloudCover,

    /// Base height in hundreds of feet, as written in the report.
    pub height_hundreds: u16,
}

impl CloudLayer {
    /// Base height in feet.
    pub fn height_feet(&self) -> u32 {
        self.height_hundreds as u32 * 100
    }
}

impl fmt::Display for CloudLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {} feet", self.cover, self.height_feet())
    }
}

/// Structured result of decoding one raw METAR.
///
/// Every element is optional and decoded independently of the others.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DecodedReport {
    /// The `DDHHMMZ` group as written, if present.
    pub observation_time: Option<String>,
    pub wind: Option<Wind>,
    pub visibility: Option<Visibility>,
    pub temperature: Option<Temperature>,
    pub pressure: Option<Pressure>,
    pub weather: Option<Weather>,

    /// All cloud layers in the order they appear.
    pub clouds: Vec<CloudLayer>,
}

impl DecodedReport {
    /// The observation time group, or `"Unknown"` if the report had none.
    pub fn observation_time_label(&self) -> &str {
        self.observation_time
            .as_deref()
            .unwrap_or(UNKNOWN_OBSERVATION_TIME)
    }

    /// Interpret the observation time as day of month and UTC time.
    ///
    /// Returns `None` when the group is absent or holds impossible values.
    pub fn observed_at(&self) -> Option<(u32, NaiveTime)> {
        let stamp = self.observation_time.as_deref()?;
        let digits = stamp.strip_suffix('Z')?;
        if digits.len() != 6 {
            return None;
        }
        let day: u32 = digits[0..2].parse().ok()?;
        let hour: u32 = digits[2..4].parse().ok()?;
        let minute: u32 = digits[4..6].parse().ok()?;
        if !(1..=31).contains(&day) {
            return None;
        }
        NaiveTime::from_hms_opt(hour, minute, 0).map(|time| (day, time))
    }

    /// Whether no weather element was decoded (observation time aside).
    pub fn is_empty(&self) -> bool {
        self.wind.is_none()
            && self.visibility.is_none()
            && self.temperature.is_none()
            && self.pressure.is_none()
            && self.weather.filter(Weather::is_present).is_none()
            && self.clouds.is_empty()
    }

    /// Human-readable lines in fixed element order.
    ///
    /// Order: wind, visibility, temperature, pressure, weather, clouds.
    /// A report with no elements yields the single
    /// [`NO_SIGNIFICANT_WEATHER`] line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(6);

        if let Some(ref wind) = self.wind {
            lines.push(wind.to_string());
        }
        if let Some(visibility) = self.visibility {
            lines.push(visibility.to_string());
        }
        if let Some(temperature) = self.temperature {
            lines.push(temperature.to_string());
        }
        if let Some(pressure) = self.pressure {
            lines.push(pressure.to_string());
        }
        if let Some(weather) = self.weather.filter(Weather::is_present) {
            lines.push(weather.to_string());
        }
        if !self.clouds.is_empty() {
            let layers: Vec<String> = self.clouds.iter().map(|c| c.to_string()).collect();
            lines.push(format!("Clouds: {}", layers.join(", ")));
        }

        if lines.is_empty() {
            lines.push(NO_SIGNIFICANT_WEATHER.to_string());
        }
        lines
    }

    /// The decoded lines joined with newlines.
    pub fn decoded_text(&self) -> String {
        self.lines().join("\n")
    }
}
