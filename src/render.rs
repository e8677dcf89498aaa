//! Chat-neutral replies for each command.
//!
//! A [`Reply`] is either plain text or an embed with a title, an optional
//! description and ordered fields. Front ends map embeds onto whatever their
//! platform offers; `Display` renders any reply as plain text for the CLI.

use serde::Serialize;
use std::fmt;

use crate::feed::{Aircraft, Controller, Pilot, SearchResult, Server};
use crate::metar;
use crate::report::DecodedReport;

/// Accent colour of every embed.
pub const EMBED_COLOR: u32 = 0x1e90ff;

const UNKNOWN_STATION: &str = "UNKNOWN";

/// One named field of an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Rich reply with a title, description and fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<Field>,
    pub color: u32,
}

impl Embed {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            fields: Vec::new(),
            color: EMBED_COLOR,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        inline: bool,
    ) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    /// Look up a field value by name.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

impl fmt::Display for Embed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", "─".repeat(self.title.chars().count()))?;

        if let Some(ref description) = self.description {
            writeln!(f, "{}", description)?;
        }

        for field in &self.fields {
            writeln!(f)?;
            if field.inline {
                writeln!(f, "{}: {}", field.name, field.value)?;
            } else {
                writeln!(f, "{}:", field.name)?;
                writeln!(f, "{}", field.value)?;
            }
        }
        Ok(())
    }
}

/// Response to a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Reply {
    Text(String),
    Embed(Embed),
}

impl Reply {
    pub fn text(message: impl Into<String>) -> Self {
        Reply::Text(message.into())
    }

    pub fn as_embed(&self) -> Option<&Embed> {
        match self {
            Reply::Embed(embed) => Some(embed),
            Reply::Text(_) => None,
        }
    }
}

impl From<Embed> for Reply {
    fn from(embed: Embed) -> Self {
        Reply::Embed(embed)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Text(text) => writeln!(f, "{}", text),
            Reply::Embed(embed) => write!(f, "{}", embed),
        }
    }
}

/// Reply for an upstream failure.
pub fn error_reply(what: &str, detail: impl fmt::Display) -> Reply {
    Reply::Text(format!("Error fetching {}: {}", what, detail))
}

/// Decoded METAR with the raw report and TAF.
///
/// An empty `raw_metar` means the service knows no report for the airport.
pub fn weather_reply(
    icao: &str,
    raw_metar: &str,
    report: &DecodedReport,
    taf: Option<&str>,
) -> Reply {
    let icao = icao.to_ascii_uppercase();
    if raw_metar.trim().is_empty() {
        return Reply::Text(format!("No METAR data available for {}.", icao));
    }

    let taf = match taf.map(str::trim).filter(|t| !t.is_empty()) {
        Some(taf) => format!("`{}`", taf),
        None => "No TAF data available.".to_string(),
    };

    Embed::new(format!(
        "METAR for {} observation at {}",
        icao,
        report.observation_time_label()
    ))
    .field("Raw METAR", format!("`{}`", raw_metar.trim()), false)
    .field("Decoded METAR", report.decoded_text(), false)
    .field("TAF", taf, false)
    .into()
}

/// A report decoded offline, without a TAF.
pub fn decoded_reply(raw_metar: &str, report: &DecodedReport) -> Reply {
    let station = metar::station(raw_metar).unwrap_or(UNKNOWN_STATION);
    Embed::new(format!(
        "METAR for {} observation at {}",
        station,
        report.observation_time_label()
    ))
    .field("Raw METAR", format!("`{}`", raw_metar.trim()), false)
    .field("Decoded METAR", report.decoded_text(), false)
    .into()
}

/// ATIS text, frequency and information letter of a station.
pub fn atis_reply(icao: &str, atis: Option<&Controller>) -> Reply {
    let icao = icao.to_ascii_uppercase();
    match atis {
        Some(atis) => Embed::new(format!("ATIS for {}", icao))
            .field("ATIS Information", atis.atis_text(), false)
            .field("Frequency", atis.frequency.clone(), true)
            .field("ATIS Code", atis.atis_code_or_na(), true)
            .into(),
        None => Reply::Text(format!("No ATIS data available for {}.", icao)),
    }
}

/// The first `limit` pilots.
pub fn pilots_reply(pilots: &[Pilot], limit: usize) -> Reply {
    if pilots.is_empty() {
        return Reply::text("No pilots currently online.");
    }

    let blocks: Vec<String> = pilots
        .iter()
        .take(limit)
        .map(|p| {
            format!(
                "**{}** | {}\nAircraft: {}\nAltitude: {} ft | Ground Speed: {} kts\nLocation: {}, {}",
                p.callsign,
                p.name,
                p.aircraft(),
                p.altitude,
                p.groundspeed,
                p.latitude,
                p.longitude
            )
        })
        .collect();

    Embed::new("Online Pilots")
        .description(blocks.join("\n\n"))
        .into()
}

/// The first `limit` controllers.
pub fn controllers_reply(controllers: &[Controller], limit: usize) -> Reply {
    if controllers.is_empty() {
        return Reply::text("No controllers currently online.");
    }

    let blocks: Vec<String> = controllers
        .iter()
        .take(limit)
        .map(|c| {
            format!(
                "**{}** | {}\nFrequency: {}\nPosition: {}",
                c.callsign, c.name, c.frequency, c.facility
            )
        })
        .collect();

    Embed::new("Online Controllers")
        .description(blocks.join("\n\n"))
        .into()
}

pub fn servers_reply(servers: &[Server]) -> Reply {
    if servers.is_empty() {
        return Reply::text("No servers currently available.");
    }

    let blocks: Vec<String> = servers
        .iter()
        .map(|s| {
            format!(
                "**{}** ({})\nLocation: {}\nHostname/IP: {}",
                s.name, s.ident, s.location, s.hostname_or_ip
            )
        })
        .collect();

    Embed::new("VATSIM Servers")
        .description(blocks.join("\n\n"))
        .into()
}

/// Everything known about a callsign on the network.
pub fn search_reply(callsign: &str, result: &SearchResult<'_>) -> Reply {
    let callsign = callsign.to_ascii_uppercase();
    if result.is_empty() {
        return Reply::Text(format!("No data found for the callsign '{}'.", callsign));
    }

    let mut embed = Embed::new(format!("Information for {}", callsign));

    if let Some(pilot) = result.pilot {
        embed = embed.field(
            "Pilot",
            format!(
                "**Name**: {}\n**Callsign**: {}\n**Aircraft**: {}\n**Altitude**: {} ft\n**Ground Speed**: {} kts\n**Location**: {}, {}\n**Logon Time**: {}",
                pilot.name,
                pilot.callsign,
                pilot.aircraft(),
                pilot.altitude,
                pilot.groundspeed,
                pilot.latitude,
                pilot.longitude,
                pilot.logon_time
            ),
            false,
        );
    }

    if let Some(controller) = result.controller {
        embed = embed.field(
            "Controller",
            format!(
                "**Name**: {}\n**Callsign**: {}\n**Frequency**: {}\n**Position**: {}\n**Logon Time**: {}",
                controller.name,
                controller.callsign,
                controller.frequency,
                controller.facility,
                controller.logon_time
            ),
            false,
        );
    }

    if let Some(atis) = result.atis {
        embed = embed.field(
            "ATIS",
            format!(
                "**Callsign**: {}\n**Frequency**: {}\n**ATIS Code**: {}\n**ATIS Information**: {}",
                atis.callsign,
                atis.frequency,
                atis.atis_code_or_na(),
                atis.atis_text()
            ),
            false,
        );
    }

    embed.into()
}

fn or_na<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

/// Real-world details of the first aircraft flying a callsign.
pub fn aircraft_reply(callsign: &str, aircraft: Option<&Aircraft>) -> Reply {
    let callsign = callsign.to_ascii_uppercase();
    let Some(ac) = aircraft else {
        return Reply::Text(format!("No aircraft found with callsign '{}'.", callsign));
    };

    let (lat, lon) = match ac.position() {
        Some((lat, lon)) => (Some(lat), Some(lon)),
        None => (None, None),
    };

    let description = format!(
        "**Hex Code**: {}\n**Type**: {} ({})\n**Registration**: {}\n**Altitude**: {} ft\n**Ground Speed**: {} kts\n**Track**: {}°\n**Squawk**: {}\n**Latitude**: {}\n**Longitude**: {}\n**Last Seen**: {} seconds ago",
        or_na(ac.hex.as_deref()),
        or_na(ac.type_code.as_deref()),
        or_na(ac.desc.as_deref()),
        or_na(ac.registration.as_deref()),
        or_na(ac.alt_baro.as_ref()),
        or_na(ac.gs),
        or_na(ac.track),
        or_na(ac.squawk.as_deref()),
        or_na(lat),
        or_na(lon),
        or_na(ac.seen)
    );

    let tracking_link = format!(
        "https://globe.airplanes.live/?icao={}",
        ac.hex.as_deref().unwrap_or_default()
    );

    Embed::new(format!("IRL Information for {}", callsign))
        .description(description)
        .field(
            "Track on Airplanes.live",
            format!("[Track here]({})", tracking_link),
            true,
        )
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::tests::SAMPLE_FEED;
    use crate::feed::{BaroAltitude, VatsimData};

    fn sample() -> VatsimData {
        VatsimData::from_json(SAMPLE_FEED).unwrap()
    }

    #[test]
    fn test_weather_reply() {
        let raw = "KJFK 181851Z 24015G25KT 10SM FEW250 24/09 A3002";
        let report = metar::decode(raw);
        let taf = "TAF KJFK 181720Z 1818/1924 24012KT P6SM";
        let reply = weather_reply("kjfk", raw, &report, Some(taf));

        let embed = reply.as_embed().unwrap();
        assert_eq!(embed.title, "METAR for KJFK observation at 181851Z");
        assert_eq!(embed.color, EMBED_COLOR);
        assert_eq!(embed.field_value("Raw METAR"), Some(format!("`{}`", raw).as_str()));
        assert_eq!(
            embed.field_value("Decoded METAR"),
            Some(report.decoded_text().as_str())
        );
        assert_eq!(
            embed.field_value("TAF"),
            Some("`TAF KJFK 181720Z 1818/1924 24012KT P6SM`")
        );
    }

    #[test]
    fn test_weather_reply_without_taf() {
        let raw = "EGLL 181850Z 27005KT";
        let report = metar::decode(raw);

        for taf in [None, Some(""), Some("  \n")] {
            let reply = weather_reply("EGLL", raw, &report, taf);
            assert_eq!(
                reply.as_embed().unwrap().field_value("TAF"),
                Some("No TAF data available.")
            );
        }
    }

    #[test]
    fn test_weather_reply_without_metar() {
        let reply = weather_reply("zzzz", "", &DecodedReport::default(), None);
        assert_eq!(reply, Reply::text("No METAR data available for ZZZZ."));
    }

    #[test]
    fn test_decoded_reply() {
        let raw = "METAR EGLL 181850Z 27005KT Q1013";
        let reply = decoded_reply(raw, &metar::decode(raw));
        let embed = reply.as_embed().unwrap();

        assert_eq!(embed.title, "METAR for EGLL observation at 181850Z");
        assert_eq!(embed.fields.len(), 2);
        assert!(embed.field_value("TAF").is_none());

        let reply = decoded_reply("garbage", &metar::decode("garbage"));
        let embed = reply.as_embed().unwrap();
        assert_eq!(embed.title, "METAR for UNKNOWN observation at Unknown");
        assert_eq!(
            embed.field_value("Decoded METAR"),
            Some("No significant weather observed.")
        );
    }

    #[test]
    fn test_atis_reply() {
        let data = sample();
        let reply = atis_reply("kjfk", data.find_atis("kjfk"));
        let embed = reply.as_embed().unwrap();

        assert_eq!(embed.title, "ATIS for KJFK");
        assert_eq!(
            embed.field_value("ATIS Information"),
            Some("JFK INFORMATION DELTA\n1851Z 24015G25KT")
        );
        assert_eq!(embed.field_value("Frequency"), Some("128.725"));
        assert_eq!(embed.field_value("ATIS Code"), Some("D"));

        assert_eq!(
            atis_reply("egll", None),
            Reply::text("No ATIS data available for EGLL.")
        );
    }

    #[test]
    fn test_pilots_reply_respects_limit() {
        let data = sample();
        let reply = pilots_reply(&data.pilots, 1);
        let description = reply.as_embed().unwrap().description.clone().unwrap();

        assert!(description.starts_with("**DAL123** | Jane Pilot\nAircraft: B738/L\n"));
        assert!(description.contains("Altitude: 3500 ft | Ground Speed: 210 kts"));
        assert!(!description.contains("N172SP"));

        assert_eq!(pilots_reply(&[], 10), Reply::text("No pilots currently online."));
    }

    #[test]
    fn test_controllers_and_servers() {
        let data = sample();

        let reply = controllers_reply(&data.controllers, 10);
        assert_eq!(
            reply.as_embed().unwrap().description.as_deref(),
            Some("**NY_CTR** | Sam Controller\nFrequency: 125.325\nPosition: CTR")
        );
        assert_eq!(
            controllers_reply(&[], 10),
            Reply::text("No controllers currently online.")
        );

        let reply = servers_reply(&data.servers);
        assert_eq!(reply.as_embed().unwrap().title, "VATSIM Servers");
        assert_eq!(
            servers_reply(&[]),
            Reply::text("No servers currently available.")
        );
    }

    #[test]
    fn test_search_reply() {
        let data = sample();

        let reply = search_reply("kjfk_atis", &data.search("kjfk_atis"));
        let embed = reply.as_embed().unwrap();
        assert_eq!(embed.title, "Information for KJFK_ATIS");
        assert_eq!(embed.fields.len(), 1);
        assert!(embed.field_value("ATIS").unwrap().contains("**ATIS Code**: D"));

        let reply = search_reply("dal123", &data.search("dal123"));
        let pilot = reply.as_embed().unwrap().field_value("Pilot").unwrap();
        assert!(pilot.contains("**Logon Time**: 2026-10-18T10:00:00.0000000Z"));

        assert_eq!(
            search_reply("ual1", &data.search("ual1")),
            Reply::text("No data found for the callsign 'UAL1'.")
        );
    }

    #[test]
    fn test_aircraft_reply() {
        let aircraft = Aircraft {
            hex: Some("a1b2c3".to_string()),
            type_code: Some("B738".to_string()),
            alt_baro: Some(BaroAltitude::Feet(35000)),
            lat: Some(33.5),
            lon: Some(-84.25),
            ..Default::default()
        };
        let reply = aircraft_reply("dal123", Some(&aircraft));
        let embed = reply.as_embed().unwrap();

        assert_eq!(embed.title, "IRL Information for DAL123");
        let description = embed.description.as_deref().unwrap();
        assert!(description.contains("**Type**: B738 (N/A)"));
        assert!(description.contains("**Altitude**: 35000 ft"));
        assert!(description.contains("**Latitude**: 33.5"));
        assert!(description.contains("**Squawk**: N/A"));
        assert_eq!(
            embed.field_value("Track on Airplanes.live"),
            Some("[Track here](https://globe.airplanes.live/?icao=a1b2c3)")
        );

        assert_eq!(
            aircraft_reply("dal123", None),
            Reply::text("No aircraft found with callsign 'DAL123'.")
        );
    }

    #[test]
    fn test_error_reply() {
        assert_eq!(
            error_reply("pilots data", "Server returned error status: 502 Bad Gateway"),
            Reply::text("Error fetching pilots data: Server returned error status: 502 Bad Gateway")
        );
    }

    #[test]
    fn test_plain_text_rendering() {
        let reply: Reply = Embed::new("Title")
            .description("Body")
            .field("Frequency", "128.725", true)
            .field("Notes", "line one", false)
            .into();

        assert_eq!(
            reply.to_string(),
            "Title\n─────\nBody\n\nFrequency: 128.725\n\nNotes:\nline one\n"
        );
        assert_eq!(Reply::text("hello").to_string(), "hello\n");
    }
}
