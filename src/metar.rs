//! Decoder for METAR surface weather observations.
//!
//! METAR groups identify themselves by their internal shape (digit counts,
//! suffix letters) rather than by position, so each element is found with
//! its own scan over the whole report instead of a token-by-token parser.
//! Every scan is independent: a malformed wind group never prevents the
//! visibility or cloud groups from being found.
//!
//! The element grammars are `nom` parsers. A scan runs the parser at every
//! character offset and keeps the leftmost success.
//!
//! # Example
//!
//! ```text
//! KJFK 181851Z 24015G25KT 10SM FEW250 M05/M10 A3012 RMK AO2
//! ```
//!
//! decodes to wind 240° at 15 KT gusting 25, temperature -05°C, dew point
//! -10°C, pressure 30.12 inHg and a few clouds at 25000 feet.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take, take_while_m_n},
    character::complete::char,
    combinator::{map, map_opt, map_res, opt, recognize, value},
    error::Error,
    sequence::{preceded, terminated},
};

use crate::report::{
    Celsius, CloudCover, CloudLayer, DecodedReport, Descriptor, Intensity, Phenomenon, Pressure,
    Temperature, Visibility, Weather, Wind,
};

/// Exactly `count` ASCII digits.
fn digits<'a>(count: usize) -> impl Parser<&'a str, Output = &'a str, Error = Error<&'a str>> {
    take_while_m_n(count, count, |c: char| c.is_ascii_digit())
}

/// Characters that count as part of a word for group boundaries.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Run `parser` at each character offset of `input`, returning the first
/// success and the input left after it.
fn find_first<'a, O, P>(input: &'a str, mut parser: P) -> Option<(&'a str, O)>
where
    P: Parser<&'a str, Output = O, Error = Error<&'a str>>,
{
    input
        .char_indices()
        .find_map(|(start, _)| parser.parse(&input[start..]).ok())
}

/// Parse the `DDHHMMZ` observation time.
fn parse_timestamp(input: &str) -> IResult<&str, &str> {
    recognize((digits(6), char('Z'))).parse(input)
}

/// Parse the optional gust and the mandatory `KT` unit after the speed.
///
/// Three-digit gusts are tried before two-digit ones.
fn parse_gust_then_knots(input: &str) -> IResult<&str, Option<&str>> {
    alt((
        map(terminated(preceded(char('G'), digits(3)), tag("KT")), Some),
        map(terminated(preceded(char('G'), digits(2)), tag("KT")), Some),
        value(None, tag("KT")),
    ))
    .parse(input)
}

/// Parse a wind group like `24015KT`, `240105KT` or `24015G25KT`.
fn parse_wind(input: &str) -> IResult<&str, Wind> {
    let speed_and_gust = alt((
        (digits(3), parse_gust_then_knots),
        (digits(2), parse_gust_then_knots),
    ));
    map(
        (digits(3), speed_and_gust),
        |(direction, (speed, gust))| Wind {
            direction: direction.to_string(),
            speed: speed.to_string(),
            gust: gust.map(str::to_string),
        },
    )
    .parse(input)
}

/// Parse a four-digit visibility in meters.
fn parse_visibility(input: &str) -> IResult<&str, Visibility> {
    map(parse_four_digit_value, Visibility).parse(input)
}

fn parse_four_digit_value(input: &str) -> IResult<&str, u16> {
    map_res(digits(4), |s: &str| s.parse::<u16>()).parse(input)
}

/// Parse a temperature like `05` or `M05`.
fn parse_celsius(input: &str) -> IResult<&str, Celsius> {
    map(
        (opt(char('M')), map_res(digits(2), |s: &str| s.parse::<u8>())),
        |(minus, magnitude)| Celsius {
            negative: minus.is_some(),
            magnitude,
        },
    )
    .parse(input)
}

/// Parse the temperature/dew point group, e.g. `12/08` or `M05/M10`.
fn parse_temperature(input: &str) -> IResult<&str, Temperature> {
    map(
        (parse_celsius, char('/'), parse_celsius),
        |(air, _, dew_point)| Temperature { air, dew_point },
    )
    .parse(input)
}

/// Parse a pressure group: `QNH1013` (hPa) or `A3012` (inHg).
fn parse_pressure(input: &str) -> IResult<&str, Pressure> {
    alt((
        map(
            preceded(tag("QNH"), parse_four_digit_value),
            Pressure::Hectopascals,
        ),
        map(
            preceded(char('A'), parse_four_digit_value),
            Pressure::InchesOfMercury,
        ),
    ))
    .parse(input)
}

fn parse_intensity(input: &str) -> IResult<&str, Intensity> {
    alt((
        value(Intensity::Heavy, char('+')),
        value(Intensity::Light, char('-')),
        value(Intensity::Vicinity, tag("VC")),
    ))
    .parse(input)
}

fn parse_descriptor(input: &str) -> IResult<&str, Descriptor> {
    map_opt(take(2usize), Descriptor::from_code).parse(input)
}

fn parse_phenomenon(input: &str) -> IResult<&str, Phenomenon> {
    map_opt(take(2usize), Phenomenon::from_code).parse(input)
}

/// Parse a present weather group. Every part is optional, so this parser
/// succeeds on any input, possibly with an empty group.
fn parse_weather(input: &str) -> IResult<&str, Weather> {
    map(
        (
            opt(parse_intensity),
            opt(parse_descriptor),
            opt(parse_phenomenon),
        ),
        |(intensity, descriptor, phenomenon)| Weather {
            intensity,
            descriptor,
            phenomenon,
        },
    )
    .parse(input)
}

/// Parse a cloud layer like `BKN020`.
fn parse_cloud_layer(input: &str) -> IResult<&str, CloudLayer> {
    let cover = alt((
        value(CloudCover::Few, tag("FEW")),
        value(CloudCover::Scattered, tag("SCT")),
        value(CloudCover::Broken, tag("BKN")),
        value(CloudCover::Overcast, tag("OVC")),
    ));
    map(
        (cover, map_res(digits(3), |s: &str| s.parse::<u16>())),
        |(cover, height_hundreds)| CloudLayer {
            cover,
            height_hundreds,
        },
    )
    .parse(input)
}

/// Find the observation time group, which must stand as a whole word.
fn find_observation_time(raw: &str) -> Option<String> {
    raw.char_indices().find_map(|(start, _)| {
        if raw[..start].chars().next_back().is_some_and(is_word_char) {
            return None;
        }
        let (rest, stamp) = parse_timestamp(&raw[start..]).ok()?;
        if rest.chars().next().is_some_and(is_word_char) {
            return None;
        }
        Some(stamp.to_string())
    })
}

/// Find the present weather group.
///
/// Because the group may be empty, the leftmost match is always at the
/// start of the report; whether it produced anything is decided by
/// [`Weather::is_present`].
fn find_weather(raw: &str) -> Option<Weather> {
    parse_weather(raw)
        .ok()
        .map(|(_, weather)| weather)
        .filter(Weather::is_present)
}

/// Find every non-overlapping cloud layer, left to right.
fn find_cloud_layers(raw: &str) -> Vec<CloudLayer> {
    let mut layers = Vec::new();
    let mut remaining = raw;
    while let Some((rest, layer)) = find_first(remaining, parse_cloud_layer) {
        layers.push(layer);
        remaining = rest;
    }
    layers
}

/// Decode a raw METAR into its structured elements.
///
/// Never fails: elements that are absent or malformed are simply left out,
/// and a missing observation time is reported as `"Unknown"` by
/// [`DecodedReport::observation_time_label`].
///
/// # Example
///
/// ```
/// use vatsim_watch::metar::decode;
///
/// let report = decode("KJFK 181851Z 24015G25KT 10SM BKN020 OVC045 M05/M10 A3012");
/// assert_eq!(report.observation_time_label(), "181851Z");
/// assert!(report.lines().contains(&"Wind: 240° at 15 KT, gusting to 25 KT".to_string()));
/// assert!(report.lines().contains(&"Clouds: BKN at 2000 feet, OVC at 4500 feet".to_string()));
/// ```
pub fn decode(raw: &str) -> DecodedReport {
    DecodedReport {
        observation_time: find_observation_time(raw),
        wind: find_first(raw, parse_wind).map(|(_, wind)| wind),
        visibility: find_first(raw, parse_visibility).map(|(_, visibility)| visibility),
        temperature: find_first(raw, parse_temperature).map(|(_, temperature)| temperature),
        pressure: find_first(raw, parse_pressure).map(|(_, pressure)| pressure),
        weather: find_weather(raw),
        clouds: find_cloud_layers(raw),
    }
}

/// Return the reporting station of a METAR, skipping a leading `METAR`,
/// `SPECI` or `COR` marker.
///
/// The station is the first remaining token when it looks like an ICAO code
/// (four uppercase letters or digits starting with a letter).
pub fn station(raw: &str) -> Option<&str> {
    raw.split_whitespace()
        .find(|token| !matches!(*token, "METAR" | "SPECI" | "COR"))
        .filter(|token| {
            token.len() == 4
                && token.starts_with(|c: char| c.is_ascii_uppercase())
                && token
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NO_SIGNIFICANT_WEATHER;
    use proptest::prelude::*;

    const KJFK: &str = "KJFK 181851Z 24015G25KT 10SM FEW250 M05/M10 A3012 RMK AO2 SLP201";

    #[test]
    fn test_decode_full_us_metar() {
        let report = decode(KJFK);

        assert_eq!(report.observation_time_label(), "181851Z");
        assert_eq!(
            report.lines(),
            vec![
                "Wind: 240° at 15 KT, gusting to 25 KT",
                // First four-digit run in the report is inside the timestamp.
                "Visibility: 1818 meters",
                "Temperature: -05°C, Dew Point: -10°C",
                "Pressure: 30.12 inHg",
                "Clouds: FEW at 25000 feet",
            ]
        );
    }

    #[test]
    fn test_wind_with_gust() {
        let report = decode("24015G25KT");
        assert!(
            report
                .lines()
                .contains(&"Wind: 240° at 15 KT, gusting to 25 KT".to_string())
        );
        let wind = report.wind.unwrap();
        assert_eq!(wind.gust.as_deref(), Some("25"));
        assert_eq!(wind.gust_knots(), Some(25));
    }

    #[test]
    fn test_wind_speed_widths() {
        let wind = decode("24005KT").wind.unwrap();
        assert_eq!(wind.to_string(), "Wind: 240° at 05 KT");

        let wind = decode("240105KT").wind.unwrap();
        assert_eq!(wind.speed, "105");

        let wind = decode("240100G120KT").wind.unwrap();
        assert_eq!(wind.to_string(), "Wind: 240° at 100 KT, gusting to 120 KT");
    }

    #[test]
    fn test_wind_requires_knots_unit() {
        assert_eq!(decode("24015MPS").wind, None);
        assert_eq!(decode("24015G25").wind, None);
    }

    #[test]
    fn test_negative_temperatures() {
        let report = decode("M05/M10");
        assert_eq!(
            report.lines(),
            vec!["Temperature: -05°C, Dew Point: -10°C"]
        );
        let temperature = report.temperature.unwrap();
        assert_eq!(temperature.air.degrees(), -5);
        assert_eq!(temperature.dew_point.degrees(), -10);
    }

    #[test]
    fn test_positive_temperatures() {
        let report = decode("EGLL 181850Z 12/08");
        assert!(
            report
                .lines()
                .contains(&"Temperature: 12°C, Dew Point: 08°C".to_string())
        );
    }

    #[test]
    fn test_pressure_inches_of_mercury() {
        let report = decode("A3012");
        assert_eq!(report.pressure, Some(Pressure::InchesOfMercury(3012)));
        assert!(report.lines().contains(&"Pressure: 30.12 inHg".to_string()));
    }

    #[test]
    fn test_pressure_qnh() {
        let report = decode("QNH1013");
        assert_eq!(report.pressure, Some(Pressure::Hectopascals(1013)));
        assert!(report.lines().contains(&"Pressure: 1013 hPa".to_string()));
    }

    #[test]
    fn test_icao_q_group_is_not_a_pressure() {
        assert_eq!(decode("EGLL 181850Z 24015KT CAVOK 12/08 Q1013").pressure, None);
    }

    #[test]
    fn test_multiple_cloud_layers() {
        let report = decode("EGLL 181850Z 24015KT BKN020 OVC045");
        assert_eq!(report.clouds.len(), 2);
        assert!(
            report
                .lines()
                .contains(&"Clouds: BKN at 2000 feet, OVC at 4500 feet".to_string())
        );
    }

    #[test]
    fn test_cloud_layer_suffix_is_ignored() {
        let report = decode("SCT008 BKN015CB OVC100TCU");
        assert_eq!(
            report.lines().last().unwrap(),
            "Clouds: SCT at 800 feet, BKN at 1500 feet, OVC at 10000 feet"
        );
    }

    #[test]
    fn test_observation_time_absent() {
        let report = decode("KJFK 24015KT 10SM");
        assert_eq!(report.observation_time, None);
        assert_eq!(report.observation_time_label(), "Unknown");
    }

    #[test]
    fn test_observation_time_must_be_whole_word() {
        assert_eq!(decode("X181851Z").observation_time, None);
        assert_eq!(decode("181851ZZ").observation_time, None);
        assert_eq!(
            decode("METAR KJFK 181851Z").observation_time.as_deref(),
            Some("181851Z")
        );
    }

    #[test]
    fn test_malformed_wind_does_not_block_visibility() {
        let report = decode("EGLL 240KT 9999");
        assert_eq!(report.wind, None);
        assert_eq!(report.visibility, Some(Visibility(9999)));
        assert!(report.lines().contains(&"Visibility: 9999 meters".to_string()));
    }

    #[test]
    fn test_no_recognizable_groups() {
        let report = decode("hello world");
        assert_eq!(report.lines(), vec![NO_SIGNIFICANT_WEATHER]);
        assert_eq!(report.decoded_text(), "No significant weather observed.");
    }

    #[test]
    fn test_empty_input() {
        let report = decode("");
        assert!(report.is_empty());
        assert_eq!(report.observation_time_label(), "Unknown");
        assert_eq!(report.lines(), vec![NO_SIGNIFICANT_WEATHER]);
    }

    #[test]
    fn test_weather_at_start_of_report() {
        let report = decode("+TSRA BKN020CB");
        assert_eq!(
            report.lines(),
            vec!["Weather: + TS RA", "Clouds: BKN at 2000 feet"]
        );

        let weather = decode("VCSH").weather.unwrap();
        assert_eq!(weather.intensity, Some(Intensity::Vicinity));
        assert_eq!(weather.descriptor, Some(Descriptor::Showers));
        assert_eq!(weather.phenomenon, None);
        assert_eq!(weather.to_string(), "Weather: VC SH");
    }

    #[test]
    fn test_weather_later_in_report_is_not_reported() {
        // The weather group may match empty, so its leftmost match is the
        // very start of the report.
        let report = decode("KJFK 181851Z 24015KT -RA BR");
        assert_eq!(report.weather, None);
    }

    #[test]
    fn test_weather_descriptor_without_phenomenon_code() {
        let weather = decode("-DRA").weather.unwrap();
        assert_eq!(weather.intensity, Some(Intensity::Light));
        assert_eq!(weather.descriptor, Some(Descriptor::LowDrifting));
        assert_eq!(weather.phenomenon, None);
    }

    #[test]
    fn test_lines_in_fixed_order() {
        let report = decode("BR OVC003 QNH0998 M01/M02 0400 09003KT");
        assert_eq!(
            report.lines(),
            vec![
                "Wind: 090° at 03 KT",
                "Visibility: 0998 meters",
                "Temperature: -01°C, Dew Point: -02°C",
                "Pressure: 0998 hPa",
                "Weather: BR",
                "Clouds: OVC at 300 feet",
            ]
        );
    }

    #[test]
    fn test_decode_is_deterministic() {
        assert_eq!(decode(KJFK), decode(KJFK));
    }

    #[test]
    fn test_station() {
        assert_eq!(station(KJFK), Some("KJFK"));
        assert_eq!(station("METAR EGLL 181850Z"), Some("EGLL"));
        assert_eq!(station("SPECI COR K1A5 181850Z"), Some("K1A5"));
        assert_eq!(station("hello world"), None);
        assert_eq!(station(""), None);
    }

    proptest! {
        #[test]
        fn prop_decode_never_panics_and_is_pure(raw in "\\PC{0,80}") {
            let first = decode(&raw);
            let second = decode(&raw);
            prop_assert!(!first.lines().is_empty());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_every_cloud_group_is_found(heights in proptest::collection::vec(0u16..1000, 0..6)) {
            let raw: Vec<String> = heights.iter().map(|h| format!("BKN{:03}", h)).collect();
            let report = decode(&raw.join(" "));
            prop_assert_eq!(report.clouds.len(), heights.len());
            for (layer, height) in report.clouds.iter().zip(&heights) {
                prop_assert_eq!(layer.height_feet(), *height as u32 * 100);
            }
        }
    }
}
