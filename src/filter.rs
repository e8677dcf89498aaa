//! Filters selecting which clients the watcher announces.
//!
//! A filter matches when every field it sets matches (AND). A list of
//! filters admits a client when any filter matches (OR); an empty list
//! admits everything.

use serde::Deserialize;
use serde::de::{self, Deserializer, Visitor};
use std::fmt;

use crate::watcher::{Entity, EntityKind};

/// A list of patterns that deserializes from either a string or array.
///
/// Allows both `callsign = "NY_*"` and `callsign = ["NY_*", "*_APP"]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternList(Vec<String>);

impl PatternList {
    pub fn patterns(&self) -> &[String] {
        &self.0
    }

    /// Check if any pattern matches the value.
    pub fn matches_any(&self, value: &str) -> bool {
        self.0.iter().any(|p| matches_wildcard(p, value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn validate(&self) -> Result<(), String> {
        self.0.iter().try_for_each(|p| validate_wildcard_pattern(p))
    }
}

impl<'de> Deserialize<'de> for PatternList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PatternListVisitor;

        impl<'de> Visitor<'de> for PatternListVisitor {
            type Value = PatternList;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or array of strings")
            }

            fn visit_str<E>(self, value: &str) -> Result<PatternList, E>
            where
                E: de::Error,
            {
                Ok(PatternList(vec![value.to_string()]))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<PatternList, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut patterns = Vec::new();
                while let Some(value) = seq.next_element::<String>()? {
                    patterns.push(value);
                }
                Ok(PatternList(patterns))
            }
        }

        deserializer.deserialize_any(PatternListVisitor)
    }
}

/// A filter for matching pilots, controllers and ATIS stations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntityFilter {
    /// Optional name for this filter (used in log lines).
    pub name: Option<String>,

    /// Callsign patterns (`*` wildcard for prefix/suffix).
    pub callsign: Option<PatternList>,

    /// Client kinds to match.
    pub kinds: Option<Vec<EntityKind>>,

    /// Facility short names (`TWR`, `CTR`, ...). Never matches pilots.
    pub facilities: Option<Vec<String>>,

    /// Flight plan departure patterns. Only matches pilots with a plan.
    pub departure: Option<PatternList>,

    /// Flight plan arrival patterns. Only matches pilots with a plan.
    pub arrival: Option<PatternList>,
}

impl EntityFilter {
    /// Check if a client matches this filter.
    pub fn matches(&self, entity: &Entity<'_>) -> bool {
        if let Some(ref patterns) = self.callsign
            && !patterns.is_empty()
            && !patterns.matches_any(entity.callsign())
        {
            return false;
        }

        if let Some(ref kinds) = self.kinds
            && !kinds.contains(&entity.kind())
        {
            return false;
        }

        if let Some(ref facilities) = self.facilities {
            match entity.facility() {
                Some(facility)
                    if facilities
                        .iter()
                        .any(|f| f.eq_ignore_ascii_case(facility.short_name())) => {}
                _ => return false,
            }
        }

        if !airport_matches(self.departure.as_ref(), entity.departure()) {
            return false;
        }
        if !airport_matches(self.arrival.as_ref(), entity.arrival()) {
            return false;
        }

        true
    }

    /// Validate the filter configuration.
    ///
    /// Returns an error if any patterns are invalid.
    pub fn validate(&self) -> Result<(), String> {
        for patterns in [&self.callsign, &self.departure, &self.arrival]
            .into_iter()
            .flatten()
        {
            patterns.validate()?;
        }
        Ok(())
    }
}

fn airport_matches(patterns: Option<&PatternList>, airport: Option<&str>) -> bool {
    match patterns {
        Some(patterns) if !patterns.is_empty() => {
            airport.is_some_and(|icao| patterns.matches_any(icao))
        }
        _ => true,
    }
}

/// Check if any filter in the list matches the client.
///
/// Returns `false` if the list is empty.
pub fn any_filter_matches(filters: &[EntityFilter], entity: &Entity<'_>) -> bool {
    filters.iter().any(|f| f.matches(entity))
}

/// Whether the watcher should track a client: no filters admit everything.
pub fn admits(filters: &[EntityFilter], entity: &Entity<'_>) -> bool {
    filters.is_empty() || any_filter_matches(filters, entity)
}

/// Match a string against a wildcard pattern.
///
/// Supports `*` as prefix or suffix wildcard (not both).
/// Matching is case-insensitive.
fn matches_wildcard(pattern: &str, value: &str) -> bool {
    let pattern_upper = pattern.to_ascii_uppercase();
    let value_upper = value.to_ascii_uppercase();

    if let Some(suffix) = pattern_upper.strip_prefix('*') {
        // "*_CTR" matches "NY_CTR"
        value_upper.ends_with(suffix)
    } else if let Some(prefix) = pattern_upper.strip_suffix('*') {
        // "NY_*" matches "NY_CTR"
        value_upper.starts_with(prefix)
    } else {
        pattern_upper == value_upper
    }
}

/// Reject patterns with more than one wildcard or one in the middle.
fn validate_wildcard_pattern(pattern: &str) -> Result<(), String> {
    let wildcard_count = pattern.chars().filter(|&c| c == '*').count();

    if wildcard_count > 1 {
        return Err(format!(
            "Pattern '{}' has multiple wildcards; only one is allowed",
            pattern
        ));
    }

    if wildcard_count == 1 && !pattern.starts_with('*') && !pattern.ends_with('*') {
        return Err(format!(
            "Pattern '{}' has wildcard in middle; only prefix (*ABC) or suffix (ABC*) allowed",
            pattern
        ));
    }

    Ok(())
}
