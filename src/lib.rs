//! vatsim-watch - METAR decoding and VATSIM network lookups.
//!
//! This crate provides:
//! - A nom-based METAR decoder producing human-readable lines
//! - Typed access to the VATSIM data feed, the METAR service and airplanes.live
//! - A background watcher that announces newly connected controllers and pilots
//! - Statistics tracking with HDR histograms and an optional Prometheus endpoint
//!
//! # Example
//!
//! ```rust
//! use vatsim_watch::metar::decode;
//!
//! let report = decode("KJFK 181851Z 24015G25KT 10SM FEW250 24/09 A3002");
//! assert_eq!(report.observation_time_label(), "181851Z");
//!
//! for line in report.lines() {
//!     println!("{}", line);
//! }
//! ```

pub mod client;
pub mod config;
pub mod feed;
pub mod filter;
pub mod metar;
pub mod metrics;
pub mod render;
pub mod report;
pub mod stats;
pub mod watcher;

pub use client::{FeedClient, FeedClientConfig, FeedError};
pub use config::{Config, WatchConfig};
pub use feed::{Aircraft, Controller, Pilot, Server, VatsimData};
pub use filter::{EntityFilter, admits, any_filter_matches};
pub use metar::decode;
pub use render::{Embed, Reply};
pub use report::DecodedReport;
pub use stats::{StatsSummary, WatchStats};
pub use watcher::{Announcement, EntityKind, KnownEntities, SnapshotSource, WatchEvent, Watcher};
