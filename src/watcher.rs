//! Background watcher that announces newly connected VATSIM clients.
//!
//! The watcher owns a [`KnownEntities`] set. On every tick it fetches a
//! snapshot, diffs it against the set and emits one [`WatchEvent`] per new
//! entity. Events go out through an unbounded channel, so a slow consumer
//! never holds up the next tick, and cycles never overlap because a single
//! task runs them in sequence.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::client::{FeedClient, FeedError};
use crate::config::WatchConfig;
use crate::feed::{Controller, Facility, Pilot, VatsimData};
use crate::filter::{EntityFilter, admits};
use crate::stats::WatchStats;

/// Kind of network client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Pilot,
    Controller,
    Atis,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Pilot => write!(f, "pilot"),
            EntityKind::Controller => write!(f, "controller"),
            EntityKind::Atis => write!(f, "atis"),
        }
    }
}

/// Identity of a client across snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    pub kind: EntityKind,
    pub cid: u64,
}

/// A client as it appears in one snapshot.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Pilot(&'a Pilot),
    Controller(&'a Controller),
    Atis(&'a Controller),
}

impl<'a> Entity<'a> {
    /// Every pilot, controller and ATIS station in a snapshot.
    pub fn all(data: &'a VatsimData) -> impl Iterator<Item = Entity<'a>> {
        data.pilots
            .iter()
            .map(Entity::Pilot)
            .chain(data.controllers.iter().map(Entity::Controller))
            .chain(data.atis.iter().map(Entity::Atis))
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Pilot(_) => EntityKind::Pilot,
            Entity::Controller(_) => EntityKind::Controller,
            Entity::Atis(_) => EntityKind::Atis,
        }
    }

    pub fn id(&self) -> EntityId {
        let cid = match self {
            Entity::Pilot(p) => p.cid,
            Entity::Controller(c) | Entity::Atis(c) => c.cid,
        };
        EntityId {
            kind: self.kind(),
            cid,
        }
    }

    pub fn callsign(&self) -> &'a str {
        match self {
            Entity::Pilot(p) => &p.callsign,
            Entity::Controller(c) | Entity::Atis(c) => &c.callsign,
        }
    }

    /// Facility of a controller or ATIS station; `None` for pilots.
    pub fn facility(&self) -> Option<Facility> {
        match self {
            Entity::Pilot(_) => None,
            Entity::Controller(c) | Entity::Atis(c) => Some(c.facility),
        }
    }

    /// Departure airport from a pilot's flight plan.
    pub fn departure(&self) -> Option<&'a str> {
        match self {
            Entity::Pilot(p) => p.flight_plan.as_ref().map(|fp| fp.departure.as_str()),
            _ => None,
        }
    }

    /// Arrival airport from a pilot's flight plan.
    pub fn arrival(&self) -> Option<&'a str> {
        match self {
            Entity::Pilot(p) => p.flight_plan.as_ref().map(|fp| fp.arrival.as_str()),
            _ => None,
        }
    }

    /// The message announcing this entity.
    pub fn announcement(&self) -> Announcement {
        let (name, logon_time) = match self {
            Entity::Pilot(p) => (&p.name, &p.logon_time),
            Entity::Controller(c) | Entity::Atis(c) => (&c.name, &c.logon_time),
        };
        Announcement {
            kind: self.kind(),
            cid: self.id().cid,
            name: name.clone(),
            callsign: self.callsign().to_string(),
            logon_time: logon_time.clone(),
        }
    }
}

/// Notice that a client came online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Announcement {
    pub kind: EntityKind,
    pub cid: u64,
    pub name: String,
    pub callsign: String,
    pub logon_time: String,
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntityKind::Pilot => write!(
                f,
                "{} ({}) is online as {} since {}",
                self.name, self.cid, self.callsign, self.logon_time
            ),
            EntityKind::Controller | EntityKind::Atis => write!(
                f,
                "{} ({}) is online at position {} since {}",
                self.name, self.cid, self.callsign, self.logon_time
            ),
        }
    }
}

/// In-memory set of clients already announced.
#[derive(Debug, Default)]
pub struct KnownEntities {
    seen: HashSet<EntityId>,
    forget_offline: bool,
}

impl KnownEntities {
    /// Create an empty set. With `forget_offline`, clients missing from a
    /// snapshot are dropped so their next logon is announced again.
    pub fn new(forget_offline: bool) -> Self {
        Self {
            seen: HashSet::new(),
            forget_offline,
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.seen.contains(id)
    }

    /// Record the clients of `snapshot` admitted by `filters` and return an
    /// announcement for each one not seen before, in snapshot order.
    pub fn diff(&mut self, snapshot: &VatsimData, filters: &[EntityFilter]) -> Vec<Announcement> {
        let mut online = HashSet::new();
        let mut fresh = Vec::new();

        for entity in Entity::all(snapshot) {
            if !admits(filters, &entity) {
                continue;
            }
            let id = entity.id();
            online.insert(id);
            if self.seen.insert(id) {
                fresh.push(entity.announcement());
            }
        }

        if self.forget_offline {
            self.seen.retain(|id| online.contains(id));
        }
        fresh
    }
}

/// Source of feed snapshots for the watcher.
pub trait SnapshotSource {
    fn fetch_snapshot(&self) -> impl Future<Output = Result<VatsimData, FeedError>> + Send;
}

impl SnapshotSource for FeedClient {
    fn fetch_snapshot(&self) -> impl Future<Output = Result<VatsimData, FeedError>> + Send {
        self.fetch_vatsim_data()
    }
}

/// Events from the watcher.
#[derive(Debug)]
pub enum WatchEvent {
    /// A client came online.
    Announcement(Announcement),

    /// A snapshot could not be fetched; the watcher keeps running.
    Error(String),
}

/// Polling loop over a [`SnapshotSource`].
pub struct Watcher<S> {
    source: S,
    known: KnownEntities,
    filters: Vec<EntityFilter>,
    interval: Duration,
    announce_initial: bool,
    primed: bool,
    stats: Option<Arc<WatchStats>>,
}

impl<S: SnapshotSource> Watcher<S> {
    /// Create a watcher with an empty known set.
    pub fn new(source: S, config: &WatchConfig) -> Self {
        Self {
            source,
            known: KnownEntities::new(config.reannounce_after_logoff),
            filters: config.filters.clone(),
            interval: config.interval,
            announce_initial: config.announce_initial,
            primed: false,
            stats: None,
        }
    }

    /// Record cycles and announcements into `stats`.
    pub fn with_stats(mut self, stats: Arc<WatchStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn known(&self) -> &KnownEntities {
        &self.known
    }

    /// Run a single fetch-and-diff cycle.
    ///
    /// Unless `announce_initial` is set, the first successful cycle only
    /// seeds the known set.
    pub async fn poll_once(&mut self) -> Result<Vec<Announcement>, FeedError> {
        let snapshot = match self.source.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if let Some(ref stats) = self.stats {
                    stats.record_poll_failure();
                }
                return Err(e);
            }
        };

        let mut fresh = self.known.diff(&snapshot, &self.filters);

        if !self.primed {
            self.primed = true;
            if !self.announce_initial {
                info!(
                    "Seeded {} known clients without announcing",
                    self.known.len()
                );
                fresh.clear();
            }
        }

        if let Some(ref stats) = self.stats {
            stats.record_poll(self.known.len());
            for announcement in &fresh {
                stats.record_announcement(announcement.kind);
            }
        }

        debug!(
            "Poll complete: {} new, {} known",
            fresh.len(),
            self.known.len()
        );
        Ok(fresh)
    }

    /// Poll on a fixed interval until `shutdown` turns true or the event
    /// receiver is dropped. Returns the known set.
    pub async fn run(
        mut self,
        tx: mpsc::UnboundedSender<WatchEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> KnownEntities {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Watching VATSIM every {}s", self.interval.as_secs_f64());

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }

                _ = interval.tick() => {
                    match self.poll_once().await {
                        Ok(fresh) => {
                            for announcement in fresh {
                                if tx.send(WatchEvent::Announcement(announcement)).is_err() {
                                    return self.known;
                                }
                            }
                        }
                        Err(e) => {
                            error!("Failed to fetch VATSIM data: {}", e);
                            if tx.send(WatchEvent::Error(e.to_string())).is_err() {
                                return self.known;
                            }
                        }
                    }
                }
            }
        }

        info!("Watcher stopped with {} known clients", self.known.len());
        self.known
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::tests::SAMPLE_FEED;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FakeSource {
        snapshots: Mutex<VecDeque<Result<VatsimData, FeedError>>>,
    }

    impl FakeSource {
        fn new(snapshots: Vec<Result<VatsimData, FeedError>>) -> Self {
            Self {
                snapshots: Mutex::new(snapshots.into()),
            }
        }
    }

    impl SnapshotSource for FakeSource {
        fn fetch_snapshot(&self) -> impl Future<Output = Result<VatsimData, FeedError>> + Send {
            let next = self.snapshots.lock().unwrap().pop_front();
            async move { next.unwrap_or_else(|| Ok(VatsimData::default())) }
        }
    }

    fn sample() -> VatsimData {
        VatsimData::from_json(SAMPLE_FEED).unwrap()
    }

    fn watch_config(announce_initial: bool, reannounce: bool) -> WatchConfig {
        WatchConfig {
            interval: Duration::from_millis(10),
            announce_initial,
            reannounce_after_logoff: reannounce,
            filters: Vec::new(),
        }
    }

    #[test]
    fn test_diff_announces_each_entity_once() {
        let data = sample();
        let mut known = KnownEntities::new(false);

        let first = known.diff(&data, &[]);
        assert_eq!(first.len(), 4);
        assert_eq!(known.len(), 4);

        let second = known.diff(&data, &[]);
        assert!(second.is_empty());
    }

    #[test]
    fn test_diff_remembers_offline_clients_by_default() {
        let data = sample();
        let mut known = KnownEntities::new(false);
        known.diff(&data, &[]);

        known.diff(&VatsimData::default(), &[]);
        assert_eq!(known.len(), 4);
        assert!(known.diff(&data, &[]).is_empty());
    }

    #[test]
    fn test_diff_reannounces_after_logoff() {
        let data = sample();
        let mut known = KnownEntities::new(true);
        known.diff(&data, &[]);

        known.diff(&VatsimData::default(), &[]);
        assert!(known.is_empty());
        assert_eq!(known.diff(&data, &[]).len(), 4);
    }

    #[test]
    fn test_diff_applies_filters() {
        let data = sample();
        let filter: EntityFilter = toml::from_str(
            r#"
            kinds = ["controller"]
            callsign = "NY_*"
        "#,
        )
        .unwrap();
        let mut known = KnownEntities::new(false);

        let fresh = known.diff(&data, &[filter]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].callsign, "NY_CTR");
        assert!(known.contains(&EntityId {
            kind: EntityKind::Controller,
            cid: 1000003,
        }));
        assert!(!known.contains(&EntityId {
            kind: EntityKind::Pilot,
            cid: 1000001,
        }));
    }

    #[test]
    fn test_announcement_text() {
        let data = sample();
        let controller = Entity::Controller(&data.controllers[0]).announcement();
        assert_eq!(
            controller.to_string(),
            concat!(
                "Sam Controller (1000003) is online at position NY_CTR ",
                "since 2026-10-18T09:30:00.0000000Z"
            )
        );

        let pilot = Entity::Pilot(&data.pilots[0]).announcement();
        assert_eq!(
            pilot.to_string(),
            "Jane Pilot (1000001) is online as DAL123 since 2026-10-18T10:00:00.0000000Z"
        );
    }

    #[test]
    fn test_entity_accessors() {
        let data = sample();
        let pilot = Entity::Pilot(&data.pilots[0]);
        assert_eq!(pilot.departure(), Some("KJFK"));
        assert_eq!(pilot.arrival(), Some("KATL"));
        assert_eq!(pilot.facility(), None);

        let atis = Entity::Atis(&data.atis[0]);
        assert_eq!(atis.kind(), EntityKind::Atis);
        assert_eq!(atis.facility(), Some(Facility::Tower));
        assert_eq!(atis.departure(), None);
    }

    #[tokio::test]
    async fn test_poll_once_seeds_without_initial_announcements() {
        let source = FakeSource::new(vec![Ok(sample()), Ok(sample())]);
        let mut watcher = Watcher::new(source, &watch_config(false, false));

        assert!(watcher.poll_once().await.unwrap().is_empty());
        assert_eq!(watcher.known().len(), 4);
        assert!(watcher.poll_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_poll_once_records_stats() {
        let stats = Arc::new(WatchStats::new());
        let source = FakeSource::new(vec![
            Err(FeedError::Status {
                status: StatusCode::BAD_GATEWAY,
            }),
            Ok(sample()),
        ]);
        let mut watcher =
            Watcher::new(source, &watch_config(true, false)).with_stats(Arc::clone(&stats));

        assert!(watcher.poll_once().await.is_err());
        assert_eq!(watcher.poll_once().await.unwrap().len(), 4);

        let summary = stats.summary();
        assert_eq!(summary.poll_failures, 1);
        assert_eq!(summary.polls, 1);
        assert_eq!(summary.announcements, 4);
        assert_eq!(summary.known_entities, 4);
    }

    #[tokio::test]
    async fn test_run_survives_errors_and_stops_on_shutdown() {
        let source = FakeSource::new(vec![
            Err(FeedError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
            }),
            Ok(sample()),
        ]);
        let watcher = Watcher::new(source, &watch_config(true, false));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(watcher.run(tx, shutdown_rx));

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, WatchEvent::Error(_)));

        let mut announced = Vec::new();
        while announced.len() < 4 {
            match rx.recv().await.unwrap() {
                WatchEvent::Announcement(a) => announced.push(a),
                WatchEvent::Error(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(announced[0].callsign, "DAL123");

        shutdown_tx.send(true).unwrap();
        let known = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("watcher did not stop")
            .unwrap();
        assert_eq!(known.len(), 4);
    }
}
