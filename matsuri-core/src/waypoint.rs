//! Waypoint store: named points of interest characters wander between.
//!
//! The store is built once per world (explicit waypoints from config, or a
//! generated festival layout) and is read-mostly afterwards. Characters and
//! the dialog coordinator refer to waypoints by [`WaypointId`].

use rand::Rng;
use tracing::debug;

use crate::config::{WaypointConfig, WaypointDef};
use crate::types::{Position, WaypointId};

/// How many draws `random_waypoint` makes before accepting a repeat.
pub const MAX_REPEAT_AVOIDANCE_ATTEMPTS: usize = 5;

/// Default radius of a generated festival area.
const DEFAULT_AREA_RADIUS: f32 = 2.0;

// ---------------------------------------------------------------------------
// Waypoint
// ---------------------------------------------------------------------------

/// Area metadata attached to a waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaInfo {
    /// Human-readable area name, used as conversational location.
    pub display_name: String,
    /// Topics characters may bring up here.
    pub topics: Vec<String>,
}

/// An immutable point of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    /// Index inside the owning store.
    pub id: WaypointId,
    /// Scene name (e.g. `Waypoint_Takoyaki_Stand`).
    pub name: String,
    /// World position.
    pub position: Position,
    /// Area metadata, when the waypoint marks a festival area.
    pub area: Option<AreaInfo>,
    /// Area radius.
    pub radius: Option<f32>,
}

// ---------------------------------------------------------------------------
// Default festival layout
// ---------------------------------------------------------------------------

struct FestivalArea {
    key: &'static str,
    display_name: &'static str,
    offset: Position,
    topics: &'static [&'static str],
}

const FESTIVAL_LAYOUT: &[FestivalArea] = &[
    FestivalArea {
        key: "Central_Plaza",
        display_name: "中央広場",
        offset: Position::new(0.0, 0.0, 0.0),
        topics: &["夏祭り", "賑やか"],
    },
    FestivalArea {
        key: "Takoyaki_Stand",
        display_name: "たこ焼き屋台",
        offset: Position::new(-6.0, 0.0, 4.0),
        topics: &["たこ焼き", "ソース"],
    },
    FestivalArea {
        key: "Cotton_Candy",
        display_name: "わたあめ屋台",
        offset: Position::new(6.0, 0.0, 4.0),
        topics: &["わたあめ", "甘い"],
    },
    FestivalArea {
        key: "Goldfish_Scooping",
        display_name: "金魚すくい",
        offset: Position::new(-5.0, 0.0, -6.0),
        topics: &["金魚すくい", "ポイ"],
    },
    FestivalArea {
        key: "Shooting_Gallery",
        display_name: "射的",
        offset: Position::new(5.0, 0.0, -6.0),
        topics: &["射的", "景品"],
    },
    FestivalArea {
        key: "Stage_Front",
        display_name: "ステージ前",
        offset: Position::new(0.0, 0.0, 8.0),
        topics: &["ステージ", "音楽"],
    },
    FestivalArea {
        key: "Fireworks_Spot",
        display_name: "花火観覧スポット",
        offset: Position::new(0.0, 0.0, -10.0),
        topics: &["花火", "夜空"],
    },
];

/// Keyword → label table for waypoints that carry no area metadata.
///
/// Labels are the display names the dialog service keys its location
/// descriptions by, so generated areas and bare waypoint names resolve alike.
const NAME_KEYWORDS: &[(&str, &str)] = &[
    ("Takoyaki", "たこ焼き屋台"),
    ("Cotton_Candy", "わたあめ屋台"),
    ("Goldfish", "金魚すくい"),
    ("Shooting", "射的"),
    ("Stage", "ステージ前"),
    ("Rest", "休憩所"),
    ("Drink", "ドリンク屋台"),
    ("Fireworks", "花火観覧スポット"),
    ("Central", "中央広場"),
];

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// The set of waypoints for one world.
#[derive(Debug, Clone, Default)]
pub struct WaypointStore {
    waypoints: Vec<Waypoint>,
}

impl WaypointStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from config: explicit waypoints if any, otherwise the
    /// generated festival layout around `config.center`.
    #[must_use]
    pub fn create_or_load(config: &WaypointConfig) -> Self {
        let mut store = Self::new();
        store.recreate(config);
        store
    }

    /// Throw away the current set and rebuild it from config.
    ///
    /// Rebuilding from the same config always yields the same waypoints.
    pub fn recreate(&mut self, config: &WaypointConfig) {
        self.waypoints.clear();

        if config.explicit.is_empty() {
            for area in FESTIVAL_LAYOUT.iter().take(config.count) {
                self.push(
                    format!("Waypoint_{}", area.key),
                    config.center + area.offset,
                    Some(AreaInfo {
                        display_name: area.display_name.to_string(),
                        topics: area.topics.iter().map(|t| (*t).to_string()).collect(),
                    }),
                    Some(DEFAULT_AREA_RADIUS),
                );
            }
        } else {
            for def in &config.explicit {
                self.push_def(def);
            }
        }

        debug!(count = self.waypoints.len(), "Waypoint store rebuilt");
    }

    /// Remove every waypoint.
    pub fn clear(&mut self) {
        self.waypoints.clear();
    }

    fn push_def(&mut self, def: &WaypointDef) {
        let area = def.area_name.as_ref().map(|name| AreaInfo {
            display_name: name.clone(),
            topics: def.topics.clone(),
        });
        self.push(def.name.clone(), def.position, area, def.radius);
    }

    fn push(&mut self, name: String, position: Position, area: Option<AreaInfo>, radius: Option<f32>) {
        let id = WaypointId(u32::try_from(self.waypoints.len()).unwrap_or(u32::MAX));
        self.waypoints.push(Waypoint {
            id,
            name,
            position,
            area,
            radius,
        });
    }

    /// Number of waypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints.iter()
    }

    /// Look a waypoint up by id.
    #[must_use]
    pub fn get(&self, id: WaypointId) -> Option<&Waypoint> {
        self.waypoints.get(id.0 as usize)
    }

    /// Find the waypoint marking the given area.
    #[must_use]
    pub fn by_area(&self, display_name: &str) -> Option<&Waypoint> {
        self.waypoints
            .iter()
            .find(|wp| wp.area.as_ref().is_some_and(|a| a.display_name == display_name))
    }

    /// Pick a waypoint uniformly at random, trying to avoid `excluding`.
    ///
    /// At most [`MAX_REPEAT_AVOIDANCE_ATTEMPTS`] draws are made; if every draw
    /// hits `excluding` the repeat is accepted. A single-waypoint store always
    /// returns its waypoint. Returns `None` only when the store is empty.
    pub fn random_waypoint<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        excluding: Option<WaypointId>,
    ) -> Option<&Waypoint> {
        let ids: Vec<WaypointId> = self.waypoints.iter().map(|wp| wp.id).collect();
        pick_avoiding(&ids, rng, excluding).and_then(|id| self.get(id))
    }

    /// The waypoint closest to `position`; ties go to the first one stored.
    #[must_use]
    pub fn nearest(&self, position: Position) -> Option<&Waypoint> {
        let mut best: Option<(&Waypoint, f32)> = None;
        for wp in &self.waypoints {
            let distance = wp.position.distance(position);
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((wp, distance)),
            }
        }
        best.map(|(wp, _)| wp)
    }

    /// Human-readable location for a waypoint: its area name, else a label
    /// inferred from the waypoint name, else `fallback`.
    #[must_use]
    pub fn location_label(waypoint: &Waypoint, fallback: &str) -> String {
        if let Some(area) = &waypoint.area {
            return area.display_name.clone();
        }
        NAME_KEYWORDS
            .iter()
            .find(|(keyword, _)| waypoint.name.contains(keyword))
            .map_or_else(|| fallback.to_string(), |(_, label)| (*label).to_string())
    }

    /// Location label of the waypoint nearest to `position`.
    #[must_use]
    pub fn location_label_near(&self, position: Position, fallback: &str) -> String {
        self.nearest(position)
            .map_or_else(|| fallback.to_string(), |wp| Self::location_label(wp, fallback))
    }
}

/// Uniform choice from `candidates` with bounded repeat avoidance.
///
/// Shared by the store and by characters that carry their own route.
pub fn pick_avoiding<R: Rng + ?Sized>(
    candidates: &[WaypointId],
    rng: &mut R,
    excluding: Option<WaypointId>,
) -> Option<WaypointId> {
    if candidates.is_empty() {
        return None;
    }
    if candidates.len() == 1 {
        return Some(candidates[0]);
    }

    let mut choice = candidates[rng.gen_range(0..candidates.len())];
    let mut attempts = 1;
    while Some(choice) == excluding && attempts < MAX_REPEAT_AVOIDANCE_ATTEMPTS {
        choice = candidates[rng.gen_range(0..candidates.len())];
        attempts += 1;
    }
    Some(choice)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn waypoint_def(name: &str, x: f32, z: f32) -> WaypointDef {
        WaypointDef {
            name: name.to_string(),
            position: Position::new(x, 0.0, z),
            area_name: None,
            topics: Vec::new(),
            radius: None,
        }
    }

    #[test]
    fn generates_festival_layout_by_default() {
        let store = WaypointStore::create_or_load(&WaypointConfig::default());
        assert_eq!(store.len(), 7);
        let plaza = store.by_area("中央広場").expect("plaza exists");
        assert_eq!(plaza.position, Position::ZERO);
        assert!(plaza.area.as_ref().is_some_and(|a| !a.topics.is_empty()));
    }

    #[test]
    fn layout_respects_count_and_center() {
        let config = WaypointConfig {
            center: Position::new(10.0, 0.0, 10.0),
            count: 3,
            explicit: Vec::new(),
        };
        let store = WaypointStore::create_or_load(&config);
        assert_eq!(store.len(), 3);
        let takoyaki = store.by_area("たこ焼き屋台").expect("takoyaki exists");
        assert_eq!(takoyaki.position, Position::new(4.0, 0.0, 14.0));
    }

    #[test]
    fn explicit_waypoints_replace_layout() {
        let config = WaypointConfig {
            explicit: vec![waypoint_def("A", 0.0, 0.0), waypoint_def("B", 5.0, 0.0)],
            ..WaypointConfig::default()
        };
        let store = WaypointStore::create_or_load(&config);
        assert_eq!(store.len(), 2);
        assert!(store.iter().all(|wp| wp.area.is_none()));
    }

    #[test]
    fn recreate_is_idempotent() {
        let config = WaypointConfig::default();
        let mut store = WaypointStore::create_or_load(&config);
        let before: Vec<Waypoint> = store.iter().cloned().collect();
        store.recreate(&config);
        store.recreate(&config);
        let after: Vec<Waypoint> = store.iter().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn single_waypoint_is_always_returned() {
        let config = WaypointConfig {
            explicit: vec![waypoint_def("Only", 1.0, 1.0)],
            ..WaypointConfig::default()
        };
        let store = WaypointStore::create_or_load(&config);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let wp = store.random_waypoint(&mut rng, Some(WaypointId(0))).expect("one waypoint");
            assert_eq!(wp.id, WaypointId(0));
        }
    }

    #[test]
    fn empty_store_yields_none() {
        let store = WaypointStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(store.random_waypoint(&mut rng, None).is_none());
        assert!(store.nearest(Position::ZERO).is_none());
    }

    #[test]
    fn two_waypoints_alternate_almost_always() {
        let ids = [WaypointId(0), WaypointId(1)];
        let mut rng = StdRng::seed_from_u64(42);
        let mut repeats = 0;
        for _ in 0..1000 {
            if pick_avoiding(&ids, &mut rng, Some(WaypointId(0))) == Some(WaypointId(0)) {
                repeats += 1;
            }
        }
        // Five consecutive misses happen with probability 1/32.
        assert!(repeats < 100, "too many repeats: {repeats}");
    }

    #[test]
    fn nearest_breaks_ties_by_order() {
        let config = WaypointConfig {
            explicit: vec![waypoint_def("Left", -1.0, 0.0), waypoint_def("Right", 1.0, 0.0), waypoint_def("Far", 9.0, 0.0)],
            ..WaypointConfig::default()
        };
        let store = WaypointStore::create_or_load(&config);
        let nearest = store.nearest(Position::ZERO).expect("non-empty");
        assert_eq!(nearest.name, "Left");
        let nearest = store.nearest(Position::new(8.0, 0.0, 0.0)).expect("non-empty");
        assert_eq!(nearest.name, "Far");
    }

    #[test]
    fn location_labels_fall_back_in_order() {
        let config = WaypointConfig {
            explicit: vec![
                WaypointDef {
                    area_name: Some("Lantern Row".to_string()),
                    ..waypoint_def("Waypoint_Stage", 0.0, 0.0)
                },
                waypoint_def("Waypoint_Drink_Bar", 10.0, 0.0),
                waypoint_def("Waypoint_7", 20.0, 0.0),
            ],
            ..WaypointConfig::default()
        };
        let store = WaypointStore::create_or_load(&config);
        let fallback = "夏祭り会場";
        assert_eq!(store.location_label_near(Position::ZERO, fallback), "Lantern Row");
        assert_eq!(store.location_label_near(Position::new(10.0, 0.0, 0.0), fallback), "ドリンク屋台");
        assert_eq!(store.location_label_near(Position::new(20.0, 0.0, 0.0), fallback), fallback);
        assert_eq!(WaypointStore::new().location_label_near(Position::ZERO, fallback), fallback);
    }

    #[test]
    fn generated_area_names_match_name_keywords() {
        let store = WaypointStore::create_or_load(&WaypointConfig::default());
        for waypoint in store.iter() {
            let bare = Waypoint {
                area: None,
                ..waypoint.clone()
            };
            assert_eq!(
                WaypointStore::location_label(waypoint, "?"),
                WaypointStore::location_label(&bare, "?"),
                "{} resolves differently with and without area metadata",
                waypoint.name
            );
        }
    }
}
