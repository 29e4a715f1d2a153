//! Configuration for the festival simulation.
//!
//! Maps directly to `matsuri.toml`. Every field has a default, and unknown
//! keys are rejected so a typo never silently falls back to a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::Position;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatsuriConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Remote dialog service connection.
    #[serde(default)]
    pub server: ServerConfig,
    /// Character movement and proximity.
    #[serde(default)]
    pub motion: MotionConfig,
    /// Turn-based dialog pacing.
    #[serde(default)]
    pub dialog: DialogConfig,
    /// Speech bubble presentation.
    #[serde(default)]
    pub bubble: BubbleConfig,
    /// Waypoint layout.
    #[serde(default)]
    pub waypoints: WaypointConfig,
}

impl MatsuriConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `MatsuriError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| crate::MatsuriError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check every field for a usable value and the cross-field constraints.
    ///
    /// Times must be finite and at most [`MAX_SECS`]; lengths finite,
    /// positive and at most [`MAX_LENGTH`].
    ///
    /// # Errors
    /// Returns `MatsuriError::Config` naming the first offending field.
    pub fn validate(&self) -> crate::error::Result<()> {
        let fail = |msg: String| Err(crate::MatsuriError::Config(msg));

        let times = [
            ("server.request_timeout_secs", self.server.request_timeout_secs, false),
            ("server.health_interval_secs", self.server.health_interval_secs, false),
            ("motion.idle_time_min", self.motion.idle_time_min, true),
            ("motion.idle_time_max", self.motion.idle_time_max, true),
            ("motion.conversation_cooldown_secs", self.motion.conversation_cooldown_secs, true),
            ("motion.resume_delay_secs", self.motion.resume_delay_secs, true),
            ("dialog.turn_duration_secs", self.dialog.turn_duration_secs, false),
            ("dialog.end_delay_secs", self.dialog.end_delay_secs, true),
            ("bubble.fade_in_secs", self.bubble.fade_in_secs, true),
            ("bubble.fade_out_secs", self.bubble.fade_out_secs, true),
        ];
        for (field, value, zero_ok) in times {
            if !usable_secs(value, zero_ok) {
                let lower = if zero_ok { ">= 0" } else { "> 0" };
                return fail(format!("{field} must be finite, {lower} and <= {MAX_SECS}, got {value}"));
            }
        }

        let lengths = [
            ("motion.base_walk_speed", self.motion.base_walk_speed),
            ("motion.reach_distance", self.motion.reach_distance),
            ("motion.interaction_radius", self.motion.interaction_radius),
            ("bubble.min_width", self.bubble.min_width),
            ("bubble.max_width", self.bubble.max_width),
            ("bubble.glyph_width", self.bubble.glyph_width),
            ("bubble.line_height", self.bubble.line_height),
        ];
        for (field, value) in lengths {
            if !usable_length(value) {
                return fail(format!("{field} must be finite, > 0 and <= {MAX_LENGTH}, got {value}"));
            }
        }

        let offsets = [
            ("bubble.padding", self.bubble.padding),
            ("bubble.height_offset", self.bubble.height_offset),
        ];
        for (field, value) in offsets {
            if !value.is_finite() || value < 0.0 || value > MAX_LENGTH {
                return fail(format!("{field} must be finite, >= 0 and <= {MAX_LENGTH}, got {value}"));
            }
        }

        if self.motion.idle_time_max < self.motion.idle_time_min {
            return fail("motion.idle_time_min must not exceed motion.idle_time_max".to_string());
        }
        if self.dialog.max_turns == 0 || self.dialog.max_turns > MAX_TURNS {
            return fail(format!("dialog.max_turns must be between 1 and {MAX_TURNS}"));
        }
        if self.bubble.min_width > self.bubble.max_width {
            return fail("bubble.min_width must not exceed bubble.max_width".to_string());
        }
        if !self.waypoints.center.is_finite() {
            return fail("waypoints.center must be finite".to_string());
        }
        if let Some(def) = self.waypoints.explicit.iter().find(|def| !def.position.is_finite()) {
            return fail(format!("waypoints.explicit position of {} must be finite", def.name));
        }
        Ok(())
    }

    /// Apply conversation rules published by the dialog service.
    ///
    /// Only values that pass the same bounds as [`MatsuriConfig::validate`]
    /// replace the local ones; the rest are logged and ignored. Applying the
    /// same rules twice yields the same configuration.
    pub fn apply_rules(&mut self, rules: &RuleOverrides) {
        if let Some(max_turns) = rules.max_turns {
            if (1..=MAX_TURNS).contains(&max_turns) {
                self.dialog.max_turns = max_turns;
            } else {
                warn!(max_turns, "Ignoring published max_turns");
            }
        }
        if let Some(secs) = rules.turn_duration_secs {
            if usable_secs(secs, false) {
                self.dialog.turn_duration_secs = secs;
            } else {
                warn!(secs, "Ignoring published turn_duration");
            }
        }
        if let Some(radius) = rules.proximity_radius {
            if usable_length(radius) {
                self.motion.interaction_radius = radius;
            } else {
                warn!(radius, "Ignoring published proximity_radius");
            }
        }
        if let Some(secs) = rules.conversation_cooldown_secs {
            if usable_secs(secs, true) {
                self.motion.conversation_cooldown_secs = secs;
            } else {
                warn!(secs, "Ignoring published conversation_cooldown");
            }
        }
    }
}

/// Longest accepted time setting, in seconds.
pub const MAX_SECS: f32 = 3600.0;

/// Largest accepted distance, speed or pixel size.
pub const MAX_LENGTH: f32 = 10_000.0;

/// Most turns a session may run.
pub const MAX_TURNS: u32 = 100;

fn usable_secs(value: f32, zero_ok: bool) -> bool {
    value.is_finite() && value <= MAX_SECS && (value > 0.0 || (zero_ok && value >= 0.0))
}

fn usable_length(value: f32) -> bool {
    value.is_finite() && value > 0.0 && value <= MAX_LENGTH
}

/// Remote overrides for the conversation rules, all optional.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RuleOverrides {
    /// Turns per session.
    pub max_turns: Option<u32>,
    /// Seconds between turn dispatches.
    pub turn_duration_secs: Option<f32>,
    /// Radius within which two idle characters start talking.
    pub proximity_radius: Option<f32>,
    /// Seconds after a conversation before a character may talk again.
    pub conversation_cooldown_secs: Option<f32>,
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seed for every random choice in the world (waypoints, dwell times).
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            seed: default_seed(),
        }
    }
}

/// Dialog service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Base URL of the dialog service.
    #[serde(default = "default_server_url")]
    pub base_url: String,
    /// Hard timeout for any request, in seconds.
    #[serde(default = "default_10")]
    pub request_timeout_secs: f32,
    /// Interval between health checks, in seconds.
    #[serde(default = "default_5")]
    pub health_interval_secs: f32,
}

impl ServerConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        secs(self.request_timeout_secs, default_10())
    }

    /// Health poll interval as a [`Duration`].
    #[must_use]
    pub fn health_interval(&self) -> Duration {
        secs(self.health_interval_secs, default_5())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_server_url(),
            request_timeout_secs: 10.0,
            health_interval_secs: 5.0,
        }
    }
}

/// Character movement and interaction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionConfig {
    /// Walk speed before the remote multiplier (world units / second).
    #[serde(default = "default_2")]
    pub base_walk_speed: f32,
    /// Distance under which a waypoint counts as reached.
    #[serde(default = "default_0_5")]
    pub reach_distance: f32,
    /// Shortest dwell at a waypoint, in seconds.
    #[serde(default = "default_2")]
    pub idle_time_min: f32,
    /// Longest dwell at a waypoint, in seconds.
    #[serde(default = "default_5")]
    pub idle_time_max: f32,
    /// Radius within which two idle characters start talking.
    #[serde(default = "default_2")]
    pub interaction_radius: f32,
    /// Seconds after a conversation before a character may talk again.
    #[serde(default = "default_30")]
    pub conversation_cooldown_secs: f32,
    /// Seconds a character lingers after a conversation before walking off.
    #[serde(default = "default_2")]
    pub resume_delay_secs: f32,
}

impl MotionConfig {
    /// Cooldown as a [`Duration`].
    #[must_use]
    pub fn conversation_cooldown(&self) -> Duration {
        secs(self.conversation_cooldown_secs, default_30())
    }

    /// Post-conversation linger as a [`Duration`].
    #[must_use]
    pub fn resume_delay(&self) -> Duration {
        secs(self.resume_delay_secs, default_2())
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            base_walk_speed: 2.0,
            reach_distance: 0.5,
            idle_time_min: 2.0,
            idle_time_max: 5.0,
            interaction_radius: 2.0,
            conversation_cooldown_secs: 30.0,
            resume_delay_secs: 2.0,
        }
    }
}

/// Dialog session pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DialogConfig {
    /// Turns per session.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Seconds between turn dispatches.
    #[serde(default = "default_3")]
    pub turn_duration_secs: f32,
    /// Seconds between the last turn dispatch and session close.
    #[serde(default = "default_2")]
    pub end_delay_secs: f32,
    /// Context sent with the first turn, before any line exists.
    #[serde(default = "default_opening_line")]
    pub opening_line: String,
    /// Location label used when no waypoint carries area metadata.
    #[serde(default = "default_fallback_location")]
    pub fallback_location: String,
}

impl DialogConfig {
    /// Turn pacing as a [`Duration`].
    #[must_use]
    pub fn turn_duration(&self) -> Duration {
        secs(self.turn_duration_secs, default_3())
    }

    /// End delay as a [`Duration`].
    #[must_use]
    pub fn end_delay(&self) -> Duration {
        secs(self.end_delay_secs, default_2())
    }
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            turn_duration_secs: 3.0,
            end_delay_secs: 2.0,
            opening_line: default_opening_line(),
            fallback_location: default_fallback_location(),
        }
    }
}

/// Speech bubble presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BubbleConfig {
    /// Appear animation length, in seconds.
    #[serde(default = "default_0_3")]
    pub fade_in_secs: f32,
    /// Disappear animation length, in seconds.
    #[serde(default = "default_0_3")]
    pub fade_out_secs: f32,
    /// Height of the bubble anchor above the character's origin.
    #[serde(default = "default_2_5")]
    pub height_offset: f32,
    /// Narrowest bubble, in pixels.
    #[serde(default = "default_100")]
    pub min_width: f32,
    /// Widest bubble, in pixels.
    #[serde(default = "default_300")]
    pub max_width: f32,
    /// Inner padding on each side, in pixels.
    #[serde(default = "default_20")]
    pub padding: f32,
    /// Average advance of one glyph, in pixels.
    #[serde(default = "default_glyph_width")]
    pub glyph_width: f32,
    /// Height of one wrapped text line, in pixels.
    #[serde(default = "default_line_height")]
    pub line_height: f32,
}

impl Default for BubbleConfig {
    fn default() -> Self {
        Self {
            fade_in_secs: 0.3,
            fade_out_secs: 0.3,
            height_offset: 2.5,
            min_width: 100.0,
            max_width: 300.0,
            padding: 20.0,
            glyph_width: default_glyph_width(),
            line_height: default_line_height(),
        }
    }
}

/// Waypoint layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaypointConfig {
    /// Centre of the generated festival layout.
    #[serde(default)]
    pub center: Position,
    /// Maximum number of generated festival areas.
    #[serde(default = "default_waypoint_count")]
    pub count: usize,
    /// Explicit waypoints; when non-empty no layout is generated.
    #[serde(default)]
    pub explicit: Vec<WaypointDef>,
}

impl Default for WaypointConfig {
    fn default() -> Self {
        Self {
            center: Position::ZERO,
            count: default_waypoint_count(),
            explicit: Vec::new(),
        }
    }
}

/// One explicitly configured waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaypointDef {
    /// Waypoint name (e.g. `Waypoint_Takoyaki_Stand`).
    pub name: String,
    /// World position.
    pub position: Position,
    /// Human-readable area name, if this waypoint marks an area.
    #[serde(default)]
    pub area_name: Option<String>,
    /// Conversation topics associated with the area.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Area radius.
    #[serde(default)]
    pub radius: Option<f32>,
}

// ---------------------------------------------------------------------------
// Default value helpers
// ---------------------------------------------------------------------------

/// Seconds to a [`Duration`]; a value `Duration` cannot hold gives `default`.
fn secs(value: f32, default: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0))
        .or_else(|_| Duration::try_from_secs_f32(default))
        .unwrap_or(Duration::ZERO)
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_seed() -> u64 {
    0x6d61_7473_7572_69
}
fn default_server_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_opening_line() -> String {
    "夏祭りで出会いました。".to_string()
}
fn default_fallback_location() -> String {
    "夏祭り会場".to_string()
}
fn default_max_turns() -> u32 {
    6
}
fn default_waypoint_count() -> usize {
    7
}
fn default_0_3() -> f32 {
    0.3
}
fn default_0_5() -> f32 {
    0.5
}
fn default_2() -> f32 {
    2.0
}
fn default_2_5() -> f32 {
    2.5
}
fn default_3() -> f32 {
    3.0
}
fn default_5() -> f32 {
    5.0
}
fn default_10() -> f32 {
    10.0
}
fn default_20() -> f32 {
    20.0
}
fn default_30() -> f32 {
    30.0
}
fn default_100() -> f32 {
    100.0
}
fn default_300() -> f32 {
    300.0
}
fn default_glyph_width() -> f32 {
    8.0
}
fn default_line_height() -> f32 {
    18.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = MatsuriConfig::from_toml("").expect("empty config parses");
        assert_eq!(config.dialog.max_turns, 6);
        assert_eq!(config.dialog.turn_duration(), Duration::from_secs(3));
        assert_eq!(config.motion.conversation_cooldown(), Duration::from_secs(30));
        assert_eq!(config.server.health_interval(), Duration::from_secs(5));
        assert_eq!(config.server.base_url, "http://localhost:5000");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = MatsuriConfig::from_toml(
            r#"
            [dialog]
            max_turns = 4

            [motion]
            interaction_radius = 3.5
            "#,
        )
        .expect("valid config");
        assert_eq!(config.dialog.max_turns, 4);
        assert!((config.dialog.end_delay_secs - 2.0).abs() < f32::EPSILON);
        assert!((config.motion.interaction_radius - 3.5).abs() < f32::EPSILON);
        assert!((config.motion.idle_time_max - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = MatsuriConfig::from_toml("[dialog]\nmax_turnz = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn inverted_idle_bounds_fail_validation() {
        let result = MatsuriConfig::from_toml("[motion]\nidle_time_min = 6.0\nidle_time_max = 2.0\n");
        assert!(matches!(result, Err(crate::MatsuriError::Config(_))));
    }

    #[test]
    fn unusable_values_are_rejected_by_field() {
        let cases = [
            ("[server]\nrequest_timeout_secs = 1e30\n", "server.request_timeout_secs"),
            ("[server]\nhealth_interval_secs = inf\n", "server.health_interval_secs"),
            ("[motion]\nidle_time_max = inf\n", "motion.idle_time_max"),
            ("[motion]\nidle_time_min = nan\n", "motion.idle_time_min"),
            ("[motion]\nconversation_cooldown_secs = 1e20\n", "motion.conversation_cooldown_secs"),
            ("[motion]\nresume_delay_secs = -inf\n", "motion.resume_delay_secs"),
            ("[motion]\nbase_walk_speed = inf\n", "motion.base_walk_speed"),
            ("[motion]\nreach_distance = 0.0\n", "motion.reach_distance"),
            ("[motion]\ninteraction_radius = 1e9\n", "motion.interaction_radius"),
            ("[dialog]\nturn_duration_secs = 1e39\n", "dialog.turn_duration_secs"),
            ("[dialog]\nend_delay_secs = 4000.0\n", "dialog.end_delay_secs"),
            ("[dialog]\nmax_turns = 1000\n", "dialog.max_turns"),
            ("[bubble]\nfade_in_secs = inf\n", "bubble.fade_in_secs"),
            ("[bubble]\nfade_out_secs = -1.0\n", "bubble.fade_out_secs"),
            ("[bubble]\nglyph_width = nan\n", "bubble.glyph_width"),
            ("[bubble]\nline_height = 0.0\n", "bubble.line_height"),
            ("[bubble]\npadding = inf\n", "bubble.padding"),
            ("[bubble]\nheight_offset = nan\n", "bubble.height_offset"),
            ("[waypoints]\ncenter = { x = inf, y = 0.0, z = 0.0 }\n", "waypoints.center"),
        ];
        for (toml, field) in cases {
            match MatsuriConfig::from_toml(toml) {
                Err(crate::MatsuriError::Config(msg)) => {
                    assert!(msg.contains(field), "{field}: unexpected message {msg:?}");
                }
                other => panic!("{field}: expected a config error, got {other:?}"),
            }
        }
    }

    #[test]
    fn duration_accessors_never_panic() {
        let mut config = MatsuriConfig::default();
        config.dialog.turn_duration_secs = f32::INFINITY;
        config.motion.conversation_cooldown_secs = 1e20;
        config.server.health_interval_secs = f32::NAN;
        assert_eq!(config.dialog.turn_duration(), Duration::from_secs(3));
        assert_eq!(config.motion.conversation_cooldown(), Duration::from_secs(30));
        assert_eq!(config.server.health_interval(), Duration::ZERO);
    }

    #[test]
    fn explicit_waypoints_parse() {
        let config = MatsuriConfig::from_toml(
            r#"
            [[waypoints.explicit]]
            name = "Waypoint_Stage_Front"
            position = { x = 0.0, y = 0.0, z = 8.0 }
            area_name = "Stage Front"
            topics = ["stage", "music"]
            "#,
        )
        .expect("valid config");
        assert_eq!(config.waypoints.explicit.len(), 1);
        assert_eq!(config.waypoints.explicit[0].area_name.as_deref(), Some("Stage Front"));
    }

    #[test]
    fn rule_overrides_are_idempotent_and_filtered() {
        let rules = RuleOverrides {
            max_turns: Some(8),
            turn_duration_secs: Some(-1.0),
            proximity_radius: Some(2.5),
            conversation_cooldown_secs: None,
        };
        let mut once = MatsuriConfig::default();
        once.apply_rules(&rules);
        let mut twice = once.clone();
        twice.apply_rules(&rules);

        assert_eq!(once.dialog.max_turns, 8);
        assert!((once.dialog.turn_duration_secs - 3.0).abs() < f32::EPSILON);
        assert!((once.motion.interaction_radius - 2.5).abs() < f32::EPSILON);
        assert_eq!(twice.dialog.max_turns, once.dialog.max_turns);
        assert!((twice.motion.interaction_radius - once.motion.interaction_radius).abs() < f32::EPSILON);
    }

    #[test]
    fn unusable_published_rules_are_ignored() {
        let rules = RuleOverrides {
            max_turns: Some(u32::MAX),
            turn_duration_secs: Some(f32::INFINITY),
            proximity_radius: Some(f32::NAN),
            conversation_cooldown_secs: Some(1e20),
        };
        let mut config = MatsuriConfig::default();
        config.apply_rules(&rules);

        assert_eq!(config.dialog.max_turns, 6);
        assert!((config.dialog.turn_duration_secs - 3.0).abs() < f32::EPSILON);
        assert!((config.motion.interaction_radius - 2.0).abs() < f32::EPSILON);
        assert!((config.motion.conversation_cooldown_secs - 30.0).abs() < f32::EPSILON);
        config.validate().expect("ignored rules leave a valid config");
    }

    #[test]
    fn loads_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[general]\nseed = 7\n").expect("write");
        let config = MatsuriConfig::from_file(file.path()).expect("load");
        assert_eq!(config.general.seed, 7);
    }
}
