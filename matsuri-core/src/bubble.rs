//! Speech bubbles: a fade state machine, screen-space follow and text
//! measurement.
//!
//! A bubble's logical phase (is it meant to be shown?) is independent of
//! whether it is on screen this frame. A character behind the camera keeps
//! its bubble `Visible`; the bubble is just not rendered until it comes back.

use crate::config::BubbleConfig;
use crate::types::{AgentId, Position, ScreenPoint};

/// Logical bubble phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubblePhase {
    /// Not shown.
    Hidden,
    /// Fading in.
    Appearing,
    /// Fully shown.
    Visible,
    /// Fading out.
    Disappearing,
}

/// What the renderer should draw this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleVisual {
    /// Opacity in `[0, 1]`.
    pub alpha: f32,
    /// Uniform scale in `[0, 1]`.
    pub scale: f32,
    /// Whether the bubble is drawn at all.
    pub rendered: bool,
}

/// Measured bubble size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleSize {
    /// Width including padding.
    pub width: f32,
    /// Height including padding.
    pub height: f32,
}

/// World → screen projection, supplied by the renderer.
pub trait Projector {
    /// Project a world position. `depth <= 0` means behind the viewer.
    fn project(&self, world: Position) -> ScreenPoint;
}

/// A pinhole camera looking along `forward` from `eye`.
#[derive(Debug, Clone, Copy)]
pub struct LookAtProjector {
    /// Camera position.
    pub eye: Position,
    /// Unit view direction.
    pub forward: Position,
    /// Focal length in pixels.
    pub focal_px: f32,
    /// Screen centre in pixels.
    pub center: (f32, f32),
}

impl LookAtProjector {
    /// Camera at `eye` looking at `target`.
    #[must_use]
    pub fn looking_at(eye: Position, target: Position, focal_px: f32, center: (f32, f32)) -> Self {
        Self {
            eye,
            forward: (target - eye).normalized(),
            focal_px,
            center,
        }
    }
}

impl Projector for LookAtProjector {
    fn project(&self, world: Position) -> ScreenPoint {
        let f = self.forward;
        // right = forward × up, up' = right × forward
        let right = Position::new(-f.z, 0.0, f.x).normalized();
        let up = Position::new(
            right.y * f.z - right.z * f.y,
            right.z * f.x - right.x * f.z,
            right.x * f.y - right.y * f.x,
        );
        let rel = world - self.eye;
        let dot = |a: Position, b: Position| a.x * b.x + a.y * b.y + a.z * b.z;

        let depth = dot(rel, f);
        if depth <= f32::EPSILON {
            return ScreenPoint { x: 0.0, y: 0.0, depth };
        }
        ScreenPoint {
            x: self.center.0 + dot(rel, right) * self.focal_px / depth,
            y: self.center.1 - dot(rel, up) * self.focal_px / depth,
            depth,
        }
    }
}

/// A bubble bound to one character.
#[derive(Debug, Clone)]
pub struct SpeechBubble {
    owner: AgentId,
    phase: BubblePhase,
    progress: f32,
    text: String,
    size: BubbleSize,
    anchor: Option<ScreenPoint>,
    config: BubbleConfig,
}

impl SpeechBubble {
    /// A hidden, empty bubble for `owner`.
    #[must_use]
    pub fn new(owner: AgentId, config: &BubbleConfig) -> Self {
        Self {
            owner,
            phase: BubblePhase::Hidden,
            progress: 0.0,
            text: String::new(),
            size: measure("", config),
            anchor: None,
            config: config.clone(),
        }
    }

    /// The character this bubble follows.
    #[must_use]
    pub fn owner(&self) -> &AgentId {
        &self.owner
    }

    /// Logical phase.
    #[must_use]
    pub fn phase(&self) -> BubblePhase {
        self.phase
    }

    /// Animation progress in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Whether the bubble is meant to be shown (appearing or visible).
    #[must_use]
    pub fn is_shown(&self) -> bool {
        matches!(self.phase, BubblePhase::Appearing | BubblePhase::Visible)
    }

    /// Current text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Current measured size.
    #[must_use]
    pub fn size(&self) -> BubbleSize {
        self.size
    }

    /// Last projected anchor.
    #[must_use]
    pub fn anchor(&self) -> Option<ScreenPoint> {
        self.anchor
    }

    /// Height offset above the character origin.
    #[must_use]
    pub fn height_offset(&self) -> f32 {
        self.config.height_offset
    }

    /// Start fading in. Reverses a fade-out from its current progress.
    pub fn show(&mut self) {
        match self.phase {
            BubblePhase::Hidden | BubblePhase::Disappearing => self.phase = BubblePhase::Appearing,
            BubblePhase::Appearing | BubblePhase::Visible => {}
        }
    }

    /// Start fading out. Reverses a fade-in from its current progress.
    pub fn hide(&mut self) {
        match self.phase {
            BubblePhase::Appearing | BubblePhase::Visible => self.phase = BubblePhase::Disappearing,
            BubblePhase::Hidden | BubblePhase::Disappearing => {}
        }
    }

    /// Replace the text and re-measure. The animation is not restarted.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.size = measure(&self.text, &self.config);
    }

    /// Advance the fade animation by `dt_secs`.
    pub fn animate(&mut self, dt_secs: f32) {
        match self.phase {
            BubblePhase::Appearing => {
                self.progress = step_towards(self.progress, 1.0, dt_secs, self.config.fade_in_secs);
                if self.progress >= 1.0 {
                    self.phase = BubblePhase::Visible;
                }
            }
            BubblePhase::Disappearing => {
                self.progress = step_towards(self.progress, 0.0, dt_secs, self.config.fade_out_secs);
                if self.progress <= 0.0 {
                    self.phase = BubblePhase::Hidden;
                }
            }
            BubblePhase::Hidden | BubblePhase::Visible => {}
        }
    }

    /// Re-project the anchor above `owner_position`.
    pub fn follow(&mut self, owner_position: Position, projector: &dyn Projector) -> ScreenPoint {
        let point = projector.project(owner_position + Position::UP * self.config.height_offset);
        self.anchor = Some(point);
        point
    }

    /// Opacity, scale and render flag for this frame.
    ///
    /// Alpha is the raw progress; scale is its smoothstep. A bubble whose
    /// anchor is behind the viewer is not rendered.
    #[must_use]
    pub fn visual(&self) -> BubbleVisual {
        let on_screen = self.anchor.is_none_or(|p| p.in_front());
        BubbleVisual {
            alpha: self.progress,
            scale: smoothstep(self.progress),
            rendered: self.phase != BubblePhase::Hidden && on_screen,
        }
    }
}

fn step_towards(value: f32, target: f32, dt_secs: f32, duration_secs: f32) -> f32 {
    if duration_secs <= 0.0 {
        return target;
    }
    let delta = dt_secs / duration_secs;
    let next = if target > value {
        (value + delta).min(target)
    } else {
        (value - delta).max(target)
    };
    // Absorb float drift so a fade of n equal steps always completes.
    if (next - target).abs() < 1e-4 { target } else { next }
}

/// Ease-in-out curve on `[0, 1]`.
#[must_use]
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Bubble size for `text`: width clamped to the configured bounds, height
/// from the number of wrapped lines.
#[must_use]
pub fn measure(text: &str, config: &BubbleConfig) -> BubbleSize {
    let padding = config.padding * 2.0;
    let max_inner = (config.max_width - padding).max(config.glyph_width);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let glyphs_per_line = ((max_inner / config.glyph_width).floor() as usize).max(1);

    let mut widest = 0_usize;
    let mut lines = 0_usize;
    for paragraph in text.split('\n') {
        let glyphs = paragraph.chars().count();
        widest = widest.max(glyphs);
        lines += glyphs.div_ceil(glyphs_per_line).max(1);
    }

    #[allow(clippy::cast_precision_loss)]
    let (text_width, text_height) = (
        widest as f32 * config.glyph_width,
        lines as f32 * config.line_height,
    );
    BubbleSize {
        width: (text_width + padding).clamp(config.min_width, config.max_width),
        height: text_height + padding,
    }
}
