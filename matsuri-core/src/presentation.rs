//! Presentation surface: what the simulation tells a renderer.
//!
//! Nothing in the core draws anything. Animation flags, emotion cues and
//! bubble state are pushed through a [`PresentationSink`] once per tick.

use crate::bubble::{BubbleSize, BubbleVisual};
use crate::types::{AgentId, ScreenPoint};

/// Receiver of per-character and per-bubble presentation updates.
pub trait PresentationSink {
    /// Animation flags for a character.
    fn set_locomotion(&mut self, agent: &AgentId, walking: bool, talking: bool);
    /// One-shot emotion cue.
    fn trigger_emotion(&mut self, agent: &AgentId, emotion: &str);
    /// Current movement speed.
    fn set_speed(&mut self, agent: &AgentId, speed: f32);
    /// Screen-space anchor of a character's bubble.
    fn set_bubble_anchor(&mut self, agent: &AgentId, anchor: ScreenPoint, height_offset: f32);
    /// New bubble text and its measured size.
    fn set_bubble_text(&mut self, agent: &AgentId, text: &str, size: BubbleSize);
    /// Bubble opacity, scale and render flag.
    fn set_bubble_visibility(&mut self, agent: &AgentId, visual: BubbleVisual);
}

/// Discards everything. Used by headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn set_locomotion(&mut self, _: &AgentId, _: bool, _: bool) {}
    fn trigger_emotion(&mut self, _: &AgentId, _: &str) {}
    fn set_speed(&mut self, _: &AgentId, _: f32) {}
    fn set_bubble_anchor(&mut self, _: &AgentId, _: ScreenPoint, _: f32) {}
    fn set_bubble_text(&mut self, _: &AgentId, _: &str, _: BubbleSize) {}
    fn set_bubble_visibility(&mut self, _: &AgentId, _: BubbleVisual) {}
}

/// One recorded presentation call.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    /// See [`PresentationSink::set_locomotion`].
    Locomotion {
        /// Character.
        agent: AgentId,
        /// Walking flag.
        walking: bool,
        /// Talking flag.
        talking: bool,
    },
    /// See [`PresentationSink::trigger_emotion`].
    Emotion {
        /// Character.
        agent: AgentId,
        /// Emotion name.
        emotion: String,
    },
    /// See [`PresentationSink::set_speed`].
    Speed {
        /// Character.
        agent: AgentId,
        /// Speed in world units per second.
        speed: f32,
    },
    /// See [`PresentationSink::set_bubble_anchor`].
    BubbleAnchor {
        /// Bubble owner.
        agent: AgentId,
        /// Projected anchor.
        anchor: ScreenPoint,
    },
    /// See [`PresentationSink::set_bubble_text`].
    BubbleText {
        /// Bubble owner.
        agent: AgentId,
        /// New text.
        text: String,
        /// Measured size.
        size: BubbleSize,
    },
    /// See [`PresentationSink::set_bubble_visibility`].
    BubbleVisibility {
        /// Bubble owner.
        agent: AgentId,
        /// Visual state.
        visual: BubbleVisual,
    },
}

/// Keeps every call, for tests and replays.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// Calls in arrival order.
    pub events: Vec<PresentationEvent>,
}

impl RecordingSink {
    /// Texts shown in `agent`'s bubble, oldest first.
    #[must_use]
    pub fn texts_for(&self, agent: &AgentId) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PresentationEvent::BubbleText { agent: a, text, .. } if a == agent => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Emotions triggered on `agent`, oldest first.
    #[must_use]
    pub fn emotions_for(&self, agent: &AgentId) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PresentationEvent::Emotion { agent: a, emotion } if a == agent => Some(emotion.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Most recent visibility pushed for `agent`'s bubble.
    #[must_use]
    pub fn last_visual(&self, agent: &AgentId) -> Option<BubbleVisual> {
        self.events.iter().rev().find_map(|e| match e {
            PresentationEvent::BubbleVisibility { agent: a, visual } if a == agent => Some(*visual),
            _ => None,
        })
    }

    /// Forget everything recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl PresentationSink for RecordingSink {
    fn set_locomotion(&mut self, agent: &AgentId, walking: bool, talking: bool) {
        self.events.push(PresentationEvent::Locomotion {
            agent: agent.clone(),
            walking,
            talking,
        });
    }

    fn trigger_emotion(&mut self, agent: &AgentId, emotion: &str) {
        self.events.push(PresentationEvent::Emotion {
            agent: agent.clone(),
            emotion: emotion.to_string(),
        });
    }

    fn set_speed(&mut self, agent: &AgentId, speed: f32) {
        self.events.push(PresentationEvent::Speed {
            agent: agent.clone(),
            speed,
        });
    }

    fn set_bubble_anchor(&mut self, agent: &AgentId, anchor: ScreenPoint, _height_offset: f32) {
        self.events.push(PresentationEvent::BubbleAnchor {
            agent: agent.clone(),
            anchor,
        });
    }

    fn set_bubble_text(&mut self, agent: &AgentId, text: &str, size: BubbleSize) {
        self.events.push(PresentationEvent::BubbleText {
            agent: agent.clone(),
            text: text.to_string(),
            size,
        });
    }

    fn set_bubble_visibility(&mut self, agent: &AgentId, visual: BubbleVisual) {
        self.events.push(PresentationEvent::BubbleVisibility {
            agent: agent.clone(),
            visual,
        });
    }
}
