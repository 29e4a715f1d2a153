//! Movement collaborator.
//!
//! Characters never move themselves: they hand a target and a speed to a
//! [`Steering`] implementation and read back position, velocity and whether
//! the target was reached. Engines plug in their own navmesh agent here.

use crate::types::Position;

/// Result of one steering step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringOutput {
    /// New position.
    pub position: Position,
    /// Velocity applied during the step (world units / second).
    pub velocity: Position,
    /// Whether `position` is within the reach distance of the target.
    pub arrived: bool,
}

/// Something that moves a character towards a target.
pub trait Steering: Send + Sync {
    /// Advance `position` towards `target` at `speed` for `dt_secs`.
    ///
    /// `reach_distance` is the radius under which the target counts as reached.
    fn step(
        &self,
        position: Position,
        target: Position,
        speed: f32,
        reach_distance: f32,
        dt_secs: f32,
    ) -> SteeringOutput;
}

/// Straight-line movement on the horizontal plane. Never overshoots.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectSteering;

impl Steering for DirectSteering {
    fn step(
        &self,
        position: Position,
        target: Position,
        speed: f32,
        reach_distance: f32,
        dt_secs: f32,
    ) -> SteeringOutput {
        let offset = (target - position).flattened();
        let remaining = offset.length();

        if remaining < reach_distance {
            return SteeringOutput {
                position,
                velocity: Position::ZERO,
                arrived: true,
            };
        }

        let travel = (speed * dt_secs).max(0.0).min(remaining);
        let direction = offset.normalized();
        let position = position + direction * travel;
        let velocity = if dt_secs > 0.0 {
            direction * (travel / dt_secs)
        } else {
            Position::ZERO
        };

        SteeringOutput {
            position,
            velocity,
            arrived: (remaining - travel) < reach_distance,
        }
    }
}
