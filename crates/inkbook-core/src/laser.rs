//! Laser pointer strokes that fade away on their own.
//!
//! Every page owns one [`LaserSession`]. Strokes drawn in quick succession
//! share a single timeline: the session holds them at full opacity, then fades
//! and removes them together. Timers are plain deadlines stored in the state,
//! driven by [`LaserSession::advance`]; replacing the state is what cancels
//! them.

use crate::scene::Scene;
use crate::shapes::{Glow, Path, SerializableColor, Shape, ShapeFlags, ShapeId, ShapeStyle};
use kurbo::Point;
use std::time::{Duration, Instant};

/// Laser strokes ignore the brush color.
pub const LASER_COLOR: SerializableColor = SerializableColor::new(0xef, 0x44, 0x44, 255);

/// Time strokes stay fully visible after the last one is finished.
pub const HOLD_DURATION: Duration = Duration::from_millis(1500);

/// Length of the fade-out ramp.
pub const FADE_DURATION: Duration = Duration::from_millis(250);

/// Number of opacity steps in the fade.
pub const FADE_STEPS: u32 = 20;

/// Glow blur per unit of stroke width.
pub const GLOW_FACTOR: f64 = 3.0;

/// Interval between two fade steps.
pub fn fade_step_interval() -> Duration {
    FADE_DURATION / FADE_STEPS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaserState {
    Idle,
    /// A stroke is being drawn and nothing is scheduled yet.
    Active,
    Holding {
        deadline: Instant,
    },
    Fading {
        started: Instant,
        step: u32,
    },
}

/// Observable phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaserPhase {
    Idle,
    Active,
    Holding,
    Fading,
}

/// Fade timeline shared by the laser strokes of one page.
#[derive(Debug, Clone)]
pub struct LaserSession {
    strokes: Vec<ShapeId>,
    state: LaserState,
}

impl Default for LaserSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LaserSession {
    pub fn new() -> Self {
        Self {
            strokes: Vec::new(),
            state: LaserState::Idle,
        }
    }

    pub fn phase(&self) -> LaserPhase {
        match self.state {
            LaserState::Idle => LaserPhase::Idle,
            LaserState::Active => LaserPhase::Active,
            LaserState::Holding { .. } => LaserPhase::Holding,
            LaserState::Fading { .. } => LaserPhase::Fading,
        }
    }

    /// Strokes tracked by the session, oldest first.
    pub fn strokes(&self) -> &[ShapeId] {
        &self.strokes
    }

    /// Build a laser stroke from sampled points.
    pub fn make_stroke(points: Vec<Point>, width: f64) -> Path {
        let mut path = Path::with_style(points, ShapeStyle::stroked(LASER_COLOR, width));
        path.glow = Some(Glow {
            color: LASER_COLOR,
            blur: width * GLOW_FACTOR,
        });
        path.flags = ShapeFlags {
            laser: true,
            ..ShapeFlags::transient()
        };
        path
    }

    /// A laser stroke began. Only an idle session changes phase; running
    /// timers keep going until the stroke is finished.
    pub fn stroke_started(&mut self) {
        if self.state == LaserState::Idle {
            self.state = LaserState::Active;
        }
    }

    /// A laser stroke was added to `scene`.
    ///
    /// Any fade in progress is cancelled and every tracked stroke returns to
    /// full opacity; the hold restarts from `now`.
    pub fn stroke_completed(&mut self, scene: &mut Scene, id: ShapeId, now: Instant) {
        self.retain_existing(scene);
        if matches!(self.state, LaserState::Fading { .. }) {
            log::trace!("Laser fade cancelled by a new stroke");
            self.set_opacity(scene, 1.0);
        }
        if scene.contains(id) && !self.strokes.contains(&id) {
            self.strokes.push(id);
        }
        self.state = LaserState::Holding {
            deadline: now + HOLD_DURATION,
        };
    }

    /// Drive the timeline up to `now`. Returns true when the scene changed.
    pub fn advance(&mut self, scene: &mut Scene, now: Instant) -> bool {
        self.retain_existing(scene);
        if self.strokes.is_empty() && self.state != LaserState::Active {
            self.state = LaserState::Idle;
            return false;
        }

        if let LaserState::Holding { deadline } = self.state {
            if now < deadline {
                return false;
            }
            self.state = LaserState::Fading {
                started: deadline,
                step: 0,
            };
        }

        let LaserState::Fading { started, step } = self.state else {
            return false;
        };
        let elapsed = now.saturating_duration_since(started);
        let target = (elapsed.as_nanos() / fade_step_interval().as_nanos()).min(FADE_STEPS as u128)
            as u32;
        if target == step {
            return false;
        }

        if target >= FADE_STEPS {
            for id in self.strokes.drain(..) {
                scene.remove_shape(id);
            }
            log::debug!("Laser session finished");
            self.state = LaserState::Idle;
        } else {
            self.set_opacity(scene, 1.0 - target as f64 / FADE_STEPS as f64);
            self.state = LaserState::Fading {
                started,
                step: target,
            };
        }
        true
    }

    /// When the session next needs [`advance`](Self::advance) to be called.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            LaserState::Idle | LaserState::Active => None,
            LaserState::Holding { deadline } => Some(deadline),
            LaserState::Fading { started, step } => Some(started + fade_step_interval() * (step + 1)),
        }
    }

    /// Stop tracking a stroke that left the scene by other means.
    pub fn untrack(&mut self, id: ShapeId) {
        self.strokes.retain(|s| *s != id);
    }

    /// Drop every tracked stroke and cancel all timers.
    pub fn reset(&mut self) {
        self.strokes.clear();
        self.state = LaserState::Idle;
    }

    fn retain_existing(&mut self, scene: &Scene) {
        self.strokes.retain(|id| scene.contains(*id));
    }

    fn set_opacity(&self, scene: &mut Scene, opacity: f64) {
        for id in &self.strokes {
            if let Some(shape) = scene.get_mut(*id) {
                shape.style_mut().opacity = opacity;
            }
        }
    }
}

/// Convenience: add a finished laser stroke to `scene` and register it.
pub fn commit_stroke(
    session: &mut LaserSession,
    scene: &mut Scene,
    stroke: Path,
    now: Instant,
) -> ShapeId {
    let id = scene.add_shape(Shape::Path(stroke));
    session.stroke_completed(scene, id, now);
    id
}
