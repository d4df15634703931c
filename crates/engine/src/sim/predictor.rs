use tracing::trace;

use crate::config::MovementConfig;

use super::geom::{Facing, Rect, Vec2};
use super::world::WorldStore;

const CONTACT_SEARCH_STEPS: usize = 12;

/// One polled snapshot of the four directional keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionKeys {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DirectionKeys {
    pub fn any(&self) -> bool {
        self.up || self.down || self.left || self.right
    }

    fn axis(&self) -> Vec2 {
        let x = f32::from(u8::from(self.right)) - f32::from(u8::from(self.left));
        let y = f32::from(u8::from(self.down)) - f32::from(u8::from(self.up));
        Vec2::new(x, y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    pub position: Vec2,
    pub facing: Facing,
    pub moved: bool,
}

#[derive(Debug, Clone)]
pub struct MovementPredictor {
    config: MovementConfig,
}

impl MovementPredictor {
    pub fn new(config: MovementConfig) -> Self {
        Self { config }
    }

    /// Advances the local player one frame and writes the accepted position
    /// back into the store.
    ///
    /// `harvest_focus` is the node being harvested, if any: movement is locked
    /// and the player turns toward it.
    pub fn advance(
        &self,
        store: &mut WorldStore,
        keys: DirectionKeys,
        harvest_focus: Option<Vec2>,
        dt_seconds: f32,
    ) -> MoveOutcome {
        let local = store.local_player();
        let origin = local.position;
        let mut facing = local.facing;

        if let Some(focus) = harvest_focus {
            if let Some(turned) = Facing::from_delta(focus - origin) {
                facing = turned;
            }
            store.set_local_position(origin, facing);
            return MoveOutcome {
                position: origin,
                facing,
                moved: false,
            };
        }

        let speed = self.config.base_speed * local.speed_multiplier();
        let max_step = (speed * dt_seconds.max(0.0)).max(0.0);

        let step = if keys.any() {
            store.set_click_target(None);
            keys.axis().normalized().map(|direction| direction * max_step)
        } else if let Some(target) = store.click_target() {
            let to_target = target - origin;
            let remaining = to_target.length();
            if remaining <= self.config.arrival_threshold {
                store.set_click_target(None);
                None
            } else {
                let travel = max_step.min(remaining);
                if remaining - travel <= self.config.arrival_threshold {
                    store.set_click_target(None);
                }
                to_target.normalized().map(|direction| direction * travel)
            }
        } else {
            None
        };

        let Some(step) = step else {
            return MoveOutcome {
                position: origin,
                facing,
                moved: false,
            };
        };
        if let Some(turned) = Facing::from_delta(step) {
            facing = turned;
        }

        let accepted = self.resolve_collision(store, origin, step);
        let moved = accepted.distance(origin) > self.config.min_move_distance;
        let position = if moved { accepted } else { origin };
        if !moved {
            trace!(x = origin.x, y = origin.y, "local_move_blocked");
        }
        store.set_local_position(position, facing);
        MoveOutcome {
            position,
            facing,
            moved,
        }
    }

    /// Full step first, then each axis alone so the player slides along
    /// walls, then as far along the step as the body fits.
    fn resolve_collision(&self, store: &WorldStore, origin: Vec2, step: Vec2) -> Vec2 {
        let fits = |candidate: Vec2| !store.is_blocked(&self.body_at(candidate));
        let full = origin + step;
        if fits(full) {
            return full;
        }
        let slides = [
            Vec2::new(origin.x + step.x, origin.y),
            Vec2::new(origin.x, origin.y + step.y),
        ];
        if let Some(slide) = slides
            .into_iter()
            .filter(|slide| *slide != origin && *slide != full)
            .find(|slide| fits(*slide))
        {
            return slide;
        }

        let (mut free, mut blocked) = (0.0_f32, 1.0_f32);
        for _ in 0..CONTACT_SEARCH_STEPS {
            let mid = (free + blocked) * 0.5;
            if fits(origin + step * mid) {
                free = mid;
            } else {
                blocked = mid;
            }
        }
        origin + step * free
    }

    fn body_at(&self, position: Vec2) -> Rect {
        let half = self.config.player_half_size;
        Rect::centered(position, half, half)
    }
}
