use std::collections::BTreeMap;

use crate::app::Camera2D;
use crate::config::InterpolationConfig;

use super::geom::{Facing, Rect, Vec2};
use super::world::{EntityClass, EntityId, RemoteSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedEntity {
    pub id: EntityId,
    pub class: EntityClass,
    pub render: Vec2,
    pub target: Vec2,
    pub facing: Facing,
    pub harvesting: bool,
}

/// Display positions for every remote entity, smoothed toward the latest
/// snapshot.
#[derive(Debug, Clone)]
pub struct RemoteInterpolator {
    config: InterpolationConfig,
    half_size: f32,
    entities: BTreeMap<EntityId, InterpolatedEntity>,
}

impl RemoteInterpolator {
    pub fn new(config: InterpolationConfig, half_size: f32) -> Self {
        Self {
            config,
            half_size,
            entities: BTreeMap::new(),
        }
    }

    pub fn entities(&self) -> impl Iterator<Item = &InterpolatedEntity> {
        self.entities.values()
    }

    pub fn get(&self, id: EntityId) -> Option<&InterpolatedEntity> {
        self.entities.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Mirrors the live set: new ids are seeded at their snapshot, known ids
    /// only get a new target, and vanished ids are dropped.
    pub fn sync(&mut self, live: &BTreeMap<EntityId, RemoteSnapshot>) {
        self.entities.retain(|id, _| live.contains_key(id));
        for snapshot in live.values() {
            self.entities
                .entry(snapshot.id)
                .and_modify(|entity| {
                    entity.target = snapshot.position;
                    entity.facing = snapshot.facing;
                    entity.class = snapshot.class;
                    entity.harvesting = snapshot.harvesting;
                })
                .or_insert_with(|| InterpolatedEntity {
                    id: snapshot.id,
                    class: snapshot.class,
                    render: snapshot.position,
                    target: snapshot.position,
                    facing: snapshot.facing,
                    harvesting: snapshot.harvesting,
                });
        }
    }

    pub fn advance(&mut self, dt_seconds: f32, camera: &Camera2D) {
        let window_seconds = self.config.smoothing_window_ms / 1000.0;
        let fraction = (dt_seconds / window_seconds).clamp(0.0, 1.0);
        let half = self.half_size;
        let snap_epsilon = self.config.snap_epsilon;

        for entity in self.entities.values_mut() {
            let body = Rect::centered(entity.render, half, half);
            if !camera.is_rect_visible(&body) {
                entity.render = entity.target;
                continue;
            }
            let remaining = entity.target - entity.render;
            let distance = remaining.length();
            if distance <= snap_epsilon {
                entity.render = entity.target;
                continue;
            }
            let step = (distance * fraction).min(distance);
            entity.render = entity.render + remaining * (step / distance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::rendering::transform::Viewport;
    use crate::config::CameraConfig;

    const DT: f32 = 1.0 / 60.0;

    fn camera() -> Camera2D {
        Camera2D::new(
            &CameraConfig::default(),
            Viewport {
                width: 320,
                height: 240,
            },
        )
    }

    fn snapshot(id: u64, x: f32, y: f32) -> RemoteSnapshot {
        RemoteSnapshot {
            id: EntityId(id),
            class: EntityClass::Player,
            position: Vec2::new(x, y),
            facing: Facing::Down,
            harvesting: false,
        }
    }

    fn live(snapshots: &[RemoteSnapshot]) -> BTreeMap<EntityId, RemoteSnapshot> {
        snapshots.iter().map(|s| (s.id, s.clone())).collect()
    }

    fn interpolator() -> RemoteInterpolator {
        RemoteInterpolator::new(InterpolationConfig::default(), 8.0)
    }

    #[test]
    fn first_sighting_seeds_without_interpolation() {
        let mut interp = interpolator();
        interp.sync(&live(&[snapshot(2, 30.0, 40.0)]));
        let entity = interp.get(EntityId(2)).expect("seeded");
        assert_eq!(entity.render, Vec2::new(30.0, 40.0));
        assert_eq!(entity.target, entity.render);
    }

    #[test]
    fn departed_ids_are_removed_on_sync() {
        let mut interp = interpolator();
        interp.sync(&live(&[snapshot(2, 0.0, 0.0), snapshot(3, 1.0, 1.0)]));
        interp.sync(&live(&[snapshot(3, 1.0, 1.0)]));
        assert!(interp.get(EntityId(2)).is_none());
        assert_eq!(interp.len(), 1);
    }

    #[test]
    fn render_converges_monotonically_inside_margin() {
        let camera = camera();
        let mut interp = interpolator();
        interp.sync(&live(&[snapshot(5, 0.0, 0.0)]));
        interp.sync(&live(&[snapshot(5, 60.0, 0.0)]));

        let mut previous = f32::INFINITY;
        for _ in 0..200 {
            interp.advance(DT, &camera);
            let entity = interp.get(EntityId(5)).expect("entity");
            let distance = entity.render.distance(entity.target);
            if distance == 0.0 {
                return;
            }
            assert!(distance < previous, "{distance} >= {previous}");
            previous = distance;
        }
        panic!("did not reach target, remaining {previous}");
    }

    #[test]
    fn outside_margin_snaps_in_one_frame() {
        let camera = camera();
        let mut interp = interpolator();
        interp.sync(&live(&[snapshot(7, 1000.0, 1000.0)]));
        interp.sync(&live(&[snapshot(7, 1100.0, 900.0)]));
        interp.advance(DT, &camera);
        let entity = interp.get(EntityId(7)).expect("entity");
        assert_eq!(entity.render, entity.target);
    }

    #[test]
    fn later_snapshot_updates_target_and_facing_only() {
        let mut interp = interpolator();
        interp.sync(&live(&[snapshot(4, 0.0, 0.0)]));
        let mut moved = snapshot(4, 10.0, 0.0);
        moved.facing = Facing::Right;
        interp.sync(&live(&[moved]));
        let entity = interp.get(EntityId(4)).expect("entity");
        assert_eq!(entity.render, Vec2::ZERO);
        assert_eq!(entity.target, Vec2::new(10.0, 0.0));
        assert_eq!(entity.facing, Facing::Right);
    }
}
