use thiserror::Error;
use tracing::trace;

use crate::app::{Camera2D, LoopMetricsSnapshot};
use crate::config::RenderConfig;
use crate::sim::geom::{Rect, Vec2};
use crate::sim::interaction::{InteractionCoordinator, InteractionState};
use crate::sim::pool::Pool;
use crate::sim::session::SessionView;
use crate::sim::world::{EntityClass, EntityId, PickupId};

use super::selection::select_closest;

pub type Rgba = [u8; 4];

const CLEAR_COLOR: Rgba = [18, 20, 27, 255];
const FLOOR_COLOR: Rgba = [46, 52, 60, 255];
const SOLID_COLOR: Rgba = [78, 70, 62, 255];
const ZONE_GLOW_COLOR: Rgba = [70, 90, 120, 255];
const PAD_COLOR: Rgba = [90, 60, 150, 255];
const PAD_GATED_COLOR: Rgba = [170, 140, 40, 255];
const PICKUP_COLOR: Rgba = [250, 215, 80, 255];
const STUMP_COLOR: Rgba = [96, 72, 48, 255];
const TRUNK_COLOR: Rgba = [120, 86, 50, 255];
const CANOPY_COLOR: Rgba = [52, 128, 64, 255];
const VENDOR_COLOR: Rgba = [200, 110, 70, 255];
const TABLE_COLOR: Rgba = [40, 120, 90, 255];
const NPC_COLOR: Rgba = [150, 150, 160, 255];
const REMOTE_PLAYER_COLOR: Rgba = [90, 170, 230, 255];
const HARVESTING_COLOR: Rgba = [230, 160, 90, 255];
const AERIAL_COLOR: Rgba = [230, 230, 250, 255];
const LOCAL_PLAYER_COLOR: Rgba = [120, 240, 140, 255];
const PENDING_MARKER_COLOR: Rgba = [255, 120, 120, 255];
const PROGRESS_BACK_COLOR: Rgba = [10, 12, 16, 220];
const PROGRESS_FILL_COLOR: Rgba = [120, 220, 120, 255];
const METRICS_FPS_COLOR: Rgba = [80, 200, 255, 255];
const METRICS_FRAME_COLOR: Rgba = [255, 170, 80, 255];

const PICKUP_HALF_SIZE: f32 = 3.0;
const FIXTURE_HALF_SIZE: f32 = 6.0;
const CANOPY_HALF_WIDTH: f32 = 10.0;
const CANOPY_HEIGHT: f32 = 10.0;
const PENDING_MARKER_HALF_SIZE_PX: f32 = 4.0;
const PROGRESS_BAR_WIDTH_PX: f32 = 120.0;
const PROGRESS_BAR_HEIGHT_PX: f32 = 8.0;
const PROGRESS_BAR_BOTTOM_OFFSET_PX: f32 = 32.0;
const METRICS_BAR_HEIGHT_PX: f32 = 4.0;
const METRICS_BAR_MAX_WIDTH_PX: f32 = 120.0;
const METRICS_FPS_FULL_SCALE: f32 = 120.0;
const METRICS_FRAME_MS_FULL_SCALE: f32 = 50.0;
const OVERLAY_MARGIN_PX: f32 = 8.0;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("drawing surface unavailable ({width}x{height})")]
    Unavailable { width: u32, height: u32 },
    #[error("failed to present frame: {0}")]
    Present(#[source] pixels::Error),
}

/// Fixed draw order. Every call in a frame carries its layer and layers
/// never go backwards within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DrawLayer {
    Background,
    Ambient,
    GroundDecal,
    Standing,
    Canopy,
    BackgroundActors,
    Players,
    OnTop,
    Overlay,
}

impl DrawLayer {
    fn for_entity(class: EntityClass) -> Self {
        match class {
            EntityClass::Npc => Self::BackgroundActors,
            EntityClass::Player => Self::Players,
            EntityClass::Aerial => Self::OnTop,
        }
    }
}

/// Pure drawing primitives, all in screen pixels.
pub trait DrawSurface {
    fn begin_frame(&mut self) -> Result<(), SurfaceError>;
    fn clear(&mut self, color: Rgba);
    fn fill_rect(&mut self, layer: DrawLayer, rect: Rect, color: Rgba);
    fn outline_rect(&mut self, layer: DrawLayer, rect: Rect, color: Rgba);
    fn present(&mut self) -> Result<(), SurfaceError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlayData {
    pub metrics: Option<LoopMetricsSnapshot>,
    pub harvest_progress: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub entities_drawn: usize,
    pub entities_culled: usize,
    pub pickups_total: usize,
    pub pickups_drawn: usize,
    pub interactables_drawn: usize,
}

#[derive(Debug, Clone, Copy)]
struct EntityDraw {
    layer: DrawLayer,
    y: f32,
    id: EntityId,
    rect: Rect,
    color: Rgba,
}

#[derive(Debug, Clone, Copy)]
struct PickupDraw {
    id: PickupId,
    position: Vec2,
    distance: f32,
}

#[derive(Debug, Clone, Copy)]
struct FixtureDraw {
    layer: DrawLayer,
    rect: Rect,
    color: Rgba,
    outline: bool,
}

#[derive(Debug)]
struct ScratchPools {
    entities: Pool<EntityDraw>,
    pickups: Pool<PickupDraw>,
    fixtures: Pool<FixtureDraw>,
}

impl ScratchPools {
    fn new(capacity: usize) -> Self {
        Self {
            entities: Pool::new(capacity),
            pickups: Pool::new(capacity),
            fixtures: Pool::new(capacity),
        }
    }

    fn outstanding(&self) -> usize {
        self.entities.outstanding() + self.pickups.outstanding() + self.fixtures.outstanding()
    }

    fn free_buffers_are_empty(&self) -> bool {
        self.entities.free_buffers_are_empty()
            && self.pickups.free_buffers_are_empty()
            && self.fixtures.free_buffers_are_empty()
    }

    fn allocations(&self) -> u64 {
        self.entities.allocations() + self.pickups.allocations() + self.fixtures.allocations()
    }
}

/// Culls, sorts and draws one frame from a session view.
#[derive(Debug)]
pub struct RenderPipeline {
    config: RenderConfig,
    pools: ScratchPools,
}

impl RenderPipeline {
    pub fn new(config: RenderConfig) -> Self {
        let pools = ScratchPools::new(config.pool_capacity);
        Self { config, pools }
    }

    pub fn outstanding_buffers(&self) -> usize {
        self.pools.outstanding()
    }

    pub fn pooled_buffers_are_empty(&self) -> bool {
        self.pools.free_buffers_are_empty()
    }

    pub fn pool_allocations(&self) -> u64 {
        self.pools.allocations()
    }

    /// Draws the frame. A surface that cannot begin a frame is reported
    /// before any scratch buffer is taken.
    pub fn render(
        &mut self,
        surface: &mut dyn DrawSurface,
        view: &SessionView<'_>,
        overlay: &OverlayData,
    ) -> Result<FrameStats, SurfaceError> {
        surface.begin_frame()?;

        let camera = view.camera;
        let mut stats = FrameStats::default();
        let mut fixtures = self.pools.fixtures.acquire();
        let mut pickups = self.pools.pickups.acquire();
        let mut entities = self.pools.entities.acquire();

        surface.clear(CLEAR_COLOR);
        draw_background(surface, view);
        draw_ambient(surface, view);

        collect_fixtures(view, &mut fixtures);
        // stable: fixtures keep insertion order within a band
        fixtures.sort_by_key(|fixture| fixture.layer);
        collect_pickups(view, self.config.pickup_draw_cap, &mut pickups, &mut stats);

        let mut pickups_drawn = false;
        for fixture in fixtures.iter() {
            if fixture.layer > DrawLayer::GroundDecal && !pickups_drawn {
                draw_pickups(surface, camera, &pickups);
                pickups_drawn = true;
            }
            let rect = screen_rect(camera, fixture.rect);
            if fixture.outline {
                surface.outline_rect(fixture.layer, rect, fixture.color);
            } else {
                surface.fill_rect(fixture.layer, rect, fixture.color);
            }
        }
        if !pickups_drawn {
            draw_pickups(surface, camera, &pickups);
        }
        stats.interactables_drawn = fixtures.len();

        collect_entities(view, self.config.entity_half_size, &mut entities, &mut stats);
        entities.sort_by(|a, b| {
            a.layer
                .cmp(&b.layer)
                .then_with(|| a.y.total_cmp(&b.y))
                .then_with(|| a.id.cmp(&b.id))
        });
        for entity in entities.iter() {
            surface.fill_rect(entity.layer, screen_rect(camera, entity.rect), entity.color);
        }
        stats.entities_drawn = entities.len();

        draw_overlay(surface, view, overlay);

        self.pools.entities.release(entities);
        self.pools.pickups.release(pickups);
        self.pools.fixtures.release(fixtures);

        trace!(
            entities = stats.entities_drawn,
            culled = stats.entities_culled,
            pickups = stats.pickups_drawn,
            "frame_rendered"
        );
        surface.present()?;
        Ok(stats)
    }
}

fn screen_rect(camera: &Camera2D, world: Rect) -> Rect {
    let top_left = camera.world_to_screen(Vec2::new(world.x, world.y));
    let zoom = camera.zoom();
    Rect::new(top_left.x, top_left.y, world.w * zoom, world.h * zoom)
}

fn draw_background(surface: &mut dyn DrawSurface, view: &SessionView<'_>) {
    let camera = view.camera;
    let map = view.store.collision_map();
    surface.fill_rect(
        DrawLayer::Background,
        screen_rect(camera, map.bounds()),
        FLOOR_COLOR,
    );
    for solid in map.solids() {
        if camera.is_rect_visible(solid) {
            surface.fill_rect(DrawLayer::Background, screen_rect(camera, *solid), SOLID_COLOR);
        }
    }
}

fn draw_ambient(surface: &mut dyn DrawSurface, view: &SessionView<'_>) {
    let camera = view.camera;
    let objects = view.store.object_states();
    let zones = objects
        .vendors()
        .map(|vendor| vendor.zone)
        .chain(objects.tables().map(|table| table.zone));
    for zone in zones {
        if camera.is_rect_visible(&zone) {
            surface.outline_rect(DrawLayer::Ambient, screen_rect(camera, zone), ZONE_GLOW_COLOR);
        }
    }
}

fn collect_fixtures(view: &SessionView<'_>, out: &mut Vec<FixtureDraw>) {
    let camera = view.camera;
    let objects = view.store.object_states();
    let mut push = |layer: DrawLayer, rect: Rect, color: Rgba, outline: bool| {
        if camera.is_rect_visible(&rect) {
            out.push(FixtureDraw {
                layer,
                rect,
                color,
                outline,
            });
        }
    };

    for teleporter in objects.teleporters() {
        let color = if teleporter.required_balance.is_some() {
            PAD_GATED_COLOR
        } else {
            PAD_COLOR
        };
        push(DrawLayer::GroundDecal, teleporter.pad, color, false);
    }
    for node in objects.nodes() {
        if node.felled {
            push(DrawLayer::GroundDecal, node.trunk, STUMP_COLOR, false);
            continue;
        }
        push(DrawLayer::Standing, node.trunk, TRUNK_COLOR, false);
        let top = node.trunk.center();
        let canopy = Rect::new(
            top.x - CANOPY_HALF_WIDTH,
            node.trunk.y - CANOPY_HEIGHT,
            CANOPY_HALF_WIDTH * 2.0,
            CANOPY_HEIGHT,
        );
        push(DrawLayer::Canopy, canopy, CANOPY_COLOR, false);
    }
    for vendor in objects.vendors() {
        let booth = Rect::centered(vendor.anchor, FIXTURE_HALF_SIZE, FIXTURE_HALF_SIZE);
        push(DrawLayer::Standing, booth, VENDOR_COLOR, false);
    }
    for table in objects.tables() {
        let top = Rect::centered(table.anchor, FIXTURE_HALF_SIZE * 1.5, FIXTURE_HALF_SIZE);
        push(DrawLayer::Standing, top, TABLE_COLOR, false);
    }
}

/// Visible pickups; over the cap, only the closest to the camera centre.
fn collect_pickups(
    view: &SessionView<'_>,
    cap: usize,
    out: &mut Vec<PickupDraw>,
    stats: &mut FrameStats,
) {
    let camera = view.camera;
    let center = camera.position();
    for pickup in view.store.object_states().pickups() {
        let rect = Rect::centered(pickup.position, PICKUP_HALF_SIZE, PICKUP_HALF_SIZE);
        if camera.is_rect_visible(&rect) {
            out.push(PickupDraw {
                id: pickup.id,
                position: pickup.position,
                distance: pickup.position.distance(center),
            });
        }
    }
    stats.pickups_total = out.len();
    if out.len() > cap {
        select_closest(out, cap, |pickup| pickup.distance);
    }
    stats.pickups_drawn = out.len();
}

fn draw_pickups(surface: &mut dyn DrawSurface, camera: &Camera2D, pickups: &[PickupDraw]) {
    for pickup in pickups {
        let rect = Rect::centered(pickup.position, PICKUP_HALF_SIZE, PICKUP_HALF_SIZE);
        trace!(pickup = pickup.id.0, "pickup_drawn");
        surface.fill_rect(DrawLayer::GroundDecal, screen_rect(camera, rect), PICKUP_COLOR);
    }
}

fn collect_entities(
    view: &SessionView<'_>,
    half_size: f32,
    out: &mut Vec<EntityDraw>,
    stats: &mut FrameStats,
) {
    let camera = view.camera;
    let mut consider = |id: EntityId, layer: DrawLayer, position: Vec2, color: Rgba| {
        let rect = Rect::centered(position, half_size, half_size);
        if camera.is_visible(rect.x, rect.y, rect.w, rect.h) {
            out.push(EntityDraw {
                layer,
                y: position.y,
                id,
                rect,
                color,
            });
        } else {
            stats.entities_culled += 1;
        }
    };

    let local = view.store.local_player();
    consider(local.id, DrawLayer::Players, local.position, LOCAL_PLAYER_COLOR);

    for entity in view.interpolator.entities() {
        let color = match entity.class {
            EntityClass::Npc => NPC_COLOR,
            EntityClass::Player if entity.harvesting => HARVESTING_COLOR,
            EntityClass::Player => REMOTE_PLAYER_COLOR,
            EntityClass::Aerial => AERIAL_COLOR,
        };
        consider(
            entity.id,
            DrawLayer::for_entity(entity.class),
            entity.render,
            color,
        );
    }
}

/// Screen-space overlays; world positions are converted once and nothing
/// after this point uses the camera transform.
fn draw_overlay(surface: &mut dyn DrawSurface, view: &SessionView<'_>, overlay: &OverlayData) {
    let camera = view.camera;
    if let InteractionState::Pending(target) = view.interaction {
        if let Some(anchor) = InteractionCoordinator::anchor_of(view.store.object_states(), *target)
        {
            let at = camera.world_to_screen(anchor);
            surface.outline_rect(
                DrawLayer::Overlay,
                Rect::centered(at, PENDING_MARKER_HALF_SIZE_PX, PENDING_MARKER_HALF_SIZE_PX),
                PENDING_MARKER_COLOR,
            );
        }
    } else if let Some(target) = view.store.click_target() {
        let at = camera.world_to_screen(target);
        surface.outline_rect(
            DrawLayer::Overlay,
            Rect::centered(at, PENDING_MARKER_HALF_SIZE_PX, PENDING_MARKER_HALF_SIZE_PX),
            PENDING_MARKER_COLOR,
        );
    }

    let viewport = camera.viewport();
    if let Some(progress) = overlay.harvest_progress {
        let left = (viewport.width as f32 - PROGRESS_BAR_WIDTH_PX) * 0.5;
        let top = viewport.height as f32 - PROGRESS_BAR_BOTTOM_OFFSET_PX;
        surface.fill_rect(
            DrawLayer::Overlay,
            Rect::new(left, top, PROGRESS_BAR_WIDTH_PX, PROGRESS_BAR_HEIGHT_PX),
            PROGRESS_BACK_COLOR,
        );
        surface.fill_rect(
            DrawLayer::Overlay,
            Rect::new(
                left,
                top,
                PROGRESS_BAR_WIDTH_PX * progress.clamp(0.0, 1.0),
                PROGRESS_BAR_HEIGHT_PX,
            ),
            PROGRESS_FILL_COLOR,
        );
    }

    if let Some(metrics) = overlay.metrics {
        let fps_width = bar_width(metrics.fps, METRICS_FPS_FULL_SCALE);
        let frame_width = bar_width(metrics.frame_time_ms, METRICS_FRAME_MS_FULL_SCALE);
        surface.fill_rect(
            DrawLayer::Overlay,
            Rect::new(
                OVERLAY_MARGIN_PX,
                OVERLAY_MARGIN_PX,
                fps_width,
                METRICS_BAR_HEIGHT_PX,
            ),
            METRICS_FPS_COLOR,
        );
        surface.fill_rect(
            DrawLayer::Overlay,
            Rect::new(
                OVERLAY_MARGIN_PX,
                OVERLAY_MARGIN_PX + METRICS_BAR_HEIGHT_PX * 2.0,
                frame_width,
                METRICS_BAR_HEIGHT_PX,
            ),
            METRICS_FRAME_COLOR,
        );
    }
}

fn bar_width(value: f32, full_scale: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    (value / full_scale).clamp(0.0, 1.0) * METRICS_BAR_MAX_WIDTH_PX
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::rendering::recording::{DrawCall, RecordingSurface};
    use crate::app::rendering::transform::Viewport;
    use crate::config::CoreConfig;
    use crate::sim::geom::Facing;
    use crate::sim::profile::InMemoryProfileService;
    use crate::sim::session::Session;
    use crate::sim::world::{
        AccountId, HarvestNode, LocalPlayerState, NodeId, Pickup, RemoteSnapshot, Vendor,
        VendorKind,
    };

    fn session() -> Session<InMemoryProfileService> {
        Session::new(
            CoreConfig::default(),
            LocalPlayerState::new(EntityId(1), AccountId("a".to_string()), Vec2::ZERO),
            Viewport {
                width: 320,
                height: 240,
            },
            InMemoryProfileService::new(),
        )
    }

    fn remote(id: u64, class: EntityClass, x: f32, y: f32) -> RemoteSnapshot {
        RemoteSnapshot {
            id: EntityId(id),
            class,
            position: Vec2::new(x, y),
            facing: Facing::Down,
            harvesting: false,
        }
    }

    fn render(
        pipeline: &mut RenderPipeline,
        surface: &mut RecordingSurface,
        session: &Session<InMemoryProfileService>,
    ) -> FrameStats {
        pipeline
            .render(surface, &session.view(), &OverlayData::default())
            .expect("render")
    }

    #[test]
    fn draw_calls_follow_fixed_layer_order() {
        let mut session = session();
        session
            .store_mut()
            .object_states_mut()
            .upsert_node(HarvestNode {
                id: NodeId(1),
                anchor: Vec2::new(20.0, 20.0),
                trunk: Rect::centered(Vec2::new(20.0, 0.0), 4.0, 4.0),
                hit_zone: Rect::centered(Vec2::new(20.0, 0.0), 10.0, 14.0),
                duration_ms: 1000.0,
                felled: false,
                occupied_by: None,
                cooldown_until_ms: None,
            })
            .expect("node");
        session
            .store_mut()
            .object_states_mut()
            .upsert_pickup(Pickup {
                id: PickupId(1),
                position: Vec2::new(-30.0, 10.0),
            })
            .expect("pickup");
        session
            .store_mut()
            .object_states_mut()
            .upsert_vendor(Vendor {
                kind: VendorKind::Dealer,
                anchor: Vec2::new(-40.0, -40.0),
                zone: Rect::centered(Vec2::new(-40.0, -40.0), 20.0, 20.0),
            })
            .expect("vendor");
        session.apply_live_snapshot([
            remote(5, EntityClass::Aerial, 10.0, 10.0),
            remote(6, EntityClass::Npc, -10.0, 30.0),
            remote(7, EntityClass::Player, 5.0, -20.0),
        ]);
        session.frame(1.0 / 60.0, &Default::default());

        let mut pipeline = RenderPipeline::new(RenderConfig::default());
        let mut surface = RecordingSurface::new();
        let overlay = OverlayData {
            metrics: Some(LoopMetricsSnapshot::default()),
            harvest_progress: Some(0.5),
        };
        pipeline
            .render(&mut surface, &session.view(), &overlay)
            .expect("render");

        assert!(matches!(surface.calls().first(), Some(DrawCall::Clear(_))));
        let layers = surface.layers();
        assert!(
            layers.windows(2).all(|pair| pair[0] <= pair[1]),
            "layers out of order: {layers:?}"
        );
        for layer in [
            DrawLayer::Background,
            DrawLayer::Ambient,
            DrawLayer::GroundDecal,
            DrawLayer::Standing,
            DrawLayer::Canopy,
            DrawLayer::BackgroundActors,
            DrawLayer::Players,
            DrawLayer::OnTop,
            DrawLayer::Overlay,
        ] {
            assert!(layers.contains(&layer), "missing {layer:?}");
        }
        assert_eq!(surface.presented(), 1);
    }

    #[test]
    fn entities_sort_by_y_within_band() {
        let mut session = session();
        session.apply_live_snapshot([
            remote(9, EntityClass::Player, 0.0, 40.0),
            remote(3, EntityClass::Player, 0.0, -40.0),
            remote(4, EntityClass::Player, 30.0, 10.0),
        ]);
        session.frame(1.0 / 60.0, &Default::default());

        let mut pipeline = RenderPipeline::new(RenderConfig::default());
        let mut surface = RecordingSurface::new();
        render(&mut pipeline, &mut surface, &session);

        let ys: Vec<f32> = surface
            .fills_on(DrawLayer::Players)
            .map(|rect| rect.center().y)
            .collect();
        assert_eq!(ys.len(), 4);
        assert!(ys.windows(2).all(|pair| pair[0] <= pair[1]), "{ys:?}");
    }

    #[test]
    fn offscreen_entities_are_culled_before_sort() {
        let mut session = session();
        session.apply_live_snapshot([
            remote(2, EntityClass::Player, 10.0, 10.0),
            remote(3, EntityClass::Player, 5000.0, 10.0),
        ]);
        session.frame(1.0 / 60.0, &Default::default());

        let mut pipeline = RenderPipeline::new(RenderConfig::default());
        let mut surface = RecordingSurface::new();
        let stats = render(&mut pipeline, &mut surface, &session);
        assert_eq!(stats.entities_drawn, 2);
        assert_eq!(stats.entities_culled, 1);
    }

    #[test]
    fn pickups_over_cap_draw_only_closest() {
        let mut session = session();
        for i in 0..20u64 {
            session
                .store_mut()
                .object_states_mut()
                .upsert_pickup(Pickup {
                    id: PickupId(i),
                    position: Vec2::new(i as f32 * 5.0, 0.0),
                })
                .expect("pickup");
        }
        let config = RenderConfig {
            pickup_draw_cap: 4,
            ..RenderConfig::default()
        };
        let mut pipeline = RenderPipeline::new(config);
        let mut surface = RecordingSurface::new();
        let stats = render(&mut pipeline, &mut surface, &session);

        assert_eq!(stats.pickups_total, 20);
        assert_eq!(stats.pickups_drawn, 4);
        let xs: Vec<f32> = surface
            .fills_on(DrawLayer::GroundDecal)
            .map(|rect| rect.center().x)
            .collect();
        // camera centred on origin with viewport 320 wide: screen x = world x + 160
        assert_eq!(xs, vec![160.0, 165.0, 170.0, 175.0]);
    }

    #[test]
    fn every_scratch_buffer_is_returned_empty() {
        let mut session = session();
        session.apply_live_snapshot([remote(2, EntityClass::Npc, 0.0, 0.0)]);
        session
            .store_mut()
            .object_states_mut()
            .upsert_pickup(Pickup {
                id: PickupId(1),
                position: Vec2::new(3.0, 3.0),
            })
            .expect("pickup");
        session.frame(1.0 / 60.0, &Default::default());

        let mut pipeline = RenderPipeline::new(RenderConfig::default());
        let mut surface = RecordingSurface::new();
        for _ in 0..5 {
            render(&mut pipeline, &mut surface, &session);
            assert_eq!(pipeline.outstanding_buffers(), 0);
            assert!(pipeline.pooled_buffers_are_empty());
        }
        assert_eq!(pipeline.pool_allocations(), 3);
    }

    #[test]
    fn unavailable_surface_skips_frame_without_leaking_buffers() {
        let session = session();
        let mut pipeline = RenderPipeline::new(RenderConfig::default());
        let mut surface = RecordingSurface::new();
        surface.set_available(false);

        let result = pipeline.render(&mut surface, &session.view(), &OverlayData::default());

        assert!(matches!(result, Err(SurfaceError::Unavailable { .. })));
        assert!(surface.calls().is_empty());
        assert_eq!(pipeline.outstanding_buffers(), 0);
    }
}
