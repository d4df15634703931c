use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::app::rendering::transform::Viewport;
use crate::app::Camera2D;
use crate::config::CoreConfig;

use super::geom::Vec2;
use super::interaction::{
    ActiveHarvestState, InteractionContext, InteractionCoordinator, InteractionState,
    InteractionTarget, Notification,
};
use super::interp::RemoteInterpolator;
use super::net::{Intent, MoveThrottle, Outbox, Transport};
use super::predictor::{DirectionKeys, MoveOutcome, MovementPredictor};
use super::profile::{BalanceReply, ProfileService};
use super::world::{
    CollisionMap, LocalPlayerState, LocalReconcile, PickupId, RemoteSnapshot, WorldStore,
};


#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub keys: DirectionKeys,
    pub zoom_steps: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub store: &'a WorldStore,
    pub interpolator: &'a RemoteInterpolator,
    pub camera: &'a Camera2D,
    pub interaction: &'a InteractionState,
}

/// The simulation context: owns the world store and every per-frame
/// component. One `frame` call is one simulation step.
pub struct Session<P> {
    config: CoreConfig,
    store: WorldStore,
    camera: Camera2D,
    predictor: MovementPredictor,
    interpolator: RemoteInterpolator,
    coordinator: InteractionCoordinator,
    outbox: Outbox,
    throttle: MoveThrottle,
    profile: P,
    notifications: Vec<Notification>,
    collected: BTreeSet<PickupId>,
    replies: Vec<BalanceReply>,
}

impl<P: ProfileService> Session<P> {
    pub fn new(config: CoreConfig, local: LocalPlayerState, viewport: Viewport, profile: P) -> Self {
        let mut camera = Camera2D::new(&config.camera, viewport);
        camera.center_on(local.position);
        Self {
            store: WorldStore::new(local),
            camera,
            predictor: MovementPredictor::new(config.movement.clone()),
            interpolator: RemoteInterpolator::new(
                config.interpolation.clone(),
                config.render.entity_half_size,
            ),
            coordinator: InteractionCoordinator::new(config.interaction.clone()),
            outbox: Outbox::new(),
            throttle: MoveThrottle::new(config.net.move_send_interval_ms),
            profile,
            notifications: Vec::new(),
            collected: BTreeSet::new(),
            replies: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> &WorldStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut WorldStore {
        &mut self.store
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    pub fn interpolator(&self) -> &RemoteInterpolator {
        &self.interpolator
    }

    pub fn interaction(&self) -> &InteractionState {
        self.coordinator.state()
    }

    pub fn active_harvest(&self) -> Option<&ActiveHarvestState> {
        self.coordinator.active_harvest()
    }

    pub fn harvest_progress(&self) -> Option<f32> {
        self.coordinator
            .active_harvest()
            .map(|harvest| harvest.progress(self.store.now_ms()))
    }

    pub fn profile(&self) -> &P {
        &self.profile
    }

    pub fn profile_mut(&mut self) -> &mut P {
        &mut self.profile
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            store: &self.store,
            interpolator: &self.interpolator,
            camera: &self.camera,
            interaction: self.coordinator.state(),
        }
    }

    pub fn handle_click_screen(&mut self, screen: Vec2) {
        let world = self.camera.screen_to_world(screen);
        self.handle_click_world(world);
    }

    /// Clicks an interactable if one is under `point`; otherwise walks there,
    /// dropping whatever interaction was in progress.
    pub fn handle_click_world(&mut self, point: Vec2) {
        if !point.is_finite() {
            return;
        }
        let hit = self
            .coordinator
            .hit_test(self.store.object_states(), point);
        let Self {
            store,
            outbox,
            profile,
            notifications,
            coordinator,
            ..
        } = self;
        let mut ctx = InteractionContext {
            store,
            transport: outbox,
            profile,
            notifications,
        };
        match hit {
            Some(target) => coordinator.click(&mut ctx, target),
            None => {
                coordinator.cancel(&mut ctx);
                ctx.store.set_click_target(Some(point));
                debug!(x = point.x, y = point.y, "click_target_set");
            }
        }
    }

    /// Closes an engaged vendor menu or table seat. Returns whether anything
    /// was open.
    pub fn dismiss_interaction(&mut self) -> bool {
        self.coordinator.dismiss()
    }

    pub fn apply_live_snapshot(&mut self, snapshots: impl IntoIterator<Item = RemoteSnapshot>) {
        self.store.apply_live_snapshot(snapshots);
    }

    /// Last-write-wins correction. A repositioned player keeps an active
    /// harvest; the anchor follows the confirmed position.
    pub fn apply_local_reconcile(&mut self, update: LocalReconcile) {
        if let Some(position) = self.store.reconcile_local(update) {
            self.coordinator.reanchor_harvest(position);
        }
    }

    pub fn change_room(&mut self, room: impl Into<String>, map: CollisionMap, spawn: Vec2) {
        let room = room.into();
        self.coordinator.reset();
        self.store.enter_room(room.clone(), map, spawn);
        self.interpolator.clear();
        self.throttle.reset();
        self.collected.clear();
        self.replies.clear();
        self.camera.center_on(self.store.local_player().position);
        info!(room = %room, "room_entered");
    }

    pub fn take_outbound(&mut self) -> Vec<Intent> {
        self.outbox.drain()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// One simulation step: gate replies, movement, interaction checks,
    /// camera follow, then remote interpolation.
    pub fn frame(&mut self, dt_seconds: f32, input: &FrameInput) -> MoveOutcome {
        self.store.advance_clock(dt_seconds);
        self.camera.apply_zoom_steps(input.zoom_steps);

        let Self {
            store,
            outbox,
            profile,
            notifications,
            coordinator,
            predictor,
            throttle,
            replies,
            ..
        } = self;

        profile.drain_replies(replies);
        let mut ctx = InteractionContext {
            store,
            transport: outbox,
            profile,
            notifications,
        };
        if !replies.is_empty() {
            coordinator.apply_balance_replies(&mut ctx, replies.drain(..));
        }

        if input.keys.any() {
            coordinator.cancel(&mut ctx);
        }

        let harvest_focus = coordinator.active_harvest().and_then(|harvest| {
            ctx.store
                .object_states()
                .node(harvest.node_id)
                .map(|node| node.trunk.center())
        });
        let had_click_target = ctx.store.click_target().is_some();
        let facing_before = ctx.store.local_player().facing;
        let outcome = predictor.advance(ctx.store, input.keys, harvest_focus, dt_seconds);
        if had_click_target && !outcome.moved && ctx.store.click_target().is_some() {
            debug!(x = outcome.position.x, y = outcome.position.y, "click_target_unreachable");
            ctx.store.set_click_target(None);
        }

        // turning in place is reported too
        if let Some(intent) = throttle.update(
            ctx.store.now_ms(),
            outcome.moved || outcome.facing != facing_before,
            outcome.position,
            outcome.facing,
        ) {
            ctx.transport.send(intent);
        }

        coordinator.update(&mut ctx);

        self.collect_nearby_pickups();
        self.camera
            .pan(self.store.local_player().position, dt_seconds);
        self.interpolator.sync(self.store.live_entities());
        self.interpolator.advance(dt_seconds, &self.camera);
        outcome
    }

    fn collect_nearby_pickups(&mut self) {
        let objects = self.store.object_states();
        self.collected.retain(|id| objects.pickup(*id).is_some());

        let position = self.store.local_player().position;
        let radius = self.config.interaction.pickup_radius;
        for pickup in objects.pickups() {
            if pickup.position.distance(position) <= radius && self.collected.insert(pickup.id) {
                self.outbox.send(Intent::Collect { pickup: pickup.id });
            }
        }
    }

    pub fn pending_target(&self) -> Option<InteractionTarget> {
        self.coordinator.pending_target()
    }
}
