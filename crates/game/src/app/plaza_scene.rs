use std::collections::BTreeMap;

use plaza_engine::{
    AccountId, Facing, HarvestNode, InMemoryProfileService, InteractTarget, Intent,
    LocalReconcile, MoveOutcome, NodeId, Pickup, PickupId, ProfileService, Rect, RemoteSnapshot,
    Scene, SceneCommand, Session, Teleporter, TeleporterId, Vec2,
};
use tracing::{debug, info, warn};

use super::profile_worker::ProfileWorker;
use super::room_layout::{BotLayout, RoomLayout};

const RETURN_PAD_ID: TeleporterId = TeleporterId(0);
const RETURN_PAD_OFFSET: f32 = 48.0;
const RETURN_PAD_HALF: f32 = 20.0;

/// Where the authority persists balances it changes.
pub(crate) trait BalanceLedger {
    fn persist_balance(&mut self, account: &AccountId, balance: u64);
}

impl BalanceLedger for ProfileWorker {
    fn persist_balance(&mut self, account: &AccountId, balance: u64) {
        self.set_balance(account, balance);
    }
}

impl BalanceLedger for InMemoryProfileService {
    fn persist_balance(&mut self, account: &AccountId, balance: u64) {
        self.set_balance(account, balance);
    }
}

#[derive(Debug, Clone)]
struct Bot {
    layout: BotLayout,
    position: Vec2,
    facing: Facing,
    next_waypoint: usize,
}

impl Bot {
    fn new(layout: BotLayout) -> Self {
        let position = layout.waypoints.first().copied().unwrap_or(Vec2::ZERO);
        let next_waypoint = 1 % layout.waypoints.len().max(1);
        Self {
            layout,
            position,
            facing: Facing::Down,
            next_waypoint,
        }
    }

    /// Walks the patrol loop; a single waypoint parks the bot.
    fn advance(&mut self, dt_seconds: f32) {
        let waypoints = &self.layout.waypoints;
        if waypoints.len() < 2 || self.layout.speed <= 0.0 {
            return;
        }
        let target = waypoints[self.next_waypoint];
        let delta = target - self.position;
        let distance = delta.length();
        let step = self.layout.speed * dt_seconds;
        if distance <= step {
            self.position = target;
            self.next_waypoint = (self.next_waypoint + 1) % waypoints.len();
        } else {
            self.position = self.position + delta * (step / distance);
        }
        if let Some(facing) = Facing::from_delta(delta) {
            self.facing = facing;
        }
    }

    fn snapshot(&self) -> RemoteSnapshot {
        RemoteSnapshot {
            id: self.layout.id,
            class: self.layout.class,
            position: self.position,
            facing: self.facing,
            harvesting: self.layout.harvests.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PickupRespawn {
    position: Vec2,
    due_ms: f64,
}

/// Offline stand-in for the game server: owns the authoritative object
/// state, scripts the bots and answers the local player's intents.
pub(crate) struct PlazaScene {
    layout: RoomLayout,
    room: String,
    nodes: BTreeMap<NodeId, HarvestNode>,
    pickups: BTreeMap<PickupId, Pickup>,
    respawns: Vec<PickupRespawn>,
    next_pickup_id: u64,
    bots: Vec<Bot>,
    balance: u64,
}

impl PlazaScene {
    pub(crate) fn new(layout: RoomLayout) -> Self {
        let mut nodes: BTreeMap<NodeId, HarvestNode> = layout
            .nodes
            .iter()
            .map(|node| (node.id, node.clone()))
            .collect();
        for bot in &layout.bots {
            if let Some(node) = bot.harvests.and_then(|id| nodes.get_mut(&id)) {
                node.occupied_by = Some(bot.id);
            }
        }
        let mut scene = Self {
            room: layout.room.clone(),
            nodes,
            pickups: BTreeMap::new(),
            respawns: Vec::new(),
            next_pickup_id: 1,
            bots: layout.bots.iter().cloned().map(Bot::new).collect(),
            balance: layout.economy.starting_balance,
            layout,
        };
        let spawns = scene.layout.pickups.clone();
        for position in spawns {
            scene.spawn_pickup(position);
        }
        scene
    }

    pub(crate) fn room(&self) -> &str {
        &self.room
    }

    pub(crate) fn balance(&self) -> u64 {
        self.balance
    }

    fn in_home_room(&self) -> bool {
        self.room == self.layout.room
    }

    fn spawn_pickup(&mut self, position: Vec2) -> Pickup {
        let pickup = Pickup {
            id: PickupId(self.next_pickup_id),
            position,
        };
        self.next_pickup_id += 1;
        self.pickups.insert(pickup.id, pickup.clone());
        pickup
    }

    fn return_pad(&self, arrival: Vec2) -> Teleporter {
        let anchor = arrival + Vec2::new(0.0, RETURN_PAD_OFFSET);
        Teleporter {
            id: RETURN_PAD_ID,
            anchor,
            pad: Rect::centered(anchor, RETURN_PAD_HALF, RETURN_PAD_HALF),
            destination: self.layout.room.clone(),
            required_balance: None,
        }
    }

    fn enter_room<P: ProfileService>(
        &mut self,
        session: &mut Session<P>,
        room: String,
        arrival: Vec2,
    ) {
        let map = match self.layout.collision_map() {
            Ok(map) => map,
            Err(error) => {
                warn!(error = %error, room = %room, "room_geometry_invalid");
                return;
            }
        };
        session.change_room(room.clone(), map, arrival);
        self.room = room;

        if !self.in_home_room() {
            // Side rooms hold nothing but the way back.
            let pad = self.return_pad(arrival);
            if let Err(error) = session
                .store_mut()
                .object_states_mut()
                .upsert_teleporter(pad)
            {
                warn!(error = %error, "return_pad_rejected");
            }
            return;
        }

        let objects = session.store_mut().object_states_mut();
        let mut rejected = Vec::new();
        for node in self.nodes.values() {
            rejected.extend(objects.upsert_node(node.clone()).err());
        }
        for vendor in &self.layout.vendors {
            rejected.extend(objects.upsert_vendor(vendor.clone()).err());
        }
        for teleporter in &self.layout.teleporters {
            rejected.extend(objects.upsert_teleporter(teleporter.clone()).err());
        }
        for table in &self.layout.tables {
            rejected.extend(objects.upsert_table(table.clone()).err());
        }
        for pickup in self.pickups.values() {
            rejected.extend(objects.upsert_pickup(pickup.clone()).err());
        }
        for error in rejected {
            warn!(error = %error, "room_object_rejected");
        }
        session.apply_live_snapshot(self.bots.iter().map(Bot::snapshot));
    }

    fn publish_node<P: ProfileService>(&self, session: &mut Session<P>, id: NodeId) {
        if !self.in_home_room() {
            return;
        }
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if let Err(error) = session
            .store_mut()
            .object_states_mut()
            .upsert_node(node.clone())
        {
            warn!(error = %error, node = id.0, "node_update_rejected");
        }
    }

    fn credit<P: ProfileService + BalanceLedger>(&mut self, session: &mut Session<P>, amount: u64) {
        self.balance = self.balance.saturating_add(amount);
        self.sync_balance(session);
        debug!(amount, balance = self.balance, "balance_credited");
    }

    fn sync_balance<P: ProfileService + BalanceLedger>(&self, session: &mut Session<P>) {
        let account = session.store().local_player().account.clone();
        session.profile_mut().persist_balance(&account, self.balance);
        session.apply_local_reconcile(LocalReconcile {
            balance: Some(self.balance),
            ..LocalReconcile::default()
        });
    }

    /// Regrows felled nodes and respawns pickups whose timers ran out.
    fn refresh_world<P: ProfileService>(&mut self, session: &mut Session<P>, now_ms: f64) {
        let regrown: Vec<NodeId> = self
            .nodes
            .values_mut()
            .filter(|node| node.felled && node.cooldown_remaining_ms(now_ms).is_none())
            .map(|node| {
                node.felled = false;
                node.cooldown_until_ms = None;
                node.id
            })
            .collect();
        for id in regrown {
            info!(node = id.0, "node_regrown");
            self.publish_node(session, id);
        }

        let (due, pending): (Vec<_>, Vec<_>) = self
            .respawns
            .drain(..)
            .partition(|respawn| respawn.due_ms <= now_ms);
        self.respawns = pending;
        for respawn in due {
            let pickup = self.spawn_pickup(respawn.position);
            if !self.in_home_room() {
                continue;
            }
            if let Err(error) = session
                .store_mut()
                .object_states_mut()
                .upsert_pickup(pickup)
            {
                warn!(error = %error, "pickup_respawn_rejected");
            }
        }
    }

    fn apply_intent<P: ProfileService + BalanceLedger>(
        &mut self,
        session: &mut Session<P>,
        intent: Intent,
    ) {
        let local = session.store().local_player().id;
        let now_ms = session.store().now_ms();
        match intent {
            Intent::Move { position, facing } => {
                debug!(x = position.x, y = position.y, facing = ?facing, "move_received");
            }
            Intent::Collect { pickup } => {
                let Some(collected) = self.pickups.remove(&pickup) else {
                    debug!(pickup = pickup.0, "collect_rejected");
                    return;
                };
                session
                    .store_mut()
                    .object_states_mut()
                    .remove_pickup(pickup);
                self.respawns.push(PickupRespawn {
                    position: collected.position,
                    due_ms: now_ms + self.layout.economy.pickup_respawn_ms,
                });
                self.credit(session, self.layout.economy.pickup_value);
            }
            Intent::BeginHarvest { node } => {
                let Some(state) = self.nodes.get_mut(&node) else {
                    return;
                };
                if state.felled || state.occupied_by.is_some_and(|by| by != local) {
                    warn!(node = node.0, "harvest_begin_refused");
                    return;
                }
                state.occupied_by = Some(local);
                self.publish_node(session, node);
            }
            Intent::CompleteHarvest { node } => {
                let Some(state) = self.nodes.get_mut(&node) else {
                    return;
                };
                if state.occupied_by != Some(local) {
                    warn!(node = node.0, "harvest_complete_refused");
                    return;
                }
                state.felled = true;
                state.occupied_by = None;
                state.cooldown_until_ms = Some(now_ms + self.layout.economy.node_cooldown_ms);
                self.publish_node(session, node);
                self.credit(session, self.layout.economy.harvest_reward);
                info!(node = node.0, balance = self.balance, "node_felled");
            }
            Intent::CancelHarvest { node } => {
                if let Some(state) = self.nodes.get_mut(&node) {
                    if state.occupied_by == Some(local) {
                        state.occupied_by = None;
                        self.publish_node(session, node);
                    }
                }
            }
            Intent::Interact {
                target: InteractTarget::Teleporter(id),
            } => self.teleport(session, id),
            Intent::Interact {
                target: InteractTarget::Vendor(kind),
            } => {
                info!(vendor = ?kind, balance = self.balance, "vendor_menu_opened");
            }
            Intent::JoinSeatedGame { table } => {
                info!(table = table.0, "seated_game_joined");
            }
        }
    }

    /// The gate is checked again against the authoritative balance; the
    /// client may have acted on a stale one.
    fn teleport<P: ProfileService>(&mut self, session: &mut Session<P>, id: TeleporterId) {
        if id == RETURN_PAD_ID && !self.in_home_room() {
            let room = self.layout.room.clone();
            let spawn = self.layout.spawn;
            self.enter_room(session, room, spawn);
            return;
        }
        let Some(teleporter) = self.layout.teleporters.iter().find(|t| t.id == id) else {
            warn!(teleporter = id.0, "teleporter_unknown");
            return;
        };
        if teleporter
            .required_balance
            .is_some_and(|required| self.balance < required)
        {
            warn!(teleporter = id.0, balance = self.balance, "teleport_refused");
            return;
        }
        let destination = teleporter.destination.clone();
        let Some(arrival) = self.layout.arrival(&destination) else {
            warn!(teleporter = id.0, destination = %destination, "teleport_destination_unknown");
            return;
        };
        self.enter_room(session, destination, arrival);
    }
}

impl<P: ProfileService + BalanceLedger> Scene<P> for PlazaScene {
    fn load(&mut self, session: &mut Session<P>) {
        self.sync_balance(session);
        let room = self.layout.room.clone();
        let spawn = self.layout.spawn;
        self.enter_room(session, room, spawn);
    }

    fn before_frame(&mut self, session: &mut Session<P>, dt_seconds: f32) -> SceneCommand {
        let now_ms = session.store().now_ms();
        self.refresh_world(session, now_ms);
        if self.in_home_room() {
            for bot in &mut self.bots {
                bot.advance(dt_seconds);
            }
            session.apply_live_snapshot(self.bots.iter().map(Bot::snapshot));
        }
        SceneCommand::None
    }

    fn after_frame(&mut self, session: &mut Session<P>, _outcome: &MoveOutcome) {
        for intent in session.take_outbound() {
            self.apply_intent(session, intent);
        }
        for notification in session.drain_notifications() {
            info!(notification = ?notification, "notification");
        }
    }

    fn unload(&mut self, _session: &mut Session<P>) {
        info!(room = %self.room, balance = self.balance, "plaza_unloaded");
    }

    fn title(&self, _session: &Session<P>) -> Option<String> {
        Some(format!("Plaza | {} | balance {}", self.room(), self.balance()))
    }
}

#[cfg(test)]
mod tests {
    use plaza_engine::{
        CoreConfig, EntityClass, EntityId, FrameInput, InteractionState, LocalPlayerState,
        Notification, Viewport,
    };

    use super::*;

    type TestSession = Session<InMemoryProfileService>;

    fn loaded() -> (PlazaScene, TestSession) {
        let layout = RoomLayout::builtin().expect("builtin layout");
        let mut session = Session::new(
            CoreConfig::default(),
            LocalPlayerState::new(EntityId(1), AccountId("local".to_string()), layout.spawn),
            Viewport {
                width: 960,
                height: 540,
            },
            InMemoryProfileService::new(),
        );
        let mut scene = PlazaScene::new(layout);
        scene.load(&mut session);
        (scene, session)
    }

    fn step(scene: &mut PlazaScene, session: &mut TestSession) {
        let dt = 0.1;
        scene.before_frame(session, dt);
        let outcome = session.frame(dt, &FrameInput::default());
        scene.after_frame(session, &outcome);
    }

    fn place_local(session: &mut TestSession, position: Vec2) {
        session.apply_local_reconcile(LocalReconcile {
            position: Some(position),
            ..LocalReconcile::default()
        });
    }

    fn node(session: &TestSession, id: u32) -> HarvestNode {
        session
            .store()
            .object_states()
            .node(NodeId(id))
            .cloned()
            .expect("node present")
    }

    #[test]
    fn load_populates_the_home_room() {
        let (scene, session) = loaded();
        let store = session.store();
        assert_eq!(store.room(), "plaza");
        assert_eq!(store.object_states().nodes().count(), 3);
        assert_eq!(store.object_states().pickup_count(), 5);
        assert_eq!(store.live_entities().len(), 4);
        assert_eq!(store.local_player().balance, 10);
        assert_eq!(scene.balance(), 10);
        assert_eq!(node(&session, 3).occupied_by, Some(EntityId(103)));
    }

    #[test]
    fn collecting_credits_balance_and_pickup_respawns() {
        let (mut scene, mut session) = loaded();
        place_local(&mut session, Vec2::new(-60.0, 100.0));
        step(&mut scene, &mut session);

        assert_eq!(scene.balance(), 35);
        assert_eq!(session.store().local_player().balance, 35);
        assert_eq!(session.store().object_states().pickup_count(), 4);

        place_local(&mut session, Vec2::new(0.0, 60.0));
        for _ in 0..81 {
            step(&mut scene, &mut session);
        }
        assert_eq!(session.store().object_states().pickup_count(), 5);
        assert_eq!(scene.balance(), 35);
    }

    #[test]
    fn harvest_runs_to_completion_and_node_regrows() {
        let (mut scene, mut session) = loaded();
        place_local(&mut session, Vec2::new(-200.0, -104.0));
        session.handle_click_world(Vec2::new(-200.0, -126.0));
        assert!(session.active_harvest().is_some());

        step(&mut scene, &mut session);
        assert_eq!(node(&session, 1).occupied_by, Some(EntityId(1)));

        for _ in 0..26 {
            step(&mut scene, &mut session);
        }
        let felled = node(&session, 1);
        assert!(felled.felled);
        assert_eq!(felled.occupied_by, None);
        assert!(session.active_harvest().is_none());
        assert_eq!(scene.balance(), 160);
        assert_eq!(session.store().local_player().balance, 160);

        for _ in 0..151 {
            step(&mut scene, &mut session);
        }
        let regrown = node(&session, 1);
        assert!(!regrown.felled);
        assert_eq!(regrown.cooldown_until_ms, None);
    }

    #[test]
    fn walking_to_a_node_from_the_north_starts_the_harvest() {
        let (mut scene, mut session) = loaded();
        place_local(&mut session, Vec2::new(-200.0, -250.0));
        session.handle_click_world(Vec2::new(-200.0, -120.0));

        for _ in 0..12 {
            step(&mut scene, &mut session);
            if session.active_harvest().is_some() {
                break;
            }
        }

        assert!(session.active_harvest().is_some());
        let position = session.store().local_player().position;
        assert!(position.y < -122.0);
        assert_eq!(node(&session, 1).occupied_by, Some(EntityId(1)));
    }

    #[test]
    fn node_held_by_a_bot_is_refused() {
        let (mut scene, mut session) = loaded();
        place_local(&mut session, Vec2::new(-170.0, -44.0));
        session.handle_click_world(Vec2::new(-170.0, -66.0));

        assert!(session.active_harvest().is_none());
        assert!(session
            .drain_notifications()
            .contains(&Notification::NodeBusy { node: NodeId(3) }));
        step(&mut scene, &mut session);
        assert_eq!(node(&session, 3).occupied_by, Some(EntityId(103)));
    }

    #[test]
    fn open_teleporter_moves_to_destination_and_back() {
        let (mut scene, mut session) = loaded();
        place_local(&mut session, Vec2::new(-380.0, 200.0));
        session.handle_click_world(Vec2::new(-380.0, 200.0));
        step(&mut scene, &mut session);

        assert_eq!(scene.room(), "garden");
        assert_eq!(session.store().room(), "garden");
        assert_eq!(
            session.store().local_player().position,
            Vec2::new(-300.0, 0.0)
        );
        assert!(session.store().live_entities().is_empty());
        assert_eq!(session.store().object_states().teleporters().count(), 1);

        place_local(&mut session, Vec2::new(-300.0, 48.0));
        session.handle_click_world(Vec2::new(-300.0, 48.0));
        step(&mut scene, &mut session);

        assert_eq!(session.store().room(), "plaza");
        assert_eq!(
            session.store().local_player().position,
            Vec2::new(0.0, 60.0)
        );
        assert_eq!(session.store().object_states().nodes().count(), 3);
    }

    #[test]
    fn gated_teleporter_waits_for_balance() {
        let (mut scene, mut session) = loaded();
        place_local(&mut session, Vec2::new(380.0, 200.0));
        session.handle_click_world(Vec2::new(380.0, 200.0));
        assert!(matches!(
            session.interaction(),
            InteractionState::AwaitingGate(_)
        ));

        session.profile_mut().deliver_all();
        step(&mut scene, &mut session);
        assert_eq!(session.store().room(), "plaza");
        assert_eq!(session.interaction(), &InteractionState::Idle);

        scene.balance = 6_000_000;
        scene.sync_balance(&mut session);
        session.handle_click_world(Vec2::new(380.0, 200.0));
        session.profile_mut().deliver_all();
        step(&mut scene, &mut session);
        assert_eq!(session.store().room(), "vault");
        assert_eq!(
            session.store().local_player().position,
            Vec2::new(300.0, 0.0)
        );
    }

    #[test]
    fn authority_refuses_gate_below_requirement() {
        let (mut scene, mut session) = loaded();
        scene.apply_intent(
            &mut session,
            Intent::Interact {
                target: InteractTarget::Teleporter(TeleporterId(2)),
            },
        );
        assert_eq!(scene.room(), "plaza");
        assert_eq!(session.store().room(), "plaza");
    }

    #[test]
    fn patrolling_bot_moves_at_its_speed() {
        let mut bot = Bot::new(BotLayout {
            id: EntityId(9),
            class: EntityClass::Npc,
            speed: 40.0,
            waypoints: vec![Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0)],
            harvests: None,
        });
        bot.advance(0.5);
        assert!((bot.position.x - 20.0).abs() < 0.001);
        assert_eq!(bot.facing, Facing::Right);

        bot.advance(3.0);
        assert_eq!(bot.position, Vec2::new(100.0, 0.0));
        assert_eq!(bot.next_waypoint, 0);
    }

    #[test]
    fn parked_bot_stays_put() {
        let mut bot = Bot::new(BotLayout {
            id: EntityId(9),
            class: EntityClass::Player,
            speed: 0.0,
            waypoints: vec![Vec2::new(3.0, 4.0)],
            harvests: Some(NodeId(1)),
        });
        bot.advance(1.0);
        assert_eq!(bot.position, Vec2::new(3.0, 4.0));
        assert!(bot.snapshot().harvesting);
    }
}
