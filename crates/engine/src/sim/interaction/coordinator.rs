use tracing::{debug, info, warn};

use crate::config::InteractionConfig;
use crate::sim::geom::Vec2;
use crate::sim::net::{InteractTarget, Intent, Transport};
use crate::sim::profile::{BalanceReply, ProfileService};
use crate::sim::world::{LocalReconcile, NodeId, ObjectStates, TeleporterId, WorldStore};

use super::gate::BalanceGate;
use super::harvest::{admit, ActiveHarvestState, HarvestRejection};
use super::{InteractionTarget, Notification};

pub struct InteractionContext<'a> {
    pub store: &'a mut WorldStore,
    pub transport: &'a mut dyn Transport,
    pub profile: &'a mut dyn ProfileService,
    pub notifications: &'a mut Vec<Notification>,
}

impl InteractionContext<'_> {
    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}

/// The single interaction slot. Only one variant can be held at a time, so
/// two concurrent pending interactions cannot exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InteractionState {
    #[default]
    Idle,
    Pending(InteractionTarget),
    AwaitingGate(InteractionTarget),
    Harvesting(ActiveHarvestState),
    // triggered and still open
    Engaged(InteractionTarget),
}

impl InteractionState {
    pub fn target(&self) -> Option<InteractionTarget> {
        match self {
            Self::Idle => None,
            Self::Pending(target) | Self::AwaitingGate(target) | Self::Engaged(target) => {
                Some(*target)
            }
            Self::Harvesting(harvest) => Some(InteractionTarget::HarvestNode(harvest.node_id)),
        }
    }
}

#[derive(Debug)]
pub struct InteractionCoordinator {
    config: InteractionConfig,
    state: InteractionState,
    gate: BalanceGate,
}

impl InteractionCoordinator {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            state: InteractionState::Idle,
            gate: BalanceGate::new(),
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn active_harvest(&self) -> Option<&ActiveHarvestState> {
        match &self.state {
            InteractionState::Harvesting(harvest) => Some(harvest),
            _ => None,
        }
    }

    pub fn pending_target(&self) -> Option<InteractionTarget> {
        match self.state {
            InteractionState::Pending(target) => Some(target),
            _ => None,
        }
    }

    pub fn radius(&self, target: InteractionTarget) -> f32 {
        match target {
            InteractionTarget::HarvestNode(_) => self.config.harvest_radius,
            InteractionTarget::Vendor(_) => self.config.vendor_radius,
            InteractionTarget::Teleporter(_) => self.config.teleporter_radius,
            InteractionTarget::SeatedGame(_) => self.config.table_radius,
        }
    }

    /// Fixed priority: seated-game tables, then harvest nodes, then
    /// teleporters, then vendor zones. Within a kind the anchor nearest to
    /// the click wins; ties go to the lowest id.
    pub fn hit_test(&self, objects: &ObjectStates, point: Vec2) -> Option<InteractionTarget> {
        fn nearest<'a, T: 'a>(
            items: impl Iterator<Item = &'a T>,
            point: Vec2,
            hit: impl Fn(&T) -> bool,
            anchor: impl Fn(&T) -> Vec2,
        ) -> Option<&'a T> {
            items.filter(|item| hit(*item)).min_by(|a, b| {
                anchor(*a)
                    .distance(point)
                    .total_cmp(&anchor(*b).distance(point))
            })
        }

        if let Some(table) = nearest(
            objects.tables(),
            point,
            |t| t.zone.contains(point),
            |t| t.anchor,
        ) {
            return Some(InteractionTarget::SeatedGame(table.id));
        }
        if let Some(node) = nearest(
            objects.nodes(),
            point,
            |n| n.hit_zone.contains(point),
            |n| n.anchor,
        ) {
            return Some(InteractionTarget::HarvestNode(node.id));
        }
        if let Some(teleporter) = nearest(
            objects.teleporters(),
            point,
            |t| t.pad.contains(point),
            |t| t.anchor,
        ) {
            return Some(InteractionTarget::Teleporter(teleporter.id));
        }
        nearest(
            objects.vendors(),
            point,
            |v| v.zone.contains(point),
            |v| v.anchor,
        )
        .map(|vendor| InteractionTarget::Vendor(vendor.kind))
    }

    pub fn anchor_of(objects: &ObjectStates, target: InteractionTarget) -> Option<Vec2> {
        match target {
            InteractionTarget::HarvestNode(id) => objects.node(id).map(|n| n.anchor),
            InteractionTarget::Vendor(kind) => objects.vendor(kind).map(|v| v.anchor),
            InteractionTarget::Teleporter(id) => objects.teleporter(id).map(|t| t.anchor),
            InteractionTarget::SeatedGame(id) => objects.table(id).map(|t| t.anchor),
        }
    }

    /// Click on an interactable. Re-clicking the target already held is a
    /// no-op; anything else replaces the current interaction.
    pub fn click(&mut self, ctx: &mut InteractionContext<'_>, target: InteractionTarget) {
        if self.state.target() == Some(target) {
            debug!(target = ?target, "interaction_reclick_ignored");
            return;
        }
        self.cancel(ctx);

        let Some(anchor) = Self::anchor_of(ctx.store.object_states(), target) else {
            debug!(target = ?target, "interaction_target_missing");
            return;
        };
        let position = ctx.store.local_player().position;
        if position.distance(anchor) <= self.radius(target) {
            self.trigger(ctx, target);
        } else {
            ctx.store.set_click_target(Some(anchor));
            self.state = InteractionState::Pending(target);
            debug!(target = ?target, x = anchor.x, y = anchor.y, "interaction_pending");
        }
    }

    /// Tears down whatever the slot holds. An active harvest tells the
    /// authority; everything else is local.
    pub fn cancel(&mut self, ctx: &mut InteractionContext<'_>) {
        let previous = std::mem::take(&mut self.state);
        match previous {
            InteractionState::Idle => return,
            InteractionState::Harvesting(harvest) => {
                ctx.transport.send(Intent::CancelHarvest {
                    node: harvest.node_id,
                });
                let local = ctx.store.local_player().id;
                ctx.store.set_harvest_flag_for_entity(local, false);
                ctx.notify(Notification::HarvestCancelled {
                    node: harvest.node_id,
                });
                info!(node = harvest.node_id.0, "harvest_cancelled");
            }
            InteractionState::AwaitingGate(_) => self.gate.invalidate(),
            InteractionState::Pending(_) | InteractionState::Engaged(_) => {}
        }
        ctx.store.set_click_target(None);
    }

    pub fn dismiss(&mut self) -> bool {
        let InteractionState::Engaged(target) = self.state else {
            return false;
        };
        self.state = InteractionState::Idle;
        info!(target = ?target, "interaction_dismissed");
        true
    }

    /// Drops all interaction state without telling the authority.
    pub fn reset(&mut self) {
        self.state = InteractionState::Idle;
        self.gate.invalidate();
    }

    pub fn reanchor_harvest(&mut self, position: Vec2) {
        if let InteractionState::Harvesting(harvest) = &mut self.state {
            debug!(node = harvest.node_id.0, x = position.x, y = position.y, "harvest_reanchored");
            harvest.anchor = position;
        }
    }

    pub fn apply_balance_replies(
        &mut self,
        ctx: &mut InteractionContext<'_>,
        replies: impl IntoIterator<Item = BalanceReply>,
    ) {
        for reply in replies {
            let Some((teleporter_id, result)) = self.gate.resolve(reply) else {
                continue;
            };
            let target = InteractionTarget::Teleporter(teleporter_id);
            if self.state != InteractionState::AwaitingGate(target) {
                continue;
            }
            let balance = match result {
                Ok(balance) => {
                    ctx.store.reconcile_local(LocalReconcile {
                        balance: Some(balance),
                        ..Default::default()
                    });
                    balance
                }
                Err(error) => {
                    let cached = ctx.store.local_player().balance;
                    warn!(error = %error, cached, "balance_lookup_failed_using_cache");
                    cached
                }
            };
            let Some(teleporter) = ctx.store.object_states().teleporter(teleporter_id) else {
                self.state = InteractionState::Idle;
                continue;
            };
            let required = teleporter.required_balance.unwrap_or(0);
            if balance >= required {
                let destination = teleporter.destination.clone();
                self.engage_teleporter(ctx, teleporter_id, destination);
            } else {
                self.state = InteractionState::Idle;
                ctx.store.set_click_target(None);
                ctx.notify(Notification::GateRejected {
                    teleporter: teleporter_id,
                    balance,
                    required,
                });
                info!(
                    teleporter = teleporter_id.0,
                    balance, required, "gate_rejected"
                );
            }
        }
    }

    pub fn update(&mut self, ctx: &mut InteractionContext<'_>) {
        match self.state.clone() {
            InteractionState::Idle => {}
            InteractionState::Pending(target) => self.update_pending(ctx, target),
            InteractionState::AwaitingGate(target) => {
                if Self::anchor_of(ctx.store.object_states(), target).is_none() {
                    debug!(target = ?target, "interaction_target_vanished");
                    self.gate.invalidate();
                    self.state = InteractionState::Idle;
                    ctx.store.set_click_target(None);
                }
            }
            InteractionState::Harvesting(harvest) => self.update_harvest(ctx, harvest),
            InteractionState::Engaged(target) => {
                if Self::anchor_of(ctx.store.object_states(), target).is_none() {
                    debug!(target = ?target, "interaction_target_vanished");
                    self.state = InteractionState::Idle;
                }
            }
        }
    }

    fn update_pending(&mut self, ctx: &mut InteractionContext<'_>, target: InteractionTarget) {
        let Some(anchor) = Self::anchor_of(ctx.store.object_states(), target) else {
            debug!(target = ?target, "interaction_target_vanished");
            self.state = InteractionState::Idle;
            ctx.store.set_click_target(None);
            return;
        };
        let position = ctx.store.local_player().position;
        if position.distance(anchor) <= self.radius(target) {
            self.trigger(ctx, target);
            return;
        }
        match ctx.store.click_target() {
            Some(aim) if aim != anchor => ctx.store.set_click_target(Some(anchor)),
            Some(_) => {}
            None => {
                info!(target = ?target, "interaction_unreachable");
                self.state = InteractionState::Idle;
                ctx.notify(Notification::Unreachable(target));
            }
        }
    }

    fn update_harvest(&mut self, ctx: &mut InteractionContext<'_>, harvest: ActiveHarvestState) {
        let local = ctx.store.local_player().id;
        let node_usable = ctx
            .store
            .object_states()
            .node(harvest.node_id)
            .is_some_and(|node| !node.felled);
        if !node_usable {
            debug!(node = harvest.node_id.0, "harvest_target_vanished");
            self.state = InteractionState::Idle;
            ctx.store.set_harvest_flag_for_entity(local, false);
            ctx.store.set_click_target(None);
            return;
        }
        let position = ctx.store.local_player().position;
        if harvest.has_drifted(position, self.config.harvest_anchor_tolerance) {
            self.cancel(ctx);
            return;
        }
        if harvest.is_complete(ctx.store.now_ms()) {
            self.state = InteractionState::Idle;
            ctx.transport.send(Intent::CompleteHarvest {
                node: harvest.node_id,
            });
            ctx.store.set_harvest_flag_for_entity(local, false);
            ctx.store.set_click_target(None);
            ctx.notify(Notification::HarvestCompleted {
                node: harvest.node_id,
            });
            info!(node = harvest.node_id.0, "harvest_completed");
        }
    }

    fn trigger(&mut self, ctx: &mut InteractionContext<'_>, target: InteractionTarget) {
        ctx.store.set_click_target(None);
        self.state = InteractionState::Idle;
        match target {
            InteractionTarget::HarvestNode(node_id) => self.begin_harvest(ctx, node_id),
            InteractionTarget::Vendor(kind) => {
                ctx.transport.send(Intent::Interact {
                    target: InteractTarget::Vendor(kind),
                });
                ctx.notify(Notification::VendorOpened(kind));
                self.state = InteractionState::Engaged(target);
                info!(vendor = ?kind, "vendor_opened");
            }
            InteractionTarget::Teleporter(id) => {
                let Some(teleporter) = ctx.store.object_states().teleporter(id) else {
                    return;
                };
                if teleporter.required_balance.is_some() {
                    let account = ctx.store.local_player().account.clone();
                    self.gate.begin(ctx.profile, &account, id);
                    self.state = InteractionState::AwaitingGate(target);
                } else {
                    let destination = teleporter.destination.clone();
                    self.engage_teleporter(ctx, id, destination);
                }
            }
            InteractionTarget::SeatedGame(table) => {
                ctx.transport.send(Intent::JoinSeatedGame { table });
                ctx.notify(Notification::SeatedAtTable { table });
                self.state = InteractionState::Engaged(target);
                info!(table = table.0, "seated_game_joined");
            }
        }
    }

    fn begin_harvest(&mut self, ctx: &mut InteractionContext<'_>, node_id: NodeId) {
        let local = ctx.store.local_player().id;
        let now_ms = ctx.store.now_ms();
        let Some(node) = ctx.store.object_states().node(node_id) else {
            return;
        };
        if let Err(rejection) = admit(node, local, now_ms) {
            let notification = match rejection {
                HarvestRejection::Cooldown { remaining_ms } => Notification::CooldownActive {
                    node: node_id,
                    remaining_ms,
                },
                HarvestRejection::Felled => Notification::NodeFelled { node: node_id },
                HarvestRejection::Occupied { .. } => Notification::NodeBusy { node: node_id },
            };
            info!(node = node_id.0, rejection = ?rejection, "harvest_rejected");
            ctx.notify(notification);
            return;
        }
        let duration_ms = node.duration_ms;
        let anchor = ctx.store.local_player().position;
        ctx.transport.send(Intent::BeginHarvest { node: node_id });
        ctx.store.set_harvest_flag_for_entity(local, true);
        ctx.notify(Notification::HarvestStarted {
            node: node_id,
            duration_ms,
        });
        self.state = InteractionState::Harvesting(ActiveHarvestState {
            node_id,
            start_ms: now_ms,
            duration_ms,
            anchor,
        });
        info!(node = node_id.0, duration_ms, "harvest_started");
    }

    fn engage_teleporter(
        &mut self,
        ctx: &mut InteractionContext<'_>,
        id: TeleporterId,
        destination: String,
    ) {
        ctx.transport.send(Intent::Interact {
            target: InteractTarget::Teleporter(id),
        });
        info!(teleporter = id.0, destination = %destination, "teleport_started");
        ctx.notify(Notification::TeleportStarted {
            teleporter: id,
            destination,
        });
        ctx.store.set_click_target(None);
        self.state = InteractionState::Engaged(InteractionTarget::Teleporter(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::geom::Rect;
    use crate::sim::net::Outbox;
    use crate::sim::profile::InMemoryProfileService;
    use crate::sim::world::{
        AccountId, EntityId, HarvestNode, LocalPlayerState, SeatedTable, TableId, Teleporter,
        Vendor, VendorKind,
    };

    struct Fixture {
        store: WorldStore,
        outbox: Outbox,
        profile: InMemoryProfileService,
        notifications: Vec<Notification>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: WorldStore::new(LocalPlayerState::new(
                    EntityId(1),
                    AccountId("acct".to_string()),
                    Vec2::ZERO,
                )),
                outbox: Outbox::new(),
                profile: InMemoryProfileService::new(),
                notifications: Vec::new(),
            }
        }

        fn ctx(&mut self) -> InteractionContext<'_> {
            InteractionContext {
                store: &mut self.store,
                transport: &mut self.outbox,
                profile: &mut self.profile,
                notifications: &mut self.notifications,
            }
        }
    }

    fn node_at(id: u32, anchor: Vec2) -> HarvestNode {
        HarvestNode {
            id: NodeId(id),
            anchor,
            trunk: Rect::centered(anchor + Vec2::new(0.0, -20.0), 4.0, 4.0),
            hit_zone: Rect::centered(anchor + Vec2::new(0.0, -20.0), 12.0, 16.0),
            duration_ms: 1000.0,
            felled: false,
            occupied_by: None,
            cooldown_until_ms: None,
        }
    }

    #[test]
    fn hit_test_prefers_tables_over_overlapping_vendor_zone() {
        let mut objects = ObjectStates::default();
        objects
            .upsert_vendor(Vendor {
                kind: VendorKind::Dealer,
                anchor: Vec2::ZERO,
                zone: Rect::new(-100.0, -100.0, 200.0, 200.0),
            })
            .expect("vendor");
        objects
            .upsert_table(SeatedTable {
                id: TableId(3),
                anchor: Vec2::new(10.0, 10.0),
                zone: Rect::new(0.0, 0.0, 20.0, 20.0),
            })
            .expect("table");
        objects
            .upsert_teleporter(Teleporter {
                id: TeleporterId(1),
                anchor: Vec2::new(10.0, 10.0),
                pad: Rect::new(0.0, 0.0, 20.0, 20.0),
                destination: "arcade".to_string(),
                required_balance: None,
            })
            .expect("teleporter");
        let coordinator = InteractionCoordinator::new(InteractionConfig::default());

        assert_eq!(
            coordinator.hit_test(&objects, Vec2::new(5.0, 5.0)),
            Some(InteractionTarget::SeatedGame(TableId(3)))
        );
        assert_eq!(
            coordinator.hit_test(&objects, Vec2::new(-50.0, 5.0)),
            Some(InteractionTarget::Vendor(VendorKind::Dealer))
        );
        assert_eq!(coordinator.hit_test(&objects, Vec2::new(500.0, 0.0)), None);
    }

    #[test]
    fn hit_test_ties_resolve_to_nearest_then_lowest_id() {
        let mut objects = ObjectStates::default();
        objects
            .upsert_node(node_at(4, Vec2::new(0.0, 0.0)))
            .expect("node");
        objects
            .upsert_node(node_at(2, Vec2::new(0.0, 0.0)))
            .expect("node");
        objects
            .upsert_node(node_at(9, Vec2::new(6.0, 0.0)))
            .expect("node");
        let coordinator = InteractionCoordinator::new(InteractionConfig::default());
        assert_eq!(
            coordinator.hit_test(&objects, Vec2::new(0.0, -20.0)),
            Some(InteractionTarget::HarvestNode(NodeId(2)))
        );
        assert_eq!(
            coordinator.hit_test(&objects, Vec2::new(6.0, -20.0)),
            Some(InteractionTarget::HarvestNode(NodeId(9)))
        );
    }

    #[test]
    fn cooldown_on_arrival_rejects_with_notification() {
        let mut fixture = Fixture::new();
        let mut node = node_at(1, Vec2::new(5.0, 0.0));
        node.cooldown_until_ms = Some(4000.0);
        fixture
            .store
            .object_states_mut()
            .upsert_node(node)
            .expect("node");
        let mut coordinator = InteractionCoordinator::new(InteractionConfig::default());

        coordinator.click(&mut fixture.ctx(), InteractionTarget::HarvestNode(NodeId(1)));

        assert_eq!(coordinator.state(), &InteractionState::Idle);
        assert!(fixture.outbox.is_empty());
        assert_eq!(
            fixture.notifications,
            vec![Notification::CooldownActive {
                node: NodeId(1),
                remaining_ms: 4000.0
            }]
        );
    }

    #[test]
    fn busy_node_is_rejected() {
        let mut fixture = Fixture::new();
        let mut node = node_at(1, Vec2::new(5.0, 0.0));
        node.occupied_by = Some(EntityId(77));
        fixture
            .store
            .object_states_mut()
            .upsert_node(node)
            .expect("node");
        let mut coordinator = InteractionCoordinator::new(InteractionConfig::default());
        coordinator.click(&mut fixture.ctx(), InteractionTarget::HarvestNode(NodeId(1)));
        assert_eq!(
            fixture.notifications,
            vec![Notification::NodeBusy { node: NodeId(1) }]
        );
    }

    #[test]
    fn pending_target_that_vanishes_clears_silently() {
        let mut fixture = Fixture::new();
        fixture
            .store
            .object_states_mut()
            .upsert_vendor(Vendor {
                kind: VendorKind::Outfitter,
                anchor: Vec2::new(300.0, 0.0),
                zone: Rect::centered(Vec2::new(300.0, 0.0), 20.0, 20.0),
            })
            .expect("vendor");
        let mut coordinator = InteractionCoordinator::new(InteractionConfig::default());
        coordinator.click(&mut fixture.ctx(), InteractionTarget::Vendor(VendorKind::Outfitter));
        assert_eq!(fixture.store.click_target(), Some(Vec2::new(300.0, 0.0)));

        fixture
            .store
            .object_states_mut()
            .remove_vendor(VendorKind::Outfitter);
        coordinator.update(&mut fixture.ctx());

        assert_eq!(coordinator.state(), &InteractionState::Idle);
        assert_eq!(fixture.store.click_target(), None);
        assert!(fixture.notifications.is_empty());
        assert!(fixture.outbox.is_empty());
    }

    #[test]
    fn moving_target_reaims_click_target() {
        let mut fixture = Fixture::new();
        fixture
            .store
            .object_states_mut()
            .upsert_table(SeatedTable {
                id: TableId(1),
                anchor: Vec2::new(200.0, 0.0),
                zone: Rect::centered(Vec2::new(200.0, 0.0), 10.0, 10.0),
            })
            .expect("table");
        let mut coordinator = InteractionCoordinator::new(InteractionConfig::default());
        coordinator.click(&mut fixture.ctx(), InteractionTarget::SeatedGame(TableId(1)));

        fixture
            .store
            .object_states_mut()
            .upsert_table(SeatedTable {
                id: TableId(1),
                anchor: Vec2::new(200.0, 50.0),
                zone: Rect::centered(Vec2::new(200.0, 50.0), 10.0, 10.0),
            })
            .expect("table");
        coordinator.update(&mut fixture.ctx());
        assert_eq!(fixture.store.click_target(), Some(Vec2::new(200.0, 50.0)));
        assert_eq!(
            coordinator.pending_target(),
            Some(InteractionTarget::SeatedGame(TableId(1)))
        );
    }

    #[test]
    fn failed_lookup_falls_back_to_cached_balance() {
        let mut fixture = Fixture::new();
        fixture.store.reconcile_local(LocalReconcile {
            balance: Some(900),
            ..Default::default()
        });
        fixture
            .store
            .object_states_mut()
            .upsert_teleporter(Teleporter {
                id: TeleporterId(7),
                anchor: Vec2::new(3.0, 0.0),
                pad: Rect::centered(Vec2::new(3.0, 0.0), 8.0, 8.0),
                destination: "vault".to_string(),
                required_balance: Some(500),
            })
            .expect("teleporter");
        fixture.profile.set_failing(true);
        let mut coordinator = InteractionCoordinator::new(InteractionConfig::default());

        coordinator.click(&mut fixture.ctx(), InteractionTarget::Teleporter(TeleporterId(7)));
        assert_eq!(
            coordinator.state(),
            &InteractionState::AwaitingGate(InteractionTarget::Teleporter(TeleporterId(7)))
        );

        fixture.profile.deliver_all();
        let mut replies = Vec::new();
        fixture.profile.drain_replies(&mut replies);
        coordinator.apply_balance_replies(&mut fixture.ctx(), replies);

        assert_eq!(
            fixture.outbox.queued(),
            &[Intent::Interact {
                target: InteractTarget::Teleporter(TeleporterId(7))
            }]
        );
        assert_eq!(
            coordinator.state(),
            &InteractionState::Engaged(InteractionTarget::Teleporter(TeleporterId(7)))
        );
    }

    #[test]
    fn reanchor_moves_harvest_anchor() {
        let mut fixture = Fixture::new();
        fixture
            .store
            .object_states_mut()
            .upsert_node(node_at(1, Vec2::new(4.0, 0.0)))
            .expect("node");
        let mut coordinator = InteractionCoordinator::new(InteractionConfig::default());
        coordinator.click(&mut fixture.ctx(), InteractionTarget::HarvestNode(NodeId(1)));
        assert!(coordinator.active_harvest().is_some());

        coordinator.reanchor_harvest(Vec2::new(8.0, 0.0));
        fixture.store.reconcile_local(LocalReconcile {
            position: Some(Vec2::new(8.0, 0.0)),
            ..Default::default()
        });
        coordinator.update(&mut fixture.ctx());

        assert!(coordinator.active_harvest().is_some());
        assert_eq!(fixture.outbox.queued().len(), 1);
    }
}
