use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::geom::{Facing, Rect, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeleporterId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PickupId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

#[derive(Debug, Error, PartialEq)]
pub enum WorldError {
    #[error("collision bounds must be finite and non-empty, got {0:?}")]
    InvalidBounds(Rect),
    #[error("{kind} {id} has non-finite geometry")]
    NonFiniteGeometry { kind: &'static str, id: u64 },
}

/// Render band / classification of a live entity, decided by the network
/// layer when the entity is first announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    Npc,
    Player,
    Aerial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub id: EntityId,
    pub class: EntityClass,
    pub position: Vec2,
    pub facing: Facing,
    #[serde(default)]
    pub harvesting: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquippedItem {
    pub item_key: String,
    #[serde(default)]
    pub speed_multiplier: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlayerState {
    pub id: EntityId,
    pub account: AccountId,
    pub position: Vec2,
    pub facing: Facing,
    pub equipped: Vec<EquippedItem>,
    pub balance: u64,
    pub harvesting: bool,
}

impl LocalPlayerState {
    pub fn new(id: EntityId, account: AccountId, position: Vec2) -> Self {
        Self {
            id,
            account,
            position,
            facing: Facing::Down,
            equipped: Vec::new(),
            balance: 0,
            harvesting: false,
        }
    }

    /// Highest multiplier among equipped items; multipliers never stack.
    pub fn speed_multiplier(&self) -> f32 {
        self.equipped
            .iter()
            .filter_map(|item| item.speed_multiplier)
            .filter(|multiplier| multiplier.is_finite() && *multiplier > 0.0)
            .fold(None, |best: Option<f32>, value| {
                Some(best.map_or(value, |best| best.max(value)))
            })
            .unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalReconcile {
    pub position: Option<Vec2>,
    pub facing: Option<Facing>,
    pub balance: Option<u64>,
    pub equipped: Option<Vec<EquippedItem>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestNode {
    pub id: NodeId,
    pub anchor: Vec2,
    pub trunk: Rect,
    pub hit_zone: Rect,
    pub duration_ms: f64,
    #[serde(default)]
    pub felled: bool,
    #[serde(default)]
    pub occupied_by: Option<EntityId>,
    #[serde(default)]
    pub cooldown_until_ms: Option<f64>,
}

impl HarvestNode {
    pub fn cooldown_remaining_ms(&self, now_ms: f64) -> Option<f64> {
        self.cooldown_until_ms
            .map(|until| until - now_ms)
            .filter(|remaining| *remaining > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorKind {
    Dealer,
    Outfitter,
    Exchange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub kind: VendorKind,
    pub anchor: Vec2,
    pub zone: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teleporter {
    pub id: TeleporterId,
    pub anchor: Vec2,
    pub pad: Rect,
    pub destination: String,
    #[serde(default)]
    pub required_balance: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatedTable {
    pub id: TableId,
    pub anchor: Vec2,
    pub zone: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pickup {
    pub id: PickupId,
    pub position: Vec2,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectStates {
    nodes: BTreeMap<NodeId, HarvestNode>,
    vendors: BTreeMap<VendorKind, Vendor>,
    teleporters: BTreeMap<TeleporterId, Teleporter>,
    tables: BTreeMap<TableId, SeatedTable>,
    pickups: BTreeMap<PickupId, Pickup>,
}

impl ObjectStates {
    pub fn node(&self, id: NodeId) -> Option<&HarvestNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut HarvestNode> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &HarvestNode> {
        self.nodes.values()
    }

    pub fn vendor(&self, kind: VendorKind) -> Option<&Vendor> {
        self.vendors.get(&kind)
    }

    pub fn vendors(&self) -> impl Iterator<Item = &Vendor> {
        self.vendors.values()
    }

    pub fn teleporter(&self, id: TeleporterId) -> Option<&Teleporter> {
        self.teleporters.get(&id)
    }

    pub fn teleporters(&self) -> impl Iterator<Item = &Teleporter> {
        self.teleporters.values()
    }

    pub fn table(&self, id: TableId) -> Option<&SeatedTable> {
        self.tables.get(&id)
    }

    pub fn tables(&self) -> impl Iterator<Item = &SeatedTable> {
        self.tables.values()
    }

    pub fn pickup(&self, id: PickupId) -> Option<&Pickup> {
        self.pickups.get(&id)
    }

    pub fn pickups(&self) -> impl Iterator<Item = &Pickup> {
        self.pickups.values()
    }

    pub fn pickup_count(&self) -> usize {
        self.pickups.len()
    }

    pub fn upsert_node(&mut self, node: HarvestNode) -> Result<(), WorldError> {
        if !(node.anchor.is_finite() && node.trunk.is_finite() && node.hit_zone.is_finite()) {
            return Err(WorldError::NonFiniteGeometry {
                kind: "harvest node",
                id: u64::from(node.id.0),
            });
        }
        self.nodes.insert(node.id, node);
        Ok(())
    }

    pub fn remove_node(&mut self, id: NodeId) -> Option<HarvestNode> {
        self.nodes.remove(&id)
    }

    pub fn upsert_vendor(&mut self, vendor: Vendor) -> Result<(), WorldError> {
        if !(vendor.anchor.is_finite() && vendor.zone.is_finite()) {
            return Err(WorldError::NonFiniteGeometry {
                kind: "vendor",
                id: vendor.kind as u64,
            });
        }
        self.vendors.insert(vendor.kind, vendor);
        Ok(())
    }

    pub fn remove_vendor(&mut self, kind: VendorKind) -> Option<Vendor> {
        self.vendors.remove(&kind)
    }

    pub fn upsert_teleporter(&mut self, teleporter: Teleporter) -> Result<(), WorldError> {
        if !(teleporter.anchor.is_finite() && teleporter.pad.is_finite()) {
            return Err(WorldError::NonFiniteGeometry {
                kind: "teleporter",
                id: u64::from(teleporter.id.0),
            });
        }
        self.teleporters.insert(teleporter.id, teleporter);
        Ok(())
    }

    pub fn remove_teleporter(&mut self, id: TeleporterId) -> Option<Teleporter> {
        self.teleporters.remove(&id)
    }

    pub fn upsert_table(&mut self, table: SeatedTable) -> Result<(), WorldError> {
        if !(table.anchor.is_finite() && table.zone.is_finite()) {
            return Err(WorldError::NonFiniteGeometry {
                kind: "table",
                id: u64::from(table.id.0),
            });
        }
        self.tables.insert(table.id, table);
        Ok(())
    }

    pub fn remove_table(&mut self, id: TableId) -> Option<SeatedTable> {
        self.tables.remove(&id)
    }

    pub fn upsert_pickup(&mut self, pickup: Pickup) -> Result<(), WorldError> {
        if !pickup.position.is_finite() {
            return Err(WorldError::NonFiniteGeometry {
                kind: "pickup",
                id: pickup.id.0,
            });
        }
        self.pickups.insert(pickup.id, pickup);
        Ok(())
    }

    pub fn remove_pickup(&mut self, id: PickupId) -> Option<Pickup> {
        self.pickups.remove(&id)
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.vendors.clear();
        self.teleporters.clear();
        self.tables.clear();
        self.pickups.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionMap {
    bounds: Rect,
    solids: Vec<Rect>,
}

impl CollisionMap {
    pub fn new(bounds: Rect, solids: Vec<Rect>) -> Result<Self, WorldError> {
        if !bounds.is_finite() || bounds.w <= 0.0 || bounds.h <= 0.0 {
            return Err(WorldError::InvalidBounds(bounds));
        }
        let solids = solids
            .into_iter()
            .filter(|solid| {
                let keep = solid.is_finite();
                if !keep {
                    warn!(solid = ?solid, "collision_solid_dropped");
                }
                keep
            })
            .collect();
        Ok(Self { bounds, solids })
    }

    pub fn open(bounds: Rect) -> Self {
        Self {
            bounds,
            solids: Vec::new(),
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn solids(&self) -> &[Rect] {
        &self.solids
    }

    fn blocks(&self, body: &Rect) -> bool {
        let inside = body.x >= self.bounds.x
            && body.y >= self.bounds.y
            && body.right() <= self.bounds.right()
            && body.bottom() <= self.bounds.bottom();
        !inside || self.solids.iter().any(|solid| solid.intersects(body))
    }
}

const DEFAULT_ROOM_EXTENT: f32 = 4096.0;

/// Owned by the session; every component reads and writes world state here.
#[derive(Debug, Clone)]
pub struct WorldStore {
    local: LocalPlayerState,
    live: BTreeMap<EntityId, RemoteSnapshot>,
    objects: ObjectStates,
    map: CollisionMap,
    click_target: Option<Vec2>,
    room: String,
    now_ms: f64,
}

impl WorldStore {
    pub fn new(local: LocalPlayerState) -> Self {
        Self {
            local,
            live: BTreeMap::new(),
            objects: ObjectStates::default(),
            map: CollisionMap::open(Rect::new(
                -DEFAULT_ROOM_EXTENT,
                -DEFAULT_ROOM_EXTENT,
                DEFAULT_ROOM_EXTENT * 2.0,
                DEFAULT_ROOM_EXTENT * 2.0,
            )),
            click_target: None,
            room: String::new(),
            now_ms: 0.0,
        }
    }

    pub fn local_player(&self) -> &LocalPlayerState {
        &self.local
    }

    pub fn live_entities(&self) -> &BTreeMap<EntityId, RemoteSnapshot> {
        &self.live
    }

    pub fn object_states(&self) -> &ObjectStates {
        &self.objects
    }

    pub fn object_states_mut(&mut self) -> &mut ObjectStates {
        &mut self.objects
    }

    pub fn collision_map(&self) -> &CollisionMap {
        &self.map
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub(crate) fn advance_clock(&mut self, dt_seconds: f32) {
        self.now_ms += f64::from(dt_seconds) * 1000.0;
    }

    pub fn click_target(&self) -> Option<Vec2> {
        self.click_target
    }

    pub fn set_click_target(&mut self, target: Option<Vec2>) {
        self.click_target = target.filter(|point| point.is_finite());
    }

    pub fn set_local_position(&mut self, position: Vec2, facing: Facing) {
        if !position.is_finite() {
            warn!(x = position.x, y = position.y, "local_position_rejected");
            return;
        }
        self.local.position = position;
        self.local.facing = facing;
    }

    pub fn set_harvest_flag_for_entity(&mut self, id: EntityId, harvesting: bool) {
        if id == self.local.id {
            self.local.harvesting = harvesting;
        } else if let Some(snapshot) = self.live.get_mut(&id) {
            snapshot.harvesting = harvesting;
        }
    }

    /// Replaces the live entity set wholesale. The local player's own entry
    /// is ignored; snapshots with non-finite positions are dropped.
    pub fn apply_live_snapshot(&mut self, snapshots: impl IntoIterator<Item = RemoteSnapshot>) {
        self.live.clear();
        for snapshot in snapshots {
            if snapshot.id == self.local.id {
                continue;
            }
            if !snapshot.position.is_finite() {
                debug!(entity = snapshot.id.0, "remote_snapshot_dropped");
                continue;
            }
            self.live.insert(snapshot.id, snapshot);
        }
    }

    /// Applies an authoritative correction; returns the new position when the
    /// correction moved the player.
    pub fn reconcile_local(&mut self, update: LocalReconcile) -> Option<Vec2> {
        let mut moved_to = None;
        if let Some(position) = update.position.filter(|point| point.is_finite()) {
            self.local.position = position;
            moved_to = Some(position);
        }
        if let Some(facing) = update.facing {
            self.local.facing = facing;
        }
        if let Some(balance) = update.balance {
            self.local.balance = balance;
        }
        if let Some(equipped) = update.equipped {
            self.local.equipped = equipped;
        }
        moved_to
    }

    pub fn enter_room(&mut self, room: impl Into<String>, map: CollisionMap, spawn: Vec2) {
        self.room = room.into();
        self.map = map;
        self.live.clear();
        self.objects.clear();
        self.click_target = None;
        self.local.harvesting = false;
        if spawn.is_finite() {
            self.local.position = spawn;
        }
    }

    // felled nodes have no collision
    pub fn is_blocked(&self, body: &Rect) -> bool {
        self.map.blocks(body)
            || self
                .objects
                .nodes()
                .any(|node| !node.felled && node.trunk.intersects(body))
    }
}
