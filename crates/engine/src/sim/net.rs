use serde::{Deserialize, Serialize};
use tracing::debug;

use super::geom::{Facing, Vec2};
use super::world::{NodeId, PickupId, TableId, TeleporterId, VendorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum InteractTarget {
    Vendor(VendorKind),
    Teleporter(TeleporterId),
}

/// Fire-and-forget messages sent to the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Move { position: Vec2, facing: Facing },
    Collect { pickup: PickupId },
    BeginHarvest { node: NodeId },
    CompleteHarvest { node: NodeId },
    CancelHarvest { node: NodeId },
    Interact { target: InteractTarget },
    JoinSeatedGame { table: TableId },
}

pub trait Transport {
    fn send(&mut self, intent: Intent);
}

/// Queue of intents produced during a frame; the host drains it once per
/// frame and hands the batch to the real transport.
#[derive(Debug, Default)]
pub struct Outbox {
    queued: Vec<Intent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&mut self) -> Vec<Intent> {
        std::mem::take(&mut self.queued)
    }

    pub fn queued(&self) -> &[Intent] {
        &self.queued
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}

impl Transport for Outbox {
    fn send(&mut self, intent: Intent) {
        debug!(intent = ?intent, "intent_queued");
        self.queued.push(intent);
    }
}

/// Coalesces move intents to at most one per interval. The newest position is
/// held while throttled and flushed once the interval elapses, even if the
/// player stopped moving in between.
#[derive(Debug, Clone)]
pub struct MoveThrottle {
    interval_ms: f64,
    last_sent_ms: Option<f64>,
    dirty: Option<(Vec2, Facing)>,
}

impl MoveThrottle {
    pub fn new(interval_ms: f32) -> Self {
        Self {
            interval_ms: f64::from(interval_ms.max(0.0)),
            last_sent_ms: None,
            dirty: None,
        }
    }

    /// `changed` marks the pose dirty; a dirty pose is flushed once the
    /// interval allows, even after the player has stopped.
    pub fn update(
        &mut self,
        now_ms: f64,
        changed: bool,
        position: Vec2,
        facing: Facing,
    ) -> Option<Intent> {
        if changed {
            self.dirty = Some((position, facing));
        }
        let ready = self
            .last_sent_ms
            .map_or(true, |last| now_ms - last >= self.interval_ms);
        if !ready {
            return None;
        }
        let (position, facing) = self.dirty.take()?;
        self.last_sent_ms = Some(now_ms);
        Some(Intent::Move { position, facing })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    pub fn reset(&mut self) {
        self.last_sent_ms = None;
        self.dirty = None;
    }
}
