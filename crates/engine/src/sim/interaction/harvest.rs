use crate::sim::geom::Vec2;
use crate::sim::world::{EntityId, HarvestNode, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveHarvestState {
    pub node_id: NodeId,
    pub start_ms: f64,
    pub duration_ms: f64,
    /// Where the player stood when the harvest began.
    pub anchor: Vec2,
}

impl ActiveHarvestState {
    pub fn elapsed_ms(&self, now_ms: f64) -> f64 {
        (now_ms - self.start_ms).max(0.0)
    }

    pub fn is_complete(&self, now_ms: f64) -> bool {
        self.elapsed_ms(now_ms) >= self.duration_ms
    }

    pub fn progress(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        (self.elapsed_ms(now_ms) / self.duration_ms).clamp(0.0, 1.0) as f32
    }

    pub fn has_drifted(&self, position: Vec2, tolerance: f32) -> bool {
        position.distance(self.anchor) > tolerance
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HarvestRejection {
    Cooldown { remaining_ms: f64 },
    Felled,
    Occupied { by: EntityId },
}

/// Local admission check before a begin intent is sent. The authority still
/// has the final word.
pub fn admit(node: &HarvestNode, local: EntityId, now_ms: f64) -> Result<(), HarvestRejection> {
    if let Some(remaining_ms) = node.cooldown_remaining_ms(now_ms) {
        return Err(HarvestRejection::Cooldown { remaining_ms });
    }
    if node.felled {
        return Err(HarvestRejection::Felled);
    }
    match node.occupied_by {
        Some(by) if by != local => Err(HarvestRejection::Occupied { by }),
        _ => Ok(()),
    }
}
