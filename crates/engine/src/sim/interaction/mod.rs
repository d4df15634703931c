mod coordinator;
mod gate;
mod harvest;

pub use coordinator::{InteractionContext, InteractionCoordinator, InteractionState};
pub use gate::BalanceGate;
pub use harvest::{admit, ActiveHarvestState, HarvestRejection};

use super::world::{NodeId, TableId, TeleporterId, VendorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InteractionTarget {
    HarvestNode(NodeId),
    Vendor(VendorKind),
    Teleporter(TeleporterId),
    SeatedGame(TableId),
}

/// Transient player-facing messages, drained by the host once per frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    VendorOpened(VendorKind),
    HarvestStarted { node: NodeId, duration_ms: f64 },
    HarvestCompleted { node: NodeId },
    HarvestCancelled { node: NodeId },
    CooldownActive { node: NodeId, remaining_ms: f64 },
    NodeBusy { node: NodeId },
    NodeFelled { node: NodeId },
    GateRejected {
        teleporter: TeleporterId,
        balance: u64,
        required: u64,
    },
    TeleportStarted {
        teleporter: TeleporterId,
        destination: String,
    },
    SeatedAtTable { table: TableId },
    Unreachable(InteractionTarget),
}
