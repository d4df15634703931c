pub mod app;
pub mod config;
pub mod sim;

pub use app::{
    run_app, run_app_with_metrics, AppError, Camera2D, DrawLayer, DrawSurface, FrameClock,
    FrameStats, InputAction, LoopConfig, LoopMetricsSnapshot, MetricsHandle, OverlayData,
    RecordingSurface, RenderPipeline, Renderer, Scene, SceneCommand, SurfaceError, Viewport,
    SLOW_FRAME_ENV_VAR,
};
pub use config::{ConfigError, CoreConfig};
pub use sim::geom::{Facing, Rect, Vec2};
pub use sim::interaction::{InteractionState, InteractionTarget, Notification};
pub use sim::net::{InteractTarget, Intent, Outbox, Transport};
pub use sim::predictor::{DirectionKeys, MoveOutcome};
pub use sim::profile::{
    BalanceReply, InMemoryProfileService, ProfileError, ProfileService, RequestTicket,
};
pub use sim::session::{FrameInput, Session, SessionView};
pub use sim::world::{
    AccountId, CollisionMap, EntityClass, EntityId, EquippedItem, HarvestNode, LocalPlayerState,
    LocalReconcile, NodeId, ObjectStates, Pickup, PickupId, RemoteSnapshot, SeatedTable, TableId,
    Teleporter, TeleporterId, Vendor, VendorKind, WorldError, WorldStore,
};

pub const CONFIG_ENV_VAR: &str = "PLAZA_CONFIG";
