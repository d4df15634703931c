mod camera;
mod frame_clock;
mod input;
mod loop_runner;
mod metrics;
pub(crate) mod rendering;
mod scene;

pub use camera::{Camera2D, CAMERA_ZOOM_STEP};
pub use frame_clock::FrameClock;
pub use input::InputAction;
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig, SLOW_FRAME_ENV_VAR};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{
    select_closest, DrawCall, DrawLayer, DrawSurface, FrameStats, OverlayData, RecordingSurface,
    RenderPipeline, Renderer, Rgba, SurfaceError, Viewport,
};
pub use scene::{Scene, SceneCommand};
