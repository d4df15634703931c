mod pipeline;
mod recording;
mod renderer;
mod selection;
pub(crate) mod transform;

pub use pipeline::{
    DrawLayer, DrawSurface, FrameStats, OverlayData, RenderPipeline, Rgba, SurfaceError,
};
pub use recording::{DrawCall, RecordingSurface};
pub use renderer::Renderer;
pub use selection::select_closest;
pub use transform::Viewport;
