use crate::sim::geom::Rect;

use super::pipeline::{DrawLayer, DrawSurface, Rgba, SurfaceError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCall {
    Clear(Rgba),
    Fill {
        layer: DrawLayer,
        rect: Rect,
        color: Rgba,
    },
    Outline {
        layer: DrawLayer,
        rect: Rect,
        color: Rgba,
    },
}

impl DrawCall {
    pub fn layer(&self) -> Option<DrawLayer> {
        match self {
            Self::Clear(_) => None,
            Self::Fill { layer, .. } | Self::Outline { layer, .. } => Some(*layer),
        }
    }
}

/// Headless surface that records every draw call of the last frame.
#[derive(Debug)]
pub struct RecordingSurface {
    calls: Vec<DrawCall>,
    available: bool,
    presented: u32,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            available: true,
            presented: 0,
        }
    }

    /// An unavailable surface fails `begin_frame`, like a minimised window.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn presented(&self) -> u32 {
        self.presented
    }

    pub fn layers(&self) -> Vec<DrawLayer> {
        self.calls.iter().filter_map(DrawCall::layer).collect()
    }

    pub fn fills_on(&self, layer: DrawLayer) -> impl Iterator<Item = Rect> + '_ {
        self.calls.iter().filter_map(move |call| match call {
            DrawCall::Fill {
                layer: call_layer,
                rect,
                ..
            } if *call_layer == layer => Some(*rect),
            _ => None,
        })
    }
}

impl DrawSurface for RecordingSurface {
    fn begin_frame(&mut self) -> Result<(), SurfaceError> {
        if !self.available {
            return Err(SurfaceError::Unavailable {
                width: 0,
                height: 0,
            });
        }
        self.calls.clear();
        Ok(())
    }

    fn clear(&mut self, color: Rgba) {
        self.calls.push(DrawCall::Clear(color));
    }

    fn fill_rect(&mut self, layer: DrawLayer, rect: Rect, color: Rgba) {
        self.calls.push(DrawCall::Fill { layer, rect, color });
    }

    fn outline_rect(&mut self, layer: DrawLayer, rect: Rect, color: Rgba) {
        self.calls.push(DrawCall::Outline { layer, rect, color });
    }

    fn present(&mut self) -> Result<(), SurfaceError> {
        self.presented = self.presented.saturating_add(1);
        Ok(())
    }
}
