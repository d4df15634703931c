use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::sim::geom::Rect;

use super::pipeline::{DrawLayer, DrawSurface, Rgba, SurfaceError};
use super::Viewport;

/// Framebuffer-backed drawing surface.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// A zero-sized window keeps the old buffer; the next frame reports the
    /// surface as unavailable instead.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            self.viewport = Viewport { width, height };
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width.max(1), height.max(1), window);
        Pixels::new(width.max(1), height.max(1), surface)
    }
}

impl DrawSurface for Renderer {
    fn begin_frame(&mut self) -> Result<(), SurfaceError> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(SurfaceError::Unavailable {
                width: self.viewport.width,
                height: self.viewport.height,
            });
        }
        Ok(())
    }

    fn clear(&mut self, color: Rgba) {
        for chunk in self.pixels.frame_mut().chunks_exact_mut(4) {
            chunk.copy_from_slice(&color);
        }
    }

    fn fill_rect(&mut self, _layer: DrawLayer, rect: Rect, color: Rgba) {
        let Viewport { width, height } = self.viewport;
        fill_rect_clipped(self.pixels.frame_mut(), width, height, rect, color);
    }

    fn outline_rect(&mut self, _layer: DrawLayer, rect: Rect, color: Rgba) {
        let Viewport { width, height } = self.viewport;
        outline_rect_clipped(self.pixels.frame_mut(), width, height, rect, color);
    }

    fn present(&mut self) -> Result<(), SurfaceError> {
        self.pixels.render().map_err(SurfaceError::Present)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScreenRectPx {
    left: i32,
    right: i32,
    top: i32,
    bottom: i32,
}

/// Half-open pixel span covered by `rect`, or `None` for non-finite input.
fn pixel_span(rect: Rect) -> Option<ScreenRectPx> {
    if !rect.is_finite() || rect.w <= 0.0 || rect.h <= 0.0 {
        return None;
    }
    Some(ScreenRectPx {
        left: rect.x.floor() as i32,
        right: rect.right().ceil() as i32,
        top: rect.y.floor() as i32,
        bottom: rect.bottom().ceil() as i32,
    })
}

fn fill_rect_clipped(frame: &mut [u8], width: u32, height: u32, rect: Rect, color: Rgba) {
    let Some(span) = pixel_span(rect) else {
        return;
    };
    let left = span.left.max(0);
    let right = span.right.min(width as i32);
    let top = span.top.max(0);
    let bottom = span.bottom.min(height as i32);
    for y in top..bottom {
        for x in left..right {
            write_pixel_rgba_clipped(frame, width as usize, x, y, color);
        }
    }
}

fn outline_rect_clipped(frame: &mut [u8], width: u32, height: u32, rect: Rect, color: Rgba) {
    let Some(span) = pixel_span(rect) else {
        return;
    };
    let right = span.right - 1;
    let bottom = span.bottom - 1;
    let (x_min, x_max) = (span.left.max(0), right.min(width as i32 - 1));
    let (y_min, y_max) = (span.top.max(0), bottom.min(height as i32 - 1));

    for x in x_min..=x_max {
        write_pixel_rgba_clipped(frame, width as usize, x, span.top, color);
        write_pixel_rgba_clipped(frame, width as usize, x, bottom, color);
    }
    for y in y_min..=y_max {
        write_pixel_rgba_clipped(frame, width as usize, span.left, y, color);
        write_pixel_rgba_clipped(frame, width as usize, right, y, color);
    }
}

/// Writes one pixel, blending when `color` is translucent. Out-of-range
/// coordinates are ignored.
fn write_pixel_rgba_clipped(frame: &mut [u8], width: usize, x: i32, y: i32, color: Rgba) {
    if x < 0 || y < 0 || x as usize >= width {
        return;
    }
    let x = x as usize;
    let y = y as usize;
    let Some(pixel_offset) = y.checked_mul(width).and_then(|row| row.checked_add(x)) else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > frame.len() {
        return;
    }
    let pixel = &mut frame[byte_offset..end];
    if color[3] == u8::MAX {
        pixel.copy_from_slice(&color);
        return;
    }
    let alpha = u16::from(color[3]);
    for channel in 0..3 {
        let src = u16::from(color[channel]);
        let dst = u16::from(pixel[channel]);
        pixel[channel] = ((src * alpha + dst * (255 - alpha)) / 255) as u8;
    }
    pixel[3] = u8::MAX;
}
