use crate::config::CameraConfig;
use crate::sim::geom::{Rect, Vec2};

use super::rendering::transform::{self, Viewport};

pub const CAMERA_ZOOM_STEP: f32 = 0.1;

/// Pan/zoom state. All queries are pure functions of the current state;
/// only `pan` and `zoom_by` mutate it.
#[derive(Debug, Clone)]
pub struct Camera2D {
    position: Vec2,
    zoom: f32,
    zoom_min: f32,
    zoom_max: f32,
    follow_rate: f32,
    margin: f32,
    viewport: Viewport,
}

impl Camera2D {
    pub fn new(config: &CameraConfig, viewport: Viewport) -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: config.zoom_default.clamp(config.zoom_min, config.zoom_max),
            zoom_min: config.zoom_min,
            zoom_max: config.zoom_max,
            follow_rate: config.follow_rate,
            margin: config.viewport_margin,
            viewport,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Jumps straight to `target`, used on spawn and room change.
    pub fn center_on(&mut self, target: Vec2) {
        if target.is_finite() {
            self.position = target;
        }
    }

    /// Eases the centre toward `target`; frame-rate independent.
    pub fn pan(&mut self, target: Vec2, dt_seconds: f32) {
        if !target.is_finite() || !dt_seconds.is_finite() || dt_seconds <= 0.0 {
            return;
        }
        let t = 1.0 - (-self.follow_rate * dt_seconds).exp();
        self.position = self.position + (target - self.position) * t;
    }

    pub fn zoom_by(&mut self, delta: f32) {
        if !delta.is_finite() {
            return;
        }
        self.zoom = (self.zoom + delta).clamp(self.zoom_min, self.zoom_max);
    }

    pub fn apply_zoom_steps(&mut self, steps: i32) {
        if steps != 0 {
            self.zoom_by(steps as f32 * CAMERA_ZOOM_STEP);
        }
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        transform::world_to_screen(world, self.position, self.zoom, self.viewport)
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        transform::screen_to_world(screen, self.position, self.zoom, self.viewport)
    }

    /// World rectangle currently on screen.
    pub fn view_bounds(&self) -> Rect {
        let half_w = self.viewport.width as f32 * 0.5 / self.zoom;
        let half_h = self.viewport.height as f32 * 0.5 / self.zoom;
        Rect::centered(self.position, half_w, half_h)
    }

    pub fn culling_bounds(&self) -> Rect {
        self.view_bounds().expanded(self.margin)
    }

    /// Tests a world box (top-left `x`, `y`) against the viewport grown by
    /// the culling margin. Touching counts as visible.
    pub fn is_visible(&self, x: f32, y: f32, w: f32, h: f32) -> bool {
        let bounds = self.culling_bounds();
        x <= bounds.right() && x + w >= bounds.x && y <= bounds.bottom() && y + h >= bounds.y
    }

    pub fn is_rect_visible(&self, rect: &Rect) -> bool {
        self.is_visible(rect.x, rect.y, rect.w, rect.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera2D {
        Camera2D::new(
            &CameraConfig::default(),
            Viewport {
                width: 320,
                height: 240,
            },
        )
    }

    #[test]
    fn zoom_stays_within_configured_range() {
        let mut camera = camera();
        camera.zoom_by(10.0);
        assert_eq!(camera.zoom(), 2.0);
        camera.apply_zoom_steps(-100);
        assert_eq!(camera.zoom(), 0.5);
        camera.zoom_by(f32::NAN);
        assert_eq!(camera.zoom(), 0.5);
    }

    #[test]
    fn screen_round_trip_under_zoom() {
        let mut camera = camera();
        camera.center_on(Vec2::new(100.0, 40.0));
        camera.zoom_by(0.5);
        let world = Vec2::new(130.0, 10.0);
        let back = camera.screen_to_world(camera.world_to_screen(world));
        assert!(back.distance(world) < 0.001);
    }

    #[test]
    fn pan_eases_without_overshoot() {
        let mut camera = camera();
        let target = Vec2::new(100.0, 0.0);
        camera.pan(target, 1.0 / 60.0);
        let first = camera.position().x;
        assert!(first > 0.0 && first < 100.0);
        for _ in 0..600 {
            camera.pan(target, 1.0 / 60.0);
        }
        assert!(camera.position().x <= 100.0);
        assert!(camera.position().distance(target) < 0.01);
    }

    #[test]
    fn visibility_includes_margin() {
        let camera = camera();
        // view is x in [-160, 160]; margin 64 extends culling to 224
        assert!(camera.is_visible(200.0, 0.0, 8.0, 8.0));
        assert!(!camera.is_visible(230.0, 0.0, 8.0, 8.0));
        assert!(camera.is_visible(-240.0, 0.0, 20.0, 8.0));
    }
}
