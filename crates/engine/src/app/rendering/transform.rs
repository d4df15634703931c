use crate::sim::geom::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width as f32 * 0.5, self.height as f32 * 0.5)
    }
}

pub fn world_to_screen(world: Vec2, center: Vec2, zoom: f32, viewport: Viewport) -> Vec2 {
    (world - center) * zoom + viewport.center()
}

pub fn screen_to_world(screen: Vec2, center: Vec2, zoom: f32, viewport: Viewport) -> Vec2 {
    (screen - viewport.center()) * (1.0 / zoom) + center
}
