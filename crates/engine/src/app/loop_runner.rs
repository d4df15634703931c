use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{debug, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowBuilder;

use crate::sim::geom::Vec2;
use crate::sim::profile::ProfileService;
use crate::sim::session::{FrameInput, Session};

use super::frame_clock::FrameClock;
use super::input::ActionStates;
use super::metrics::MetricsAccumulator;
use super::rendering::{DrawSurface, OverlayData, RenderPipeline, Renderer, SurfaceError, Viewport};
use super::scene::{SceneCommand, SceneRuntime};
use super::{InputAction, MetricsHandle, Scene};

pub const SLOW_FRAME_ENV_VAR: &str = "PLAZA_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub max_render_fps: Option<u32>,
    pub overlay_visible: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Plaza".to_string(),
            window_width: 960,
            window_height: 540,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: None,
            overlay_visible: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app<P: ProfileService + 'static>(
    config: LoopConfig,
    session: Session<P>,
    scene: Box<dyn Scene<P>>,
) -> Result<(), AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, session, scene, metrics_handle)
}

pub fn run_app_with_metrics<P: ProfileService + 'static>(
    config: LoopConfig,
    session: Session<P>,
    scene: Box<dyn Scene<P>>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window)).map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let mut frame_clock = FrameClock::new(&session.config().frame);
    let mut pipeline = RenderPipeline::new(session.config().render.clone());
    let mut runtime = SceneRuntime::new(scene, session);
    let viewport = renderer.viewport();
    if viewport.width > 0 && viewport.height > 0 {
        runtime.session_mut().camera_mut().set_viewport(viewport);
    }
    runtime.load();

    let pacing = FramePacing::from_config(&config);
    let mut input_collector = InputCollector::default();
    info!(
        metrics_log_interval_ms = pacing.metrics_interval.as_millis() as u64,
        slow_frame_delay_ms = pacing.slow_frame_delay.as_millis() as u64,
        render_fps_cap = pacing.render_fps_cap.unwrap_or(0),
        "loop_config"
    );

    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(pacing.metrics_interval);
    let mut last_applied_title: Option<String> = None;
    let mut overlay_visible = config.overlay_visible;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    apply_window_size(
                        &mut renderer,
                        &mut runtime,
                        new_size.width,
                        new_size.height,
                    );
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    apply_window_size(
                        &mut renderer,
                        &mut runtime,
                        size.width,
                        size.height,
                    );
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input_collector.set_cursor_position_px(position.x as f32, position.y as f32);
                }
                WindowEvent::CursorLeft { .. } => {
                    input_collector.clear_cursor_position();
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    input_collector.handle_mouse_input(button, state);
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    input_collector.handle_mouse_wheel(delta);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_key(event.physical_key, event.state);
                }
                WindowEvent::RedrawRequested => {
                    if !pacing.slow_frame_delay.is_zero() {
                        // Debug perturbation only; not the FPS cap.
                        thread::sleep(pacing.slow_frame_delay);
                    }

                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;
                    let dt_seconds = frame_clock.tick(now);

                    let polled = input_collector.poll_frame();
                    if polled.overlay_toggled {
                        overlay_visible = !overlay_visible;
                        info!(overlay_visible, "overlay_toggled");
                    }
                    if polled.back && runtime.back() == SceneCommand::Quit {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                    if runtime.step(dt_seconds, &polled.frame, polled.click_screen)
                        == SceneCommand::Quit
                    {
                        info!(reason = "scene_quit", "shutdown_requested");
                        window_target.exit();
                    }

                    let cap_sleep = pacing.cap_sleep(
                        Instant::now().saturating_duration_since(last_present_instant),
                    );
                    if !cap_sleep.is_zero() {
                        thread::sleep(cap_sleep);
                    }

                    let overlay = OverlayData {
                        metrics: overlay_visible.then(|| metrics_handle.snapshot()),
                        harvest_progress: runtime.session().harvest_progress(),
                    };
                    match render_session(&mut pipeline, &mut renderer, runtime.session(), &overlay)
                    {
                        RenderResult::Presented => {}
                        RenderResult::Skipped => metrics_accumulator.record_skipped_render(),
                        RenderResult::Failed => window_target.exit(),
                    }
                    last_present_instant = Instant::now();

                    let next_title = runtime.title();
                    if next_title != last_applied_title {
                        window.set_title(next_title.as_deref().unwrap_or(&config.window_title));
                        last_applied_title = next_title;
                    }
                    metrics_accumulator.record_frame(raw_frame_dt, dt_seconds);

                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            frame_time_ms = snapshot.frame_time_ms,
                            worst_frame_ms = snapshot.worst_frame_ms,
                            smoothed_dt_ms = snapshot.smoothed_dt_ms,
                            skipped_renders = snapshot.skipped_renders,
                            live_entities = runtime.session().interpolator().len(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                runtime.unload();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn apply_window_size<P: ProfileService>(
    renderer: &mut Renderer,
    runtime: &mut SceneRuntime<P>,
    width: u32,
    height: u32,
) {
    if let Err(error) = renderer.resize(width, height) {
        warn!(error = %error, width, height, "renderer_resize_failed");
        return;
    }
    if width > 0 && height > 0 {
        runtime
            .session_mut()
            .camera_mut()
            .set_viewport(Viewport { width, height });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderResult {
    Presented,
    Skipped,
    Failed,
}

/// Renders one frame. An unavailable surface skips only the render; a
/// failed present ends the loop.
fn render_session<P: ProfileService>(
    pipeline: &mut RenderPipeline,
    surface: &mut dyn DrawSurface,
    session: &Session<P>,
    overlay: &OverlayData,
) -> RenderResult {
    match pipeline.render(surface, &session.view(), overlay) {
        Ok(_) => RenderResult::Presented,
        Err(SurfaceError::Unavailable { width, height }) => {
            debug!(width, height, "renderer_draw_skipped");
            RenderResult::Skipped
        }
        Err(error) => {
            warn!(error = %error, "renderer_draw_failed");
            RenderResult::Failed
        }
    }
}

/// Everything the frame callback consumes from input, taken once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PolledInput {
    frame: FrameInput,
    click_screen: Option<Vec2>,
    overlay_toggled: bool,
    back: bool,
}

#[derive(Debug, Default)]
struct InputCollector {
    back_pressed_edge: bool,
    action_states: ActionStates,
    overlay_toggle_pressed_edge: bool,
    pending_zoom_steps: i32,
    cursor_position_px: Option<Vec2>,
    left_mouse_is_down: bool,
    left_click_pressed_edge: bool,
}

impl InputCollector {
    /// Movement keys are level-triggered; zoom and overlay keys count once
    /// per press.
    fn handle_key(&mut self, key: PhysicalKey, state: ElementState) {
        let Some(action) = InputAction::from_physical_key(key) else {
            return;
        };
        let is_pressed = state == ElementState::Pressed;
        let was_down = self.action_states.is_down(action);
        self.action_states.set(action, is_pressed);
        if !is_pressed || was_down {
            return;
        }
        match action {
            InputAction::ZoomIn => {
                self.pending_zoom_steps = self.pending_zoom_steps.saturating_add(1);
            }
            InputAction::ZoomOut => {
                self.pending_zoom_steps = self.pending_zoom_steps.saturating_sub(1);
            }
            InputAction::ToggleOverlay => self.overlay_toggle_pressed_edge = true,
            InputAction::Back => self.back_pressed_edge = true,
            InputAction::MoveUp
            | InputAction::MoveDown
            | InputAction::MoveLeft
            | InputAction::MoveRight => {}
        }
    }

    fn poll_frame(&mut self) -> PolledInput {
        let click_screen = if self.left_click_pressed_edge {
            self.cursor_position_px
        } else {
            None
        };
        let polled = PolledInput {
            frame: FrameInput {
                keys: self.action_states.direction_keys(),
                zoom_steps: self.pending_zoom_steps,
            },
            click_screen,
            overlay_toggled: self.overlay_toggle_pressed_edge,
            back: self.back_pressed_edge,
        };
        self.left_click_pressed_edge = false;
        self.overlay_toggle_pressed_edge = false;
        self.back_pressed_edge = false;
        self.pending_zoom_steps = 0;
        polled
    }

    fn set_cursor_position_px(&mut self, x: f32, y: f32) {
        self.cursor_position_px = Some(Vec2 { x, y });
    }

    fn clear_cursor_position(&mut self) {
        self.cursor_position_px = None;
    }

    fn handle_mouse_wheel(&mut self, delta: MouseScrollDelta) {
        let steps = zoom_steps_from_scroll_delta(delta);
        self.pending_zoom_steps = self.pending_zoom_steps.saturating_add(steps);
    }

    fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        if button != MouseButton::Left {
            return;
        }
        match state {
            ElementState::Pressed => {
                if !self.left_mouse_is_down {
                    self.left_click_pressed_edge = true;
                }
                self.left_mouse_is_down = true;
            }
            ElementState::Released => self.left_mouse_is_down = false,
        }
    }
}

/// Timing knobs resolved once at startup. A zero cap or interval means
/// "use the default" rather than "spin".
#[derive(Debug, Clone, Copy, PartialEq)]
struct FramePacing {
    metrics_interval: Duration,
    slow_frame_delay: Duration,
    render_fps_cap: Option<u32>,
}

impl FramePacing {
    fn from_config(config: &LoopConfig) -> Self {
        let slow_frame_ms = env::var(SLOW_FRAME_ENV_VAR).ok();
        Self::resolve(config, slow_frame_ms.as_deref())
    }

    fn resolve(config: &LoopConfig, slow_frame_override: Option<&str>) -> Self {
        let slow_frame_ms = match slow_frame_override.map(str::parse::<u64>) {
            Some(Ok(ms)) => ms,
            Some(Err(err)) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    error = %err,
                    "slow_frame_override_ignored"
                );
                config.simulated_slow_frame_ms
            }
            None => config.simulated_slow_frame_ms,
        };
        let metrics_interval = if config.metrics_log_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            config.metrics_log_interval
        };

        Self {
            metrics_interval,
            slow_frame_delay: Duration::from_millis(slow_frame_ms),
            render_fps_cap: config.max_render_fps.filter(|fps| *fps > 0),
        }
    }

    /// How long to wait before presenting so frames never arrive faster
    /// than the cap.
    fn cap_sleep(&self, since_last_present: Duration) -> Duration {
        self.render_fps_cap
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)))
            .map_or(Duration::ZERO, |budget| budget.saturating_sub(since_last_present))
    }
}

fn zoom_steps_from_scroll_delta(delta: MouseScrollDelta) -> i32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y.round() as i32,
        MouseScrollDelta::PixelDelta(position) => {
            if position.y > 0.0 {
                1
            } else if position.y < 0.0 {
                -1
            } else {
                0
            }
        }
    }
}
