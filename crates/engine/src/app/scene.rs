use tracing::info;

use crate::sim::geom::Vec2;
use crate::sim::predictor::MoveOutcome;
use crate::sim::profile::ProfileService;
use crate::sim::session::{FrameInput, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

/// Host-side hooks around the session frame. A scene pumps inbound
/// authority data before the step and dispatches outbound intents and
/// notifications after it.
pub trait Scene<P: ProfileService> {
    fn load(&mut self, session: &mut Session<P>);
    fn before_frame(&mut self, session: &mut Session<P>, dt_seconds: f32) -> SceneCommand;
    fn after_frame(&mut self, session: &mut Session<P>, outcome: &MoveOutcome);
    fn unload(&mut self, session: &mut Session<P>);
    fn title(&self, _session: &Session<P>) -> Option<String> {
        None
    }
}

/// Owns the session and its scene and tracks whether the scene is loaded.
pub(crate) struct SceneRuntime<P> {
    scene: Box<dyn Scene<P>>,
    session: Session<P>,
    is_loaded: bool,
}

impl<P: ProfileService> SceneRuntime<P> {
    pub(crate) fn new(scene: Box<dyn Scene<P>>, session: Session<P>) -> Self {
        Self {
            scene,
            session,
            is_loaded: false,
        }
    }

    pub(crate) fn session(&self) -> &Session<P> {
        &self.session
    }

    pub(crate) fn session_mut(&mut self) -> &mut Session<P> {
        &mut self.session
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub(crate) fn load(&mut self) {
        if self.is_loaded {
            return;
        }
        self.scene.load(&mut self.session);
        self.is_loaded = true;
        info!(
            room = self.session.store().room(),
            live_entities = self.session.store().live_entities().len(),
            "scene_loaded"
        );
    }

    pub(crate) fn unload(&mut self) {
        if !self.is_loaded {
            return;
        }
        self.scene.unload(&mut self.session);
        self.is_loaded = false;
    }

    /// Clicks land between frames, before the step that consumes them.
    pub(crate) fn step(
        &mut self,
        dt_seconds: f32,
        input: &FrameInput,
        click_screen: Option<Vec2>,
    ) -> SceneCommand {
        let command = self.scene.before_frame(&mut self.session, dt_seconds);
        if let Some(click) = click_screen {
            self.session.handle_click_screen(click);
        }
        let outcome = self.session.frame(dt_seconds, input);
        self.scene.after_frame(&mut self.session, &outcome);
        command
    }

    /// Esc closes an open menu or seat; with nothing engaged it quits.
    pub(crate) fn back(&mut self) -> SceneCommand {
        if self.session.dismiss_interaction() {
            SceneCommand::None
        } else {
            SceneCommand::Quit
        }
    }

    pub(crate) fn title(&self) -> Option<String> {
        self.scene.title(&self.session)
    }
}
