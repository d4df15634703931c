use winit::keyboard::{KeyCode, PhysicalKey};

use crate::sim::predictor::DirectionKeys;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    ZoomIn,
    ZoomOut,
    ToggleOverlay,
    Back,
}

const ACTION_COUNT: usize = 8;

/// Held state per action, updated from key events between frames.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub(crate) fn direction_keys(&self) -> DirectionKeys {
        DirectionKeys {
            up: self.is_down(InputAction::MoveUp),
            down: self.is_down(InputAction::MoveDown),
            left: self.is_down(InputAction::MoveLeft),
            right: self.is_down(InputAction::MoveRight),
        }
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::ZoomIn => 4,
            InputAction::ZoomOut => 5,
            InputAction::ToggleOverlay => 6,
            InputAction::Back => 7,
        }
    }

    /// WASD/arrows move, `=`/`-` zoom, F3 toggles the overlay, Esc backs out
    /// of an engaged interaction or quits.
    pub fn from_physical_key(key: PhysicalKey) -> Option<Self> {
        let PhysicalKey::Code(code) = key else {
            return None;
        };
        match code {
            KeyCode::KeyW | KeyCode::ArrowUp => Some(Self::MoveUp),
            KeyCode::KeyS | KeyCode::ArrowDown => Some(Self::MoveDown),
            KeyCode::KeyA | KeyCode::ArrowLeft => Some(Self::MoveLeft),
            KeyCode::KeyD | KeyCode::ArrowRight => Some(Self::MoveRight),
            KeyCode::Equal | KeyCode::NumpadAdd => Some(Self::ZoomIn),
            KeyCode::Minus | KeyCode::NumpadSubtract => Some(Self::ZoomOut),
            KeyCode::F3 => Some(Self::ToggleOverlay),
            KeyCode::Escape => Some(Self::Back),
            _ => None,
        }
    }
}
