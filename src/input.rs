use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Logical buttons sampled once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Buttons {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub shoot: bool,
    pub start: bool,
    pub back: bool,
}

impl Buttons {
    /// Parses a simulation action name. Unknown names are rejected.
    pub fn with_action(mut self, action: &str) -> Result<Self, String> {
        match action.trim().to_ascii_lowercase().as_str() {
            "up" => self.up = true,
            "down" => self.down = true,
            "left" => self.left = true,
            "right" => self.right = true,
            "jump" => self.jump = true,
            "shoot" => self.shoot = true,
            "start" => self.start = true,
            "back" => self.back = true,
            other => return Err(format!("unknown input action '{other}'")),
        }
        Ok(self)
    }
}

/// Abstraction layer between raw input and game systems.
/// Both keyboard (windowed) and simulation (headless) write to this.
#[derive(Resource, Default, Clone, Debug)]
pub struct VirtualInput {
    pub current: Buttons,
    pub previous: Buttons,
}

impl VirtualInput {
    /// Rolls the current snapshot into `previous` and stores the new one.
    pub fn push(&mut self, buttons: Buttons) {
        self.previous = self.current;
        self.current = buttons;
    }

    pub fn start_just_pressed(&self) -> bool {
        self.current.start && !self.previous.start
    }
}

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(VirtualInput::default()).add_systems(
            PreUpdate,
            keyboard_to_virtual.run_if(resource_exists::<ButtonInput<KeyCode>>),
        );
    }
}

/// Keyboard state as logical buttons.
pub fn buttons_from_keyboard(keyboard: &ButtonInput<KeyCode>) -> Buttons {
    let any = |keys: &[KeyCode]| keys.iter().any(|k| keyboard.pressed(*k));
    Buttons {
        up: any(&[KeyCode::ArrowUp, KeyCode::KeyW]),
        down: any(&[KeyCode::ArrowDown, KeyCode::KeyS]),
        left: any(&[KeyCode::ArrowLeft, KeyCode::KeyA]),
        right: any(&[KeyCode::ArrowRight, KeyCode::KeyD]),
        jump: any(&[KeyCode::KeyZ, KeyCode::Space]),
        shoot: any(&[KeyCode::KeyX]),
        start: any(&[KeyCode::Enter]),
        back: any(&[KeyCode::Backspace]),
    }
}

fn keyboard_to_virtual(keyboard: Res<ButtonInput<KeyCode>>, mut vinput: ResMut<VirtualInput>) {
    vinput.push(buttons_from_keyboard(&keyboard));
}
