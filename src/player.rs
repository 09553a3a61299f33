use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::Facing;
use crate::config::GameConfig;
use crate::controller::{Controller, FrameContext};
use crate::input::Buttons;
use crate::physics_core::Physics;
use crate::rigid_body::Body;

/// Requests applied to the player at the start of its next update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlayerCommand {
    Damage { amount: i32 },
    RecoverHealth { amount: i32 },
    Respawn,
}

#[derive(Resource, Default, Clone, Debug)]
pub struct PlayerCommands {
    pub pending: Vec<PlayerCommand>,
}

impl PlayerCommands {
    pub fn push(&mut self, command: PlayerCommand) {
        self.pending.push(command);
    }
}

/// Components of a freshly built player, standing still until spawned.
pub fn player_parts(config: &GameConfig) -> (Controller, Body, Physics) {
    let tuning = &config.controller;
    let controller = Controller::new(tuning.clone(), &config.physics, &config.weapon);
    let body = Body::new(Vec2::ZERO, tuning.width, tuning.height);
    let physics = Physics::new(config.physics.clone(), Facing::Right);
    (controller, body, physics)
}

/// Applies queued commands, then advances the controller one frame.
pub fn step_player<F>(
    controller: &mut Controller,
    body: &mut Body,
    physics: &mut Physics,
    input: Buttons,
    pending: &mut Vec<PlayerCommand>,
    ctx: &mut FrameContext,
    platform_pass: F,
) where
    F: FnMut(&mut Body),
{
    for command in pending.drain(..) {
        match command {
            PlayerCommand::Damage { amount } => {
                controller.inflict_damage(amount, body, physics, ctx);
            }
            PlayerCommand::RecoverHealth { amount } => {
                if !controller.recover_health(amount, ctx) {
                    debug!("[Gridrunner] health recovery refused");
                }
            }
            PlayerCommand::Respawn => controller.start_spawn(body, physics, ctx),
        }
    }
    controller.advance(body, physics, input, ctx, platform_pass);
}

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(PlayerCommands::default()).add_systems(
            PreUpdate,
            debug_health_keys.run_if(resource_exists::<ButtonInput<KeyCode>>),
        );
    }
}

/// F1 hurts the player, F2 starts a health refill.
fn debug_health_keys(keyboard: Res<ButtonInput<KeyCode>>, mut commands: ResMut<PlayerCommands>) {
    if keyboard.just_pressed(KeyCode::F1) {
        commands.push(PlayerCommand::Damage { amount: 50 });
    }
    if keyboard.just_pressed(KeyCode::F2) {
        commands.push(PlayerCommand::RecoverHealth { amount: 50 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::RoomCamera;
    use crate::checkpoint::CheckpointStore;
    use crate::controller::ControllerMode;
    use crate::events::GameEventBus;
    use crate::tilemap::Tilemap;

    #[test]
    fn commands_parse_from_tagged_json() {
        let command: PlayerCommand =
            serde_json::from_str(r#"{"command":"damage","amount":25}"#).expect("valid command");
        assert_eq!(command, PlayerCommand::Damage { amount: 25 });
        let command: PlayerCommand =
            serde_json::from_str(r#"{"command":"respawn"}"#).expect("valid command");
        assert_eq!(command, PlayerCommand::Respawn);
    }

    #[test]
    fn queued_respawn_and_damage_apply_in_order() {
        let config = GameConfig::default();
        let map = Tilemap::test_level(64);
        let mut checkpoints = CheckpointStore::default();
        checkpoints.seed_from_level(&map).expect("test level has a start");
        let mut camera = RoomCamera::new(config.camera.clone());
        let mut events = GameEventBus::default();
        let (mut controller, mut body, mut physics) = player_parts(&config);

        let mut pending = vec![
            PlayerCommand::Respawn,
            PlayerCommand::Damage { amount: 10 },
        ];
        let mut ctx = FrameContext {
            tilemap: &map,
            camera: &mut camera,
            checkpoints: &mut checkpoints,
            events: &mut events,
            frame_ms: config.frame_ms,
            source: None,
        };
        step_player(
            &mut controller,
            &mut body,
            &mut physics,
            Buttons::default(),
            &mut pending,
            &mut ctx,
            |_| {},
        );
        assert!(pending.is_empty());
        // Spawning bodies cannot be hurt.
        assert_eq!(controller.health(), 100);
        assert_eq!(controller.mode(&body), ControllerMode::Spawning);
    }
}
