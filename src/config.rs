use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::audio::CueTrigger;

/// Integration constants for a physics body. Units are pixels per frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    pub gravity: f32,
    pub max_fall_speed: f32,
    pub jump_speed: f32,
    pub horizontal_acceleration: f32,
    pub max_horizontal_speed: f32,
    /// Downward speed kept while resting on ground.
    pub ground_adhesion: f32,
    pub ground_multiplier: f32,
    pub air_multiplier: f32,
    /// Minimum horizontal speed while steering in the air.
    pub air_floor: f32,
    /// Horizontal push applied to bodies resting on a conveyor tile.
    pub conveyor_speed: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: 0.9,
            max_fall_speed: 48.0,
            jump_speed: 19.2,
            horizontal_acceleration: 0.09,
            max_horizontal_speed: 5.2,
            ground_adhesion: 1.0,
            ground_multiplier: 1.35,
            air_multiplier: 1.7,
            air_floor: 2.0,
            conveyor_speed: 4.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerTuning {
    pub width: i32,
    pub height: i32,
    pub slide_height: i32,
    pub slide_speed: f32,
    pub slide_acceleration: f32,
    pub ladder_speed: f32,
    pub recoil_speed: f32,
    pub slide_ms: u32,
    pub damage_ms: u32,
    pub invulnerability_ms: u32,
    pub death_ms: u32,
    pub max_health: i32,
    pub spawn_descent_acceleration: f32,
    /// How far above the body center a ladder must continue to count as "not near the top".
    pub ladder_top_epsilon: f32,
    /// Distance checked for a ceiling before standing up from a slide.
    pub overhead_check: f32,
}

impl Default for ControllerTuning {
    fn default() -> Self {
        Self {
            width: 54,
            height: 88,
            slide_height: 64,
            slide_speed: 10.0,
            slide_acceleration: 10.0,
            ladder_speed: 5.0,
            recoil_speed: 1.25,
            slide_ms: 400,
            damage_ms: 500,
            invulnerability_ms: 1500,
            death_ms: 3000,
            max_health: 100,
            spawn_descent_acceleration: 0.5,
            ladder_top_epsilon: 10.0,
            overhead_check: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraTuning {
    pub viewport_width: i32,
    pub viewport_height: i32,
    pub transition_speed: f32,
    pub body_transition_speed: f32,
    /// Upper bound on tiles walked per direction while discovering a room.
    pub room_search_limit: i32,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            viewport_width: 1024,
            viewport_height: 768,
            transition_speed: 10.0,
            body_transition_speed: 1.75,
            room_search_limit: 256,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformTuning {
    pub falling_width: i32,
    pub falling_height: i32,
    pub falling_bounce_speed: f32,
    pub falling_bounce_ms: u32,
    pub falling_wait_ms: u32,
    pub falling_speed: f32,
    pub floating_width: i32,
    pub floating_height: i32,
    pub floating_acceleration: f32,
    pub floating_max_speed: f32,
    pub shuttle_width: i32,
    pub shuttle_height: i32,
    pub shuttle_speed: f32,
    /// Edge of the square spike block.
    pub spike_block_size: i32,
    /// How far a fully extended spike sticks out of the block.
    pub spike_length: i32,
    /// Width of a spike row along the block edge.
    pub spike_span: i32,
    pub spike_damage: i32,
    pub spike_idle_ms: u32,
    pub spike_flash_ms: u32,
    pub spike_flip_ms: u32,
}

impl Default for PlatformTuning {
    fn default() -> Self {
        Self {
            falling_width: 128,
            falling_height: 64,
            falling_bounce_speed: 2.5,
            falling_bounce_ms: 100,
            falling_wait_ms: 100,
            falling_speed: 10.0,
            floating_width: 75,
            floating_height: 45,
            floating_acceleration: 0.07,
            floating_max_speed: 2.0,
            shuttle_width: 128,
            shuttle_height: 32,
            shuttle_speed: 3.0,
            spike_block_size: 64,
            spike_length: 18,
            spike_span: 50,
            spike_damage: 10,
            spike_idle_ms: 3000,
            spike_flash_ms: 1200,
            spike_flip_ms: 380,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerTuning {
    pub width: i32,
    pub height: i32,
    pub walk_speed: f32,
    pub contact_damage: i32,
    pub max_health: i32,
    /// Length of the flash after a shot lands.
    pub hit_flash_ms: u32,
}

impl Default for CrawlerTuning {
    fn default() -> Self {
        Self {
            width: 54,
            height: 44,
            walk_speed: 1.5,
            contact_damage: 10,
            max_health: 15,
            hit_flash_ms: 75,
        }
    }
}

/// The buster: a small pool of straight shots fired on the shoot press.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponTuning {
    pub max_shots: usize,
    pub shot_width: i32,
    pub shot_height: i32,
    pub shot_speed: f32,
    pub shot_damage: i32,
    /// Shooting pose length; ladder climbing waits for it.
    pub pose_ms: u32,
    /// Horizontal gap between the body edge and the shot center.
    pub muzzle_forward: f32,
    /// Shot center below the body top, standing still on the ground.
    pub muzzle_standing: f32,
    /// Shot center below the body top while running or falling.
    pub muzzle_running: f32,
    /// Shot center below the body top while rising.
    pub muzzle_rising: f32,
}

impl Default for WeaponTuning {
    fn default() -> Self {
        Self {
            max_shots: 3,
            shot_width: 30,
            shot_height: 22,
            shot_speed: 17.0,
            shot_damage: 5,
            pose_ms: 350,
            muzzle_forward: 20.0,
            muzzle_standing: 35.0,
            muzzle_running: 40.0,
            muzzle_rising: 20.0,
        }
    }
}

/// Every gameplay constant, loadable from the `tuning` section of `game.json`.
#[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Tile edge in pixels. Sizes the built-in level; loaded levels must match it.
    pub tile_size: i32,
    /// Simulated milliseconds per fixed frame.
    pub frame_ms: u32,
    pub physics: PhysicsTuning,
    pub controller: ControllerTuning,
    pub camera: CameraTuning,
    pub platforms: PlatformTuning,
    pub crawler: CrawlerTuning,
    pub weapon: WeaponTuning,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tile_size: 64,
            frame_ms: 16,
            physics: PhysicsTuning::default(),
            controller: ControllerTuning::default(),
            camera: CameraTuning::default(),
            platforms: PlatformTuning::default(),
            crawler: CrawlerTuning::default(),
            weapon: WeaponTuning::default(),
        }
    }
}

impl GameConfig {
    pub fn from_json(contents: &str) -> Result<Self, String> {
        let config: GameConfig =
            serde_json::from_str(contents).map_err(|e| format!("Invalid tuning config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects a level drawn on a different grid than the tuning expects.
    pub fn check_tile_size(&self, tile_width: i32, tile_height: i32) -> Result<(), String> {
        if tile_width != self.tile_size || tile_height != self.tile_size {
            return Err(format!(
                "level tiles are {}x{}, tuning expects {}",
                tile_width, tile_height, self.tile_size
            ));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size <= 0 {
            return Err(format!("tile_size must be positive, got {}", self.tile_size));
        }
        let c = &self.controller;
        if c.width <= 0 || c.height <= 0 || c.slide_height <= 0 {
            return Err("controller dimensions must be positive".to_string());
        }
        if c.slide_height > c.height {
            return Err(format!(
                "slide_height {} exceeds standing height {}",
                c.slide_height, c.height
            ));
        }
        if c.max_health <= 0 {
            return Err("max_health must be positive".to_string());
        }
        if self.camera.viewport_width <= 0 || self.camera.viewport_height <= 0 {
            return Err("viewport must have a positive size".to_string());
        }
        if self.physics.max_fall_speed < 0.0 || self.physics.jump_speed < 0.0 {
            return Err("fall and jump speeds must not be negative".to_string());
        }
        if self.crawler.max_health <= 0 {
            return Err("crawler max_health must be positive".to_string());
        }
        let w = &self.weapon;
        if w.shot_width <= 0 || w.shot_height <= 0 {
            return Err("shot dimensions must be positive".to_string());
        }
        let p = &self.platforms;
        if p.spike_block_size <= 0 || p.spike_length < 0 || p.spike_span < 0 {
            return Err("spike block dimensions must not be negative".to_string());
        }
        Ok(())
    }
}

/// Contents of `game.json`: window settings, the level path and tuning.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    pub window_title: Option<String>,
    pub window_width: Option<f32>,
    pub window_height: Option<f32>,
    pub background_color: Option<[f32; 3]>,
    pub level: Option<String>,
    /// Replaces the built-in event → cue table when present.
    pub audio_triggers: Option<HashMap<String, CueTrigger>>,
    pub tuning: GameConfig,
}

impl StartupConfig {
    pub fn from_json(contents: &str) -> Result<Self, String> {
        let config: StartupConfig =
            serde_json::from_str(contents).map_err(|e| format!("Invalid game config: {e}"))?;
        config.tuning.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let config = GameConfig::from_json(r#"{"physics":{"gravity":1.2},"frame_ms":20}"#)
            .expect("config should parse");
        assert_eq!(config.physics.gravity, 1.2);
        assert_eq!(config.physics.jump_speed, 19.2);
        assert_eq!(config.frame_ms, 20);
        assert_eq!(config.controller.height, 88);
    }

    #[test]
    fn validation_rejects_oversized_slide() {
        let err = GameConfig::from_json(r#"{"controller":{"slide_height":120}}"#)
            .expect_err("slide taller than body should fail");
        assert!(err.contains("slide_height"));
    }

    #[test]
    fn startup_config_nests_tuning() {
        let config = StartupConfig::from_json(
            r#"{"window_title":"Run","level":"levels/intro.json","tuning":{"tile_size":32}}"#,
        )
        .expect("startup config should parse");
        assert_eq!(config.window_title.as_deref(), Some("Run"));
        assert_eq!(config.level.as_deref(), Some("levels/intro.json"));
        assert_eq!(config.tuning.tile_size, 32);
        assert_eq!(config.tuning.frame_ms, 16);
        assert!(StartupConfig::from_json(r#"{"tuning":{"tile_size":0}}"#).is_err());
    }

    #[test]
    fn weapon_and_spike_sections_parse_and_validate() {
        let config = GameConfig::from_json(
            r#"{"weapon":{"max_shots":5,"shot_speed":12.0},"platforms":{"spike_damage":20}}"#,
        )
        .expect("config should parse");
        assert_eq!(config.weapon.max_shots, 5);
        assert_eq!(config.weapon.shot_damage, 5);
        assert_eq!(config.platforms.spike_damage, 20);
        assert_eq!(config.platforms.spike_flip_ms, 380);

        assert!(GameConfig::from_json(r#"{"weapon":{"shot_width":0}}"#).is_err());
        assert!(GameConfig::from_json(r#"{"crawler":{"max_health":0}}"#).is_err());
    }

    #[test]
    fn startup_config_reads_audio_triggers() {
        let config = StartupConfig::from_json(
            r#"{"audio_triggers":{"slide_started":{"action":"play","cue":"whoosh"}}}"#,
        )
        .expect("startup config should parse");
        let triggers = config.audio_triggers.expect("triggers present");
        assert_eq!(triggers["slide_started"].cue, "whoosh");
    }
}
