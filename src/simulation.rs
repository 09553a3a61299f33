use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::camera::RoomCamera;
use crate::checkpoint::CheckpointStore;
use crate::config::GameConfig;
use crate::controller::{Controller, ControllerMode, FrameContext};
use crate::enemy::Crawler;
use crate::events::{EventCursor, GameEvent, GameEventBus, GameEventKind};
use crate::input::Buttons;
use crate::level::LevelLayout;
use crate::physics::{
    hit_event, reset_crawler, reset_platform, stage_view, step_crawler, step_platform,
    wants_reset, PlayerTarget,
};
use crate::physics_core::Physics;
use crate::platform::{resolve_all, MovingPlatform, RiderKind};
use crate::player::{player_parts, step_player, PlayerCommand};
use crate::rigid_body::Body;
use crate::screen::ScreenPresence;
use crate::tilemap::Tilemap;

#[derive(Deserialize, Clone, Debug, Default)]
pub struct SimulationRequest {
    /// Replaces the loaded level for this run.
    #[serde(default)]
    pub level: Option<Tilemap>,
    #[serde(default)]
    pub inputs: Vec<SimInput>,
    #[serde(default)]
    pub commands: Vec<SimCommand>,
    pub max_frames: u32,
    #[serde(default = "default_record_interval")]
    pub record_interval: u32,
    #[serde(default)]
    pub tuning: Option<GameConfig>,
    #[serde(default)]
    pub stop_on_death: bool,
}

fn default_record_interval() -> u32 {
    1
}

/// Holds `action` for `duration` frames starting at `frame` (at least one).
#[derive(Deserialize, Clone, Debug)]
pub struct SimInput {
    pub frame: u32,
    pub action: String,
    #[serde(default)]
    pub duration: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SimCommand {
    pub frame: u32,
    #[serde(flatten)]
    pub command: PlayerCommand,
}

#[derive(Serialize, Clone, Debug)]
pub struct SimulationResult {
    pub outcome: String,
    pub frames_elapsed: u32,
    pub trace: Vec<TraceFrame>,
    pub events: Vec<GameEvent>,
    pub checkpoints: Vec<(f32, f32)>,
}

#[derive(Serialize, Clone, Debug)]
pub struct TraceFrame {
    pub frame: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub mode: ControllerMode,
    pub grounded: bool,
    pub moving: bool,
    pub health: i32,
    pub camera_x: f32,
    pub camera_y: f32,
    pub shots: usize,
}

/// Everything a headless run owns; the bevy app keeps the same state in
/// resources and components.
struct Stage {
    camera: RoomCamera,
    checkpoints: CheckpointStore,
    events: GameEventBus,
    reset_cursor: EventCursor,
    platforms: Vec<(MovingPlatform, ScreenPresence)>,
    crawlers: Vec<(Crawler, Body, Physics, ScreenPresence)>,
    player: (Controller, Body, Physics),
    pending: Vec<PlayerCommand>,
}

impl Stage {
    fn build(tilemap: &Tilemap, config: &GameConfig) -> Result<Self, String> {
        let mut checkpoints = CheckpointStore::default();
        let layout = LevelLayout::build(tilemap, config, &mut checkpoints)?;
        let platforms = layout
            .platforms
            .into_iter()
            .map(|p| {
                let presence = ScreenPresence::new(p.position, p.room_persistent());
                (p, presence)
            })
            .collect();
        let crawlers = layout
            .crawlers
            .into_iter()
            .map(|(crawler, body, physics)| {
                let presence = ScreenPresence::new(body.position, false);
                (crawler, body, physics, presence)
            })
            .collect();
        Ok(Self {
            camera: RoomCamera::new(config.camera.clone()),
            checkpoints,
            events: GameEventBus::default(),
            reset_cursor: EventCursor::default(),
            platforms,
            crawlers,
            player: player_parts(config),
            pending: vec![PlayerCommand::Respawn],
        })
    }

    /// Same order as the fixed-update pipeline.
    fn step(&mut self, tilemap: &Tilemap, config: &GameConfig, input: Buttons) {
        self.events.tick();

        if wants_reset(&self.reset_cursor.read(&self.events)) {
            for (platform, presence) in self.platforms.iter_mut() {
                reset_platform(platform, presence, &config.platforms);
            }
            for (crawler, body, physics, presence) in self.crawlers.iter_mut() {
                reset_crawler(crawler, body, physics, presence);
            }
        }

        let (controller, player_body, player_physics) = &mut self.player;
        let view = stage_view(&self.camera, controller.is_busy());
        let mut target =
            PlayerTarget::armed(player_body, controller, self.camera.is_transitioning());

        for (index, (platform, presence)) in self.platforms.iter_mut().enumerate() {
            let outcome = step_platform(
                platform,
                presence,
                &view,
                tilemap,
                &config.platforms,
                config.frame_ms,
                Some(&target),
            );
            if outcome.activated {
                self.events
                    .emit(GameEventKind::PlatformActivated, Some(index as u64));
            }
            if let Some(amount) = outcome.contact_damage {
                self.pending.push(PlayerCommand::Damage { amount });
            }
        }

        let platforms = &mut self.platforms;
        for (index, (crawler, body, physics, presence)) in self.crawlers.iter_mut().enumerate() {
            let outcome = step_crawler(
                crawler,
                body,
                physics,
                presence,
                &view,
                tilemap,
                config.frame_ms,
                Some(&mut target),
                |b| {
                    resolve_all(platforms.iter_mut().map(|(p, _)| p), b, tilemap, RiderKind::Other)
                },
            );
            if let Some(health) = outcome.shot_landed {
                self.events.emit(hit_event(health), Some(index as u64));
            }
            if let Some(amount) = outcome.contact_damage {
                self.pending.push(PlayerCommand::Damage { amount });
            }
        }

        let mut ctx = FrameContext {
            tilemap,
            camera: &mut self.camera,
            checkpoints: &mut self.checkpoints,
            events: &mut self.events,
            frame_ms: config.frame_ms,
            source: None,
        };
        step_player(
            controller,
            player_body,
            player_physics,
            input,
            &mut self.pending,
            &mut ctx,
            |b| resolve_all(platforms.iter_mut().map(|(p, _)| p), b, tilemap, RiderKind::Player),
        );
    }

    fn trace(&self, frame: u32) -> TraceFrame {
        let (controller, body, physics) = &self.player;
        TraceFrame {
            frame,
            x: body.position.x,
            y: body.position.y,
            vx: body.speed.x,
            vy: body.speed.y,
            mode: controller.mode(body),
            grounded: physics.is_on_ground(body),
            moving: physics.is_moving(body),
            health: controller.health(),
            camera_x: self.camera.position.x,
            camera_y: self.camera.position.y,
            shots: controller.buster.active_count(),
        }
    }
}

/// Per-frame buttons for the whole run. Unknown actions fail the request.
fn schedule_inputs(request: &SimulationRequest) -> Result<Vec<Buttons>, String> {
    let mut frames = vec![Buttons::default(); request.max_frames as usize];
    for input in &request.inputs {
        let duration = input.duration.max(1);
        let end = input.frame.saturating_add(duration).min(request.max_frames);
        for frame in input.frame..end {
            let slot = &mut frames[frame as usize];
            *slot = slot.with_action(&input.action)?;
        }
        // Validate actions scheduled entirely past the end too.
        Buttons::default().with_action(&input.action)?;
    }
    Ok(frames)
}

/// Runs the player pipeline headless for up to `request.max_frames` frames.
pub fn run_simulation(
    tilemap: &Tilemap,
    config: &GameConfig,
    request: &SimulationRequest,
) -> Result<SimulationResult, String> {
    let tilemap = request.level.as_ref().unwrap_or(tilemap);
    let config = request.tuning.as_ref().unwrap_or(config);
    if request.level.is_some() {
        tilemap.validate()?;
    }
    if request.tuning.is_some() {
        config.validate()?;
    }

    let inputs = schedule_inputs(request)?;
    let mut stage = Stage::build(tilemap, config)?;
    let mut events_cursor = EventCursor::default();
    let mut trace = Vec::new();
    let mut events = Vec::new();
    let mut outcome = "completed";
    let mut frames_elapsed = 0;

    for (frame, buttons) in inputs.into_iter().enumerate() {
        let frame = frame as u32;
        stage.pending.extend(
            request
                .commands
                .iter()
                .filter(|c| c.frame == frame)
                .map(|c| c.command),
        );
        stage.step(tilemap, config, buttons);
        frames_elapsed = frame + 1;

        let fresh = events_cursor.read(&stage.events);
        let died = fresh.iter().any(|e| e.kind == GameEventKind::Died);
        events.extend(fresh);

        if died || (request.record_interval > 0 && frame % request.record_interval == 0) {
            trace.push(stage.trace(frame));
        }
        if died && request.stop_on_death {
            outcome = "death";
            break;
        }
    }

    info!(
        "[Gridrunner sim] {} after {} frames, {} events",
        outcome,
        frames_elapsed,
        events.len()
    );
    Ok(SimulationResult {
        outcome: outcome.to_string(),
        frames_elapsed,
        trace,
        events,
        checkpoints: stage
            .checkpoints
            .points()
            .iter()
            .map(|p| (p.x, p.y))
            .collect(),
    })
}
