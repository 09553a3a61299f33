use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

use crate::components::Direction;

const MAX_EVENTS: usize = 500;

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEventKind {
    Landed { after_spawn: bool },
    SpawnStarted,
    SpawnFinished,
    Damaged { amount: i32, health: i32 },
    Died,
    HealthRecoveryStarted { target: i32 },
    HealthRecovered { health: i32 },
    TransitionStarted { direction: Direction },
    TransitionFinished { direction: Direction },
    CheckpointReached { x: f32, y: f32 },
    SlideStarted,
    LadderGrabbed,
    LadderReleased,
    PlatformActivated,
    ShotFired,
    EnemyHit { health: i32 },
    EnemyDefeated,
    Paused,
    Resumed,
}

impl GameEventKind {
    /// Stable name used by trigger tables.
    pub fn name(&self) -> &'static str {
        match self {
            GameEventKind::Landed { .. } => "landed",
            GameEventKind::SpawnStarted => "spawn_started",
            GameEventKind::SpawnFinished => "spawn_finished",
            GameEventKind::Damaged { .. } => "damaged",
            GameEventKind::Died => "died",
            GameEventKind::HealthRecoveryStarted { .. } => "health_recovery_started",
            GameEventKind::HealthRecovered { .. } => "health_recovered",
            GameEventKind::TransitionStarted { .. } => "transition_started",
            GameEventKind::TransitionFinished { .. } => "transition_finished",
            GameEventKind::CheckpointReached { .. } => "checkpoint_reached",
            GameEventKind::SlideStarted => "slide_started",
            GameEventKind::LadderGrabbed => "ladder_grabbed",
            GameEventKind::LadderReleased => "ladder_released",
            GameEventKind::PlatformActivated => "platform_activated",
            GameEventKind::ShotFired => "shot_fired",
            GameEventKind::EnemyHit { .. } => "enemy_hit",
            GameEventKind::EnemyDefeated => "enemy_defeated",
            GameEventKind::Paused => "paused",
            GameEventKind::Resumed => "resumed",
        }
    }

    /// Events after which screen objects return to their initial state.
    pub fn resets_screen_objects(&self) -> bool {
        matches!(
            self,
            GameEventKind::SpawnStarted | GameEventKind::TransitionFinished { .. }
        )
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct GameEvent {
    #[serde(flatten)]
    pub kind: GameEventKind,
    pub frame: u64,
    pub source_entity: Option<u64>,
}

#[derive(Resource, Default, Clone)]
pub struct GameEventBus {
    pub recent: VecDeque<GameEvent>,
    pub frame: u64,
    pub dropped_events: u64,
    last_overflow_log_frame: u64,
}

impl GameEventBus {
    pub fn emit(&mut self, kind: GameEventKind, source_entity: Option<u64>) {
        debug!("[Gridrunner events] frame {} {}", self.frame, kind.name());
        self.recent.push_back(GameEvent {
            kind,
            frame: self.frame,
            source_entity,
        });
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if self.frame.saturating_sub(self.last_overflow_log_frame) >= 60 {
                self.last_overflow_log_frame = self.frame;
                warn!(
                    "[Gridrunner events] Dropped {} buffered events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }

    pub fn tick(&mut self) {
        self.frame = self.frame.saturating_add(1);
    }
}

/// Per-consumer read position so every event is seen at most once.
#[derive(Default, Clone, Debug)]
pub struct EventCursor {
    last_frame: u64,
    processed_in_frame: usize,
}

impl EventCursor {
    /// Events emitted since the previous call.
    pub fn read(&mut self, bus: &GameEventBus) -> Vec<GameEvent> {
        let mut fresh = Vec::new();
        let mut count_in_frame = 0usize;
        for ev in bus.recent.iter() {
            if ev.frame < self.last_frame {
                continue;
            }
            if ev.frame == self.last_frame {
                count_in_frame = count_in_frame.saturating_add(1);
                if count_in_frame <= self.processed_in_frame {
                    continue;
                }
            } else {
                count_in_frame = 1;
            }
            fresh.push(ev.clone());
            self.last_frame = ev.frame;
            self.processed_in_frame = count_in_frame;
        }
        fresh
    }
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameEventBus::default()).add_systems(
            FixedUpdate,
            tick_event_frame
                .in_set(crate::physics::FrameSet::Tick)
                .run_if(crate::game_runtime::gameplay_systems_enabled),
        );
    }
}

fn tick_event_frame(mut bus: ResMut<GameEventBus>) {
    bus.tick();
}
