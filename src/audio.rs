use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::events::{EventCursor, GameEvent, GameEventBus, GameEventKind};

const MAX_AUDIO_EVENTS: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueAction {
    Play,
    LoopStart,
    LoopStop,
}

/// What to request when a named game event fires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CueTrigger {
    pub action: CueAction,
    pub cue: String,
}

impl CueTrigger {
    fn new(action: CueAction, cue: &str) -> Self {
        Self {
            action,
            cue: cue.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioCueLog {
    pub frame: u64,
    pub action: CueAction,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_event: Option<String>,
}

/// Fire-and-forget cue requests. Playback itself belongs to whatever backend
/// drains `recent_events`.
#[derive(Resource, Clone, Debug)]
pub struct AudioCues {
    pub triggers: HashMap<String, CueTrigger>,
    pub active_loops: Vec<String>,
    pub recent_events: Vec<AudioCueLog>,
}

impl Default for AudioCues {
    fn default() -> Self {
        let triggers = [
            ("landed", CueTrigger::new(CueAction::Play, "land")),
            ("damaged", CueTrigger::new(CueAction::Play, "hit")),
            ("died", CueTrigger::new(CueAction::Play, "death")),
            (
                "health_recovery_started",
                CueTrigger::new(CueAction::LoopStart, "health_loop"),
            ),
            (
                "health_recovered",
                CueTrigger::new(CueAction::LoopStop, "health_loop"),
            ),
            (
                "platform_activated",
                CueTrigger::new(CueAction::Play, "platform_fall"),
            ),
            ("shot_fired", CueTrigger::new(CueAction::Play, "buster")),
            ("enemy_hit", CueTrigger::new(CueAction::Play, "enemy_hit")),
            (
                "enemy_defeated",
                CueTrigger::new(CueAction::Play, "enemy_defeated"),
            ),
        ]
        .into_iter()
        .map(|(event, trigger)| (event.to_string(), trigger))
        .collect();
        Self {
            triggers,
            active_loops: Vec::new(),
            recent_events: Vec::new(),
        }
    }
}

impl AudioCues {
    pub fn set_triggers(&mut self, mappings: HashMap<String, CueTrigger>) {
        self.triggers = mappings;
    }

    pub fn play(&mut self, name: &str, frame: u64, source_event: Option<String>) {
        self.push_event(AudioCueLog {
            frame,
            action: CueAction::Play,
            name: name.to_string(),
            source_event,
        });
    }

    /// Returns false when the loop is already running.
    pub fn loop_start(&mut self, name: &str, frame: u64, source_event: Option<String>) -> bool {
        if self.active_loops.iter().any(|l| l == name) {
            return false;
        }
        self.active_loops.push(name.to_string());
        self.push_event(AudioCueLog {
            frame,
            action: CueAction::LoopStart,
            name: name.to_string(),
            source_event,
        });
        true
    }

    pub fn loop_stop(&mut self, name: &str, frame: u64, source_event: Option<String>) -> bool {
        let Some(index) = self.active_loops.iter().position(|l| l == name) else {
            return false;
        };
        self.active_loops.remove(index);
        self.push_event(AudioCueLog {
            frame,
            action: CueAction::LoopStop,
            name: name.to_string(),
            source_event,
        });
        true
    }

    /// Applies the trigger table to one game event.
    pub fn handle_event(&mut self, ev: &GameEvent) {
        let name = ev.kind.name();
        let Some(trigger) = self.triggers.get(name).cloned() else {
            return;
        };
        let cue = match ev.kind {
            // The first landing after a respawn has its own sound.
            GameEventKind::Landed { after_spawn: true } if trigger.cue == "land" => {
                "spawn_land".to_string()
            }
            _ => trigger.cue,
        };
        let source = Some(name.to_string());
        match trigger.action {
            CueAction::Play => self.play(&cue, ev.frame, source),
            CueAction::LoopStart => {
                self.loop_start(&cue, ev.frame, source);
            }
            CueAction::LoopStop => {
                self.loop_stop(&cue, ev.frame, source);
            }
        }
    }

    fn push_event(&mut self, event: AudioCueLog) {
        debug!("[Gridrunner audio] {:?} {}", event.action, event.name);
        self.recent_events.push(event);
        if self.recent_events.len() > MAX_AUDIO_EVENTS {
            let excess = self.recent_events.len() - MAX_AUDIO_EVENTS;
            self.recent_events.drain(0..excess);
        }
    }
}

#[derive(Resource, Default)]
struct AudioEventCursor(EventCursor);

pub struct AudioPlugin;

impl Plugin for AudioPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(AudioCues::default())
            .insert_resource(AudioEventCursor::default())
            .add_systems(Update, auto_audio_from_events);
    }
}

fn auto_audio_from_events(
    mut audio: ResMut<AudioCues>,
    bus: Res<GameEventBus>,
    mut cursor: ResMut<AudioEventCursor>,
) {
    for ev in cursor.0.read(&bus) {
        audio.handle_event(&ev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: GameEventKind, frame: u64) -> GameEvent {
        GameEvent {
            kind,
            frame,
            source_entity: None,
        }
    }

    #[test]
    fn first_landing_after_spawn_uses_spawn_cue() {
        let mut audio = AudioCues::default();
        audio.handle_event(&event(GameEventKind::Landed { after_spawn: true }, 3));
        audio.handle_event(&event(GameEventKind::Landed { after_spawn: false }, 9));
        let names: Vec<_> = audio.recent_events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["spawn_land", "land"]);
        assert_eq!(audio.recent_events[0].source_event.as_deref(), Some("landed"));
    }

    #[test]
    fn health_loop_starts_once_and_stops_on_recovery() {
        let mut audio = AudioCues::default();
        audio.handle_event(&event(GameEventKind::HealthRecoveryStarted { target: 90 }, 1));
        assert!(!audio.loop_start("health_loop", 2, None));
        assert_eq!(audio.active_loops, vec!["health_loop".to_string()]);
        audio.handle_event(&event(GameEventKind::HealthRecovered { health: 90 }, 20));
        assert!(audio.active_loops.is_empty());
        let actions: Vec<_> = audio.recent_events.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![CueAction::LoopStart, CueAction::LoopStop]);
    }

    #[test]
    fn combat_events_play_their_cues() {
        let mut audio = AudioCues::default();
        audio.handle_event(&event(GameEventKind::ShotFired, 1));
        audio.handle_event(&event(GameEventKind::EnemyHit { health: 10 }, 4));
        audio.handle_event(&event(GameEventKind::EnemyDefeated, 9));
        let names: Vec<_> = audio.recent_events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["buster", "enemy_hit", "enemy_defeated"]);
    }

    #[test]
    fn plugin_reads_each_bus_event_once() {
        let mut app = App::new();
        app.insert_resource(GameEventBus::default())
            .add_plugins(AudioPlugin);
        app.world_mut()
            .resource_mut::<GameEventBus>()
            .emit(GameEventKind::Damaged { amount: 10, health: 90 }, None);
        app.update();
        app.update();
        let audio = app.world().resource::<AudioCues>();
        assert_eq!(audio.recent_events.len(), 1);
        assert_eq!(audio.recent_events[0].name, "hit");

        app.world_mut()
            .resource_mut::<GameEventBus>()
            .emit(GameEventKind::SlideStarted, None);
        app.update();
        assert_eq!(app.world().resource::<AudioCues>().recent_events.len(), 1);
    }
}
