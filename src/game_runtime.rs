use bevy::prelude::*;
use bevy::utils::Instant;
use serde::Serialize;

use crate::events::{GameEventBus, GameEventKind};
use crate::input::VirtualInput;

#[derive(States, Default, Clone, Copy, Eq, PartialEq, Debug, Hash, Serialize)]
pub enum EngineFlowState {
    #[default]
    Playing,
    Paused,
}

#[derive(Resource, Clone)]
pub struct RuntimeState {
    pub state: EngineFlowState,
    entered_at: Instant,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            state: EngineFlowState::Playing,
            entered_at: Instant::now(),
        }
    }
}

#[derive(Serialize, Clone)]
pub struct RuntimeStateSnapshot {
    pub state: EngineFlowState,
    pub time_in_state_seconds: f32,
}

impl RuntimeState {
    /// Returns whether the state changed.
    pub fn set_state(&mut self, to: EngineFlowState) -> bool {
        if self.state == to {
            return false;
        }
        self.state = to;
        self.entered_at = Instant::now();
        true
    }

    pub fn toggle_pause(&mut self) -> EngineFlowState {
        let next = match self.state {
            EngineFlowState::Playing => EngineFlowState::Paused,
            EngineFlowState::Paused => EngineFlowState::Playing,
        };
        self.set_state(next);
        next
    }

    pub fn is_gameplay_active(&self) -> bool {
        self.state == EngineFlowState::Playing
    }

    pub fn snapshot(&self) -> RuntimeStateSnapshot {
        RuntimeStateSnapshot {
            state: self.state,
            time_in_state_seconds: self.entered_at.elapsed().as_secs_f32(),
        }
    }
}

pub fn gameplay_systems_enabled(
    state: Option<Res<State<EngineFlowState>>>,
    runtime: Option<Res<RuntimeState>>,
) -> bool {
    if let Some(state) = state {
        return *state.get() == EngineFlowState::Playing;
    }
    runtime.map(|r| r.is_gameplay_active()).unwrap_or(false)
}

fn toggle_pause_on_start(
    input: Res<VirtualInput>,
    mut runtime: ResMut<RuntimeState>,
    mut bus: ResMut<GameEventBus>,
) {
    if !input.start_just_pressed() {
        return;
    }
    let before = runtime.snapshot();
    let kind = match runtime.toggle_pause() {
        EngineFlowState::Paused => GameEventKind::Paused,
        EngineFlowState::Playing => GameEventKind::Resumed,
    };
    info!(
        "[Gridrunner] {} after {:.1}s {:?}",
        kind.name(),
        before.time_in_state_seconds,
        before.state
    );
    bus.emit(kind, None);
}

fn sync_bevy_state_from_runtime(
    runtime: Res<RuntimeState>,
    state: Res<State<EngineFlowState>>,
    mut next_state: ResMut<NextState<EngineFlowState>>,
) {
    if state.get() != &runtime.state {
        next_state.set(runtime.state);
    }
}

pub struct RuntimeStatePlugin;

impl Plugin for RuntimeStatePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(RuntimeState::default())
            .init_state::<EngineFlowState>()
            .add_systems(
                Update,
                (
                    toggle_pause_on_start.run_if(resource_exists::<VirtualInput>),
                    sync_bevy_state_from_runtime,
                )
                    .chain(),
            );
    }
}
