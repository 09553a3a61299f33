use bevy::prelude::*;

use crate::rigid_body::IRect;

/// What the world around an off-player object looks like this frame.
#[derive(Clone, Copy, Debug)]
pub struct StageView {
    pub viewport: IRect,
    pub room: IRect,
    pub camera_transitioning: bool,
    /// The player is spawning or refilling health; on-screen objects hold still.
    pub player_busy: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenceAction {
    /// Run behavior and integrate this frame.
    Update,
    /// Return to the initial state.
    Reset,
    Idle,
}

/// Activity gating shared by platforms and enemies: objects only simulate
/// while visible, or while inside the current room when room-persistent.
#[derive(Component, Clone, Debug)]
pub struct ScreenPresence {
    pub initial_position: Vec2,
    pub room_persistent: bool,
    pub exited_screen: bool,
    invoked_reset: bool,
}

impl ScreenPresence {
    pub fn new(initial_position: Vec2, room_persistent: bool) -> Self {
        Self {
            initial_position,
            room_persistent,
            exited_screen: false,
            invoked_reset: true,
        }
    }

    pub fn can_update(&self, bounds: IRect, view: &StageView) -> bool {
        if view.viewport.touches(&bounds) {
            !view.camera_transitioning && !view.player_busy
        } else {
            self.room_persistent && view.room.intersects(&bounds)
        }
    }

    /// Decides this frame's action for an object currently at `bounds`.
    pub fn evaluate(&mut self, bounds: IRect, view: &StageView) -> PresenceAction {
        if self.can_update(bounds, view) {
            self.invoked_reset = false;
            return PresenceAction::Update;
        }
        if !self.room_persistent && !view.camera_transitioning && !self.invoked_reset {
            let home = IRect::new(
                self.initial_position.x,
                self.initial_position.y,
                bounds.width,
                bounds.height,
            );
            if !view.viewport.touches(&home) {
                return PresenceAction::Reset;
            }
        }
        PresenceAction::Idle
    }

    /// Records where the object ended up after an update.
    pub fn after_update(&mut self, bounds: IRect, viewport: IRect) {
        self.exited_screen = !viewport.touches(&bounds);
    }

    /// Requests a reset on spawn or room change; false when one already happened
    /// since the object last updated.
    pub fn claim_reset(&mut self) -> bool {
        !self.invoked_reset
    }

    pub fn mark_reset(&mut self) {
        self.exited_screen = false;
        self.invoked_reset = true;
    }

    /// Drawn only while on screen; non-persistent objects stay hidden once they
    /// left the screen until they reset.
    pub fn visible(&self, bounds: IRect, viewport: IRect) -> bool {
        viewport.touches(&bounds) && (self.room_persistent || !self.exited_screen)
    }
}
