use bevy::prelude::*;
use serde::Serialize;

use crate::camera::{CameraSignal, RoomCamera};
use crate::checkpoint::CheckpointStore;
use crate::components::{Direction, Facing, TileLayer, TileType};
use crate::config::{ControllerTuning, PhysicsTuning, WeaponTuning};
use crate::events::{GameEventBus, GameEventKind};
use crate::input::Buttons;
use crate::physics_core::Physics;
use crate::rigid_body::Body;
use crate::tilemap::Tilemap;
use crate::timer::FrameTimer;
use crate::weapon::{muzzle, Buster};

/// Movement mode; exactly one is active at any frame boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerMode {
    Spawning,
    Grounded,
    Airborne,
    Sliding,
    OnLadder,
    Dying,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Motion {
    Spawning,
    Free,
    Sliding { timer: FrameTimer },
    OnLadder { can_quit: bool },
    Dying { countdown: FrameTimer },
}

/// Conditions layered over the movement mode. Never both at once.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Overlay {
    Clear,
    Damaged { timer: FrameTimer },
    Recovering { target: i32 },
}

/// Shared world state the controller reads and writes during one frame.
pub struct FrameContext<'a> {
    pub tilemap: &'a Tilemap,
    pub camera: &'a mut RoomCamera,
    pub checkpoints: &'a mut CheckpointStore,
    pub events: &'a mut GameEventBus,
    pub frame_ms: u32,
    /// Entity id stamped on emitted events.
    pub source: Option<u64>,
}

impl FrameContext<'_> {
    fn emit(&mut self, kind: GameEventKind) {
        self.events.emit(kind, self.source);
    }
}

/// Player state machine driving a [`Body`] and its [`Physics`].
#[derive(Component, Clone, Debug)]
pub struct Controller {
    pub tuning: ControllerTuning,
    pub buster: Buster,
    motion: Motion,
    overlay: Overlay,
    invulnerability: FrameTimer,
    health: i32,
    /// Armed by releasing jump; consumed by the next jump or slide press.
    can_jump_slide: bool,
    spawn_landed: bool,
    walk_speed: f32,
    walk_acceleration: f32,
}

impl Controller {
    pub fn new(tuning: ControllerTuning, physics: &PhysicsTuning, weapon: &WeaponTuning) -> Self {
        Self {
            invulnerability: FrameTimer::new(tuning.invulnerability_ms),
            health: tuning.max_health,
            tuning,
            buster: Buster::new(weapon.clone()),
            motion: Motion::Free,
            overlay: Overlay::Clear,
            can_jump_slide: false,
            spawn_landed: false,
            walk_speed: physics.max_horizontal_speed,
            walk_acceleration: physics.horizontal_acceleration,
        }
    }

    pub fn mode(&self, body: &Body) -> ControllerMode {
        match self.motion {
            Motion::Spawning => ControllerMode::Spawning,
            Motion::Sliding { .. } => ControllerMode::Sliding,
            Motion::OnLadder { .. } => ControllerMode::OnLadder,
            Motion::Dying { .. } => ControllerMode::Dying,
            Motion::Free if body.sides.hit_below() => ControllerMode::Grounded,
            Motion::Free => ControllerMode::Airborne,
        }
    }

    pub fn overlay(&self) -> Overlay {
        self.overlay
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn is_damaged(&self) -> bool {
        matches!(self.overlay, Overlay::Damaged { .. })
    }

    pub fn is_recovering(&self) -> bool {
        matches!(self.overlay, Overlay::Recovering { .. })
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerability.is_active()
    }

    pub fn is_spawning(&self) -> bool {
        matches!(self.motion, Motion::Spawning)
    }

    pub fn is_dying(&self) -> bool {
        matches!(self.motion, Motion::Dying { .. })
    }

    /// Spawning or refilling health; on-screen objects wait meanwhile.
    pub fn is_busy(&self) -> bool {
        self.is_spawning() || self.is_recovering()
    }

    fn is_sliding(&self) -> bool {
        matches!(self.motion, Motion::Sliding { .. })
    }

    fn is_on_ladder(&self) -> bool {
        matches!(self.motion, Motion::OnLadder { .. })
    }

    /// One frame: input and timers, then the buster, then the physics step,
    /// then the camera.
    pub fn advance<F>(
        &mut self,
        body: &mut Body,
        physics: &mut Physics,
        input: Buttons,
        ctx: &mut FrameContext,
        platform_pass: F,
    ) where
        F: FnMut(&mut Body),
    {
        if self.is_spawning() {
            self.handle_spawn(body, physics, ctx);
        } else if self.is_recovering() {
            self.handle_recovery(ctx);
        } else {
            if !ctx.camera.is_transitioning() {
                self.handle_input(body, physics, input, ctx);
                if let Some(point) = ctx.checkpoints.search(ctx.tilemap, body.center()) {
                    info!("[Gridrunner] checkpoint recorded at ({}, {})", point.x, point.y);
                    ctx.emit(GameEventKind::CheckpointReached {
                        x: point.x,
                        y: point.y,
                    });
                }
            }
            self.handle_buster(body, physics, input, ctx);
        }

        if !ctx.camera.is_transitioning() && !self.is_recovering() {
            let outcome = physics.step(body, ctx.tilemap, platform_pass);
            if outcome.landed {
                let after_spawn = !self.spawn_landed;
                self.spawn_landed = true;
                ctx.emit(GameEventKind::Landed { after_spawn });
            }
        } else {
            physics.hold_position(body);
        }

        match ctx.camera.update(ctx.tilemap, body, physics) {
            Some(CameraSignal::TransitionStarted(direction)) => {
                self.buster.clear();
                if direction == Direction::Down {
                    self.cancel_slide(body, physics, ctx.tilemap);
                }
                ctx.emit(GameEventKind::TransitionStarted { direction });
            }
            Some(CameraSignal::TransitionFinished(direction)) => {
                ctx.emit(GameEventKind::TransitionFinished { direction });
            }
            None => {}
        }
    }

    fn handle_input(
        &mut self,
        body: &mut Body,
        physics: &mut Physics,
        input: Buttons,
        ctx: &mut FrameContext,
    ) {
        let ms = ctx.frame_ms;
        if let Motion::Sliding { timer } = &mut self.motion {
            timer.tick(ms);
        }
        let damage_over = match &mut self.overlay {
            Overlay::Damaged { timer, .. } => timer.tick(ms),
            _ => false,
        };
        if damage_over {
            self.overlay = Overlay::Clear;
        }
        if self.invulnerability.tick(ms) {
            debug!("[Gridrunner] invulnerability over");
        }
        let death_over = match &mut self.motion {
            Motion::Dying { countdown } => Some(countdown.tick(ms)),
            _ => None,
        };
        match death_over {
            Some(true) => {
                self.start_spawn(body, physics, ctx);
                return;
            }
            Some(false) => return,
            None => {}
        }

        if self.is_damaged() {
            body.speed.x = -physics.facing.sign() * self.tuning.recoil_speed;
            return;
        }
        if self.is_on_ladder() {
            self.handle_ladder(body, physics, input, ctx);
            return;
        }

        if input.jump {
            if self.can_jump_slide {
                if input.down {
                    self.start_slide(body, physics, ctx);
                } else if physics.is_on_ground(body) {
                    self.cancel_slide(body, physics, ctx.tilemap);
                    physics.jump(body);
                }
                self.can_jump_slide = false;
            }
        } else {
            physics.cancel_jump(body);
            self.can_jump_slide = true;
        }

        if self.is_sliding() {
            self.handle_slide(body, physics, input, ctx.tilemap);
            return;
        }

        // Right wins over Left when both are held.
        if input.right {
            physics.move_right(body);
        } else if input.left {
            physics.move_left(body);
        }

        if ladder_below(body, ctx.tilemap) {
            if input.down {
                self.grab_ladder(body, physics, ctx, true);
            }
        } else if ladder_at_center(body, ctx.tilemap)
            && (input.up || (input.down && !physics.is_on_ground(body)))
        {
            self.grab_ladder(body, physics, ctx, false);
        }
    }

    /// Moves live shots, then fires on the shoot press when allowed.
    fn handle_buster(
        &mut self,
        body: &Body,
        physics: &mut Physics,
        input: Buttons,
        ctx: &mut FrameContext,
    ) {
        self.buster.advance(ctx.camera.viewport(), ctx.frame_ms);
        if !self.buster.press(input.shoot) {
            return;
        }
        let allowed = !self.is_sliding()
            && !ctx.camera.is_transitioning()
            && !self.is_damaged()
            && !self.is_dying()
            && self.buster.has_free_slot();
        if !allowed {
            return;
        }
        if self.is_on_ladder() {
            if input.left {
                physics.facing = Facing::Left;
            } else if input.right {
                physics.facing = Facing::Right;
            }
        }
        let origin = muzzle(&self.buster.tuning, body, physics);
        if self.buster.fire(origin, physics.facing) {
            debug!("[Gridrunner] shot fired facing {:?}", physics.facing);
            ctx.emit(GameEventKind::ShotFired);
        }
    }

    fn start_slide(&mut self, body: &mut Body, physics: &mut Physics, ctx: &mut FrameContext) {
        if !physics.is_on_ground(body) || self.is_sliding() {
            return;
        }
        let mut timer = FrameTimer::new(self.tuning.slide_ms);
        timer.start();
        self.motion = Motion::Sliding { timer };
        body.set_height_keep_bottom(self.tuning.slide_height);
        physics.tuning.max_horizontal_speed = self.tuning.slide_speed;
        physics.tuning.horizontal_acceleration = self.tuning.slide_acceleration;
        debug!("[Gridrunner] slide started facing {:?}", physics.facing);
        ctx.emit(GameEventKind::SlideStarted);
    }

    /// Stands back up unless a tile sits right above the head. Returns whether
    /// the slide ended.
    fn cancel_slide(&mut self, body: &mut Body, physics: &mut Physics, tilemap: &Tilemap) -> bool {
        if !self.is_sliding() {
            return false;
        }
        if body.has_wall_at_offset(tilemap, Vec2::new(0.0, -self.tuning.overhead_check)) {
            return false;
        }
        self.stand_up(body, physics);
        debug!("[Gridrunner] slide ended");
        true
    }

    fn stand_up(&mut self, body: &mut Body, physics: &mut Physics) {
        if self.is_sliding() {
            self.motion = Motion::Free;
        }
        body.set_height_keep_bottom(self.tuning.height);
        physics.tuning.max_horizontal_speed = self.walk_speed;
        physics.tuning.horizontal_acceleration = self.walk_acceleration;
    }

    fn handle_slide(&mut self, body: &mut Body, physics: &mut Physics, input: Buttons, tilemap: &Tilemap) {
        let ahead = Vec2::new(physics.facing.sign(), 0.0);
        let expired = matches!(self.motion, Motion::Sliding { timer } if !timer.is_active());
        if body.has_wall_at_offset(tilemap, ahead) || expired || physics.is_falling(body) {
            self.cancel_slide(body, physics, tilemap);
        }

        let reverse = match physics.facing {
            Facing::Right => input.left,
            Facing::Left => input.right,
        };
        if reverse {
            physics.facing = physics.facing.flipped();
            self.cancel_slide(body, physics, tilemap);
        } else {
            let facing = physics.facing;
            physics.move_towards(body, facing);
        }
    }

    fn grab_ladder(
        &mut self,
        body: &mut Body,
        physics: &mut Physics,
        ctx: &mut FrameContext,
        from_top: bool,
    ) {
        physics.apply_gravity = false;
        if from_top {
            body.position.y += (body.height / 2) as f32;
        }
        let column = ctx
            .tilemap
            .align_x((body.position.x + (body.width / 2) as f32) as i32);
        body.position.x = (column + ctx.tilemap.tile_width / 2 - body.width / 2) as f32;
        body.speed = Vec2::ZERO;
        self.motion = Motion::OnLadder { can_quit: false };
        debug!("[Gridrunner] ladder grabbed at column {}", column);
        ctx.emit(GameEventKind::LadderGrabbed);
    }

    fn quit_ladder(
        &mut self,
        body: &mut Body,
        physics: &mut Physics,
        ctx: &mut FrameContext,
        at_top: bool,
    ) {
        physics.apply_gravity = true;
        if at_top {
            let row = ctx.tilemap.align_y(body.position.y as i32);
            body.position.y = (row + ctx.tilemap.tile_height - body.height) as f32;
        }
        body.speed = Vec2::ZERO;
        self.motion = Motion::Free;
        debug!("[Gridrunner] ladder released (top: {})", at_top);
        ctx.emit(GameEventKind::LadderReleased);
    }

    fn handle_ladder(&mut self, body: &mut Body, physics: &mut Physics, input: Buttons, ctx: &mut FrameContext) {
        body.speed.y = 0.0;
        let can_quit = matches!(self.motion, Motion::OnLadder { can_quit: true });
        if input.jump && !input.up && !input.down {
            if can_quit {
                self.quit_ladder(body, physics, ctx, false);
                return;
            }
        } else {
            self.motion = Motion::OnLadder { can_quit: true };
        }

        // No climbing during the shooting pose.
        if !self.buster.is_posing() {
            if input.up {
                body.speed.y = -self.tuning.ladder_speed;
            } else if input.down {
                body.speed.y = self.tuning.ladder_speed;
            }
        }

        if !ladder_at_center(body, ctx.tilemap) {
            let center = body.center();
            let near_top = ctx.tilemap.kind_at(
                TileLayer::Level,
                center.x as i32,
                (center.y - self.tuning.ladder_top_epsilon) as i32,
            ) != TileType::Ladder;
            self.quit_ladder(body, physics, ctx, near_top);
        } else if physics.is_on_ground(body) {
            self.quit_ladder(body, physics, ctx, false);
        }
    }

    /// False while a room transition runs, while invulnerable, while dying,
    /// spawning or refilling health.
    pub fn can_inflict_damage(&self, camera_transitioning: bool) -> bool {
        !camera_transitioning
            && !self.invulnerability.is_active()
            && !self.is_dying()
            && !self.is_spawning()
            && !self.is_recovering()
    }

    pub fn inflict_damage(
        &mut self,
        amount: i32,
        body: &mut Body,
        physics: &mut Physics,
        ctx: &mut FrameContext,
    ) -> bool {
        if !self.can_inflict_damage(ctx.camera.is_transitioning()) {
            return false;
        }
        self.health = (self.health - amount).clamp(0, self.tuning.max_health);
        if self.health == 0 {
            self.stop_movement(body, physics, ctx);
            let mut countdown = FrameTimer::new(self.tuning.death_ms);
            countdown.start();
            self.motion = Motion::Dying { countdown };
            self.overlay = Overlay::Clear;
            info!("[Gridrunner] player died");
            ctx.emit(GameEventKind::Died);
            return true;
        }

        let mut timer = FrameTimer::new(self.tuning.damage_ms);
        timer.start();
        self.invulnerability.restart();
        if physics.is_jumping(body) {
            physics.cancel_jump(body);
        } else if self.is_on_ladder() {
            self.quit_ladder(body, physics, ctx, false);
        } else {
            // Under a low ceiling the slide goes on.
            self.cancel_slide(body, physics, ctx.tilemap);
        }
        self.overlay = Overlay::Damaged { timer };
        debug!("[Gridrunner] damaged by {} (health {})", amount, self.health);
        ctx.emit(GameEventKind::Damaged {
            amount,
            health: self.health,
        });
        true
    }

    /// Starts refilling health by `increment`, one point per frame.
    pub fn recover_health(&mut self, increment: i32, ctx: &mut FrameContext) -> bool {
        if self.is_recovering()
            || self.health >= self.tuning.max_health
            || self.is_dying()
            || ctx.camera.is_transitioning()
        {
            return false;
        }
        let target = (self.health + increment).clamp(0, self.tuning.max_health);
        self.overlay = Overlay::Recovering { target };
        self.invulnerability.stop();
        ctx.emit(GameEventKind::HealthRecoveryStarted { target });
        true
    }

    fn handle_recovery(&mut self, ctx: &mut FrameContext) {
        let Overlay::Recovering { target } = self.overlay else {
            return;
        };
        self.health += 1;
        if self.health >= target {
            self.health = target;
            self.overlay = Overlay::Clear;
            ctx.emit(GameEventKind::HealthRecovered {
                health: self.health,
            });
        }
    }

    fn stop_movement(&mut self, body: &mut Body, physics: &mut Physics, ctx: &mut FrameContext) {
        body.speed = Vec2::ZERO;
        physics.cancel_jump(body);
        self.cancel_slide(body, physics, ctx.tilemap);
        if self.is_on_ladder() {
            self.quit_ladder(body, physics, ctx, false);
        }
        physics.apply_gravity = false;
    }

    fn reset(&mut self, body: &mut Body, physics: &mut Physics, ctx: &mut FrameContext) {
        self.stop_movement(body, physics, ctx);
        // A slide blocked from standing up still ends here.
        self.stand_up(body, physics);
        self.buster.clear();
        self.motion = Motion::Free;
        self.overlay = Overlay::Clear;
        self.invulnerability.stop();
        self.health = self.tuning.max_health;
        self.spawn_landed = false;
    }

    /// Drops the body from the top of the viewport onto the last checkpoint.
    pub fn start_spawn(&mut self, body: &mut Body, physics: &mut Physics, ctx: &mut FrameContext) {
        self.reset(body, physics, ctx);
        body.handle_collisions = false;
        self.motion = Motion::Spawning;

        match ctx.checkpoints.last() {
            Some(checkpoint) => {
                ctx.camera.reset_to_checkpoint(ctx.tilemap, checkpoint);
                body.position.x = checkpoint.x - (body.width / 2) as f32
                    + (ctx.tilemap.tile_width / 2) as f32;
                info!(
                    "[Gridrunner] spawning at checkpoint ({}, {})",
                    checkpoint.x, checkpoint.y
                );
            }
            None => warn!("[Gridrunner] spawning without a checkpoint"),
        }
        body.position.y = ctx.camera.position.y;
        ctx.emit(GameEventKind::SpawnStarted);
    }

    fn handle_spawn(&mut self, body: &mut Body, physics: &mut Physics, ctx: &mut FrameContext) {
        match ctx.checkpoints.last() {
            Some(checkpoint) if body.bottom() < checkpoint.y => {
                body.speed.y += self.tuning.spawn_descent_acceleration;
            }
            _ => {
                self.motion = Motion::Free;
                physics.apply_gravity = true;
                body.handle_collisions = true;
                debug!("[Gridrunner] spawn finished at {:?}", body.position);
                ctx.emit(GameEventKind::SpawnFinished);
            }
        }
    }
}

/// Feet on the topmost tile of a ladder.
fn ladder_below(body: &Body, tilemap: &Tilemap) -> bool {
    let x = (body.position.x + (body.width / 2) as f32) as i32;
    let y = (body.position.y + body.height as f32) as i32;
    tilemap.is_top_ladder(x, y)
}

fn ladder_at_center(body: &Body, tilemap: &Tilemap) -> bool {
    let center = body.center();
    tilemap.kind_at(TileLayer::Level, center.x as i32, center.y as i32) == TileType::Ladder
}
