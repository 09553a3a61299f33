use bevy::prelude::*;

use crate::components::Facing;
use crate::config::WeaponTuning;
use crate::physics_core::Physics;
use crate::rigid_body::{Body, IRect};
use crate::timer::FrameTimer;

/// A buster pellet. Shots ignore tiles and fly straight until they leave the
/// viewport or hit an enemy.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Shot {
    /// Top-left corner.
    pub position: Vec2,
    pub speed_x: f32,
    pub active: bool,
}

/// Fixed pool of shots fired on the shoot press edge.
#[derive(Clone, Debug)]
pub struct Buster {
    pub tuning: WeaponTuning,
    shots: Vec<Shot>,
    pose: FrameTimer,
    /// Shoot was down on the last update; a held button fires once.
    shoot_held: bool,
}

impl Buster {
    pub fn new(tuning: WeaponTuning) -> Self {
        Self {
            shots: vec![Shot::default(); tuning.max_shots],
            pose: FrameTimer::new(tuning.pose_ms),
            shoot_held: false,
            tuning,
        }
    }

    pub fn shots(&self) -> &[Shot] {
        &self.shots
    }

    pub fn active_count(&self) -> usize {
        self.shots.iter().filter(|s| s.active).count()
    }

    pub fn has_free_slot(&self) -> bool {
        self.active_count() < self.tuning.max_shots
    }

    /// Shooting pose; ladder climbing waits for it to end.
    pub fn is_posing(&self) -> bool {
        self.pose.is_active()
    }

    pub fn shot_bounds(&self, shot: &Shot) -> IRect {
        IRect::new(
            shot.position.x,
            shot.position.y,
            self.tuning.shot_width,
            self.tuning.shot_height,
        )
    }

    /// Ticks the pose and moves every shot, retiring those outside `viewport`.
    pub fn advance(&mut self, viewport: IRect, frame_ms: u32) {
        self.pose.tick(frame_ms);
        let width = self.tuning.shot_width as f32;
        let height = self.tuning.shot_height as f32;
        for shot in self.shots.iter_mut().filter(|s| s.active) {
            shot.position.x += shot.speed_x;
            let p = shot.position;
            if p.x > viewport.right() as f32
                || p.x + width < viewport.x as f32
                || p.y + height > viewport.bottom() as f32
                || p.y < viewport.y as f32
            {
                shot.active = false;
            }
        }
    }

    /// Records the shoot button. True only on the frame it goes down.
    pub fn press(&mut self, shoot: bool) -> bool {
        let pressed = shoot && !self.shoot_held;
        self.shoot_held = shoot;
        pressed
    }

    /// Launches a shot centered on `muzzle`. False when every slot is in flight.
    pub fn fire(&mut self, muzzle: Vec2, facing: Facing) -> bool {
        let half = Vec2::new(
            (self.tuning.shot_width / 2) as f32,
            (self.tuning.shot_height / 2) as f32,
        );
        let speed_x = facing.sign() * self.tuning.shot_speed;
        let Some(slot) = self.shots.iter_mut().find(|s| !s.active) else {
            return false;
        };
        *slot = Shot {
            position: muzzle - half,
            speed_x,
            active: true,
        };
        self.pose.restart();
        true
    }

    /// Spends the first live shot overlapping `target` and returns its damage.
    pub fn take_hit(&mut self, target: IRect) -> Option<i32> {
        let (width, height) = (self.tuning.shot_width, self.tuning.shot_height);
        let shot = self.shots.iter_mut().find(|s| {
            s.active && IRect::new(s.position.x, s.position.y, width, height).intersects(&target)
        })?;
        shot.active = false;
        Some(self.tuning.shot_damage)
    }

    pub fn clear(&mut self) {
        for shot in self.shots.iter_mut() {
            shot.active = false;
        }
        self.pose.stop();
    }
}

/// Center of a new shot for a body in its current motion.
pub fn muzzle(tuning: &WeaponTuning, body: &Body, physics: &Physics) -> Vec2 {
    let x = match physics.facing {
        Facing::Right => body.right() + tuning.muzzle_forward,
        Facing::Left => body.left() - tuning.muzzle_forward,
    };
    let drop = if physics.is_on_ground(body) {
        if physics.is_moving(body) {
            tuning.muzzle_running
        } else {
            tuning.muzzle_standing
        }
    } else if physics.is_jumping(body) {
        tuning.muzzle_rising
    } else {
        tuning.muzzle_running
    };
    Vec2::new(x, body.top() + drop)
}
