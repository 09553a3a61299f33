use bevy::prelude::*;

use crate::components::Facing;
use crate::config::PhysicsTuning;
use crate::rigid_body::Body;
use crate::tilemap::Tilemap;

/// Clamp that tolerates crossed bounds; the lower bound wins in that case.
pub fn clamp_low_wins(value: f32, min: f32, max: f32) -> f32 {
    let capped = if value > max { max } else { value };
    if capped < min {
        min
    } else {
        capped
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// First grounded frame after being airborne.
    pub landed: bool,
}

/// Gravity, acceleration curves and motion classification layered on a [`Body`].
#[derive(Component, Clone, Debug)]
pub struct Physics {
    pub tuning: PhysicsTuning,
    pub apply_gravity: bool,
    pub facing: Facing,
    pub previous_position: Vec2,
    was_on_ground: bool,
    moved_on_x: bool,
}

impl Physics {
    pub fn new(tuning: PhysicsTuning, facing: Facing) -> Self {
        Self {
            tuning,
            apply_gravity: true,
            facing,
            previous_position: Vec2::ZERO,
            was_on_ground: false,
            moved_on_x: false,
        }
    }

    pub fn is_on_ground(&self, body: &Body) -> bool {
        body.sides.hit_below()
    }

    pub fn is_jumping(&self, body: &Body) -> bool {
        body.speed.y < 0.0
    }

    pub fn is_falling(&self, body: &Body) -> bool {
        body.speed.y > 0.0 && !body.sides.hit_below()
    }

    /// Signed push of the conveyor the body rested on during the last step.
    pub fn conveyor_speed(&self, body: &Body) -> f32 {
        body.conveyor_direction * self.tuning.conveyor_speed
    }

    pub fn is_moving(&self, body: &Body) -> bool {
        (body.speed.x - self.conveyor_speed(body)).abs() > f32::EPSILON
            || body.speed.y < 0.0
            || body.speed.y > self.tuning.ground_adhesion
    }

    pub fn distance_traveled(&self, body: &Body) -> Vec2 {
        body.position - self.previous_position
    }

    /// Stands in for a skipped step so the frame reports no travel.
    pub fn hold_position(&mut self, body: &Body) {
        self.previous_position = body.position;
    }

    /// One frame: gravity, tile and platform collision, then speed fix-up.
    pub fn step<F>(&mut self, body: &mut Body, tilemap: &Tilemap, platform_pass: F) -> StepOutcome
    where
        F: FnMut(&mut Body),
    {
        self.was_on_ground = self.is_on_ground(body);
        self.previous_position = body.position;

        if self.apply_gravity {
            body.speed.y = clamp_low_wins(
                body.speed.y + self.tuning.gravity,
                -self.tuning.jump_speed,
                self.tuning.max_fall_speed,
            );
        }

        body.step(tilemap, platform_pass);
        self.fix_speed(body);

        StepOutcome {
            landed: !self.was_on_ground && self.is_on_ground(body),
        }
    }

    fn fix_speed(&mut self, body: &mut Body) {
        if self.is_on_ground(body) {
            body.speed.y = self.tuning.ground_adhesion;
        } else if body.sides.hit_above() {
            body.speed.y = 0.0;
        }
        if !self.moved_on_x {
            body.speed.x = self.conveyor_speed(body);
        }
        self.moved_on_x = false;
    }

    pub fn jump(&mut self, body: &mut Body) -> bool {
        if self.is_on_ground(body) && !self.is_jumping(body) {
            body.speed.y = -self.tuning.jump_speed;
            return true;
        }
        false
    }

    pub fn cancel_jump(&mut self, body: &mut Body) {
        if self.is_jumping(body) {
            body.speed.y = 0.0;
        }
    }

    pub fn move_right(&mut self, body: &mut Body) {
        self.facing = Facing::Right;
        let limit = self.tuning.max_horizontal_speed + self.conveyor_speed(body);
        let t = &self.tuning;
        body.speed.x = if self.is_on_ground(body) {
            clamp_low_wins(
                (body.speed.x + t.horizontal_acceleration) * t.ground_multiplier,
                0.0,
                limit,
            )
        } else {
            clamp_low_wins(
                (body.speed.x + t.horizontal_acceleration) * t.air_multiplier,
                t.air_floor,
                limit,
            )
        };
        self.moved_on_x = true;
    }

    pub fn move_left(&mut self, body: &mut Body) {
        self.facing = Facing::Left;
        let limit = -self.tuning.max_horizontal_speed + self.conveyor_speed(body);
        let t = &self.tuning;
        body.speed.x = if self.is_on_ground(body) {
            clamp_low_wins(
                (body.speed.x - t.horizontal_acceleration) * t.ground_multiplier,
                limit,
                0.0,
            )
        } else {
            clamp_low_wins(
                (body.speed.x - t.horizontal_acceleration) * t.air_multiplier,
                limit,
                -t.air_floor,
            )
        };
        self.moved_on_x = true;
    }

    pub fn move_towards(&mut self, body: &mut Body, facing: Facing) {
        match facing {
            Facing::Left => self.move_left(body),
            Facing::Right => self.move_right(body),
        }
    }

    /// Sets a fixed horizontal speed for this frame, bypassing the curves.
    pub fn drive(&mut self, body: &mut Body, speed_x: f32) {
        if speed_x > 0.0 {
            self.facing = Facing::Right;
        } else if speed_x < 0.0 {
            self.facing = Facing::Left;
        }
        body.speed.x = speed_x;
        self.moved_on_x = true;
    }

    pub fn stop(&mut self, body: &mut Body) {
        body.speed = Vec2::ZERO;
        self.moved_on_x = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{TileLayer, TileType};

    fn floor_map(tile_size: i32, floor_row: i32) -> Tilemap {
        let mut map = Tilemap::new(12, (floor_row + 2) as usize, tile_size);
        map.fill(
            TileLayer::Level,
            (0, floor_row),
            (11, floor_row + 1),
            TileType::Solid,
        );
        map
    }

    fn settle(physics: &mut Physics, body: &mut Body, map: &Tilemap, frames: usize) -> usize {
        let mut landings = 0;
        for _ in 0..frames {
            if physics.step(body, map, |_| {}).landed {
                landings += 1;
            }
        }
        landings
    }

    #[test]
    fn falling_body_lands_once_on_floor_at_700() {
        let map = floor_map(50, 14);
        let mut body = Body::new(Vec2::new(100.0, 100.0), 54, 88);
        body.speed.y = 10.0;
        let mut physics = Physics::new(PhysicsTuning::default(), Facing::Right);

        let landings = settle(&mut physics, &mut body, &map, 120);
        assert_eq!(landings, 1);
        assert_eq!(body.bottom(), 700.0);
        assert!(physics.is_on_ground(&body));
        assert!(!physics.is_falling(&body));
    }

    #[test]
    fn grounded_idle_body_does_not_drift() {
        let map = floor_map(64, 10);
        let mut body = Body::new(Vec2::new(200.0, 640.0 - 88.0 - 30.0), 54, 88);
        let mut physics = Physics::new(PhysicsTuning::default(), Facing::Right);
        settle(&mut physics, &mut body, &map, 30);
        assert!(physics.is_on_ground(&body));

        let rest = body.position;
        for _ in 0..200 {
            physics.step(&mut body, &map, |_| {});
            assert_eq!(body.position, rest);
            assert_eq!(body.speed.y, physics.tuning.ground_adhesion);
            assert!(!physics.is_moving(&body));
        }
    }

    #[test]
    fn ground_acceleration_curve_reaches_cap() {
        let map = floor_map(64, 10);
        let mut body = Body::new(Vec2::new(64.0, 640.0 - 88.0), 54, 88);
        let mut physics = Physics::new(PhysicsTuning::default(), Facing::Left);
        settle(&mut physics, &mut body, &map, 2);

        physics.move_right(&mut body);
        assert!((body.speed.x - 0.09 * 1.35).abs() < 1e-5);
        assert_eq!(physics.facing, Facing::Right);
        for _ in 0..40 {
            physics.step(&mut body, &map, |_| {});
            physics.move_right(&mut body);
        }
        assert_eq!(body.speed.x, 5.2);
    }

    #[test]
    fn air_steering_has_a_minimum_speed() {
        let map = floor_map(64, 10);
        let mut body = Body::new(Vec2::new(64.0, 64.0), 54, 88);
        let mut physics = Physics::new(PhysicsTuning::default(), Facing::Right);
        physics.move_left(&mut body);
        assert_eq!(body.speed.x, -2.0);
        physics.step(&mut body, &map, |_| {});
        assert_eq!(body.speed.x, -2.0);
        assert_eq!(body.position.x, 62.0);
        // Without a request the horizontal speed drops back to zero.
        physics.step(&mut body, &map, |_| {});
        assert_eq!(body.speed.x, 0.0);
    }

    #[test]
    fn conveyor_pushes_idle_body() {
        let mut map = floor_map(64, 10);
        map.fill(TileLayer::Level, (0, 10), (11, 10), TileType::ConveyorRight);
        let mut body = Body::new(Vec2::new(100.0, 640.0 - 88.0), 54, 88);
        let mut physics = Physics::new(PhysicsTuning::default(), Facing::Right);
        physics.step(&mut body, &map, |_| {});
        assert_eq!(body.conveyor_direction, 1.0);
        assert_eq!(body.speed.x, 4.0);
        let x = body.position.x;
        physics.step(&mut body, &map, |_| {});
        assert_eq!(body.position.x, x + 4.0);
    }

    #[test]
    fn conveyor_push_follows_the_tuning() {
        let mut map = floor_map(64, 10);
        map.fill(TileLayer::Level, (0, 10), (11, 10), TileType::ConveyorLeft);
        let mut body = Body::new(Vec2::new(300.0, 640.0 - 88.0), 54, 88);
        let tuning = PhysicsTuning {
            conveyor_speed: 8.0,
            ..PhysicsTuning::default()
        };
        let mut physics = Physics::new(tuning, Facing::Right);
        physics.step(&mut body, &map, |_| {});
        assert_eq!(body.speed.x, -8.0);
        let x = body.position.x;
        for _ in 0..3 {
            physics.step(&mut body, &map, |_| {});
        }
        assert_eq!(body.position.x, x - 24.0);
        assert!(!physics.is_moving(&body));

        // A belt faster than walking pins a body walking against it.
        let pinned = body.position.x;
        for _ in 0..20 {
            physics.move_right(&mut body);
            physics.step(&mut body, &map, |_| {});
        }
        assert_eq!(body.position.x, pinned);
    }

    #[test]
    fn jump_needs_ground_and_ceiling_hit_stops_rise() {
        let mut map = floor_map(64, 10);
        map.fill(TileLayer::Level, (0, 6), (11, 6), TileType::Solid);
        let mut body = Body::new(Vec2::new(100.0, 640.0 - 88.0), 54, 88);
        let mut physics = Physics::new(PhysicsTuning::default(), Facing::Right);
        assert!(!physics.jump(&mut body));
        physics.step(&mut body, &map, |_| {});
        assert!(physics.jump(&mut body));
        assert!(physics.is_jumping(&body));

        let mut bonked = false;
        for _ in 0..10 {
            physics.step(&mut body, &map, |_| {});
            if body.sides.hit_above() {
                bonked = true;
                assert_eq!(body.speed.y, 0.0);
                assert_eq!(body.top(), 7.0 * 64.0);
                break;
            }
        }
        assert!(bonked);
    }

    #[test]
    fn cancel_jump_only_affects_rising_bodies() {
        let mut body = Body::new(Vec2::ZERO, 10, 10);
        let mut physics = Physics::new(PhysicsTuning::default(), Facing::Right);
        body.speed.y = 3.0;
        physics.cancel_jump(&mut body);
        assert_eq!(body.speed.y, 3.0);
        body.speed.y = -3.0;
        physics.cancel_jump(&mut body);
        assert_eq!(body.speed.y, 0.0);
    }

    #[test]
    fn clamp_low_wins_when_bounds_cross() {
        assert_eq!(clamp_low_wins(5.0, 2.0, 1.0), 2.0);
        assert_eq!(clamp_low_wins(-5.0, -1.0, 3.0), -1.0);
        assert_eq!(clamp_low_wins(0.5, 0.0, 1.0), 0.5);
    }
}
