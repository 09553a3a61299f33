use bevy::prelude::*;

use crate::components::Facing;
use crate::config::{CrawlerTuning, PhysicsTuning};
use crate::physics_core::Physics;
use crate::rigid_body::{Body, IRect};
use crate::tilemap::Tilemap;
use crate::timer::FrameTimer;

/// Ground enemy that walks at a constant speed and turns around at walls.
/// Buster shots wear its health down; at zero it stays out until reset.
#[derive(Component, Clone, Debug)]
pub struct Crawler {
    pub tuning: CrawlerTuning,
    pub initial_facing: Facing,
    health: i32,
    hit_flash: FrameTimer,
}

impl Crawler {
    /// Builds a crawler standing on the bottom-center of the marker tile whose
    /// top-left corner is `tile_origin`.
    pub fn spawn_at(
        tile_origin: Vec2,
        tilemap: &Tilemap,
        tuning: &CrawlerTuning,
        physics: &PhysicsTuning,
    ) -> (Crawler, Body, Physics) {
        let position = Vec2::new(
            tile_origin.x - (tuning.width / 2) as f32 + (tilemap.tile_width / 2) as f32,
            tile_origin.y + (tilemap.tile_height - tuning.height) as f32,
        );
        let crawler = Crawler {
            tuning: tuning.clone(),
            initial_facing: Facing::Left,
            health: tuning.max_health,
            hit_flash: FrameTimer::new(tuning.hit_flash_ms),
        };
        let body = Body::new(position, tuning.width, tuning.height);
        let physics = Physics::new(physics.clone(), crawler.initial_facing);
        (crawler, body, physics)
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn is_defeated(&self) -> bool {
        self.health == 0
    }

    /// Briefly true after each hit that leaves it standing.
    pub fn is_flashing(&self) -> bool {
        self.hit_flash.is_active()
    }

    /// Returns the health left.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        self.health = (self.health - amount.max(0)).max(0);
        if self.is_defeated() {
            self.hit_flash.stop();
        } else {
            self.hit_flash.restart();
        }
        self.health
    }

    /// Turns around after a side hit, then walks on.
    pub fn behave(&mut self, body: &mut Body, physics: &mut Physics, frame_ms: u32) {
        self.hit_flash.tick(frame_ms);
        if body.sides.hit_left() || body.sides.hit_right() {
            physics.facing = physics.facing.flipped();
        }
        let speed = physics.facing.sign() * self.tuning.walk_speed;
        physics.drive(body, speed);
    }

    pub fn reset(&mut self, body: &mut Body, physics: &mut Physics, initial_position: Vec2) {
        self.health = self.tuning.max_health;
        self.hit_flash.stop();
        body.position = initial_position;
        physics.stop(body);
        body.sides = Default::default();
        physics.facing = self.initial_facing;
        physics.previous_position = initial_position;
    }

    /// Damage dealt to a player whose bounds are `player`, if they overlap.
    pub fn contact_damage(&self, body: &Body, player: IRect) -> Option<i32> {
        body.bounding_box()
            .intersects(&player)
            .then_some(self.tuning.contact_damage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{TileLayer, TileType};

    fn walled_corridor() -> Tilemap {
        let mut map = Tilemap::new(12, 8, 64);
        map.fill(TileLayer::Level, (0, 6), (11, 7), TileType::Solid);
        map.fill(TileLayer::Level, (2, 0), (2, 5), TileType::Solid);
        map.fill(TileLayer::Level, (9, 0), (9, 5), TileType::Solid);
        map
    }

    #[test]
    fn spawns_on_the_bottom_center_of_its_tile() {
        let map = walled_corridor();
        let (_, body, physics) = Crawler::spawn_at(
            Vec2::new(320.0, 320.0),
            &map,
            &CrawlerTuning::default(),
            &PhysicsTuning::default(),
        );
        assert_eq!(body.position, Vec2::new(320.0 - 27.0 + 32.0, 320.0 + 20.0));
        assert_eq!(body.bottom(), 384.0);
        assert_eq!(physics.facing, Facing::Left);
    }

    #[test]
    fn turns_around_between_walls() {
        let map = walled_corridor();
        let (mut crawler, mut body, mut physics) = Crawler::spawn_at(
            Vec2::new(320.0, 320.0),
            &map,
            &CrawlerTuning::default(),
            &PhysicsTuning::default(),
        );
        let mut turned_right = false;
        let mut turned_left_again = false;
        for _ in 0..600 {
            crawler.behave(&mut body, &mut physics, 16);
            physics.step(&mut body, &map, |_| {});
            assert!(body.left() >= 192.0 && body.right() <= 576.0);
            match physics.facing {
                Facing::Right => turned_right = true,
                Facing::Left if turned_right => turned_left_again = true,
                Facing::Left => {}
            }
        }
        assert!(turned_right && turned_left_again);
        assert_eq!(body.bottom(), 384.0);
    }

    #[test]
    fn overlap_deals_contact_damage_and_reset_restores_home() {
        let map = walled_corridor();
        let home = Vec2::new(300.0, 340.0);
        let (mut crawler, mut body, mut physics) = Crawler::spawn_at(
            Vec2::new(300.0, 320.0),
            &map,
            &CrawlerTuning::default(),
            &PhysicsTuning::default(),
        );
        let touching = IRect::new(body.right() - 10.0, body.top(), 54, 88);
        let apart = IRect::new(body.right() + 10.0, body.top(), 54, 88);
        assert_eq!(crawler.contact_damage(&body, touching), Some(10));
        assert_eq!(crawler.contact_damage(&body, apart), None);

        body.position.x += 90.0;
        physics.facing = Facing::Right;
        crawler.reset(&mut body, &mut physics, home);
        assert_eq!(body.position, home);
        assert_eq!(body.speed, Vec2::ZERO);
        assert_eq!(physics.facing, Facing::Left);
    }

    #[test]
    fn three_shots_defeat_it_and_reset_heals() {
        let map = walled_corridor();
        let (mut crawler, mut body, mut physics) = Crawler::spawn_at(
            Vec2::new(320.0, 320.0),
            &map,
            &CrawlerTuning::default(),
            &PhysicsTuning::default(),
        );
        assert_eq!(crawler.take_damage(5), 10);
        assert!(crawler.is_flashing());
        for _ in 0..4 {
            crawler.behave(&mut body, &mut physics, 16);
        }
        assert!(crawler.is_flashing());
        crawler.behave(&mut body, &mut physics, 16);
        assert!(!crawler.is_flashing());

        assert_eq!(crawler.take_damage(5), 5);
        assert_eq!(crawler.take_damage(40), 0);
        assert!(crawler.is_defeated());
        assert!(!crawler.is_flashing());

        crawler.reset(&mut body, &mut physics, Vec2::new(325.0, 340.0));
        assert_eq!(crawler.health(), 15);
        assert!(!crawler.is_defeated());
    }
}
