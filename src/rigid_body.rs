use bevy::prelude::*;

use crate::edge_scan::{obstacle_at_offset, ScanBounds};
use crate::tilemap::Tilemap;

/// Which side of a body collided during the last step, per axis in `{-1, 0, 1}`.
/// `x == 1` is a hit on the right, `y == 1` a hit below.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollisionSides {
    pub x: i8,
    pub y: i8,
}

impl CollisionSides {
    pub fn hit_below(self) -> bool {
        self.y == 1
    }

    pub fn hit_above(self) -> bool {
        self.y == -1
    }

    pub fn hit_right(self) -> bool {
        self.x == 1
    }

    pub fn hit_left(self) -> bool {
        self.x == -1
    }
}

/// Integer rectangle with truncating construction, used for overlap tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl IRect {
    pub fn new(x: f32, y: f32, width: i32, height: i32) -> Self {
        Self {
            x: x as i32,
            y: y as i32,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> i32 {
        self.x + self.width / 2
    }

    pub fn center_y(&self) -> i32 {
        self.y + self.height / 2
    }

    /// Overlapping region, `None` when the rectangles only touch or are apart.
    pub fn intersect(&self, other: &IRect) -> Option<IRect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > left && bottom > top).then(|| IRect {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }

    pub fn intersects(&self, other: &IRect) -> bool {
        self.intersect(other).is_some()
    }

    /// Edge-inclusive overlap: touching rectangles count.
    pub fn touches(&self, other: &IRect) -> bool {
        !(other.right() < self.x
            || other.x > self.right()
            || other.bottom() < self.y
            || other.y > self.bottom())
    }
}

/// Axis-aligned body moved through the tile grid one axis at a time.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct Body {
    /// Top-left corner.
    pub position: Vec2,
    pub width: i32,
    pub height: i32,
    pub speed: Vec2,
    pub sides: CollisionSides,
    /// Direction of the conveyor underfoot (`-1`, `0` or `1`), recomputed every step.
    pub conveyor_direction: f32,
    pub handle_collisions: bool,
}

impl Body {
    pub fn new(position: Vec2, width: i32, height: i32) -> Self {
        Self {
            position,
            width: width.max(0),
            height: height.max(0),
            speed: Vec2::ZERO,
            sides: CollisionSides::default(),
            conveyor_direction: 0.0,
            handle_collisions: true,
        }
    }

    pub fn left(&self) -> f32 {
        self.position.x
    }

    pub fn right(&self) -> f32 {
        self.position.x + self.width as f32
    }

    pub fn top(&self) -> f32 {
        self.position.y
    }

    pub fn bottom(&self) -> f32 {
        self.position.y + self.height as f32
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.position.x + (self.width / 2) as f32,
            self.position.y + (self.height / 2) as f32,
        )
    }

    pub fn bounding_box(&self) -> IRect {
        IRect::new(self.position.x, self.position.y, self.width, self.height)
    }

    pub fn scan_bounds(&self) -> ScanBounds {
        ScanBounds {
            position: self.position,
            width: self.width,
            height: self.height,
        }
    }

    /// Whether a wall lies at `offset` from the body. Records the conveyor
    /// direction when a downward check lands on a conveyor.
    pub fn has_wall_at_offset(&mut self, tilemap: &Tilemap, offset: Vec2) -> bool {
        let hit = obstacle_at_offset(tilemap, self.scan_bounds(), offset);
        if let Some(direction) = hit.conveyor {
            self.conveyor_direction = direction;
        }
        hit.blocked
    }

    /// Changes the height while keeping the bottom edge in place.
    pub fn set_height_keep_bottom(&mut self, height: i32) {
        let bottom = self.bottom();
        self.height = height.max(0);
        self.position.y = bottom - self.height as f32;
    }

    /// Moves the body by its speed, resolving tiles per axis and then running
    /// `platform_pass` so moving platforms can refine the result.
    pub fn step<F>(&mut self, tilemap: &Tilemap, mut platform_pass: F)
    where
        F: FnMut(&mut Body),
    {
        self.sides = CollisionSides::default();
        self.conveyor_direction = 0.0;

        if !self.handle_collisions {
            self.position += self.speed;
            return;
        }

        self.resolve_horizontal(tilemap);
        self.resolve_vertical(tilemap);
        platform_pass(self);
    }

    fn resolve_horizontal(&mut self, tilemap: &Tilemap) {
        if self.speed.x == 0.0 {
            return;
        }
        let next_x = (self.position.x + self.speed.x) as i32;
        if self.speed.x > 0.0 {
            let snap = tilemap.align_x(next_x + self.width);
            if self.has_wall_at_offset(tilemap, Vec2::new(self.speed.x, 0.0)) {
                self.position.x = (snap - self.width) as f32;
                self.sides.x = 1;
                return;
            }
        } else {
            let snap = tilemap.align_x(next_x - 1);
            if self.has_wall_at_offset(tilemap, Vec2::new(self.speed.x, 0.0)) {
                self.position.x = (snap + tilemap.tile_width) as f32;
                self.sides.x = -1;
                return;
            }
        }
        self.position.x += self.speed.x;
    }

    fn resolve_vertical(&mut self, tilemap: &Tilemap) {
        if self.speed.y == 0.0 {
            return;
        }
        let next_y = self.position.y + self.speed.y;
        if self.speed.y > 0.0 {
            let snap = tilemap.align_y((next_y + self.height as f32) as i32);
            if self.has_wall_at_offset(tilemap, Vec2::new(0.0, self.speed.y)) {
                self.position.y = (snap - self.height) as f32;
                self.sides.y = 1;
                return;
            }
        } else {
            let snap = tilemap.align_y(next_y as i32 - 1);
            if self.has_wall_at_offset(tilemap, Vec2::new(0.0, self.speed.y)) {
                self.position.y = (snap + tilemap.tile_height) as f32;
                self.sides.y = -1;
                return;
            }
        }
        self.position.y += self.speed.y;
    }
}
