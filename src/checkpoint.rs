use bevy::prelude::*;

use crate::components::{TileLayer, TileType};
use crate::tilemap::Tilemap;

/// Ordered, duplicate-free list of reached respawn points. The last entry is
/// where the player respawns.
#[derive(Resource, Default, Clone, Debug)]
pub struct CheckpointStore {
    points: Vec<Vec2>,
}

impl CheckpointStore {
    pub fn reset(&mut self) {
        self.points.clear();
    }

    /// Appends `point` unless it was already reached. Returns whether it was new.
    pub fn add(&mut self, point: Vec2) -> bool {
        if self.points.contains(&point) {
            return false;
        }
        self.points.push(point);
        true
    }

    pub fn last(&self) -> Option<Vec2> {
        self.points.last().copied()
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Records the checkpoint column under `center`, if any. A column of stacked
    /// checkpoint tiles registers as its lowest tile's top-left corner.
    pub fn search(&mut self, tilemap: &Tilemap, center: Vec2) -> Option<Vec2> {
        let x = center.x as i32;
        let mut y = center.y as i32;
        if tilemap.kind_at(TileLayer::Level, x, y) != TileType::Checkpoint {
            return None;
        }
        while tilemap.kind_at(TileLayer::Level, x, y + tilemap.tile_height)
            == TileType::Checkpoint
        {
            y += tilemap.tile_height;
        }
        let point = Vec2::new(tilemap.align_x(x) as f32, tilemap.align_y(y) as f32);
        self.add(point).then_some(point)
    }

    /// Seeds the store with the level start marker's top-left corner.
    pub fn seed_from_level(&mut self, tilemap: &Tilemap) -> Result<Vec2, String> {
        let (tx, ty, _) = tilemap
            .markers(TileLayer::Level)
            .find(|(_, _, tile)| *tile == TileType::LevelStart)
            .ok_or_else(|| "level has no level start marker".to_string())?;
        let start = Vec2::new(
            (tx * tilemap.tile_width) as f32,
            (ty * tilemap.tile_height) as f32,
        );
        self.add(start);
        Ok(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_ignored_and_last_wins() {
        let mut store = CheckpointStore::default();
        assert_eq!(store.last(), None);
        assert!(store.add(Vec2::new(64.0, 128.0)));
        assert!(store.add(Vec2::new(640.0, 128.0)));
        assert!(!store.add(Vec2::new(64.0, 128.0)));
        assert_eq!(store.points().len(), 2);
        assert_eq!(store.last(), Some(Vec2::new(640.0, 128.0)));
        store.reset();
        assert!(store.points().is_empty());
    }

    #[test]
    fn stacked_checkpoints_register_their_lowest_tile() {
        let mut map = Tilemap::new(6, 8, 64);
        map.fill(TileLayer::Level, (3, 2), (3, 5), TileType::Checkpoint);
        let mut store = CheckpointStore::default();

        assert_eq!(store.search(&map, Vec2::new(100.0, 200.0)), None);
        let found = store.search(&map, Vec2::new(3.0 * 64.0 + 20.0, 2.0 * 64.0 + 30.0));
        assert_eq!(found, Some(Vec2::new(192.0, 320.0)));
        // Touching the same column again adds nothing.
        assert_eq!(store.search(&map, Vec2::new(200.0, 260.0)), None);
        assert_eq!(store.points().len(), 1);
    }

    #[test]
    fn level_start_seeds_first_checkpoint() {
        let map = Tilemap::test_level(64);
        let mut store = CheckpointStore::default();
        let start = store.seed_from_level(&map).expect("test level has a start");
        assert_eq!(start, Vec2::new(128.0, 576.0));
        assert_eq!(store.last(), Some(start));

        let empty = Tilemap::new(2, 2, 64);
        assert!(CheckpointStore::default().seed_from_level(&empty).is_err());
    }
}
