use crate::components::*;
use bevy::prelude::*;

pub struct TilemapPlugin;

impl Plugin for TilemapPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, refresh_tile_sprites);
    }
}

fn default_tile_size() -> i32 {
    64
}

/// Level grid with one byte per cell on each named layer. World coordinates
/// are pixels with the origin at the top-left corner and y growing downward.
#[derive(Resource, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Tilemap {
    pub width: usize,
    pub height: usize,
    #[serde(default = "default_tile_size")]
    pub tile_width: i32,
    #[serde(default = "default_tile_size")]
    pub tile_height: i32,
    pub level: Vec<u8>,
    /// Missing layers read as empty.
    #[serde(default)]
    pub camera: Vec<u8>,
    #[serde(default)]
    pub platforms: Vec<u8>,
    #[serde(default)]
    pub enemies: Vec<u8>,
}

impl Tilemap {
    pub fn new(width: usize, height: usize, tile_size: i32) -> Self {
        let cells = width * height;
        Self {
            width,
            height,
            tile_width: tile_size,
            tile_height: tile_size,
            level: vec![0; cells],
            camera: vec![0; cells],
            platforms: vec![0; cells],
            enemies: vec![0; cells],
        }
    }

    pub fn layer(&self, layer: TileLayer) -> &[u8] {
        match layer {
            TileLayer::Level => &self.level,
            TileLayer::Camera => &self.camera,
            TileLayer::Platforms => &self.platforms,
            TileLayer::Enemies => &self.enemies,
        }
    }

    fn layer_mut(&mut self, layer: TileLayer) -> &mut Vec<u8> {
        let cells = self.width * self.height;
        let tiles = match layer {
            TileLayer::Level => &mut self.level,
            TileLayer::Camera => &mut self.camera,
            TileLayer::Platforms => &mut self.platforms,
            TileLayer::Enemies => &mut self.enemies,
        };
        if tiles.len() != cells {
            tiles.resize(cells, 0);
        }
        tiles
    }

    pub fn in_bounds(&self, tx: i32, ty: i32) -> bool {
        tx >= 0 && ty >= 0 && (tx as usize) < self.width && (ty as usize) < self.height
    }

    /// Tile at grid coordinates, or `None` outside the map.
    pub fn get(&self, layer: TileLayer, tx: i32, ty: i32) -> Option<TileType> {
        if !self.in_bounds(tx, ty) {
            return None;
        }
        let idx = ty as usize * self.width + tx as usize;
        Some(
            self.layer(layer)
                .get(idx)
                .map_or(TileType::Empty, |id| TileType::from_u8(*id)),
        )
    }

    pub fn set(&mut self, layer: TileLayer, tx: i32, ty: i32, tile: TileType) {
        if !self.in_bounds(tx, ty) {
            return;
        }
        let idx = ty as usize * self.width + tx as usize;
        self.layer_mut(layer)[idx] = tile as u8;
    }

    /// Fills an inclusive rectangle of grid cells.
    pub fn fill(&mut self, layer: TileLayer, from: (i32, i32), to: (i32, i32), tile: TileType) {
        for ty in from.1.min(to.1)..=from.1.max(to.1) {
            for tx in from.0.min(to.0)..=from.0.max(to.0) {
                self.set(layer, tx, ty, tile);
            }
        }
    }

    pub fn tile_x(&self, world_x: i32) -> i32 {
        world_x.div_euclid(self.tile_width)
    }

    pub fn tile_y(&self, world_y: i32) -> i32 {
        world_y.div_euclid(self.tile_height)
    }

    /// Tile at a world pixel, or `None` outside the map.
    pub fn tile_at(&self, layer: TileLayer, world_x: i32, world_y: i32) -> Option<TileType> {
        self.get(layer, self.tile_x(world_x), self.tile_y(world_y))
    }

    /// Like `tile_at` but reads the outside of the map as empty.
    pub fn kind_at(&self, layer: TileLayer, world_x: i32, world_y: i32) -> TileType {
        self.tile_at(layer, world_x, world_y)
            .unwrap_or(TileType::Empty)
    }

    /// Left edge of the tile column containing `world_x`.
    pub fn align_x(&self, world_x: i32) -> i32 {
        self.tile_x(world_x) * self.tile_width
    }

    /// Top edge of the tile row containing `world_y`.
    pub fn align_y(&self, world_y: i32) -> i32 {
        self.tile_y(world_y) * self.tile_height
    }

    /// A ladder tile with no ladder directly above it.
    pub fn is_top_ladder(&self, world_x: i32, world_y: i32) -> bool {
        self.kind_at(TileLayer::Level, world_x, world_y) == TileType::Ladder
            && self.kind_at(TileLayer::Level, world_x, world_y - self.tile_height)
                != TileType::Ladder
    }

    pub fn pixel_width(&self) -> i32 {
        self.width as i32 * self.tile_width
    }

    pub fn pixel_height(&self) -> i32 {
        self.height as i32 * self.tile_height
    }

    /// Non-empty cells of a layer as `(tx, ty, tile)`, row by row.
    pub fn markers(&self, layer: TileLayer) -> impl Iterator<Item = (i32, i32, TileType)> + '_ {
        let width = self.width.max(1);
        self.layer(layer)
            .iter()
            .enumerate()
            .filter(|(_, id)| **id != 0)
            .map(move |(idx, id)| {
                (
                    (idx % width) as i32,
                    (idx / width) as i32,
                    TileType::from_u8(*id),
                )
            })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("level must have a non-zero size".to_string());
        }
        if self.tile_width <= 0 || self.tile_height <= 0 {
            return Err(format!(
                "tile size must be positive, got {}x{}",
                self.tile_width, self.tile_height
            ));
        }
        let cells = self.width * self.height;
        for (name, layer) in [
            ("level", TileLayer::Level),
            ("camera", TileLayer::Camera),
            ("platforms", TileLayer::Platforms),
            ("enemies", TileLayer::Enemies),
        ] {
            let len = self.layer(layer).len();
            let optional = layer != TileLayer::Level && len == 0;
            if len != cells && !optional {
                return Err(format!(
                    "{name} layer has {len} cells, expected {cells} ({}x{})",
                    self.width, self.height
                ));
            }
        }
        if !self
            .markers(TileLayer::Level)
            .any(|(_, _, tile)| tile == TileType::LevelStart)
        {
            return Err("level has no level start marker".to_string());
        }
        Ok(())
    }

    pub fn from_json(contents: &str) -> Result<Self, String> {
        let tilemap: Tilemap =
            serde_json::from_str(contents).map_err(|e| format!("Invalid level file: {e}"))?;
        tilemap.validate()?;
        Ok(tilemap)
    }

    pub fn load(path: &str) -> Result<Self, String> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| format!("Failed to read {path}: {e}"))?;
        Self::from_json(&contents)
    }

    /// Three rooms: a start room, a room to its right, and a room below that one
    /// reached through a ladder shaft.
    pub fn test_level(tile_size: i32) -> Self {
        use TileLayer::*;
        use TileType::*;

        let mut map = Tilemap::new(32, 24, tile_size);

        // Outer walls, ceiling and the two floors
        map.fill(Level, (0, 0), (0, 23), Solid);
        map.fill(Level, (31, 0), (31, 23), Solid);
        map.fill(Level, (0, 0), (31, 0), Solid);
        map.fill(Level, (0, 10), (31, 11), Solid);
        map.fill(Level, (16, 22), (31, 23), Solid);
        map.fill(Level, (0, 12), (15, 23), Solid);

        // Start room: conveyor strip and a low step
        map.set(Level, 2, 9, LevelStart);
        map.fill(Level, (5, 10), (7, 10), ConveyorRight);
        map.fill(Level, (12, 9), (13, 9), Solid);

        // Right room: checkpoint, ladder down to the lower room
        map.set(Level, 20, 9, Checkpoint);
        map.fill(Level, (27, 10), (27, 21), Ladder);
        map.fill(Level, (24, 6), (24, 9), Ladder);

        // Lower room: a small ledge and a conveyor the other way
        map.fill(Level, (19, 18), (21, 18), Solid);
        map.fill(Level, (22, 21), (24, 21), ConveyorLeft);

        // Room bounds
        map.fill(Camera, (0, 0), (0, 11), RoomLimit);
        map.fill(Camera, (0, 0), (15, 0), RoomLimit);
        map.fill(Camera, (0, 11), (15, 11), RoomLimit);
        map.fill(Camera, (15, 0), (15, 11), RoomLimit);
        map.fill(Camera, (15, 7), (15, 9), TransitionRight);

        map.fill(Camera, (16, 0), (31, 0), RoomLimit);
        map.fill(Camera, (16, 0), (16, 11), RoomLimit);
        map.fill(Camera, (16, 7), (16, 9), TransitionLeft);
        map.fill(Camera, (31, 0), (31, 11), RoomLimit);
        map.fill(Camera, (16, 11), (31, 11), RoomLimit);
        map.fill(Camera, (26, 11), (28, 11), TransitionDown);

        map.fill(Camera, (16, 12), (31, 12), RoomLimit);
        map.fill(Camera, (26, 12), (28, 12), TransitionUp);
        map.fill(Camera, (16, 12), (16, 23), RoomLimit);
        map.fill(Camera, (31, 12), (31, 23), RoomLimit);
        map.fill(Camera, (16, 23), (31, 23), RoomLimit);

        // Platforms
        map.set(Platforms, 9, 5, FallingPlatform);
        map.set(Platforms, 18, 4, FloatingPlatformRight);
        map.set(Platforms, 17, 4, PlatformLimit);
        map.set(Platforms, 23, 4, PlatformLimit);
        map.set(Platforms, 19, 15, ShuttlePlatformRight);
        map.set(Platforms, 17, 15, PlatformLimit);
        map.set(Platforms, 29, 15, PlatformLimit);

        // Enemies
        map.set(Enemies, 10, 9, Crawler);
        map.set(Enemies, 26, 21, Crawler);

        map
    }
}

/// Marker for tile visual entities (so we can despawn them when reloading)
#[derive(Component)]
pub struct TileEntity;

pub fn tile_color_sprite(tile_type: TileType, width: f32, height: f32) -> Option<Sprite> {
    let color = match tile_type {
        TileType::Solid => Color::srgb(0.4, 0.4, 0.45),
        TileType::Ladder => Color::srgb(0.72, 0.47, 0.2),
        TileType::ConveyorLeft | TileType::ConveyorRight => Color::srgb(0.2, 0.65, 0.9),
        TileType::Checkpoint | TileType::LevelStart => Color::srgba(0.15, 0.9, 0.3, 0.35),
        _ => return None,
    };
    Some(Sprite::from_color(color, Vec2::new(width, height)))
}

fn refresh_tile_sprites(
    mut commands: Commands,
    tilemap: Res<Tilemap>,
    headless: Res<HeadlessMode>,
    existing: Query<Entity, With<TileEntity>>,
) {
    if headless.0 || !tilemap.is_changed() {
        return;
    }
    for entity in existing.iter() {
        commands.entity(entity).despawn();
    }
    let tw = tilemap.tile_width as f32;
    let th = tilemap.tile_height as f32;
    for (tx, ty, tile) in tilemap.markers(TileLayer::Level) {
        let Some(sprite) = tile_color_sprite(tile, tw, th) else {
            continue;
        };
        let center = Vec2::new(tx as f32 * tw + tw / 2.0, ty as f32 * th + th / 2.0);
        commands.spawn((
            TileEntity,
            sprite,
            Transform::from_translation(crate::render::world_to_screen(center, 0.0)),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_lookup_uses_floor_division_and_bounds() {
        let mut map = Tilemap::new(4, 4, 64);
        map.set(TileLayer::Level, 1, 2, TileType::Solid);
        assert_eq!(map.tile_at(TileLayer::Level, 64, 128), Some(TileType::Solid));
        assert_eq!(map.tile_at(TileLayer::Level, 127, 191), Some(TileType::Solid));
        assert_eq!(map.tile_at(TileLayer::Level, 128, 128), Some(TileType::Empty));
        assert_eq!(map.tile_at(TileLayer::Level, -1, 0), None);
        assert_eq!(map.kind_at(TileLayer::Level, 0, 4 * 64), TileType::Empty);
    }

    #[test]
    fn top_ladder_requires_no_ladder_above() {
        let mut map = Tilemap::new(3, 6, 64);
        map.fill(TileLayer::Level, (1, 2), (1, 4), TileType::Ladder);
        assert!(map.is_top_ladder(64 + 10, 2 * 64 + 5));
        assert!(!map.is_top_ladder(64 + 10, 3 * 64 + 5));
        assert!(!map.is_top_ladder(64 + 10, 5 * 64));
    }

    #[test]
    fn missing_optional_layers_read_as_empty() {
        let json = r#"{"width":2,"height":2,"level":[6,0,1,1]}"#;
        let map = Tilemap::from_json(json).expect("level should parse");
        assert_eq!(map.tile_width, 64);
        assert_eq!(map.get(TileLayer::Camera, 1, 1), Some(TileType::Empty));
        assert_eq!(map.get(TileLayer::Level, 0, 0), Some(TileType::LevelStart));
    }

    #[test]
    fn validation_requires_level_start() {
        let json = r#"{"width":2,"height":1,"level":[0,1]}"#;
        let err = Tilemap::from_json(json).expect_err("level without start should fail");
        assert!(err.contains("level start"));

        let json = r#"{"width":2,"height":1,"level":[6,1],"camera":[0]}"#;
        let err = Tilemap::from_json(json).expect_err("short layer should fail");
        assert!(err.contains("camera layer"));
    }

    #[test]
    fn test_level_is_valid() {
        let map = Tilemap::test_level(64);
        assert!(map.validate().is_ok());
        assert_eq!(map.pixel_width(), 32 * 64);
    }
}
