use bevy::prelude::*;

/// Marks the player entity
#[derive(Component)]
pub struct Player;

/// Marks enemy entities
#[derive(Component)]
pub struct Enemy;

/// Sprite standing for one slot of the player's shot pool.
#[derive(Component, Clone, Copy, Debug)]
pub struct ShotSprite(pub usize);

/// True when the app runs without a window (no sprites, no render camera).
#[derive(Resource, Clone, Copy, Default)]
pub struct HeadlessMode(pub bool);

/// Tile semantics stored per grid cell. The numeric values are the level file encoding.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum TileType {
    Empty = 0,
    Solid = 1,
    Ladder = 2,
    ConveyorLeft = 3,
    ConveyorRight = 4,
    Checkpoint = 5,
    LevelStart = 6,
    RoomLimit = 7,
    TransitionUp = 8,
    TransitionDown = 9,
    TransitionLeft = 10,
    TransitionRight = 11,
    FallingPlatform = 20,
    FloatingPlatformLeft = 21,
    FloatingPlatformRight = 22,
    FloatingPlatformUp = 23,
    FloatingPlatformDown = 24,
    ShuttlePlatformLeft = 25,
    ShuttlePlatformRight = 26,
    PlatformLimit = 27,
    SpikePlatformHorizontal = 28,
    SpikePlatformVertical = 29,
    Crawler = 30,
}

impl TileType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => TileType::Solid,
            2 => TileType::Ladder,
            3 => TileType::ConveyorLeft,
            4 => TileType::ConveyorRight,
            5 => TileType::Checkpoint,
            6 => TileType::LevelStart,
            7 => TileType::RoomLimit,
            8 => TileType::TransitionUp,
            9 => TileType::TransitionDown,
            10 => TileType::TransitionLeft,
            11 => TileType::TransitionRight,
            20 => TileType::FallingPlatform,
            21 => TileType::FloatingPlatformLeft,
            22 => TileType::FloatingPlatformRight,
            23 => TileType::FloatingPlatformUp,
            24 => TileType::FloatingPlatformDown,
            25 => TileType::ShuttlePlatformLeft,
            26 => TileType::ShuttlePlatformRight,
            27 => TileType::PlatformLimit,
            28 => TileType::SpikePlatformHorizontal,
            29 => TileType::SpikePlatformVertical,
            30 => TileType::Crawler,
            _ => TileType::Empty,
        }
    }

    pub fn is_solid(self) -> bool {
        self == TileType::Solid
    }

    pub fn is_conveyor(self) -> bool {
        matches!(self, TileType::ConveyorLeft | TileType::ConveyorRight)
    }

    /// Sign of the push a conveyor applies to whatever rests on it.
    pub fn conveyor_direction(self) -> f32 {
        match self {
            TileType::ConveyorLeft => -1.0,
            TileType::ConveyorRight => 1.0,
            _ => 0.0,
        }
    }

    pub fn transition_direction(self) -> Option<Direction> {
        match self {
            TileType::TransitionUp => Some(Direction::Up),
            TileType::TransitionDown => Some(Direction::Down),
            TileType::TransitionLeft => Some(Direction::Left),
            TileType::TransitionRight => Some(Direction::Right),
            _ => None,
        }
    }

    /// Tiles that bound a room on the camera layer.
    pub fn is_room_limit(self) -> bool {
        self == TileType::RoomLimit || self.transition_direction().is_some()
    }
}

/// Named tile layers of a level.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileLayer {
    /// Collision geometry, ladders, conveyors and checkpoint markers.
    Level,
    /// Room limits and transition markers.
    Camera,
    /// Moving platform spawn markers and their limit markers.
    Platforms,
    /// Enemy spawn markers.
    Enemies,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_codes_round_trip_through_from_u8() {
        for tile in [
            TileType::Solid,
            TileType::Ladder,
            TileType::ConveyorRight,
            TileType::TransitionLeft,
            TileType::ShuttlePlatformRight,
            TileType::Crawler,
        ] {
            assert_eq!(TileType::from_u8(tile as u8), tile);
        }
        assert_eq!(TileType::from_u8(250), TileType::Empty);
    }

    #[test]
    fn transition_markers_bound_rooms() {
        assert!(TileType::RoomLimit.is_room_limit());
        assert!(TileType::TransitionDown.is_room_limit());
        assert!(!TileType::Solid.is_room_limit());
        assert_eq!(
            TileType::TransitionRight.transition_direction(),
            Some(Direction::Right)
        );
    }
}
