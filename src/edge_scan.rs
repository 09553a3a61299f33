use bevy::math::Vec2;

use crate::components::{TileLayer, TileType};
use crate::tilemap::Tilemap;

/// Distance between samples along a scanned edge.
pub const SAMPLE_SPACING: i32 = 32;

/// Bounds of the body being scanned. Position is the top-left corner.
#[derive(Clone, Copy, Debug)]
pub struct ScanBounds {
    pub position: Vec2,
    pub width: i32,
    pub height: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScanHit {
    pub blocked: bool,
    /// Push direction (`-1` or `1`) when the scan went downward onto a
    /// conveyor the body rests on.
    pub conveyor: Option<f32>,
}

/// Sample offsets along an edge of `length` pixels, always including both ends.
fn sample_offsets(length: i32) -> impl Iterator<Item = i32> {
    let last = (length - 1).max(0);
    let count = length.max(0) / SAMPLE_SPACING + 1;
    (0..=count).map(move |i| (i * SAMPLE_SPACING).clamp(0, last))
}

/// Tests the tiles just beyond the leading edge of `bounds` displaced by `offset`.
/// Only one axis of `offset` is expected to be non-zero; a zero offset finds nothing.
pub fn obstacle_at_offset(tilemap: &Tilemap, bounds: ScanBounds, offset: Vec2) -> ScanHit {
    let ScanBounds {
        position,
        width,
        height,
    } = bounds;

    if offset.x != 0.0 {
        let edge = if offset.x > 0.0 {
            position.x + width as f32 + offset.x
        } else {
            position.x + offset.x
        };
        for inc in sample_offsets(height) {
            let x = edge as i32;
            let y = (position.y + offset.y + inc as f32) as i32;
            let tile = tilemap.kind_at(TileLayer::Level, x, y);
            if tile.is_solid() || tile.is_conveyor() {
                return ScanHit {
                    blocked: true,
                    conveyor: None,
                };
            }
        }
    }

    if offset.y != 0.0 {
        let downward = offset.y > 0.0;
        let edge = if downward {
            position.y + height as f32 + offset.y
        } else {
            position.y + offset.y
        };
        let bottom = position.y + height as f32;
        for inc in sample_offsets(width) {
            let x = (position.x + offset.x + inc as f32) as i32;
            let y = edge as i32;
            let tile = tilemap.kind_at(TileLayer::Level, x, y);
            let tile_top = tilemap.align_y(y) as f32;
            match tile {
                TileType::Solid => {
                    return ScanHit {
                        blocked: true,
                        conveyor: None,
                    };
                }
                TileType::ConveyorLeft | TileType::ConveyorRight => {
                    let conveyor =
                        (downward && bottom <= tile_top).then(|| tile.conveyor_direction());
                    return ScanHit {
                        blocked: true,
                        conveyor,
                    };
                }
                TileType::Ladder if downward => {
                    if tilemap.is_top_ladder(x, y) && bottom <= tile_top {
                        return ScanHit {
                            blocked: true,
                            conveyor: None,
                        };
                    }
                }
                _ => {}
            }
        }
    }

    ScanHit::default()
}
