use bevy::prelude::*;

use crate::components::{Direction, TileLayer, TileType};
use crate::config::PlatformTuning;
use crate::rigid_body::{Body, IRect};
use crate::tilemap::Tilemap;
use crate::timer::FrameTimer;

/// Whose collision is being resolved. Rider flags only track the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiderKind {
    Player,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallPhase {
    Waiting,
    Bouncing { elapsed_ms: u32 },
    Settling { elapsed_ms: u32 },
    Falling,
}

/// Which pair of block faces carries spikes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpikeOrientation {
    /// Left and right faces.
    Horizontal,
    /// Top and bottom faces.
    Vertical,
}

impl SpikeOrientation {
    fn flipped(self) -> Self {
        match self {
            SpikeOrientation::Horizontal => SpikeOrientation::Vertical,
            SpikeOrientation::Vertical => SpikeOrientation::Horizontal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpikePhase {
    Idle,
    /// Warning before the spikes move.
    Flash,
    /// Retracting the current pair while the other pair comes out.
    Flip,
}

/// Static block whose spikes alternate between its side and end faces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpikeTrap {
    pub initial: SpikeOrientation,
    pub orientation: SpikeOrientation,
    pub phase: SpikePhase,
    timer: FrameTimer,
    /// How far the left and right spikes stick out.
    pub side_reach: i32,
    /// How far the top and bottom spikes stick out.
    pub end_reach: i32,
}

impl SpikeTrap {
    fn new(orientation: SpikeOrientation, tuning: &PlatformTuning) -> Self {
        let mut trap = Self {
            initial: orientation,
            orientation,
            phase: SpikePhase::Idle,
            timer: FrameTimer::new(tuning.spike_idle_ms),
            side_reach: 0,
            end_reach: 0,
        };
        trap.extend_fully(tuning);
        trap.timer.restart();
        trap
    }

    fn extend_fully(&mut self, tuning: &PlatformTuning) {
        let (side, end) = match self.orientation {
            SpikeOrientation::Horizontal => (tuning.spike_length, 0),
            SpikeOrientation::Vertical => (0, tuning.spike_length),
        };
        self.side_reach = side;
        self.end_reach = end;
    }

    fn enter(&mut self, phase: SpikePhase, duration_ms: u32) {
        self.phase = phase;
        self.timer = FrameTimer::new(duration_ms);
        self.timer.restart();
    }

    fn update(&mut self, tuning: &PlatformTuning, frame_ms: u32) {
        if self.timer.tick(frame_ms) {
            match self.phase {
                SpikePhase::Idle => self.enter(SpikePhase::Flash, tuning.spike_flash_ms),
                SpikePhase::Flash => self.enter(SpikePhase::Flip, tuning.spike_flip_ms),
                SpikePhase::Flip => {
                    self.orientation = self.orientation.flipped();
                    self.extend_fully(tuning);
                    self.enter(SpikePhase::Idle, tuning.spike_idle_ms);
                    return;
                }
            }
        }
        if self.phase != SpikePhase::Flip {
            return;
        }
        // The old pair is gone well before the new one is halfway out.
        let full = tuning.spike_length as f32;
        let t = self.timer.progress();
        let hiding = (full * (1.0 - (t + 0.6).min(1.0))) as i32;
        let showing = (full * (t - 0.5).max(0.0)) as i32;
        (self.side_reach, self.end_reach) = match self.orientation {
            SpikeOrientation::Horizontal => (hiding, showing),
            SpikeOrientation::Vertical => (showing, hiding),
        };
    }

    fn reset(&mut self, tuning: &PlatformTuning) {
        self.orientation = self.initial;
        self.extend_fully(tuning);
        self.enter(SpikePhase::Idle, tuning.spike_idle_ms);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlatformKind {
    /// Drops away once ridden.
    Falling { phase: FallPhase },
    /// Drifts back and forth between limit markers, easing through each turn.
    Floating {
        initial: Direction,
        heading: Direction,
        current_speed: f32,
    },
    /// Constant-speed horizontal carrier reversing at limit markers.
    Shuttle { initial: Direction, heading: Direction },
    /// Solid block that hurts whoever touches its extended spikes.
    Spike(SpikeTrap),
}

/// A platform with its own motion that bodies can stand on, bump into or be carried by.
#[derive(Component, Clone, Debug)]
pub struct MovingPlatform {
    pub position: Vec2,
    pub width: i32,
    pub height: i32,
    pub speed: Vec2,
    /// Collides only from above; bodies pass through from below and the sides.
    pub jump_over: bool,
    pub kind: PlatformKind,
    /// Whether the platform is simulated this frame. Inactive platforms do not collide.
    pub active: bool,
    pub rider_above: bool,
    pub rider_left: bool,
    pub rider_right: bool,
}

impl MovingPlatform {
    fn with_kind(position: Vec2, width: i32, height: i32, kind: PlatformKind) -> Self {
        let jump_over = matches!(kind, PlatformKind::Floating { .. });
        Self {
            position,
            width,
            height,
            speed: Vec2::ZERO,
            jump_over,
            kind,
            active: false,
            rider_above: false,
            rider_left: false,
            rider_right: false,
        }
    }

    pub fn falling(position: Vec2, tuning: &PlatformTuning) -> Self {
        Self::with_kind(
            position,
            tuning.falling_width,
            tuning.falling_height,
            PlatformKind::Falling {
                phase: FallPhase::Waiting,
            },
        )
    }

    pub fn floating(position: Vec2, direction: Direction, tuning: &PlatformTuning) -> Self {
        Self::with_kind(
            position,
            tuning.floating_width,
            tuning.floating_height,
            PlatformKind::Floating {
                initial: direction,
                heading: direction,
                current_speed: 0.0,
            },
        )
    }

    pub fn shuttle(position: Vec2, direction: Direction, tuning: &PlatformTuning) -> Self {
        let direction = if direction.is_horizontal() {
            direction
        } else {
            Direction::Right
        };
        Self::with_kind(
            position,
            tuning.shuttle_width,
            tuning.shuttle_height,
            PlatformKind::Shuttle {
                initial: direction,
                heading: direction,
            },
        )
    }

    pub fn spike(
        position: Vec2,
        orientation: SpikeOrientation,
        tuning: &PlatformTuning,
    ) -> Self {
        Self::with_kind(
            position,
            tuning.spike_block_size,
            tuning.spike_block_size,
            PlatformKind::Spike(SpikeTrap::new(orientation, tuning)),
        )
    }

    /// Builds the platform a Platforms-layer marker stands for, placed at the tile's top-left.
    pub fn from_marker(tile: TileType, position: Vec2, tuning: &PlatformTuning) -> Option<Self> {
        match tile {
            TileType::FallingPlatform => Some(Self::falling(position, tuning)),
            TileType::FloatingPlatformLeft => Some(Self::floating(position, Direction::Left, tuning)),
            TileType::FloatingPlatformRight => {
                Some(Self::floating(position, Direction::Right, tuning))
            }
            TileType::FloatingPlatformUp => Some(Self::floating(position, Direction::Up, tuning)),
            TileType::FloatingPlatformDown => Some(Self::floating(position, Direction::Down, tuning)),
            TileType::ShuttlePlatformLeft => Some(Self::shuttle(position, Direction::Left, tuning)),
            TileType::ShuttlePlatformRight => {
                Some(Self::shuttle(position, Direction::Right, tuning))
            }
            TileType::SpikePlatformHorizontal => {
                Some(Self::spike(position, SpikeOrientation::Horizontal, tuning))
            }
            TileType::SpikePlatformVertical => {
                Some(Self::spike(position, SpikeOrientation::Vertical, tuning))
            }
            _ => None,
        }
    }

    /// Keeps simulating off screen while inside the current room.
    pub fn room_persistent(&self) -> bool {
        !matches!(self.kind, PlatformKind::Falling { .. })
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

    pub fn bounds(&self) -> IRect {
        IRect::new(self.position.x, self.position.y, self.width, self.height)
    }

    /// Hurt boxes of the spikes currently sticking out, empty for other kinds.
    pub fn spike_boxes(&self, tuning: &PlatformTuning) -> Vec<IRect> {
        let PlatformKind::Spike(trap) = &self.kind else {
            return Vec::new();
        };
        let span = tuning.spike_span;
        let center = self.center();
        let (side, end) = (trap.side_reach, trap.end_reach);
        let row_y = center.y - (span / 2) as f32;
        let column_x = center.x - (span / 2) as f32;
        [
            IRect::new(self.left() - side as f32, row_y, side, span),
            IRect::new(self.right(), row_y, side, span),
            IRect::new(column_x, self.top() - end as f32, span, end),
            IRect::new(column_x, self.bottom(), span, end),
        ]
        .into_iter()
        .filter(|b| b.width > 0 && b.height > 0)
        .collect()
    }

    /// Damage dealt to a player whose bounds are `player`, if any spike reaches it.
    pub fn contact_damage(&self, player: IRect, tuning: &PlatformTuning) -> Option<i32> {
        if !self.active {
            return None;
        }
        self.spike_boxes(tuning)
            .iter()
            .any(|b| b.intersects(&player))
            .then_some(tuning.spike_damage)
    }

    /// Resolves overlap between this platform and `body` after the body's tile pass.
    pub fn resolve_against(&mut self, body: &mut Body, tilemap: &Tilemap, rider: RiderKind) {
        self.rider_above = false;
        self.rider_left = false;
        self.rider_right = false;
        if !self.active {
            return;
        }
        let is_player = rider == RiderKind::Player;

        if !self.jump_over {
            // Vertical displacement is taken out so only side contact counts here.
            let other = IRect::new(
                body.position.x,
                body.position.y - body.speed.y,
                body.width,
                body.height - 1,
            );
            let this = IRect::new(
                self.position.x,
                self.position.y - self.speed.y,
                self.width,
                self.height - 1,
            );
            if let Some(overlap) = this.intersect(&other) {
                if (overlap.center_x() as f32) < body.center().x {
                    body.position.x = self.right();
                    body.sides.x = -1;
                    self.rider_right = is_player;
                } else {
                    body.position.x = self.left() - body.width as f32;
                    body.sides.x = 1;
                    self.rider_left = is_player;
                }
            }
        }

        // A descending platform is tested at its pre-motion position so it keeps its rider.
        let catch_y = if self.speed.y > 0.0 {
            self.position.y - self.speed.y
        } else {
            self.position.y
        };
        let catch = IRect::new(
            self.position.x - self.speed.x,
            catch_y,
            self.width,
            self.height,
        );
        let Some(overlap) = catch.intersect(&body.bounding_box()) else {
            return;
        };

        if overlap.center_y() as f32 > body.center().y {
            if body.bottom() - body.speed.y - 1.0 <= self.top() - self.speed.y {
                if !body.has_wall_at_offset(tilemap, Vec2::new(0.0, self.speed.y)) {
                    body.position.y = self.top() - body.height as f32;
                } else {
                    let floor = tilemap.align_y((body.bottom() + self.speed.y) as i32);
                    body.position.y = (floor - body.height) as f32;
                }
                body.sides.y = 1;

                if self.speed.x != 0.0 {
                    if !body.has_wall_at_offset(tilemap, Vec2::new(self.speed.x, 0.0)) {
                        body.position.x += self.speed.x;
                    } else if self.speed.x < 0.0 {
                        let wall = tilemap.align_x((body.left() + self.speed.x) as i32);
                        body.position.x = (wall + tilemap.tile_width) as f32;
                    } else {
                        let wall = tilemap.align_x((body.right() + self.speed.x) as i32);
                        body.position.x = (wall - body.width) as f32;
                    }
                }
                self.rider_above = is_player;
            }
        } else if !self.jump_over {
            body.position.y = self.bottom();
            body.sides.y = -1;
        }
    }

    /// Per-frame behavior: sets `speed` for this frame. Returns true when a
    /// falling platform was just triggered by its rider.
    pub fn behave(&mut self, tilemap: &Tilemap, tuning: &PlatformTuning, frame_ms: u32) -> bool {
        self.speed = Vec2::ZERO;
        let limit_ahead = |platform: &MovingPlatform, heading: Direction| {
            let center = platform.center();
            let (x, y) = match heading {
                Direction::Right => (platform.right(), center.y),
                Direction::Left => (platform.left(), center.y),
                Direction::Up => (center.x, platform.top()),
                Direction::Down => (center.x, platform.bottom()),
            };
            tilemap.kind_at(TileLayer::Platforms, x as i32, y as i32) == TileType::PlatformLimit
        };

        let mut activated = false;
        let mut kind = self.kind.clone();
        match &mut kind {
            PlatformKind::Falling { phase } => match *phase {
                FallPhase::Waiting => {
                    if self.rider_above {
                        *phase = FallPhase::Bouncing { elapsed_ms: 0 };
                        activated = true;
                    }
                }
                FallPhase::Bouncing { elapsed_ms } => {
                    self.speed.y = tuning.falling_bounce_speed;
                    let elapsed_ms = elapsed_ms + frame_ms;
                    *phase = if elapsed_ms >= tuning.falling_bounce_ms {
                        FallPhase::Settling { elapsed_ms: 0 }
                    } else {
                        FallPhase::Bouncing { elapsed_ms }
                    };
                }
                FallPhase::Settling { elapsed_ms } => {
                    let elapsed_ms = elapsed_ms + frame_ms;
                    *phase = if elapsed_ms >= tuning.falling_wait_ms {
                        FallPhase::Falling
                    } else {
                        FallPhase::Settling { elapsed_ms }
                    };
                }
                FallPhase::Falling => {
                    self.speed.y = tuning.falling_speed;
                }
            },
            PlatformKind::Floating {
                heading,
                current_speed,
                ..
            } => {
                if limit_ahead(self, *heading) {
                    *heading = opposite(*heading);
                } else {
                    let delta = match heading {
                        Direction::Right | Direction::Down => tuning.floating_acceleration,
                        Direction::Left | Direction::Up => -tuning.floating_acceleration,
                    };
                    *current_speed = (*current_speed + delta)
                        .clamp(-tuning.floating_max_speed, tuning.floating_max_speed);
                }
                if heading.is_horizontal() {
                    self.speed.x = *current_speed;
                } else {
                    self.speed.y = *current_speed;
                }
            }
            PlatformKind::Shuttle { heading, .. } => {
                if limit_ahead(self, *heading) {
                    *heading = opposite(*heading);
                }
                self.speed.x = match heading {
                    Direction::Left => -tuning.shuttle_speed,
                    _ => tuning.shuttle_speed,
                };
            }
            PlatformKind::Spike(trap) => trap.update(tuning, frame_ms),
        }
        self.kind = kind;
        activated
    }

    pub fn advance(&mut self) {
        self.position += self.speed;
    }

    pub fn reset(&mut self, initial_position: Vec2, tuning: &PlatformTuning) {
        self.position = initial_position;
        self.speed = Vec2::ZERO;
        match &mut self.kind {
            PlatformKind::Falling { phase } => *phase = FallPhase::Waiting,
            PlatformKind::Floating {
                initial,
                heading,
                current_speed,
            } => {
                *heading = *initial;
                *current_speed = 0.0;
            }
            PlatformKind::Shuttle { initial, heading } => *heading = *initial,
            PlatformKind::Spike(trap) => trap.reset(tuning),
        }
    }
}

fn opposite(direction: Direction) -> Direction {
    match direction {
        Direction::Up => Direction::Down,
        Direction::Down => Direction::Up,
        Direction::Left => Direction::Right,
        Direction::Right => Direction::Left,
    }
}

/// Runs every active platform against one body, in order.
pub fn resolve_all<'a>(
    platforms: impl IntoIterator<Item = &'a mut MovingPlatform>,
    body: &mut Body,
    tilemap: &Tilemap,
    rider: RiderKind,
) {
    for platform in platforms {
        platform.resolve_against(body, tilemap, rider);
    }
}
