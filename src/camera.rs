use bevy::prelude::*;

use crate::components::{Direction, HeadlessMode, TileLayer};
use crate::config::CameraTuning;
use crate::events::{EventCursor, GameEventBus, GameEventKind};
use crate::physics_core::{clamp_low_wins, Physics};
use crate::rigid_body::{Body, IRect};
use crate::tilemap::Tilemap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub direction: Direction,
    /// Viewport position the pan ends on.
    pub target: Vec2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraSignal {
    TransitionStarted(Direction),
    TransitionFinished(Direction),
}

/// Viewport that follows the player inside the current room and pans to the
/// neighboring room when the player touches a transition marker.
#[derive(Resource, Clone, Debug)]
pub struct RoomCamera {
    /// Top-left corner of the viewport in world pixels.
    pub position: Vec2,
    pub width: i32,
    pub height: i32,
    pub room: IRect,
    transition: Option<Transition>,
    tuning: CameraTuning,
}

impl RoomCamera {
    pub fn new(tuning: CameraTuning) -> Self {
        Self {
            position: Vec2::ZERO,
            width: tuning.viewport_width,
            height: tuning.viewport_height,
            room: IRect::new(0.0, 0.0, tuning.viewport_width, tuning.viewport_height),
            transition: None,
            tuning,
        }
    }

    pub fn viewport(&self) -> IRect {
        IRect::new(self.position.x, self.position.y, self.width, self.height)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.position.x + (self.width / 2) as f32,
            self.position.y + (self.height / 2) as f32,
        )
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

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn transition(&self) -> Option<Transition> {
        self.transition
    }

    /// One frame of camera work for the controlled body, run after its physics step.
    pub fn update(
        &mut self,
        tilemap: &Tilemap,
        body: &mut Body,
        physics: &mut Physics,
    ) -> Option<CameraSignal> {
        self.clamp_body(body, physics);

        if let Some(transition) = self.transition {
            return self.advance_transition(transition, tilemap, body);
        }

        self.follow(body, physics);
        self.clamp_to_room();
        self.check_transition_tiles(tilemap, body, physics)
    }

    /// Keeps the body inside the viewport. Hitting the top cancels a jump.
    fn clamp_body(&self, body: &mut Body, physics: &mut Physics) {
        if body.left() < self.left() {
            body.position.x = self.left();
        }
        if body.right() > self.right() {
            body.position.x = self.right() - body.width as f32;
        }
        if body.top() < self.top() {
            body.position.y = self.top();
            physics.cancel_jump(body);
        }
        if body.bottom() > self.bottom() {
            body.position.y = self.bottom() - body.height as f32;
        }
    }

    /// Scrolls by the body's displacement once it is past the viewport center
    /// in the direction it travels.
    fn follow(&mut self, body: &Body, physics: &Physics) {
        let traveled = physics.distance_traveled(body);
        let center = self.center();
        let body_center = body.center();
        let mut shift = Vec2::ZERO;

        if (traveled.x > 0.0 && body_center.x >= center.x)
            || (traveled.x < 0.0 && body_center.x <= center.x)
        {
            shift.x = traveled.x;
        }
        if (traveled.y < 0.0 && body_center.y <= center.y)
            || (traveled.y > 0.0 && body_center.y >= center.y)
        {
            shift.y = traveled.y;
        }
        self.position += shift;
    }

    fn clamp_to_room(&mut self) {
        self.position.x = clamp_low_wins(
            self.position.x,
            self.room.x as f32,
            (self.room.right() - self.width) as f32,
        );
        self.position.y = clamp_low_wins(
            self.position.y,
            self.room.y as f32,
            (self.room.bottom() - self.height) as f32,
        );
    }

    fn check_transition_tiles(
        &mut self,
        tilemap: &Tilemap,
        body: &Body,
        physics: &Physics,
    ) -> Option<CameraSignal> {
        let traveled = physics.distance_traveled(body);
        let center = body.center();
        let marker = |x: f32, y: f32| {
            tilemap
                .kind_at(TileLayer::Camera, x as i32, y as i32)
                .transition_direction()
        };

        let horizontal = if traveled.x > 0.0 {
            marker(body.right() - 1.0, center.y).filter(|d| *d == Direction::Right)
        } else if traveled.x < 0.0 {
            marker(body.left(), center.y).filter(|d| *d == Direction::Left)
        } else {
            None
        };
        let vertical = if traveled.y > 0.0 {
            marker(center.x, center.y).filter(|d| *d == Direction::Down)
        } else if traveled.y < 0.0 {
            marker(center.x, center.y).filter(|d| *d == Direction::Up)
        } else {
            None
        };

        let direction = horizontal.or(vertical)?;
        Some(self.start_transition(direction))
    }

    fn start_transition(&mut self, direction: Direction) -> CameraSignal {
        let target = match direction {
            Direction::Right => Vec2::new(self.right(), self.position.y),
            Direction::Left => Vec2::new(self.left() - self.width as f32, self.position.y),
            Direction::Down => Vec2::new(self.position.x, self.bottom()),
            Direction::Up => Vec2::new(self.position.x, self.top() - self.height as f32),
        };
        debug!(
            "[Gridrunner camera] transition {:?} from {:?} to {:?}",
            direction, self.position, target
        );
        self.transition = Some(Transition { direction, target });
        CameraSignal::TransitionStarted(direction)
    }

    /// Pans camera and body at their own fixed speeds; finishes on the frame the
    /// camera reaches or passes the target.
    fn advance_transition(
        &mut self,
        transition: Transition,
        tilemap: &Tilemap,
        body: &mut Body,
    ) -> Option<CameraSignal> {
        let camera_step = self.tuning.transition_speed;
        let body_step = self.tuning.body_transition_speed;
        let target = transition.target;

        let arrived = match transition.direction {
            Direction::Right => {
                body.position.x += body_step;
                self.position.x += camera_step;
                self.position.x >= target.x
            }
            Direction::Left => {
                body.position.x -= body_step;
                self.position.x -= camera_step;
                self.position.x <= target.x
            }
            Direction::Down => {
                body.position.y += body_step;
                self.position.y += camera_step;
                self.position.y >= target.y
            }
            Direction::Up => {
                body.position.y -= body_step;
                self.position.y -= camera_step;
                self.position.y <= target.y
            }
        };
        if !arrived {
            return None;
        }

        self.position = target;
        self.transition = None;
        self.discover_room(tilemap);
        info!(
            "[Gridrunner camera] entered room at ({}, {}) {}x{}",
            self.room.x, self.room.y, self.room.width, self.room.height
        );
        Some(CameraSignal::TransitionFinished(transition.direction))
    }

    /// Centers the viewport on a checkpoint, then keeps it inside that room.
    pub fn reset_to_checkpoint(&mut self, tilemap: &Tilemap, checkpoint: Vec2) {
        self.transition = None;
        self.position = Vec2::new(
            checkpoint.x - (self.width / 2) as f32,
            checkpoint.y - (self.height / 2) as f32,
        );
        self.discover_room(tilemap);
        self.clamp_to_room();
    }

    /// Recomputes the room rectangle by marching out from the viewport center
    /// until a room limit tile is found on each side. Limit tiles belong to the room.
    pub fn discover_room(&mut self, tilemap: &Tilemap) {
        let center = self.center();
        let origin = (
            tilemap.tile_x(center.x as i32),
            tilemap.tile_y(center.y as i32),
        );
        let tw = tilemap.tile_width;
        let th = tilemap.tile_height;

        let left = self.march(tilemap, origin, (-1, 0)).map(|(tx, _)| tx * tw);
        let top = self.march(tilemap, origin, (0, -1)).map(|(_, ty)| ty * th);
        let right = self
            .march(tilemap, origin, (1, 0))
            .map(|(tx, _)| (tx + 1) * tw);
        let bottom = self
            .march(tilemap, origin, (0, 1))
            .map(|(_, ty)| (ty + 1) * th);

        if left.is_none() || top.is_none() || right.is_none() || bottom.is_none() {
            warn!(
                "[Gridrunner camera] room around tile {:?} is not closed by limit tiles; using map bounds",
                origin
            );
        }
        let x = left.unwrap_or(0);
        let y = top.unwrap_or(0);
        let right = right.unwrap_or_else(|| tilemap.pixel_width());
        let bottom = bottom.unwrap_or_else(|| tilemap.pixel_height());
        self.room = IRect {
            x,
            y,
            width: right - x,
            height: bottom - y,
        };
    }

    fn march(&self, tilemap: &Tilemap, from: (i32, i32), step: (i32, i32)) -> Option<(i32, i32)> {
        let (mut tx, mut ty) = from;
        for _ in 0..=self.tuning.room_search_limit {
            let tile = tilemap.get(TileLayer::Camera, tx, ty)?;
            if tile.is_room_limit() {
                return Some((tx, ty));
            }
            tx += step.0;
            ty += step.1;
        }
        None
    }
}

#[derive(Component)]
pub struct MainCamera;

#[derive(Resource, Clone)]
pub struct CameraShakeState {
    pub intensity: f32,
    pub remaining: f32,
    pub duration: f32,
}

impl Default for CameraShakeState {
    fn default() -> Self {
        Self {
            intensity: 0.0,
            remaining: 0.0,
            duration: 0.0,
        }
    }
}

#[derive(Resource, Default)]
struct CameraEventCursor(EventCursor);

const DAMAGE_SHAKE_INTENSITY: f32 = 6.0;
const DAMAGE_SHAKE_SECS: f32 = 0.25;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(CameraShakeState::default())
            .insert_resource(CameraEventCursor::default())
            .add_systems(Startup, spawn_camera)
            .add_systems(Update, (apply_camera_events, sync_main_camera).chain());
    }
}

fn spawn_camera(mut commands: Commands, headless: Res<HeadlessMode>) {
    if headless.0 {
        return;
    }
    commands.spawn((MainCamera, Camera2d, Transform::from_xyz(0.0, 0.0, 100.0)));
}

fn apply_camera_events(
    bus: Res<GameEventBus>,
    mut shake: ResMut<CameraShakeState>,
    mut cursor: ResMut<CameraEventCursor>,
) {
    for ev in cursor.0.read(&bus) {
        if let GameEventKind::Damaged { .. } = ev.kind {
            shake.intensity = DAMAGE_SHAKE_INTENSITY;
            shake.duration = DAMAGE_SHAKE_SECS;
            shake.remaining = DAMAGE_SHAKE_SECS;
        }
    }
}

/// Places the render camera on the viewport center, plus any active shake.
fn sync_main_camera(
    time: Res<Time>,
    room_camera: Option<Res<RoomCamera>>,
    mut shake: ResMut<CameraShakeState>,
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
) {
    let Some(room_camera) = room_camera else {
        return;
    };
    let Ok(mut cam_transform) = camera_query.get_single_mut() else {
        return;
    };

    let mut offset = Vec2::ZERO;
    if shake.remaining > 0.0 && shake.intensity > 0.0 {
        shake.remaining = (shake.remaining - time.delta_secs()).max(0.0);
        let t = time.elapsed_secs();
        let life = if shake.duration > 0.0 {
            (shake.remaining / shake.duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let strength = shake.intensity * life;
        offset.x = (t * 31.0).sin() * strength;
        offset.y = (t * 43.0).cos() * strength;
    }

    let base = crate::render::world_to_screen(room_camera.center(), cam_transform.translation.z);
    cam_transform.translation.x = base.x + offset.x;
    cam_transform.translation.y = base.y + offset.y;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Facing, TileType};
    use crate::config::PhysicsTuning;

    fn physics_moved_from(previous: Vec2) -> Physics {
        let mut physics = Physics::new(PhysicsTuning::default(), Facing::Right);
        physics.previous_position = previous;
        physics
    }

    #[test]
    fn right_transition_pans_in_fixed_steps() {
        let map = Tilemap::test_level(64);
        let mut camera = RoomCamera::new(CameraTuning::default());
        camera.reset_to_checkpoint(&map, Vec2::new(128.0, 576.0));
        assert_eq!(camera.position, Vec2::ZERO);
        assert_eq!(camera.room, IRect::new(0.0, 0.0, 1024, 768));

        let mut body = Body::new(Vec2::new(910.0, 552.0), 54, 88);
        let mut physics = physics_moved_from(Vec2::new(905.0, 552.0));
        let signal = camera.update(&map, &mut body, &mut physics);
        assert_eq!(
            signal,
            Some(CameraSignal::TransitionStarted(Direction::Right))
        );
        assert_eq!(
            camera.transition().map(|t| t.target),
            Some(Vec2::new(1024.0, 0.0))
        );

        let mut frames = 0;
        loop {
            frames += 1;
            let signal = camera.update(&map, &mut body, &mut physics);
            if signal == Some(CameraSignal::TransitionFinished(Direction::Right)) {
                break;
            }
            assert!(signal.is_none());
            assert!(frames < 200, "transition never finished");
        }
        assert_eq!(frames, 103);
        assert_eq!(camera.position.x, 1024.0);
        assert_eq!(body.position.x, 910.0 + 180.25);
        assert!(!camera.is_transitioning());
        assert_eq!(camera.room, IRect::new(1024.0, 0.0, 1024, 768));
    }

    #[test]
    fn follows_past_center_and_stops_at_room_edge() {
        let mut map = Tilemap::new(24, 12, 64);
        map.fill(TileLayer::Camera, (0, 0), (0, 11), TileType::RoomLimit);
        map.fill(TileLayer::Camera, (23, 0), (23, 11), TileType::RoomLimit);
        map.fill(TileLayer::Camera, (0, 0), (23, 0), TileType::RoomLimit);
        map.fill(TileLayer::Camera, (0, 11), (23, 11), TileType::RoomLimit);
        let mut camera = RoomCamera::new(CameraTuning::default());
        camera.reset_to_checkpoint(&map, Vec2::new(128.0, 384.0));
        assert_eq!(camera.room.width, 24 * 64);

        // Left of center: no scroll.
        let mut body = Body::new(Vec2::new(300.0, 500.0), 54, 88);
        let mut physics = physics_moved_from(Vec2::new(295.0, 500.0));
        camera.update(&map, &mut body, &mut physics);
        assert_eq!(camera.position.x, 0.0);

        // Past center moving right: scroll by the same distance.
        body.position.x = 600.0;
        physics.previous_position = Vec2::new(595.0, 500.0);
        camera.update(&map, &mut body, &mut physics);
        assert_eq!(camera.position.x, 5.0);

        // Never past the room's right edge.
        for _ in 0..40 {
            physics.previous_position = body.position;
            body.position.x += 40.0;
            camera.update(&map, &mut body, &mut physics);
        }
        assert_eq!(camera.position.x, (24 * 64 - 1024) as f32);
        assert_eq!(body.right(), camera.right());
    }

    #[test]
    fn body_is_clamped_into_viewport_and_top_cancels_jump() {
        let map = Tilemap::test_level(64);
        let mut camera = RoomCamera::new(CameraTuning::default());
        camera.reset_to_checkpoint(&map, Vec2::new(128.0, 576.0));

        let mut body = Body::new(Vec2::new(-20.0, -30.0), 54, 88);
        body.speed.y = -12.0;
        let mut physics = physics_moved_from(body.position);
        camera.update(&map, &mut body, &mut physics);
        assert_eq!(body.position, Vec2::ZERO);
        assert_eq!(body.speed.y, 0.0);
    }

    #[test]
    fn vertical_transition_uses_body_center() {
        let map = Tilemap::test_level(64);
        let mut camera = RoomCamera::new(CameraTuning::default());
        camera.reset_to_checkpoint(&map, Vec2::new(20.0 * 64.0, 576.0));
        assert_eq!(camera.position, Vec2::new(1024.0, 0.0));

        // Center in row 11, column 27: a down marker.
        let mut body = Body::new(Vec2::new(27.0 * 64.0 + 5.0, 720.0 - 44.0), 54, 88);
        let mut physics = physics_moved_from(body.position - Vec2::new(0.0, 5.0));
        let signal = camera.update(&map, &mut body, &mut physics);
        assert_eq!(signal, Some(CameraSignal::TransitionStarted(Direction::Down)));
        assert_eq!(
            camera.transition().map(|t| t.target),
            Some(Vec2::new(1024.0, 768.0))
        );
    }

    #[test]
    fn open_room_falls_back_to_map_bounds() {
        let map = Tilemap::new(20, 14, 64);
        let mut camera = RoomCamera::new(CameraTuning::default());
        camera.reset_to_checkpoint(&map, Vec2::new(640.0, 448.0));
        assert_eq!(camera.room, IRect::new(0.0, 0.0, 20 * 64, 14 * 64));
    }
}
