use bevy::prelude::*;

use crate::camera::RoomCamera;
use crate::checkpoint::CheckpointStore;
use crate::components::{Enemy, Player};
use crate::config::{GameConfig, PlatformTuning};
use crate::controller::{Controller, FrameContext};
use crate::enemy::Crawler;
use crate::events::{EventCursor, GameEvent, GameEventBus, GameEventKind};
use crate::input::VirtualInput;
use crate::physics_core::Physics;
use crate::platform::{MovingPlatform, RiderKind};
use crate::player::{step_player, PlayerCommand, PlayerCommands};
use crate::rigid_body::{Body, IRect};
use crate::screen::{PresenceAction, ScreenPresence, StageView};
use crate::tilemap::Tilemap;
use crate::weapon::Buster;

/// Ordered stages of one fixed frame.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameSet {
    Tick,
    ScreenObjects,
    Player,
}

pub fn stage_view(camera: &RoomCamera, player_busy: bool) -> StageView {
    StageView {
        viewport: camera.viewport(),
        room: camera.room,
        camera_transitioning: camera.is_transitioning(),
        player_busy,
    }
}

/// Whether any of `events` sends screen objects back home.
pub fn wants_reset(events: &[GameEvent]) -> bool {
    events.iter().any(|ev| ev.kind.resets_screen_objects())
}

/// The player as screen objects see it during one frame.
pub struct PlayerTarget<'a> {
    pub bounds: IRect,
    /// Whether contact damage lands this frame.
    pub vulnerable: bool,
    pub shots: Option<&'a mut Buster>,
}

impl<'a> PlayerTarget<'a> {
    /// A player whose shots can hit enemies.
    pub fn armed(body: &Body, controller: &'a mut Controller, transitioning: bool) -> Self {
        let vulnerable = controller.can_inflict_damage(transitioning);
        Self {
            bounds: body.bounding_box(),
            vulnerable,
            shots: Some(&mut controller.buster),
        }
    }

    pub fn unarmed(body: &Body, controller: &Controller, transitioning: bool) -> Self {
        Self {
            bounds: body.bounding_box(),
            vulnerable: controller.can_inflict_damage(transitioning),
            shots: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlatformOutcome {
    /// A falling platform was just triggered.
    pub activated: bool,
    pub contact_damage: Option<i32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrawlerOutcome {
    pub contact_damage: Option<i32>,
    /// Health left after a shot landed this frame.
    pub shot_landed: Option<i32>,
}

pub fn reset_platform(
    platform: &mut MovingPlatform,
    presence: &mut ScreenPresence,
    tuning: &PlatformTuning,
) {
    if presence.claim_reset() {
        platform.reset(presence.initial_position, tuning);
        presence.mark_reset();
    }
}

pub fn reset_crawler(
    crawler: &mut Crawler,
    body: &mut Body,
    physics: &mut Physics,
    presence: &mut ScreenPresence,
) {
    if presence.claim_reset() {
        crawler.reset(body, physics, presence.initial_position);
        presence.mark_reset();
    }
}

/// One frame of a platform, including spike contact with the player.
#[allow(clippy::too_many_arguments)]
pub fn step_platform(
    platform: &mut MovingPlatform,
    presence: &mut ScreenPresence,
    view: &StageView,
    tilemap: &Tilemap,
    tuning: &PlatformTuning,
    frame_ms: u32,
    player: Option<&PlayerTarget>,
) -> PlatformOutcome {
    match presence.evaluate(platform.bounds(), view) {
        PresenceAction::Update => {
            platform.active = true;
            let activated = platform.behave(tilemap, tuning, frame_ms);
            platform.advance();
            presence.after_update(platform.bounds(), view.viewport);
            let contact_damage = player
                .filter(|p| p.vulnerable)
                .and_then(|p| platform.contact_damage(p.bounds, tuning));
            PlatformOutcome {
                activated,
                contact_damage,
            }
        }
        PresenceAction::Reset => {
            platform.active = false;
            platform.reset(presence.initial_position, tuning);
            presence.mark_reset();
            PlatformOutcome::default()
        }
        PresenceAction::Idle => {
            platform.active = false;
            PlatformOutcome::default()
        }
    }
}

/// One frame of a crawler: walk, take shots, then touch the player.
/// Defeated crawlers stay put until their next reset.
#[allow(clippy::too_many_arguments)]
pub fn step_crawler<F>(
    crawler: &mut Crawler,
    body: &mut Body,
    physics: &mut Physics,
    presence: &mut ScreenPresence,
    view: &StageView,
    tilemap: &Tilemap,
    frame_ms: u32,
    player: Option<&mut PlayerTarget>,
    platform_pass: F,
) -> CrawlerOutcome
where
    F: FnMut(&mut Body),
{
    match presence.evaluate(body.bounding_box(), view) {
        PresenceAction::Update => {
            let mut outcome = CrawlerOutcome::default();
            if crawler.is_defeated() {
                return outcome;
            }
            crawler.behave(body, physics, frame_ms);
            physics.step(body, tilemap, platform_pass);
            presence.after_update(body.bounding_box(), view.viewport);
            let Some(player) = player else {
                return outcome;
            };
            if let Some(damage) = player
                .shots
                .as_deref_mut()
                .and_then(|shots| shots.take_hit(body.bounding_box()))
            {
                outcome.shot_landed = Some(crawler.take_damage(damage));
            }
            if player.vulnerable && !crawler.is_defeated() {
                outcome.contact_damage = crawler.contact_damage(body, player.bounds);
            }
            outcome
        }
        PresenceAction::Reset => {
            crawler.reset(body, physics, presence.initial_position);
            presence.mark_reset();
            CrawlerOutcome::default()
        }
        PresenceAction::Idle => CrawlerOutcome::default(),
    }
}

/// Bus event for a shot that left the crawler with `health`.
pub fn hit_event(health: i32) -> GameEventKind {
    if health == 0 {
        GameEventKind::EnemyDefeated
    } else {
        GameEventKind::EnemyHit { health }
    }
}

#[derive(Resource, Default)]
struct ScreenResetCursor(EventCursor);

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ScreenResetCursor::default())
            .configure_sets(
                FixedUpdate,
                (FrameSet::Tick, FrameSet::ScreenObjects, FrameSet::Player).chain(),
            )
            .add_systems(
                FixedUpdate,
                (
                    (reset_screen_objects, update_platforms, update_crawlers)
                        .chain()
                        .in_set(FrameSet::ScreenObjects),
                    update_player.in_set(FrameSet::Player),
                )
                    .run_if(crate::game_runtime::gameplay_systems_enabled)
                    .run_if(resource_exists::<RoomCamera>),
            );
    }
}

fn reset_screen_objects(
    bus: Res<GameEventBus>,
    config: Res<GameConfig>,
    mut cursor: ResMut<ScreenResetCursor>,
    mut platforms: Query<(&mut MovingPlatform, &mut ScreenPresence), Without<Crawler>>,
    mut crawlers: Query<
        (&mut Crawler, &mut Body, &mut Physics, &mut ScreenPresence),
        Without<MovingPlatform>,
    >,
) {
    if !wants_reset(&cursor.0.read(&bus)) {
        return;
    }
    for (mut platform, mut presence) in platforms.iter_mut() {
        reset_platform(&mut platform, &mut presence, &config.platforms);
    }
    for (mut crawler, mut body, mut physics, mut presence) in crawlers.iter_mut() {
        reset_crawler(&mut crawler, &mut body, &mut physics, &mut presence);
    }
}

#[allow(clippy::too_many_arguments)]
fn update_platforms(
    tilemap: Res<Tilemap>,
    config: Res<GameConfig>,
    camera: Res<RoomCamera>,
    players: Query<(&Body, &Controller), With<Player>>,
    mut player_commands: ResMut<PlayerCommands>,
    mut bus: ResMut<GameEventBus>,
    mut platforms: Query<(Entity, &mut MovingPlatform, &mut ScreenPresence)>,
) {
    let player = players.get_single().ok();
    let busy = player.map(|(_, c)| c.is_busy()).unwrap_or(false);
    let view = stage_view(&camera, busy);
    let target = player.map(|(body, controller)| {
        PlayerTarget::unarmed(body, controller, camera.is_transitioning())
    });
    for (entity, mut platform, mut presence) in platforms.iter_mut() {
        let outcome = step_platform(
            &mut platform,
            &mut presence,
            &view,
            &tilemap,
            &config.platforms,
            config.frame_ms,
            target.as_ref(),
        );
        if outcome.activated {
            debug!("[Gridrunner] falling platform {:?} triggered", entity);
            bus.emit(GameEventKind::PlatformActivated, Some(entity.to_bits()));
        }
        if let Some(amount) = outcome.contact_damage {
            player_commands.push(PlayerCommand::Damage { amount });
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn update_crawlers(
    tilemap: Res<Tilemap>,
    config: Res<GameConfig>,
    camera: Res<RoomCamera>,
    mut player_commands: ResMut<PlayerCommands>,
    mut bus: ResMut<GameEventBus>,
    mut players: Query<(&Body, &mut Controller), With<Player>>,
    mut crawlers: Query<
        (Entity, &mut Crawler, &mut Body, &mut Physics, &mut ScreenPresence),
        (With<Enemy>, Without<Player>),
    >,
    mut platforms: Query<&mut MovingPlatform>,
) {
    let mut player = players.get_single_mut().ok();
    let busy = player.as_ref().map(|(_, c)| c.is_busy()).unwrap_or(false);
    let view = stage_view(&camera, busy);
    let mut target = player.as_mut().map(|(body, controller)| {
        PlayerTarget::armed(body, &mut **controller, camera.is_transitioning())
    });

    for (entity, mut crawler, mut body, mut physics, mut presence) in crawlers.iter_mut() {
        let outcome = step_crawler(
            &mut crawler,
            &mut body,
            &mut physics,
            &mut presence,
            &view,
            &tilemap,
            config.frame_ms,
            target.as_mut(),
            |b| {
                for mut platform in platforms.iter_mut() {
                    platform.resolve_against(b, &tilemap, RiderKind::Other);
                }
            },
        );
        if let Some(health) = outcome.shot_landed {
            debug!("[Gridrunner] crawler {:?} hit, {} health left", entity, health);
            bus.emit(hit_event(health), Some(entity.to_bits()));
        }
        if let Some(amount) = outcome.contact_damage {
            player_commands.push(PlayerCommand::Damage { amount });
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn update_player(
    tilemap: Res<Tilemap>,
    config: Res<GameConfig>,
    input: Res<VirtualInput>,
    mut camera: ResMut<RoomCamera>,
    mut checkpoints: ResMut<CheckpointStore>,
    mut bus: ResMut<GameEventBus>,
    mut player_commands: ResMut<PlayerCommands>,
    mut players: Query<(Entity, &mut Controller, &mut Body, &mut Physics), With<Player>>,
    mut platforms: Query<&mut MovingPlatform>,
) {
    let Ok((entity, mut controller, mut body, mut physics)) = players.get_single_mut() else {
        return;
    };
    let mut ctx = FrameContext {
        tilemap: &tilemap,
        camera: &mut camera,
        checkpoints: &mut checkpoints,
        events: &mut bus,
        frame_ms: config.frame_ms,
        source: Some(entity.to_bits()),
    };
    step_player(
        &mut controller,
        &mut body,
        &mut physics,
        input.current,
        &mut player_commands.pending,
        &mut ctx,
        |b| {
            for mut platform in platforms.iter_mut() {
                platform.resolve_against(b, &tilemap, RiderKind::Player);
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Direction, Facing, HeadlessMode, TileLayer, TileType};
    use crate::config::{CrawlerTuning, PhysicsTuning, WeaponTuning};
    use crate::controller::ControllerMode;
    use crate::game_runtime::RuntimeState;

    fn view() -> StageView {
        StageView {
            viewport: IRect::new(0.0, 0.0, 1024, 768),
            room: IRect::new(0.0, 0.0, 1024, 768),
            camera_transitioning: false,
            player_busy: false,
        }
    }

    #[test]
    fn idle_platforms_stop_colliding() {
        let map = Tilemap::new(40, 12, 64);
        let tuning = PlatformTuning::default();
        let mut platform = MovingPlatform::shuttle(Vec2::new(1200.0, 300.0), Direction::Right, &tuning);
        let mut presence = ScreenPresence::new(platform.position, platform.room_persistent());

        let outcome = step_platform(&mut platform, &mut presence, &view(), &map, &tuning, 16, None);
        assert_eq!(outcome, PlatformOutcome::default());
        assert!(!platform.active);
        assert_eq!(platform.position.x, 1200.0);

        let mut near = MovingPlatform::shuttle(Vec2::new(200.0, 300.0), Direction::Right, &tuning);
        let mut presence = ScreenPresence::new(near.position, near.room_persistent());
        step_platform(&mut near, &mut presence, &view(), &map, &tuning, 16, None);
        assert!(near.active);
        assert_eq!(near.position.x, 203.0);
    }

    #[test]
    fn crawler_only_hurts_a_vulnerable_player() {
        let mut map = Tilemap::new(16, 12, 64);
        map.fill(TileLayer::Level, (0, 10), (15, 11), TileType::Solid);
        let (mut crawler, mut body, mut physics) = Crawler::spawn_at(
            Vec2::new(320.0, 576.0),
            &map,
            &CrawlerTuning::default(),
            &PhysicsTuning::default(),
        );
        let mut presence = ScreenPresence::new(body.position, false);
        let mut player = PlayerTarget {
            bounds: IRect::new(body.left() - 40.0, 552.0, 54, 88),
            vulnerable: true,
            shots: None,
        };

        let hit = step_crawler(
            &mut crawler, &mut body, &mut physics, &mut presence, &view(), &map, 16,
            Some(&mut player), |_| {},
        );
        assert_eq!(hit.contact_damage, Some(10));
        player.vulnerable = false;
        let shielded = step_crawler(
            &mut crawler, &mut body, &mut physics, &mut presence, &view(), &map, 16,
            Some(&mut player), |_| {},
        );
        assert_eq!(shielded, CrawlerOutcome::default());
        assert_eq!(physics.facing, Facing::Left);
    }

    #[test]
    fn spikes_hurt_a_vulnerable_player_beside_the_block() {
        let map = Tilemap::new(16, 12, 64);
        let tuning = PlatformTuning::default();
        let mut platform = MovingPlatform::from_marker(
            TileType::SpikePlatformHorizontal,
            Vec2::new(320.0, 576.0),
            &tuning,
        )
        .unwrap();
        let mut presence = ScreenPresence::new(platform.position, platform.room_persistent());
        let mut player = PlayerTarget {
            bounds: IRect::new(320.0 - 54.0, 552.0, 54, 88),
            vulnerable: true,
            shots: None,
        };

        let outcome = step_platform(
            &mut platform, &mut presence, &view(), &map, &tuning, 16, Some(&player),
        );
        assert_eq!(outcome.contact_damage, Some(10));
        assert!(!outcome.activated);

        player.vulnerable = false;
        let outcome = step_platform(
            &mut platform, &mut presence, &view(), &map, &tuning, 16, Some(&player),
        );
        assert_eq!(outcome.contact_damage, None);
    }

    #[test]
    fn shots_wear_a_crawler_down_until_it_stops() {
        let mut map = Tilemap::new(16, 12, 64);
        map.fill(TileLayer::Level, (0, 10), (15, 11), TileType::Solid);
        let (mut crawler, mut body, mut physics) = Crawler::spawn_at(
            Vec2::new(320.0, 576.0),
            &map,
            &CrawlerTuning::default(),
            &PhysicsTuning::default(),
        );
        let mut presence = ScreenPresence::new(body.position, false);
        let mut buster = Buster::new(WeaponTuning::default());

        let mut healths = Vec::new();
        for _ in 0..3 {
            assert!(buster.fire(Vec2::new(350.0, 615.0), Facing::Right));
            let mut player = PlayerTarget {
                bounds: IRect::new(900.0, 552.0, 54, 88),
                vulnerable: true,
                shots: Some(&mut buster),
            };
            let outcome = step_crawler(
                &mut crawler, &mut body, &mut physics, &mut presence, &view(), &map, 16,
                Some(&mut player), |_| {},
            );
            assert_eq!(outcome.contact_damage, None);
            healths.push(outcome.shot_landed);
        }
        assert_eq!(healths, vec![Some(10), Some(5), Some(0)]);
        assert_eq!(hit_event(5), GameEventKind::EnemyHit { health: 5 });
        assert_eq!(hit_event(0), GameEventKind::EnemyDefeated);
        assert_eq!(buster.active_count(), 0);

        // Out of action: no walking, no hits and no contact damage.
        let resting = body.position;
        buster.fire(Vec2::new(350.0, 615.0), Facing::Right);
        let mut player = PlayerTarget {
            bounds: body.bounding_box(),
            vulnerable: true,
            shots: Some(&mut buster),
        };
        let outcome = step_crawler(
            &mut crawler, &mut body, &mut physics, &mut presence, &view(), &map, 16,
            Some(&mut player), |_| {},
        );
        assert_eq!(outcome, CrawlerOutcome::default());
        assert_eq!(body.position, resting);
        assert_eq!(buster.active_count(), 1);

        reset_crawler(&mut crawler, &mut body, &mut physics, &mut presence);
        assert_eq!(crawler.health(), 15);
        assert_eq!(body.position, presence.initial_position);
    }

    #[test]
    fn resets_apply_once_until_the_object_updates_again() {
        let tuning = PlatformTuning::default();
        let mut platform = MovingPlatform::falling(Vec2::new(100.0, 100.0), &tuning);
        let mut presence = ScreenPresence::new(platform.position, false);
        let map = Tilemap::new(20, 12, 64);
        step_platform(&mut platform, &mut presence, &view(), &map, &tuning, 16, None);
        platform.position.y = 500.0;

        reset_platform(&mut platform, &mut presence, &tuning);
        assert_eq!(platform.position.y, 100.0);
        platform.position.y = 300.0;
        reset_platform(&mut platform, &mut presence, &tuning);
        assert_eq!(platform.position.y, 300.0);

        let events = [GameEvent {
            kind: GameEventKind::SpawnStarted,
            frame: 1,
            source_entity: None,
        }];
        assert!(wants_reset(&events));
        assert!(!wants_reset(&events[..0]));
    }

    #[test]
    fn fixed_frames_spawn_the_player_through_the_plugin() {
        let mut app = App::new();
        app.insert_resource(Tilemap::test_level(64))
            .insert_resource(GameConfig::default())
            .insert_resource(HeadlessMode(true))
            .insert_resource(RuntimeState::default())
            .insert_resource(VirtualInput::default())
            .add_plugins(crate::events::GameEventsPlugin)
            .add_plugins(crate::player::PlayerPlugin)
            .add_plugins(crate::level::LevelPlugin)
            .add_plugins(PhysicsPlugin);
        app.world_mut().run_schedule(Update);
        assert!(app.world().get_resource::<RoomCamera>().is_some());

        for _ in 0..120 {
            app.world_mut().run_schedule(FixedUpdate);
        }
        let world = app.world_mut();
        let (controller, body) = world
            .query_filtered::<(&Controller, &Body), With<Player>>()
            .single(world);
        assert_eq!(controller.mode(body), ControllerMode::Grounded);
        assert_eq!(body.bottom(), 640.0);
        let bus = world.resource::<GameEventBus>();
        assert!(bus
            .recent
            .iter()
            .any(|e| e.kind == GameEventKind::Landed { after_spawn: true }));
    }
}
