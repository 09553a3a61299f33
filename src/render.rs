use bevy::prelude::*;

use crate::camera::RoomCamera;
use crate::components::{Player, ShotSprite};
use crate::controller::Controller;
use crate::enemy::Crawler;
use crate::platform::{MovingPlatform, PlatformKind, SpikeOrientation, SpikePhase};
use crate::rigid_body::Body;
use crate::screen::ScreenPresence;

const PLATFORM_Z: f32 = 5.0;
const BODY_Z: f32 = 8.0;
const PLAYER_Z: f32 = 10.0;
const SHOT_Z: f32 = 12.0;

const SPIKE_SIDES: Color = Color::srgb(0.7, 0.7, 0.78);
const SPIKE_ENDS: Color = Color::srgb(0.55, 0.6, 0.8);

/// World space is y-down with top-left origins; bevy is y-up around centers.
pub fn world_to_screen(center: Vec2, z: f32) -> Vec3 {
    Vec3::new(center.x, -center.y, z)
}

pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                sync_bodies,
                sync_platforms,
                style_player,
                style_crawlers,
                style_spikes,
                sync_shots,
            )
                .chain()
                .run_if(resource_exists::<RoomCamera>),
        );
    }
}

/// Body → Transform, with sprites resized to follow height changes.
fn sync_bodies(
    camera: Res<RoomCamera>,
    mut query: Query<
        (
            &Body,
            Option<&ScreenPresence>,
            Has<Player>,
            &mut Transform,
            &mut Visibility,
            Option<&mut Sprite>,
        ),
        Changed<Body>,
    >,
) {
    let viewport = camera.viewport();
    for (body, presence, is_player, mut transform, mut visibility, sprite) in query.iter_mut() {
        let z = if is_player { PLAYER_Z } else { BODY_Z };
        transform.translation = world_to_screen(body.center(), z);
        if let Some(presence) = presence {
            *visibility = if presence.visible(body.bounding_box(), viewport) {
                Visibility::Visible
            } else {
                Visibility::Hidden
            };
        }
        if let Some(mut sprite) = sprite {
            sprite.custom_size = Some(Vec2::new(body.width as f32, body.height as f32));
        }
    }
}

fn sync_platforms(
    camera: Res<RoomCamera>,
    mut query: Query<(&MovingPlatform, &ScreenPresence, &mut Transform, &mut Visibility)>,
) {
    let viewport = camera.viewport();
    for (platform, presence, mut transform, mut visibility) in query.iter_mut() {
        let center = platform.position
            + Vec2::new(platform.width as f32, platform.height as f32) / 2.0;
        transform.translation = world_to_screen(center, PLATFORM_Z);
        *visibility = if presence.visible(platform.bounds(), viewport) {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };
    }
}

/// Dying players are hidden; invulnerable ones flicker every few frames.
fn style_player(
    time: Res<Time>,
    mut query: Query<(&Controller, &mut Visibility, Option<&mut Sprite>), With<Player>>,
) {
    for (controller, mut visibility, sprite) in query.iter_mut() {
        *visibility = if controller.is_dying() {
            Visibility::Hidden
        } else {
            Visibility::Inherited
        };
        if let Some(mut sprite) = sprite {
            let faded =
                controller.is_invulnerable() && (time.elapsed_secs() * 15.0) as i32 % 2 == 0;
            sprite.color.set_alpha(if faded { 0.25 } else { 1.0 });
        }
    }
}

/// Defeated crawlers vanish; freshly hit ones fade for a moment.
fn style_crawlers(mut query: Query<(&Crawler, &mut Visibility, Option<&mut Sprite>)>) {
    for (crawler, mut visibility, sprite) in query.iter_mut() {
        if crawler.is_defeated() {
            *visibility = Visibility::Hidden;
        }
        if let Some(mut sprite) = sprite {
            sprite
                .color
                .set_alpha(if crawler.is_flashing() { 0.3 } else { 1.0 });
        }
    }
}

fn style_spikes(time: Res<Time>, mut query: Query<(&MovingPlatform, &mut Sprite)>) {
    for (platform, mut sprite) in query.iter_mut() {
        let PlatformKind::Spike(trap) = &platform.kind else {
            continue;
        };
        let warning =
            trap.phase == SpikePhase::Flash && (time.elapsed_secs() * 10.0) as i32 % 2 == 0;
        sprite.color = if warning {
            Color::WHITE
        } else {
            match trap.orientation {
                SpikeOrientation::Horizontal => SPIKE_SIDES,
                SpikeOrientation::Vertical => SPIKE_ENDS,
            }
        };
    }
}

fn sync_shots(
    players: Query<&Controller, With<Player>>,
    mut sprites: Query<(&ShotSprite, &mut Transform, &mut Visibility)>,
) {
    let buster = players.get_single().ok().map(|c| &c.buster);
    for (slot, mut transform, mut visibility) in sprites.iter_mut() {
        let shot = buster.and_then(|b| b.shots().get(slot.0).map(|s| (b, s)));
        match shot {
            Some((buster, shot)) if shot.active => {
                let bounds = buster.shot_bounds(shot);
                let size = Vec2::new(bounds.width as f32, bounds.height as f32);
                transform.translation = world_to_screen(shot.position + size / 2.0, SHOT_Z);
                *visibility = Visibility::Visible;
            }
            _ => *visibility = Visibility::Hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointStore;
    use crate::components::Facing;
    use crate::config::{CameraTuning, CrawlerTuning, GameConfig, PhysicsTuning};
    use crate::controller::FrameContext;
    use crate::events::GameEventBus;
    use crate::player::player_parts;
    use crate::tilemap::Tilemap;

    #[test]
    fn world_to_screen_flips_y() {
        assert_eq!(
            world_to_screen(Vec2::new(100.0, 250.0), 3.0),
            Vec3::new(100.0, -250.0, 3.0)
        );
    }

    #[test]
    fn bodies_follow_their_center_and_size() {
        let mut app = App::new();
        app.insert_resource(RoomCamera::new(CameraTuning::default()))
            .add_systems(Update, sync_bodies);
        let mut body = Body::new(Vec2::new(100.0, 200.0), 54, 88);
        let entity = app
            .world_mut()
            .spawn((
                body.clone(),
                Transform::default(),
                Visibility::Hidden,
                Sprite::from_color(Color::WHITE, Vec2::new(54.0, 88.0)),
            ))
            .id();
        app.update();
        let transform = app.world().get::<Transform>(entity).expect("transform");
        assert_eq!(transform.translation, Vec3::new(127.0, -244.0, BODY_Z));

        body.set_height_keep_bottom(64);
        *app.world_mut().get_mut::<Body>(entity).expect("body") = body;
        app.update();
        let sprite = app.world().get::<Sprite>(entity).expect("sprite");
        assert_eq!(sprite.custom_size, Some(Vec2::new(54.0, 64.0)));
    }

    #[test]
    fn dying_player_is_hidden_until_respawn() {
        let config = GameConfig::default();
        let map = Tilemap::new(16, 12, 64);
        let mut camera = RoomCamera::new(config.camera.clone());
        let mut checkpoints = CheckpointStore::default();
        checkpoints.add(Vec2::new(128.0, 576.0));
        let mut events = GameEventBus::default();
        let (mut controller, mut body, mut physics) = player_parts(&config);
        let mut ctx = FrameContext {
            tilemap: &map,
            camera: &mut camera,
            checkpoints: &mut checkpoints,
            events: &mut events,
            frame_ms: config.frame_ms,
            source: None,
        };

        let mut app = App::new();
        app.init_resource::<Time>()
            .insert_resource(RoomCamera::new(CameraTuning::default()))
            .add_systems(Update, style_player);
        let entity = app
            .world_mut()
            .spawn((Player, controller.clone(), body.clone(), Visibility::Inherited))
            .id();
        app.update();
        assert_eq!(
            app.world().get::<Visibility>(entity),
            Some(&Visibility::Inherited)
        );

        assert!(controller.inflict_damage(1000, &mut body, &mut physics, &mut ctx));
        assert!(controller.is_dying());
        *app.world_mut().get_mut::<Controller>(entity).expect("controller") = controller.clone();
        app.update();
        assert_eq!(
            app.world().get::<Visibility>(entity),
            Some(&Visibility::Hidden)
        );

        controller.start_spawn(&mut body, &mut physics, &mut ctx);
        *app.world_mut().get_mut::<Controller>(entity).expect("controller") = controller;
        app.update();
        assert_eq!(
            app.world().get::<Visibility>(entity),
            Some(&Visibility::Inherited)
        );
    }

    #[test]
    fn shot_sprites_follow_live_shots_only() {
        let config = GameConfig::default();
        let (mut controller, _, _) = player_parts(&config);
        controller.buster.fire(Vec2::new(300.0, 400.0), Facing::Right);

        let mut app = App::new();
        app.add_systems(Update, sync_shots);
        app.world_mut().spawn((Player, controller));
        let live = app
            .world_mut()
            .spawn((ShotSprite(0), Transform::default(), Visibility::Hidden))
            .id();
        let spare = app
            .world_mut()
            .spawn((ShotSprite(1), Transform::default(), Visibility::Visible))
            .id();
        app.update();

        let transform = app.world().get::<Transform>(live).expect("transform");
        assert_eq!(transform.translation, Vec3::new(300.0, -400.0, SHOT_Z));
        assert_eq!(app.world().get::<Visibility>(live), Some(&Visibility::Visible));
        assert_eq!(app.world().get::<Visibility>(spare), Some(&Visibility::Hidden));
    }

    #[test]
    fn defeated_crawlers_stay_hidden() {
        let map = Tilemap::new(16, 12, 64);
        let (mut crawler, body, _) = Crawler::spawn_at(
            Vec2::new(320.0, 576.0),
            &map,
            &CrawlerTuning::default(),
            &PhysicsTuning::default(),
        );
        let mut app = App::new();
        app.add_systems(Update, style_crawlers);
        let entity = app
            .world_mut()
            .spawn((crawler.clone(), body, Visibility::Visible))
            .id();
        app.update();
        assert_eq!(app.world().get::<Visibility>(entity), Some(&Visibility::Visible));

        crawler.take_damage(100);
        *app.world_mut().get_mut::<Crawler>(entity).expect("crawler") = crawler;
        app.update();
        assert_eq!(app.world().get::<Visibility>(entity), Some(&Visibility::Hidden));
    }
}
