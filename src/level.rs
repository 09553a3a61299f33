use bevy::prelude::*;

use crate::camera::RoomCamera;
use crate::checkpoint::CheckpointStore;
use crate::components::{Enemy, HeadlessMode, Player, ShotSprite, TileLayer, TileType};
use crate::config::GameConfig;
use crate::enemy::Crawler;
use crate::physics_core::Physics;
use crate::platform::{MovingPlatform, PlatformKind};
use crate::player::{player_parts, PlayerCommand, PlayerCommands};
use crate::rigid_body::Body;
use crate::screen::ScreenPresence;
use crate::tilemap::Tilemap;

/// Everything a level spawns besides the player, read from its marker layers.
#[derive(Clone, Debug)]
pub struct LevelLayout {
    pub start: Vec2,
    pub platforms: Vec<MovingPlatform>,
    pub crawlers: Vec<(Crawler, Body, Physics)>,
}

impl LevelLayout {
    /// Resets `checkpoints` and seeds it with the level start before collecting
    /// the screen objects.
    pub fn build(
        tilemap: &Tilemap,
        config: &GameConfig,
        checkpoints: &mut CheckpointStore,
    ) -> Result<Self, String> {
        config.check_tile_size(tilemap.tile_width, tilemap.tile_height)?;
        checkpoints.reset();
        let start = checkpoints.seed_from_level(tilemap)?;

        let origin = |tx: i32, ty: i32| {
            Vec2::new(
                (tx * tilemap.tile_width) as f32,
                (ty * tilemap.tile_height) as f32,
            )
        };
        let platforms = tilemap
            .markers(TileLayer::Platforms)
            .filter_map(|(tx, ty, tile)| {
                MovingPlatform::from_marker(tile, origin(tx, ty), &config.platforms)
            })
            .collect();
        let crawlers = tilemap
            .markers(TileLayer::Enemies)
            .filter(|(_, _, tile)| *tile == TileType::Crawler)
            .map(|(tx, ty, _)| {
                Crawler::spawn_at(origin(tx, ty), tilemap, &config.crawler, &config.physics)
            })
            .collect();

        Ok(Self {
            start,
            platforms,
            crawlers,
        })
    }
}

/// Tags every entity spawned for the current level so a reload can clear them.
#[derive(Component)]
pub struct LevelEntity;

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(CheckpointStore::default()).add_systems(
            Update,
            rebuild_level.run_if(resource_changed::<Tilemap>),
        );
    }
}

fn rebuild_level(
    mut commands: Commands,
    tilemap: Res<Tilemap>,
    config: Res<GameConfig>,
    headless: Res<HeadlessMode>,
    mut checkpoints: ResMut<CheckpointStore>,
    mut player_commands: ResMut<PlayerCommands>,
    existing: Query<Entity, With<LevelEntity>>,
) {
    for entity in existing.iter() {
        commands.entity(entity).despawn();
    }

    let layout = match LevelLayout::build(&tilemap, &config, &mut checkpoints) {
        Ok(layout) => layout,
        Err(e) => {
            error!("[Gridrunner] Level rejected: {e}");
            return;
        }
    };
    commands.insert_resource(RoomCamera::new(config.camera.clone()));

    let platform_count = layout.platforms.len();
    let crawler_count = layout.crawlers.len();
    for platform in layout.platforms {
        let presence = ScreenPresence::new(platform.position, platform.room_persistent());
        let size = Vec2::new(platform.width as f32, platform.height as f32);
        let color = match platform.kind {
            PlatformKind::Spike(_) => Color::srgb(0.7, 0.7, 0.78),
            _ => Color::srgb(0.85, 0.6, 0.25),
        };
        let mut entity = commands.spawn((
            LevelEntity,
            presence,
            platform,
            Transform::default(),
            Visibility::Hidden,
        ));
        if !headless.0 {
            entity.insert(Sprite::from_color(color, size));
        }
    }
    for (crawler, body, physics) in layout.crawlers {
        let presence = ScreenPresence::new(body.position, false);
        let size = Vec2::new(body.width as f32, body.height as f32);
        let mut entity = commands.spawn((
            LevelEntity,
            Enemy,
            presence,
            crawler,
            body,
            physics,
            Transform::default(),
            Visibility::Hidden,
        ));
        if !headless.0 {
            entity.insert(Sprite::from_color(Color::srgb(0.85, 0.2, 0.2), size));
        }
    }

    let (controller, body, physics) = player_parts(&config);
    let size = Vec2::new(body.width as f32, body.height as f32);
    let mut entity = commands.spawn((
        LevelEntity,
        Player,
        controller,
        body,
        physics,
        Transform::default(),
        Visibility::Visible,
    ));
    if !headless.0 {
        entity.insert(Sprite::from_color(Color::srgb(0.2, 0.45, 0.95), size));
    }
    if !headless.0 {
        let size = Vec2::new(
            config.weapon.shot_width as f32,
            config.weapon.shot_height as f32,
        );
        for slot in 0..config.weapon.max_shots {
            commands.spawn((
                LevelEntity,
                ShotSprite(slot),
                Sprite::from_color(Color::srgb(1.0, 0.9, 0.3), size),
                Transform::default(),
                Visibility::Hidden,
            ));
        }
    }
    player_commands.pending.clear();
    player_commands.push(PlayerCommand::Respawn);

    info!(
        "[Gridrunner] Level loaded: {}x{} tiles, start ({}, {}), {} platforms, {} crawlers",
        tilemap.width, tilemap.height, layout.start.x, layout.start.y, platform_count, crawler_count
    );
}
