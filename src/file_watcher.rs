use std::path::{Path, PathBuf};

use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::{GameConfig, StartupConfig};
use crate::tilemap::Tilemap;

/// Reloads tuning and level data when their files change on disk.
pub struct FileWatcherPlugin {
    pub config_path: PathBuf,
    pub level_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FileWatchEvent {
    ConfigChanged(String),
    LevelChanged(String),
}

#[derive(Resource)]
pub struct FileWatcherReceiver(pub Receiver<FileWatchEvent>);

impl Plugin for FileWatcherPlugin {
    fn build(&self, app: &mut App) {
        let (tx, rx) = crossbeam_channel::unbounded::<FileWatchEvent>();
        app.insert_resource(FileWatcherReceiver(rx));

        let config_path = self.config_path.clone();
        let level_path = self.level_path.clone();
        std::thread::spawn(move || {
            run_watcher(tx, config_path, level_path);
        });

        app.add_systems(Update, process_file_watch_events);
    }
}

fn run_watcher(tx: Sender<FileWatchEvent>, config_path: PathBuf, level_path: Option<PathBuf>) {
    let watched = WatchedFiles {
        config: config_path.clone(),
        level: level_path.clone(),
    };
    let mut watcher: RecommendedWatcher =
        match notify::recommended_watcher(move |res: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = res {
                handle_fs_event(event, &tx, &watched);
            }
        }) {
            Ok(w) => w,
            Err(e) => {
                eprintln!("[Gridrunner FileWatcher] Failed to create watcher: {e}");
                return;
            }
        };

    // notify watches directories; single files are matched in the callback.
    for path in std::iter::once(&config_path).chain(level_path.iter()) {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !parent.exists() {
            continue;
        }
        if let Err(e) = watcher.watch(&parent, RecursiveMode::NonRecursive) {
            eprintln!("[Gridrunner FileWatcher] Failed to watch {}: {e}", parent.display());
        } else {
            println!("[Gridrunner FileWatcher] Watching {}", path.display());
        }
    }

    // Dropping the watcher stops it.
    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}

struct WatchedFiles {
    config: PathBuf,
    level: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WatchedKind {
    Config,
    Level,
}

impl WatchedFiles {
    fn classify(&self, path: &Path) -> Option<WatchedKind> {
        if path_matches(path, &self.config) {
            return Some(WatchedKind::Config);
        }
        match &self.level {
            Some(level) if path_matches(path, level) => Some(WatchedKind::Level),
            _ => None,
        }
    }
}

fn handle_fs_event(event: NotifyEvent, tx: &Sender<FileWatchEvent>, watched: &WatchedFiles) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }
    for path in &event.paths {
        let Some(kind) = watched.classify(path) else {
            continue;
        };
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        let _ = tx.send(match kind {
            WatchedKind::Config => FileWatchEvent::ConfigChanged(content),
            WatchedKind::Level => FileWatchEvent::LevelChanged(content),
        });
    }
}

fn path_matches(a: &Path, b: &Path) -> bool {
    let ca = std::fs::canonicalize(a).unwrap_or_else(|_| a.to_path_buf());
    let cb = std::fs::canonicalize(b).unwrap_or_else(|_| b.to_path_buf());
    ca == cb
}

/// Applies one change. Invalid files are rejected and the old data kept.
pub fn apply_watch_event(
    event: FileWatchEvent,
    config: &mut GameConfig,
    tilemap: &mut Tilemap,
) -> Result<&'static str, String> {
    match event {
        FileWatchEvent::ConfigChanged(content) => {
            let startup = StartupConfig::from_json(&content)?;
            *config = startup.tuning;
            Ok("config")
        }
        FileWatchEvent::LevelChanged(content) => {
            *tilemap = Tilemap::from_json(&content)?;
            Ok("level")
        }
    }
}

fn process_file_watch_events(
    watcher: Option<Res<FileWatcherReceiver>>,
    mut config: ResMut<GameConfig>,
    mut tilemap: ResMut<Tilemap>,
) {
    let Some(watcher) = watcher else { return };

    for event in watcher.0.try_iter().take(16) {
        match apply_watch_event(event, &mut config, &mut tilemap) {
            Ok(what) => {
                println!("[Gridrunner FileWatcher] Reloaded {what}");
                // New tuning only reaches entities through a rebuild.
                tilemap.set_changed();
            }
            Err(e) => eprintln!("[Gridrunner FileWatcher] Reload rejected: {e}"),
        }
    }
}
