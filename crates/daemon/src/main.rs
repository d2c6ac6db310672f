mod config;

use std::time::Duration;

use config::{config_path_from_env, load_or_create_config, resolve_music_root, resolve_path};
use library::{Library, LibraryWatcher};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let Some(music_root) = resolve_music_root(&config_path, &config.music_root) else {
        info!("Music directory not configured yet; set music_root in {:?}", config_path);
        return Ok(());
    };
    if !music_root.is_dir() {
        warn!("Music directory {:?} is missing", music_root);
        return Ok(());
    }

    let catalog_path = resolve_path(&config_path, config.catalog_path.trim());
    let library = Library::open(music_root, &catalog_path)?;
    let stats = library.stats()?;
    info!(
        "Catalog has {} artists, {} albums, {} tracks",
        stats.artists, stats.albums, stats.tracks
    );

    if config.scan_on_start {
        let scan_library = library.clone();
        let workers = config.scan_workers;
        match tokio::task::spawn_blocking(move || scan_library.scan(workers)).await {
            Ok(Ok(scan)) => info!(
                "Initial scan complete: {} new, {} known, {} skipped, {} failed",
                scan.created, scan.existing, scan.skipped, scan.failed
            ),
            Ok(Err(err)) if err.is_store_unavailable() => return Err(err.into()),
            Ok(Err(err)) => warn!("Initial scan failed: {}", err),
            Err(err) => warn!("Initial scan join error: {}", err),
        }
    }

    if !config.watch_music {
        info!("Watcher disabled (watch_music=false)");
        shutdown_signal().await;
        return Ok(());
    }

    let watcher = library.watch(config.watch_poll())?;
    tokio::select! {
        _ = shutdown_signal() => {},
        _ = watcher_exited(&watcher) => warn!("Watcher exited; shutting down"),
    }
    tokio::task::spawn_blocking(move || watcher.stop()).await??;

    let stats = library.stats()?;
    info!(
        "Catalog has {} artists, {} albums, {} tracks",
        stats.artists, stats.albums, stats.tracks
    );
    Ok(())
}

async fn watcher_exited(watcher: &LibraryWatcher) {
    let mut ticks = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticks.tick().await;
        if watcher.is_finished() {
            return;
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
