use std::env;
use std::path::PathBuf;
use std::thread;

use library::{Library, LibraryStats, ScanStats};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct Report {
    scan: ScanStats,
    catalog: LibraryStats,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let music_root = args
        .next()
        .or_else(|| env::var("MUSIC_ROOT").ok())
        .ok_or("MUSIC_ROOT not set and no path argument")?;
    let catalog_path = args
        .next()
        .or_else(|| env::var("CATALOG_PATH").ok())
        .unwrap_or_else(|| "data/library.db".to_string());

    let workers = thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1);
    let library = Library::open(PathBuf::from(&music_root), &PathBuf::from(&catalog_path))?;
    info!("Importing {} into {}", music_root, catalog_path);
    let scan = library.scan(workers)?;
    let catalog = library.stats()?;

    println!("{}", serde_json::to_string_pretty(&Report { scan, catalog })?);
    Ok(())
}
