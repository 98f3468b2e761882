extern crate env_logger;
#[macro_use]
extern crate log;
extern crate mediaplay_auto;
extern crate mediaplay_player;
extern crate serde_json;
extern crate url;

use std::env;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mediaplay_auto::Backend;
use mediaplay_player::dispatcher::dispatch_context;
use mediaplay_player::traits::BackendInit;
use mediaplay_player::{MediaInfo, Player, PlayerConfig};

const NANOS_PER_SEC: u64 = 1_000_000_000;

fn to_uri(location: &str) -> Result<String, Box<dyn Error>> {
    if location.contains("://") {
        return Ok(location.to_owned());
    }
    let path = Path::new(location).canonicalize()?;
    let uri = url::Url::from_file_path(&path)
        .map_err(|_| format!("{} is not an absolute path", path.display()))?;
    Ok(uri.into())
}

fn load_config(path: Option<&String>) -> Result<PlayerConfig, Box<dyn Error>> {
    match path {
        Some(path) => {
            let reader = BufReader::new(File::open(path)?);
            Ok(serde_json::from_reader(reader)?)
        }
        None => Ok(PlayerConfig::default()),
    }
}

fn print_media_info(info: &MediaInfo) {
    println!("URI: {}", info.uri.as_deref().unwrap_or("-"));
    if let Some(ref title) = info.title {
        println!("Title: {}", title);
    }
    if let Some(duration) = info.duration {
        println!("Duration: {:?}", Duration::from_nanos(duration));
    }
    println!("Seekable: {}", info.seekable);
    for stream in &info.streams {
        println!(
            "  {} #{}: {}",
            stream.stream_type(),
            stream.index,
            stream.codec.as_deref().unwrap_or("unknown codec")
        );
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let location = args
        .get(1)
        .ok_or("Usage: cargo run --bin play <file_path_or_uri> [config.json]")?;
    let uri = to_uri(location)?;
    let config = load_config(args.get(2))?;

    let backend = Backend::init()?;
    let (dispatcher, context) = dispatch_context();
    let player = Player::with_config(Box::new(backend), None, Some(Arc::new(dispatcher)), config)?;

    let done = Arc::new(AtomicBool::new(false));

    player.connect_state_changed(|state| println!("Player state changed to {}", state.name()));
    player.connect_media_info_updated(print_media_info);
    player.connect_position_updated(|position| {
        print!("\rPosition: {}s ", position / NANOS_PER_SEC);
    });
    player.connect_buffering(|percent| println!("Buffering {}%", percent));
    player.connect_video_dimensions_changed(|&(width, height)| {
        println!("Video dimensions: {}x{}", width, height)
    });
    player.connect_warning(|warning| warn!("{}", warning));
    let error_done = done.clone();
    player.connect_error(move |error| {
        eprintln!("Error: {}", error);
        error_done.store(true, Ordering::SeqCst);
    });
    let eos_done = done.clone();
    player.connect_end_of_stream(move |_| {
        println!("\nEOF");
        eos_done.store(true, Ordering::SeqCst);
    });

    player.set_uri(Some(uri.as_str()))?;
    player.play()?;

    while !done.load(Ordering::SeqCst) {
        context.iteration(true);
    }

    player.stop()?;
    Ok(())
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
