extern crate env_logger;
extern crate mediaplay_auto;
extern crate mediaplay_player;
extern crate serde_json;

use std::env;
use std::error::Error;

use mediaplay_auto::Backend;
use mediaplay_player::list_visualizations;
use mediaplay_player::traits::BackendInit;

fn run() -> Result<(), Box<dyn Error>> {
    let json = env::args().any(|arg| arg == "--json");

    let backend = Backend::init()?;
    let registry = backend.registry();
    let visualizations = list_visualizations(&*registry);

    if json {
        println!("{}", serde_json::to_string_pretty(&visualizations)?);
        return Ok(());
    }

    if visualizations.is_empty() {
        println!("No visualization plugins installed");
    }
    for vis in &visualizations {
        println!("{:<20} {}", vis.name, vis.description);
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
