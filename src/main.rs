use clap::Parser;
use colored::*;

use rusty_mesh::app::{App, AppOptions};
use rusty_mesh::args::{Args, Command, ConfigAction};
use rusty_mesh::config::ConfigStore;
use rusty_mesh::telemetry;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init(&args.log_level)?;

    if args.list {
        let cameras = nokhwa::query(nokhwa::utils::ApiBackend::Auto)?;
        println!("{}", "Available Cameras:".bold());
        println!("{:<5} | {:<30} | {:<10}", "Index", "Name", "Misc");
        println!("{}", "-".repeat(60));
        for cam in cameras {
            println!("{:<5} | {:<30} | {:?}", cam.index(), cam.human_name(), cam.misc());
        }
        return Ok(());
    }

    let store = ConfigStore::new(&args.config);
    let app = App::new(
        AppOptions {
            cam_index: args.cam_index,
            models_dir: args.models.clone(),
            synthetic: args.synthetic,
        },
        store.clone(),
    );

    match &args.command {
        Some(Command::Config { action }) => run_config_command(&app, &store, action),
        None => app.run(),
    }
}

fn run_config_command(app: &App, store: &ConfigStore, action: &ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = store.load();
            println!("{} {}", "Configuration:".bold(), store.path().display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Set(update) => {
            app.update_config(&update.apply_to(&store.load()))?;
            println!("{}", "Configuration saved. Press R in the viewer to apply.".green());
        }
        ConfigAction::Reset => {
            store.reset()?;
            println!("{}", "Stored configuration removed, defaults apply.".yellow());
        }
    }
    Ok(())
}
