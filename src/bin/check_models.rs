use anyhow::Result;
use clap::Parser;
use colored::*;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::PathBuf;

use rusty_mesh::pipeline::{FACE_DETECTION_MODEL, FACE_MESH_MODEL, FACE_MESH_REFINED_MODEL};

/// Checks the models directory and prints each model's inputs and outputs.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(default_value = "models")]
    models: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let expected = [
        (FACE_DETECTION_MODEL, "face boxes (optional, full frame is used without it)"),
        (FACE_MESH_MODEL, "468 landmarks"),
        (FACE_MESH_REFINED_MODEL, "478 landmarks, used with refineLandmarks"),
    ];

    for (file, purpose) in expected {
        let path = args.models.join(file);
        if !path.exists() {
            println!("{} {} ({})", "MISSING".yellow(), path.display(), purpose);
            continue;
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level1)?
            .with_intra_threads(1)?
            .commit_from_file(&path)?;

        println!("{} {} ({})", "OK".green(), path.display(), purpose);
        for (i, input) in session.inputs.iter().enumerate() {
            println!("    in  #{}: {} {:?}", i, input.name, input.input_type);
        }
        for (i, output) in session.outputs.iter().enumerate() {
            println!("    out #{}: {} {:?}", i, output.name, output.output_type);
        }
    }

    Ok(())
}
