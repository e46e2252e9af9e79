use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use winit::event_loop::{ControlFlow, EventLoop};

use pointfield::window::App;
use pointfield::{Bitmap, FieldConfig, ImageRef, ParamName, TransitionController};

#[derive(Parser, Debug)]
#[command(
    name = "pointfield",
    version,
    about = "Render images as interactive fields of points"
)]
struct Args {
    /// Images to show, in gallery order. Built-in samples are used if empty.
    #[arg(value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// JSON configuration file.
    #[arg(long, value_name = "PATH", env = "POINTFIELD_CONFIG")]
    config: Option<PathBuf>,

    /// Override the red-channel culling threshold (0-255).
    #[arg(long, value_name = "N")]
    threshold: Option<u8>,

    /// Override a parameter default, e.g. `--set size=3.5`. Repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_override)]
    overrides: Vec<(ParamName, f32)>,

    /// Gallery index to open first.
    #[arg(long, default_value_t = 0)]
    start: usize,
}

fn parse_override(s: &str) -> Result<(ParamName, f32), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name: ParamName = name.trim().parse().map_err(|err| format!("{err}"))?;
    let value: f32 = value
        .trim()
        .parse()
        .map_err(|err| format!("invalid value for {name}: {err}"))?;
    Ok((name, value))
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Procedural images used when no paths are given.
fn sample_gallery() -> Result<Vec<ImageRef>> {
    let gradient = Bitmap::gradient(320, 200, [0, 0, 0, 255], [255, 255, 255, 255])?;

    let (width, height) = (256u32, 256u32);
    let mut rings = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - width as f32 / 2.0;
            let dy = y as f32 - height as f32 / 2.0;
            let d = (dx * dx + dy * dy).sqrt();
            let v = (((d / 12.0).sin() * 0.5 + 0.5) * 255.0) as u8;
            rings.extend_from_slice(&[v, v, v, 255]);
        }
    }
    let rings = Bitmap::from_rgba(rings, width, height)?;

    Ok(vec![gradient.into(), rings.into()])
}

fn main() -> Result<()> {
    initialise_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => FieldConfig::load(path)?,
        None => FieldConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    for &(name, value) in &args.overrides {
        config.defaults.set(name, value);
    }

    let gallery = if args.images.is_empty() {
        tracing::info!("no images given, using built-in samples");
        sample_gallery().context("failed to build sample images")?
    } else {
        args.images.into_iter().map(ImageRef::from).collect()
    };
    tracing::info!(images = gallery.len(), threshold = config.threshold, "starting viewer");

    let controller = TransitionController::new(config).with_gallery(gallery);
    let mut app = App::new(controller, args.start);

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run_app(&mut app).context("event loop failed")?;

    match app.take_error() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
