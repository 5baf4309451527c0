use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use galaxy_fields::{DriftMode, Rgb, SceneParams};
use log::info;
use std::io;

/// Procedural galaxies, stars and drifting particle clouds
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
  /// Number of galaxies to start with
  #[arg(short, long, default_value_t = 5)]
  galaxies: u32,
  /// Upper bound on concurrently active galaxies
  #[arg(long, default_value_t = 15)]
  max_fields: usize,
  /// Seed for every random draw; random when omitted
  #[arg(long)]
  seed: Option<u64>,
  /// Chance per frame that a new galaxy appears
  #[arg(long, default_value_t = 0.0005)]
  spawn_probability: f64,
  /// How floating drift relates to frame time
  #[arg(long, value_enum, default_value_t = DriftMode::TimeScaled)]
  drift: DriftMode,
  /// Particles per galaxy
  #[arg(long, default_value_t = 80_000)]
  particles: u32,
  /// Core colour of every galaxy, as #rrggbb (disables random colours)
  #[arg(long, value_parser = Rgb::from_hex)]
  inside_color: Option<Rgb>,
  /// Rim colour of every galaxy, as #rrggbb (disables random colours)
  #[arg(long, value_parser = Rgb::from_hex)]
  outside_color: Option<Rgb>,
  /// Skip the background starfield
  #[arg(long, default_value_t = false)]
  no_stars: bool,
  /// Skip the ambient particle cloud
  #[arg(long, default_value_t = false)]
  no_ambient: bool,
  /// Run in headless mode (no window)
  #[arg(long, default_value_t = false)]
  headless: bool,
  /// Frames to run in headless mode
  #[arg(long, default_value_t = 600)]
  frames: u64,
  /// Fixed frame rate of the headless clock
  #[arg(long, default_value_t = 60.0)]
  fps: f32,
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Generate shell completion scripts
  Completions {
    /// The shell to generate the script for
    #[arg(value_enum)]
    shell: Shell,
  },
}

impl Args {
  fn scene_params(&self) -> SceneParams {
    let mut params = SceneParams {
      galaxies: self.galaxies,
      max_fields: self.max_fields,
      spawn_probability: self.spawn_probability,
      drift: self.drift,
      ..SceneParams::default()
    };
    params.shape.count = self.particles;
    if let Some(color) = self.inside_color {
      params.shape.inside_color = color;
      params.randomize_colors = false;
    }
    if let Some(color) = self.outside_color {
      params.shape.outside_color = color;
      params.randomize_colors = false;
    }
    if self.no_stars {
      params.starfield = None;
    }
    if self.no_ambient {
      params.ambient = None;
    }
    params
  }
}

fn main() -> anyhow::Result<()> {
  let args = Args::parse();

  if let Some(Commands::Completions { shell }) = args.command {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    return Ok(());
  }

  env_logger::init();
  let seed = args.seed.unwrap_or_else(rand::random);
  info!("seed {seed}, drift {:?}", args.drift);

  let params = args.scene_params();
  if args.headless {
    galaxy_fields::state::run_headless(params, seed, args.frames, args.fps)
  } else {
    galaxy_fields::state::run(params, seed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cli_is_well_formed() {
    Args::command().debug_assert();
  }

  #[test]
  fn flags_reach_scene_params() {
    let args = Args::parse_from([
      "galaxy-fields",
      "--galaxies",
      "2",
      "--drift",
      "per-frame",
      "--particles",
      "100",
      "--no-stars",
    ]);
    let params = args.scene_params();
    assert_eq!(params.galaxies, 2);
    assert_eq!(params.drift, DriftMode::PerFrame);
    assert_eq!(params.shape.count, 100);
    assert!(params.starfield.is_none());
    assert!(params.ambient.is_some());
    assert!(params.randomize_colors);
  }

  #[test]
  fn colour_flags_fix_galaxy_colours() {
    let args = Args::parse_from(["galaxy-fields", "--inside-color", "#00aaff"]);
    let params = args.scene_params();
    assert_eq!(params.shape.inside_color, Rgb::from_u32(0x00aaff));
    assert_eq!(params.shape.outside_color, SceneParams::default().shape.outside_color);
    assert!(!params.randomize_colors);
  }

  #[test]
  fn malformed_colour_is_rejected() {
    assert!(Args::try_parse_from(["galaxy-fields", "--outside-color", "#12345"]).is_err());
    assert!(Args::try_parse_from(["galaxy-fields", "--inside-color", "red"]).is_err());
  }
}
