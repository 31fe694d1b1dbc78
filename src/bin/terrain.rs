//! ground-terrain binary
//!
//! Debug tool around [`TerrainEngine`]: sample the height field, carve
//! damage, walk an observer across the world, and round-trip save files.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                    | Default | Description                         |
//! |------------------------|---------|-------------------------------------|
//! | `GROUND_SEED`          | `42`    | Terrain seed                        |
//! | `GROUND_CONFIG`        | unset   | Optional TOML file with overrides   |
//! | `GROUND_CHUNK_SIZE`    | `512`   | Chunk side length (world units)     |
//! | `GROUND_ACTIVE_CHUNKS` | `3`     | Active square side, in chunks       |

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ground_engine::{
    config, polygon::Polygons, save, InMemoryWorld, TerrainEngine, Vec2, WorldSave,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "ground-terrain", about = "Ground Engine terrain tool", version)]
struct Args {
    /// Terrain seed
    #[arg(long, env = "GROUND_SEED", default_value_t = 42)]
    seed: u64,

    /// TOML file layered under `GROUND_*` environment overrides
    #[arg(long, env = "GROUND_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print surface height and normal at `x`
    Height {
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
    },
    /// Carve a rectangle out of the terrain and report affected chunks
    Damage {
        /// left top right bottom
        #[arg(long, num_args = 4, allow_hyphen_values = true, value_names = ["X0", "Y0", "X1", "Y1"])]
        rect: Vec<i32>,
    },
    /// Move the observer from `--from` to `--to` along the surface
    Stream {
        #[arg(long, allow_hyphen_values = true)]
        from: f32,
        #[arg(long, allow_hyphen_values = true)]
        to: f32,
        #[arg(long, default_value_t = 256.0)]
        step: f32,
    },
    /// Carve the given rectangle, then write a save file
    Save {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, num_args = 4, allow_hyphen_values = true, value_names = ["X0", "Y0", "X1", "Y1"])]
        rect: Vec<i32>,
    },
    /// Load a save file and place the chunks around the origin
    Load {
        #[arg(long)]
        input: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ground_engine=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let terrain_config = config::load(args.config.as_deref())
        .with_context(|| format!("loading configuration (seed {})", args.seed))?;
    let world = InMemoryWorld::with_terrain_props();

    match args.command {
        Command::Height { x } => {
            let engine = TerrainEngine::new(args.seed, terrain_config, world.world())?;
            let normal = engine.normal_at(x);
            println!("height({x}) = {:.3}  normal = {normal}", engine.height_at(x));
        }
        Command::Damage { rect } => {
            let engine = TerrainEngine::new(args.seed, terrain_config, world.world())?;
            let region = rect_region(&rect)?;
            let affected = engine.apply_damage(&region);
            for id in &affected {
                let area = engine
                    .inspect(*id, |c| c.damage().area())
                    .unwrap_or_default();
                println!("chunk {id}: damaged area {area:.0}");
            }
            tracing::info!(chunks = affected.len(), "damage applied");
        }
        Command::Stream { from, to, step } => {
            if step <= 0.0 {
                bail!("--step must be positive, got {step}");
            }
            let engine = TerrainEngine::new(args.seed, terrain_config, world.world())?;
            let direction = if to >= from { 1.0 } else { -1.0 };
            let mut x = from;
            loop {
                let y = engine.height_at(x as f64) as f32;
                let update = engine.set_active_area(Vec2::new(x, y));
                if !update.is_empty() {
                    println!(
                        "observer ({x:.0}, {y:.0}) in {}: +{} -{} evicted {}",
                        update.center,
                        update.placed.len(),
                        update.unplaced.len(),
                        update.evicted.len()
                    );
                }
                if (to - x) * direction <= 0.0 {
                    break;
                }
                x = if direction > 0.0 { (x + step).min(to) } else { (x - step).max(to) };
            }
            engine.settle().await;
            world.entities.lock().flush();
            println!("{}", serde_json::to_string_pretty(&engine.stats())?);
        }
        Command::Save { out, rect } => {
            let engine = TerrainEngine::new(args.seed, terrain_config, world.world())?;
            engine.apply_damage(&rect_region(&rect)?);
            save::write_to_path(&engine.snapshot(), &out)
                .with_context(|| format!("writing {}", out.display()))?;
        }
        Command::Load { input } => {
            let loaded: WorldSave = save::read_from_path(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let engine = TerrainEngine::from_save(&loaded, terrain_config, world.world())?;
            let y = engine.height_at(0.0) as f32;
            engine.set_active_area(Vec2::new(0.0, y));
            println!("{}", serde_json::to_string_pretty(&engine.stats())?);
            println!(
                "fixtures: {}  occluders: {}  entities: {}",
                world.physics.lock().len(),
                world.occluders.lock().len(),
                world.entities.lock().len()
            );
        }
    }

    Ok(())
}

fn rect_region(rect: &[i32]) -> Result<Polygons> {
    let [x0, y0, x1, y1] = rect else {
        bail!("--rect takes four values, got {}", rect.len());
    };
    let region = Polygons::rect(*x0.min(x1), *y0.min(y1), *x0.max(x1), *y0.max(y1));
    if region.is_empty() {
        bail!("--rect {x0} {y0} {x1} {y1} has no area");
    }
    Ok(region)
}
