use std::error::Error;
use std::path::{Path, PathBuf};

use likelihood_grid::visualization::slice_to_image;
use likelihood_grid::{GridConfig, LikelihoodGrid};

const USAGE: &str = "usage: grid_tool <map.bt|map.ot|config.yaml> [slice_z] [out.png]";

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args();
    let _binary = args.next();
    let input = match args.next() {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("{USAGE}");
            return Ok(());
        }
    };
    let slice_z = args.next().map(|z| z.parse::<f32>()).transpose()?;
    let output = args.next().map(PathBuf::from);

    let config = if is_yaml(&input) {
        GridConfig::load(&input)?
    } else {
        GridConfig {
            map_path: Some(input),
            ..Default::default()
        }
    };

    let mut grid = LikelihoodGrid::from_config(config);
    grid.open_configured()?;

    let field = grid.field()?;
    let info = field.info();
    let bounds = field.bounds();
    log::info!(
        "grid {}x{}x{} at {} m, bounds {}..{}, {} occupied voxels",
        info.width,
        info.height,
        info.depth,
        info.resolution,
        bounds.min,
        bounds.max,
        field.occupied_points().len()
    );
    let tf = grid.world_transform()?;
    log::info!(
        "{} -> {} translation {}",
        tf.parent_frame,
        tf.child_frame,
        tf.translation
    );

    let z = slice_z
        .or(grid.config().slice_z)
        .unwrap_or((bounds.min.z + bounds.max.z) / 2.0);
    let slice = grid.slice(z)?;
    let output = output.unwrap_or_else(|| PathBuf::from(format!("slice_{:.2}.png", slice.layer_z)));
    slice_to_image(&slice).save(&output)?;
    log::info!("wrote slice at z={} to {}", slice.layer_z, output.display());

    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}
