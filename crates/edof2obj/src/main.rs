//! edof2obj: 3D model generation from a wide-aperture photo.
//!
//! Reads a JPEG with an embedded EDOF depth marker and writes a textured
//! OBJ/MTL model: decode the depth grid, pull out the embedded texture,
//! smooth the depth samples, then project them onto a triangulated lattice.

mod mesh;
mod obj;
mod smooth;
mod texture;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use crate::obj::OutputPaths;
use crate::smooth::Grid;

/// Spatial sigma of the optional gaussian blur, in depth samples per axis.
const GAUSSIAN_SIGMA: f64 = 8.0;

/// 3D model generation from a wide-aperture photo with an embedded
/// EDOF depth map.
#[derive(Parser, Debug)]
#[command(name = "edof2obj", version)]
struct Args {
    /// Output directory; created if missing.
    #[arg(long, default_value = "model")]
    dir: String,

    /// Column divisions of the output mesh lattice.
    #[arg(long, default_value_t = 400)]
    mesh: usize,

    /// Clipping tolerance band half-width for convolution smoothing.
    #[arg(long, default_value_t = 5.0)]
    range: f64,

    /// Number of blur+clip passes in convolution mode.
    #[arg(long, default_value_t = 10)]
    nconv: u32,

    /// Use a single gaussian blur pass instead of iterated convolution.
    #[arg(long, default_value_t = false)]
    gfliter: bool,

    /// Input JPEG file with an embedded EDOF depth marker.
    input: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    run(&args)
}

fn run(args: &Args) -> Result<()> {
    fs::create_dir_all(&args.dir)
        .with_context(|| format!("creating output directory {}", args.dir))?;

    let stem = args
        .input
        .file_stem()
        .context("input path has no file name")?
        .to_string_lossy()
        .into_owned();
    let paths = OutputPaths::new(&args.dir, &stem);

    let data =
        fs::read(&args.input).with_context(|| format!("reading {}", args.input.display()))?;

    let primary = image::load_from_memory(&data).context("decoding input image")?;
    let (width, height) = (primary.width(), primary.height());
    debug!("primary image {width}x{height}");

    let depth = edof::parse_edof_bytes(&data).context("decoding EDOF depth marker")?;
    info!(
        "depth grid {}x{}, orientation {:?}",
        depth.rows, depth.columns, depth.orientation
    );

    let selected = texture::extract_texture(&data, width)?;
    texture::write_texture(&selected, &paths.texture())?;
    debug!("wrote {}", paths.texture().display());

    let grid = Grid::from_depth_map(&depth);
    let smoothed = if args.gfliter {
        debug!("gaussian blur, sigma {GAUSSIAN_SIGMA}");
        smooth::gaussian(&grid, GAUSSIAN_SIGMA)
    } else {
        debug!("{} convolution passes, tolerance {}", args.nconv, args.range);
        smooth::convolve_clipped(&grid, args.nconv, args.range)
    };

    let lattice = mesh::build_lattice(&smoothed, width, height, args.mesh)?;
    debug!("lattice has {} vertices", lattice.vertices.len());

    obj::write_mtl(&paths)?;
    obj::write_obj(&paths, &lattice)?;

    info!(
        "OK {} -> {} ({} vertices)",
        args.input.display(),
        paths.obj().display(),
        lattice.vertices.len()
    );

    Ok(())
}
