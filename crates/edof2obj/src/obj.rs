//! OBJ/MTL asset emission.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::mesh::{self, Lattice};

/// Every output path is derived here from the output directory and the
/// input's base name, so no call site joins paths by hand.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    dir: PathBuf,
    stem: String,
}

impl OutputPaths {
    pub fn new<P: AsRef<Path>>(dir: P, stem: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            stem: stem.to_owned(),
        }
    }

    pub fn obj(&self) -> PathBuf {
        self.dir.join(format!("{}.obj", self.stem))
    }

    pub fn mtl(&self) -> PathBuf {
        self.dir.join(format!("{}.mtl", self.stem))
    }

    pub fn texture(&self) -> PathBuf {
        self.dir.join(format!("{}.jpg", self.stem))
    }

    /// Reference to the material file as written into the OBJ. Joined to
    /// `.` rather than to the OBJ's own directory, matching the files this
    /// tool has always produced.
    pub fn mtl_ref(&self) -> String {
        format!("./{}.mtl", self.stem)
    }

    /// Reference to the texture as written into the MTL, same `.`-relative
    /// convention as [`OutputPaths::mtl_ref`].
    pub fn texture_ref(&self) -> String {
        format!("./{}.jpg", self.stem)
    }
}

fn mtl_contents(texture_ref: &str) -> String {
    format!(
        "\nnewmtl None\n\
         Ns 0.000000\n\
         Ka 0.000000 0.000000 0.000000\n\
         Kd 0.800000 0.800000 0.800000\n\
         Ks 0.468293 0.468293 0.468293\n\
         Ke 0.800000 0.800000 0.800000\n\
         Ni 1.000000\n\
         d 1.000000\n\
         illum 2\n\
         map_Kd {texture_ref}\n"
    )
}

/// Write the material file with its fixed shading constants.
pub fn write_mtl(paths: &OutputPaths) -> Result<()> {
    let path = paths.mtl();
    std::fs::write(&path, mtl_contents(&paths.texture_ref()))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Write the geometry: vertices, UVs, then the 1-based triangle list.
/// Each face vertex indexes the same slot for position and UV; shading is
/// flat (`s off`), so there is no normal channel.
pub fn write_obj(paths: &OutputPaths, lattice: &Lattice) -> Result<()> {
    let path = paths.obj();
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "mtllib {}", paths.mtl_ref())?;
    writeln!(out, "o Object.001")?;

    for [x, y, z] in &lattice.vertices {
        writeln!(out, "v {x:.5} {y:.5} {z:.5}")?;
    }

    for [tx, ty] in &lattice.uvs {
        writeln!(out, "vt {tx:.5} {ty:.5}")?;
    }

    writeln!(out, "usemtl None")?;
    writeln!(out, "s off")?;

    for [a, b, c] in mesh::faces(lattice.vx, lattice.vy) {
        writeln!(out, "f {a}/{a} {b}/{b} {c}/{c}")?;
    }

    out.flush()?;
    Ok(())
}
