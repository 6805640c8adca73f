//! SPIR-V byte-code loading.

use std::fs::File;
use std::path::Path;

use crate::error::{GpuError, Result};

/// Load a pre-compiled SPIR-V blob from disk as whole words.
///
/// A file that cannot be opened is a missing resource; a file that opens
/// but fails `ash::util::read_spv` (byte length not a multiple of four, or
/// a wrong magic number) is malformed byte code and reported as a module
/// creation failure.
pub fn load_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();

    let mut file = File::open(path).map_err(|source| GpuError::ShaderFileNotFound {
        path: path.display().to_string(),
        source,
    })?;

    ash::util::read_spv(&mut file)
        .map_err(|e| GpuError::ShaderModuleCreation(format!("{}: {e}", path.display())))
}
