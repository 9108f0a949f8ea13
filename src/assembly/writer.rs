//! Writes a cloud assembly to a directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{AssemblyError, Result};

use super::CloudAssembly;
use super::manifest::MANIFEST_FILE;

/// Output directory used when none is given.
pub const DEFAULT_OUTPUT_DIR: &str = "assembly.out";

/// Writes templates and the manifest into one directory.
#[derive(Debug, Clone)]
pub struct AssemblyWriter {
    out_dir: PathBuf,
}

impl AssemblyWriter {
    /// Creates a writer targeting `out_dir`.
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Target directory.
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Writes every template, then the manifest. Returns the written paths,
    /// manifest last.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a file cannot
    /// be written.
    pub fn write(&self, assembly: &CloudAssembly) -> Result<Vec<PathBuf>> {
        self.ensure_dir()?;

        let mut written = Vec::with_capacity(assembly.artifacts.len() + 1);
        for artifact in &assembly.artifacts {
            let path = self.out_dir.join(artifact.template_file());
            write_atomic(&path, artifact.template_json.as_bytes())?;
            debug!("Wrote {} ({} resources)", path.display(), artifact.resource_count);
            written.push(path);
        }

        let manifest_path = self.out_dir.join(MANIFEST_FILE);
        write_atomic(&manifest_path, assembly.manifest().to_json()?.as_bytes())?;
        written.push(manifest_path);

        info!(
            "Wrote {} stacks to {}",
            assembly.artifacts.len(),
            self.out_dir.display()
        );
        Ok(written)
    }

    fn ensure_dir(&self) -> Result<()> {
        if self.out_dir.is_file() {
            return Err(AssemblyError::OutputDir {
                path: self.out_dir.clone(),
                message: String::from("path exists and is a file"),
            }
            .into());
        }
        fs::create_dir_all(&self.out_dir).map_err(|e| AssemblyError::OutputDir {
            path: self.out_dir.clone(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

impl Default for AssemblyWriter {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

/// Writes to a sibling temporary file, then renames it over `path`.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{Manifest, StackArtifact};
    use crate::config::{Environment, StackKind};
    use tempfile::TempDir;

    fn sample() -> CloudAssembly {
        CloudAssembly {
            artifacts: vec![StackArtifact {
                name: String::from("demo-infrastructure"),
                kind: StackKind::Infrastructure,
                environment: Environment::default(),
                dependencies: vec![],
                template_json: String::from("{\"Resources\": {}}"),
                resource_count: 0,
                export_count: 0,
            }],
            warnings: vec![String::from("heads up")],
        }
    }

    #[test]
    fn test_write_creates_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested").join("out");
        let written = AssemblyWriter::new(&out).write(&sample()).unwrap();

        assert_eq!(written.len(), 2);
        assert!(out.join("demo-infrastructure.template.json").is_file());
        assert!(!out.join("demo-infrastructure.template.tmp").exists());

        let manifest = Manifest::load(out.join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest.stack_order, vec!["demo-infrastructure"]);
        assert_eq!(manifest.warnings, vec!["heads up"]);
    }

    #[test]
    fn test_hash_matches_file_contents() {
        let dir = TempDir::new().unwrap();
        let assembly = sample();
        AssemblyWriter::new(dir.path()).write(&assembly).unwrap();

        let manifest = Manifest::load(dir.path().join(MANIFEST_FILE)).unwrap();
        let entry = &manifest.artifacts["demo-infrastructure"];
        assert_eq!(entry.template_hash, assembly.artifacts[0].template_hash());
        let on_disk = fs::read_to_string(dir.path().join(&entry.properties.template_file)).unwrap();
        assert_eq!(on_disk, assembly.artifacts[0].template_json);
    }

    #[test]
    fn test_rewrite_is_identical() {
        let dir = TempDir::new().unwrap();
        let writer = AssemblyWriter::new(dir.path());
        writer.write(&sample()).unwrap();
        let first = fs::read(dir.path().join(MANIFEST_FILE)).unwrap();
        writer.write(&sample()).unwrap();
        let second = fs::read(dir.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_file_in_the_way() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("out");
        fs::write(&blocker, "x").unwrap();
        assert!(AssemblyWriter::new(&blocker).write(&sample()).is_err());
    }
}
