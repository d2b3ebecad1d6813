use anyhow::{bail, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Collects the Rust sources that may declare custom schema structs or
/// documented handlers.
///
/// `target` and hidden directories are skipped. Files come back sorted so
/// that schema discovery is stable across runs.
///
/// # Example
///
/// ```no_run
/// use openapi_synth::scanner::SourceScanner;
/// use std::path::PathBuf;
///
/// let scan = SourceScanner::new(PathBuf::from("./src/schemas")).scan().unwrap();
/// println!("{} candidate files", scan.rust_files.len());
/// ```
pub struct SourceScanner {
    root_path: PathBuf,
}

/// Files found by a scan plus the entries that could not be read
#[derive(Debug, Default)]
pub struct ScanResult {
    pub rust_files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl SourceScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Walk the root directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a directory. Unreadable entries
    /// below it are recorded as warnings instead.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.is_dir() {
            bail!("Source directory does not exist: {}", self.root_path.display());
        }

        let mut result = ScanResult::default();
        let walker = WalkDir::new(&self.root_path)
            .into_iter()
            .filter_entry(|e| e.path() == self.root_path || !is_skipped(e.path()));

        for entry in walker {
            match entry {
                Ok(entry) if is_rust_file(entry.path()) => {
                    result.rust_files.push(entry.path().to_path_buf());
                }
                Ok(_) => {}
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    result.warnings.push(warning);
                }
            }
        }

        result.rust_files.sort();
        debug!(
            "Found {} Rust files under {}",
            result.rust_files.len(),
            self.root_path.display()
        );
        Ok(result)
    }
}

fn is_skipped(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name.starts_with('.') || name == "target"
}

fn is_rust_file(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("rs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_collects_sorted_rust_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("billing")).unwrap();
        fs::write(root.join("pet.rs"), "struct Pet;").unwrap();
        fs::write(root.join("billing/invoice.rs"), "struct Invoice;").unwrap();
        fs::write(root.join("README.md"), "# Schemas").unwrap();

        let result = SourceScanner::new(root.to_path_buf()).scan().unwrap();

        assert!(result.warnings.is_empty());
        let names: Vec<String> = result
            .rust_files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["billing/invoice.rs".to_string(), "pet.rs".to_string()]);
    }

    #[test]
    fn test_scan_skips_target_and_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join("target")).unwrap();
        fs::create_dir(root.join(".cache")).unwrap();
        fs::write(root.join("target/generated.rs"), "struct Generated;").unwrap();
        fs::write(root.join(".cache/stale.rs"), "struct Stale;").unwrap();
        fs::write(root.join("order.rs"), "struct Order;").unwrap();

        let result = SourceScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(result.rust_files.len(), 1);
        assert!(result.rust_files[0].ends_with("order.rs"));
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = SourceScanner::new(temp_dir.path().to_path_buf()).scan().unwrap();
        assert!(result.rust_files.is_empty());
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        let err = SourceScanner::new(missing).scan().unwrap_err();
        assert!(err.to_string().contains("Source directory does not exist"));
    }
}
