//! ABI artifact scanner - discovers ABI documents on the filesystem and
//! registers them with a repository

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use crate::info::AbiInfo;
use crate::repository::AbiRepository;

/// Outcome of one scan sweep.
#[derive(Debug, Default, Clone)]
pub struct ScanReport {
    /// Number of candidate files inspected
    pub scanned_files: usize,
    /// Number of contracts registered
    pub loaded_contracts: usize,
    /// Per-file errors; a bad artifact never aborts the sweep
    pub errors: Vec<String>,
    /// Sweep duration in milliseconds
    pub scan_ms: u128,
}

impl ScanReport {
    fn merge(&mut self, other: ScanReport) {
        self.scanned_files = self.scanned_files.saturating_add(other.scanned_files);
        self.loaded_contracts = self.loaded_contracts.saturating_add(other.loaded_contracts);
        self.errors.extend(other.errors);
    }
}

/// ABI file scanner
pub struct AbiScanner;

impl AbiScanner {
    /// Scan a single root directory for ABI artifacts and register every
    /// contract found with the repository.
    pub fn scan(root: impl AsRef<Path>, repository: &AbiRepository) -> ScanReport {
        let started = Instant::now();
        let root = root.as_ref();
        let mut report = ScanReport::default();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !Self::is_ignored_dir(e.path()))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    report.errors.push(err.to_string());
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();

            // Only process JSON files in out/ or artifacts/ directories
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if !Self::path_contains_any(path, &["out", "artifacts"]) {
                continue;
            }

            // Skip files larger than 5MB
            let metadata = match entry.metadata() {
                Ok(meta) => meta,
                Err(err) => {
                    report.errors.push(format!("{}: {}", path.display(), err));
                    continue;
                }
            };
            if metadata.len() > 5 * 1024 * 1024 {
                continue;
            }

            report.scanned_files += 1;

            match Self::load_abi_file(path, repository) {
                Ok(true) => report.loaded_contracts += 1,
                Ok(false) => {}
                Err(err) => report.errors.push(format!("{}: {}", path.display(), err)),
            }
        }

        report.scan_ms = started.elapsed().as_millis();
        tracing::debug!(
            root = %root.display(),
            scanned = report.scanned_files,
            loaded = report.loaded_contracts,
            errors = report.errors.len(),
            "ABI scan finished"
        );

        report
    }

    /// Scan multiple root directories.
    pub fn scan_roots(roots: &[PathBuf], repository: &AbiRepository) -> ScanReport {
        let started = Instant::now();
        let mut report = ScanReport::default();

        for root in roots {
            report.merge(Self::scan(root, repository));
        }

        report.scan_ms = started.elapsed().as_millis();
        report
    }

    /// Load a single artifact file. Returns whether a contract was
    /// registered.
    fn load_abi_file(path: &Path, repository: &AbiRepository) -> anyhow::Result<bool> {
        let content = fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;

        // Try to extract ABI - either raw array or nested in "abi" field
        let abi_value = if value.is_array() {
            value
        } else if let Some(abi) = value.get("abi") {
            abi.clone()
        } else {
            return Ok(false); // No ABI found, skip silently
        };

        // Artifact file stem doubles as the contract name
        // (out/Token.sol/Token.json -> "Token")
        let contract_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string);

        let info = AbiInfo::from_abi_with_identity(
            &abi_value.to_string(),
            None,
            contract_name.as_deref(),
            Some("artifact"),
            None,
        )?;
        repository.add_abi_info(info)?;

        Ok(true)
    }

    /// Check if a path should be ignored
    fn is_ignored_dir(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| {
                matches!(
                    name,
                    ".git" | "target" | "node_modules" | ".next" | "dist" | "build"
                )
            })
            .unwrap_or(false)
    }

    /// Check if path contains any of the given names
    fn path_contains_any(path: &Path, names: &[&str]) -> bool {
        path.components().any(|component| {
            if let std::path::Component::Normal(value) = component {
                if let Some(value) = value.to_str() {
                    return names.iter().any(|name| *name == value);
                }
            }
            false
        })
    }
}
