use std::collections::BTreeSet;
use std::path::Path;

use tcs_core::errors::{ErrorInfo, TcsError};
use tcs_core::Factor;
use walkdir::WalkDir;

/// Names excluded from directory catalogs unless overridden.
pub const DEFAULT_EXCLUDES: &[&str] = &["combination"];

/// Sorted set of factors a study may draw from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FactorCatalog {
    factors: Vec<Factor>,
}

impl FactorCatalog {
    /// Catalog over explicit names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<Factor> = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .map(Factor::new)
            .collect();
        Self {
            factors: set.into_iter().collect(),
        }
    }

    /// Catalog of the `*.toml` file stems directly inside `dir`.
    pub fn from_dir(dir: &Path, exclude: &[String]) -> Result<Self, TcsError> {
        if !dir.is_dir() {
            return Err(TcsError::Config(
                ErrorInfo::new("catalog-dir-missing", "factor directory does not exist")
                    .with_context("path", dir.display().to_string()),
            ));
        }
        let mut names = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| TcsError::io("catalog-scan", dir, err))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some("toml")
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if exclude.iter().any(|excluded| excluded == stem) {
                continue;
            }
            names.push(stem.to_string());
        }
        Ok(Self::from_names(names))
    }

    /// All factors, sorted.
    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    /// Number of factors.
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// True when the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Resolves `all` or a comma separated list against the catalog.
    pub fn select(&self, selector: &str) -> Result<Vec<Factor>, TcsError> {
        let selector = selector.trim();
        if selector.is_empty() || selector.eq_ignore_ascii_case("all") {
            return Ok(self.factors.clone());
        }
        let mut chosen = BTreeSet::new();
        for name in selector.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            let factor = Factor::new(name);
            if self.factors.binary_search(&factor).is_err() {
                return Err(TcsError::Config(
                    ErrorInfo::new("catalog-unknown-factor", "factor is not in the catalog")
                        .with_context("factor", name)
                        .with_hint(format!(
                            "available: {}",
                            self.factors
                                .iter()
                                .map(Factor::as_str)
                                .collect::<Vec<_>>()
                                .join(", ")
                        )),
                ));
            }
            chosen.insert(factor);
        }
        Ok(chosen.into_iter().collect())
    }
}
