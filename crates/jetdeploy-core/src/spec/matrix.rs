use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::types::{Operator, Series};
use crate::version::{compare_versions, on_track, satisfies};

const EMBEDDED_MATRIX: &str = include_str!("../../matrix/jetpack-matrix.json");

/// Static per-series compatibility reference data. Read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityMatrix {
    pub matrix_version: String,

    /// Keyed by series string ("5.x", "6.x").
    pub series: BTreeMap<String, SeriesProfile>,

    /// Documented in-series fallbacks: component -> series -> version.
    #[serde(default)]
    pub fallbacks: BTreeMap<String, BTreeMap<String, String>>,

    /// Package managers the analyzer may suggest, keyed by manager name.
    #[serde(default)]
    pub package_managers: BTreeMap<String, ManagerProfile>,

    /// Explanatory text for blocked classifications, keyed by category.
    #[serde(default)]
    pub guidance: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesProfile {
    pub l4t_major: String,
    pub ubuntu: VersionRange,
    pub cuda: VersionRange,
    pub python: VersionRange,
    pub tensorrt_major: String,
    /// Tested wheel tracks per framework, oldest first.
    #[serde(default)]
    pub frameworks: BTreeMap<String, Vec<String>>,
}

/// Inclusive `[min, max]` span of tested versions. Each bound names a
/// release family: a `max` of "3.10" admits 3.10.12.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: String,
    pub max: String,
}

impl VersionRange {
    pub fn contains(&self, v: &str) -> bool {
        compare_versions(v, &self.min).is_ge()
            && (compare_versions(v, &self.max).is_le() || on_track(v, &self.max))
    }

    /// Some in-range version satisfying `op version`, if any.
    ///
    /// Candidates are the two bounds plus the required version itself when it
    /// falls inside the range; that covers every operator on a closed span.
    pub fn reachable(&self, op: Operator, required: &str) -> Option<String> {
        let mut candidates = vec![self.max.clone(), self.min.clone()];
        if self.contains(required) {
            candidates.insert(0, required.to_string());
        }
        candidates.into_iter().find(|c| satisfies(c, op, required))
    }

    /// Nearest bound to `version` (the in-series pin for an out-of-range request).
    pub fn nearest_bound(&self, version: &str) -> &str {
        if compare_versions(version, &self.min).is_lt() {
            &self.min
        } else {
            &self.max
        }
    }
}

impl std::fmt::Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}..{}", self.min, self.max)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerProfile {
    pub requires_sudo: bool,
    /// Words in a software requirement that name this manager.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CompatibilityMatrix {
    /// The matrix compiled into the binary.
    pub fn embedded() -> Result<Self, serde_json::Error> {
        serde_json::from_str(EMBEDDED_MATRIX)
    }

    pub fn embedded_json() -> &'static str {
        EMBEDDED_MATRIX
    }

    pub fn profile(&self, series: Series) -> Option<&SeriesProfile> {
        self.series.get(series.as_str())
    }

    /// Range for a ranged component (cuda, python, ubuntu) in a series.
    pub fn range(&self, series: Series, component: &Component) -> Option<&VersionRange> {
        let profile = self.profile(series)?;
        match component {
            Component::Cuda => Some(&profile.cuda),
            Component::Python => Some(&profile.python),
            Component::Ubuntu => Some(&profile.ubuntu),
            _ => None,
        }
    }

    /// Tested wheel track for a framework; empty when the series has none.
    pub fn framework_track(&self, series: Series, framework: &str) -> &[String] {
        self.profile(series)
            .and_then(|p| p.frameworks.get(framework))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn fallback(&self, component: &Component, series: Series) -> Option<&str> {
        self.fallbacks
            .get(component.key())
            .and_then(|by_series| by_series.get(series.as_str()))
            .map(String::as_str)
    }

    /// Known series other than `series`, in key order.
    pub fn other_series(&self, series: Series) -> impl Iterator<Item = (Series, &SeriesProfile)> {
        self.series.iter().filter_map(move |(key, profile)| {
            let s: Series = key.parse().ok()?;
            (s != series && s.is_known()).then_some((s, profile))
        })
    }

    pub fn manager_requires_sudo(&self, manager: &str) -> bool {
        self.package_managers
            .get(manager)
            .map(|m| m.requires_sudo)
            // unknown managers are assumed privileged
            .unwrap_or(true)
    }

    pub fn guidance(&self, key: &str) -> Option<&str> {
        self.guidance.get(key).map(String::as_str)
    }
}
