use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::types::Series;
use crate::version;

fn unknown() -> String {
    "unknown".to_string()
}

/// Point-in-time snapshot of an installed device (`facts.json`).
///
/// All nine top-level sections are required; values inside them may be
/// missing and default to `"unknown"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceFacts {
    pub device: DeviceInfo,
    pub os: OsInfo,
    pub jetpack: JetpackInfo,
    pub l4t: L4tInfo,
    pub cuda: ComponentVersion,
    pub python: ComponentVersion,
    pub memory: MemoryInfo,
    pub storage: StorageInfo,
    pub package_managers: BTreeMap<String, PackageManagerInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tensorrt: Option<ComponentVersion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default = "unknown")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsInfo {
    #[serde(default = "unknown")]
    pub pretty_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_release: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JetpackInfo {
    #[serde(default = "unknown")]
    pub installed_version: String,
    /// Derived by the collector; filled in by [`DeviceFacts::normalized`] when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<Series>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L4tInfo {
    #[serde(default = "unknown")]
    pub release: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentVersion {
    #[serde(default = "unknown")]
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_mb: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_total_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_free_gb: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageManagerInfo {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Derive a series from the installed JetPack version, then the L4T release.
pub fn derive_series(jetpack_version: &str, l4t_release: &str) -> Series {
    let from_jetpack = Series::from_major(jetpack_version);
    if from_jetpack.is_known() {
        return from_jetpack;
    }
    let release = l4t_release.trim().to_ascii_uppercase();
    if release.starts_with("R35") {
        Series::FiveX
    } else if release.starts_with("R36") {
        Series::SixX
    } else {
        Series::Unknown
    }
}

impl DeviceFacts {
    /// Fill derived fields. Called once at the ingestion boundary.
    pub fn normalized(mut self) -> Self {
        if self.jetpack.series.is_none() {
            self.jetpack.series = Some(derive_series(
                &self.jetpack.installed_version,
                &self.l4t.release,
            ));
        }
        self
    }

    pub fn series(&self) -> Series {
        self.jetpack.series.unwrap_or_else(|| {
            derive_series(&self.jetpack.installed_version, &self.l4t.release)
        })
    }

    /// Ubuntu release (`22.04`) parsed out of `os.pretty_name`.
    pub fn ubuntu_version(&self) -> Option<String> {
        self.os.pretty_name.split_whitespace().find_map(|word| {
            let bytes = word.as_bytes();
            let looks_like_release = bytes.len() >= 5
                && bytes[..2].iter().all(u8::is_ascii_digit)
                && bytes[2] == b'.'
                && bytes[3..5].iter().all(u8::is_ascii_digit);
            looks_like_release.then(|| word[..5].to_string())
        })
    }

    /// Installed version for a component, or `None` when unknown.
    pub fn installed_version(&self, component: &Component) -> Option<String> {
        let raw = match component {
            Component::Jetpack => self.jetpack.installed_version.clone(),
            Component::L4t => self.l4t.release.clone(),
            Component::Cuda => self.cuda.version.clone(),
            Component::Python => self.python.version.clone(),
            Component::Ubuntu => return self.ubuntu_version(),
            Component::TensorRt => self.tensorrt.as_ref()?.version.clone(),
            Component::Framework(_) | Component::Unmapped(_) => return None,
        };
        version::is_known(&raw).then_some(raw)
    }

    pub fn has_manager(&self, name: &str) -> bool {
        self.package_managers.get(name).is_some_and(|m| m.available)
    }

    pub fn available_managers(&self) -> impl Iterator<Item = &str> {
        self.package_managers
            .iter()
            .filter(|(_, info)| info.available)
            .map(|(name, _)| name.as_str())
    }
}
