use serde::{Deserialize, Serialize};
use std::fmt;

/// A requirement component, normalized from free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    Jetpack,
    L4t,
    Cuda,
    Python,
    Ubuntu,
    TensorRt,
    /// Framework with a wheel track in the matrix (pytorch, onnxruntime, ...).
    Framework(String),
    Unmapped(String),
}

/// Framework names the matrix may carry wheel tracks for.
pub const KNOWN_FRAMEWORKS: &[&str] = &["pytorch", "onnxruntime", "torchvision", "tensorflow"];

impl Component {
    /// Lower-case, strip whitespace, fold known aliases.
    pub fn normalize(raw: &str) -> Self {
        let key: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "jetpack" => Component::Jetpack,
            "l4t" => Component::L4t,
            "cuda" => Component::Cuda,
            "python" | "python3" => Component::Python,
            "ubuntu" => Component::Ubuntu,
            "tensorrt" | "trt" => Component::TensorRt,
            "pytorch" | "torch" => Component::Framework("pytorch".into()),
            "onnxruntime" | "onnxruntime-gpu" | "ort" => Component::Framework("onnxruntime".into()),
            other if KNOWN_FRAMEWORKS.contains(&other) => Component::Framework(other.to_string()),
            other => Component::Unmapped(other.to_string()),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Component::Jetpack => "jetpack",
            Component::L4t => "l4t",
            Component::Cuda => "cuda",
            Component::Python => "python",
            Component::Ubuntu => "ubuntu",
            Component::TensorRt => "tensorrt",
            Component::Framework(name) | Component::Unmapped(name) => name,
        }
    }

    /// Components whose expected range is a `[min, max]` span in the matrix.
    pub fn is_ranged(&self) -> bool {
        matches!(self, Component::Cuda | Component::Python | Component::Ubuntu)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for Component {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for Component {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Component::normalize(&s))
    }
}
