use jetdeploy_core::spec::matrix::CompatibilityMatrix;

/// Package managers a free-text software requirement names.
///
/// Matching is on whole words so "snapshot" does not mean `snap`.
pub fn named_managers<'m>(line: &str, matrix: &'m CompatibilityMatrix) -> Vec<&'m str> {
    let lowered = line.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();
    matrix
        .package_managers
        .iter()
        .filter(|(name, profile)| {
            words.contains(&name.as_str())
                || profile.keywords.iter().any(|k| words.contains(&k.as_str()))
        })
        .map(|(name, _)| name.as_str())
        .collect()
}

/// True when the line mentions one of the constrained component keys.
pub fn mentions_constrained(line: &str, constrained: &[String]) -> bool {
    let lowered: String = line
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    constrained.iter().any(|key| lowered.contains(key.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_and_name_matching() {
        let m = CompatibilityMatrix::embedded().unwrap();
        assert_eq!(named_managers("Install with pip3 install ultralytics", &m), vec!["pip"]);
        assert_eq!(named_managers("Use Miniforge to set up conda", &m), vec!["conda"]);
        assert_eq!(
            named_managers("Run the NVIDIA container via docker", &m),
            vec!["docker"]
        );
        assert!(named_managers("Take a snapshot of the SD card", &m).is_empty());
    }

    #[test]
    fn constrained_lines_are_recognized() {
        let constrained = vec!["onnxruntime".to_string()];
        assert!(mentions_constrained("pip install ONNX Runtime GPU", &constrained));
        assert!(!mentions_constrained("pip install opencv-python", &constrained));
    }
}
