/// Jetson modules a tutorial may name, most specific first.
pub const KNOWN_MODELS: &[&str] = &[
    "jetson agx orin",
    "jetson orin nx",
    "jetson orin nano",
    "jetson agx xavier",
    "jetson xavier nx",
    "jetson tx2",
    "jetson nano",
];

/// Models named anywhere in the hardware requirement lines, in first-seen order.
pub fn required_models(hardware_requirements: &[String]) -> Vec<&'static str> {
    let mut found = Vec::new();
    for line in hardware_requirements {
        let lowered = line.to_lowercase();
        for model in KNOWN_MODELS {
            if lowered.contains(model) && !found.contains(model) {
                found.push(*model);
            }
        }
    }
    found
}

/// The first required model the device reports, if any.
pub fn matching_model(device_model: &str, required: &[&'static str]) -> Option<&'static str> {
    let lowered = device_model.to_lowercase();
    required.iter().copied().find(|m| lowered.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_models_once() {
        let lines = vec![
            "Jetson Orin Nano or Jetson AGX Orin".to_string(),
            "Tested on jetson orin nano 8GB".to_string(),
        ];
        assert_eq!(required_models(&lines), vec!["jetson agx orin", "jetson orin nano"]);
        assert!(required_models(&["a USB camera".to_string()]).is_empty());
    }

    #[test]
    fn orin_nano_is_not_classic_nano() {
        let required = required_models(&["Jetson Nano 4GB".to_string()]);
        assert_eq!(
            matching_model("NVIDIA Jetson Orin Nano Developer Kit", &required),
            None
        );
        assert_eq!(
            matching_model("NVIDIA Jetson Nano Developer Kit", &required),
            Some("jetson nano")
        );
    }
}
