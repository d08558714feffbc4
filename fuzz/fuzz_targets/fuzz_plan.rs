#![no_main]
use jetdeploy_core::schema::{from_value, ArtifactKind};
use jetdeploy_core::spec::analysis::AnalysisResult;
use jetdeploy_core::types::PlanMode;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Ok(analysis) = from_value::<AnalysisResult>(ArtifactKind::Analysis, value, "analysis") else {
        return;
    };
    for allow_sudo in [true, false] {
        if let Ok(plan) = jetdeploy_engine::generate(&analysis, allow_sudo, PlanMode::Guided) {
            assert!(plan.validate_ids().is_ok());
            assert!(plan.privilege_violations().is_empty());
            if !allow_sudo {
                assert!(plan.steps.iter().all(|s| !s.requires_sudo));
            }
        }
    }
});
