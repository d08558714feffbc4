#![no_main]
use jetdeploy_core::schema::{from_value, ArtifactKind};
use jetdeploy_core::spec::facts::DeviceFacts;
use jetdeploy_core::spec::matrix::CompatibilityMatrix;
use jetdeploy_core::spec::requirements::Requirement;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // first half facts, second half requirements
    let (left, right) = data.split_at(data.len() / 2);
    let (Ok(facts), Ok(req)) = (
        serde_json::from_slice::<serde_json::Value>(left),
        serde_json::from_slice::<serde_json::Value>(right),
    ) else {
        return;
    };
    let (Ok(facts), Ok(req)) = (
        from_value::<DeviceFacts>(ArtifactKind::Facts, facts, "facts"),
        from_value::<Requirement>(ArtifactKind::Requirements, req, "requirements"),
    ) else {
        return;
    };
    let Ok(matrix) = CompatibilityMatrix::embedded() else {
        return;
    };
    let result = jetdeploy_engine::analyze(&facts.normalized(), &req, &matrix);
    assert!(result.check_consistency().is_ok());
});
