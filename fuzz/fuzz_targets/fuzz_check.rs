#![no_main]
use jetdeploy_core::schema::{check, ArtifactKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        for kind in ArtifactKind::ALL {
            let _ = check(kind, &value, "fuzz.json");
        }
    }
});
