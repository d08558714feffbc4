use jetdeploy_core::spec::analysis::Alternative;
use jetdeploy_core::version::version_delta;

/// Pick one alternative for an issue.
///
/// Order: no privilege escalation first, then the smallest version delta
/// from the tutorial's stated version, then candidate order.
pub fn select_alternative(candidates: Vec<Alternative>, tutorial_version: &str) -> Option<Alternative> {
    candidates
        .into_iter()
        .enumerate()
        .min_by_key(|(i, alt)| {
            let delta = match &alt.target_version {
                Some(v) => version_delta(v, tutorial_version),
                // no concrete version: ranks after any pinned candidate
                None => vec![u64::MAX],
            };
            (alt.requires_sudo, delta, *i)
        })
        .map(|(_, alt)| alt)
}
