//! Loose dotted-version arithmetic.
//!
//! Versions come from tutorial prose and shell probes, so parsing is lenient:
//! every run of ASCII digits is one component ("R35 (release), REVISION: 4.1"
//! is `[35, 4, 1]`), and a version with no digits at all is `[0]`.

use std::cmp::Ordering;

use crate::types::Operator;

/// Numeric components of a version string.
pub fn version_tuple(version: &str) -> Vec<u64> {
    let mut parts = Vec::new();
    let mut current: Option<u64> = None;
    for ch in version.chars() {
        if let Some(d) = ch.to_digit(10) {
            let acc = current.unwrap_or(0);
            current = Some(acc.saturating_mul(10).saturating_add(u64::from(d)));
        } else if let Some(n) = current.take() {
            parts.push(n);
        }
    }
    if let Some(n) = current {
        parts.push(n);
    }
    if parts.is_empty() {
        parts.push(0);
    }
    parts
}

fn padded(a: &[u64], b: &[u64]) -> (Vec<u64>, Vec<u64>) {
    let size = a.len().max(b.len());
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.resize(size, 0);
    b.resize(size, 0);
    (a, b)
}

/// Compare two versions component-wise, padding the shorter with zeros.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let (a, b) = padded(&version_tuple(left), &version_tuple(right));
    a.cmp(&b)
}

/// Does `installed` satisfy `op required`?
///
/// `~=` is a compatible-release check: `>= required` and equal on every
/// component of `required` except the last (`~= 2.1` accepts 2.x, `~= 1.4.2`
/// accepts 1.4.x). A single-component requirement degrades to `>=`.
pub fn satisfies(installed: &str, op: Operator, required: &str) -> bool {
    let ord = compare_versions(installed, required);
    match op {
        Operator::Eq => ord == Ordering::Equal,
        Operator::Ge => ord != Ordering::Less,
        Operator::Le => ord != Ordering::Greater,
        Operator::Gt => ord == Ordering::Greater,
        Operator::Lt => ord == Ordering::Less,
        Operator::Compatible => {
            if ord == Ordering::Less {
                return false;
            }
            let req = version_tuple(required);
            if req.len() < 2 {
                return true;
            }
            let inst = version_tuple(installed);
            let prefix = &req[..req.len() - 1];
            prefix
                .iter()
                .enumerate()
                .all(|(i, p)| inst.get(i).copied().unwrap_or(0) == *p)
        }
    }
}

/// Ordering key for "how far is `candidate` from `target`". Smaller is closer.
///
/// The first differing component contributes its absolute difference; the
/// remaining components then rank by proximity to `target` from that side,
/// so for a target of 1.13 the candidate 2.1 is closer than 2.5, and 1.12
/// is closer than either.
pub fn version_delta(candidate: &str, target: &str) -> Vec<u64> {
    let (a, b) = padded(&version_tuple(candidate), &version_tuple(target));
    let mut above: Option<bool> = None;
    let mut key = Vec::with_capacity(a.len());
    for (x, y) in a.iter().zip(b.iter()) {
        match above {
            None => {
                key.push(x.abs_diff(*y));
                if x != y {
                    above = Some(x > y);
                }
            }
            Some(true) => key.push(*x),
            Some(false) => key.push(u64::MAX - x),
        }
    }
    key
}

/// Leading numeric component, if the string has any digits.
pub fn major(version: &str) -> Option<u64> {
    if !version.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    version_tuple(version).first().copied()
}

/// True if `version` lies on a release track like "2.1" (2.1, 2.1.0, 2.1.2 ...).
pub fn on_track(version: &str, track: &str) -> bool {
    let v = version_tuple(version);
    let t = version_tuple(track);
    t.iter()
        .enumerate()
        .all(|(i, p)| v.get(i).copied().unwrap_or(0) == *p)
}

/// Does some version on `track` satisfy `op required`?
///
/// A track like "2.1" stands for the whole 2.1.* family, so `>= 2.1.3` is
/// admitted by it and `< 2.1` is not. `==` keeps plain track membership.
pub fn track_admits(track: &str, op: Operator, required: &str) -> bool {
    if on_track(required, track) {
        return match op {
            Operator::Lt => compare_versions(required, track) == Ordering::Greater,
            _ => true,
        };
    }
    match (compare_versions(track, required), op) {
        (Ordering::Greater, Operator::Ge | Operator::Gt) => true,
        (Ordering::Greater, Operator::Compatible) => satisfies(track, op, required),
        (Ordering::Less, Operator::Le | Operator::Lt) => true,
        _ => false,
    }
}

/// "unknown", empty strings and digit-free values carry no version.
pub fn is_known(version: &str) -> bool {
    let v = version.trim();
    !v.is_empty() && !v.eq_ignore_ascii_case("unknown") && v.chars().any(|c| c.is_ascii_digit())
}
