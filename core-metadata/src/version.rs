//! Natural ordering for mod version strings.

use std::cmp::Ordering;

/// Compares two version strings segment by segment.
///
/// Runs of digits compare numerically (`1.10` > `1.9`), everything else
/// compares case-insensitively. When one version is a prefix of the other,
/// the shorter one sorts first.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = segments(a);
    let mut right = segments(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = compare_segment(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Splits into alternating digit and non-digit runs, dropping separators.
fn segments(version: &str) -> impl Iterator<Item = &str> {
    let mut rest = version;
    std::iter::from_fn(move || {
        rest = rest.trim_start_matches(['.', '-', '_', '+', ' ']);
        let first = rest.chars().next()?;
        let numeric = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != numeric || matches!(c, '.' | '-' | '_' | '+' | ' '))
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        rest = tail;
        Some(head)
    })
}

fn compare_segment(l: &str, r: &str) -> Ordering {
    let l_numeric = l.bytes().all(|b| b.is_ascii_digit());
    let r_numeric = r.bytes().all(|b| b.is_ascii_digit());

    match (l_numeric, r_numeric) {
        (true, true) => {
            let l = l.trim_start_matches('0');
            let r = r.trim_start_matches('0');
            l.len().cmp(&r.len()).then_with(|| l.cmp(r))
        }
        // 1.0.1 after 1.0-beta
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => l.to_ascii_lowercase().cmp(&r.to_ascii_lowercase()),
    }
}
