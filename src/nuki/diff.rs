use super::Log;

/// Logs from `new` that are not in `old`, ordered from **old to new**.
///
/// Both inputs are ordered like the API returns them, **newest log at index 0**.
/// The newest entry of `old` marks the boundary, everything fetched before
/// reaching it again is new.
///
/// If the boundary isn't part of `new` anymore (more events happened than a
/// single fetch returns), all of `new` is reported. Events that fell out of the
/// fetched window in between are lost.
pub fn diff(new: &[Log], old: &[Log]) -> Vec<Log> {
    let Some(newest_old) = old.first() else {
        return new.iter().rev().cloned().collect();
    };

    if new.first() == Some(newest_old) {
        return Vec::new();
    }

    let mut diff = new
        .iter()
        .take_while(|log| *log != newest_old)
        .cloned()
        .collect::<Vec<_>>();

    diff.reverse();
    diff
}
