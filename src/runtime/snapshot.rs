//! Committed snapshots and active-path pattern matching.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// The immutable result of one committed transaction: the data record, the
/// active leaf paths, and the derived values. The only thing subscribers
/// and queries ever see.
///
/// # Example
///
/// ```rust
/// use ramify::{Design, StateConfig, Statechart, to};
/// use serde_json::Value;
///
/// #[derive(Clone, PartialEq, Debug)]
/// struct Data;
///
/// let chart = Statechart::new(
///     Design::new(Data).root(
///         StateConfig::new()
///             .initial("off")
///             .state("off", StateConfig::new().on("TOGGLE", to("on")))
///             .state("on", StateConfig::new().on("TOGGLE", to("off"))),
///     ),
/// )
/// .unwrap();
///
/// let snapshot = chart.send("TOGGLE", Value::Null).unwrap();
/// assert_eq!(snapshot.active_paths, vec!["root.on".to_string()]);
/// ```
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot<D> {
    pub data: D,
    pub active_paths: Vec<String>,
    pub values: BTreeMap<String, Value>,
}

impl<D: PartialEq> PartialEq for Snapshot<D> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
            && self.active_paths == other.active_paths
            && self.values == other.values
    }
}

/// Whether `pattern` matches `path`: the pattern's dot-segments must appear
/// as a contiguous run of the path's segments. `"playing"` and
/// `"root.playing"` both match `"root.playing.paused"`; `"pla"` does not.
pub fn path_matches(path: &str, pattern: &str) -> bool {
    let path_segs: Vec<&str> = path.split('.').collect();
    let pat_segs: Vec<&str> = pattern.split('.').collect();
    if pat_segs.is_empty() || pat_segs.len() > path_segs.len() {
        return false;
    }
    path_segs
        .windows(pat_segs.len())
        .any(|window| window == pat_segs.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_segments_match_anywhere_in_the_path() {
        assert!(path_matches("root.playing.paused", "paused"));
        assert!(path_matches("root.playing.paused", "playing"));
        assert!(path_matches("root.playing.paused", "playing.paused"));
        assert!(path_matches("root.playing.paused", "root"));
        assert!(path_matches("root.playing.paused", "root.playing.paused"));
    }

    #[test]
    fn partial_segments_do_not_match() {
        assert!(!path_matches("root.playing.paused", "play"));
        assert!(!path_matches("root.playing.paused", "pause"));
    }

    #[test]
    fn non_contiguous_segments_do_not_match() {
        assert!(!path_matches("root.playing.paused", "root.paused"));
    }

    #[test]
    fn longer_patterns_never_match() {
        assert!(!path_matches("root.on", "root.on.deep"));
    }
}
