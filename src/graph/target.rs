//! Compiled transition targets.
//!
//! Target strings are parsed once at compile time; dispatch never looks at
//! a path string again.

use super::NodeId;

/// How the destination's descendants are activated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetMode {
    /// Enter the destination's default initial chain.
    Exact,
    /// Re-enter the previously active chain, recursively: every compound
    /// below the destination uses its own remembered child.
    Restore,
    /// Re-enter only the destination's immediate previous child; deeper
    /// compounds use their default initial.
    Previous,
}

#[derive(Clone, Copy, Debug)]
pub struct TargetStep {
    pub node: NodeId,
    pub mode: TargetMode,
}

/// A resolved target: one step, or two applied back to back (the
/// exit-then-restore idiom).
#[derive(Clone, Debug)]
pub struct CompiledTarget {
    pub steps: Vec<TargetStep>,
}

/// Splits a raw target string into its path part and mode suffix.
pub fn split_mode(raw: &str) -> (&str, TargetMode) {
    if let Some(stripped) = raw.strip_suffix(".restore") {
        (stripped, TargetMode::Restore)
    } else if let Some(stripped) = raw.strip_suffix(".previous") {
        (stripped, TargetMode::Previous)
    } else {
        (raw, TargetMode::Exact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_targets_are_exact() {
        assert_eq!(split_mode("playing.paused"), ("playing.paused", TargetMode::Exact));
    }

    #[test]
    fn suffixes_strip_into_modes() {
        assert_eq!(split_mode("playing.restore"), ("playing", TargetMode::Restore));
        assert_eq!(split_mode("playing.previous"), ("playing", TargetMode::Previous));
    }

    #[test]
    fn only_the_final_segment_is_a_suffix() {
        let (path, mode) = split_mode("restore.previous");
        assert_eq!(path, "restore");
        assert_eq!(mode, TargetMode::Previous);
    }
}
