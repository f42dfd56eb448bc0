//! Log-file identity, derived purely from path structure.
//!
//! Task containers write their output to
//! `<root>/generations/<generation>/<task>[.<rerun>[.<uid>]].out`. Whether a
//! path is a log file at all, and which task it belongs to, is decided here
//! and nowhere else.

use std::path::Path;

use sidelog_store::TaskRecord;

/// Extension every task log file carries.
pub const LOG_SUFFIX: &str = "out";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileName {
    pub task_type: String,
    pub rerun: u32,
    /// Name of the parent directory; guaranteed all ASCII digits.
    pub generation: String,
    /// Third filename segment, taken verbatim. Empty when absent.
    pub task_uid: String,
}

impl LogFileName {
    /// Classify a path. `None` means "not a log file", never an error.
    ///
    /// The extension must be exactly `out` and the immediate parent
    /// directory must be a base-10 number (the generation). The stem splits
    /// on `.`: task type, then an optional numeric rerun (non-numeric
    /// segments leave it at 0), then an optional uid.
    pub fn parse(path: &Path) -> Option<Self> {
        if path.extension().and_then(|ext| ext.to_str()) != Some(LOG_SUFFIX) {
            return None;
        }

        let generation = path.parent()?.file_name()?.to_str()?;
        if generation.is_empty() || !generation.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let stem = path.file_stem()?.to_str()?;
        let mut segments = stem.split('.');
        let task_type = segments.next()?.to_string();
        let rerun = segments
            .next()
            .and_then(|segment| segment.parse::<u32>().ok())
            .unwrap_or(0);
        let task_uid = segments.next().unwrap_or("").to_string();

        Some(Self {
            task_type,
            rerun,
            generation: generation.to_string(),
            task_uid,
        })
    }

    /// The task record this file belongs to, as the store should see it.
    pub fn task_record(&self, resource_uid: &str) -> TaskRecord {
        TaskRecord {
            uid: self.task_uid.clone(),
            task_type: self.task_type.clone(),
            rerun: self.rerun,
            generation: self.generation.clone(),
            resource_uid: resource_uid.to_string(),
            created_at: None,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str) -> Option<LogFileName> {
        LogFileName::parse(Path::new(path))
    }

    #[test]
    fn plain_task_log() {
        let name = parse("/root/generations/3/apply.out").unwrap();
        assert_eq!(name.task_type, "apply");
        assert_eq!(name.rerun, 0);
        assert_eq!(name.generation, "3");
        assert_eq!(name.task_uid, "");
    }

    #[test]
    fn rerun_and_uid_segments() {
        let name = parse("/root/generations/3/apply.2.abc123.out").unwrap();
        assert_eq!(name.task_type, "apply");
        assert_eq!(name.rerun, 2);
        assert_eq!(name.generation, "3");
        assert_eq!(name.task_uid, "abc123");
    }

    #[test]
    fn rerun_without_uid() {
        let name = parse("/root/generations/12/plan.7.out").unwrap();
        assert_eq!(name.rerun, 7);
        assert_eq!(name.task_uid, "");
    }

    #[test]
    fn non_numeric_rerun_defaults_to_zero() {
        let name = parse("/root/generations/3/apply.x.u-1.out").unwrap();
        assert_eq!(name.rerun, 0);
        assert_eq!(name.task_uid, "u-1");
    }

    #[test]
    fn non_numeric_generation_dir_rejects_the_file() {
        assert_eq!(parse("/root/generations/notanumber/apply.out"), None);
        assert_eq!(parse("/root/generations/12a/apply.out"), None);
        assert_eq!(parse("/root/generations/-3/apply.out"), None);
    }

    #[test]
    fn wrong_extension_rejects_the_file() {
        assert_eq!(parse("/root/generations/3/apply.txt"), None);
        assert_eq!(parse("/root/generations/3/apply"), None);
        assert_eq!(parse("/root/generations/3/apply.OUT"), None);
    }

    #[test]
    fn never_panics_on_odd_paths() {
        assert_eq!(parse("/"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse("relative.out"), None);
        assert_eq!(parse("/3/.out"), None);
    }

    #[test]
    fn task_record_carries_all_identity_fields() {
        let name = parse("/root/generations/3/apply.2.abc123.out").unwrap();
        let task = name.task_record("res-9");
        assert_eq!(task.uid, "abc123");
        assert_eq!(task.task_type, "apply");
        assert_eq!(task.rerun, 2);
        assert_eq!(task.generation, "3");
        assert_eq!(task.resource_uid, "res-9");
    }
}
