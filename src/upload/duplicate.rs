//! Duplicate-name detection and resolution.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::files::FileReference;
use crate::transfer::UploadPayload;

/// Attempts at `stem-N.ext` before falling back to a timestamp suffix.
pub const MAX_RENAME_ATTEMPTS: u32 = 1000;

/// How to proceed when the chosen name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateAction {
    /// Delete the existing file, then upload under the same name.
    Replace,
    /// Upload under a fresh `stem-N.ext` name.
    KeepBoth,
    /// Drop the submission.
    Cancel,
}

/// The caller's answer to a name conflict.
///
/// Built with [`PendingUpload::decide`] and consumed by
/// [`UploadOrchestrator::resolve_duplicate`](super::UploadOrchestrator::resolve_duplicate).
#[derive(Debug, Clone)]
pub struct DuplicateDecision {
    pending: PendingUpload,
    action: DuplicateAction,
}

impl DuplicateDecision {
    /// Name that collided.
    #[must_use]
    pub fn conflicting_file_name(&self) -> &str {
        &self.pending.payload.file_name
    }

    /// Id of the file already holding the name.
    #[must_use]
    pub fn existing_file_id(&self) -> i64 {
        self.pending.existing.id
    }

    /// What to do.
    #[must_use]
    pub fn action(&self) -> DuplicateAction {
        self.action
    }

    pub(crate) fn into_parts(self) -> (PendingUpload, DuplicateAction) {
        (self.pending, self.action)
    }
}

/// A validated submission held back by a name conflict.
///
/// No task exists yet; answer it with [`decide`](Self::decide).
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub(crate) payload: UploadPayload,
    pub(crate) existing: FileReference,
}

impl PendingUpload {
    /// The held payload.
    #[must_use]
    pub fn payload(&self) -> &UploadPayload {
        &self.payload
    }

    /// The file that already has the name.
    #[must_use]
    pub fn existing(&self) -> &FileReference {
        &self.existing
    }

    /// Answers the conflict with `action`.
    #[must_use]
    pub fn decide(self, action: DuplicateAction) -> DuplicateDecision {
        DuplicateDecision {
            pending: self,
            action,
        }
    }
}

/// Case-insensitive name comparison key.
pub(crate) fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Finds an existing file with the same name, ignoring case.
pub(crate) fn find_conflict<'a>(
    files: &'a [FileReference],
    file_name: &str,
) -> Option<&'a FileReference> {
    let key = name_key(file_name);
    files.iter().find(|f| name_key(&f.display_name) == key)
}

/// Picks `stem-N.ext` with the smallest `N >= 1` not in `taken`.
///
/// `taken` holds [`name_key`]s. After [`MAX_RENAME_ATTEMPTS`] collisions the
/// suffix becomes a millisecond timestamp.
#[must_use]
pub fn unique_name(file_name: &str, taken: &HashSet<String>) -> String {
    let (stem, extension) = split_extension(file_name);
    for n in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = format!("{stem}-{n}{extension}");
        if !taken.contains(&name_key(&candidate)) {
            return candidate;
        }
    }
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{stem}-{millis}{extension}")
}

/// Splits at the last dot; a leading dot (`.env`) is part of the stem.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name.split_at(idx),
        _ => (file_name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| name_key(n)).collect()
    }

    fn file(id: i64, name: &str) -> FileReference {
        FileReference {
            id,
            display_name: name.to_string(),
            size_bytes: 1,
            media_type: String::new(),
            created_at: None,
        }
    }

    #[test]
    fn test_first_free_suffix() {
        assert_eq!(unique_name("report.pdf", &taken(&["report.pdf"])), "report-1.pdf");
        assert_eq!(
            unique_name("report.pdf", &taken(&["report.pdf", "REPORT-1.PDF"])),
            "report-2.pdf"
        );
    }

    #[test]
    fn test_names_without_extension() {
        assert_eq!(unique_name("README", &taken(&["readme"])), "README-1");
        assert_eq!(unique_name(".env", &taken(&[".env"])), ".env-1");
    }

    #[test]
    fn test_only_last_extension_is_split() {
        assert_eq!(unique_name("data.tar.gz", &HashSet::new()), "data.tar-1.gz");
    }

    #[test]
    fn test_timestamp_fallback_after_exhausting_attempts() {
        let mut names: Vec<String> = (1..=MAX_RENAME_ATTEMPTS)
            .map(|n| format!("a-{n}.txt"))
            .collect();
        names.push("a.txt".to_string());
        let taken: HashSet<String> = names.iter().map(|n| name_key(n)).collect();

        let name = unique_name("a.txt", &taken);
        assert!(!taken.contains(&name_key(&name)));
        assert!(name.starts_with("a-") && name.ends_with(".txt"));
    }

    #[test]
    fn test_decision_reports_conflict() {
        let pending = PendingUpload {
            payload: UploadPayload::new("Report.pdf", b"data".to_vec()),
            existing: file(9, "report.pdf"),
        };
        let decision = pending.decide(DuplicateAction::KeepBoth);
        assert_eq!(decision.conflicting_file_name(), "Report.pdf");
        assert_eq!(decision.existing_file_id(), 9);
        assert_eq!(decision.action(), DuplicateAction::KeepBoth);
    }

    #[test]
    fn test_conflict_lookup_ignores_case() {
        let files = vec![file(1, "Other.pdf"), file(2, "Report.PDF")];
        assert_eq!(find_conflict(&files, "report.pdf").map(|f| f.id), Some(2));
        assert!(find_conflict(&files, "report-1.pdf").is_none());
    }
}
