/// A single rendered transcript line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub text: String,
    pub is_final: bool,
}

/// What a push changed, so the renderer can mirror the log without diffing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptUpdate {
    /// A final result was appended as a new immutable entry.
    AppendedFinal(String),
    /// The most recent still-partial entry was overwritten in place.
    UpdatedPartial(String),
    /// No partial entry existed, so a fresh one was created.
    CreatedPartial(String),
    /// Empty partial with nothing to overwrite; no entry was created.
    Ignored,
}

/// Ordered transcript log.
///
/// Final entries accumulate for the life of the process. Partial text
/// overwrites the most recent entry that is still partial; a new partial entry
/// is only created when none exists and the text is non-empty. Events are
/// applied strictly in arrival order.
#[derive(Debug, Default)]
pub struct TranscriptLog {
    entries: Vec<TranscriptEntry>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str, is_final: bool) -> TranscriptUpdate {
        if is_final {
            self.entries.push(TranscriptEntry {
                text: text.to_string(),
                is_final: true,
            });
            return TranscriptUpdate::AppendedFinal(text.to_string());
        }
        if let Some(entry) = self.entries.iter_mut().rev().find(|entry| !entry.is_final) {
            entry.text = text.to_string();
            return TranscriptUpdate::UpdatedPartial(text.to_string());
        }
        if text.is_empty() {
            return TranscriptUpdate::Ignored;
        }
        self.entries.push(TranscriptEntry {
            text: text.to_string(),
            is_final: false,
        });
        TranscriptUpdate::CreatedPartial(text.to_string())
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// The partial entry the next non-final event would overwrite, if any.
    pub fn live_partial(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| !entry.is_final)
            .map(|entry| entry.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_results_always_append() {
        let mut log = TranscriptLog::new();
        log.push("hello", true);
        log.push("hello", true);
        assert_eq!(log.entries().len(), 2);
        assert!(log.entries().iter().all(|entry| entry.is_final));
    }

    #[test]
    fn partials_overwrite_in_place() {
        let mut log = TranscriptLog::new();
        assert_eq!(
            log.push("hel", false),
            TranscriptUpdate::CreatedPartial("hel".into())
        );
        assert_eq!(
            log.push("hello", false),
            TranscriptUpdate::UpdatedPartial("hello".into())
        );
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.live_partial(), Some("hello"));
    }

    #[test]
    fn empty_partial_with_no_live_entry_creates_nothing() {
        let mut log = TranscriptLog::new();
        assert_eq!(log.push("", false), TranscriptUpdate::Ignored);
        assert!(log.entries().is_empty());
    }

    #[test]
    fn empty_partial_blanks_an_existing_entry() {
        let mut log = TranscriptLog::new();
        log.push("draft", false);
        assert_eq!(log.push("", false), TranscriptUpdate::UpdatedPartial("".into()));
        assert_eq!(log.live_partial(), Some(""));
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn at_most_one_live_partial_exists() {
        let mut log = TranscriptLog::new();
        log.push("one", false);
        log.push("two", false);
        log.push("three", false);
        let partials = log
            .entries()
            .iter()
            .filter(|entry| !entry.is_final)
            .count();
        assert_eq!(partials, 1);
    }

    #[test]
    fn final_entry_is_immutable_once_appended() {
        let mut log = TranscriptLog::new();
        log.push("first utterance", true);
        log.push("second", false);
        assert_eq!(log.entries()[0].text, "first utterance");
        log.push("second utterance", false);
        assert_eq!(log.entries()[0].text, "first utterance");
        assert_eq!(log.entries()[1].text, "second utterance");
    }
}
