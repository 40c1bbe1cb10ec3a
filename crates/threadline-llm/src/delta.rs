use tracing::warn;

use crate::config::TextMode;

/// Turns vendor text frames into incremental deltas.
///
/// Incremental vendors pass through untouched. For cumulative vendors the
/// previously seen text is stripped; if the vendor rewrote earlier text the
/// delta starts after the longest common prefix (on a char boundary).
///
/// Already emitted deltas cannot be retracted, so after a rewrite the
/// concatenated deltas keep the stale suffix: "café" then "cafes" reads
/// "cafées". Rewrites are logged.
#[derive(Debug, Default)]
pub struct TextDelta {
    mode: TextMode,
    seen: String,
}

impl TextDelta {
    pub fn new(mode: TextMode) -> Self {
        Self {
            mode,
            seen: String::new(),
        }
    }

    pub fn push(&mut self, text: &str) -> String {
        match self.mode {
            TextMode::Incremental => text.to_string(),
            TextMode::Cumulative => {
                let common = common_prefix_len(&self.seen, text);
                if common < self.seen.len() {
                    warn!(
                        emitted = self.seen.len(),
                        kept = common,
                        "Cumulative frame rewrote emitted text; deltas will diverge"
                    );
                }
                let delta = text[common..].to_string();
                self.seen.clear();
                self.seen.push_str(text);
                delta
            }
        }
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((idx, _), _)| idx)
        .unwrap_or_else(|| a.len().min(b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_passthrough() {
        let mut delta = TextDelta::new(TextMode::Incremental);
        assert_eq!(delta.push("Hel"), "Hel");
        assert_eq!(delta.push("lo"), "lo");
    }

    #[test]
    fn test_cumulative_frames_become_deltas() {
        let mut delta = TextDelta::new(TextMode::Cumulative);
        let frames = ["The", "The answer", "The answer is 4."];

        let deltas: Vec<String> = frames.iter().map(|f| delta.push(f)).collect();

        assert_eq!(deltas, vec!["The", " answer", " is 4."]);
        assert_eq!(deltas.concat(), "The answer is 4.");
    }

    #[test]
    fn test_cumulative_repeated_frame_yields_empty_delta() {
        let mut delta = TextDelta::new(TextMode::Cumulative);
        delta.push("same");
        assert_eq!(delta.push("same"), "");
    }

    #[test]
    fn test_cumulative_rewrite_respects_char_boundaries() {
        let mut delta = TextDelta::new(TextMode::Cumulative);
        delta.push("café");
        // 'é' replaced by 'e' followed by more text
        assert_eq!(delta.push("cafes"), "es");
    }

    #[test]
    fn test_cumulative_rewrite_keeps_emitted_suffix() {
        let mut delta = TextDelta::new(TextMode::Cumulative);
        let joined: String = ["café", "cafes"].iter().map(|f| delta.push(f)).collect();
        assert_eq!(joined, "cafées");
    }
}
