//! Hook candidates and the scripts expanded from them.

use serde::{Deserialize, Serialize};

use crate::transcript::TranscriptSegment;

/// Fields every hook candidate returned by the model must carry.
pub const HOOK_FIELDS: [&str; 5] = [
    "first_hook",
    "second_hook",
    "third_hook",
    "last_conclusion",
    "summary",
];

/// Duration assumed when a script carries no usable timing marker.
pub const DEFAULT_SCRIPT_DURATION_SECS: u32 = 60;

/// One moment of the source video worth turning into a short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookCandidate {
    /// Opening line, used as the on-screen caption
    pub first_hook: String,
    pub second_hook: String,
    pub third_hook: String,
    /// Closing punchline or takeaway
    pub last_conclusion: String,
    pub summary: String,
}

/// A hook expanded into a timed script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedScript {
    pub hook: HookCandidate,
    pub script_text: String,
    /// Best-effort estimate scraped from the script's timing markers.
    pub estimated_duration_seconds: u32,
    pub segments_used: Vec<TranscriptSegment>,
}

impl DetailedScript {
    /// Clip window covered by the segments attached to this script.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        let first = self.segments_used.first()?;
        let last = self.segments_used.last()?;
        Some((first.start_time, last.end_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_deserializes_from_model_item() {
        let item = serde_json::json!({
            "first_hook": "a",
            "second_hook": "b",
            "third_hook": "c",
            "last_conclusion": "d",
            "summary": "e",
            "extra": "ignored"
        });
        let hook: HookCandidate = serde_json::from_value(item).unwrap();
        assert_eq!(hook.first_hook, "a");
        assert_eq!(hook.summary, "e");
    }

    #[test]
    fn test_time_range() {
        let script = DetailedScript {
            hook: HookCandidate {
                first_hook: "a".into(),
                second_hook: "b".into(),
                third_hook: "c".into(),
                last_conclusion: "d".into(),
                summary: "e".into(),
            },
            script_text: String::new(),
            estimated_duration_seconds: DEFAULT_SCRIPT_DURATION_SECS,
            segments_used: vec![
                TranscriptSegment::new(1.0, 2.0, "x"),
                TranscriptSegment::new(2.0, 7.5, "y"),
            ],
        };
        assert_eq!(script.time_range(), Some((1.0, 7.5)));
    }
}
