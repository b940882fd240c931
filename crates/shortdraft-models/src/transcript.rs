//! Transcript models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A timestamped span of transcribed speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds
    pub end_time: f64,
    /// Spoken text
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            text: text.into(),
        }
    }

    /// Segment length in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Errors raised when a transcript cannot feed the generation phases.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranscriptError {
    #[error("transcript has no segments")]
    NoSegments,

    #[error("transcript full text is empty")]
    EmptyText,

    #[error("segment {index} is invalid: {reason}")]
    InvalidSegment { index: usize, reason: String },
}

/// Full transcription of one video.
///
/// Segments are expected in non-decreasing time order; the ordering is
/// assumed, not re-checked.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub full_text: String,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(segments: Vec<TranscriptSegment>, full_text: impl Into<String>) -> Self {
        Self {
            segments,
            full_text: full_text.into(),
        }
    }

    /// Check the transcript is usable for hook extraction.
    pub fn validate(&self) -> Result<(), TranscriptError> {
        if self.segments.is_empty() {
            return Err(TranscriptError::NoSegments);
        }
        if self.full_text.trim().is_empty() {
            return Err(TranscriptError::EmptyText);
        }
        for (index, segment) in self.segments.iter().enumerate() {
            if segment.start_time < 0.0 {
                return Err(TranscriptError::InvalidSegment {
                    index,
                    reason: format!("negative start time {}", segment.start_time),
                });
            }
            if segment.end_time < segment.start_time {
                return Err(TranscriptError::InvalidSegment {
                    index,
                    reason: format!(
                        "end time {} precedes start time {}",
                        segment.end_time, segment.start_time
                    ),
                });
            }
        }
        Ok(())
    }

    /// Total covered time, taken from the last segment's end.
    pub fn duration(&self) -> f64 {
        self.segments.last().map(|s| s.end_time).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transcript {
        Transcript::new(
            vec![
                TranscriptSegment::new(0.0, 5.0, "A"),
                TranscriptSegment::new(5.0, 10.0, "B"),
            ],
            "A B",
        )
    }

    #[test]
    fn test_valid_transcript() {
        assert!(sample().validate().is_ok());
        assert_eq!(sample().duration(), 10.0);
    }

    #[test]
    fn test_empty_segments_rejected() {
        let t = Transcript::new(vec![], "text");
        assert_eq!(t.validate(), Err(TranscriptError::NoSegments));
    }

    #[test]
    fn test_blank_text_rejected() {
        let mut t = sample();
        t.full_text = "   ".to_string();
        assert_eq!(t.validate(), Err(TranscriptError::EmptyText));
    }

    #[test]
    fn test_inverted_segment_rejected() {
        let mut t = sample();
        t.segments[1].end_time = 4.0;
        assert!(matches!(
            t.validate(),
            Err(TranscriptError::InvalidSegment { index: 1, .. })
        ));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["full_text"], "A B");
        assert_eq!(json["segments"][1]["start_time"], 5.0);
        assert_eq!(json["segments"][1]["text"], "B");
    }
}
