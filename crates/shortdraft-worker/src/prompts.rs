//! Prompt construction for the two generation phases.

use shortdraft_models::{format_hms, format_minutes_seconds, HookCandidate, Transcript, TranscriptSegment};

/// System message sent with every completion request.
pub const SYSTEM_PROMPT: &str = "You are an expert producer of short-form vertical video. \
You turn long-form talks and interviews into punchy clips for a Gen Z audience. \
Always answer with the exact JSON structure requested and nothing else.";

const HOOK_TIPS: &str = r#"# Hook techniques
1. Surprise: open with something the viewer did not expect ("Never seen a politician do THIS 😳").
2. Question: make the viewer answer in their head ("Did you know this?").
3. Bold claim: a provocative one-liner that begs "really?".
4. Contradiction: put two facts side by side that seem to clash.
5. Emotion first: lead with the feeling (anger, awe, laughter).
6. Numbered list: "Top 3 ..." keeps people watching for number one.
7. Visual word: numbers or job titles up front catch the eye.
8. Call out the target: "If you're in your 20s, stop scrolling".
9. Urgency: "This changes next month".
10. Narrative hook: set a scene and leave a mystery."#;

/// Render the numbered, timestamped segment listing used in the hook prompt.
///
/// Lines look like `  1. [00:00:00 - 00:00:05] text`.
pub fn format_segment_listing(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            format!(
                "{:3}. [{} - {}] {}",
                i + 1,
                format_hms(segment.start_time),
                format_hms(segment.end_time),
                segment.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render segments as `m:ss.ss text` lines for the script prompt.
pub fn format_script_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|segment| format!("{} {}", format_minutes_seconds(segment.start_time), segment.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the prompt asking for `count` hook candidates.
pub fn build_hooks_prompt(transcript: &Transcript, count: usize) -> String {
    let segments = format_segment_listing(&transcript.segments);
    format!(
        r#"# Task
Read the transcript below and pick the moments that would make the strongest short-form clips.

# Audience
Gen Z viewers (teens to late twenties) scrolling a vertical video feed.

# What makes a good moment
- A speaker shows strong emotion (surprise, anger, laughter, being moved).
- There is a clear story, change, conclusion or claim.
- A value, belief or message can be summed up in a single line.

# Requirements
- Pick exactly {count} moments.
- Each clip should run about one minute.
- Make them fun to watch. Use plenty of emoji.
- The first seconds decide everything: every item needs a strong opening hook.

{HOOK_TIPS}

# Output format
Return ONLY a JSON object with exactly {count} entries in "items":
{{
  "items": [
    {{
      "first_hook": "opening caption shown on screen",
      "second_hook": "follow-up line that keeps people watching",
      "third_hook": "line that sets up the payoff",
      "last_conclusion": "closing punchline or takeaway",
      "summary": "one or two sentences describing the moment"
    }}
  ]
}}

# Transcript

## Full text
{full_text}

## Timestamped segments
{segments}
"#,
        full_text = transcript.full_text,
    )
}

/// Build the prompt that expands one hook into a timed script.
pub fn build_script_prompt(hook: &HookCandidate, segments: &[TranscriptSegment]) -> String {
    let item = serde_json::to_string_pretty(hook).unwrap_or_default();
    let segments = format_script_segments(segments);
    format!(
        r#"# Short-form script (speaker's own words only)

You assemble short vertical-video scripts for editors. Using the `item` and the
timestamped `segments` below, lay out a clip that runs under one minute.

## item
{item}

## segments
{segments}

## Rules
1. The whole script must fit in 60 seconds.
2. Use `first_hook` as the opening on-screen caption.
3. Pull 4 to 5 lines from the segments and use them as the speaker's own lines.
4. Light cleanup of filler words is fine; keep the speaker's voice.
5. Prefix every line with its clip-relative time range as `[mm:ss–mm:ss]`.
6. Do not use ** for bold.
7. The first line must grab attention and tie directly to the hook. Never open with a greeting or self-introduction.
8. Lines may be reordered relative to the source.
9. End on the line that lands best as a conclusion or punchline, wherever it sits in the source.

## Output format
Return ONLY a JSON object:
{{
  "items": [
    {{
      "script": "[00:00–00:06] line one\n[00:06–00:15] line two\n..."
    }}
  ]
}}
"#
    )
}
