//! System prompt for page transcription.
//!
//! Callers can override the default via
//! [`crate::config::PipelineConfig::system_prompt`]; the constant here is
//! used only when no override is provided.

/// Default system instruction sent with every page image.
///
/// The model must transcribe faithfully, keep structure and layout, describe
/// non-text content inline, never summarise, and answer with raw Markdown
/// only. The fragment is persisted verbatim, so fence-wrapping or commentary
/// from the model ends up in the transcript.
pub const SYSTEM_PROMPT: &str = "You will be provided with images of a PDF document. \
Your task is to extract and present the content in as much detail as possible, \
conveying the information faithfully and reproducing the structure, layout, and any relevant formatting in markdown. \
Do not summarize; preserve as much of the original detail as possible, including headings, tables, lists, text, and layout. \
For any non-text content (such as images, diagrams, charts, or illustrations), describe them accurately \
and include the description at the appropriate place within the markdown. \
IMPORTANT: Output only the markdown content as plain text. \
Do NOT wrap your response in any code blocks or triple backticks (such as ``` or ```markdown). \
Do NOT prepend or append any extra formatting, comments, or explanation. \
Your response should be the raw, unadorned markdown only.";

/// Resolve the instruction for a run: the override when present, else the default.
pub fn system_prompt(custom: Option<&str>) -> &str {
    custom.unwrap_or(SYSTEM_PROMPT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_forbids_fences_and_summaries() {
        assert!(SYSTEM_PROMPT.contains("Do not summarize"));
        assert!(SYSTEM_PROMPT.contains("Do NOT wrap your response in any code blocks"));
        assert!(SYSTEM_PROMPT.contains("non-text content"));
    }

    #[test]
    fn override_wins() {
        assert_eq!(system_prompt(Some("custom")), "custom");
        assert_eq!(system_prompt(None), SYSTEM_PROMPT);
    }
}
