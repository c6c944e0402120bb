//! Prompt assembly for story generation.
//!
//! The template asks for 5–8 stories in a fixed block format. The block
//! markers it names are the same constants the [`parser`](crate::parser)
//! recognises, so template and parser cannot drift apart.

use crate::models::RetrievedChunk;
use crate::parser::{CRITERIA_MARKER, NARRATIVE_MARKER, PRIORITY_MARKER, TITLE_MARKER};

/// Requested in the template; the parser skips these lines without extracting them.
pub const EPIC_MARKER: &str = "**Epic**:";
pub const ESTIMATION_MARKER: &str = "**Estimation**:";

/// The three free-text inputs substituted into the template.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    /// Retrieved document context, already joined.
    pub context: &'a str,
    pub project_context: &'a str,
    pub requirements: &'a str,
}

/// Join retrieved chunk texts with blank lines, preserving rank order.
pub fn join_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Substitute the inputs into the fixed generation template.
///
/// Substitution is single-pass, so braces or marker text inside the inputs
/// are copied through verbatim. No length check is made against the
/// model's context window.
pub fn assemble_prompt(inputs: &PromptInputs<'_>) -> String {
    format!(
        "You are an expert product manager and business analyst. Generate comprehensive user stories based on the provided requirements and context.

Project Context: {project_context}

Requirements Context from Documents:
{context}

Additional Requirements:
{requirements}

Generate user stories following this format:

{title} [Descriptive title with emoji]
{narrative} As a [user type], I want [functionality] so that [benefit/value].
{criteria}
• [Specific, testable criteria]
• [Include edge cases and error handling]
• [Consider security and performance requirements]

{priority} [High/Medium/Low based on business value]
{epic} [Group related stories under epics]
{estimation} [Story points 1-13]

Focus on:
1. Clear, actionable user stories
2. Comprehensive acceptance criteria
3. Security and compliance considerations
4. Integration points with existing systems
5. Performance and scalability requirements

Generate 5-8 detailed user stories covering the main functional areas.
",
        project_context = inputs.project_context,
        context = inputs.context,
        requirements = inputs.requirements,
        title = TITLE_MARKER,
        narrative = NARRATIVE_MARKER,
        criteria = CRITERIA_MARKER,
        priority = PRIORITY_MARKER,
        epic = EPIC_MARKER,
        estimation = ESTIMATION_MARKER,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn hit(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            id: "p_0".to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata {
                project_id: "p".to_string(),
                document_id: "d".to_string(),
                source: "s".to_string(),
                processed_at: String::new(),
                chunk_index: 0,
            },
            score: 1.0,
        }
    }

    #[test]
    fn test_join_context_preserves_order() {
        let joined = join_context(&[hit("first"), hit("second"), hit("third")]);
        assert_eq!(joined, "first\n\nsecond\n\nthird");
        assert_eq!(join_context(&[]), "");
    }

    #[test]
    fn test_prompt_contains_inputs_and_markers() {
        let prompt = assemble_prompt(&PromptInputs {
            context: "Users log in with SSO.",
            project_context: "Internal HR portal",
            requirements: "Add leave requests",
        });
        assert!(prompt.contains("Project Context: Internal HR portal"));
        assert!(prompt.contains("Requirements Context from Documents:\nUsers log in with SSO."));
        assert!(prompt.contains("Additional Requirements:\nAdd leave requests"));
        for marker in [
            TITLE_MARKER,
            NARRATIVE_MARKER,
            CRITERIA_MARKER,
            PRIORITY_MARKER,
            EPIC_MARKER,
            ESTIMATION_MARKER,
        ] {
            assert!(prompt.contains(marker), "missing {}", marker);
        }
        assert!(prompt.contains("Generate 5-8 detailed user stories"));
    }

    #[test]
    fn test_placeholders_in_inputs_are_not_expanded() {
        let prompt = assemble_prompt(&PromptInputs {
            context: "{requirements}",
            project_context: "{context}",
            requirements: "real requirements",
        });
        assert!(prompt.contains("Project Context: {context}"));
        assert!(prompt.contains("Requirements Context from Documents:\n{requirements}"));
    }
}
