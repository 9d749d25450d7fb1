//! Prompt construction for generation and grading calls.
//!
//! The generation prompt instructs the model to emit the character/state
//! XML for one chunk's number range; the grading request packages the
//! original instruction, the repaired payload, and the context it must be
//! grounded in.

use crate::model::{CompletionRequest, GradingRequest};

/// Render the extraction instruction for one chunk range.
pub fn generation_prompt(start: u32, end: u32) -> String {
    format!(
        r#"Here is a sample of text from a phylogenetic research paper. Please extract the character descriptions and their corresponding states for characters between character number {start} and character number {end}, including all the characters in between, as an XML tree. The XML tree should be formatted according to the following schema:

<characters>
	<character index=" " name="character name">
		<state value="0">state description</state>
		<state value="1">state description</state>
	</character>
</characters>

EXAMPLE:

input:
Pallial line in left and right valves sinuous (Fig. 3.12, arrow 62-0) 0 straight (Fig. 1.12, arrow 62-1) 1.
Anterior palatal vacuity rounded (0), heart-, kidney- (1) or butterfly- shaped (2).
Ectopterygoid tusks present (0) or not (1).

output:
<characters>
    <character index="1" name="Pallial line in left and right valves">
        <state value="0">sinuous</state>
        <state value="1">straight</state>
    </character>
    <character index="2" name="Anterior palatal vacuity shape">
        <state value="0">rounded</state>
        <state value="1">heart-, kidney-</state>
        <state value="2">butterfly-shaped</state>
    </character>
    <character index="3" name="Ectopterygoid tusks present">
        <state value="0">Present</state>
        <state value="1">Not present</state>
    </character>
</characters>

Please ignore the publication details & all the citations when extracting.
"#
    )
}

/// Pair each chunk's context with its rendered instruction,
/// position-aligned with the inputs.
pub fn build_completion_requests(contexts: &[String], prompts: &[String]) -> Vec<CompletionRequest> {
    contexts
        .iter()
        .zip(prompts)
        .map(|(context, prompt)| CompletionRequest {
            context: context.clone(),
            prompt: prompt.clone(),
        })
        .collect()
}

/// Build one grading request per chunk from (instruction, payload, context).
///
/// Chunks whose payload is empty still get a request — the grader rejects
/// them and the evaluation gate stays down, same as the original batch.
pub fn build_grading_requests(
    prompts: &[String],
    payloads: &[String],
    contexts: &[String],
) -> Vec<GradingRequest> {
    prompts
        .iter()
        .zip(payloads)
        .zip(contexts)
        .map(|((prompt, payload), context)| GradingRequest {
            input: prompt.clone(),
            prediction: payload.clone(),
            reference: context.clone(),
        })
        .collect()
}
