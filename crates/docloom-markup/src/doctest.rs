//! Doctest fragment parsing.
//!
//! A doctest fence body carries its expectation in one of two recorded
//! forms:
//!
//! * **Exact**: code, a `# output` separator line, then the expected text.
//! * **Transcript**: `>>> ` statements (with `... ` continuations), each
//!   followed by its expected output lines.
//!
//! A body with neither form has no recorded expectation and runs for crash
//! detection only. Spans are file-absolute so fix mode can rewrite the
//! recorded text in place.

use docloom_model::{CodeFragment, Expectation, FragmentOrigin, LineSpan, TranscriptStep};

/// Separator between code and expected output in exact-form doctests.
const OUTPUT_SEPARATOR: &str = "# output";

/// Statement prompt in transcript-form doctests.
const PROMPT: &str = ">>> ";

/// Continuation prompt for multi-line statements.
const CONTINUATION: &str = "... ";

/// Parse a doctest fence body into a fragment.
///
/// `fence_line` is the 1-based line of the opening fence, so the body
/// starts at `fence_line + 1`.
#[must_use]
pub fn parse_fragment(body: &str, fence_line: usize, name: Option<String>) -> CodeFragment {
    let lines: Vec<&str> = body.lines().collect();
    let first_body_line = fence_line + 1;

    if lines.iter().any(|l| is_prompt_line(l)) {
        return CodeFragment {
            code: String::new(),
            expectation: Expectation::Transcript {
                steps: parse_transcript(&lines),
                span: LineSpan::new(first_body_line, fence_line + lines.len()),
            },
            name,
            line: fence_line,
            origin: FragmentOrigin::Page,
        };
    }

    if let Some(sep) = lines.iter().position(|l| l.trim() == OUTPUT_SEPARATOR)
        && sep + 1 < lines.len()
    {
        let code = join_lines(&lines[..sep]);
        let expected = lines[sep + 1..].join("\n");
        // The span covers only the recorded text after the separator.
        let span = LineSpan::new(first_body_line + sep + 1, fence_line + lines.len());
        return CodeFragment {
            code,
            expectation: Expectation::Exact {
                text: expected,
                span,
            },
            name,
            line: fence_line,
            origin: FragmentOrigin::Page,
        };
    }

    CodeFragment {
        code: body.to_owned(),
        expectation: Expectation::None,
        name,
        line: fence_line,
        origin: FragmentOrigin::Page,
    }
}

fn is_prompt_line(line: &str) -> bool {
    line.starts_with(PROMPT) || line.trim_end() == PROMPT.trim_end()
}

fn parse_transcript(lines: &[&str]) -> Vec<TranscriptStep> {
    let mut steps: Vec<TranscriptStep> = Vec::new();

    for line in lines {
        if let Some(stmt) = line.strip_prefix(PROMPT) {
            steps.push(TranscriptStep {
                input: stmt.to_owned(),
                expected: String::new(),
            });
        } else if let Some(cont) = line.strip_prefix(CONTINUATION)
            && let Some(step) = steps.last_mut()
            && step.expected.is_empty()
        {
            step.input.push('\n');
            step.input.push_str(cont);
        } else if let Some(step) = steps.last_mut() {
            if !step.expected.is_empty() {
                step.expected.push('\n');
            }
            step.expected.push_str(line);
        }
        // Output before the first prompt has nothing to attach to; skip it.
    }

    steps
}

fn join_lines(lines: &[&str]) -> String {
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}
