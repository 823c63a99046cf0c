//! Tolerant parsing for LLM-shaped JSON
//!
//! Models wrap JSON in Markdown fences, leave trailing commas, and prepend
//! prose. The repair is a single pass: strip fences, extract the first
//! balanced `{...}` or `[...]` block, drop trailing commas. Anything still
//! invalid after that is a parse error — partial content is never salvaged.

use super::LlmError;
use serde_json::Value;
use tracing::debug;

/// Remove surrounding Markdown code fences (``` or ```json) from a string.
///
/// Preserves inner content exactly.
pub fn strip_code_fences(text: &str) -> String {
    let stripped = text.trim();
    if !stripped.starts_with("```") {
        return stripped.to_string();
    }
    let mut lines: Vec<&str> = stripped.lines().collect();
    if !lines.is_empty() {
        lines.remove(0);
    }
    if lines.last().map(|l| l.trim()) == Some("```") {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// Extract the first balanced `{...}` or `[...]` block.
fn first_balanced_block(text: &str) -> Option<&str> {
    let open = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let (open_byte, close_byte) = if bytes[open] == b'{' {
        (b'{', b'}')
    } else {
        (b'[', b']')
    };

    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b if b == open_byte => depth += 1,
            b if b == close_byte => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Remove trailing commas immediately before `}` or `]`.
fn drop_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '}' | ']' => {
                // Drop a comma separated from the closer only by whitespace.
                let trimmed_len = out.trim_end().len();
                if out[..trimmed_len].ends_with(',') {
                    out.truncate(trimmed_len - 1);
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Parse JSON from LLM output, repairing well-known shape errors.
///
/// Tries a direct parse of the fence-stripped text first; on failure,
/// extracts the first balanced block, drops trailing commas, and tries once
/// more. Returns `LlmError::Parse` when both attempts fail.
pub fn parse_json_with_repair(text: &str) -> Result<Value, LlmError> {
    let stripped = strip_code_fences(text);
    if stripped.is_empty() {
        return Err(LlmError::Parse("empty reply".to_string()));
    }

    if let Ok(value) = serde_json::from_str::<Value>(&stripped) {
        return Ok(value);
    }

    let block = first_balanced_block(&stripped)
        .ok_or_else(|| LlmError::Parse("no balanced JSON block found".to_string()))?;
    let repaired = drop_trailing_commas(block);
    debug!("parsed LLM JSON after repair");
    serde_json::from_str::<Value>(&repaired).map_err(|e| LlmError::Parse(e.to_string()))
}
