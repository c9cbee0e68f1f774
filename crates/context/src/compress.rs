//! Markup stripping for documents that push a bundle over budget.
//!
//! Drops lines that cost tokens without carrying instructions: blank lines,
//! headings, horizontal rules, HTML comments and `//` comment-only lines.
//! Fenced code blocks are kept verbatim.

/// Compress `text` by removing structural markup lines.
///
/// Pure and idempotent: `compress_text(&compress_text(s)) == compress_text(s)`.
pub fn compress_text(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut in_fence = false;
    let mut in_comment = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if in_comment {
            if trimmed.contains("-->") {
                in_comment = false;
            }
            continue;
        }

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            kept.push(line);
            continue;
        }
        if in_fence {
            kept.push(line);
            continue;
        }

        if trimmed.starts_with("<!--") {
            in_comment = !trimmed.contains("-->");
            continue;
        }

        if trimmed.is_empty()
            || is_heading(trimmed)
            || is_rule(trimmed)
            || trimmed.starts_with("//")
        {
            continue;
        }

        kept.push(line);
    }

    kept.join("\n")
}

fn is_heading(line: &str) -> bool {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    let rest = &line[hashes..];
    (1..=6).contains(&hashes) && (rest.is_empty() || rest.starts_with(' '))
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|&m| compact.chars().all(|c| c == m))
}
