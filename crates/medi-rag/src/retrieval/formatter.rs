use crate::processing::truncate_chars;
use crate::types::{ResultEnvelope, SourceKind, SourceResult};

/// Render evidence as a prompt block.
///
/// Results are grouped by source in first-seen order, at most
/// `max_per_source` per group, each with its content cut to `preview_chars`.
/// Output depends only on the envelope's contents.
pub fn format_for_prompt(
    envelope: &ResultEnvelope,
    max_per_source: usize,
    preview_chars: usize,
) -> String {
    let question = envelope.query.text();
    if envelope.results.is_empty() {
        return format!("No external information found for: {}", question);
    }

    let mut groups: Vec<(SourceKind, Vec<&SourceResult>)> = Vec::new();
    for result in &envelope.results {
        match groups.iter_mut().find(|(kind, _)| *kind == result.source) {
            Some((_, members)) => members.push(result),
            None => groups.push((result.source, vec![result])),
        }
    }

    let mut out = format!("EXTERNAL INFORMATION FOR: '{}'\n\n", question);
    for (kind, members) in groups {
        out.push_str(&format!("=== {} ===\n", kind.display_name()));
        for (i, result) in members.iter().take(max_per_source).enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, result.title));
            let content = result.content.replace("\n\n", "\n");
            out.push_str(&format!(
                "   {}\n\n",
                truncate_chars(content.trim(), preview_chars)
            ));
        }
    }
    out
}
