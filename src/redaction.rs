use crate::models::ModerationFinding;

pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Replace every flagged region of `text` with [`REDACTION_MARKER`].
///
/// Spans are byte offsets. A span is trusted only when it lands on char
/// boundaries and (if the finding carries a quote) still covers that quote.
/// Every occurrence of a quote in `text` is flagged too, which covers stale
/// spans and repeated quotes. Regions inside an existing marker are left
/// alone, and overlapping regions are merged so each is replaced once.
pub fn redact(text: &str, findings: &[ModerationFinding]) -> String {
    let markers: Vec<(usize, usize)> = text
        .match_indices(REDACTION_MARKER)
        .map(|(start, m)| (start, start + m.len()))
        .collect();
    let inside_marker = |(start, end): (usize, usize)| markers.iter().any(|&(ms, me)| start < me && ms < end);

    let quoted = findings
        .iter()
        .map(|f| f.matched_text.as_str())
        .filter(|quote| !quote.is_empty())
        .flat_map(|quote| text.match_indices(quote).map(|(start, m)| (start, start + m.len())));

    let mut spans: Vec<(usize, usize)> = findings
        .iter()
        .filter(|f| span_is_valid(text, f))
        .map(|f| (f.span_start, f.span_end))
        .chain(quoted)
        .filter(|&span| !inside_marker(span))
        .collect();
    spans.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start < last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in merged {
        out.push_str(&text[cursor..start]);
        out.push_str(REDACTION_MARKER);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn span_is_valid(text: &str, finding: &ModerationFinding) -> bool {
    let (start, end) = (finding.span_start, finding.span_end);
    if start >= end || end > text.len() || !text.is_char_boundary(start) || !text.is_char_boundary(end) {
        return false;
    }
    finding.matched_text.is_empty() || text[start..end] == finding.matched_text
}
