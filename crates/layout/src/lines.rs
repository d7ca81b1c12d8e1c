use veribill_core::Token;

/// Cluster one page's tokens into visual lines.
///
/// Tokens are sorted by top-edge y, then swept once: a token joins the
/// current line iff its top edge lies within `y_tolerance` of the line's
/// anchor — the y of the *first* token added to the line, not a running
/// average. The anchor rule lets a line's effective band drift when tokens
/// arrive with slowly increasing y; downstream tolerance constants were
/// tuned against that behavior, so it must stay.
///
/// Each finished line is ordered left to right by x.
pub fn group_into_lines(tokens: &[Token], y_tolerance: f64) -> Vec<Vec<Token>> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&Token> = tokens.iter().collect();
    sorted.sort_by(|a, b| a.bbox.y1.total_cmp(&b.bbox.y1));

    let mut lines: Vec<Vec<Token>> = Vec::new();
    let mut current: Vec<&Token> = vec![sorted[0]];
    let mut anchor_y = sorted[0].bbox.y1;

    for token in &sorted[1..] {
        if (token.bbox.y1 - anchor_y).abs() <= y_tolerance {
            current.push(token);
        } else {
            lines.push(finish_line(current));
            current = vec![token];
            anchor_y = token.bbox.y1;
        }
    }
    lines.push(finish_line(current));

    lines
}

fn finish_line(mut line: Vec<&Token>) -> Vec<Token> {
    line.sort_by(|a, b| a.bbox.x1.total_cmp(&b.bbox.x1));
    line.into_iter().cloned().collect()
}
