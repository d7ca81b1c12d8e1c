use veribill_core::Token;

/// One column's x-interval: `(start_x, end_x)`.
pub type ColumnBoundary = (f64, f64);

/// Derive column boundaries from the global distribution of x-edges.
///
/// Every distinct left and right token edge is collected and sorted; a run
/// of edges closer together than `min_gap` forms one column span, and a gap
/// exceeding `min_gap` closes the span and opens the next. Works on the
/// whole page at once, independent of row grouping. Deterministic for a
/// given token set.
pub fn detect_columns(tokens: &[Token], min_gap: f64) -> Vec<ColumnBoundary> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut edges: Vec<f64> = Vec::with_capacity(tokens.len() * 2);
    for token in tokens {
        edges.push(token.bbox.x1);
        edges.push(token.bbox.x2);
    }
    edges.sort_by(f64::total_cmp);
    edges.dedup();

    let mut columns = Vec::new();
    let mut span_start = edges[0];

    for pair in edges.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next - prev > min_gap {
            columns.push((span_start, prev));
            span_start = next;
        }
    }
    columns.push((span_start, edges[edges.len() - 1]));

    columns
}

/// Index of the column containing `center_x`, or the nearest column by
/// midpoint when the point falls in a gap. `None` only when there are no
/// columns at all — with at least one column an index is always produced.
pub fn assign_to_column(center_x: f64, columns: &[ColumnBoundary]) -> Option<usize> {
    if columns.is_empty() {
        return None;
    }

    for (idx, &(start, end)) in columns.iter().enumerate() {
        if start <= center_x && center_x <= end {
            return Some(idx);
        }
    }

    // In a gap: nearest column midpoint wins.
    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let da = (center_x - (a.0 + a.1) / 2.0).abs();
            let db = (center_x - (b.0 + b.1) / 2.0).abs();
            da.total_cmp(&db)
        })
        .map(|(idx, _)| idx)
}
