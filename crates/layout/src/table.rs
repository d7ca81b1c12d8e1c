use std::collections::BTreeMap;

use veribill_core::numeric::{merge_token_text, normalize_text};
use veribill_core::{ExtractionConfig, FieldRole, Token};

use crate::columns::{assign_to_column, detect_columns, ColumnBoundary};
use crate::lines::group_into_lines;

/// Tokens inferred to share one visual table line, with their column
/// assignments. Built once by [`ParsedTable::parse`] and immutable after.
#[derive(Debug, Clone)]
pub struct TableRow {
    pub tokens: Vec<Token>,
    pub page: u32,
    /// Unique within the document: increases across pages in page order,
    /// then top to bottom.
    pub row_index: usize,
    columns: BTreeMap<usize, Vec<Token>>,
}

impl TableRow {
    fn new(tokens: Vec<Token>, page: u32, row_index: usize, boundaries: &[ColumnBoundary]) -> Self {
        let mut columns: BTreeMap<usize, Vec<Token>> = BTreeMap::new();
        for token in &tokens {
            if let Some(idx) = assign_to_column(token.bbox.center().0, boundaries) {
                columns.entry(idx).or_default().push(token.clone());
            }
        }
        Self { tokens, page, row_index, columns }
    }

    /// Merged text of the whole row.
    pub fn text(&self) -> String {
        merge_token_text(&self.tokens)
    }

    /// Merged text of one column; empty when no token landed there.
    pub fn column_text(&self, col_idx: usize) -> String {
        self.columns
            .get(&col_idx)
            .map(|tokens| merge_token_text(tokens))
            .unwrap_or_default()
    }

    pub fn column_tokens(&self, col_idx: usize) -> &[Token] {
        self.columns.get(&col_idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn column_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns.keys().copied()
    }

    /// Highest occupied column index, if any token was assigned.
    pub fn rightmost_column(&self) -> Option<usize> {
        self.columns.keys().next_back().copied()
    }
}

/// The reconstructed table for a whole document: rows with column
/// assignments, one document-wide column plan, and the field-role map.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    rows: Vec<TableRow>,
    column_boundaries: Vec<ColumnBoundary>,
    role_map: BTreeMap<FieldRole, usize>,
    header_row_idx: Option<usize>,
}

impl ParsedTable {
    pub fn parse(tokens: &[Token], config: &ExtractionConfig) -> Self {
        // Pages in ascending order.
        let mut by_page: BTreeMap<u32, Vec<Token>> = BTreeMap::new();
        for token in tokens {
            by_page.entry(token.page).or_default().push(token.clone());
        }

        // Column boundaries come from the first page processed and are
        // reused for every page: one table layout per document.
        let mut column_boundaries: Vec<ColumnBoundary> = Vec::new();
        let mut rows: Vec<TableRow> = Vec::new();
        let mut row_index = 0usize;

        for (page, page_tokens) in &by_page {
            if column_boundaries.is_empty() {
                column_boundaries = detect_columns(page_tokens, config.min_column_gap);
            }
            for line in group_into_lines(page_tokens, config.y_coordinate_tolerance) {
                rows.push(TableRow::new(line, *page, row_index, &column_boundaries));
                row_index += 1;
            }
        }

        let header_row_idx = detect_header(&rows, config);
        let role_map = match header_row_idx {
            Some(idx) => map_roles_from_header(&rows[idx], config),
            None => map_roles_heuristic(&rows, &column_boundaries),
        };

        Self { rows, column_boundaries, role_map, header_row_idx }
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Rows after the header, or every row when no header was found.
    pub fn data_rows(&self) -> &[TableRow] {
        match self.header_row_idx {
            Some(idx) => &self.rows[idx + 1..],
            None => &self.rows,
        }
    }

    pub fn header_row_idx(&self) -> Option<usize> {
        self.header_row_idx
    }

    pub fn column_boundaries(&self) -> &[ColumnBoundary] {
        &self.column_boundaries
    }

    pub fn column_index(&self, role: FieldRole) -> Option<usize> {
        self.role_map.get(&role).copied()
    }

    /// Text of `row`'s cell for `role`; empty when the role is unmapped.
    pub fn role_text(&self, row: &TableRow, role: FieldRole) -> String {
        self.column_index(role)
            .map(|idx| row.column_text(idx))
            .unwrap_or_default()
    }
}

/// First row whose merged lowercased text contains any role keyword.
fn detect_header(rows: &[TableRow], config: &ExtractionConfig) -> Option<usize> {
    rows.iter().position(|row| {
        let text = normalize_text(&row.text());
        config
            .header_keywords
            .iter()
            .flat_map(|rk| rk.keywords.iter())
            .any(|kw| text.contains(kw.as_str()))
    })
}

/// Match each role's keywords against the header cells; substring match in
/// either direction, first matching column wins, and a role may remain
/// unmapped.
fn map_roles_from_header(header: &TableRow, config: &ExtractionConfig) -> BTreeMap<FieldRole, usize> {
    let mut mapping = BTreeMap::new();

    for rk in &config.header_keywords {
        'cols: for col_idx in header.column_indices() {
            let cell = normalize_text(&header.column_text(col_idx));
            if cell.is_empty() {
                continue;
            }
            for kw in &rk.keywords {
                if cell.contains(kw.as_str()) || kw.contains(&cell) {
                    mapping.insert(rk.role, col_idx);
                    break 'cols;
                }
            }
        }
    }

    mapping
}

/// Position-based fallback keyed purely on the column count. Coarse by
/// design: layouts that deviate from the canonical left-to-right order get
/// misclassified, which is a documented limitation of headerless parsing.
fn map_roles_heuristic(
    rows: &[TableRow],
    boundaries: &[ColumnBoundary],
) -> BTreeMap<FieldRole, usize> {
    let mut mapping = BTreeMap::new();
    if rows.is_empty() || boundaries.is_empty() {
        return mapping;
    }

    match boundaries.len() {
        n if n >= 4 => {
            mapping.insert(FieldRole::Description, 0);
            mapping.insert(FieldRole::Quantity, 1);
            mapping.insert(FieldRole::UnitPrice, 2);
            mapping.insert(FieldRole::Amount, 3);
        }
        3 => {
            mapping.insert(FieldRole::Description, 0);
            mapping.insert(FieldRole::Quantity, 1);
            mapping.insert(FieldRole::Amount, 2);
        }
        2 => {
            mapping.insert(FieldRole::Description, 0);
            mapping.insert(FieldRole::Amount, 1);
        }
        _ => {
            mapping.insert(FieldRole::Description, 0);
        }
    }
    mapping
}
