use veribill_core::numeric::{extract_number, normalize_text};
use veribill_core::{ExtractionConfig, FieldRole, FinalTotal, LineItem, SubTotal, Token};
use veribill_layout::{ParsedTable, TableRow};

// Certainty placeholders for the non-OCR confidence components. Structural
// and column-mapping certainty are fixed at full weight for now, so only the
// OCR term varies in practice.
const STRUCTURAL_CERTAINTY: f64 = 1.0;
const COLUMN_MAPPING_CERTAINTY: f64 = 1.0;

/// Walks data rows and turns them into typed line items, subtotals, and the
/// final total. Read-only over the parsed table.
pub struct LineItemExtractor<'a> {
    config: &'a ExtractionConfig,
}

impl<'a> LineItemExtractor<'a> {
    pub fn new(config: &'a ExtractionConfig) -> Self {
        Self { config }
    }

    /// Typed line items from the table's data rows.
    ///
    /// A row is skipped when its description or amount cell is empty, when
    /// its description carries a total/subtotal keyword (totals rows must
    /// not leak into line items), or when the amount fails to parse — a
    /// parse failure drops the row, it never produces a zero amount.
    pub fn line_items(&self, table: &ParsedTable, notes: &mut Vec<String>) -> Vec<LineItem> {
        let mut items = Vec::new();

        for row in table.data_rows() {
            let description = table.role_text(row, FieldRole::Description);
            let amount_text = table.role_text(row, FieldRole::Amount);
            if description.is_empty() || amount_text.is_empty() {
                continue;
            }

            let desc_norm = normalize_text(&description);
            if self.is_totals_description(&desc_norm) {
                continue;
            }

            let Some(amount) = extract_number(&amount_text) else {
                continue;
            };

            let quantity = self.optional_role_number(table, row, FieldRole::Quantity);
            let unit_price = self.optional_role_number(table, row, FieldRole::UnitPrice);

            items.push(LineItem {
                description: description.trim().to_string(),
                quantity,
                unit_price,
                amount,
                page: row.page,
                row_index: row.row_index,
                confidence: self.row_confidence(row),
            });
        }

        if items.is_empty() {
            notes.push("No line items extracted from table".to_string());
        }
        items
    }

    /// All rows carrying a subtotal keyword, one `SubTotal` each.
    pub fn sub_totals(&self, table: &ParsedTable) -> Vec<SubTotal> {
        let mut subtotals = Vec::new();

        for row in table.rows() {
            let row_text = row.text();
            let lower = normalize_text(&row_text);
            let matched = self
                .config
                .subtotal_keywords
                .iter()
                .any(|kw| lower.contains(kw.as_str()));
            if !matched {
                continue;
            }
            if let Some(value) = row_value(row) {
                subtotals.push(SubTotal {
                    label: row_text.trim().to_string(),
                    value,
                    page: row.page,
                });
            }
        }

        subtotals
    }

    /// Final total via an ordered strategy chain: the priority keyword scan
    /// first, then the largest-numeric-token fallback. First success wins.
    pub fn final_total(
        &self,
        table: &ParsedTable,
        tokens: &[Token],
        notes: &mut Vec<String>,
    ) -> FinalTotal {
        if let Some(total) = self.keyword_total(table) {
            return total;
        }
        notes.push("Final total not found by keyword, using largest numeric value".to_string());
        self.largest_value_total(tokens)
    }

    /// Scan every row against the priority-ordered total keyword list.
    /// Lower index = higher priority, judged across the whole document: a
    /// later row matching "grand total" beats an earlier row matching
    /// "total".
    fn keyword_total(&self, table: &ParsedTable) -> Option<FinalTotal> {
        let mut best: Option<(usize, FinalTotal)> = None;

        for row in table.rows() {
            let lower = normalize_text(&row.text());
            for (priority, keyword) in self.config.total_keywords.iter().enumerate() {
                if !lower.contains(keyword.as_str()) {
                    continue;
                }
                let Some(value) = row_value(row) else {
                    continue;
                };
                let better = match &best {
                    None => true,
                    Some((best_priority, _)) => priority < *best_priority,
                };
                if better {
                    best = Some((
                        priority,
                        FinalTotal {
                            value,
                            currency: self.config.currency.clone(),
                            page: row.page,
                        },
                    ));
                }
            }
        }

        best.map(|(_, total)| total)
    }

    /// Largest parseable numeric value anywhere in the document, attributed
    /// to the page it was found on.
    fn largest_value_total(&self, tokens: &[Token]) -> FinalTotal {
        let mut max_value = 0.0f64;
        let mut max_page = 1u32;

        for token in tokens {
            if let Some(value) = extract_number(&token.text) {
                if value > max_value {
                    max_value = value;
                    max_page = token.page;
                }
            }
        }

        FinalTotal {
            value: max_value,
            currency: self.config.currency.clone(),
            page: max_page,
        }
    }

    fn is_totals_description(&self, desc_norm: &str) -> bool {
        self.config
            .total_keywords
            .iter()
            .chain(self.config.subtotal_keywords.iter())
            .any(|kw| desc_norm.contains(kw.as_str()))
    }

    fn optional_role_number(
        &self,
        table: &ParsedTable,
        row: &TableRow,
        role: FieldRole,
    ) -> Option<f64> {
        let text = table.role_text(row, role);
        if text.is_empty() {
            return None;
        }
        extract_number(&text)
    }

    /// Weighted blend of mean row OCR confidence with the structural and
    /// column-mapping certainty constants, clamped to [0, 1].
    fn row_confidence(&self, row: &TableRow) -> f32 {
        if row.tokens.is_empty() {
            return 0.0;
        }
        let ocr_mean = row.tokens.iter().map(|t| t.confidence as f64).sum::<f64>()
            / row.tokens.len() as f64;
        let w = &self.config.confidence_weights;
        let blended = ocr_mean * w.ocr
            + STRUCTURAL_CERTAINTY * w.structural
            + COLUMN_MAPPING_CERTAINTY * w.column_mapping;
        blended.clamp(0.0, 1.0) as f32
    }
}

/// Numeric value of a row: the rightmost assigned column's text first, then
/// a right-to-left scan of all row tokens for the first parseable number.
fn row_value(row: &TableRow) -> Option<f64> {
    if let Some(col_idx) = row.rightmost_column() {
        if let Some(value) = extract_number(&row.column_text(col_idx)) {
            return Some(value);
        }
    }
    row.tokens
        .iter()
        .rev()
        .find_map(|token| extract_number(&token.text))
}
