use std::collections::{BTreeMap, HashSet};

use veribill_core::numeric::{
    arithmetic_difference_percent, mean, median, normalize_text, population_std_dev,
};
use veribill_core::{
    ExtractionConfig, FraudSignal, FraudSignalKind, LineItem, SubTotal, Token,
};

/// Runs the fixed battery of anomaly checks. Every check is a pure function
/// of its inputs, may append zero or more signals, and never short-circuits
/// the others; the output order is the check order, not a severity order.
pub struct FraudDetector<'a> {
    config: &'a ExtractionConfig,
}

impl<'a> FraudDetector<'a> {
    pub fn new(config: &'a ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn detect_all(
        &self,
        line_items: &[LineItem],
        sub_totals: &[SubTotal],
        final_total: f64,
        tokens: &[Token],
    ) -> Vec<FraudSignal> {
        let mut signals = Vec::new();

        if self.config.enable_arithmetic_check {
            self.check_line_item_arithmetic(line_items, &mut signals);
            self.check_total_reconciliation(line_items, final_total, &mut signals);
            self.check_subtotal_logic(sub_totals, final_total, &mut signals);
        }
        if self.config.enable_ocr_confidence_check {
            self.check_ocr_confidence(tokens, &mut signals);
        }
        if self.config.enable_font_analysis {
            self.check_font_inconsistencies(tokens, &mut signals);
        }
        if self.config.enable_semantic_check {
            self.check_semantic_anomalies(line_items, final_total, &mut signals);
        }

        signals
    }

    /// qty × rate must equal the amount within the percentage tolerance.
    fn check_line_item_arithmetic(&self, line_items: &[LineItem], signals: &mut Vec<FraudSignal>) {
        for item in line_items {
            let (Some(qty), Some(rate)) = (item.quantity, item.unit_price) else {
                continue;
            };
            let expected = qty * rate;
            let diff_percent = arithmetic_difference_percent(expected, item.amount);
            if diff_percent > self.config.arithmetic_tolerance_percent {
                signals.push(FraudSignal::new(
                    FraudSignalKind::ArithmeticMismatch,
                    format!(
                        "Line item arithmetic mismatch: {qty} × {rate} = {expected:.2}, \
                         but amount is {:.2} (diff: {diff_percent:.1}%)",
                        item.amount
                    ),
                    item.page,
                ));
            }
        }
    }

    fn check_total_reconciliation(
        &self,
        line_items: &[LineItem],
        final_total: f64,
        signals: &mut Vec<FraudSignal>,
    ) {
        let items_sum: f64 = line_items.iter().map(|i| i.amount).sum();
        let difference = (final_total - items_sum).abs();
        if difference > self.config.total_reconciliation_tolerance {
            signals.push(FraudSignal::new(
                FraudSignalKind::ArithmeticMismatch,
                format!(
                    "Total reconciliation mismatch: line items sum to {items_sum:.2}, \
                     but final total is {final_total:.2} (diff: {difference:.2})"
                ),
                line_items.first().map(|i| i.page).unwrap_or(1),
            ));
        }
    }

    /// No subtotal may exceed the final total.
    fn check_subtotal_logic(
        &self,
        sub_totals: &[SubTotal],
        final_total: f64,
        signals: &mut Vec<FraudSignal>,
    ) {
        for subtotal in sub_totals {
            if subtotal.value > final_total {
                signals.push(FraudSignal::new(
                    FraudSignalKind::StructuralAnomaly,
                    format!(
                        "Subtotal '{}' ({:.2}) is greater than final total ({final_total:.2})",
                        subtotal.label, subtotal.value
                    ),
                    subtotal.page,
                ));
            }
        }
    }

    /// One aggregated low-confidence signal per page, plus per-token
    /// statistical outliers more than two population standard deviations
    /// below their page's mean.
    fn check_ocr_confidence(&self, tokens: &[Token], signals: &mut Vec<FraudSignal>) {
        let floor = self.config.min_ocr_confidence;
        let mut low_by_page: BTreeMap<u32, Vec<&Token>> = BTreeMap::new();
        for token in tokens.iter().filter(|t| t.confidence < floor) {
            low_by_page.entry(token.page).or_default().push(token);
        }

        for (page, page_tokens) in &low_by_page {
            let lowest = page_tokens
                .iter()
                .map(|t| t.confidence)
                .fold(f32::INFINITY, f32::min);
            signals.push(FraudSignal::new(
                FraudSignalKind::OcrLowConfidence,
                format!(
                    "Found {} tokens with OCR confidence < {floor} (lowest: {lowest:.2})",
                    page_tokens.len()
                ),
                *page,
            ));
        }

        if tokens.len() < 3 {
            return;
        }
        for (page, page_tokens) in &group_by_page(tokens) {
            let confidences: Vec<f64> = page_tokens.iter().map(|t| t.confidence as f64).collect();
            let avg = mean(&confidences);
            let std = population_std_dev(&confidences);
            for token in page_tokens {
                if (token.confidence as f64) < avg - 2.0 * std {
                    signals.push(FraudSignal::new(
                        FraudSignalKind::OcrLowConfidence,
                        format!(
                            "Confidence anomaly detected: token '{}' has confidence {:.2}, \
                             significantly below page average {avg:.2}",
                            token.text, token.confidence
                        ),
                        *page,
                    ));
                }
            }
        }
    }

    /// Flag tokens whose glyph height strays past the per-page median in
    /// either direction, and — separately — tokens whose bbox area exceeds
    /// the median one-sidedly (the overwrite signature: a patch pasted over
    /// the original print is almost always larger).
    fn check_font_inconsistencies(&self, tokens: &[Token], signals: &mut Vec<FraudSignal>) {
        if tokens.len() < 2 {
            return;
        }

        let height_threshold = self.config.font_height_variance_threshold;
        let area_threshold = self.config.bbox_area_variance_threshold;

        for (page, page_tokens) in &group_by_page(tokens) {
            let heights: Vec<f64> = page_tokens.iter().map(|t| t.bbox.height()).collect();
            let areas: Vec<f64> = page_tokens.iter().map(|t| t.bbox.area()).collect();
            let median_height = median(&heights);
            let median_area = median(&areas);

            for token in page_tokens {
                if median_height > 0.0 {
                    let ratio = token.bbox.height() / median_height;
                    if ratio > height_threshold || ratio < 1.0 / height_threshold {
                        signals.push(FraudSignal::new(
                            FraudSignalKind::FontInconsistency,
                            format!(
                                "Font height anomaly: token '{}' has height {:.1}px, \
                                 median is {median_height:.1}px (ratio: {ratio:.2})",
                                token.text,
                                token.bbox.height()
                            ),
                            *page,
                        ));
                    }
                }
                if median_area > 0.0 {
                    let ratio = token.bbox.area() / median_area;
                    if ratio > area_threshold {
                        signals.push(FraudSignal::new(
                            FraudSignalKind::OverwriteDetected,
                            format!(
                                "Potential overwrite detected: token '{}' has unusually \
                                 large bbox area (ratio: {ratio:.2})",
                                token.text
                            ),
                            *page,
                        ));
                    }
                }
            }
        }
    }

    /// Semantic checks: no single item may exceed the final total, and the
    /// second and later occurrences of an identical normalized description
    /// are flagged as duplicates (a common padding pattern).
    fn check_semantic_anomalies(
        &self,
        line_items: &[LineItem],
        final_total: f64,
        signals: &mut Vec<FraudSignal>,
    ) {
        for item in line_items {
            if item.amount > final_total {
                signals.push(FraudSignal::new(
                    FraudSignalKind::StructuralAnomaly,
                    format!(
                        "Line item amount ({:.2}) exceeds final total ({final_total:.2}): {}",
                        item.amount, item.description
                    ),
                    item.page,
                ));
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        for item in line_items {
            let desc = normalize_text(&item.description);
            if !desc.is_empty() && seen.contains(&desc) {
                signals.push(FraudSignal::new(
                    FraudSignalKind::StructuralAnomaly,
                    format!("Duplicate line item detected: '{}'", item.description),
                    item.page,
                ));
            }
            seen.insert(desc);
        }
    }
}

fn group_by_page(tokens: &[Token]) -> BTreeMap<u32, Vec<&Token>> {
    let mut by_page: BTreeMap<u32, Vec<&Token>> = BTreeMap::new();
    for token in tokens {
        by_page.entry(token.page).or_default().push(token);
    }
    by_page
}

#[cfg(test)]
mod tests {
    use super::*;
    use veribill_core::BBox;

    fn item(description: &str, qty: Option<f64>, rate: Option<f64>, amount: f64) -> LineItem {
        LineItem {
            description: description.to_string(),
            quantity: qty,
            unit_price: rate,
            amount,
            page: 1,
            row_index: 0,
            confidence: 0.9,
        }
    }

    fn tok(text: &str, confidence: f32) -> Token {
        Token::new(text, BBox::new(0.0, 0.0, 40.0, 12.0), 1, confidence)
    }

    fn tok_sized(text: &str, height: f64, width: f64) -> Token {
        Token::new(text, BBox::new(0.0, 0.0, width, height), 1, 0.9)
    }

    fn detector(config: &ExtractionConfig) -> FraudDetector<'_> {
        FraudDetector::new(config)
    }

    fn kinds(signals: &[FraudSignal]) -> Vec<FraudSignalKind> {
        signals.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn arithmetic_mismatch_fires_beyond_tolerance() {
        let config = ExtractionConfig::default();
        // 2 × 100 = 200 expected; 250 is a 25% diff, well over 3%.
        let items = vec![item("Consultation", Some(2.0), Some(100.0), 250.0)];
        let signals = detector(&config).detect_all(&items, &[], 250.0, &[]);
        assert_eq!(kinds(&signals), vec![FraudSignalKind::ArithmeticMismatch]);
        assert!(signals[0].message.contains("25.0%"));
    }

    #[test]
    fn arithmetic_within_tolerance_is_silent() {
        let config = ExtractionConfig::default();
        // 201 vs 200 expected is a 0.5% diff, inside the 3% tolerance.
        let items = vec![item("Consultation", Some(2.0), Some(100.0), 201.0)];
        let signals = detector(&config).detect_all(&items, &[], 201.0, &[]);
        assert!(signals.is_empty());
    }

    #[test]
    fn arithmetic_skipped_when_qty_or_rate_missing() {
        let config = ExtractionConfig::default();
        let items = vec![
            item("A", None, Some(100.0), 999.0),
            item("B", Some(3.0), None, 999.0),
        ];
        let signals = detector(&config).detect_all(&items, &[], 1998.0, &[]);
        assert!(signals.is_empty());
    }

    #[test]
    fn zero_expected_amount_is_special_cased() {
        let config = ExtractionConfig::default();
        let items = vec![item("Freebie", Some(0.0), Some(100.0), 50.0)];
        let signals = detector(&config).detect_all(&items, &[], 50.0, &[]);
        // Expected 0 with nonzero actual counts as a 100% diff.
        assert_eq!(kinds(&signals), vec![FraudSignalKind::ArithmeticMismatch]);
    }

    #[test]
    fn reconciliation_mismatch_beyond_tolerance() {
        let config = ExtractionConfig::default();
        let items = vec![item("A", None, None, 100.0), item("B", None, None, 200.0)];
        let signals = detector(&config).detect_all(&items, &[], 400.0, &[]);
        assert_eq!(kinds(&signals), vec![FraudSignalKind::ArithmeticMismatch]);
        assert!(signals[0].message.contains("reconciliation"));
    }

    #[test]
    fn reconciliation_boundary_is_silent() {
        let config = ExtractionConfig::default();
        let items = vec![item("A", None, None, 100.0)];
        // Difference of exactly 5.0 does not exceed the tolerance.
        let signals = detector(&config).detect_all(&items, &[], 105.0, &[]);
        assert!(signals.is_empty());
    }

    #[test]
    fn subtotal_exceeding_final_total_is_flagged() {
        let config = ExtractionConfig::default();
        let subtotals = vec![SubTotal {
            label: "Pharmacy charges".to_string(),
            value: 900.0,
            page: 2,
        }];
        let signals = detector(&config).detect_all(&[], &subtotals, 500.0, &[]);
        let structural: Vec<_> = signals
            .iter()
            .filter(|s| s.kind == FraudSignalKind::StructuralAnomaly)
            .collect();
        assert_eq!(structural.len(), 1);
        assert_eq!(structural[0].page, 2);
    }

    #[test]
    fn low_confidence_aggregated_per_page() {
        let config = ExtractionConfig::default();
        let mut tokens = vec![tok("a", 0.9), tok("b", 0.5), tok("c", 0.4), tok("d", 0.9)];
        tokens.push(Token::new("e", BBox::new(0.0, 0.0, 40.0, 12.0), 2, 0.3));
        let signals = detector(&config).detect_all(&[], &[], 0.0, &tokens);
        let aggregated: Vec<_> = signals
            .iter()
            .filter(|s| s.message.starts_with("Found "))
            .collect();
        assert_eq!(aggregated.len(), 2);
        assert!(aggregated[0].message.contains("2 tokens"));
        assert!(aggregated[0].message.contains("0.40"));
        assert_eq!(aggregated[1].page, 2);
    }

    #[test]
    fn confidence_outlier_two_sigma_below_mean() {
        let config = ExtractionConfig::default();
        // Nine near-identical confidences and one collapsed outlier; the
        // outlier sits far more than two standard deviations below the mean
        // while remaining above the absolute floor check's scope.
        let mut tokens: Vec<Token> = (0..9).map(|_| tok("w", 0.95)).collect();
        tokens.push(tok("smudge", 0.62));
        let signals = detector(&config).detect_all(&[], &[], 0.0, &tokens);
        let outliers: Vec<_> = signals
            .iter()
            .filter(|s| s.message.contains("Confidence anomaly"))
            .collect();
        assert_eq!(outliers.len(), 1);
        assert!(outliers[0].message.contains("smudge"));
    }

    #[test]
    fn uniform_confidence_has_no_outliers() {
        let config = ExtractionConfig::default();
        let tokens: Vec<Token> = (0..5).map(|_| tok("w", 0.9)).collect();
        let signals = detector(&config).detect_all(&[], &[], 0.0, &tokens);
        assert!(signals.is_empty());
    }

    #[test]
    fn font_height_outlier_is_flagged_once() {
        let config = ExtractionConfig::default();
        // Median height 12; one token at 48 is a 4x ratio against the 2.0
        // threshold.
        let mut tokens: Vec<Token> = (0..6).map(|_| tok_sized("w", 12.0, 40.0)).collect();
        tokens.push(tok_sized("1300", 48.0, 40.0));
        let signals = detector(&config).detect_all(&[], &[], 0.0, &tokens);
        let fonts: Vec<_> = signals
            .iter()
            .filter(|s| s.kind == FraudSignalKind::FontInconsistency)
            .collect();
        assert_eq!(fonts.len(), 1);
        assert!(fonts[0].message.contains("1300"));
        assert!(fonts[0].message.contains("ratio: 4.00"));
    }

    #[test]
    fn undersized_font_also_flagged() {
        let config = ExtractionConfig::default();
        let mut tokens: Vec<Token> = (0..6).map(|_| tok_sized("w", 12.0, 40.0)).collect();
        tokens.push(tok_sized("tiny", 4.0, 40.0));
        let signals = detector(&config).detect_all(&[], &[], 0.0, &tokens);
        assert!(signals
            .iter()
            .any(|s| s.kind == FraudSignalKind::FontInconsistency && s.message.contains("tiny")));
    }

    #[test]
    fn oversized_bbox_area_reports_overwrite() {
        let config = ExtractionConfig::default();
        // Same height as the rest but four times as wide: area ratio 4 > 3,
        // height ratio 1 — overwrite only, no font signal.
        let mut tokens: Vec<Token> = (0..6).map(|_| tok_sized("w", 12.0, 40.0)).collect();
        tokens.push(tok_sized("patched", 12.0, 160.0));
        let signals = detector(&config).detect_all(&[], &[], 0.0, &tokens);
        assert_eq!(kinds(&signals), vec![FraudSignalKind::OverwriteDetected]);
    }

    #[test]
    fn small_area_is_not_an_overwrite() {
        let config = ExtractionConfig::default();
        // The area check is one-sided: a tiny bbox is not an overwrite.
        // (Height stays within the font ratio band.)
        let mut tokens: Vec<Token> = (0..6).map(|_| tok_sized("w", 12.0, 40.0)).collect();
        tokens.push(tok_sized("dot", 7.0, 8.0));
        let signals = detector(&config).detect_all(&[], &[], 0.0, &tokens);
        assert!(signals
            .iter()
            .all(|s| s.kind != FraudSignalKind::OverwriteDetected));
    }

    #[test]
    fn item_exceeding_final_total_is_flagged() {
        let config = ExtractionConfig::default();
        let items = vec![item("MRI", None, None, 4500.0)];
        let signals = detector(&config).detect_all(&items, &[], 4000.0, &[]);
        assert!(signals
            .iter()
            .any(|s| s.kind == FraudSignalKind::StructuralAnomaly && s.message.contains("MRI")));
    }

    #[test]
    fn duplicate_descriptions_flag_second_occurrence_only() {
        let config = ExtractionConfig::default();
        let items = vec![
            item("X-Ray", None, None, 500.0),
            item("x-ray", None, None, 500.0),
            item("CT Scan", None, None, 2500.0),
        ];
        // Reconciliation is satisfied so only the duplicate fires.
        let signals = detector(&config).detect_all(&items, &[], 3500.0, &[]);
        let dups: Vec<_> = signals
            .iter()
            .filter(|s| s.message.contains("Duplicate"))
            .collect();
        assert_eq!(dups.len(), 1);
        assert!(dups[0].message.contains("x-ray"));
    }

    #[test]
    fn disabled_checks_stay_silent() {
        let mut config = ExtractionConfig::default();
        config.enable_arithmetic_check = false;
        config.enable_semantic_check = false;
        config.enable_font_analysis = false;
        config.enable_ocr_confidence_check = false;

        let items = vec![
            item("A", Some(2.0), Some(100.0), 999.0),
            item("A", Some(2.0), Some(100.0), 999.0),
        ];
        let tokens = vec![tok("bad", 0.1), tok("bad", 0.1), tok("bad", 0.1)];
        let signals = detector(&config).detect_all(&items, &[], 0.0, &tokens);
        assert!(signals.is_empty());
    }

    #[test]
    fn signal_order_follows_check_order() {
        let config = ExtractionConfig::default();
        // One arithmetic mismatch and one duplicate; arithmetic checks run
        // before semantic ones.
        let items = vec![
            item("Scan", Some(2.0), Some(100.0), 250.0),
            item("Scan", None, None, 250.0),
        ];
        let signals = detector(&config).detect_all(&items, &[], 500.0, &[]);
        assert_eq!(
            kinds(&signals),
            vec![
                FraudSignalKind::ArithmeticMismatch,
                FraudSignalKind::StructuralAnomaly,
            ]
        );
    }
}
