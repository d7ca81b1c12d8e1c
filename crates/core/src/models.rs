use serde::{Deserialize, Serialize};

/// A typed charge extracted from one table row. `amount` is mandatory and
/// always a successfully parsed number; rows whose amount fails to parse are
/// dropped, never emitted as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub amount: f64,
    pub page: u32,
    pub row_index: usize,
    /// Blended extraction confidence (0.0–1.0).
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTotal {
    pub label: String,
    pub value: f64,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalTotal {
    pub value: f64,
    pub currency: String,
    pub page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
    Matched,
    Mismatch,
}

impl std::fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconciliationStatus::Matched => write!(f, "MATCHED"),
            ReconciliationStatus::Mismatch => write!(f, "MISMATCH"),
        }
    }
}

/// Derived reconciliation figures — always recomputed from the line items
/// and detected total, never stored independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub line_items_total: f64,
    pub detected_final_total: f64,
    pub difference: f64,
    pub reconciliation_status: ReconciliationStatus,
}

impl Aggregates {
    /// A difference exactly at the tolerance still counts as MATCHED.
    pub fn derive(line_items: &[LineItem], final_total: &FinalTotal, tolerance: f64) -> Self {
        let line_items_total: f64 = line_items.iter().map(|i| i.amount).sum();
        let detected_final_total = final_total.value;
        let difference = detected_final_total - line_items_total;
        let reconciliation_status = if difference.abs() <= tolerance {
            ReconciliationStatus::Matched
        } else {
            ReconciliationStatus::Mismatch
        };
        Self {
            line_items_total,
            detected_final_total,
            difference,
            reconciliation_status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudSignalKind {
    ArithmeticMismatch,
    FontInconsistency,
    OverwriteDetected,
    OcrLowConfidence,
    StructuralAnomaly,
}

impl std::fmt::Display for FraudSignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FraudSignalKind::ArithmeticMismatch => "ARITHMETIC_MISMATCH",
            FraudSignalKind::FontInconsistency => "FONT_INCONSISTENCY",
            FraudSignalKind::OverwriteDetected => "OVERWRITE_DETECTED",
            FraudSignalKind::OcrLowConfidence => "OCR_LOW_CONFIDENCE",
            FraudSignalKind::StructuralAnomaly => "STRUCTURAL_ANOMALY",
        };
        write!(f, "{s}")
    }
}

/// One flagged anomaly, attached to the page it was observed on. The signal
/// list is append-only, ordered by detection check, not severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudSignal {
    #[serde(rename = "type")]
    pub kind: FraudSignalKind,
    pub message: String,
    pub page: u32,
}

impl FraudSignal {
    pub fn new(kind: FraudSignalKind, message: impl Into<String>, page: u32) -> Self {
        Self { kind, message: message.into(), page }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillData {
    pub line_items: Vec<LineItem>,
    pub sub_totals: Vec<SubTotal>,
    pub final_total: FinalTotal,
    pub aggregates: Aggregates,
    pub fraud_signals: Vec<FraudSignal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionStatus {
    Success,
    Failed,
}

/// The complete output contract for one extraction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub status: ExtractionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages_processed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_confidence: Option<f32>,
    #[serde(default)]
    pub processing_notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill: Option<BillData>,
}

impl ExtractionResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: ExtractionStatus::Failed,
            reason: Some(reason.into()),
            pages_processed: None,
            model_confidence: None,
            processing_notes: Vec::new(),
            bill: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExtractionStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(description: &str, amount: f64) -> LineItem {
        LineItem {
            description: description.to_string(),
            quantity: None,
            unit_price: None,
            amount,
            page: 1,
            row_index: 1,
            confidence: 0.9,
        }
    }

    fn total(value: f64) -> FinalTotal {
        FinalTotal { value, currency: "INR".to_string(), page: 1 }
    }

    #[test]
    fn aggregates_sum_is_exact() {
        let items = vec![item("a", 100.5), item("b", 200.25), item("c", 49.25)];
        let agg = Aggregates::derive(&items, &total(350.0), 5.0);
        assert_eq!(agg.line_items_total, 100.5 + 200.25 + 49.25);
        assert_eq!(agg.detected_final_total, 350.0);
    }

    #[test]
    fn reconciliation_boundary_counts_as_matched() {
        let items = vec![item("a", 100.0)];
        // Difference exactly equal to the tolerance.
        let agg = Aggregates::derive(&items, &total(105.0), 5.0);
        assert_eq!(agg.reconciliation_status, ReconciliationStatus::Matched);
        assert_eq!(agg.difference, 5.0);

        let agg = Aggregates::derive(&items, &total(105.01), 5.0);
        assert_eq!(agg.reconciliation_status, ReconciliationStatus::Mismatch);
    }

    #[test]
    fn aggregates_with_no_items() {
        let agg = Aggregates::derive(&[], &total(500.0), 5.0);
        assert_eq!(agg.line_items_total, 0.0);
        assert_eq!(agg.reconciliation_status, ReconciliationStatus::Mismatch);
    }

    #[test]
    fn fraud_signal_wire_format() {
        let sig = FraudSignal::new(FraudSignalKind::ArithmeticMismatch, "bad math", 2);
        let json = serde_json::to_value(&sig).unwrap();
        assert_eq!(json["type"], "ARITHMETIC_MISMATCH");
        assert_eq!(json["page"], 2);
    }

    #[test]
    fn signal_kind_display_matches_wire_name() {
        assert_eq!(FraudSignalKind::OverwriteDetected.to_string(), "OVERWRITE_DETECTED");
        assert_eq!(FraudSignalKind::OcrLowConfidence.to_string(), "OCR_LOW_CONFIDENCE");
    }

    #[test]
    fn failed_result_omits_success_fields() {
        let r = ExtractionResult::failed("UNREADABLE_OR_INVALID_DOCUMENT");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["reason"], "UNREADABLE_OR_INVALID_DOCUMENT");
        assert!(json.get("bill").is_none());
        assert!(json.get("pages_processed").is_none());
    }

    #[test]
    fn status_wire_strings() {
        assert_eq!(
            serde_json::to_value(ExtractionStatus::Success).unwrap(),
            "SUCCESS"
        );
        assert_eq!(
            serde_json::to_value(ReconciliationStatus::Mismatch).unwrap(),
            "MISMATCH"
        );
    }
}
