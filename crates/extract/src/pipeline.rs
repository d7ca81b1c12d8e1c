use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use veribill_core::numeric::is_numeric_text;
use veribill_core::{
    Aggregates, BillData, ExtractionConfig, ExtractionResult, ExtractionStatus, Token,
};
use veribill_layout::ParsedTable;

use crate::fraud::FraudDetector;
use crate::items::LineItemExtractor;

#[derive(Debug, Error)]
pub enum TokenSourceError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Token source error: {0}")]
    Source(String),
}

/// Input schema produced by the OCR collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

impl TokenSet {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, total_pages: None }
    }
}

/// Abstraction over the upstream token producer (OCR service, cached run,
/// test fixture). Retries, if any, belong behind this seam — extraction
/// itself is a pure function of the token set.
pub trait TokenSource: Send + Sync {
    fn fetch(&self, document_ref: &str) -> Result<TokenSet, TokenSourceError>;
}

/// Returns a pre-set token set regardless of the document reference — used
/// to exercise the pipeline without a live OCR service.
pub struct MockTokenSource {
    token_set: TokenSet,
}

impl MockTokenSource {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { token_set: TokenSet::new(tokens) }
    }
}

impl TokenSource for MockTokenSource {
    fn fetch(&self, _document_ref: &str) -> Result<TokenSet, TokenSourceError> {
        Ok(self.token_set.clone())
    }
}

/// Orchestrates: readability gates → table parse → line items → totals →
/// aggregates → fraud battery → result assembly.
///
/// Stateless across calls: every extraction builds fresh intermediate
/// structures from its own token set, so hosts may run one extractor per
/// request without locking.
pub struct BillExtractor {
    config: ExtractionConfig,
}

impl Default for BillExtractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

impl BillExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Fetch tokens for `document_ref` and extract. A source failure maps
    /// to a FAILED result, never a crash.
    pub fn process<S: TokenSource>(&self, source: &S, document_ref: &str) -> ExtractionResult {
        info!(document_ref, "fetching OCR tokens");
        match source.fetch(document_ref) {
            Ok(token_set) => self.extract(&token_set),
            Err(e) => {
                warn!(document_ref, error = %e, "token acquisition failed");
                ExtractionResult::failed(format!("Token acquisition failed: {e}"))
            }
        }
    }

    /// Run the full extraction over one token set.
    ///
    /// Never panics outward: an unexpected internal fault is converted into
    /// a FAILED result with a reason string.
    pub fn extract(&self, input: &TokenSet) -> ExtractionResult {
        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.extract_inner(input)));
        match outcome {
            Ok(result) => result,
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                warn!(detail, "extraction aborted by internal fault");
                ExtractionResult::failed(format!("Extraction error: {detail}"))
            }
        }
    }

    fn extract_inner(&self, input: &TokenSet) -> ExtractionResult {
        let tokens = &input.tokens;

        if tokens.is_empty() {
            return ExtractionResult::failed("No OCR tokens provided");
        }
        if !self.is_readable(tokens) {
            return ExtractionResult::failed("UNREADABLE_OR_INVALID_DOCUMENT");
        }

        let mut notes = Vec::new();

        let table = ParsedTable::parse(tokens, &self.config);
        let extractor = LineItemExtractor::new(&self.config);
        let line_items = extractor.line_items(&table, &mut notes);
        let sub_totals = extractor.sub_totals(&table);
        let final_total = extractor.final_total(&table, tokens, &mut notes);

        let aggregates = Aggregates::derive(
            &line_items,
            &final_total,
            self.config.total_reconciliation_tolerance,
        );
        let fraud_signals = FraudDetector::new(&self.config).detect_all(
            &line_items,
            &sub_totals,
            final_total.value,
            tokens,
        );

        let model_confidence = if line_items.is_empty() {
            0.0
        } else {
            line_items.iter().map(|i| i.confidence).sum::<f32>() / line_items.len() as f32
        };
        let pages_processed = tokens.iter().map(|t| t.page).max().unwrap_or(0);

        info!(
            line_items = line_items.len(),
            sub_totals = sub_totals.len(),
            fraud_signals = fraud_signals.len(),
            reconciliation = %aggregates.reconciliation_status,
            "extraction complete"
        );

        ExtractionResult {
            status: ExtractionStatus::Success,
            reason: None,
            pages_processed: Some(pages_processed),
            model_confidence: Some(model_confidence),
            processing_notes: notes,
            bill: Some(BillData {
                line_items,
                sub_totals,
                final_total,
                aggregates,
                fraud_signals,
            }),
        }
    }

    /// A document is readable when it carries enough tokens, enough average
    /// confidence, and enough numeric content to plausibly be a bill.
    fn is_readable(&self, tokens: &[Token]) -> bool {
        if tokens.len() < self.config.min_token_count {
            return false;
        }

        let avg_confidence =
            tokens.iter().map(|t| t.confidence).sum::<f32>() / tokens.len() as f32;
        if avg_confidence < self.config.min_avg_confidence {
            return false;
        }

        let numeric_count = tokens.iter().filter(|t| is_numeric_text(&t.text)).count();
        numeric_count >= self.config.min_numeric_tokens
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown internal fault"
    }
}
