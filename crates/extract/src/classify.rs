use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use veribill_core::numeric::is_numeric_text;
use veribill_core::Token;

/// Coarse page-level label, consumed by hosts after core extraction to
/// route pages; the extraction pipeline itself never depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    #[serde(rename = "Bill Detail")]
    BillDetail,
    #[serde(rename = "Final Bill")]
    FinalBill,
    #[serde(rename = "Pharmacy")]
    Pharmacy,
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageType::BillDetail => write!(f, "Bill Detail"),
            PageType::FinalBill => write!(f, "Final Bill"),
            PageType::Pharmacy => write!(f, "Pharmacy"),
        }
    }
}

const FINAL_BILL_KEYWORDS: &[&str] = &[
    "final",
    "total",
    "grand total",
    "net payable",
    "amount payable",
    "total amount",
    "bill total",
    "summary",
    "payment",
];

const PHARMACY_KEYWORDS: &[&str] = &[
    "pharmacy",
    "medicine",
    "medication",
    "drug",
    "tablet",
    "capsule",
    "syrup",
    "injection",
    "prescription",
    "rx",
    "pharmaceutical",
];

const BILL_DETAIL_KEYWORDS: &[&str] = &[
    "description",
    "item",
    "service",
    "charge",
    "procedure",
    "test",
    "consultation",
    "room",
    "bed",
    "treatment",
    "diagnosis",
];

/// Classify one page from its tokens using keyword scoring plus a simple
/// table-structure heuristic (three or more amount-shaped tokens).
pub fn classify_page(tokens: &[Token], page_num: u32) -> PageType {
    let page_text = tokens
        .iter()
        .map(|t| t.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let score = |keywords: &[&str]| keywords.iter().filter(|kw| page_text.contains(*kw)).count();
    let final_bill_score = score(FINAL_BILL_KEYWORDS);
    let pharmacy_score = score(PHARMACY_KEYWORDS);
    let bill_detail_score = score(BILL_DETAIL_KEYWORDS);

    let has_total = ["grand total", "final total", "net payable"]
        .iter()
        .any(|kw| page_text.contains(kw));
    let amount_count = tokens.iter().filter(|t| is_numeric_text(&t.text)).count();
    let has_table_structure = amount_count >= 3;

    let page_type = if has_total && final_bill_score >= 2 {
        PageType::FinalBill
    } else if pharmacy_score >= 2 {
        PageType::Pharmacy
    } else if has_table_structure && bill_detail_score >= 2 {
        PageType::BillDetail
    } else if final_bill_score > pharmacy_score && final_bill_score > bill_detail_score {
        PageType::FinalBill
    } else if pharmacy_score > bill_detail_score {
        PageType::Pharmacy
    } else if has_table_structure {
        PageType::BillDetail
    } else {
        PageType::FinalBill
    };

    tracing::debug!(page = page_num, %page_type, "classified page");
    page_type
}

/// Classify every page of a document, in page order.
pub fn classify_pages(tokens: &[Token]) -> Vec<(u32, PageType)> {
    let mut by_page: BTreeMap<u32, Vec<&Token>> = BTreeMap::new();
    for token in tokens {
        by_page.entry(token.page).or_default().push(token);
    }
    by_page
        .into_iter()
        .map(|(page, page_tokens)| {
            let owned: Vec<Token> = page_tokens.into_iter().cloned().collect();
            (page, classify_page(&owned, page))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use veribill_core::BBox;

    fn tok(text: &str, page: u32) -> Token {
        Token::new(text, BBox::new(0.0, 0.0, 40.0, 12.0), page, 0.9)
    }

    fn page(words: &[&str]) -> Vec<Token> {
        words.iter().map(|w| tok(w, 1)).collect()
    }

    #[test]
    fn final_bill_by_explicit_total() {
        let tokens = page(&["Grand", "Total", "Summary", "Payment", "5000"]);
        assert_eq!(classify_page(&tokens, 1), PageType::FinalBill);
    }

    #[test]
    fn pharmacy_by_keyword_density() {
        let tokens = page(&["Pharmacy", "Paracetamol", "Tablet", "10", "25.00"]);
        assert_eq!(classify_page(&tokens, 1), PageType::Pharmacy);
    }

    #[test]
    fn bill_detail_by_table_structure() {
        let tokens = page(&[
            "Description", "Charge", "Consultation", "500", "X-Ray", "800", "ECG", "300",
        ]);
        assert_eq!(classify_page(&tokens, 1), PageType::BillDetail);
    }

    #[test]
    fn itemized_page_without_keywords_defaults_to_bill_detail() {
        let tokens = page(&["Alpha", "100", "Beta", "200", "Gamma", "300"]);
        assert_eq!(classify_page(&tokens, 1), PageType::BillDetail);
    }

    #[test]
    fn sparse_page_defaults_to_final_bill() {
        let tokens = page(&["Thank", "you"]);
        assert_eq!(classify_page(&tokens, 1), PageType::FinalBill);
    }

    #[test]
    fn classify_pages_walks_pages_in_order() {
        let mut tokens = vec![
            tok("Description", 1),
            tok("Consultation", 1),
            tok("500", 1),
            tok("800", 1),
            tok("300", 1),
        ];
        tokens.push(tok("Grand", 2));
        tokens.push(tok("Total", 2));
        tokens.push(tok("Summary", 2));
        tokens.push(tok("Payment", 2));
        let labels = classify_pages(&tokens);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0], (1, PageType::BillDetail));
        assert_eq!(labels[1], (2, PageType::FinalBill));
    }

    #[test]
    fn wire_label_matches_display() {
        let json = serde_json::to_value(PageType::BillDetail).unwrap();
        assert_eq!(json, "Bill Detail");
        assert_eq!(PageType::FinalBill.to_string(), "Final Bill");
    }
}
