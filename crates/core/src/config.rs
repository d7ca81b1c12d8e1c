use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Semantic meaning assigned to a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    Description,
    Quantity,
    UnitPrice,
    Amount,
}

impl std::fmt::Display for FieldRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldRole::Description => write!(f, "description"),
            FieldRole::Quantity => write!(f, "quantity"),
            FieldRole::UnitPrice => write!(f, "unit_price"),
            FieldRole::Amount => write!(f, "amount"),
        }
    }
}

/// Header keywords for one field role. The table is consulted in order, so
/// earlier entries claim their column first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleKeywords {
    pub role: FieldRole,
    pub keywords: Vec<String>,
}

/// Weights for the per-item confidence blend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub ocr: f64,
    pub structural: f64,
    pub column_mapping: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self { ocr: 0.4, structural: 0.3, column_mapping: 0.3 }
    }
}

/// All tunable thresholds and keyword tables for one extraction run.
///
/// Built once and passed by reference into every component; never consulted
/// through a hidden global. Safe for unsynchronized shared reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Tokens below this confidence are flagged as low-confidence OCR.
    pub min_ocr_confidence: f32,
    /// Secondary confidence band; kept in the config surface for
    /// compatibility with existing config files.
    pub low_confidence_threshold: f32,
    /// Tolerance (percent) for qty × rate = amount per line item.
    pub arithmetic_tolerance_percent: f64,
    /// Absolute tolerance for line-items-sum vs final-total reconciliation.
    pub total_reconciliation_tolerance: f64,
    /// Vertical band (pixels) for grouping words into one line.
    pub y_coordinate_tolerance: f64,
    /// Horizontal clustering tolerance (pixels).
    pub x_coordinate_tolerance: f64,
    /// Minimum x-gap (pixels) separating two columns.
    pub min_column_gap: f64,
    /// Height ratio (either direction) beyond which a token's font is flagged.
    pub font_height_variance_threshold: f64,
    /// Bbox-area ratio (one-sided) beyond which an overwrite is suspected.
    pub bbox_area_variance_threshold: f64,
    pub confidence_weights: ConfidenceWeights,

    // Readability floors: documents below any of these are rejected outright.
    pub min_token_count: usize,
    pub min_avg_confidence: f32,
    pub min_numeric_tokens: usize,

    pub currency: String,

    pub enable_arithmetic_check: bool,
    pub enable_font_analysis: bool,
    pub enable_ocr_confidence_check: bool,
    pub enable_semantic_check: bool,

    /// Header keywords per role, in role scan order.
    pub header_keywords: Vec<RoleKeywords>,
    /// Final-total keywords, ordered by priority (lower index wins).
    pub total_keywords: Vec<String>,
    pub subtotal_keywords: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_ocr_confidence: 0.60,
            low_confidence_threshold: 0.70,
            arithmetic_tolerance_percent: 3.0,
            total_reconciliation_tolerance: 5.0,
            y_coordinate_tolerance: 5.0,
            x_coordinate_tolerance: 10.0,
            min_column_gap: 20.0,
            font_height_variance_threshold: 2.0,
            bbox_area_variance_threshold: 3.0,
            confidence_weights: ConfidenceWeights::default(),
            min_token_count: 10,
            min_avg_confidence: 0.3,
            min_numeric_tokens: 3,
            currency: "INR".to_string(),
            enable_arithmetic_check: true,
            enable_font_analysis: true,
            enable_ocr_confidence_check: true,
            enable_semantic_check: true,
            header_keywords: vec![
                role_keywords(
                    FieldRole::Description,
                    &["particulars", "description", "item", "service", "procedure"],
                ),
                role_keywords(
                    FieldRole::Quantity,
                    &["qty", "quantity", "count", "no", "units"],
                ),
                role_keywords(
                    FieldRole::UnitPrice,
                    &["rate", "price", "unit price", "cost", "unit cost"],
                ),
                role_keywords(FieldRole::Amount, &["amount", "total", "value", "charges"]),
            ],
            total_keywords: strings(&[
                "grand total",
                "net payable",
                "amount to pay",
                "total amount",
                "final total",
                "total payable",
                "total",
            ]),
            subtotal_keywords: strings(&[
                "subtotal",
                "sub total",
                "room charges total",
                "consultation charges",
                "pharmacy charges",
                "lab charges",
                "procedure charges",
            ]),
        }
    }
}

impl ExtractionConfig {
    /// Load overrides from TOML. Omitted fields keep their defaults, so a
    /// deployment can pin just the thresholds it cares about.
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_content)?)
    }

    pub fn keywords_for(&self, role: FieldRole) -> Option<&[String]> {
        self.header_keywords
            .iter()
            .find(|rk| rk.role == role)
            .map(|rk| rk.keywords.as_slice())
    }
}

fn role_keywords(role: FieldRole, keywords: &[&str]) -> RoleKeywords {
    RoleKeywords { role, keywords: strings(keywords) }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
