pub mod config;
pub mod models;
pub mod numeric;
pub mod token;

pub use config::{ConfigError, ConfidenceWeights, ExtractionConfig, FieldRole, RoleKeywords};
pub use models::{
    Aggregates, BillData, ExtractionResult, ExtractionStatus, FinalTotal, FraudSignal,
    FraudSignalKind, LineItem, ReconciliationStatus, SubTotal,
};
pub use token::{BBox, Token};
