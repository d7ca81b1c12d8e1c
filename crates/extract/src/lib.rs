pub mod classify;
pub mod fraud;
pub mod items;
pub mod pipeline;

pub use classify::{classify_page, classify_pages, PageType};
pub use fraud::FraudDetector;
pub use items::LineItemExtractor;
pub use pipeline::{BillExtractor, MockTokenSource, TokenSet, TokenSource, TokenSourceError};
