pub mod columns;
pub mod lines;
pub mod table;

pub use columns::{assign_to_column, detect_columns, ColumnBoundary};
pub use lines::group_into_lines;
pub use table::{ParsedTable, TableRow};
