mod budget;
mod sql_extract;

pub use budget::{format_amount, format_mwk, BudgetCorrector};
pub use sql_extract::{ExtractedSql, SqlExtractor, Strategy};
