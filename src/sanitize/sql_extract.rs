use regex::Regex;
use tracing::{debug, warn};

use crate::core::config::CANONICAL_TABLE;

/// Which rule in the fallback chain produced the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Full `SELECT ... ;` statement matched in place.
    Structured,
    /// Coarse scan from the first `SELECT` token to an end marker.
    Scan,
    /// No `SELECT` anywhere; the fixed default query was substituted.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct ExtractedSql {
    pub sql: String,
    pub strategy: Strategy,
}

/// Pulls one executable SQL statement out of free-form model output.
///
/// The rules run in order and the first match wins; the chain is total and
/// degrades to a fixed default query, so extraction itself never fails.
pub struct SqlExtractor {
    table: String,
    fence: Regex,
    statement: Regex,
    select_token: Regex,
    table_name: Regex,
}

/// Everything after one of these, relative to the `SELECT` token, is prose.
const END_MARKERS: &[&str] = &["\n\n", "```", "\"\"\""];

impl SqlExtractor {
    pub fn new() -> Self {
        Self::for_table(CANONICAL_TABLE)
    }

    pub fn for_table(table: &str) -> Self {
        let fence = Regex::new(r"(?s)```(?:sql)?(.*?)```").expect("fence pattern");
        // Anchored on the terminating `;` so the lazy clause groups cannot
        // cut the statement short.
        let statement = Regex::new(
            r"(?is)\bSELECT\s+.+?\s+FROM\s+.+?(?:\s+WHERE\s+.+?)?(?:\s+GROUP\s+BY\s+.+?)?(?:\s+ORDER\s+BY\s+.+?)?(?:\s+LIMIT\s+\d+)?\s*;",
        )
        .expect("statement pattern");
        let select_token = Regex::new(r"(?i)\bSELECT\b").expect("select pattern");
        let table_name = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(table)))
            .expect("table pattern");
        Self {
            table: table.to_string(),
            fence,
            statement,
            select_token,
            table_name,
        }
    }

    pub fn extract(&self, text: &str) -> ExtractedSql {
        let unfenced = self.fence.replace_all(text, "$1");

        if let Some(sql) = self.match_statement(&unfenced) {
            debug!(strategy = "structured", sql = %sql, "extracted SQL statement");
            return ExtractedSql {
                sql,
                strategy: Strategy::Structured,
            };
        }

        if let Some(sql) = self.scan_select(&unfenced) {
            debug!(strategy = "scan", sql = %sql, "extracted SQL statement");
            return ExtractedSql {
                sql,
                strategy: Strategy::Scan,
            };
        }

        warn!("no SELECT found in model output, using default query");
        ExtractedSql {
            sql: self.default_query(),
            strategy: Strategy::Fallback,
        }
    }

    /// Always-valid query used when the model output holds no SQL at all.
    pub fn default_query(&self) -> String {
        format!(
            "SELECT projectname, district, projectsector, budget FROM {} LIMIT 10;",
            self.table
        )
    }

    fn match_statement(&self, text: &str) -> Option<String> {
        self.statement
            .find(text)
            .map(|m| self.finalize(m.as_str()))
    }

    fn scan_select(&self, text: &str) -> Option<String> {
        let start = self.select_token.find(text)?.start();
        let tail = &text[start..];
        let mut end = tail.len();
        for marker in END_MARKERS {
            if let Some(pos) = tail.find(marker) {
                end = end.min(pos);
            }
        }
        Some(self.finalize(&tail[..end]))
    }

    /// Shared cleanup for every rule: trim, restore the canonical table
    /// casing, terminate with a semicolon.
    fn finalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let mut sql = self
            .table_name
            .replace_all(trimmed, self.table.as_str())
            .into_owned();
        if !sql.ends_with(';') {
            sql.push(';');
        }
        sql
    }
}

impl Default for SqlExtractor {
    fn default() -> Self {
        Self::new()
    }
}
