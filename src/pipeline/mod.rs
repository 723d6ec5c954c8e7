use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::core::error::{QueryError, SessionError};
use crate::core::executor::QueryExecutor;
use crate::core::generator::SqlGenerator;
use crate::sanitize::{BudgetCorrector, SqlExtractor, Strategy};
use crate::session::{PageResult, SessionStore, SessionUpdate};

#[cfg(test)]
mod tests;

/// Everything the caller needs from one answered question.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub session_id: String,
    pub answer: String,
    pub sql_query: String,
    pub page: Option<PageResult>,
}

/// Composition root: text -> extracted SQL -> executed rows -> corrected
/// rows -> cached session -> paginated slice.
pub struct QueryPipeline {
    generator: Arc<dyn SqlGenerator>,
    executor: Arc<dyn QueryExecutor>,
    extractor: SqlExtractor,
    corrector: Arc<BudgetCorrector>,
    sessions: Arc<SessionStore>,
}

impl QueryPipeline {
    pub fn new(
        generator: Arc<dyn SqlGenerator>,
        executor: Arc<dyn QueryExecutor>,
        corrector: Arc<BudgetCorrector>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            generator,
            executor,
            extractor: SqlExtractor::new(),
            corrector,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answers a question, caching the full result set under a session.
    /// Passing a live `session_id` makes this a follow-up: the session is
    /// reused and its `query` refined while `original_query` stays put.
    pub async fn ask(
        &self,
        question: &str,
        session_id: Option<&str>,
    ) -> Result<QueryAnswer, QueryError> {
        let session_id = match session_id {
            Some(id) if self.sessions.get(id).is_some() => {
                self.sessions.update(
                    id,
                    SessionUpdate {
                        query: Some(question.to_string()),
                        ..Default::default()
                    },
                );
                id.to_string()
            }
            _ => self.sessions.create(question),
        };

        let raw = self.generator.complete(question).await?;
        let extracted = self.extractor.extract(&raw);
        if extracted.strategy == Strategy::Fallback {
            info!(session_id = %session_id, "model output held no SQL, used default query");
        }

        let output = self.executor.execute(&extracted.sql).await?;
        let total = output.total_rows;
        let mut rows = output.rows;
        self.corrector.correct_rows(&mut rows);

        if !self
            .sessions
            .store_results(&session_id, rows, total, &extracted.sql)
        {
            // The session can only vanish here if it expired mid-request.
            return Err(SessionError::NotFound(session_id).into());
        }
        debug!(session_id = %session_id, total, "stored query results");

        let page = self.sessions.get_page(&session_id, 1);
        let answer = self.corrector.correct_text(&answer_text(total, page.as_ref()));

        Ok(QueryAnswer {
            session_id,
            answer,
            sql_query: extracted.sql,
            page,
        })
    }

    /// Serves a further page of a previously answered question.
    pub fn get_page(&self, session_id: &str, page: usize) -> Result<PageResult, QueryError> {
        if let Some(result) = self.sessions.get_page(session_id, page) {
            // Informational cursor only; page fetches stay stateless.
            self.sessions.update(
                session_id,
                SessionUpdate {
                    current_page: Some(page),
                    ..Default::default()
                },
            );
            return Ok(result);
        }
        if self.sessions.get(session_id).is_none() {
            Err(SessionError::NotFound(session_id.to_string()).into())
        } else {
            Err(SessionError::PageOutOfRange {
                session_id: session_id.to_string(),
                page,
            }
            .into())
        }
    }
}

fn answer_text(total: usize, page: Option<&PageResult>) -> String {
    match page {
        None => "No projects found matching your query.".to_string(),
        Some(page) => {
            let mut text = format!("Found {total} projects matching your query.");
            if page.pagination.has_more {
                text.push_str(&format!(
                    " Showing the first {} results.",
                    page.results.len()
                ));
            }
            text
        }
    }
}
