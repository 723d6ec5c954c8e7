use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use super::*;
use crate::core::error::{LlmError, StorageError};
use crate::core::executor::{QueryExecutor, QueryOutput};
use crate::core::generator::SqlGenerator;
use crate::core::row::{get_f64, Row};

struct FixedGenerator {
    text: String,
}

#[async_trait]
impl SqlGenerator for FixedGenerator {
    async fn complete(&self, _question: &str) -> Result<String, LlmError> {
        Ok(self.text.clone())
    }
}

struct RecordingExecutor {
    rows: Vec<Row>,
    seen: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    fn with_rows(rows: Vec<Row>) -> Arc<Self> {
        Arc::new(Self {
            rows,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn executed(&self) -> Vec<String> {
        self.seen.lock().expect("seen").clone()
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryOutput, StorageError> {
        self.seen.lock().expect("seen").push(sql.to_string());
        Ok(QueryOutput {
            rows: self.rows.clone(),
            total_rows: self.rows.len(),
        })
    }
}

fn project_rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|n| {
            json!({
                "projectname": format!("Project {n}"),
                "district": "Lilongwe",
                "budget": 50_000_000.0,
            })
            .as_object()
            .cloned()
            .expect("object")
        })
        .collect()
}

fn pipeline_with(
    generator_text: &str,
    executor: Arc<RecordingExecutor>,
) -> (QueryPipeline, Arc<SessionStore>) {
    let sessions = Arc::new(SessionStore::default());
    let pipeline = QueryPipeline::new(
        Arc::new(FixedGenerator {
            text: generator_text.to_string(),
        }),
        executor,
        Arc::new(BudgetCorrector::new()),
        sessions.clone(),
    );
    (pipeline, sessions)
}

const FENCED_SQL: &str =
    "```sql\nSELECT * FROM proj_dashboard WHERE district = 'Lilongwe';\n```";

#[tokio::test]
async fn test_ask_creates_session_and_serves_first_page() {
    let executor = RecordingExecutor::with_rows(project_rows(25));
    let (pipeline, _sessions) = pipeline_with(FENCED_SQL, executor.clone());

    let answer = pipeline.ask("projects in Lilongwe", None).await.expect("answer");
    assert!(answer.answer.contains("Found 25 projects"));
    assert!(answer.answer.contains("Showing the first 10 results"));
    assert_eq!(
        answer.sql_query,
        "SELECT * FROM PROJ_DASHBOARD WHERE district = 'Lilongwe';"
    );

    let page = answer.page.expect("first page");
    assert_eq!(page.results.len(), 10);
    assert_eq!(page.metadata.total_pages, 3);
    assert!(page.pagination.has_more);
    assert!(!page.pagination.has_previous);
}

#[tokio::test]
async fn test_pagination_across_turns() {
    let executor = RecordingExecutor::with_rows(project_rows(25));
    let (pipeline, _sessions) = pipeline_with(FENCED_SQL, executor);

    let answer = pipeline.ask("projects in Lilongwe", None).await.expect("answer");
    let id = answer.session_id;

    let last = pipeline.get_page(&id, 3).expect("page 3");
    assert_eq!(last.results.len(), 5);
    assert!(!last.pagination.has_more);

    let err = pipeline.get_page(&id, 4).expect_err("out of range");
    assert!(matches!(
        err,
        QueryError::Session(SessionError::PageOutOfRange { page: 4, .. })
    ));

    let err = pipeline.get_page("no-such-session", 1).expect_err("absent");
    assert!(matches!(
        err,
        QueryError::Session(SessionError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_prose_without_sql_runs_default_query() {
    let executor = RecordingExecutor::with_rows(project_rows(2));
    let (pipeline, _sessions) =
        pipeline_with("I'm not able to answer that question.", executor.clone());

    pipeline.ask("hello there", None).await.expect("answer");

    let executed = executor.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0],
        "SELECT projectname, district, projectsector, budget FROM PROJ_DASHBOARD LIMIT 10;"
    );
}

#[tokio::test]
async fn test_inflated_budgets_corrected_before_caching() {
    let liwera =
        "Construction of a Maternity Block and 1no. Staff house at Liwera Health Centre";
    let rows = vec![json!({
        "projectname": liwera,
        "district": "Mangochi",
        "budget": 1_950_000_000.0,
    })
    .as_object()
    .cloned()
    .expect("object")];
    let executor = RecordingExecutor::with_rows(rows);
    let (pipeline, _sessions) = pipeline_with(FENCED_SQL, executor);

    let answer = pipeline.ask("liwera budget", None).await.expect("answer");
    let page = answer.page.expect("page");
    assert_eq!(get_f64(&page.results[0], "budget"), Some(195_000_000.0));
}

#[tokio::test]
async fn test_follow_up_reuses_session() {
    let executor = RecordingExecutor::with_rows(project_rows(3));
    let (pipeline, sessions) = pipeline_with(FENCED_SQL, executor);

    let first = pipeline.ask("projects in Lilongwe", None).await.expect("first");
    let second = pipeline
        .ask("only the health ones", Some(&first.session_id))
        .await
        .expect("second");

    assert_eq!(first.session_id, second.session_id);
    let session = sessions.get(&first.session_id).expect("session");
    assert_eq!(session.original_query, "projects in Lilongwe");
    assert_eq!(session.query, "only the health ones");
}

#[tokio::test]
async fn test_ask_with_stale_session_id_starts_fresh() {
    let executor = RecordingExecutor::with_rows(project_rows(1));
    let (pipeline, _sessions) = pipeline_with(FENCED_SQL, executor);

    let answer = pipeline
        .ask("projects in Lilongwe", Some("expired-or-bogus"))
        .await
        .expect("answer");
    assert_ne!(answer.session_id, "expired-or-bogus");
    assert!(answer.page.is_some());
}

#[tokio::test]
async fn test_empty_result_set_answer() {
    let executor = RecordingExecutor::with_rows(Vec::new());
    let (pipeline, _sessions) = pipeline_with(FENCED_SQL, executor);

    let answer = pipeline.ask("projects on the moon", None).await.expect("answer");
    assert_eq!(answer.answer, "No projects found matching your query.");
    assert!(answer.page.is_none());
}
