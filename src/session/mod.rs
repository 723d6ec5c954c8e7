use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::core::config::{DEFAULT_PAGE_SIZE, DEFAULT_SESSION_TTL_SECS};
use crate::core::row::Row;

#[cfg(test)]
mod tests;

/// One query conversation: the cached result set plus the cursor state needed
/// to serve stable pages of it across requests.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub query: String,
    pub original_query: String,
    pub sql_query: String,
    pub results: Vec<Row>,
    pub total_results: usize,
    pub page_size: usize,
    pub current_page: usize,
    pub is_paginated: bool,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// Partial merge for `SessionStore::update`. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub query: Option<String>,
    pub sql_query: Option<String>,
    pub current_page: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub results: Vec<Row>,
    pub metadata: PageMetadata,
    pub pagination: PaginationFlags,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMetadata {
    pub total_results: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub page_size: usize,
    pub sql_query: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationFlags {
    pub has_more: bool,
    pub has_previous: bool,
}

/// In-memory keyed table of active sessions. A single coarse lock guards the
/// map; no operation awaits or blocks while holding it, so every
/// read-then-write path below is one critical section.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
    page_size: usize,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn create(&self, query: &str) -> String {
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        let session = Session {
            id: id.clone(),
            query: query.to_string(),
            original_query: query.to_string(),
            sql_query: String::new(),
            results: Vec::new(),
            total_results: 0,
            page_size: self.page_size,
            current_page: 1,
            is_paginated: false,
            created_at: now,
            last_accessed: now,
        };
        self.table().insert(id.clone(), session);
        debug!(session_id = %id, "created session");
        id
    }

    /// Returns the session if present and unexpired, refreshing
    /// `last_accessed`. An expired entry is removed here and reported absent.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let mut table = self.table();
        live_entry(&mut table, session_id, self.ttl).map(|session| session.clone())
    }

    pub fn update(&self, session_id: &str, update: SessionUpdate) -> bool {
        let mut table = self.table();
        let Some(session) = live_entry(&mut table, session_id, self.ttl) else {
            return false;
        };
        if let Some(query) = update.query {
            session.query = query;
        }
        if let Some(sql_query) = update.sql_query {
            session.sql_query = sql_query;
        }
        if let Some(current_page) = update.current_page {
            session.current_page = current_page;
        }
        true
    }

    pub fn delete(&self, session_id: &str) -> bool {
        self.table().remove(session_id).is_some()
    }

    pub fn store_results(
        &self,
        session_id: &str,
        rows: Vec<Row>,
        total_results: usize,
        sql_query: &str,
    ) -> bool {
        let mut table = self.table();
        let Some(session) = live_entry(&mut table, session_id, self.ttl) else {
            return false;
        };
        session.results = rows;
        session.total_results = total_results;
        session.sql_query = sql_query.to_string();
        session.is_paginated = total_results > session.page_size;
        true
    }

    /// Serves one page out of the cached results. Absent when the session is
    /// gone, the page is outside `[1, total_pages]`, nothing is stored yet, or
    /// the cache is too short to cover the page; in that last case the caller
    /// must re-fetch upstream rather than receive a short page.
    pub fn get_page(&self, session_id: &str, page: usize) -> Option<PageResult> {
        let mut table = self.table();
        let session = live_entry(&mut table, session_id, self.ttl)?;
        if session.results.is_empty() {
            return None;
        }

        let page_size = session.page_size;
        let total_results = session.total_results;
        let total_pages = total_results.div_ceil(page_size);
        if page < 1 || page > total_pages {
            debug!(session_id, page, total_pages, "page out of range");
            return None;
        }

        let start = (page - 1) * page_size;
        let end = (start + page_size).min(total_results);
        if session.results.len() < end {
            debug!(
                session_id,
                page,
                cached = session.results.len(),
                "cache does not cover requested page"
            );
            return None;
        }

        Some(PageResult {
            results: session.results[start..end].to_vec(),
            metadata: PageMetadata {
                total_results,
                current_page: page,
                total_pages,
                page_size,
                sql_query: session.sql_query.clone(),
            },
            pagination: PaginationFlags {
                has_more: page < total_pages,
                has_previous: page > 1,
            },
        })
    }

    /// Deletes every session idle past the TTL. Advisory: `get` already
    /// self-expires, this just bounds memory between accesses.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, session| now - session.last_accessed <= self.ttl);
        let removed = before - table.len();
        if removed > 0 {
            debug!(removed, "swept expired sessions");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        // A poisoned lock means a panic mid-mutation elsewhere; the map itself
        // is still usable.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Test hook: shift a session's `last_accessed` into the past.
    #[cfg(test)]
    fn backdate(&self, session_id: &str, secs: i64) -> bool {
        let mut table = self.table();
        match table.get_mut(session_id) {
            Some(session) => {
                session.last_accessed -= Duration::seconds(secs);
                true
            }
            None => false,
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL_SECS)
    }
}

fn live_entry<'a>(
    table: &'a mut HashMap<String, Session>,
    session_id: &str,
    ttl: Duration,
) -> Option<&'a mut Session> {
    let now = Utc::now();
    let expired = match table.get(session_id) {
        Some(session) => now - session.last_accessed > ttl,
        None => return None,
    };
    if expired {
        table.remove(session_id);
        debug!(session_id, "session expired");
        return None;
    }
    let session = table.get_mut(session_id)?;
    session.last_accessed = now;
    Some(session)
}
