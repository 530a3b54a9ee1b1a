//! List-view coordinator shared by the equipment, users, history and actas
//! lists.
//!
//! A coordinator reconciles pagination, structured filters and a debounced
//! free-text search into a single authoritative request. Browse mode pages on
//! the server through `ListBackend::list`; search mode fetches the whole match
//! set once through `ListBackend::search` and filters and pages it locally.
//!
//! Every dispatched request is tagged with a fetch generation. Results are
//! applied only if their generation is still current, so a slow response for
//! an older query can never overwrite state produced by a newer one.

use std::{
    borrow::Cow,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use shared::protocol::{Filters, ListRequest, ListResult};
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, ClientResult},
    notify::{Notification, Notifier},
};

pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Record accessors needed for client-side filtering and text matching.
pub trait ListItem: Clone + Send + Sync + 'static {
    fn filter_value(&self, key: &str) -> Option<Cow<'_, str>>;

    fn matches_text(&self, _needle: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// The API exposes a dedicated search endpoint.
    Remote,
    /// No search endpoint; the term is matched against the loaded page.
    LocalText,
}

#[async_trait]
pub trait ListBackend: Send + Sync + 'static {
    type Item: ListItem;

    fn entity(&self) -> &str;

    fn filter_keys(&self) -> &[&'static str];

    fn search_strategy(&self) -> SearchStrategy {
        SearchStrategy::Remote
    }

    async fn list(&self, request: &ListRequest) -> ClientResult<ListResult<Self::Item>>;

    async fn search(&self, term: &str) -> ClientResult<Vec<Self::Item>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unknown filter '{key}' for {entity}")]
    UnknownFilter { entity: String, key: String },
    #[error("page size must be greater than zero")]
    ZeroPageSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browse,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: usize,
    pub page_size: usize,
    pub filters: Filters,
    pub search_term: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ListQuery {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 0,
            page_size: page_size.max(1),
            filters: Filters::new(),
            search_term: None,
        }
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_filter_value(key.into(), value.into());
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    fn set_filter_value(&mut self, key: String, value: String) {
        if value.trim().is_empty() {
            self.filters.remove(&key);
        } else {
            self.filters.insert(key, value);
        }
    }

    fn list_request(&self) -> ListRequest {
        ListRequest {
            filters: self.filters.clone(),
            page: self.page,
            page_size: self.page_size,
        }
    }

    fn matches<T: ListItem>(&self, item: &T) -> bool {
        self.filters.iter().all(|(key, expected)| {
            item.filter_value(key)
                .is_some_and(|actual| actual.as_ref() == expected.as_str())
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorState<T> {
    pub mode: Mode,
    pub query: ListQuery,
    pub items: Vec<T>,
    pub total: usize,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl<T> CoordinatorState<T> {
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.query.page_size.max(1))
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub search_debounce: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
        }
    }
}

struct Inner<T> {
    mode: Mode,
    query: ListQuery,
    // Term the current search mode was entered with; `query.search_term`
    // holds the pending, possibly not yet debounced, text.
    committed_term: Option<String>,
    // Browse position to return to if the search that replaced it fails.
    browse_page: usize,
    browse_total: usize,
    items: Vec<T>,
    total: usize,
    loading: bool,
    last_error: Option<String>,
    page_items: Vec<T>,
    search_results: Option<Vec<T>>,
    search_matches: Vec<T>,
    fetch_generation: u64,
    input_generation: u64,
    inflight: Vec<JoinHandle<()>>,
    debounce: Option<JoinHandle<()>>,
    closed: bool,
}

impl<T: ListItem> Inner<T> {
    fn new(query: ListQuery) -> Self {
        Self {
            mode: Mode::Browse,
            query,
            committed_term: None,
            browse_page: 0,
            browse_total: 0,
            items: Vec::new(),
            total: 0,
            loading: false,
            last_error: None,
            page_items: Vec::new(),
            search_results: None,
            search_matches: Vec::new(),
            fetch_generation: 0,
            input_generation: 0,
            inflight: Vec::new(),
            debounce: None,
            closed: false,
        }
    }

    fn snapshot(&self) -> CoordinatorState<T> {
        CoordinatorState {
            mode: self.mode,
            query: self.query.clone(),
            items: self.items.clone(),
            total: self.total,
            loading: self.loading,
            last_error: self.last_error.clone(),
        }
    }

    // Older requests keep running; their responses are dropped on arrival
    // because the generation has moved on.
    fn begin_fetch(&mut self) -> u64 {
        self.inflight.retain(|task| !task.is_finished());
        self.fetch_generation += 1;
        self.loading = true;
        self.fetch_generation
    }

    fn cancel_debounce(&mut self) {
        self.input_generation += 1;
        if let Some(task) = self.debounce.take() {
            task.abort();
        }
    }

    fn enter_browse(&mut self) {
        self.mode = Mode::Browse;
        self.committed_term = None;
        self.search_results = None;
        self.search_matches.clear();
    }

    fn local_matches(&self, term: &str) -> Vec<T> {
        self.page_items
            .iter()
            .filter(|item| item.matches_text(term))
            .cloned()
            .collect()
    }

    fn refilter_search(&mut self) {
        let Some(results) = &self.search_results else {
            return;
        };
        let query = &self.query;
        let matches: Vec<T> = results
            .iter()
            .filter(|item| query.matches(*item))
            .cloned()
            .collect();
        self.search_matches = matches;
        self.total = self.search_matches.len();
        let last_page = self.total.saturating_sub(1) / self.query.page_size.max(1);
        self.query.page = self.query.page.min(last_page);
        self.reslice_search();
    }

    fn reslice_search(&mut self) {
        if self.search_results.is_none() {
            return;
        }
        let len = self.search_matches.len();
        let start = self.query.page.saturating_mul(self.query.page_size).min(len);
        let end = start.saturating_add(self.query.page_size).min(len);
        self.items = self.search_matches[start..end].to_vec();
    }
}

struct Shared<B: ListBackend> {
    backend: B,
    notifier: Arc<dyn Notifier>,
    config: CoordinatorConfig,
    inner: Mutex<Inner<B::Item>>,
    state_tx: watch::Sender<CoordinatorState<B::Item>>,
}

impl<B: ListBackend> Shared<B> {
    fn lock(&self) -> MutexGuard<'_, Inner<B::Item>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner<B::Item>) {
        self.state_tx.send_replace(inner.snapshot());
    }

    fn dispatch_list(self: &Arc<Self>, inner: &mut Inner<B::Item>) {
        let request = inner.query.list_request();
        let generation = inner.begin_fetch();
        debug!(
            entity = self.backend.entity(),
            generation,
            page = request.page,
            page_size = request.page_size,
            filters = ?request.filters,
            "dispatching list request"
        );
        let shared = Arc::clone(self);
        inner.inflight.push(tokio::spawn(async move {
            let result = shared.backend.list(&request).await;
            shared.apply_list(generation, result);
        }));
    }

    fn dispatch_search(self: &Arc<Self>, inner: &mut Inner<B::Item>, term: String) {
        let generation = inner.begin_fetch();
        info!(
            entity = self.backend.entity(),
            generation,
            term = %term,
            "dispatching search request"
        );
        let shared = Arc::clone(self);
        inner.inflight.push(tokio::spawn(async move {
            let result = shared.backend.search(&term).await;
            shared.apply_search(generation, result);
        }));
    }

    fn is_current(&self, inner: &Inner<B::Item>, generation: u64) -> bool {
        if inner.closed || inner.fetch_generation != generation {
            debug!(
                entity = self.backend.entity(),
                generation,
                current = inner.fetch_generation,
                "discarding superseded response"
            );
            return false;
        }
        true
    }

    fn apply_list(&self, generation: u64, result: ClientResult<ListResult<B::Item>>) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if !self.is_current(inner, generation) {
            return;
        }
        inner.loading = false;

        let failure = match result {
            Ok(result) => {
                inner.last_error = None;
                inner.page_items = result.items;
                inner.browse_total = result.total;
                match (inner.mode, self.backend.search_strategy()) {
                    (Mode::Browse, _) => {
                        inner.items = inner.page_items.clone();
                        inner.total = result.total;
                    }
                    (Mode::Search, SearchStrategy::LocalText) => {
                        let term = inner.committed_term.clone().unwrap_or_default();
                        inner.search_results = Some(inner.local_matches(&term));
                        inner.refilter_search();
                    }
                    (Mode::Search, SearchStrategy::Remote) => {}
                }
                debug!(
                    entity = self.backend.entity(),
                    generation,
                    total = inner.total,
                    "list response applied"
                );
                None
            }
            Err(err) => {
                inner.last_error = Some(err.to_string());
                Some(err)
            }
        };

        self.publish(inner);
        drop(guard);
        if let Some(err) = failure {
            self.report_failure(err);
        }
    }

    fn apply_search(&self, generation: u64, result: ClientResult<Vec<B::Item>>) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if !self.is_current(inner, generation) {
            return;
        }
        inner.loading = false;

        let failure = match result {
            Ok(items) => {
                inner.last_error = None;
                let fetched = items.len();
                inner.search_results = Some(items);
                inner.refilter_search();
                debug!(
                    entity = self.backend.entity(),
                    generation,
                    fetched,
                    matched = inner.total,
                    "search response applied"
                );
                None
            }
            Err(err) => {
                inner.last_error = Some(err.to_string());
                if inner.search_results.is_none() {
                    // Nothing cached for this term: fall back to the browse
                    // page the search replaced.
                    if inner.debounce.is_none() {
                        inner.query.search_term = None;
                    }
                    inner.query.page = inner.browse_page;
                    inner.items = inner.page_items.clone();
                    inner.total = inner.browse_total;
                    inner.enter_browse();
                }
                Some(err)
            }
        };

        self.publish(inner);
        drop(guard);
        if let Some(err) = failure {
            self.report_failure(err);
        }
    }

    fn report_failure(&self, err: ClientError) {
        warn!(entity = self.backend.entity(), error = %err, "list fetch failed");
        self.notifier
            .notify(Notification::from_error(self.backend.entity(), &err));
    }

    fn fire_search(self: &Arc<Self>, input_generation: u64) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.closed || inner.input_generation != input_generation {
            return;
        }
        inner.debounce = None;
        if inner.mode == Mode::Browse {
            inner.browse_page = inner.query.page;
        }
        inner.query.page = 0;

        let term = inner.query.search_term.clone().unwrap_or_default();
        if term.trim().is_empty() {
            debug!(entity = self.backend.entity(), "search cleared; back to browse");
            inner.query.search_term = None;
            inner.enter_browse();
            self.dispatch_list(inner);
        } else {
            inner.mode = Mode::Search;
            inner.committed_term = Some(term.clone());
            match self.backend.search_strategy() {
                SearchStrategy::Remote => {
                    inner.search_results = None;
                    self.dispatch_search(inner, term);
                }
                SearchStrategy::LocalText => {
                    inner.search_results = Some(inner.local_matches(&term));
                    inner.refilter_search();
                }
            }
        }
        self.publish(inner);
    }

    fn teardown(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.cancel_debounce();
        for task in inner.inflight.drain(..) {
            task.abort();
        }
        inner.fetch_generation += 1;
        inner.loading = false;
        self.publish(inner);
        debug!(entity = self.backend.entity(), "coordinator torn down");
    }
}

/// Coordinator for one list view. Must be driven from within a Tokio
/// runtime; dropping it cancels the pending debounce and any in-flight
/// request.
pub struct ListCoordinator<B: ListBackend> {
    shared: Arc<Shared<B>>,
}

impl<B: ListBackend> ListCoordinator<B> {
    pub fn new(
        backend: B,
        notifier: Arc<dyn Notifier>,
        config: CoordinatorConfig,
        query: ListQuery,
    ) -> Self {
        let inner = Inner::new(query);
        let (state_tx, _) = watch::channel(inner.snapshot());
        Self {
            shared: Arc::new(Shared {
                backend,
                notifier,
                config,
                inner: Mutex::new(inner),
                state_tx,
            }),
        }
    }

    pub fn entity(&self) -> &str {
        self.shared.backend.entity()
    }

    pub fn state(&self) -> CoordinatorState<B::Item> {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState<B::Item>> {
        self.shared.state_tx.subscribe()
    }

    /// Updates the pending search text. The search itself runs once input has
    /// been quiet for the configured debounce interval.
    pub fn set_search_term(&self, term: impl Into<String>) {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        if inner.closed {
            return;
        }
        inner.cancel_debounce();
        inner.query.search_term = Some(term.into());

        let input_generation = inner.input_generation;
        let delay = self.shared.config.search_debounce;
        let shared = Arc::clone(&self.shared);
        inner.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.fire_search(input_generation);
        }));
        self.shared.publish(inner);
    }

    /// Sets one structured filter; an empty value clears it.
    pub fn set_filter(&self, key: &str, value: impl Into<String>) -> Result<(), QueryError> {
        if !self.shared.backend.filter_keys().iter().any(|k| *k == key) {
            return Err(QueryError::UnknownFilter {
                entity: self.entity().to_string(),
                key: key.to_string(),
            });
        }

        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        if inner.closed {
            return Ok(());
        }
        inner.query.set_filter_value(key.to_string(), value.into());
        inner.query.page = 0;
        match inner.mode {
            Mode::Browse => self.shared.dispatch_list(inner),
            Mode::Search => inner.refilter_search(),
        }
        self.shared.publish(inner);
        Ok(())
    }

    pub fn set_page(&self, page: usize) {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        if inner.closed {
            return;
        }
        inner.query.page = page;
        match inner.mode {
            Mode::Browse => self.shared.dispatch_list(inner),
            Mode::Search => inner.reslice_search(),
        }
        self.shared.publish(inner);
    }

    pub fn set_page_size(&self, page_size: usize) -> Result<(), QueryError> {
        if page_size == 0 {
            return Err(QueryError::ZeroPageSize);
        }

        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        if inner.closed {
            return Ok(());
        }
        inner.query.page_size = page_size;
        inner.query.page = 0;
        match inner.mode {
            Mode::Browse => self.shared.dispatch_list(inner),
            Mode::Search => inner.reslice_search(),
        }
        self.shared.publish(inner);
        Ok(())
    }

    /// Re-issues the request for the current mode without touching the query.
    pub fn refresh(&self) {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        if inner.closed {
            return;
        }
        match (inner.mode, self.shared.backend.search_strategy()) {
            (Mode::Search, SearchStrategy::Remote) => {
                let term = inner.committed_term.clone().unwrap_or_default();
                self.shared.dispatch_search(inner, term);
            }
            _ => self.shared.dispatch_list(inner),
        }
        self.shared.publish(inner);
    }

    pub fn clear_search(&self) {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        if inner.closed {
            return;
        }
        inner.cancel_debounce();
        inner.query.search_term = None;
        inner.enter_browse();
        self.shared.dispatch_list(inner);
        self.shared.publish(inner);
    }

    pub fn teardown(&self) {
        self.shared.teardown();
    }
}

impl<B: ListBackend> Drop for ListCoordinator<B> {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
