//! Paginated fetch-and-merge for one query stream. [`StreamState`] holds the
//! cursor, items, status and snapshot slot; [`Coordinator`] drives it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::connectivity::Connectivity;
use crate::error::{FetchError, TransportFailure};
use crate::models::ResultPage;

#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch(&self, key: &str, page: u32) -> Result<ResultPage<T>, TransportFailure>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum FetchStatus<T> {
    Idle,
    Loading,
    Success(Vec<T>),
    Error(String),
}

impl<T> FetchStatus<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchStatus::Loading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    Append,
    // Cursor stays put; for unpaginated listings.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: String,
    page: u32,
    generation: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

#[derive(Debug, Clone)]
struct Snapshot<T> {
    query: Option<String>,
    page: u32,
    items: Vec<T>,
    total_results: Option<u32>,
    status: FetchStatus<T>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamView<T> {
    pub query: Option<String>,
    pub page: u32,
    pub total_results: Option<u32>,
    pub has_more: bool,
    pub status: FetchStatus<T>,
}

#[derive(Debug)]
pub struct StreamState<T> {
    policy: MergePolicy,
    query: Option<String>,
    page: u32,
    items: Vec<T>,
    total_results: Option<u32>,
    status: FetchStatus<T>,
    // Bumped whenever in-flight responses must no longer apply.
    generation: u64,
    saved: Option<Snapshot<T>>,
}

impl<T: Clone> StreamState<T> {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            query: None,
            page: 1,
            items: Vec::new(),
            total_results: None,
            status: FetchStatus::Idle,
            generation: 0,
            saved: None,
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn total_results(&self) -> Option<u32> {
        self.total_results
    }

    pub fn status(&self) -> &FetchStatus<T> {
        &self.status
    }

    pub fn has_snapshot(&self) -> bool {
        self.saved.is_some()
    }

    /// Whether another page may exist, going by the last reported total.
    pub fn has_more(&self) -> bool {
        match self.total_results {
            Some(total) => (self.items.len() as u64) < u64::from(total),
            None => true,
        }
    }

    pub fn view(&self) -> StreamView<T> {
        StreamView {
            query: self.query.clone(),
            page: self.page,
            total_results: self.total_results,
            has_more: self.has_more(),
            status: self.status.clone(),
        }
    }

    /// Enter `key`, resetting the stream if the key changed, and issue a fetch
    /// for the current cursor. Returns `None` while a fetch is in flight.
    pub fn begin(&mut self, key: &str) -> Option<FetchTicket> {
        if self.status.is_loading() {
            debug!("Fetch already in flight, ignoring start('{}')", key);
            return None;
        }

        if self.query.as_deref() != Some(key) {
            self.clear();
            self.query = Some(key.to_string());
        }

        Some(self.issue())
    }

    /// Like `begin`, but keeps the current result for `restore_snapshot`
    /// when the key changes. Nothing is snapshotted while a fetch is in flight.
    pub fn begin_transient(&mut self, key: &str) -> Option<FetchTicket> {
        if self.status.is_loading() {
            debug!("Fetch already in flight, ignoring start_transient('{}')", key);
            return None;
        }
        if self.query.is_some() && self.query.as_deref() != Some(key) {
            self.snapshot();
        }
        self.begin(key)
    }

    pub fn begin_next(&mut self) -> Option<FetchTicket> {
        if self.status.is_loading() {
            debug!("Fetch already in flight, ignoring fetch_next()");
            return None;
        }
        if self.query.is_none() {
            debug!("No query started yet, ignoring fetch_next()");
            return None;
        }

        Some(self.issue())
    }

    fn issue(&mut self) -> FetchTicket {
        self.status = FetchStatus::Loading;
        FetchTicket {
            key: self.query.clone().unwrap_or_default(),
            page: self.page,
            generation: self.generation,
        }
    }

    fn clear(&mut self) {
        self.page = 1;
        self.items.clear();
        self.total_results = None;
        self.generation += 1;
    }

    /// Apply the outcome of the fetch identified by `ticket`. Returns `false`
    /// when the response is stale and was discarded.
    pub fn on_fetch_result(
        &mut self,
        ticket: &FetchTicket,
        outcome: Result<ResultPage<T>, FetchError>,
    ) -> bool {
        if ticket.generation != self.generation || self.query.as_deref() != Some(ticket.key()) {
            debug!(
                "Discarding stale response for '{}' page {}",
                ticket.key, ticket.page
            );
            return false;
        }

        match Self::accept(outcome) {
            Ok((items, total_results)) => {
                match self.policy {
                    MergePolicy::Append => {
                        self.items.extend(items);
                        self.page += 1;
                    }
                    MergePolicy::Replace => self.items = items,
                }
                if total_results.is_some() {
                    self.total_results = total_results;
                }
                self.status = FetchStatus::Success(self.items.clone());
            }
            Err(err) => self.status = FetchStatus::Error(err.to_string()),
        }
        true
    }

    fn accept(
        outcome: Result<ResultPage<T>, FetchError>,
    ) -> Result<(Vec<T>, Option<u32>), FetchError> {
        let page = outcome?;
        if !page.success {
            return Err(FetchError::Response(
                page.message.unwrap_or_else(|| "Request failed".to_string()),
            ));
        }
        let items = page.items.ok_or(FetchError::MissingPayload)?;
        Ok((items, page.total_results))
    }

    /// Overwrites any earlier snapshot.
    pub fn snapshot(&mut self) {
        if self.saved.is_some() {
            debug!("Overwriting previous snapshot");
        }
        self.saved = Some(Snapshot {
            query: self.query.clone(),
            page: self.page,
            items: self.items.clone(),
            total_results: self.total_results,
            status: self.status.clone(),
        });
    }

    /// Restore and consume the snapshot. Returns `false` if there was none.
    pub fn restore_snapshot(&mut self) -> bool {
        let Some(saved) = self.saved.take() else {
            return false;
        };

        self.query = saved.query;
        self.page = saved.page;
        self.items = saved.items;
        self.total_results = saved.total_results;
        // Nothing is in flight for the restored result.
        self.status = match saved.status {
            FetchStatus::Loading => FetchStatus::Idle,
            status => status,
        };
        self.generation += 1;
        true
    }

    pub fn reset(&mut self) {
        self.clear();
        self.query = None;
        self.status = FetchStatus::Idle;
    }
}

pub struct Coordinator<T> {
    name: &'static str,
    source: Arc<dyn PageSource<T>>,
    connectivity: Arc<dyn Connectivity>,
    state: Mutex<StreamState<T>>,
    status_tx: watch::Sender<FetchStatus<T>>,
}

impl<T> Coordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        name: &'static str,
        source: Arc<dyn PageSource<T>>,
        connectivity: Arc<dyn Connectivity>,
        policy: MergePolicy,
    ) -> Self {
        let (status_tx, _) = watch::channel(FetchStatus::Idle);
        Self {
            name,
            source,
            connectivity,
            state: Mutex::new(StreamState::new(policy)),
            status_tx,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn status(&self) -> FetchStatus<T> {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchStatus<T>> {
        self.status_tx.subscribe()
    }

    pub async fn view(&self) -> StreamView<T> {
        self.state.lock().await.view()
    }

    pub async fn page(&self) -> u32 {
        self.state.lock().await.page()
    }

    pub async fn query(&self) -> Option<String> {
        self.state.lock().await.query().map(str::to_string)
    }

    pub async fn start(&self, key: &str) -> FetchStatus<T> {
        self.try_start(key).await.unwrap_or_else(|| self.status())
    }

    /// Returns `None` when a fetch was already in flight and nothing was issued.
    pub async fn try_start(&self, key: &str) -> Option<FetchStatus<T>> {
        self.launch(|state| state.begin(key)).await
    }

    pub async fn start_transient(&self, key: &str) -> Option<FetchStatus<T>> {
        self.launch(|state| state.begin_transient(key)).await
    }

    pub async fn fetch_next(&self) -> FetchStatus<T> {
        self.launch(|state| state.begin_next())
            .await
            .unwrap_or_else(|| self.status())
    }

    async fn launch<F>(&self, begin: F) -> Option<FetchStatus<T>>
    where
        F: FnOnce(&mut StreamState<T>) -> Option<FetchTicket>,
    {
        let ticket = {
            let mut state = self.state.lock().await;
            let ticket = begin(&mut *state);
            self.publish(&state);
            ticket
        }?;
        Some(self.run(ticket).await)
    }

    async fn run(&self, ticket: FetchTicket) -> FetchStatus<T> {
        let outcome = if self.connectivity.is_connected().await {
            info!(
                "[{}] Fetching '{}' page {}",
                self.name, ticket.key, ticket.page
            );
            self.source
                .fetch(&ticket.key, ticket.page)
                .await
                .map_err(FetchError::from)
        } else {
            Err(FetchError::NoConnectivity)
        };

        let mut state = self.state.lock().await;
        if state.on_fetch_result(&ticket, outcome) {
            match state.status() {
                FetchStatus::Error(message) => warn!(
                    "[{}] Fetch of '{}' page {} failed: {}",
                    self.name, ticket.key, ticket.page, message
                ),
                _ => info!(
                    "[{}] '{}' now holds {} items",
                    self.name,
                    ticket.key,
                    state.items().len()
                ),
            }
            self.publish(&state);
        }
        state.status().clone()
    }

    pub async fn snapshot(&self) {
        self.state.lock().await.snapshot();
    }

    pub async fn restore_snapshot(&self) -> bool {
        let mut state = self.state.lock().await;
        let restored = state.restore_snapshot();
        if restored {
            self.publish(&state);
        }
        restored
    }

    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.reset();
        self.publish(&state);
    }

    fn publish(&self, state: &StreamState<T>) {
        self.status_tx.send_replace(state.status().clone());
    }
}
