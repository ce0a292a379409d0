//! Cursor-based "load more" protocol shared by list screens.
//!
//! A [`PaginatedFetchController`] owns the accumulated rows of one list and
//! guarantees at most one page request in flight. Repeated scroll-threshold
//! events that call [`load_next`](PaginatedFetchController::load_next) while a
//! page is loading are silently skipped.
//!
//! Page results that land after [`reset`](PaginatedFetchController::reset) or
//! [`dispose`](PaginatedFetchController::dispose) are dropped without touching
//! state, since no in-flight request can be cancelled.

use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use sitelog_core::{
    FetchPage, LoadingGuard, LoadingSignal, NoLoadingSignal, OPERATOR_ID_KEY, PageRequest,
    PageRows, SessionStore,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::{Transport, TransportError};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("server rejected page request: {0}")]
    Rejected(String),
    #[error("page response carried no data")]
    MissingData,
    #[error("page rows did not decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Where list pages come from.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch(&self, request: &PageRequest) -> Result<Vec<T>, FetchError>;
}

/// [`PageSource`] that POSTs a [`PageRequest`] to a list endpoint.
pub struct TransportPageSource<T> {
    transport: Arc<dyn Transport>,
    path: String,
    _rows: PhantomData<fn() -> T>,
}

impl<T> TransportPageSource<T> {
    pub fn new(transport: Arc<dyn Transport>, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
            _rows: PhantomData,
        }
    }
}

#[async_trait]
impl<T> PageSource<T> for TransportPageSource<T>
where
    T: DeserializeOwned + Send,
{
    async fn fetch(&self, request: &PageRequest) -> Result<Vec<T>, FetchError> {
        let body = serde_json::to_value(request)?;
        let resp = self.transport.post(&self.path, &body).await?;
        if !resp.success {
            return Err(FetchError::Rejected(resp.message));
        }
        let data = resp.data.ok_or(FetchError::MissingData)?;
        let rows: PageRows<T> = serde_json::from_value(data)?;
        Ok(rows.into_items())
    }
}

/// Snapshot of a controller's state.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub cursor: usize,
    pub has_more: bool,
    pub is_loading: bool,
    pub items: Vec<T>,
    pub search: String,
}

impl<T> FetchState<T> {
    fn fresh(search: String) -> Self {
        Self {
            cursor: 0,
            has_more: true,
            is_loading: false,
            items: Vec::new(),
            search,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A page is already in flight.
    InFlight,
    /// The last page was short; the list is complete.
    Exhausted,
    /// The owning screen is gone.
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and appended.
    Loaded { count: usize, has_more: bool },
    /// The call was a no-op.
    Skipped(SkipReason),
    /// The page arrived after a reset or disposal and was dropped.
    Discarded,
}

struct Inner<T> {
    state: FetchState<T>,
    /// Bumped on every reset; a page fetched under an older generation is stale.
    generation: u64,
}

/// Clears `is_loading` for a load that never settled (its future was dropped
/// or the source panicked), unless a reset already started a new generation.
struct PendingPage<'a, T> {
    inner: &'a Mutex<Inner<T>>,
    generation: u64,
    settled: bool,
}

impl<T> Drop for PendingPage<'_, T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.generation == self.generation && inner.state.is_loading {
            inner.state.is_loading = false;
            debug!(generation = self.generation, "abandoned page load released");
        }
    }
}

pub struct PaginatedFetchController<T> {
    source: Arc<dyn PageSource<T>>,
    loading: Arc<dyn LoadingSignal>,
    page_size: NonZeroUsize,
    me_id: Option<String>,
    inner: Mutex<Inner<T>>,
    alive: CancellationToken,
}

impl<T: Send> PaginatedFetchController<T> {
    pub fn new(source: Arc<dyn PageSource<T>>, page_size: NonZeroUsize) -> Self {
        Self {
            source,
            loading: Arc::new(NoLoadingSignal),
            page_size,
            me_id: None,
            inner: Mutex::new(Inner {
                state: FetchState::fresh(String::new()),
                generation: 0,
            }),
            alive: CancellationToken::new(),
        }
    }

    pub fn with_loading(mut self, loading: Arc<dyn LoadingSignal>) -> Self {
        self.loading = loading;
        self
    }

    /// Read the operator id sent as `meId` with every page request.
    pub fn with_session(mut self, session: &dyn SessionStore) -> Self {
        self.me_id = session.get(OPERATOR_ID_KEY);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size.get()
    }

    /// Clear rows and rewind to the first page. Any page still in flight will
    /// be discarded when it lands.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let search = std::mem::take(&mut inner.state.search);
        inner.state = FetchState::fresh(search);
        debug!(generation = inner.generation, "list reset");
    }

    /// Replace the search term and start over from the first page.
    pub fn set_search(&self, term: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.state = FetchState::fresh(term.into());
        debug!(generation = inner.generation, search = %inner.state.search, "list search changed");
    }

    /// Reset, then fetch the first page.
    pub async fn refresh(&self) -> Result<LoadOutcome, FetchError> {
        self.reset();
        self.load_next().await
    }

    /// Fetch the next window and append it.
    ///
    /// A no-op while a page is in flight or once the list is exhausted. On
    /// failure, cursor, rows and `has_more` are left as they were so the next
    /// call retries the same window.
    pub async fn load_next(&self) -> Result<LoadOutcome, FetchError> {
        let (request, generation) = {
            let mut inner = self.inner.lock();
            if self.alive.is_cancelled() {
                return Ok(LoadOutcome::Skipped(SkipReason::Disposed));
            }
            if inner.state.is_loading {
                debug!(cursor = inner.state.cursor, "page already in flight, skipping");
                return Ok(LoadOutcome::Skipped(SkipReason::InFlight));
            }
            if !inner.state.has_more {
                return Ok(LoadOutcome::Skipped(SkipReason::Exhausted));
            }
            inner.state.is_loading = true;
            let request = PageRequest {
                start: inner.state.cursor,
                length: self.page_size.get(),
                search: inner.state.search.clone(),
                me_id: self.me_id.clone(),
            };
            (request, inner.generation)
        };
        let mut pending = PendingPage {
            inner: &self.inner,
            generation,
            settled: false,
        };

        let result = {
            let _loading = LoadingGuard::show(self.loading.as_ref());
            self.source.fetch(&request).await
        };

        let mut inner = self.inner.lock();
        pending.settled = true;
        if self.alive.is_cancelled() || inner.generation != generation {
            debug!(start = request.start, "discarding stale page");
            return Ok(LoadOutcome::Discarded);
        }
        inner.state.is_loading = false;

        match result {
            Ok(items) => {
                let page = FetchPage::new(request.start, self.page_size.get(), items);
                let count = page.items.len();
                inner.state.cursor = page.next_cursor();
                inner.state.has_more = page.has_more;
                inner.state.items.extend(page.items);
                info!(
                    start = request.start,
                    count,
                    has_more = page.has_more,
                    total = inner.state.items.len(),
                    "page loaded"
                );
                Ok(LoadOutcome::Loaded {
                    count,
                    has_more: page.has_more,
                })
            }
            Err(e) => {
                warn!(start = request.start, error = %e, "page load failed");
                Err(e)
            }
        }
    }

    /// Mark the owning screen as gone. Later loads are skipped and in-flight
    /// results are dropped.
    pub fn dispose(&self) {
        self.alive.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.alive.is_cancelled()
    }

    pub fn cursor(&self) -> usize {
        self.inner.lock().state.cursor
    }

    pub fn has_more(&self) -> bool {
        self.inner.lock().state.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().state.is_loading
    }

    pub fn len(&self) -> usize {
        self.inner.lock().state.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send> PaginatedFetchController<T> {
    pub fn snapshot(&self) -> FetchState<T> {
        self.inner.lock().state.clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.inner.lock().state.items.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::{Value, json};
    use sitelog_core::{ApiResponse, MemorySession};
    use tokio::sync::Notify;

    /// Pages served in order; each fetch yields to the executor first so
    /// concurrent callers interleave.
    #[derive(Default)]
    struct ScriptedSource {
        pages: Mutex<VecDeque<Result<Vec<u32>, String>>>,
        requests: Mutex<Vec<PageRequest>>,
        calls: AtomicUsize,
        hold: Option<Arc<Notify>>,
    }

    impl ScriptedSource {
        fn pages(pages: Vec<Result<Vec<u32>, String>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                ..Default::default()
            }
        }

        fn held(mut self, hold: Arc<Notify>) -> Self {
            self.hold = Some(hold);
            self
        }
    }

    #[async_trait]
    impl PageSource<u32> for ScriptedSource {
        async fn fetch(&self, request: &PageRequest) -> Result<Vec<u32>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().push(request.clone());
            match &self.hold {
                Some(hold) => hold.notified().await,
                None => tokio::task::yield_now().await,
            }
            let next = self.pages.lock().pop_front().unwrap_or(Ok(Vec::new()));
            next.map_err(FetchError::Rejected)
        }
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn controller(source: Arc<ScriptedSource>, page_size: usize) -> PaginatedFetchController<u32> {
        PaginatedFetchController::new(source, size(page_size))
    }

    #[tokio::test]
    async fn full_then_short_page_exhausts_list() {
        let source = Arc::new(ScriptedSource::pages(vec![
            Ok((0..10).collect()),
            Ok((10..14).collect()),
        ]));
        let ctrl = controller(source.clone(), 10);

        let first = ctrl.load_next().await.unwrap();
        assert_eq!(first, LoadOutcome::Loaded { count: 10, has_more: true });
        let second = ctrl.load_next().await.unwrap();
        assert_eq!(second, LoadOutcome::Loaded { count: 4, has_more: false });

        assert_eq!(ctrl.len(), 14);
        assert!(!ctrl.has_more());
        assert_eq!(ctrl.cursor(), 20);
        assert_eq!(ctrl.items(), (0..14).collect::<Vec<_>>());

        let starts: Vec<usize> = source.requests.lock().iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![0, 10]);
    }

    #[tokio::test]
    async fn exhausted_list_does_not_fetch_again() {
        let source = Arc::new(ScriptedSource::pages(vec![Ok(vec![1, 2])]));
        let ctrl = controller(source.clone(), 5);

        ctrl.load_next().await.unwrap();
        let again = ctrl.load_next().await.unwrap();

        assert_eq!(again, LoadOutcome::Skipped(SkipReason::Exhausted));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn same_tick_calls_issue_one_request() {
        let source = Arc::new(ScriptedSource::pages(vec![Ok((0..5).collect())]));
        let ctrl = controller(source.clone(), 5);

        let (a, b, c) = futures::join!(ctrl.load_next(), ctrl.load_next(), ctrl.load_next());

        assert_eq!(a.unwrap(), LoadOutcome::Loaded { count: 5, has_more: true });
        assert_eq!(b.unwrap(), LoadOutcome::Skipped(SkipReason::InFlight));
        assert_eq!(c.unwrap(), LoadOutcome::Skipped(SkipReason::InFlight));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctrl.len(), 5);
    }

    #[tokio::test]
    async fn is_loading_spans_the_request() {
        let hold = Arc::new(Notify::new());
        let source = Arc::new(ScriptedSource::pages(vec![Ok(vec![1])]).held(hold.clone()));
        let ctrl = controller(source, 3);

        let observe = async {
            tokio::task::yield_now().await;
            let during = ctrl.is_loading();
            hold.notify_one();
            during
        };
        let (loaded, during) = futures::join!(ctrl.load_next(), observe);

        assert!(loaded.is_ok());
        assert!(during);
        assert!(!ctrl.is_loading());
    }

    #[tokio::test]
    async fn failed_page_rolls_back_and_retries_same_window() {
        let source = Arc::new(ScriptedSource::pages(vec![
            Ok((0..3).collect()),
            Err("gateway timeout".into()),
            Ok((3..6).collect()),
        ]));
        let ctrl = controller(source.clone(), 3);

        ctrl.load_next().await.unwrap();
        let before = ctrl.snapshot();

        let err = ctrl.load_next().await.unwrap_err();
        assert!(matches!(err, FetchError::Rejected(ref m) if m == "gateway timeout"));
        assert_eq!(ctrl.snapshot(), before);
        assert!(!ctrl.is_loading());

        ctrl.load_next().await.unwrap();
        let starts: Vec<usize> = source.requests.lock().iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![0, 3, 3]);
        assert_eq!(ctrl.items(), (0..6).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn reset_restores_initial_state() {
        let source = Arc::new(ScriptedSource::pages(vec![Ok(vec![7, 8])]));
        let ctrl = controller(source, 4);
        ctrl.load_next().await.unwrap();
        assert!(!ctrl.has_more());

        ctrl.reset();

        let state = ctrl.snapshot();
        assert!(state.items.is_empty());
        assert_eq!(state.cursor, 0);
        assert!(state.has_more);
        assert!(!state.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_load_releases_in_flight_flag() {
        let hold = Arc::new(Notify::new());
        let source =
            Arc::new(ScriptedSource::pages(vec![Ok(vec![1, 2, 3])]).held(hold.clone()));
        let ctrl = controller(source.clone(), 3);

        let abandoned = tokio::time::timeout(Duration::from_secs(1), ctrl.load_next()).await;
        assert!(abandoned.is_err());
        assert!(!ctrl.is_loading());

        hold.notify_one();
        assert_eq!(
            ctrl.load_next().await.unwrap(),
            LoadOutcome::Loaded { count: 3, has_more: true }
        );
        let starts: Vec<usize> = source.requests.lock().iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![0, 0]);
    }

    #[tokio::test]
    async fn abandoned_load_does_not_clear_newer_generation() {
        let hold = Arc::new(Notify::new());
        let source =
            Arc::new(ScriptedSource::pages(vec![Ok(vec![7, 8, 9])]).held(hold.clone()));
        let ctrl = controller(source.clone(), 3);

        let mut stale = Box::pin(ctrl.load_next());
        assert!(futures::poll!(&mut stale).is_pending());
        ctrl.reset();
        let mut fresh = Box::pin(ctrl.load_next());
        assert!(futures::poll!(&mut fresh).is_pending());

        drop(stale);
        assert!(ctrl.is_loading());
        assert_eq!(
            ctrl.load_next().await.unwrap(),
            LoadOutcome::Skipped(SkipReason::InFlight)
        );

        hold.notify_one();
        assert_eq!(
            fresh.await.unwrap(),
            LoadOutcome::Loaded { count: 3, has_more: true }
        );
        assert_eq!(ctrl.items(), vec![7, 8, 9]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn page_landing_after_reset_is_discarded() {
        let hold = Arc::new(Notify::new());
        let source =
            Arc::new(ScriptedSource::pages(vec![Ok(vec![1, 2, 3])]).held(hold.clone()));
        let ctrl = controller(source, 3);

        let interrupt = async {
            tokio::task::yield_now().await;
            ctrl.reset();
            hold.notify_one();
        };
        let (outcome, ()) = futures::join!(ctrl.load_next(), interrupt);

        assert_eq!(outcome.unwrap(), LoadOutcome::Discarded);
        assert!(ctrl.is_empty());
        assert_eq!(ctrl.cursor(), 0);
        assert!(!ctrl.is_loading());
    }

    #[tokio::test]
    async fn disposed_controller_ignores_results_and_skips_loads() {
        let hold = Arc::new(Notify::new());
        let source = Arc::new(ScriptedSource::pages(vec![Ok(vec![1])]).held(hold.clone()));
        let ctrl = controller(source.clone(), 3);

        let teardown = async {
            tokio::task::yield_now().await;
            ctrl.dispose();
            hold.notify_one();
        };
        let (outcome, ()) = futures::join!(ctrl.load_next(), teardown);

        assert_eq!(outcome.unwrap(), LoadOutcome::Discarded);
        assert!(ctrl.is_empty());
        assert_eq!(
            ctrl.load_next().await.unwrap(),
            LoadOutcome::Skipped(SkipReason::Disposed)
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn search_and_me_id_are_sent() {
        let session = MemorySession::new().with(OPERATOR_ID_KEY, "op-9");
        let source = Arc::new(ScriptedSource::pages(vec![Ok(vec![1]), Ok(vec![2])]));
        let ctrl = controller(source.clone(), 2).with_session(&session);

        ctrl.load_next().await.unwrap();
        ctrl.set_search("scaffold");
        assert!(ctrl.is_empty());
        ctrl.load_next().await.unwrap();

        let requests = source.requests.lock();
        assert_eq!(requests[0].search, "");
        assert_eq!(requests[1].search, "scaffold");
        assert_eq!(requests[1].start, 0);
        assert!(requests.iter().all(|r| r.me_id.as_deref() == Some("op-9")));
    }

    #[tokio::test]
    async fn refresh_reloads_first_page() {
        let source = Arc::new(ScriptedSource::pages(vec![Ok(vec![1, 2]), Ok(vec![3, 4])]));
        let ctrl = controller(source, 2);
        ctrl.load_next().await.unwrap();

        ctrl.refresh().await.unwrap();

        assert_eq!(ctrl.items(), vec![3, 4]);
        assert_eq!(ctrl.cursor(), 2);
    }

    #[tokio::test]
    async fn loading_signal_wraps_each_fetch() {
        #[derive(Default)]
        struct Counter {
            shown: AtomicUsize,
            hidden: AtomicUsize,
        }
        impl LoadingSignal for Counter {
            fn show(&self) {
                self.shown.fetch_add(1, Ordering::SeqCst);
            }
            fn hide(&self) {
                self.hidden.fetch_add(1, Ordering::SeqCst);
            }
        }

        let signal = Arc::new(Counter::default());
        let source = Arc::new(ScriptedSource::pages(vec![Ok(vec![1, 2]), Err("boom".into())]));
        let ctrl = controller(source, 2).with_loading(signal.clone());

        ctrl.load_next().await.unwrap();
        ctrl.load_next().await.unwrap_err();

        assert_eq!(signal.shown.load(Ordering::SeqCst), 2);
        assert_eq!(signal.hidden.load(Ordering::SeqCst), 2);
    }

    struct CannedTransport {
        response: ApiResponse,
        bodies: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn get(&self, _path: &str) -> Result<ApiResponse, TransportError> {
            Err(TransportError::Other("unexpected GET".into()))
        }
        async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, TransportError> {
            self.bodies.lock().push((path.to_string(), body.clone()));
            Ok(self.response.clone())
        }
        async fn put(&self, _path: &str, _body: &Value) -> Result<ApiResponse, TransportError> {
            Err(TransportError::Other("unexpected PUT".into()))
        }
    }

    #[tokio::test]
    async fn transport_source_posts_request_and_unwraps_rows() {
        let transport = Arc::new(CannedTransport {
            response: ApiResponse::ok("").with_data(json!({"data": [{"id": 1}, {"id": 2}]})),
            bodies: Mutex::new(Vec::new()),
        });
        let source: TransportPageSource<Value> =
            TransportPageSource::new(transport.clone(), "/workers/list");
        let request = PageRequest {
            start: 0,
            length: 10,
            search: String::new(),
            me_id: Some("op-1".into()),
        };

        let rows = source.fetch(&request).await.unwrap();

        assert_eq!(rows.len(), 2);
        let bodies = transport.bodies.lock();
        assert_eq!(bodies[0].0, "/workers/list");
        assert_eq!(bodies[0].1["meId"], "op-1");
        assert_eq!(bodies[0].1["length"], 10);
    }

    #[tokio::test]
    async fn transport_source_surfaces_rejection() {
        let transport = Arc::new(CannedTransport {
            response: ApiResponse::failed("not allowed"),
            bodies: Mutex::new(Vec::new()),
        });
        let source: TransportPageSource<Value> = TransportPageSource::new(transport, "/x");
        let request = PageRequest {
            start: 0,
            length: 1,
            search: String::new(),
            me_id: None,
        };

        let err = source.fetch(&request).await.unwrap_err();
        assert!(matches!(err, FetchError::Rejected(ref m) if m == "not allowed"));
    }
}
