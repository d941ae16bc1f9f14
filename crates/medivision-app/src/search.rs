// Search-as-you-type with debounced suggestions.
//
// Each keystroke restarts a debounce timer. When the timer fires, the
// request is spawned as its own task, so cancelling the timer later (a new
// keystroke, a selection) never aborts a request that is already on the
// wire. Responses pass through the request guard and are dropped when a
// newer request under the same key has already resolved.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use medivision_api::{ApiClient, ApiError, RequestGuard, Ticket};
use medivision_core::config::SearchConfig;
use medivision_core::model::MedicineResult;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Guard key for suggestion lookups.
pub const SUGGESTIONS_KEY: &str = "suggestions";

/// Guard key for submitted full searches.
pub const FULL_SEARCH_KEY: &str = "full-search";

// ---------------------------------------------------------------------------
// Search backend
// ---------------------------------------------------------------------------

/// Text search port. Implemented by `ApiClient`; tests plug in fakes.
#[async_trait]
pub trait MedicineSearch: Send + Sync {
    async fn search(&self, term: &str) -> Result<Vec<MedicineResult>, ApiError>;
}

#[async_trait]
impl MedicineSearch for ApiClient {
    async fn search(&self, term: &str) -> Result<Vec<MedicineResult>, ApiError> {
        self.search_medicines(term).await
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    /// Input went blank; hide the suggestion list.
    Cleared,
    Suggestions {
        term: String,
        results: Vec<MedicineResult>,
    },
    SuggestionsFailed {
        term: String,
        error: ApiError,
    },
    /// A suggestion was picked; forward it to the detail view.
    Selected(MedicineResult),
    Results {
        term: String,
        results: Vec<MedicineResult>,
    },
    SearchFailed {
        term: String,
        error: ApiError,
    },
}

// ---------------------------------------------------------------------------
// SuggestionController
// ---------------------------------------------------------------------------

pub struct SuggestionController {
    backend: Arc<dyn MedicineSearch>,
    guard: Arc<RequestGuard>,
    debounce: Duration,
    max_suggestions: usize,
    events: mpsc::Sender<SearchEvent>,
    pending: Option<JoinHandle<()>>,
    /// Input value produced by picking a suggestion; the next input equal to
    /// it does not start a lookup.
    suppressed: Option<String>,
}

impl SuggestionController {
    pub fn new(
        backend: Arc<dyn MedicineSearch>,
        guard: Arc<RequestGuard>,
        config: &SearchConfig,
        events: mpsc::Sender<SearchEvent>,
    ) -> Self {
        Self {
            backend,
            guard,
            debounce: config.debounce(),
            max_suggestions: config.max_suggestions,
            events,
            pending: None,
            suppressed: None,
        }
    }

    /// Whether a debounce timer is armed and has not fired yet.
    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Feed the current contents of the search box.
    pub async fn input(&mut self, text: &str) {
        self.cancel_pending();

        if self.suppressed.take().is_some_and(|s| s == text) {
            debug!("Skipping lookup for selected suggestion {:?}", text);
            return;
        }

        let term = text.trim();
        if term.is_empty() {
            self.guard.invalidate(SUGGESTIONS_KEY);
            self.emit(SearchEvent::Cleared).await;
            return;
        }

        let term = term.to_string();
        let backend = Arc::clone(&self.backend);
        let guard = Arc::clone(&self.guard);
        let events = self.events.clone();
        let debounce = self.debounce;
        let max = self.max_suggestions;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let ticket = guard.begin(SUGGESTIONS_KEY);
            tokio::spawn(fetch_suggestions(backend, guard, ticket, term, max, events));
        }));
    }

    /// Pick a suggestion. Drops the pending timer and any lookup still in
    /// flight, then forwards the record.
    pub async fn select(&mut self, record: MedicineResult) {
        self.cancel_pending();
        self.guard.invalidate(SUGGESTIONS_KEY);
        self.suppressed = Some(record.name.clone());
        info!("Selected suggestion {} ({})", record.name, record.id);
        self.emit(SearchEvent::Selected(record)).await;
    }

    /// Run a full search for `text` right away, bypassing the debounce
    /// window and the suggestion list.
    pub fn submit(&mut self, text: &str) -> Option<JoinHandle<()>> {
        self.cancel_pending();
        self.guard.invalidate(SUGGESTIONS_KEY);

        let term = text.trim();
        if term.is_empty() {
            return None;
        }
        let term = term.to_string();
        let backend = Arc::clone(&self.backend);
        let guard = Arc::clone(&self.guard);
        let events = self.events.clone();
        let ticket = guard.begin(FULL_SEARCH_KEY);

        Some(tokio::spawn(async move {
            let result = backend.search(&term).await;
            if !guard.accept(&ticket) {
                return;
            }
            let event = match result {
                Ok(results) => SearchEvent::Results { term, results },
                Err(error) => SearchEvent::SearchFailed { term, error },
            };
            send_event(&events, event).await;
        }))
    }

    async fn emit(&self, event: SearchEvent) {
        send_event(&self.events, event).await;
    }
}

impl Drop for SuggestionController {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

async fn fetch_suggestions(
    backend: Arc<dyn MedicineSearch>,
    guard: Arc<RequestGuard>,
    ticket: Ticket,
    term: String,
    max: usize,
    events: mpsc::Sender<SearchEvent>,
) {
    debug!("Suggestion lookup for {:?} (gen: {})", term, ticket.generation());
    let result = backend.search(&term).await;
    if !guard.accept(&ticket) {
        return;
    }
    let event = match result {
        Ok(mut results) => {
            results.truncate(max);
            SearchEvent::Suggestions { term, results }
        }
        Err(error) => {
            warn!("Suggestion lookup for {:?} failed: {}", term, error);
            SearchEvent::SuggestionsFailed { term, error }
        }
    };
    send_event(&events, event).await;
}

async fn send_event(events: &mpsc::Sender<SearchEvent>, event: SearchEvent) {
    if events.send(event).await.is_err() {
        debug!("Search event receiver dropped");
    }
}

// ---------------------------------------------------------------------------
// SuggestionView
// ---------------------------------------------------------------------------

/// What the search screen shows, folded from `SearchEvent`s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionView {
    pub suggestions: Vec<MedicineResult>,
    pub visible: bool,
    pub results: Option<Vec<MedicineResult>>,
    pub selected: Option<MedicineResult>,
    pub error: Option<String>,
}

impl SuggestionView {
    pub fn apply(&mut self, event: SearchEvent) {
        match event {
            SearchEvent::Cleared => {
                self.suggestions.clear();
                self.visible = false;
            }
            SearchEvent::Suggestions { results, .. } => {
                self.visible = !results.is_empty();
                self.suggestions = results;
                self.error = None;
            }
            SearchEvent::SuggestionsFailed { .. } => {
                // Suggestions are best-effort; keep whatever is shown.
            }
            SearchEvent::Selected(record) => {
                self.suggestions.clear();
                self.visible = false;
                self.selected = Some(record);
            }
            SearchEvent::Results { results, .. } => {
                self.suggestions.clear();
                self.visible = false;
                self.results = Some(results);
                self.error = None;
            }
            SearchEvent::SearchFailed { error, .. } => {
                self.error = Some(error.to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
