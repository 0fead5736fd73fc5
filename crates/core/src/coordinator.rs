use crate::domain::analysis::StockAnalysis;
use crate::flows;
use crate::flows::analysis::StockAnalysisRequest;
use crate::flows::prompts::PromptSuggestionRequest;
use crate::flows::search::SearchSuggestionRequest;
use crate::llm::{ModelCallError, ModelCaller};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Search is only issued once the term is longer than one character.
pub const MIN_SEARCH_LEN: usize = 2;

/// Segment label passed to the prompt suggester. Still a constant rather
/// than a value derived from the selected stock; see DESIGN.md.
pub const DEFAULT_STOCK_SEGMENT: &str = "Technology";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// Toast stand-in: renders transient user feedback on requester failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, title: &str, message: &str);
}

/// Notifier that routes feedback through the log.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, title: &str, message: &str) {
        match severity {
            Severity::Info => tracing::info!(title, "{message}"),
            Severity::Error => tracing::warn!(title, "{message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingFlags {
    pub search: bool,
    pub analysis: bool,
    pub prompts: bool,
}

/// Per-session view model. Rebuilt from scratch each session; never persisted.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub search_term: String,
    pub suggestions: Vec<String>,
    pub selected_stock: Option<String>,
    pub analysis: Option<StockAnalysis>,
    pub prompt_suggestions: Vec<String>,
    pub loading: LoadingFlags,
}

enum Event {
    InputChanged(String),
    StockSelected { ticker: String },
    PromptReused { prompt: String },
    DebounceElapsed { generation: u64, term: String },
    SearchResolved { generation: u64, result: Result<Vec<String>, ModelCallError> },
    AnalysisResolved { generation: u64, result: Result<StockAnalysis, ModelCallError> },
    PromptsResolved { generation: u64, result: Result<Vec<String>, ModelCallError> },
}

/// Drives user input through debounced search, stock selection and prompt
/// reuse. A single task owns the `ViewState`; callers observe it through a
/// watch channel, so there is exactly one mutator.
pub struct Coordinator {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<ViewState>,
    task: JoinHandle<()>,
}

impl Coordinator {
    pub fn spawn(
        caller: Arc<dyn ModelCaller>,
        notifier: Arc<dyn Notifier>,
        debounce: Duration,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ViewState::default());

        let inner = CoordinatorTask {
            caller,
            notifier,
            debounce,
            state: ViewState::default(),
            state_tx,
            events_tx: events_tx.clone(),
            search_generation: 0,
            select_generation: 0,
            debounce_timer: None,
        };
        let task = tokio::spawn(inner.run(events_rx));

        Self {
            events: events_tx,
            state: state_rx,
            task,
        }
    }

    pub fn input_changed(&self, text: impl Into<String>) {
        let _ = self.events.send(Event::InputChanged(text.into()));
    }

    pub fn select_stock(&self, ticker: impl Into<String>) {
        let _ = self.events.send(Event::StockSelected {
            ticker: ticker.into(),
        });
    }

    /// Re-issues analysis for the currently selected stock. No-op when
    /// nothing is selected.
    pub fn reuse_prompt(&self, prompt: impl Into<String>) {
        let _ = self.events.send(Event::PromptReused {
            prompt: prompt.into(),
        });
    }

    pub fn view(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.state.clone()
    }

    pub fn shutdown(self) {
        drop(self.events);
        self.task.abort();
    }
}

struct CoordinatorTask {
    caller: Arc<dyn ModelCaller>,
    notifier: Arc<dyn Notifier>,
    debounce: Duration,
    state: ViewState,
    state_tx: watch::Sender<ViewState>,
    events_tx: mpsc::UnboundedSender<Event>,

    // Generation ids captured at issue time. A resolution whose generation
    // no longer matches is stale and must not touch state: last-issued wins.
    search_generation: u64,
    select_generation: u64,

    // Single-slot debounce timer; a new keystroke replaces it.
    debounce_timer: Option<JoinHandle<()>>,
}

impl CoordinatorTask {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
            let _ = self.state_tx.send(self.state.clone());
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::InputChanged(text) => self.on_input_changed(text),
            Event::StockSelected { ticker } => self.on_stock_selected(ticker),
            Event::PromptReused { prompt } => self.on_prompt_reused(prompt),
            Event::DebounceElapsed { generation, term } => {
                self.on_debounce_elapsed(generation, term)
            }
            Event::SearchResolved { generation, result } => {
                self.on_search_resolved(generation, result)
            }
            Event::AnalysisResolved { generation, result } => {
                self.on_analysis_resolved(generation, result)
            }
            Event::PromptsResolved { generation, result } => {
                self.on_prompts_resolved(generation, result)
            }
        }
    }

    fn cancel_debounce(&mut self) {
        if let Some(timer) = self.debounce_timer.take() {
            timer.abort();
        }
    }

    fn on_input_changed(&mut self, text: String) {
        self.state.search_term = text.clone();
        self.state.selected_stock = None;
        self.state.analysis = None;

        self.cancel_debounce();
        self.search_generation += 1;

        if text.chars().count() >= MIN_SEARCH_LEN {
            self.state.loading.search = true;
            let generation = self.search_generation;
            let delay = self.debounce;
            let events = self.events_tx.clone();
            self.debounce_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = events.send(Event::DebounceElapsed { generation, term: text });
            }));
        } else {
            self.state.suggestions.clear();
            // No request can resolve for this generation anymore.
            self.state.loading.search = false;
        }
    }

    fn on_debounce_elapsed(&mut self, generation: u64, term: String) {
        // A timer that lost the abort race still carries a stale generation.
        if generation != self.search_generation {
            return;
        }
        self.debounce_timer = None;

        let request = match SearchSuggestionRequest::try_new(term) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(error = %err, "invalid search term reached debounce");
                self.state.loading.search = false;
                return;
            }
        };

        let caller = Arc::clone(&self.caller);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = flows::search::suggest(caller.as_ref(), &request).await;
            let _ = events.send(Event::SearchResolved { generation, result });
        });
    }

    fn on_search_resolved(
        &mut self,
        generation: u64,
        result: Result<Vec<String>, ModelCallError>,
    ) {
        if generation != self.search_generation {
            return;
        }
        self.state.loading.search = false;
        match result {
            Ok(suggestions) => self.state.suggestions = suggestions,
            Err(err) => {
                tracing::error!(error = %err, "search suggestion request failed");
                self.notifier.notify(
                    Severity::Error,
                    "Error",
                    "Could not fetch search suggestions.",
                );
                self.state.suggestions.clear();
            }
        }
    }

    fn on_stock_selected(&mut self, ticker: String) {
        let Ok(analysis_request) = StockAnalysisRequest::try_new(ticker.clone()) else {
            tracing::warn!("ignoring selection of blank ticker");
            return;
        };

        self.cancel_debounce();
        self.search_generation += 1;
        self.select_generation += 1;
        let generation = self.select_generation;

        self.state.search_term = ticker.clone();
        self.state.selected_stock = Some(ticker);
        self.state.suggestions.clear();
        self.state.analysis = None;
        self.state.loading = LoadingFlags {
            search: false,
            analysis: true,
            prompts: true,
        };

        let caller = Arc::clone(&self.caller);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = flows::analysis::analyze(caller.as_ref(), &analysis_request).await;
            let _ = events.send(Event::AnalysisResolved { generation, result });
        });

        let prompt_request = match PromptSuggestionRequest::try_new(DEFAULT_STOCK_SEGMENT) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(error = %err, "invalid stock segment");
                self.state.loading.prompts = false;
                return;
            }
        };
        let caller = Arc::clone(&self.caller);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = flows::prompts::suggest(caller.as_ref(), &prompt_request).await;
            let _ = events.send(Event::PromptsResolved { generation, result });
        });
    }

    fn on_prompt_reused(&mut self, prompt: String) {
        let Some(ticker) = self.state.selected_stock.clone() else {
            return;
        };
        tracing::debug!(%prompt, %ticker, "re-running analysis from suggested prompt");
        self.on_stock_selected(ticker);
    }

    fn on_analysis_resolved(
        &mut self,
        generation: u64,
        result: Result<StockAnalysis, ModelCallError>,
    ) {
        if generation != self.select_generation {
            return;
        }
        self.state.loading.analysis = false;
        match result {
            Ok(analysis) => self.state.analysis = Some(analysis),
            Err(err) => {
                tracing::error!(error = %err, "stock analysis request failed");
                self.notifier.notify(
                    Severity::Error,
                    "Analysis Failed",
                    "Could not perform AI analysis for this stock.",
                );
                self.state.analysis = None;
            }
        }
    }

    fn on_prompts_resolved(
        &mut self,
        generation: u64,
        result: Result<Vec<String>, ModelCallError>,
    ) {
        if generation != self.select_generation {
            return;
        }
        self.state.loading.prompts = false;
        match result {
            Ok(suggestions) => self.state.prompt_suggestions = suggestions,
            Err(err) => {
                tracing::error!(error = %err, "prompt suggestion request failed");
                self.notifier.notify(
                    Severity::Error,
                    "Error",
                    "Could not fetch prompt suggestions.",
                );
                self.state.prompt_suggestions.clear();
            }
        }
    }
}
