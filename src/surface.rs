//! Quote-of-the-day widget host
//!
//! Widgets never fetch on their own: they render whatever the cache holds
//! and re-render when the refresh job announces a new quote.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{QuoteCache, StoreError};
use crate::data::{Quote, DEFAULT_AUTHOR};
use crate::schedule::Scheduler;

/// Body shown while no quote has been cached yet
pub const PLACEHOLDER_BODY: &str = "Loading...";

/// Identifier of a placed widget instance
pub type WidgetId = u32;

/// Errors from pushing a quote to the widget
#[derive(Debug, Error)]
pub enum WidgetError {
    /// The pushed quote had no id or no body
    #[error("invalid quote arguments: missing id/body")]
    InvalidArgs,

    /// The quote could not be written to the cache
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Text content of one rendered widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetView {
    pub body: String,
    pub author_line: String,
}

impl WidgetView {
    /// Renders the cached quote, or the loading placeholder
    pub fn render(quote: Option<&Quote>) -> Self {
        let body = quote.map_or(PLACEHOLDER_BODY, Quote::body);
        let author = quote.map_or(DEFAULT_AUTHOR, Quote::author);
        Self {
            body: body.to_string(),
            author_line: format!("– {}", author),
        }
    }
}

impl std::fmt::Display for WidgetView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n{}", self.body, self.author_line)
    }
}

/// Receives rendered widget views
pub trait WidgetRenderer: Send + Sync {
    fn render(&self, id: WidgetId, view: &WidgetView);
}

/// Hosts the placed widgets and wires them to the scheduler
pub struct WidgetHost {
    cache: QuoteCache,
    scheduler: Option<Arc<Scheduler>>,
    renderer: Arc<dyn WidgetRenderer>,
    widgets: Mutex<BTreeSet<WidgetId>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl WidgetHost {
    pub fn new(scheduler: Arc<Scheduler>, renderer: Arc<dyn WidgetRenderer>) -> Arc<Self> {
        let cache = scheduler.job().cache().clone();
        Self::build(cache, Some(scheduler), renderer)
    }

    /// A host that only renders and accepts pushed quotes, with no refresh schedule
    pub fn offline(cache: QuoteCache, renderer: Arc<dyn WidgetRenderer>) -> Arc<Self> {
        Self::build(cache, None, renderer)
    }

    fn build(
        cache: QuoteCache,
        scheduler: Option<Arc<Scheduler>>,
        renderer: Arc<dyn WidgetRenderer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            cache,
            scheduler,
            renderer,
            widgets: Mutex::new(BTreeSet::new()),
            listener: Mutex::new(None),
        })
    }

    /// Registers a placed widget
    pub fn add_widget(&self, id: WidgetId) {
        self.widgets().insert(id);
    }

    /// Forgets a removed widget
    pub fn remove_widget(&self, id: WidgetId) {
        self.widgets().remove(&id);
    }

    /// Ids of every registered widget, in ascending order
    pub fn widget_ids(&self) -> Vec<WidgetId> {
        self.widgets().iter().copied().collect()
    }

    /// The first widget was placed: refresh now and keep refreshing daily
    pub fn on_enabled(&self) {
        let Some(scheduler) = &self.scheduler else {
            debug!("no refresh schedule, widget stays on cached quote");
            return;
        };
        scheduler.enqueue_periodic();
        scheduler.enqueue_immediate();
    }

    /// Renders the requested widgets from the cache without fetching
    pub fn on_update_requested(&self, ids: &[WidgetId]) {
        let view = WidgetView::render(self.cache.load().as_ref());
        for &id in ids {
            self.renderer.render(id, &view);
        }
        if let Some(scheduler) = &self.scheduler {
            scheduler.enqueue_periodic();
        }
    }

    /// Re-renders every registered widget from the cache
    pub fn update_all(&self) {
        let ids = self.widget_ids();
        debug!(count = ids.len(), "updating all widgets");
        let view = WidgetView::render(self.cache.load().as_ref());
        for id in ids {
            self.renderer.render(id, &view);
        }
    }

    /// Stores a quote pushed by the app and re-renders every widget
    ///
    /// Fields are trimmed; a blank author falls back to the default.
    pub fn update_quote_of_day(&self, id: &str, body: &str, author: &str) -> Result<(), WidgetError> {
        let quote = Quote::new(id, body, Some(author)).ok_or(WidgetError::InvalidArgs)?;
        self.cache.save(&quote)?;
        self.update_all();
        Ok(())
    }

    /// Re-renders all widgets whenever the refresh job stores a new quote
    pub fn listen_for_changes(self: &Arc<Self>) {
        let Some(scheduler) = &self.scheduler else {
            return;
        };
        let mut rx = scheduler.job().subscribe();
        // The task must not keep the host (and with it the scheduler) alive.
        let host: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed quote change notifications");
                    }
                    Err(RecvError::Closed) => break,
                }
                let Some(host) = host.upgrade() else {
                    break;
                };
                host.update_all();
            }
        });

        let mut slot = self.listener.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Stops the change listener and every scheduled refresh
    pub fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().unwrap_or_else(|p| p.into_inner()).take() {
            handle.abort();
        }
        if let Some(scheduler) = &self.scheduler {
            scheduler.shutdown();
        }
    }

    fn widgets(&self) -> std::sync::MutexGuard<'_, BTreeSet<WidgetId>> {
        self.widgets.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for WidgetHost {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.lock().unwrap_or_else(|p| p.into_inner()).take() {
            handle.abort();
        }
    }
}

/// Prints rendered widgets to stdout
#[derive(Debug, Default)]
pub struct StdoutRenderer;

impl WidgetRenderer for StdoutRenderer {
    fn render(&self, id: WidgetId, view: &WidgetView) {
        println!("[widget {}]\n{}\n", id, view);
    }
}
