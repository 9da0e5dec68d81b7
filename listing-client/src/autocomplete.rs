//! Debounced address autocomplete with a keyboard-driven prediction list.
//!
//! Every keystroke resets the debounce timer. Once input settles, one request
//! is issued and tagged with a sequence number; a response is only applied if
//! no newer request has been issued since (last request wins).

use crate::{
    api::{AddressPrediction, ListingApi},
    notify::{Notice, Notifier},
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const SUGGESTIONS_FAILED: &str = "Failed to load address suggestions";

#[derive(Debug, Clone, Copy)]
pub struct AutocompleteConfig {
    pub debounce: Duration,
    pub min_chars: usize,
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            min_chars: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutocompleteSnapshot {
    pub input: String,
    pub predictions: Vec<AddressPrediction>,
    pub visible: bool,
    /// `None` is the "nothing highlighted" position.
    pub cursor: Option<usize>,
    pub loading: bool,
}

#[derive(Debug, Default)]
struct State {
    input: String,
    predictions: Vec<AddressPrediction>,
    visible: bool,
    cursor: Option<usize>,
    loading: bool,
    /// Sequence number of the newest issued request. Bumping it without
    /// issuing a request invalidates everything in flight.
    latest: u64,
}

impl State {
    fn clear_list(&mut self) {
        self.predictions.clear();
        self.visible = false;
        self.cursor = None;
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Must be driven from within a tokio runtime; text changes spawn the
/// debounce timer.
pub struct AddressAutocomplete {
    api: Arc<dyn ListingApi>,
    notifier: Arc<dyn Notifier>,
    config: AutocompleteConfig,
    state: Arc<Mutex<State>>,
    debounce: Mutex<Option<JoinHandle<()>>>,
}

impl AddressAutocomplete {
    pub fn new(
        api: Arc<dyn ListingApi>,
        notifier: Arc<dyn Notifier>,
        config: AutocompleteConfig,
    ) -> Self {
        Self {
            api,
            notifier,
            config,
            state: Arc::new(Mutex::new(State::default())),
            debounce: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> AutocompleteSnapshot {
        let state = lock(&self.state);
        AutocompleteSnapshot {
            input: state.input.clone(),
            predictions: state.predictions.clone(),
            visible: state.visible,
            cursor: state.cursor,
            loading: state.loading,
        }
    }

    pub fn input(&self) -> String {
        lock(&self.state).input.clone()
    }

    fn cancel_debounce(&self) {
        let mut pending = self
            .debounce
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    }

    /// Text change from the user.
    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.cancel_debounce();

        let long_enough = text.trim().chars().count() >= self.config.min_chars;
        {
            let mut state = lock(&self.state);
            state.input = text.clone();
            state.cursor = None;
            if !long_enough {
                state.clear_list();
                state.loading = false;
                state.latest += 1;
                return;
            }
        }

        let api = self.api.clone();
        let notifier = self.notifier.clone();
        let state = self.state.clone();
        let delay = self.config.debounce;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let seq = {
                let mut state = lock(&state);
                state.latest += 1;
                state.loading = true;
                state.latest
            };

            // The request outlives later keystrokes; staleness is decided by `seq`.
            tokio::spawn(async move {
                let result = api.autocomplete(&text).await;
                let mut state = lock(&state);
                if state.latest != seq {
                    tracing::debug!(seq, latest = state.latest, "Discarding stale predictions");
                    return;
                }
                state.loading = false;
                match result {
                    Ok(predictions) => {
                        state.visible = !predictions.is_empty();
                        state.predictions = predictions;
                        state.cursor = None;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Autocomplete request failed");
                        state.clear_list();
                        drop(state);
                        notifier.notify(Notice::Error(SUGGESTIONS_FAILED.to_string()));
                    }
                }
            });
        });

        let mut pending = self
            .debounce
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *pending = Some(handle);
    }

    /// Returns the committed prediction when `Enter` selects one.
    pub fn handle_key(&self, key: Key) -> Option<AddressPrediction> {
        let index = {
            let mut state = lock(&self.state);
            if !state.visible || state.predictions.is_empty() {
                return None;
            }
            let last = state.predictions.len() - 1;
            match key {
                Key::ArrowDown => {
                    state.cursor = Some(state.cursor.map_or(0, |i| (i + 1).min(last)));
                    return None;
                }
                Key::ArrowUp => {
                    state.cursor = state.cursor.and_then(|i| i.checked_sub(1));
                    return None;
                }
                Key::Escape => {
                    state.visible = false;
                    state.cursor = None;
                    return None;
                }
                Key::Enter => state.cursor?,
            }
        };
        self.select(index)
    }

    /// Commits the prediction at `index`: the input takes its description and
    /// the list closes. No request is issued for the committed text.
    pub fn select(&self, index: usize) -> Option<AddressPrediction> {
        self.cancel_debounce();
        let mut state = lock(&self.state);
        let prediction = state.predictions.get(index).cloned()?;
        state.input = prediction.description.clone();
        state.clear_list();
        state.loading = false;
        state.latest += 1;
        Some(prediction)
    }

    pub fn click_outside(&self) {
        lock(&self.state).visible = false;
    }

    pub fn focus(&self) {
        let mut state = lock(&self.state);
        state.visible = !state.predictions.is_empty();
    }
}

impl Drop for AddressAutocomplete {
    fn drop(&mut self) {
        self.cancel_debounce();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::testing::{backend_error, prediction, FakeApi};

    fn widget(api: &Arc<FakeApi>, notifier: &Arc<RecordingNotifier>) -> AddressAutocomplete {
        AddressAutocomplete::new(api.clone(), notifier.clone(), AutocompleteConfig::default())
    }

    async fn wait(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn with_predictions(api: &Arc<FakeApi>, widget: &AddressAutocomplete, n: usize) {
        let predictions = (0..n).map(|i| prediction(&format!("{i}00 Main St"))).collect();
        api.reply_autocomplete(Duration::ZERO, Ok(predictions));
        widget.set_input("Main");
        wait(400).await;
    }

    #[tokio::test(start_paused = true)]
    async fn short_input_issues_no_request() {
        let api = Arc::new(FakeApi::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let widget = widget(&api, &notifier);

        widget.set_input("1");
        widget.set_input("12");
        widget.set_input("  12  ");
        wait(1000).await;

        assert_eq!(api.autocomplete_count(), 0);
        assert!(!widget.snapshot().visible);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_keystrokes_issue_one_request() {
        let api = Arc::new(FakeApi::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let widget = widget(&api, &notifier);

        for text in ["123", "123 ", "123 M", "123 Ma", "123 Mai"] {
            widget.set_input(text);
            wait(100).await;
        }
        assert_eq!(api.autocomplete_count(), 0);

        wait(400).await;
        assert_eq!(
            api.autocomplete_inputs.lock().unwrap().clone(),
            vec!["123 Mai".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn latest_request_wins_over_slower_earlier_one() {
        let api = Arc::new(FakeApi::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let widget = widget(&api, &notifier);

        api.reply_autocomplete(
            Duration::from_millis(500),
            Ok(vec![prediction("first response")]),
        );
        api.reply_autocomplete(
            Duration::from_millis(10),
            Ok(vec![prediction("second response")]),
        );

        widget.set_input("123 M");
        wait(350).await;
        widget.set_input("123 Ma");
        wait(1000).await;

        assert_eq!(api.autocomplete_count(), 2);
        let snapshot = widget.snapshot();
        assert_eq!(snapshot.predictions, vec![prediction("second response")]);
        assert!(snapshot.visible);
        assert!(!snapshot.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_clears_list_and_notifies_once() {
        let api = Arc::new(FakeApi::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let widget = widget(&api, &notifier);
        with_predictions(&api, &widget, 2).await;

        api.reply_autocomplete(Duration::ZERO, Err(backend_error("Places API error: DENIED")));
        widget.set_input("Main S");
        wait(400).await;

        let snapshot = widget.snapshot();
        assert!(snapshot.predictions.is_empty());
        assert!(!snapshot.visible);
        assert_eq!(snapshot.input, "Main S");
        assert_eq!(notifier.errors(), vec![SUGGESTIONS_FAILED.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cursor_is_bounded() {
        let api = Arc::new(FakeApi::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let widget = widget(&api, &notifier);
        with_predictions(&api, &widget, 3).await;

        widget.handle_key(Key::ArrowUp);
        assert_eq!(widget.snapshot().cursor, None);

        for _ in 0..5 {
            widget.handle_key(Key::ArrowDown);
        }
        assert_eq!(widget.snapshot().cursor, Some(2));

        for _ in 0..5 {
            widget.handle_key(Key::ArrowUp);
        }
        assert_eq!(widget.snapshot().cursor, None);
        assert_eq!(widget.handle_key(Key::Enter), None);
    }

    #[tokio::test(start_paused = true)]
    async fn enter_commits_without_new_request() {
        let api = Arc::new(FakeApi::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let widget = widget(&api, &notifier);
        with_predictions(&api, &widget, 3).await;

        widget.handle_key(Key::ArrowDown);
        widget.handle_key(Key::ArrowDown);
        let committed = widget.handle_key(Key::Enter).unwrap();
        wait(1000).await;

        assert_eq!(committed.description, "100 Main St");
        let snapshot = widget.snapshot();
        assert_eq!(snapshot.input, "100 Main St");
        assert!(snapshot.predictions.is_empty());
        assert!(!snapshot.visible);
        assert_eq!(snapshot.cursor, None);
        assert_eq!(api.autocomplete_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn escape_hides_and_focus_reshows() {
        let api = Arc::new(FakeApi::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let widget = widget(&api, &notifier);
        with_predictions(&api, &widget, 2).await;

        widget.handle_key(Key::ArrowDown);
        widget.handle_key(Key::Escape);
        let snapshot = widget.snapshot();
        assert!(!snapshot.visible);
        assert_eq!(snapshot.input, "Main");

        // ignored while hidden
        widget.handle_key(Key::ArrowDown);
        assert_eq!(widget.handle_key(Key::Enter), None);
        assert_eq!(widget.snapshot().cursor, None);

        widget.focus();
        assert!(widget.snapshot().visible);
        widget.click_outside();
        assert!(!widget.snapshot().visible);
    }

    #[tokio::test(start_paused = true)]
    async fn commit_discards_in_flight_response() {
        let api = Arc::new(FakeApi::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let widget = widget(&api, &notifier);
        with_predictions(&api, &widget, 2).await;

        api.reply_autocomplete(Duration::from_millis(500), Ok(vec![prediction("late")]));
        widget.set_input("Main St");
        wait(350).await;
        let committed = widget.select(1).unwrap();
        wait(1000).await;

        let snapshot = widget.snapshot();
        assert_eq!(snapshot.input, committed.description);
        assert!(snapshot.predictions.is_empty());
        assert!(!snapshot.visible);
    }
}
