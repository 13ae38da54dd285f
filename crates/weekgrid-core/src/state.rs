use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info};

use crate::event::{Event, EventId, ResourceKey};
use crate::resource::Resource;
use crate::window::DateRange;

/// Anything that can hand back the events overlapping a range.
pub trait EventSource {
    fn fetch(&self, range: &DateRange) -> anyhow::Result<Vec<Event>>;
}

/// Source with nothing in it, for commands that only show the window.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl EventSource for NoEvents {
    fn fetch(&self, _range: &DateRange) -> anyhow::Result<Vec<Event>> {
        Ok(Vec::new())
    }
}

/// In-memory snapshot; returns the events touching the range.
impl EventSource for [Event] {
    fn fetch(&self, range: &DateRange) -> anyhow::Result<Vec<Event>> {
        Ok(self
            .iter()
            .filter(|event| overlaps(event, range))
            .cloned()
            .collect())
    }
}

/// True when the event touches `range`. Malformed events count by their start.
pub fn overlaps(event: &Event, range: &DateRange) -> bool {
    let end = event.end.max(event.start);
    event.start <= range.end && end >= range.start
}

/// What a dialog was opened on: an empty cell range or an existing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resource: Option<ResourceKey>,
    },
    Event(EventId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    SelectedDate(NaiveDate),
    Events(Vec<Event>),
    Resources(Vec<Resource>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetField(Field),
    OpenDialog(Selection),
    CloseDialog,
    SetLoading(bool),
}

/// Scheduler state. The event snapshot is shared; reducers swap the `Arc`
/// instead of mutating the list.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerState {
    pub selected_date: NaiveDate,
    pub events: Arc<Vec<Event>>,
    pub resources: Vec<Resource>,
    pub dialog: bool,
    pub selection: Option<Selection>,
    pub loading: bool,
}

impl SchedulerState {
    pub fn new(selected_date: NaiveDate) -> Self {
        Self {
            selected_date,
            events: Arc::new(Vec::new()),
            resources: Vec::new(),
            dialog: false,
            selection: None,
            loading: false,
        }
    }

    pub fn selected_event(&self) -> Option<&Event> {
        match &self.selection {
            Some(Selection::Event(id)) => self.events.iter().find(|event| &event.id == id),
            _ => None,
        }
    }
}

/// Returns the next state; `state` is left untouched.
pub fn reduce(state: &SchedulerState, action: Action) -> SchedulerState {
    let mut next = state.clone();
    match action {
        Action::SetField(Field::SelectedDate(date)) => next.selected_date = date,
        Action::SetField(Field::Events(events)) => next.events = Arc::new(events),
        Action::SetField(Field::Resources(resources)) => next.resources = resources,
        Action::OpenDialog(selection) => {
            next.dialog = true;
            next.selection = Some(selection);
        }
        Action::CloseDialog => {
            next.dialog = false;
            next.selection = None;
        }
        Action::SetLoading(loading) => next.loading = loading,
    }
    next
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub range: DateRange,
}

/// Last-write-wins bookkeeping for overlapping fetches.
#[derive(Debug, Default)]
pub struct FetchCoordinator {
    generation: u64,
}

impl FetchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket that supersedes every earlier one.
    pub fn begin(&mut self, range: DateRange) -> FetchTicket {
        self.generation += 1;
        debug!(generation = self.generation, start = %range.start, end = %range.end, "fetch started");
        FetchTicket {
            generation: self.generation,
            range,
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Applies a finished fetch to `state`. Only the latest ticket may write.
    pub fn complete(
        &self,
        ticket: FetchTicket,
        result: anyhow::Result<Vec<Event>>,
        state: &SchedulerState,
    ) -> SchedulerState {
        if !self.is_current(&ticket) {
            debug!(
                generation = ticket.generation,
                current = self.generation,
                "discarding stale fetch result"
            );
            return state.clone();
        }

        match result {
            Ok(events) => {
                info!(generation = ticket.generation, events = events.len(), "fetch applied");
                let next = reduce(state, Action::SetField(Field::Events(events)));
                reduce(&next, Action::SetLoading(false))
            }
            Err(err) => {
                let message = format!("{err:#}");
                error!(generation = ticket.generation, error = %message, "fetch failed");
                reduce(state, Action::SetLoading(false))
            }
        }
    }

    /// Begins a fetch, runs it against `source` and applies the result.
    pub fn refresh<S>(&mut self, source: &S, range: DateRange, state: &SchedulerState) -> SchedulerState
    where
        S: EventSource + ?Sized,
    {
        let ticket = self.begin(range);
        let loading = reduce(state, Action::SetLoading(true));
        let result = source.fetch(&ticket.range);
        self.complete(ticket, result, &loading)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use chrono::TimeZone;

    use super::*;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, d, h, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn range() -> DateRange {
        DateRange {
            start: at(21, 0),
            end: at(27, 23),
        }
    }

    fn state() -> SchedulerState {
        SchedulerState::new(NaiveDate::from_ymd_opt(2022, 3, 23).expect("date"))
    }

    #[test]
    fn reduce_returns_fresh_state() {
        let before = state();
        let after = reduce(
            &before,
            Action::SetField(Field::Events(vec![Event::new("a", at(21, 9), at(21, 10))])),
        );
        assert!(before.events.is_empty());
        assert_eq!(after.events.len(), 1);
        assert!(!Arc::ptr_eq(&before.events, &after.events));
    }

    #[test]
    fn dialog_selection_round_trip() {
        let base = reduce(
            &state(),
            Action::SetField(Field::Events(vec![Event::new("a", at(21, 9), at(21, 10))])),
        );
        let open = reduce(&base, Action::OpenDialog(Selection::Event(EventId::from("a"))));
        assert!(open.dialog);
        assert_eq!(open.selected_event().map(|e| e.id.as_str()), Some("a"));

        let closed = reduce(&open, Action::CloseDialog);
        assert!(!closed.dialog);
        assert!(closed.selection.is_none());
    }

    #[test]
    fn stale_fetch_is_discarded() {
        let mut coordinator = FetchCoordinator::new();
        let first = coordinator.begin(range());
        let second = coordinator.begin(range());

        let base = state();
        let applied = coordinator.complete(
            second,
            Ok(vec![Event::new("new", at(22, 9), at(22, 10))]),
            &base,
        );
        let after_stale = coordinator.complete(
            first,
            Ok(vec![Event::new("old", at(22, 9), at(22, 10))]),
            &applied,
        );
        assert_eq!(after_stale.events.len(), 1);
        assert_eq!(after_stale.events[0].id.as_str(), "new");
    }

    #[test]
    fn failed_fetch_keeps_snapshot_and_clears_loading() {
        let mut coordinator = FetchCoordinator::new();
        let base = reduce(
            &reduce(
                &state(),
                Action::SetField(Field::Events(vec![Event::new("kept", at(21, 9), at(21, 10))])),
            ),
            Action::SetLoading(true),
        );
        let ticket = coordinator.begin(range());
        let next = coordinator.complete(ticket, Err(anyhow!("backend down")), &base);
        assert!(!next.loading);
        assert_eq!(next.events[0].id.as_str(), "kept");
    }
}
