//! Refresh cycle state machine.
//!
//! ```text
//!   Idle --start--> Scheduled --tick--> Fetching --data--> Aggregating
//!    ^                  ^                                      |
//!    |                  +------- auto-refresh on --- Published <+
//!    +------------------------- auto-refresh off ------+
//! ```
//!
//! The machine is synchronous and owns no I/O: the worker asks it what to do
//! next and performs the timer and fetch side effects itself.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Scheduled,
    Fetching,
    Aggregating,
    Published,
}

/// Outcome of a manual refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshAction {
    /// Fetch `sequence` now; `cancelled` is the fetch that must be aborted.
    Fetch { sequence: u64, cancelled: Option<u64> },
    /// Runs as soon as the current cycle completes.
    Queued,
}

/// How a completed fetch relates to what has been published so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// The in-flight cycle; the machine is now `Aggregating`.
    Current,
    /// Newer than the published book but older than the in-flight fetch.
    /// May be published, does not move the machine.
    Superseded,
    /// Not newer than the published book; must be dropped.
    Stale,
}

/// What the worker should do once a cycle has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Arm the timer for one refresh interval.
    Arm,
    /// Fetch immediately (a queued manual refresh).
    Fetch(u64),
    /// Stay idle, no timer.
    Idle,
}

#[derive(Debug, Clone)]
pub struct CycleMachine {
    state: CycleState,
    auto_refresh: bool,
    next_sequence: u64,
    in_flight: Option<u64>,
    last_published: Option<u64>,
    refresh_queued: bool,
}

impl CycleMachine {
    pub fn new(auto_refresh: bool) -> Self {
        Self {
            state: CycleState::Idle,
            auto_refresh,
            next_sequence: 1,
            in_flight: None,
            last_published: None,
            refresh_queued: false,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn last_published(&self) -> Option<u64> {
        self.last_published
    }

    /// Idle → Scheduled. Returns false if the machine was already running.
    pub fn start(&mut self) -> bool {
        if self.state != CycleState::Idle || self.in_flight.is_some() {
            return false;
        }
        self.transition(CycleState::Scheduled);
        true
    }

    /// Timer fired: Scheduled → Fetching with a fresh sequence number.
    pub fn tick(&mut self) -> Option<u64> {
        (self.state == CycleState::Scheduled).then(|| self.begin_fetch())
    }

    pub fn manual_refresh(&mut self) -> RefreshAction {
        match self.state {
            CycleState::Aggregating | CycleState::Published => {
                self.refresh_queued = true;
                RefreshAction::Queued
            }
            CycleState::Idle | CycleState::Scheduled | CycleState::Fetching => {
                let cancelled = self.in_flight.take();
                RefreshAction::Fetch {
                    sequence: self.begin_fetch(),
                    cancelled,
                }
            }
        }
    }

    pub fn data_arrived(&mut self, sequence: u64) -> Arrival {
        if self.last_published.is_some_and(|p| sequence <= p) {
            return Arrival::Stale;
        }
        if self.in_flight == Some(sequence) {
            self.in_flight = None;
            self.transition(CycleState::Aggregating);
            Arrival::Current
        } else {
            Arrival::Superseded
        }
    }

    /// Records a publication made outside the current cycle.
    pub fn record_published(&mut self, sequence: u64) {
        self.last_published = Some(self.last_published.map_or(sequence, |p| p.max(sequence)));
    }

    /// Ends the current cycle after aggregation. `published` is false when
    /// aggregation failed and nothing was swapped in.
    pub fn finish_cycle(&mut self, sequence: u64, published: bool) -> NextStep {
        if published {
            self.record_published(sequence);
            self.transition(CycleState::Published);
        }
        self.settle()
    }

    /// The fetch for `sequence` failed. Only the in-flight fetch moves the
    /// machine; failures of cancelled fetches return `None`.
    pub fn fetch_failed(&mut self, sequence: u64) -> Option<NextStep> {
        if self.in_flight != Some(sequence) {
            return None;
        }
        self.in_flight = None;
        Some(self.settle())
    }

    /// Returns the timer change the worker must apply, if any.
    pub fn set_auto_refresh(&mut self, enabled: bool) -> Option<NextStep> {
        self.auto_refresh = enabled;
        match (enabled, self.state) {
            (false, CycleState::Scheduled) => {
                self.transition(CycleState::Idle);
                Some(NextStep::Idle)
            }
            (true, CycleState::Idle) if self.in_flight.is_none() => {
                self.transition(CycleState::Scheduled);
                Some(NextStep::Arm)
            }
            _ => None,
        }
    }

    /// Teardown. Returns the fetch that must be aborted.
    pub fn stop(&mut self) -> Option<u64> {
        self.refresh_queued = false;
        self.transition(CycleState::Idle);
        self.in_flight.take()
    }

    fn begin_fetch(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.in_flight = Some(sequence);
        self.transition(CycleState::Fetching);
        sequence
    }

    fn settle(&mut self) -> NextStep {
        if std::mem::take(&mut self.refresh_queued) {
            return NextStep::Fetch(self.begin_fetch());
        }
        if self.auto_refresh {
            self.transition(CycleState::Scheduled);
            NextStep::Arm
        } else {
            self.transition(CycleState::Idle);
            NextStep::Idle
        }
    }

    fn transition(&mut self, next: CycleState) {
        if self.state != next {
            tracing::debug!("refresh cycle {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs full tick → publish cycles until `sequence` is the next one.
    fn machine_at(sequence: u64) -> CycleMachine {
        let mut machine = CycleMachine::new(true);
        assert!(machine.start());
        while machine.next_sequence < sequence {
            let seq = machine.tick().unwrap();
            assert_eq!(machine.data_arrived(seq), Arrival::Current);
            assert_eq!(machine.finish_cycle(seq, true), NextStep::Arm);
        }
        machine
    }

    #[test]
    fn full_cycle_returns_to_scheduled() {
        let mut machine = CycleMachine::new(true);
        assert_eq!(machine.state(), CycleState::Idle);
        assert!(machine.start());
        assert_eq!(machine.state(), CycleState::Scheduled);

        let seq = machine.tick().unwrap();
        assert_eq!(machine.state(), CycleState::Fetching);
        assert_eq!(machine.data_arrived(seq), Arrival::Current);
        assert_eq!(machine.state(), CycleState::Aggregating);
        assert_eq!(machine.finish_cycle(seq, true), NextStep::Arm);
        assert_eq!(machine.state(), CycleState::Scheduled);
        assert_eq!(machine.last_published(), Some(seq));
    }

    #[test]
    fn without_auto_refresh_a_cycle_ends_idle() {
        let mut machine = CycleMachine::new(false);
        machine.start();
        let seq = machine.tick().unwrap();
        machine.data_arrived(seq);
        assert_eq!(machine.finish_cycle(seq, true), NextStep::Idle);
        assert_eq!(machine.state(), CycleState::Idle);
        assert_eq!(machine.tick(), None);
    }

    #[test]
    fn start_is_only_valid_from_idle() {
        let mut machine = CycleMachine::new(true);
        assert!(machine.start());
        assert!(!machine.start());
    }

    #[test]
    fn manual_refresh_while_fetching_cancels_the_fetch() {
        let mut machine = machine_at(5);
        assert_eq!(machine.tick(), Some(5));
        assert_eq!(
            machine.manual_refresh(),
            RefreshAction::Fetch {
                sequence: 6,
                cancelled: Some(5),
            }
        );
        assert_eq!(machine.in_flight(), Some(6));
        assert_eq!(machine.state(), CycleState::Fetching);
    }

    #[test]
    fn manual_refresh_while_scheduled_fetches_immediately() {
        let mut machine = CycleMachine::new(true);
        machine.start();
        assert_eq!(
            machine.manual_refresh(),
            RefreshAction::Fetch {
                sequence: 1,
                cancelled: None,
            }
        );
        assert_eq!(machine.state(), CycleState::Fetching);
    }

    #[test]
    fn older_cycle_resolving_late_is_discarded() {
        let mut machine = machine_at(5);
        let a = machine.tick().unwrap();
        let RefreshAction::Fetch { sequence: b, .. } = machine.manual_refresh() else {
            panic!("refresh while fetching must fetch");
        };
        assert_eq!((a, b), (5, 6));

        assert_eq!(machine.data_arrived(b), Arrival::Current);
        machine.finish_cycle(b, true);
        assert_eq!(machine.last_published(), Some(6));

        assert_eq!(machine.data_arrived(a), Arrival::Stale);
        assert_eq!(machine.last_published(), Some(6));
        assert_eq!(machine.state(), CycleState::Scheduled);
    }

    #[test]
    fn older_cycle_resolving_first_is_superseded_not_current() {
        let mut machine = machine_at(5);
        let a = machine.tick().unwrap();
        machine.manual_refresh();

        assert_eq!(machine.data_arrived(a), Arrival::Superseded);
        machine.record_published(a);
        assert_eq!(machine.state(), CycleState::Fetching);

        assert_eq!(machine.data_arrived(6), Arrival::Current);
        machine.finish_cycle(6, true);
        assert_eq!(machine.last_published(), Some(6));
    }

    #[test]
    fn refresh_during_aggregation_is_queued() {
        let mut machine = CycleMachine::new(true);
        machine.start();
        let seq = machine.tick().unwrap();
        machine.data_arrived(seq);
        assert_eq!(machine.manual_refresh(), RefreshAction::Queued);
        assert_eq!(machine.finish_cycle(seq, true), NextStep::Fetch(seq + 1));
        assert_eq!(machine.state(), CycleState::Fetching);
    }

    #[test]
    fn failed_fetch_settles_without_publishing() {
        let mut machine = CycleMachine::new(true);
        machine.start();
        let seq = machine.tick().unwrap();
        assert_eq!(machine.fetch_failed(seq), Some(NextStep::Arm));
        assert_eq!(machine.last_published(), None);
        assert_eq!(machine.state(), CycleState::Scheduled);
        assert_eq!(machine.fetch_failed(seq), None);
    }

    #[test]
    fn disabling_auto_refresh_disarms_the_timer() {
        let mut machine = CycleMachine::new(true);
        machine.start();
        assert_eq!(machine.set_auto_refresh(false), Some(NextStep::Idle));
        assert_eq!(machine.state(), CycleState::Idle);
        assert_eq!(machine.set_auto_refresh(true), Some(NextStep::Arm));
        assert_eq!(machine.state(), CycleState::Scheduled);
    }

    #[test]
    fn disabling_auto_refresh_mid_fetch_ends_idle() {
        let mut machine = CycleMachine::new(true);
        machine.start();
        let seq = machine.tick().unwrap();
        assert_eq!(machine.set_auto_refresh(false), None);
        machine.data_arrived(seq);
        assert_eq!(machine.finish_cycle(seq, true), NextStep::Idle);
    }

    #[test]
    fn stop_returns_the_fetch_to_abort() {
        let mut machine = CycleMachine::new(true);
        machine.start();
        let seq = machine.tick().unwrap();
        assert_eq!(machine.stop(), Some(seq));
        assert_eq!(machine.state(), CycleState::Idle);
    }
}
