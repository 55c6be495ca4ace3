//! Scripted in-memory timing device for tests.
//!
//! The fake GPU has a tick counter that only moves when a test calls
//! [`FakeDevice::advance`]. Ending a timestamp query samples that counter;
//! ending a disjoint query captures the current disjoint flag and frequency.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{DeviceError, DisjointData, QueryKind, TimingContext, TimingDevice};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum FakeCommand {
    Begin(u64),
    End(u64),
}

#[derive(Debug, Default)]
struct Record {
    kind: Option<QueryKind>,
    ended: bool,
    ticks: u64,
    disjoint: Option<DisjointData>,
}

#[derive(Debug)]
struct FakeState {
    supports: bool,
    next_id: u64,
    live: usize,
    /// Allocations left before `create_query` starts failing.
    budget: Option<usize>,
    ticks: u64,
    frequency: u64,
    disjoint: bool,
    stalled: bool,
    hide_timestamps: bool,
    records: HashMap<u64, Record>,
    commands: Vec<FakeCommand>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            supports: true,
            next_id: 0,
            live: 0,
            budget: None,
            ticks: 0,
            frequency: 1_000_000,
            disjoint: false,
            stalled: false,
            hide_timestamps: false,
            records: HashMap::new(),
            commands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeDevice {
    state: Rc<RefCell<FakeState>>,
}

impl FakeDevice {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn unsupported() -> Self {
        let device = Self::default();
        device.state.borrow_mut().supports = false;
        device
    }

    /// Moves the GPU clock forward.
    pub(crate) fn advance(&self, ticks: u64) {
        self.state.borrow_mut().ticks += ticks;
    }

    pub(crate) fn set_frequency(&self, frequency: u64) {
        self.state.borrow_mut().frequency = frequency;
    }

    /// Marks every disjoint query ended from now on as disjoint (or stable).
    pub(crate) fn set_disjoint(&self, disjoint: bool) {
        self.state.borrow_mut().disjoint = disjoint;
    }

    /// When stalled, disjoint queries never complete.
    pub(crate) fn set_stalled(&self, stalled: bool) {
        self.state.borrow_mut().stalled = stalled;
    }

    /// When hidden, timestamp queries never complete.
    pub(crate) fn set_timestamps_hidden(&self, hidden: bool) {
        self.state.borrow_mut().hide_timestamps = hidden;
    }

    /// Lets `count` more allocations succeed, then fails every later one.
    pub(crate) fn fail_after(&self, count: usize) {
        self.state.borrow_mut().budget = Some(count);
    }

    pub(crate) fn live_queries(&self) -> usize {
        self.state.borrow().live
    }

    pub(crate) fn commands(&self) -> Vec<FakeCommand> {
        self.state.borrow().commands.clone()
    }

    /// Number of `begin` commands issued on disjoint queries.
    pub(crate) fn disjoint_begins(&self) -> usize {
        let state = self.state.borrow();
        state
            .commands
            .iter()
            .filter(|command| match command {
                FakeCommand::Begin(id) => state
                    .records
                    .get(id)
                    .is_some_and(|r| r.kind == Some(QueryKind::Disjoint)),
                FakeCommand::End(_) => false,
            })
            .count()
    }
}

pub(crate) struct FakeQuery {
    id: u64,
    state: Rc<RefCell<FakeState>>,
}

impl Drop for FakeQuery {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.live -= 1;
        state.records.remove(&self.id);
    }
}

impl TimingDevice for FakeDevice {
    type Query = FakeQuery;
    type Context = FakeContext;

    fn supports_timing(&self) -> bool {
        self.state.borrow().supports
    }

    fn create_query(&self, kind: QueryKind) -> Result<FakeQuery, DeviceError> {
        let mut state = self.state.borrow_mut();
        if !state.supports {
            return Err(DeviceError::Unsupported);
        }
        if let Some(budget) = state.budget.as_mut() {
            if *budget == 0 {
                return Err(DeviceError::OutOfQueries);
            }
            *budget -= 1;
        }

        let id = state.next_id;
        state.next_id += 1;
        state.live += 1;
        state.records.insert(
            id,
            Record {
                kind: Some(kind),
                ..Record::default()
            },
        );

        Ok(FakeQuery {
            id,
            state: Rc::clone(&self.state),
        })
    }

    fn immediate_context(&self) -> FakeContext {
        FakeContext {
            state: Rc::clone(&self.state),
        }
    }
}

pub(crate) struct FakeContext {
    state: Rc<RefCell<FakeState>>,
}

impl TimingContext for FakeContext {
    type Query = FakeQuery;

    fn begin(&mut self, query: &FakeQuery) {
        let mut state = self.state.borrow_mut();
        state.commands.push(FakeCommand::Begin(query.id));
        if let Some(record) = state.records.get_mut(&query.id) {
            record.ended = false;
        }
    }

    fn end(&mut self, query: &FakeQuery) {
        let mut state = self.state.borrow_mut();
        state.commands.push(FakeCommand::End(query.id));

        let ticks = state.ticks;
        let sample = DisjointData {
            frequency: state.frequency,
            disjoint: state.disjoint,
        };
        if let Some(record) = state.records.get_mut(&query.id) {
            record.ended = true;
            record.ticks = ticks;
            record.disjoint = Some(sample);
        }
    }

    fn poll_timestamp(&mut self, query: &FakeQuery) -> Result<Option<u64>, DeviceError> {
        let state = self.state.borrow();
        if state.hide_timestamps {
            return Ok(None);
        }
        Ok(state
            .records
            .get(&query.id)
            .filter(|r| r.ended)
            .map(|r| r.ticks))
    }

    fn poll_disjoint(&mut self, query: &FakeQuery) -> Result<Option<DisjointData>, DeviceError> {
        let state = self.state.borrow();
        if state.stalled {
            return Ok(None);
        }
        Ok(state
            .records
            .get(&query.id)
            .filter(|r| r.ended)
            .and_then(|r| r.disjoint))
    }
}
