// src/runner.rs
//
// Foreground side of a run: starts the worker thread and folds its events
// into the sample store. Only the foreground thread touches the store.

use crate::config::RunForm;
use crate::error::{AcquisitionError, ErrorKind};
use crate::serial::Connector;
use crate::session::{self, Phase, SessionEvent, SessionSettings};
use crate::store::SampleStore;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A run is already in progress; nothing was done.
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Complete,
    Failed(ErrorKind),
}

/// What the foreground should show after a poll.
#[derive(Debug)]
pub enum RunUpdate {
    Phase(Phase),
    Line(String),
    SampleAdded { index: u32 },
    Finished { samples: u32 },
    Failed(AcquisitionError),
}

pub struct Runner {
    events: Option<Receiver<SessionEvent>>,
    state: RunState,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            events: None,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Validate the form and start a run on a background thread.
    ///
    /// The store is cleared only when the run actually starts.
    pub fn start<C>(
        &mut self,
        connector: C,
        form: &RunForm,
        settings: SessionSettings,
        store: &mut SampleStore,
    ) -> Result<StartOutcome, AcquisitionError>
    where
        C: Connector + Send + 'static,
    {
        if self.is_running() {
            log::info!("run already in progress, start ignored");
            return Ok(StartOutcome::AlreadyRunning);
        }

        // a rejected form leaves the previous run's state and samples alone
        let config = form.parse()?;

        store.clear();
        let (tx, rx) = mpsc::channel::<SessionEvent>();

        log::info!(
            "starting run: port={} readings={} stabilization={:?}",
            config.port,
            config.readings,
            config.stabilization
        );
        thread::spawn(move || {
            let last = match session::run(&connector, &config, &settings, &tx) {
                Ok(samples) => SessionEvent::Finished { samples },
                Err(e) => SessionEvent::Failed(e),
            };
            let _ = tx.send(last);
        });

        self.events = Some(rx);
        self.state = RunState::Running;
        Ok(StartOutcome::Started)
    }

    /// Drain pending worker events without blocking.
    pub fn poll(&mut self, store: &mut SampleStore) -> Vec<RunUpdate> {
        let mut updates = Vec::new();
        let Some(rx) = self.events.take() else {
            return updates;
        };

        loop {
            let event = match rx.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => {
                    self.events = Some(rx);
                    return updates;
                }
                Err(TryRecvError::Disconnected) => {
                    self.fail(AcquisitionError::Disconnected, &mut updates);
                    return updates;
                }
            };

            match event {
                SessionEvent::Phase(p) => updates.push(RunUpdate::Phase(p)),
                SessionEvent::Line(l) => updates.push(RunUpdate::Line(l)),
                SessionEvent::Sample(sample) => {
                    let index = sample.index;
                    if let Err(e) = store.push(sample) {
                        // the worker keeps running but nothing more is read from it
                        self.fail(e.into(), &mut updates);
                        return updates;
                    }
                    updates.push(RunUpdate::SampleAdded { index });
                }
                SessionEvent::Finished { samples } => {
                    log::info!("run complete, {} samples", samples);
                    self.state = RunState::Complete;
                    updates.push(RunUpdate::Finished { samples });
                    return updates;
                }
                SessionEvent::Failed(e) => {
                    self.fail(e, &mut updates);
                    return updates;
                }
            }
        }
    }

    fn fail(&mut self, error: AcquisitionError, updates: &mut Vec<RunUpdate>) {
        log::error!("run failed: {}", error);
        self.state = RunState::Failed(error.kind());
        updates.push(RunUpdate::Failed(error));
    }
}
