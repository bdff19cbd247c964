// src/session.rs
//
// One acquisition run, executed on the worker thread:
//   open -> settle -> discard input -> wait for banner end -> stabilize -> N x 3 lines
// Progress and samples go to the foreground through `SessionEvent`s.

use crate::config::SessionConfig;
use crate::error::AcquisitionError;
use crate::protocol::{self, LINES_PER_SAMPLE};
use crate::serial::{Connector, LineSource};
use crate::store::Sample;
use chrono::Local;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Wait after opening the port while the board resets.
    pub settle_delay: Duration,
    /// Upper bound on the time spent waiting for the end of the startup banner.
    pub banner_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            banner_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Connecting,
    Stabilizing(Duration),
    Reading { index: u32, total: u32 },
}

#[derive(Debug)]
pub enum SessionEvent {
    Phase(Phase),
    /// Raw device line, for the event log.
    Line(String),
    Sample(Sample),
    Finished { samples: u32 },
    Failed(AcquisitionError),
}

/// Run the acquisition protocol to completion. Returns the number of samples emitted.
///
/// The link is dropped, and so closed, on every return path.
pub fn run<C: Connector>(
    connector: &C,
    config: &SessionConfig,
    settings: &SessionSettings,
    events: &Sender<SessionEvent>,
) -> Result<u32, AcquisitionError> {
    emit(events, SessionEvent::Phase(Phase::Connecting))?;
    let mut link = connector.open(&config.port)?;

    thread::sleep(settings.settle_delay);
    link.discard_input()?;

    wait_for_banner_end(&mut link, settings.banner_timeout, events)?;

    log::info!("stabilizing for {:?}", config.stabilization);
    emit(events, SessionEvent::Phase(Phase::Stabilizing(config.stabilization)))?;
    thread::sleep(config.stabilization);

    for index in 1..=config.readings {
        emit(
            events,
            SessionEvent::Phase(Phase::Reading {
                index,
                total: config.readings,
            }),
        )?;

        let mut lines = Vec::with_capacity(LINES_PER_SAMPLE);
        for _ in 0..LINES_PER_SAMPLE {
            let line = link
                .read_line()?
                .map(|l| protocol::clean_line(&l))
                .unwrap_or_default();
            log::debug!("reading {}: {:?}", index, line);
            if !line.is_empty() {
                emit(events, SessionEvent::Line(line.clone()))?;
            }
            lines.push(line);
        }

        let reading = protocol::parse_reading(&lines);
        if reading.voltage.is_none() || reading.current.is_none() {
            log::warn!("reading {} incomplete: {:?}", index, reading);
        }
        emit(events, SessionEvent::Sample(Sample::new(index, reading, Local::now())))?;
    }

    Ok(config.readings)
}

/// Consume startup lines until the calibration marker. Returns the number of lines read.
fn wait_for_banner_end<L: LineSource>(
    link: &mut L,
    budget: Duration,
    events: &Sender<SessionEvent>,
) -> Result<usize, AcquisitionError> {
    let started = Instant::now();
    let mut lines = 0;

    loop {
        if let Some(raw) = link.read_line()? {
            let line = protocol::clean_line(&raw);
            lines += 1;
            log::debug!("startup: {:?}", line);
            if !line.is_empty() {
                emit(events, SessionEvent::Line(line.clone()))?;
            }
            if protocol::is_banner_end(&line) {
                return Ok(lines);
            }
        }

        let waited = started.elapsed();
        if waited >= budget {
            return Err(AcquisitionError::BannerTimeout { waited, lines });
        }
    }
}

fn emit(events: &Sender<SessionEvent>, event: SessionEvent) -> Result<(), AcquisitionError> {
    events
        .send(event)
        .map_err(|_| AcquisitionError::Disconnected)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::mpsc::{self, Receiver};

    fn config(readings: u32) -> SessionConfig {
        SessionConfig {
            port: "COM7".into(),
            readings,
            stabilization: Duration::ZERO,
        }
    }

    fn samples(rx: &Receiver<SessionEvent>) -> Vec<Sample> {
        rx.try_iter()
            .filter_map(|e| match e {
                SessionEvent::Sample(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn conforming_device_yields_n_samples() {
        for n in [1, 2, 7] {
            let connector = ScriptedConnector::new(move || device(n));
            let (tx, rx) = mpsc::channel();

            let count = run(&connector, &config(n as u32), &fast_settings(), &tx).unwrap();
            assert_eq!(count, n as u32);

            let got = samples(&rx);
            assert_eq!(got.len(), n);
            for (i, s) in got.iter().enumerate() {
                assert_eq!(s.index, i as u32 + 1);
                assert_eq!(s.voltage, Some(4.80));
                assert_eq!(s.current, Some(0.120));
            }
            assert_eq!(connector.closes(), 1);
        }
    }

    #[test]
    fn swapped_line_order_parses_the_same() {
        let connector = ScriptedConnector::new(|| {
            let mut steps = banner();
            steps.push(Step::Line("------------------"));
            steps.push(Step::Line("Current: 0.120 A"));
            steps.push(Step::Line("Input Voltage: 4.80 V"));
            steps
        });
        let (tx, rx) = mpsc::channel();
        run(&connector, &config(1), &fast_settings(), &tx).unwrap();

        let got = samples(&rx);
        assert_eq!(got[0].voltage, Some(4.80));
        assert_eq!(got[0].current, Some(0.120));
    }

    #[test]
    fn unparsable_reading_is_missing_and_run_continues() {
        let connector = ScriptedConnector::new(|| {
            let mut steps = banner();
            steps.push(Step::Line("garbage"));
            steps.push(Step::Timeout);
            steps.push(Step::Line("------------------"));
            steps.push(Step::Line("Input Voltage: 5.00 V"));
            steps.push(Step::Line("Current: ERR A"));
            steps.push(Step::Line("------------------"));
            steps
        });
        let (tx, rx) = mpsc::channel();
        assert_eq!(run(&connector, &config(2), &fast_settings(), &tx).unwrap(), 2);

        let got = samples(&rx);
        assert_eq!(got.len(), 2);
        assert_eq!((got[0].voltage, got[0].current), (None, None));
        assert_eq!((got[1].voltage, got[1].current), (Some(5.0), None));
    }

    #[test]
    fn silent_device_still_reaches_n_samples() {
        let connector = ScriptedConnector::new(banner);
        let (tx, rx) = mpsc::channel();
        assert_eq!(run(&connector, &config(3), &fast_settings(), &tx).unwrap(), 3);
        assert!(samples(&rx)
            .iter()
            .all(|s| s.voltage.is_none() && s.current.is_none()));
    }

    #[test]
    fn missing_banner_marker_times_out() {
        let connector = ScriptedConnector::new(|| vec![Step::Line("booting"), Step::Line("hello")]);
        let (tx, rx) = mpsc::channel();

        let err = run(&connector, &config(3), &fast_settings(), &tx).unwrap_err();
        assert!(matches!(err, AcquisitionError::BannerTimeout { lines: 2, .. }));
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert!(samples(&rx).is_empty());
        assert_eq!(connector.closes(), 1);
    }

    #[test]
    fn open_failure_is_connectivity_error() {
        let mut connector = ScriptedConnector::new(|| device(1));
        connector.refuse = true;
        let (tx, _rx) = mpsc::channel();

        let err = run(&connector, &config(1), &fast_settings(), &tx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert_eq!(connector.closes(), 0);
    }

    #[test]
    fn io_failure_mid_run_keeps_earlier_samples() {
        let connector = ScriptedConnector::new(|| {
            let mut steps = device(1);
            steps.push(Step::Line("Input Voltage: 4.80 V"));
            steps.push(Step::Fail);
            steps
        });
        let (tx, rx) = mpsc::channel();

        let err = run(&connector, &config(5), &fast_settings(), &tx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert_eq!(samples(&rx).len(), 1);
        assert_eq!(connector.closes(), 1);
    }

    #[test]
    fn phases_are_reported_in_order() {
        let connector = ScriptedConnector::new(|| device(2));
        let (tx, rx) = mpsc::channel();
        run(&connector, &config(2), &fast_settings(), &tx).unwrap();

        let phases: Vec<Phase> = rx
            .try_iter()
            .filter_map(|e| match e {
                SessionEvent::Phase(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                Phase::Connecting,
                Phase::Stabilizing(Duration::ZERO),
                Phase::Reading { index: 1, total: 2 },
                Phase::Reading { index: 2, total: 2 },
            ]
        );
    }
}
