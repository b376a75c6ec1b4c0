//! Fan-out of one worker thread per unit, a single join barrier, then release.

use crate::config::RunConfig;
use crate::error::{RunError, UnitError};
use crate::reference::ReferenceBuffer;
use crate::transfer::Transfer;
use crate::unit::{RequestUnit, UnitOutcome};
use crate::worker::run_unit;
use log::{debug, error, info};
use std::thread;
use std::time::{Duration, Instant};

/// Every unit of a finished run, in index order, plus wall time for the
/// launch-to-barrier window.
#[derive(Debug)]
pub struct Population {
    pub units: Vec<UnitOutcome>,
    pub wall: Duration,
}

pub struct Dispatcher<'a> {
    config: &'a RunConfig,
    transfer: &'a dyn Transfer,
}

impl<'a> Dispatcher<'a> {
    pub fn new(config: &'a RunConfig, transfer: &'a dyn Transfer) -> Self {
        Self { config, transfer }
    }

    pub fn run(&self) -> Result<Population, RunError> {
        let config = self.config;
        config.validate()?;

        // Loaded once; a failure here fails the run before anything launches.
        let reference = match &config.reference {
            Some(path) => {
                let buf = ReferenceBuffer::load(path).map_err(|reason| {
                    RunError::ReferenceUnavailable {
                        path: path.clone(),
                        reason,
                    }
                })?;
                info!("Verifying against {} ({} bytes)", path.display(), buf.len());
                Some(buf)
            }
            None => None,
        };

        // The whole population up front, each with its own cursor.
        let mut units: Vec<RequestUnit<'_>> = (0..config.population)
            .map(|index| {
                RequestUnit::new(index, &config.url)
                    .with_save_path(config.save_path(index))
                    .bind_reference(reference.as_ref().map(ReferenceBuffer::cursor))
            })
            .collect();

        info!("Launching {} workers against {}", units.len(), config.url);
        let started = Instant::now();
        let joined = launch_and_join(&mut units, config.stack_size, self.transfer);
        let wall = started.elapsed();

        let outcome = joined.map(|panicked| {
            for index in panicked {
                let unit = &mut units[index];
                unit.elapsed = None;
                unit.error = Some(UnitError::transfer_failed("worker panicked"));
            }
            units
                .into_iter()
                .map(RequestUnit::into_outcome)
                .collect::<Vec<_>>()
        });

        // Every cursor is gone by now, so nothing can still be reading it.
        if let Some(buf) = reference {
            buf.release();
        }

        let units = outcome?;
        info!("All {} workers joined after {:.2}s", config.population, wall.as_secs_f64());
        Ok(Population { units, wall })
    }
}

/// Spawn every worker, then block until all have finished. Returns the indices
/// of workers that panicked.
///
/// Stops at the first spawn failure. Scoped threads cannot be abandoned, so the
/// workers already running are still joined before the error is returned; that
/// wait is bounded by their transfers (and the transfer timeout, if any).
fn launch_and_join(
    units: &mut [RequestUnit<'_>],
    stack_size: Option<usize>,
    transfer: &dyn Transfer,
) -> Result<Vec<usize>, RunError> {
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(units.len());
        let mut launch_error = None;

        for unit in units.iter_mut() {
            let index = unit.index;
            let mut builder = thread::Builder::new().name(format!("req-{:04}", index));
            if let Some(size) = stack_size {
                builder = builder.stack_size(size);
            }

            match builder.spawn_scoped(scope, move || run_unit(unit, transfer)) {
                Ok(handle) => handles.push((index, handle)),
                Err(source) => {
                    error!("Worker {} could not be launched: {}", index, source);
                    launch_error = Some(RunError::LaunchFailed { index, source });
                    break;
                }
            }
        }
        debug!("{} workers launched", handles.len());

        // Join barrier. Every handle is joined explicitly so a panicking
        // worker never re-panics the scope.
        let mut panicked = Vec::new();
        for (index, handle) in handles {
            if handle.join().is_err() {
                error!("Worker {} panicked", index);
                panicked.push(index);
            }
        }

        match launch_error {
            Some(err) => Err(err),
            None => Ok(panicked),
        }
    })
}
