//! Worker pool evaluating fish networks on dedicated threads.
//!
//! Each worker owns copies of the networks assigned to it. The coordinator talks to a
//! worker through three commands (assign, unassign, evaluate-batch) and every worker
//! answers a batch with exactly one [`BatchResult`]. A step dispatches one batch per
//! worker and joins on all of them before the population may change again; the
//! [`InFlight`] token holds the pool and the population borrowed until joined.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::entity::{Fish, FishId};
use crate::network::Network;

/// Errors raised while managing worker threads.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("worker pool needs at least one worker")]
    Empty,
}

/// Coordinator → worker messages.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    /// Take ownership of a fish's network. `output_trim` leading outputs are dropped.
    Assign {
        id: FishId,
        width: usize,
        layers: Vec<Vec<f64>>,
        output_trim: usize,
    },
    Unassign {
        id: FishId,
    },
    /// Evaluate each `(id, input)` pair in order.
    Evaluate {
        sequence: u64,
        batch: Vec<(FishId, Vec<f64>)>,
    },
    Shutdown,
}

/// Worker → coordinator reply to [`WorkerCommand::Evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub worker: usize,
    pub sequence: u64,
    /// One entry per input, in input order. `None` when the fish was not assigned here.
    pub outputs: Vec<Option<Vec<f64>>>,
}

#[derive(Debug, Clone)]
struct WorkerRecord {
    network: Network,
    output_trim: usize,
}

/// Worker-local bookkeeping, keyed by fish id.
#[derive(Debug, Default)]
pub struct WorkerState {
    index: usize,
    records: HashMap<FishId, WorkerRecord>,
}

impl WorkerState {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            records: HashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Apply one command, returning a reply for evaluate requests.
    pub fn handle(&mut self, command: WorkerCommand) -> Option<BatchResult> {
        match command {
            WorkerCommand::Assign {
                id,
                width,
                layers,
                output_trim,
            } => {
                match Network::from_flat_layers(width, &layers) {
                    Some(network) => {
                        self.records.insert(
                            id,
                            WorkerRecord {
                                network,
                                output_trim,
                            },
                        );
                    }
                    None => {
                        error!(worker = self.index, fish = %id, "assigned network has malformed layers");
                    }
                }
                None
            }
            WorkerCommand::Unassign { id } => {
                if self.records.remove(&id).is_none() {
                    warn!(worker = self.index, fish = %id, "unassign for unknown fish");
                }
                None
            }
            WorkerCommand::Evaluate { sequence, batch } => Some(BatchResult {
                worker: self.index,
                sequence,
                outputs: self.evaluate(&batch),
            }),
            WorkerCommand::Shutdown => None,
        }
    }

    fn evaluate(&self, batch: &[(FishId, Vec<f64>)]) -> Vec<Option<Vec<f64>>> {
        batch
            .iter()
            .map(|(id, input)| match self.records.get(id) {
                Some(record) => {
                    let mut raw = record.network.evaluate(input);
                    let trim = record.output_trim.min(raw.len());
                    Some(raw.split_off(trim))
                }
                None => {
                    warn!(worker = self.index, fish = %id, "evaluate request for unassigned fish");
                    None
                }
            })
            .collect()
    }
}

fn run_worker(index: usize, commands: Receiver<WorkerCommand>, results: Sender<BatchResult>) {
    let mut state = WorkerState::new(index);
    while let Ok(command) = commands.recv() {
        if matches!(command, WorkerCommand::Shutdown) {
            break;
        }
        if let Some(result) = state.handle(command)
            && results.send(result).is_err()
        {
            break;
        }
    }
    debug!(worker = index, fish = state.len(), "worker exiting");
}

struct WorkerEntry {
    tx: Sender<WorkerCommand>,
    handle: Option<thread::JoinHandle<()>>,
    fish: Vec<FishId>,
}

/// Result of joining a dispatched step.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Usable outputs keyed by fish.
    pub outputs: HashMap<FishId, Vec<f64>>,
    /// Workers that did not answer before the step deadline.
    pub timed_out: Vec<usize>,
    /// Workers whose command channel was closed.
    pub failed: Vec<usize>,
    /// Fish a worker reported as unassigned.
    pub missing: Vec<FishId>,
}

/// Fixed pool of network evaluation workers with least-loaded assignment.
pub struct WorkerPool {
    workers: Vec<WorkerEntry>,
    assignments: HashMap<FishId, usize>,
    results: Receiver<BatchResult>,
    sequence: u64,
    timeout: Duration,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("assigned", &self.assignments.len())
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl WorkerPool {
    /// Spawn `count` worker threads.
    pub fn new(count: usize, timeout: Duration) -> Result<Self, WorkerError> {
        if count == 0 {
            return Err(WorkerError::Empty);
        }
        let (result_tx, results) = mpsc::channel::<BatchResult>();
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let (tx, rx) = mpsc::channel::<WorkerCommand>();
            let worker_results = result_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("fishtank-worker-{index}"))
                .spawn(move || run_worker(index, rx, worker_results))
                .map_err(|source| WorkerError::Spawn { index, source })?;
            workers.push(WorkerEntry {
                tx,
                handle: Some(handle),
                fish: Vec::new(),
            });
        }
        debug!(count, "worker pool started");
        Ok(Self {
            workers,
            assignments: HashMap::new(),
            results,
            sequence: 0,
            timeout,
        })
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of fish held by each worker, in pool order.
    #[must_use]
    pub fn load(&self) -> Vec<usize> {
        self.workers.iter().map(|worker| worker.fish.len()).collect()
    }

    /// Fish assigned to `worker`, in assignment order.
    #[must_use]
    pub fn assigned(&self, worker: usize) -> &[FishId] {
        self.workers
            .get(worker)
            .map(|entry| entry.fish.as_slice())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn worker_of(&self, id: FishId) -> Option<usize> {
        self.assignments.get(&id).copied()
    }

    #[must_use]
    pub fn assigned_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Give `fish` to the least-loaded worker (first in pool order on ties).
    pub fn assign(&mut self, fish: &Fish, output_trim: usize) -> usize {
        let id = fish.id();
        if let Some(existing) = self.worker_of(id) {
            warn!(fish = %id, worker = existing, "fish already assigned");
            return existing;
        }
        let target = self
            .workers
            .iter()
            .enumerate()
            .min_by_key(|(_, worker)| worker.fish.len())
            .map_or(0, |(index, _)| index);
        let network = fish.network();
        let command = WorkerCommand::Assign {
            id,
            width: network.width(),
            layers: network.flat_layers(),
            output_trim,
        };
        let worker = &mut self.workers[target];
        if worker.tx.send(command).is_err() {
            error!(worker = target, fish = %id, "worker channel closed during assign");
        }
        worker.fish.push(id);
        self.assignments.insert(id, target);
        target
    }

    /// Detach `id` from its worker. Returns `false` when it was not assigned.
    pub fn unassign(&mut self, id: FishId) -> bool {
        let Some(index) = self.assignments.remove(&id) else {
            warn!(fish = %id, "unassign for fish without a worker");
            return false;
        };
        let worker = &mut self.workers[index];
        if let Some(position) = worker.fish.iter().position(|fish| *fish == id) {
            worker.fish.remove(position);
        }
        if worker.tx.send(WorkerCommand::Unassign { id }).is_err() {
            error!(worker = index, fish = %id, "worker channel closed during unassign");
        }
        true
    }

    /// Send one batch per worker. Inputs are consumed in each worker's assignment order;
    /// fish without an input are skipped.
    #[must_use = "a dispatched step must be joined"]
    pub fn dispatch<'a>(
        &'a mut self,
        population: &'a [Fish],
        mut inputs: HashMap<FishId, Vec<f64>>,
    ) -> InFlight<'a> {
        self.sequence = self.sequence.wrapping_add(1);
        let sequence = self.sequence;
        let mut pending = Vec::with_capacity(self.workers.len());
        let mut failed = Vec::new();
        for (index, worker) in self.workers.iter().enumerate() {
            let batch: Vec<(FishId, Vec<f64>)> = worker
                .fish
                .iter()
                .filter_map(|id| inputs.remove(id).map(|input| (*id, input)))
                .collect();
            let ids: Vec<FishId> = batch.iter().map(|(id, _)| *id).collect();
            if worker
                .tx
                .send(WorkerCommand::Evaluate { sequence, batch })
                .is_err()
            {
                error!(worker = index, "worker channel closed during dispatch");
                failed.push(index);
                pending.push(None);
            } else {
                pending.push(Some(ids));
            }
        }
        if !inputs.is_empty() {
            warn!(count = inputs.len(), "inputs for fish without a worker were dropped");
        }
        InFlight {
            pool: self,
            population,
            sequence,
            pending,
            failed,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for worker in &self.workers {
            let _ = worker.tx.send(WorkerCommand::Shutdown);
        }
        for (index, worker) in self.workers.iter_mut().enumerate() {
            if let Some(handle) = worker.handle.take()
                && let Err(err) = handle.join()
            {
                error!(worker = index, ?err, "worker thread panicked");
            }
        }
    }
}

/// A dispatched step. The pool and the population stay borrowed until [`InFlight::join`].
#[must_use = "a dispatched step must be joined"]
pub struct InFlight<'a> {
    pool: &'a mut WorkerPool,
    population: &'a [Fish],
    sequence: u64,
    pending: Vec<Option<Vec<FishId>>>,
    failed: Vec<usize>,
}

impl InFlight<'_> {
    /// Wait for every worker's batch, up to the pool timeout.
    pub fn join(mut self) -> DispatchOutcome {
        if self.pool.assignments.len() != self.population.len() {
            warn!(
                assigned = self.pool.assignments.len(),
                population = self.population.len(),
                "worker assignments out of sync with population"
            );
        }
        let mut outcome = DispatchOutcome {
            failed: std::mem::take(&mut self.failed),
            ..DispatchOutcome::default()
        };
        let mut outstanding = self.pending.iter().filter(|ids| ids.is_some()).count();
        let deadline = Instant::now() + self.pool.timeout;
        while outstanding > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.pool.results.recv_timeout(remaining) {
                Ok(result) => {
                    if result.sequence != self.sequence {
                        debug!(
                            worker = result.worker,
                            sequence = result.sequence,
                            "discarding stale batch"
                        );
                        continue;
                    }
                    let Some(ids) = self.pending.get_mut(result.worker).and_then(Option::take)
                    else {
                        continue;
                    };
                    outstanding -= 1;
                    if ids.len() != result.outputs.len() {
                        warn!(
                            worker = result.worker,
                            expected = ids.len(),
                            actual = result.outputs.len(),
                            "batch result length mismatch"
                        );
                    }
                    for (id, output) in ids.into_iter().zip(result.outputs) {
                        match output {
                            Some(values) => {
                                outcome.outputs.insert(id, values);
                            }
                            None => outcome.missing.push(id),
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    error!("all workers disconnected");
                    break;
                }
            }
        }
        for (index, ids) in self.pending.iter().enumerate() {
            if ids.is_some() {
                warn!(worker = index, "worker missed the step deadline");
                outcome.timed_out.push(index);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkLayout;
    use crate::entity::FishBody;
    use crate::genome::Genome;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn make_fish(id: u64, rng: &mut SmallRng) -> Fish {
        let layout = NetworkLayout::default();
        Fish::new(
            FishId(id),
            FishBody::default(),
            Genome::random(&layout, rng),
            &layout,
        )
        .expect("fish")
    }

    fn input_for(id: u64) -> Vec<f64> {
        (0..10).map(|i| ((id + i) as f64 * 0.37).sin()).collect()
    }

    #[test]
    fn worker_state_trims_and_reports_missing() {
        let mut rng = SmallRng::seed_from_u64(1);
        let fish = make_fish(1, &mut rng);
        let mut state = WorkerState::new(0);
        state.handle(WorkerCommand::Assign {
            id: fish.id(),
            width: 10,
            layers: fish.network().flat_layers(),
            output_trim: 5,
        });
        assert_eq!(state.len(), 1);

        let input = input_for(1);
        let reply = state
            .handle(WorkerCommand::Evaluate {
                sequence: 4,
                batch: vec![(fish.id(), input.clone()), (FishId(99), input.clone())],
            })
            .expect("reply");
        assert_eq!(reply.sequence, 4);
        assert_eq!(reply.outputs.len(), 2);
        let expected = fish.network().evaluate(&input)[5..].to_vec();
        assert_eq!(reply.outputs[0].as_deref(), Some(expected.as_slice()));
        assert!(reply.outputs[1].is_none());

        state.handle(WorkerCommand::Unassign { id: fish.id() });
        assert!(state.is_empty());
    }

    #[test]
    fn assignment_stays_balanced() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut pool = WorkerPool::new(3, Duration::from_secs(5)).expect("pool");
        for id in 1..=20 {
            let fish = make_fish(id, &mut rng);
            pool.assign(&fish, 5);
            let load = pool.load();
            let max = load.iter().max().copied().unwrap_or(0);
            let min = load.iter().min().copied().unwrap_or(0);
            assert!(max - min <= 1, "unbalanced load {load:?}");
        }
        assert_eq!(pool.load(), vec![7, 7, 6]);
        assert_eq!(pool.worker_of(FishId(1)), Some(0));
        assert_eq!(pool.worker_of(FishId(2)), Some(1));
        assert_eq!(pool.assigned(2).first(), Some(&FishId(3)));
    }

    #[test]
    fn removal_frees_a_slot_for_the_next_fish() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut pool = WorkerPool::new(2, Duration::from_secs(5)).expect("pool");
        for id in 1..=4 {
            pool.assign(&make_fish(id, &mut rng), 5);
        }
        assert!(pool.unassign(FishId(2)));
        assert!(!pool.unassign(FishId(2)));
        assert_eq!(pool.load(), vec![2, 1]);
        assert_eq!(pool.assign(&make_fish(5, &mut rng), 5), 1);
        assert_eq!(pool.assigned(1), &[FishId(4), FishId(5)]);
    }

    #[test]
    fn dispatch_returns_outputs_keyed_by_fish() {
        let mut rng = SmallRng::seed_from_u64(4);
        let population: Vec<Fish> = (1..=9).map(|id| make_fish(id, &mut rng)).collect();
        let mut pool = WorkerPool::new(4, Duration::from_secs(5)).expect("pool");
        for fish in &population {
            pool.assign(fish, 5);
        }
        let inputs: HashMap<FishId, Vec<f64>> = population
            .iter()
            .map(|fish| (fish.id(), input_for(fish.id().0)))
            .collect();

        let outcome = pool.dispatch(&population, inputs).join();
        assert!(outcome.timed_out.is_empty());
        assert!(outcome.failed.is_empty());
        assert!(outcome.missing.is_empty());
        assert_eq!(outcome.outputs.len(), population.len());
        for fish in &population {
            let expected = fish.network().evaluate(&input_for(fish.id().0))[5..].to_vec();
            assert_eq!(outcome.outputs[&fish.id()], expected);
        }

        // a second step gets a fresh sequence and still completes
        let inputs: HashMap<FishId, Vec<f64>> = population
            .iter()
            .map(|fish| (fish.id(), vec![0.0; 10]))
            .collect();
        let outcome = pool.dispatch(&population, inputs).join();
        assert_eq!(outcome.outputs.len(), population.len());
    }

    #[test]
    fn late_batches_time_out_and_are_discarded_on_the_next_join() {
        let mut rng = SmallRng::seed_from_u64(5);
        let population: Vec<Fish> = (1..=3_000).map(|id| make_fish(id, &mut rng)).collect();
        let mut pool = WorkerPool::new(1, Duration::from_nanos(1)).expect("pool");
        for fish in &population {
            pool.assign(fish, 5);
        }
        let stale: HashMap<FishId, Vec<f64>> = population
            .iter()
            .map(|fish| (fish.id(), vec![0.0; 10]))
            .collect();
        let outcome = pool.dispatch(&population, stale).join();
        assert_eq!(outcome.timed_out, vec![0]);
        assert!(outcome.outputs.is_empty());

        pool.set_timeout(Duration::from_secs(10));
        let inputs: HashMap<FishId, Vec<f64>> = population
            .iter()
            .map(|fish| (fish.id(), input_for(fish.id().0)))
            .collect();
        let outcome = pool.dispatch(&population, inputs).join();
        assert!(outcome.timed_out.is_empty());
        assert_eq!(outcome.outputs.len(), population.len());
        for fish in &population {
            let expected = fish.network().evaluate(&input_for(fish.id().0))[5..].to_vec();
            assert_eq!(outcome.outputs[&fish.id()], expected);
        }
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(matches!(
            WorkerPool::new(0, Duration::from_secs(1)),
            Err(WorkerError::Empty)
        ));
    }
}
