#[cfg(feature = "parallel")]
use alloc::collections::BTreeMap;
#[cfg(feature = "parallel")]
use alloc::string::ToString;
#[cfg(feature = "parallel")]
use alloc::sync::Arc;
use alloc::vec::Vec;
#[cfg(feature = "parallel")]
use std::sync::{Mutex, PoisonError};

#[cfg(feature = "parallel")]
use rayon::ThreadPool;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::witness::InstanceValues;
use crate::circuit::{Circuit, RootCircuit};
use crate::expr::Expression;
use crate::field::CircuitField;
use crate::types::SubCircuitId;
use crate::CircuitError;

/// A constraint that did not evaluate to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Violation<F> {
    pub instance: usize,
    pub circuit: SubCircuitId,
    pub index: usize,
    pub value: F,
}

/// Evaluates every constraint of every instance and returns the first
/// violation in `(instance, constraint index)` order.
///
/// The flattened constraint list is split into `workers` contiguous chunks.
/// Each chunk reports its own first violation and the earliest chunk wins,
/// so the answer does not depend on the worker count.
pub(crate) fn first_violation<F: CircuitField>(
    root: &RootCircuit<F>,
    instances: &[InstanceValues<F>],
    workers: usize,
) -> Result<Option<Violation<F>>, CircuitError> {
    let constraints: Vec<&[Expression<F>]> = instances
        .iter()
        .map(|instance| root.circuit(instance.circuit).map(Circuit::constraints))
        .collect::<Result<_, _>>()?;
    let tasks: Vec<(usize, usize)> = constraints
        .iter()
        .enumerate()
        .flat_map(|(instance, cs)| (0..cs.len()).map(move |index| (instance, index)))
        .collect();
    if tasks.is_empty() {
        return Ok(None);
    }

    let chunk_size = tasks.len().div_ceil(workers.max(1));
    let check_chunk = |chunk: &[(usize, usize)]| {
        chunk.iter().find_map(|&(instance, index)| {
            let value = constraints[instance][index].eval(&instances[instance].values);
            (value != F::ZERO).then(|| Violation {
                instance,
                circuit: instances[instance].circuit,
                index,
                value,
            })
        })
    };

    let per_chunk = run_chunks(&tasks, chunk_size, workers, check_chunk)?;
    Ok(per_chunk.into_iter().flatten().next())
}

#[cfg(feature = "parallel")]
fn run_chunks<T, R, C>(
    tasks: &[T],
    chunk_size: usize,
    workers: usize,
    check: C,
) -> Result<Vec<R>, CircuitError>
where
    T: Sync,
    R: Send,
    C: Fn(&[T]) -> R + Sync + Send,
{
    if workers <= 1 {
        return Ok(tasks.chunks(chunk_size).map(check).collect());
    }
    let pool = pool_for(workers)?;
    Ok(pool.install(|| tasks.par_chunks(chunk_size).map(check).collect()))
}

/// Pools built so far, one per worker count, shared by every solve in the process.
#[cfg(feature = "parallel")]
static POOLS: Mutex<BTreeMap<usize, Arc<ThreadPool>>> = Mutex::new(BTreeMap::new());

/// Returns the pool with `workers` threads, building it on first use.
#[cfg(feature = "parallel")]
fn pool_for(workers: usize) -> Result<Arc<ThreadPool>, CircuitError> {
    // The map stays consistent even if a holder panicked.
    let mut pools = POOLS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(pool) = pools.get(&workers) {
        return Ok(Arc::clone(pool));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| CircuitError::WorkerPool {
            reason: e.to_string(),
        })?;
    let pool = Arc::new(pool);
    pools.insert(workers, Arc::clone(&pool));
    Ok(pool)
}

#[cfg(not(feature = "parallel"))]
fn run_chunks<T, R, C>(
    tasks: &[T],
    chunk_size: usize,
    _workers: usize,
    check: C,
) -> Result<Vec<R>, CircuitError>
where
    C: Fn(&[T]) -> R,
{
    Ok(tasks.chunks(chunk_size).map(check).collect())
}
