use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    str::FromStr,
    sync::Arc,
};

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::{LearnError, MembershipOracle, Query};

/// Batches with fewer queries than this are answered on the calling thread.
pub const DEFAULT_MIN_BATCH_SIZE: usize = 10;

/// Decides what happens with oracle instances between batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PoolPolicy {
    /// Instances are created once and handed out round-robin to the chunks of successive
    /// batches.
    #[default]
    Reuse,
    /// A fresh instance is created for every chunk and dropped once the chunk is answered, so
    /// no state survives from one batch to the next.
    PerBatch,
}

impl FromStr for PoolPolicy {
    type Err = LearnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reuse" => Ok(PoolPolicy::Reuse),
            "per-batch" | "per_batch" | "perbatch" => Ok(PoolPolicy::PerBatch),
            other => Err(LearnError::InvalidConfiguration(format!(
                "unknown pool policy {other}"
            ))),
        }
    }
}

/// Tunables of a [`ParallelOracle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Batches below this size are not dispatched to the workers.
    pub min_batch_size: usize,
    /// Number of oracle instances, `None` means one per thread of the rayon pool.
    pub num_instances: Option<usize>,
    /// What happens to instances between batches.
    pub policy: PoolPolicy,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            min_batch_size: DEFAULT_MIN_BATCH_SIZE,
            num_instances: None,
            policy: PoolPolicy::Reuse,
        }
    }
}

impl ParallelConfig {
    /// Starts from the defaults and overrides them with the values of `DHC_MIN_BATCH_SIZE`,
    /// `DHC_NUM_INSTANCES` and `DHC_POOL_POLICY`, if these are set. Values that cannot be
    /// parsed are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup("DHC_MIN_BATCH_SIZE") {
            match value.trim().parse::<usize>() {
                Ok(size) if size > 0 => config.min_batch_size = size,
                _ => warn!("ignoring DHC_MIN_BATCH_SIZE={value}, expected a positive integer"),
            }
        }
        if let Some(value) = lookup("DHC_NUM_INSTANCES") {
            match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.num_instances = Some(n),
                _ => warn!("ignoring DHC_NUM_INSTANCES={value}, expected a positive integer"),
            }
        }
        if let Some(value) = lookup("DHC_POOL_POLICY") {
            match value.parse() {
                Ok(policy) => config.policy = policy,
                Err(_) => warn!("ignoring DHC_POOL_POLICY={value}, expected reuse or per-batch"),
            }
        }
        config
    }
}

type Factory<M> = Arc<dyn Fn() -> Result<M, LearnError> + Send + Sync>;

enum Source<M> {
    Pool(Vec<M>),
    Factory(Factory<M>),
}

/// Fluent construction of a [`ParallelOracle`], either from a fixed pool of instances or from a
/// factory that produces them.
pub struct ParallelOracleBuilder<M> {
    source: Source<M>,
    config: ParallelConfig,
}

impl<M: MembershipOracle + Send> ParallelOracleBuilder<M> {
    /// Uses exactly the given instances. Such a pool only works with [`PoolPolicy::Reuse`].
    pub fn from_instances<J: IntoIterator<Item = M>>(instances: J) -> Self {
        Self {
            source: Source::Pool(instances.into_iter().collect()),
            config: ParallelConfig::default(),
        }
    }

    /// Manufactures instances with `factory`, either once when the oracle is built or once per
    /// dispatched chunk, depending on the [`PoolPolicy`].
    pub fn from_factory<F>(factory: F) -> Self
    where
        F: Fn() -> Result<M, LearnError> + Send + Sync + 'static,
    {
        Self {
            source: Source::Factory(Arc::new(factory)),
            config: ParallelConfig::default(),
        }
    }

    /// Replaces the whole configuration, for example with [`ParallelConfig::from_env`].
    pub fn with_config(mut self, config: ParallelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_min_batch_size(mut self, min_batch_size: usize) -> Self {
        self.config.min_batch_size = min_batch_size;
        self
    }

    pub fn with_default_min_batch_size(self) -> Self {
        self.with_min_batch_size(DEFAULT_MIN_BATCH_SIZE)
    }

    pub fn with_num_instances(mut self, num_instances: usize) -> Self {
        self.config.num_instances = Some(num_instances);
        self
    }

    pub fn with_default_num_instances(mut self) -> Self {
        self.config.num_instances = None;
        self
    }

    pub fn with_pool_policy(mut self, policy: PoolPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn with_default_pool_policy(self) -> Self {
        self.with_pool_policy(PoolPolicy::default())
    }

    /// Validates the configuration and sets up the worker threads.
    pub fn build(self) -> Result<ParallelOracle<M>, LearnError> {
        let ParallelConfig {
            min_batch_size,
            num_instances,
            policy,
        } = self.config;
        if min_batch_size == 0 {
            return Err(LearnError::InvalidConfiguration(
                "minimum batch size must be positive".into(),
            ));
        }

        let (instances, factory) = match self.source {
            Source::Pool(instances) => {
                if instances.is_empty() {
                    return Err(LearnError::InvalidConfiguration(
                        "pool of oracle instances is empty".into(),
                    ));
                }
                if policy == PoolPolicy::PerBatch {
                    return Err(LearnError::InvalidConfiguration(
                        "a fixed pool of instances cannot be used per batch".into(),
                    ));
                }
                if let Some(n) = num_instances.filter(|n| *n != instances.len()) {
                    return Err(LearnError::InvalidConfiguration(format!(
                        "requested {n} instances but the pool holds {}",
                        instances.len()
                    )));
                }
                (instances, None)
            }
            Source::Factory(factory) => {
                let n = num_instances.unwrap_or_else(rayon::current_num_threads);
                if n == 0 {
                    return Err(LearnError::InvalidConfiguration(
                        "number of instances must be positive".into(),
                    ));
                }
                match policy {
                    PoolPolicy::Reuse => (
                        (0..n).map(|_| factory()).collect::<Result<Vec<_>, _>>()?,
                        None,
                    ),
                    PoolPolicy::PerBatch => (Vec::new(), Some((factory, n))),
                }
            }
        };

        let workers = factory
            .as_ref()
            .map(|(_, n)| *n)
            .unwrap_or(instances.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("dhc-oracle-{i}"))
            .build()
            .map_err(|e| LearnError::InvalidConfiguration(e.to_string()))?;
        debug!("parallel oracle with {workers} workers, policy {policy:?}, minimum batch size {min_batch_size}");

        Ok(ParallelOracle {
            instances,
            factory: factory.map(|(f, _)| f),
            policy,
            min_batch_size,
            workers,
            pool,
        })
    }
}

/// A membership oracle that splits batches into contiguous chunks and answers them
/// concurrently, every chunk with its own oracle instance.
///
/// Batches below the minimum batch size are answered on the calling thread. For larger batches
/// all chunks are awaited before returning, if some of them failed the error of the first
/// failing chunk is reported.
pub struct ParallelOracle<M> {
    instances: Vec<M>,
    factory: Option<Factory<M>>,
    policy: PoolPolicy,
    min_batch_size: usize,
    workers: usize,
    pool: rayon::ThreadPool,
}

impl<M> ParallelOracle<M> {
    /// Number of chunks a batch is split into at most.
    pub fn num_workers(&self) -> usize {
        self.workers
    }

    pub fn min_batch_size(&self) -> usize {
        self.min_batch_size
    }

    pub fn policy(&self) -> PoolPolicy {
        self.policy
    }
}

fn guarded<F: FnOnce() -> Result<(), LearnError>>(work: F) -> Result<(), LearnError> {
    catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|_| {
        warn!("oracle worker panicked while answering a chunk");
        Err(LearnError::WorkerPanicked)
    })
}

/// Cuts `items` into `n` contiguous chunks whose lengths differ by at most one.
fn split_evenly<T>(mut items: &mut [T], n: usize) -> Vec<&mut [T]> {
    let (base, extra) = (items.len() / n, items.len() % n);
    let mut chunks = Vec::with_capacity(n);
    for i in 0..n {
        let (chunk, rest) = std::mem::take(&mut items).split_at_mut(base + usize::from(i < extra));
        chunks.push(chunk);
        items = rest;
    }
    chunks
}

fn fresh<M>(factory: &Option<Factory<M>>) -> Result<M, LearnError> {
    match factory {
        Some(factory) => factory(),
        None => Err(LearnError::InvalidConfiguration(
            "no factory to create oracle instances".into(),
        )),
    }
}

impl<M> MembershipOracle for ParallelOracle<M>
where
    M: MembershipOracle + Send,
    M::Output: Send,
{
    type Input = M::Input;
    type Output = M::Output;

    fn process_queries(
        &mut self,
        queries: &mut [Query<Self::Input, Self::Output>],
    ) -> Result<(), LearnError> {
        if queries.is_empty() {
            return Ok(());
        }

        if queries.len() < self.min_batch_size {
            trace!("answering {} queries on the calling thread", queries.len());
            return match self.policy {
                PoolPolicy::Reuse => match self.instances.first_mut() {
                    Some(oracle) => oracle.process_queries(queries),
                    None => Err(LearnError::InvalidConfiguration(
                        "pool of oracle instances is empty".into(),
                    )),
                },
                PoolPolicy::PerBatch => fresh(&self.factory)?.process_queries(queries),
            };
        }

        let num_chunks = (queries.len() / self.min_batch_size).min(self.workers);
        let len = queries.len();
        let chunks = split_evenly(queries, num_chunks);
        trace!(
            "dispatching {len} queries as {num_chunks} chunks of at least {}",
            len / num_chunks
        );

        let pool = &self.pool;
        let results: Vec<Result<(), LearnError>> = match self.policy {
            PoolPolicy::Reuse => {
                let instances = &mut self.instances;
                let results: Vec<_> = pool.install(|| {
                    chunks
                        .into_par_iter()
                        .zip(instances.par_iter_mut())
                        .map(|(chunk, oracle)| guarded(|| oracle.process_queries(chunk)))
                        .collect()
                });
                let available = instances.len();
                instances.rotate_left(num_chunks % available);
                results
            }
            PoolPolicy::PerBatch => {
                let factory = &self.factory;
                pool.install(|| {
                    chunks
                        .into_par_iter()
                        .map(|chunk| guarded(|| fresh(factory)?.process_queries(chunk)))
                        .collect()
                })
            }
        };

        results.into_iter().find_map(Result::err).map_or(Ok(()), Err)
    }
}
