//! Engine: runs one round per configured port, each round a fixed pool of
//! workers pulling credentials from a shared cursor until one logs in or the
//! cursor is exhausted.
//!
//! Typical usage:
//!
//! ```no_run
//! use tikbrute::{audit::AuditLog, config::RunConfig, engine::Engine, probe::build_probe};
//! # fn run(config: RunConfig) -> anyhow::Result<()> {
//! let engine = Engine::new(config.threads)?;
//! let probe = build_probe(config.method, config.handshake.clone());
//! let audit = AuditLog::create(".", &config.host)?;
//! let summary = engine.run(&config, probe.as_ref(), &audit);
//! println!("{}", tikbrute::report::render_stats(&summary.stats));
//! # Ok(())
//! # }
//! ```
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::audit::{AttemptRecord, AuditLog};
use crate::config::{ConfigError, RunConfig};
use crate::credential::{Credential, CredentialSpace, Target};
use crate::probe::{LoginProbe, Outcome};
use crate::signal::TerminationSignal;
use crate::stats::{StatsCollector, StatsReport};

/// Everything a worker needs for one round, passed explicitly.
pub struct RoundContext<'a> {
    pub target: Target,
    pub timeout: Duration,
    pub probe: &'a dyn LoginProbe,
    pub space: CredentialSpace<'a>,
    pub signal: TerminationSignal,
    pub stats: &'a StatsCollector,
    pub audit: &'a AuditLog,
}

impl<'a> RoundContext<'a> {
    /// Fresh cursor and stop flag for `target`.
    pub fn new(
        target: Target,
        timeout: Duration,
        probe: &'a dyn LoginProbe,
        usernames: &'a [String],
        passwords: &'a [String],
        stats: &'a StatsCollector,
        audit: &'a AuditLog,
    ) -> Self {
        Self {
            target,
            timeout,
            probe,
            space: CredentialSpace::new(usernames, passwords),
            signal: TerminationSignal::new(),
            stats,
            audit,
        }
    }
}

/// Fixed set of `K` long-lived worker threads.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, ConfigError> {
        if workers == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("probe-worker-{i}"))
            .build()?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every worker over `ctx` and return once all of them have stopped.
    /// Yields the credentials that logged in (normally at most one).
    pub fn run_round(&self, ctx: &RoundContext<'_>) -> Vec<Credential> {
        self.pool
            .broadcast(|_| worker_loop(ctx))
            .into_iter()
            .flatten()
            .collect()
    }
}

fn worker_loop(ctx: &RoundContext<'_>) -> Option<Credential> {
    let port = ctx.target.port;
    while !ctx.signal.is_set() {
        let credential = ctx.space.next()?;
        let outcome = ctx.probe.attempt(&ctx.target, &credential, ctx.timeout);
        match &outcome {
            Outcome::Success => {
                ctx.signal.trigger();
                ctx.stats.record(&outcome);
                let record = AttemptRecord::new(
                    &ctx.target,
                    &credential,
                    ctx.probe.name(),
                    outcome.clone(),
                );
                if let Err(e) = ctx.audit.record(&record) {
                    error!("failed to record {credential} on port {port}: {e:#}");
                }
                info!(
                    "[SUCCESS] {} credentials found: {credential} on port {port}",
                    ctx.probe.name()
                );
                return Some(credential);
            }
            Outcome::Failure(reason) => {
                debug!("[TRYING] {credential} on port {port}: {reason}");
            }
            Outcome::ProbeError(detail) => {
                warn!("[PROBE ERROR] {credential} on port {port}: {detail}");
            }
        }
        ctx.stats.record(&outcome);
    }
    None
}

/// Result of one port round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub port: u16,
    pub attempts: u64,
    pub found: Vec<Credential>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub rounds: Vec<RoundResult>,
    pub stats: StatsReport,
}

impl RunSummary {
    /// `(port, credential)` for every discovery, in round order.
    pub fn discoveries(&self) -> impl Iterator<Item = (u16, &Credential)> {
        self.rounds
            .iter()
            .flat_map(|r| r.found.iter().map(move |c| (r.port, c)))
    }

    pub fn found_any(&self) -> bool {
        self.discoveries().next().is_some()
    }
}

/// Owns the worker pool and the run-wide counters.
pub struct Engine {
    pool: WorkerPool,
    stats: StatsCollector,
}

impl Engine {
    pub fn new(threads: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            pool: WorkerPool::new(threads)?,
            stats: StatsCollector::new(),
        })
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    /// Probe each port in turn. A round starts only after the previous one
    /// has drained, and the run stops after the first round with a success.
    pub fn run(
        &self,
        config: &RunConfig,
        probe: &dyn LoginProbe,
        audit: &AuditLog,
    ) -> RunSummary {
        let mut rounds = Vec::with_capacity(config.ports.len());
        for &port in &config.ports {
            info!("[TESTING] Port {port} with {} worker(s)", self.pool.workers());
            let ctx = RoundContext::new(
                Target::new(config.host.as_str(), port),
                config.timeout,
                probe,
                &config.usernames,
                &config.passwords,
                &self.stats,
                audit,
            );
            let before = self.stats.attempts();
            let found = self.pool.run_round(&ctx);
            let attempts = self.stats.attempts() - before;
            info!(
                "port {port}: {attempts} attempt(s), {} of {} pair(s) handed out",
                ctx.space.delivered(),
                ctx.space.len()
            );
            let done = !found.is_empty();
            rounds.push(RoundResult {
                port,
                attempts,
                found,
            });
            if done {
                break;
            }
        }
        RunSummary {
            rounds,
            stats: self.stats.report(),
        }
    }
}
