use std::{
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use clap::{Parser, ValueEnum};
use dashmap::DashMap;
use hdrhistogram::Histogram;
use tracing_subscriber::EnvFilter;

use callgate::{
    CallgateError, CountCalls, LimitCalls, LimitCallsOptions, MaxCalls, OperationName,
};

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum Strategy {
    Count,
    Limit,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OpDist {
    Hot,
    Uniform,
    Skewed,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum Mode {
    Max,
    TargetQps,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "callgate-stress",
    about = "Load test harness checking interceptor counters under contention"
)]
struct Args {
    #[arg(long, value_enum, default_value_t = Strategy::Limit)]
    strategy: Strategy,

    #[arg(long, value_enum, default_value_t = OpDist::Hot)]
    op_dist: OpDist,

    #[arg(long, value_enum, default_value_t = Mode::Max)]
    mode: Mode,

    #[arg(long, default_value_t = 8)]
    threads: usize,

    #[arg(long, default_value_t = 10)]
    duration_s: u64,

    /// Number of wrapped operations. Ignored with `--op-dist hot`.
    #[arg(long, default_value_t = 1000)]
    op_space: usize,

    #[arg(long, default_value_t = 0.8)]
    hot_fraction: f64,

    /// Only used with `--strategy limit`.
    #[arg(long, default_value_t = 100_000)]
    max_calls: u64,

    /// Log every forwarded call through `tracing` (set `RUST_LOG=info` to see them).
    #[arg(long, default_value_t = false)]
    log_calls: bool,

    #[arg(long, default_value_t = 100)]
    sample_every: u64,

    #[arg(long)]
    target_qps: Option<u64>,
}

type Op = Box<dyn Fn(u64) -> u64 + Send + Sync>;

enum Gate {
    Count(CountCalls<Op, u64, u64>),
    Limit(LimitCalls<Op, u64, u64>),
}

impl Gate {
    fn invoke(&self, arg: u64) -> Result<u64, CallgateError> {
        match self {
            Gate::Count(counted) => Ok(counted.invoke(arg)),
            Gate::Limit(limited) => limited.invoke(arg),
        }
    }

    fn name(&self) -> &OperationName {
        match self {
            Gate::Count(counted) => counted.name(),
            Gate::Limit(limited) => limited.name(),
        }
    }

    fn num_calls(&self) -> u64 {
        match self {
            Gate::Count(counted) => counted.num_calls(),
            Gate::Limit(limited) => limited.num_calls(),
        }
    }
}

#[derive(Default)]
struct Counts {
    forwarded: AtomicU64,
    rejected: AtomicU64,
}

fn build_gates(args: &Args, tally: &Arc<DashMap<OperationName, u64>>) -> Result<Vec<Gate>, String> {
    let n = match args.op_dist {
        OpDist::Hot => 1,
        _ => args.op_space.max(1),
    };

    let limiter = LimitCalls::configure(LimitCallsOptions {
        max_calls: MaxCalls::try_from(args.max_calls)?,
        log_calls: args.log_calls,
    });

    let mut gates = Vec::with_capacity(n);
    for i in 0..n {
        let name = OperationName::try_from(format!("op_{i}"))?;

        let op: Op = {
            let tally = Arc::clone(tally);
            let name = name.clone();
            Box::new(move |x: u64| {
                *tally.entry(name.clone()).or_insert(0) += 1;
                x.wrapping_mul(x)
            })
        };

        gates.push(match args.strategy {
            Strategy::Count => {
                Gate::Count(CountCalls::new(name, op).with_logging(args.log_calls))
            }
            Strategy::Limit => Gate::Limit(limiter.wrap(name, op)),
        });
    }

    Ok(gates)
}

fn should_sample(iter: u64, sample_every: u64) -> bool {
    if sample_every <= 1 {
        return true;
    }

    iter.is_multiple_of(sample_every)
}

fn pick_gate(args: &Args, len: usize, thread_rng: &mut impl FnMut() -> u64) -> usize {
    match args.op_dist {
        OpDist::Hot => 0,
        OpDist::Uniform => (thread_rng() as usize) % len,
        OpDist::Skewed => {
            let r = (thread_rng() % 10_000) as f64 / 10_000.0;
            if r < args.hot_fraction {
                0
            } else {
                let idx = 1 + ((thread_rng() as usize) % (len.saturating_sub(1).max(1)));
                idx % len
            }
        }
    }
}

/// Every gate must have seen exactly its attempts, and forwarded only what its strategy allows.
fn check_invariants(
    args: &Args,
    gates: &[Gate],
    attempts: &[AtomicU64],
    tally: &DashMap<OperationName, u64>,
) -> Vec<String> {
    let mut violations = Vec::new();

    for (gate, attempts) in gates.iter().zip(attempts) {
        let attempts = attempts.load(Ordering::Relaxed);
        let forwarded = tally.get(gate.name()).map(|v| *v).unwrap_or(0);

        if gate.num_calls() != attempts {
            violations.push(format!(
                "{}: num_calls={} attempts={}",
                gate.name(),
                gate.num_calls(),
                attempts
            ));
        }

        let expected = match args.strategy {
            Strategy::Count => attempts,
            Strategy::Limit => attempts.min(args.max_calls),
        };

        if forwarded != expected {
            violations.push(format!(
                "{}: forwarded={} expected={}",
                gate.name(),
                forwarded,
                expected
            ));
        }
    }

    violations
}

fn print_results(args: &Args, elapsed: Duration, ops: u64, hist: &Histogram<u64>, counts: &Counts) {
    println!(
        "strategy={:?} mode={:?} op_dist={:?} op_space={}",
        args.strategy, args.mode, args.op_dist, args.op_space
    );
    println!(
        "threads={} duration_s={} max_calls={} log_calls={}",
        args.threads, args.duration_s, args.max_calls, args.log_calls
    );
    println!(
        "elapsed_s={:.3} ops={} ops_per_s={:.0}",
        elapsed.as_secs_f64(),
        ops,
        ops as f64 / elapsed.as_secs_f64()
    );
    println!(
        "forwarded={} rejected={}",
        counts.forwarded.load(Ordering::Relaxed),
        counts.rejected.load(Ordering::Relaxed)
    );
    if !hist.is_empty() {
        println!(
            "lat_ns p50={} p95={} p99={} p999={} max={}",
            hist.value_at_quantile(0.50),
            hist.value_at_quantile(0.95),
            hist.value_at_quantile(0.99),
            hist.value_at_quantile(0.999),
            hist.max()
        );
        println!("sample_every={} samples={}", args.sample_every, hist.len());
    } else {
        println!("no latency samples collected");
    }
}

fn run(args: Args) -> Result<bool, String> {
    let tally = Arc::new(DashMap::new());
    let gates = Arc::new(build_gates(&args, &tally)?);
    let attempts: Arc<Vec<AtomicU64>> =
        Arc::new((0..gates.len()).map(|_| AtomicU64::new(0)).collect());

    tracing::info!(
        strategy = ?args.strategy,
        gates = gates.len(),
        threads = args.threads,
        "starting stress run"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let counts = Arc::new(Counts::default());
    let total_ops = Arc::new(AtomicU64::new(0));

    let started = Instant::now();
    let deadline = started + Duration::from_secs(args.duration_s);

    let mut handles = Vec::with_capacity(args.threads);
    for t in 0..args.threads {
        let gates = Arc::clone(&gates);
        let attempts = Arc::clone(&attempts);
        let stop = Arc::clone(&stop);
        let counts = Arc::clone(&counts);
        let total_ops = Arc::clone(&total_ops);
        let args = args.clone();

        handles.push(std::thread::spawn(move || {
            let mut hist = Histogram::<u64>::new_with_bounds(1, 60_000_000_000, 3)
                .map_err(|err| format!("{err:?}"))?;
            let mut i = 0_u64;
            let mut seed = (t as u64 + 1) * 0x9E37_79B9_7F4A_7C15;
            let mut next_deadline = Instant::now();

            let mut rng_u64 = || {
                // xorshift64*
                seed ^= seed >> 12;
                seed ^= seed << 25;
                seed ^= seed >> 27;
                seed = seed.wrapping_mul(0x2545_F491_4F6C_DD1D);
                seed
            };

            while !stop.load(Ordering::Relaxed) && Instant::now() < deadline {
                if args.mode == Mode::TargetQps
                    && let Some(qps) = args.target_qps
                {
                    let per_op_ns = 1_000_000_000u64 / qps.max(1);
                    let now = Instant::now();
                    if now < next_deadline {
                        std::thread::sleep(next_deadline - now);
                    }
                    next_deadline += Duration::from_nanos(per_op_ns);
                }

                i = i.wrapping_add(1);
                let idx = pick_gate(&args, gates.len(), &mut rng_u64);
                let t0 = should_sample(i, args.sample_every).then(Instant::now);

                attempts[idx].fetch_add(1, Ordering::Relaxed);
                let outcome = gates[idx].invoke(i);

                if let Some(t0) = t0 {
                    let ns = t0.elapsed().as_nanos() as u64;
                    let _ = hist.record(ns.max(1));
                }

                total_ops.fetch_add(1, Ordering::Relaxed);
                match outcome {
                    Ok(_) => counts.forwarded.fetch_add(1, Ordering::Relaxed),
                    Err(CallgateError::CallLimitExceeded { .. }) => {
                        counts.rejected.fetch_add(1, Ordering::Relaxed)
                    }
                };
            }

            Ok::<_, String>(hist)
        }));
    }

    std::thread::sleep(Duration::from_secs(args.duration_s));
    stop.store(true, Ordering::Relaxed);

    let mut merged =
        Histogram::<u64>::new_with_bounds(1, 60_000_000_000, 3).map_err(|err| format!("{err:?}"))?;
    for h in handles {
        let hist = h.join().map_err(|_| "worker thread panicked".to_string())??;
        merged.add(&hist).map_err(|err| format!("{err:?}"))?;
    }

    let elapsed = started.elapsed();
    let ops = total_ops.load(Ordering::Relaxed);
    print_results(&args, elapsed, ops, &merged, &counts);

    let violations = check_invariants(&args, &gates, &attempts, &tally);
    if violations.is_empty() {
        println!("invariants ok");
        return Ok(true);
    }

    for violation in &violations {
        tracing::error!(%violation, "counter invariant violated");
    }
    println!("invariant violations={}", violations.len());

    Ok(false)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!(error = %err, "stress run failed");
            ExitCode::from(2)
        }
    }
}
