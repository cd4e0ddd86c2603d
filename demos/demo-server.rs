//! Exercises `buildprof` end to end: starts a session, drives a handful of
//! worker threads and one async task through the facade, then stops and
//! prints a short summary of what was recorded.
//!
//! ```bash
//! cargo run --bin buildprof-demo -- --output /tmp/trace.json
//! cargo run --bin buildprof-demo -- --output /tmp/trace.json.gz --compress
//! ```

use anyhow::{Context, Result};
use buildprof::{Profiler, ProfilePhase, ProfilerConfig, SystemClock, TaskType};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
struct Args {
    /// Where to write the Chrome Trace Event JSON.
    #[arg(long, default_value = "buildprof-trace.json")]
    output: String,

    /// Gzip-compress the output stream.
    #[arg(long)]
    compress: bool,

    /// Number of simulated worker threads.
    #[arg(long, default_value_t = 4)]
    workers: u32,
}

fn config_for(args: &Args) -> Result<ProfilerConfig> {
    let file = File::create(&args.output).with_context(|| format!("creating {}", args.output))?;
    let sink = BufWriter::new(file);
    let format = if args.compress { buildprof::export::OutputFormat::JsonGzip } else { buildprof::export::OutputFormat::Json };

    Ok(buildprof::config::ProfilerConfigBuilder::new(sink).format(format).build_id("demo-build").build())
}

fn simulate_action(thread_index: u32, job_index: u32) {
    let profiler = Profiler::instance();
    let guard = profiler.profile_action(
        TaskType::Action,
        Some("CppCompile".to_string()),
        format!("compile worker-{thread_index}/job-{job_index}.cc"),
        Some(format!("bin/worker-{thread_index}/job-{job_index}.o")),
        Some(format!("//worker{thread_index}:job{job_index}")),
    );
    std::thread::sleep(Duration::from_millis(2 + u64::from(job_index % 5)));
    guard.complete();
}

async fn simulate_async_job() {
    let profiler = Profiler::instance();
    profiler
        .profile_async(TaskType::Action, "link final binary", |_scoped| async {
            tokio::time::sleep(Duration::from_millis(7)).await;
        })
        .await;
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = config_for(&args)?;
    let profiler = Profiler::instance();
    profiler.start(config, Arc::new(SystemClock::new())).context("starting profiler session")?;

    profiler.mark_phase(ProfilePhase::Analyze);

    std::thread::scope(|scope| {
        for thread_index in 0..args.workers {
            scope.spawn(move || {
                for job_index in 0..20 {
                    simulate_action(thread_index, job_index);
                }
            });
        }
    });

    profiler.mark_phase(ProfilePhase::Execute);

    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().context("building tokio runtime")?;
    runtime.block_on(simulate_async_job());

    profiler.mark_phase(ProfilePhase::Finish);

    let slowest = profiler.get_slowest_tasks();
    let histograms = profiler.get_tasks_histograms();
    profiler.stop();

    println!("wrote trace to {}", args.output);
    println!("slowest recorded tasks: {}", slowest.len());
    for task in slowest.iter().take(5) {
        println!("  {:>8}ms  {}", task.duration.0 / 1_000_000, task.description);
    }
    println!("histograms recorded: {}", histograms.len());

    Ok(())
}
