//! File Integrity Monitor CLI (fim) - Main binary entry point

use fim::cli::args::{BaselineArgs, Command, CompareArgs, LogArgs, LogKind, MonitorArgs, parse_args};
use fim::cli::output::{
    format_baseline_summary, format_comparison_json, format_comparison_text, format_task_table,
};
use fim::io::logs::append_comparison;
use fim::{BuildOptions, MonitorConfig, TaskRegistry};
use std::path::Path;
use std::process;
use std::sync::Arc;

fn main() {
    // Initialize logger (controlled by RUST_LOG environment variable)
    // Example: RUST_LOG=debug fim monitor /srv/data
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "--help" | "-h" => {
            print_help();
            return;
        }
        "--version" | "-v" => {
            print_version();
            return;
        }
        _ => {}
    }

    let cli_args = match parse_args(&args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Use --help for usage information");
            process::exit(2);
        }
    };

    let exit_code = match &cli_args.command {
        Command::Baseline(baseline_args) => handle_baseline(baseline_args),
        Command::Compare(compare_args) => handle_compare(compare_args),
        Command::Monitor(monitor_args) => handle_monitor(monitor_args),
        Command::Log(log_args) => handle_log(log_args),
    };

    process::exit(exit_code);
}

fn exit_code_for(err: &fim::Error) -> i32 {
    match err {
        fim::Error::InvalidInput(_)
        | fim::Error::Config(_)
        | fim::Error::SchedulingConflict(_)
        | fim::Error::TaskNotFound(_) => 2,
        fim::Error::Parse { .. } => 3,
        _ => 4,
    }
}

/// Configuration plus the clock it implies, for one-shot commands.
fn load_options(config_path: Option<&str>) -> Result<(MonitorConfig, BuildOptions), fim::Error> {
    let config = MonitorConfig::load(config_path.map(Path::new))?;
    let opts = BuildOptions {
        clock: config.clock()?,
    };
    Ok((config, opts))
}

fn handle_baseline(args: &BaselineArgs) -> i32 {
    let opts = match load_options(None) {
        Ok((_, opts)) => opts,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    if !args.quiet {
        eprintln!("Capturing baseline: {}", args.directory);
    }

    let baseline = match fim::generate_baseline(&args.directory, &opts) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    if let Err(e) = fim::save_baseline(&baseline, &args.output) {
        eprintln!("Error: Failed to save baseline: {e}");
        return 4;
    }

    if !args.quiet {
        println!("{}", format_baseline_summary(&baseline));
        println!("Baseline saved: {}", args.output);
    }

    for error in baseline.errors() {
        eprintln!("Warning: {} {} ({})", error.code, error.path, error.message);
    }

    0
}

fn handle_compare(args: &CompareArgs) -> i32 {
    let opts = match load_options(None) {
        Ok((_, opts)) => opts,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    let result = match fim::compare_directory(&args.baseline, &args.directory, &opts) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    if let Some(output) = &args.output
        && let Err(e) = append_comparison(Path::new(output), &result)
    {
        eprintln!("Error: Failed to write comparison log: {e}");
        return 4;
    }

    if args.json {
        println!(
            "{}",
            format_comparison_json(&result, &args.baseline, &args.directory)
        );
    } else {
        println!("{}", format_comparison_text(&result));
    }

    if result.is_clean() { 0 } else { 1 }
}

fn handle_monitor(args: &MonitorArgs) -> i32 {
    let config = match MonitorConfig::load(args.config.as_deref().map(Path::new)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    if let Err(e) = config.ensure_directories() {
        eprintln!("Error: {e}");
        return 4;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to start runtime: {e}");
            return 4;
        }
    };

    runtime.block_on(run_monitor(args, config))
}

async fn run_monitor(args: &MonitorArgs, config: MonitorConfig) -> i32 {
    let registry = match TaskRegistry::new(Arc::new(config)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    for directory in &args.directories {
        let added = match &args.baseline {
            Some(baseline) => {
                registry
                    .add_task(directory, baseline, args.regular, args.random)
                    .await
            }
            None => {
                registry
                    .create_task(directory, args.regular, args.random)
                    .await
            }
        };

        if let Err(e) = added {
            eprintln!("Error: {directory}: {e}");
            registry.shutdown().await;
            return exit_code_for(&e);
        }
    }

    let tasks = registry.tasks().await;
    println!("{}", format_task_table(&tasks));
    for task in &tasks {
        println!("  events:      {}", task.event_log.display());
        println!("  comparisons: {}", task.comparison_log.display());
    }
    eprintln!("Monitoring; press Ctrl-C to stop");

    let exit_code = match tokio::signal::ctrl_c().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: Failed to listen for Ctrl-C: {e}");
            4
        }
    };

    eprintln!("Stopping monitors...");
    registry.shutdown().await;
    exit_code
}

fn handle_log(args: &LogArgs) -> i32 {
    let (config, _) = match load_options(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    let directory = match Path::new(&args.directory).canonicalize() {
        Ok(path) => path,
        Err(_) => match std::path::absolute(&args.directory) {
            Ok(path) => path,
            Err(e) => {
                eprintln!("Error: {e}");
                return 2;
            }
        },
    };

    let paths = fim::io::logs::LogPaths::for_directory(&config, &directory);
    let (path, label) = match args.kind {
        LogKind::Events => (paths.event_log, "events"),
        LogKind::Comparisons => (paths.comparison_log, "comparisons"),
    };

    match fim::io::logs::read_log(&path) {
        Ok(Some(text)) => {
            print!("{text}");
            0
        }
        Ok(None) => {
            eprintln!("No {label} recorded for {} ({})", args.directory, path.display());
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code_for(&e)
        }
    }
}

fn print_help() {
    println!("File Integrity Monitor (fim) - Baseline, compare and watch directory trees");
    println!();
    println!("USAGE:");
    println!("    fim baseline <DIR> --output <FILE> [OPTIONS]");
    println!("    fim compare <BASELINE> <DIR> [OPTIONS]");
    println!("    fim monitor <DIR>... [OPTIONS]");
    println!("    fim log <DIR> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    baseline  Hash every file under DIR and save a baseline report");
    println!("    compare   Compare DIR against a saved baseline report");
    println!("    monitor   Watch directories and re-verify them on a randomized schedule");
    println!("    log       Print the event or comparison log of a monitored directory");
    println!();
    println!("GLOBAL OPTIONS:");
    println!("    -h, --help                 Show this help message");
    println!("    -v, --version              Show version information");
    println!();
    println!("BASELINE OPTIONS:");
    println!("    -o, --output <FILE>       Baseline report to write (required)");
    println!("    --quiet                   Suppress non-error output");
    println!();
    println!("COMPARE OPTIONS:");
    println!("    -o, --output <FILE>       Also append the report to FILE");
    println!("    --json                    Emit machine-readable output");
    println!();
    println!("MONITOR OPTIONS:");
    println!("    --baseline <FILE>         Use an existing baseline (single DIR only)");
    println!("    --regular <R>             Regular checks per hour (default: 4)");
    println!("    --random <M>              Random checks between regular ones (default: 2)");
    println!("    --config <FILE>           JSON configuration file");
    println!();
    println!("LOG OPTIONS:");
    println!("    --events                  Show the audit event log (default)");
    println!("    --comparisons             Show the comparison log");
    println!("    --config <FILE>           JSON configuration file");
    println!();
    println!("ENVIRONMENT:");
    println!("    FIM_HOME                  Data directory for logs and baselines");
    println!("    FIM_UTC_OFFSET            Report time zone: local, UTC or +HH:MM");
    println!("    RUST_LOG                  Diagnostic verbosity (e.g. info, debug)");
    println!();
    println!("EXIT CODES:");
    println!("    0  success, no drift    1  drift detected    2  invalid input");
    println!("    3  baseline parse error 4  other failure");
    println!();
    println!("EXAMPLES:");
    println!("    fim baseline /etc --output etc_baseline.txt");
    println!("    fim compare etc_baseline.txt /etc --json");
    println!("    fim monitor /etc /srv/www --regular 6 --random 3");
    println!("    fim log /etc --comparisons");
}

fn print_version() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_DATE: &str = env!("GIT_DATE");
    const BUILD_TARGET: &str = env!("BUILD_TARGET");

    println!("fim {VERSION}");
    println!("Commit: {GIT_HASH} ({GIT_DATE})");
    println!("Target: {BUILD_TARGET}");

    #[cfg(debug_assertions)]
    println!("Build: debug");
    #[cfg(not(debug_assertions))]
    println!("Build: release");
}
