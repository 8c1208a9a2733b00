//! CLI argument parsing

pub const DEFAULT_REGULAR_PER_HOUR: u32 = 4;
pub const DEFAULT_RANDOM_PER_INTERVAL: u32 = 2;

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub command: Command,
}

#[derive(Debug, Clone)]
pub enum Command {
    Baseline(BaselineArgs),
    Compare(CompareArgs),
    Monitor(MonitorArgs),
    Log(LogArgs),
}

#[derive(Debug, Clone)]
pub struct BaselineArgs {
    pub directory: String,
    pub output: String,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct CompareArgs {
    pub baseline: String,
    pub directory: String,
    /// Also append the report to this file.
    pub output: Option<String>,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct MonitorArgs {
    pub directories: Vec<String>,
    /// Existing baseline; only valid with a single directory.
    pub baseline: Option<String>,
    pub regular: u32,
    pub random: u32,
    pub config: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Events,
    Comparisons,
}

#[derive(Debug, Clone)]
pub struct LogArgs {
    pub directory: String,
    pub kind: LogKind,
    pub config: Option<String>,
}

impl Default for MonitorArgs {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            baseline: None,
            regular: DEFAULT_REGULAR_PER_HOUR,
            random: DEFAULT_RANDOM_PER_INTERVAL,
            config: None,
        }
    }
}

/// Parse command line arguments
pub fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    if args.len() < 2 {
        return Err("No command specified".to_string());
    }

    let command = match args[1].as_str() {
        "baseline" => Command::Baseline(parse_baseline_args(&args[2..])?),
        "compare" => Command::Compare(parse_compare_args(&args[2..])?),
        "monitor" => Command::Monitor(parse_monitor_args(&args[2..])?),
        "log" => Command::Log(parse_log_args(&args[2..])?),
        _ => return Err(format!("Unknown command: {}", args[1])),
    };

    Ok(CliArgs { command })
}

/// Value following option `args[*i]`, advancing the cursor past it.
fn option_value<'a>(args: &'a [String], i: &mut usize, what: &str) -> Result<&'a str, String> {
    let name = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{name} requires {what}"))
}

fn parse_baseline_args(args: &[String]) -> Result<BaselineArgs, String> {
    let mut directory = String::new();
    let mut output = None;
    let mut quiet = false;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--output" | "-o" => {
                output = Some(option_value(args, &mut i, "a file path")?.to_string());
            }
            "--quiet" => {
                quiet = true;
            }
            arg if !arg.starts_with('-') => {
                if directory.is_empty() {
                    directory = arg.to_string();
                } else {
                    return Err(format!("Unexpected argument: {arg}"));
                }
            }
            _ => return Err(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    if directory.is_empty() {
        return Err("Missing required argument: DIR".to_string());
    }
    let Some(output) = output else {
        return Err("--output is required for baseline command".to_string());
    };

    Ok(BaselineArgs {
        directory,
        output,
        quiet,
    })
}

fn parse_compare_args(args: &[String]) -> Result<CompareArgs, String> {
    let mut positional = Vec::new();
    let mut output = None;
    let mut json = false;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--output" | "-o" => {
                output = Some(option_value(args, &mut i, "a file path")?.to_string());
            }
            "--json" => {
                json = true;
            }
            arg if !arg.starts_with('-') => {
                if positional.len() == 2 {
                    return Err(format!("Unexpected argument: {arg}"));
                }
                positional.push(arg.to_string());
            }
            _ => return Err(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let (Some(baseline), Some(directory)) = (positional.next(), positional.next()) else {
        return Err("Missing required arguments: BASELINE DIR".to_string());
    };

    Ok(CompareArgs {
        baseline,
        directory,
        output,
        json,
    })
}

fn parse_monitor_args(args: &[String]) -> Result<MonitorArgs, String> {
    let mut monitor_args = MonitorArgs::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--baseline" => {
                monitor_args.baseline =
                    Some(option_value(args, &mut i, "a file path")?.to_string());
            }
            "--regular" => {
                let value = option_value(args, &mut i, "a value")?;
                monitor_args.regular = value
                    .parse()
                    .map_err(|_| "--regular must be a positive integer".to_string())?;
                if monitor_args.regular == 0 {
                    return Err("--regular must be greater than zero".to_string());
                }
            }
            "--random" => {
                let value = option_value(args, &mut i, "a value")?;
                monitor_args.random = value
                    .parse()
                    .map_err(|_| "--random must be a non-negative integer".to_string())?;
            }
            "--config" => {
                monitor_args.config =
                    Some(option_value(args, &mut i, "a file path")?.to_string());
            }
            arg if !arg.starts_with('-') => {
                monitor_args.directories.push(arg.to_string());
            }
            _ => return Err(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    if monitor_args.directories.is_empty() {
        return Err("Missing required argument: DIR".to_string());
    }
    if monitor_args.baseline.is_some() && monitor_args.directories.len() > 1 {
        return Err("--baseline can only be used with a single directory".to_string());
    }

    Ok(monitor_args)
}

fn parse_log_args(args: &[String]) -> Result<LogArgs, String> {
    let mut directory = String::new();
    let mut kind = LogKind::Events;
    let mut config = None;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--events" => {
                kind = LogKind::Events;
            }
            "--comparisons" => {
                kind = LogKind::Comparisons;
            }
            "--config" => {
                config = Some(option_value(args, &mut i, "a file path")?.to_string());
            }
            arg if !arg.starts_with('-') => {
                if directory.is_empty() {
                    directory = arg.to_string();
                } else {
                    return Err(format!("Unexpected argument: {arg}"));
                }
            }
            _ => return Err(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    if directory.is_empty() {
        return Err("Missing required argument: DIR".to_string());
    }

    Ok(LogArgs {
        directory,
        kind,
        config,
    })
}
