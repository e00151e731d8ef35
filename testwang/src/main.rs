//! `testwang`: run a list of pytest tests for several cycles and report
//! which ones are stable, broken or flaky.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::debug;

use testwang::core::selector::translate_all;
use testwang::core::store::OutcomeStore;
use testwang::cycles::{CancelFlag, CycleConfig, Echo, run_cycles};
use testwang::exit_codes;
use testwang::io::config::{DEFAULT_CONFIG_FILE, TestwangConfig, load_config};
use testwang::io::cycle::{PytestCycleRunner, ReportLocation};
use testwang::io::process::ConsoleEcho;
use testwang::io::report_file::write_report;
use testwang::io::resolve::Resolution;
use testwang::io::test_list::read_test_list;
use testwang::logging;
use testwang::passthrough::expand_args;
use testwang::present::Console;

#[derive(Parser, Debug)]
#[command(
    name = "testwang",
    version,
    about = "Run a fixed list of tests for several cycles and classify flaky vs. broken",
    after_help = "Arguments after `--` are passed to pytest; $VAR and ${VAR} are expanded \
                  and each argument is split on whitespace."
)]
struct Cli {
    /// File with one dotted test id per line (`#` starts a comment).
    tests_file: PathBuf,

    /// Python interpreter used to run pytest.
    #[arg(short = 'P', long)]
    python: Option<String>,

    /// Keep pytest's JSON report at this path instead of a temp file.
    #[arg(short = 'J', long)]
    json_path: Option<PathBuf>,

    /// Number of cycles to run.
    #[arg(short = 'N', long, value_parser = clap::value_parser!(u32).range(1..))]
    cycles: Option<u32>,

    /// Stop re-running a test once it has passed.
    #[arg(short = 'F', long)]
    failure_focus: bool,

    /// Show each cycle's outcome and duration under every test.
    #[arg(short = 'R', long)]
    report_cycles: bool,

    /// Echo pytest output for every cycle.
    #[arg(short = 'e', long, conflicts_with = "echo_final")]
    echo: bool,

    /// Echo pytest output for the final cycle only.
    #[arg(short = 'E', long)]
    echo_final: bool,

    /// Locate test modules on disk instead of the positional class rule.
    #[arg(long)]
    resolve_modules: bool,

    /// Write the full run report as JSON.
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Config file (defaults to `.testwang.toml` when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lower the default log filter to `debug`.
    #[arg(long)]
    debug: bool,

    /// Extra pytest arguments.
    #[arg(last = true)]
    pytest_args: Vec<String>,
}

impl Cli {
    fn echo(&self) -> Option<Echo> {
        if self.echo {
            Some(Echo::All)
        } else if self.echo_final {
            Some(Echo::Final)
        } else {
            None
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    let settings = settings(cli)?;

    println!("Collecting tests from {}", cli.tests_file.display());
    let ids = read_test_list(&cli.tests_file)?;
    if ids.is_empty() {
        println!("No tests found");
        return Ok(exit_codes::OK);
    }

    let resolution = if settings.resolve_modules {
        Resolution::Filesystem(std::env::current_dir().context("resolve working directory")?)
    } else {
        Resolution::Positional
    };
    let selectors = translate_all(&ids, |id| resolution.translate(id))?;

    println!("\nWill run the following {} tests:\n", selectors.len());
    for id in selectors.ids() {
        println!("  {id}");
    }
    println!();

    let report = match &cli.json_path {
        Some(path) => ReportLocation::Kept(path.clone()),
        None => ReportLocation::temp()?,
    };
    let runner = PytestCycleRunner {
        python: settings.python_path(),
        pytest_args: settings.pytest_args.clone(),
        report,
        timeout: settings.cycle_timeout_secs.map(Duration::from_secs),
        sink: Arc::new(ConsoleEcho),
    };
    let cycle_config = CycleConfig {
        cycles: settings.cycles,
        failure_focus: settings.failure_focus,
        echo: settings.echo,
    };
    let console = Console {
        cycles: settings.cycles,
        failure_focus: settings.failure_focus,
        report_cycles: cli.report_cycles,
    };

    let mut store = OutcomeStore::new(selectors.ids());
    let run_report = run_cycles(
        &mut store,
        &selectors,
        &runner,
        &cycle_config,
        &CancelFlag::new(),
        |event| {
            for line in console.event_lines(event) {
                println!("{line}");
            }
        },
    )?;
    print!("{}", console.render(&run_report));

    if let Some(path) = &cli.report_json {
        write_report(path, &run_report)?;
    }

    Ok(if run_report.summary.all_clean() {
        exit_codes::OK
    } else {
        exit_codes::ATTENTION
    })
}

/// Config file values with command-line flags applied on top.
fn settings(cli: &Cli) -> Result<TestwangConfig> {
    let mut settings = match &cli.config {
        Some(path) if !path.exists() => {
            return Err(anyhow!("config file {} not found", path.display()));
        }
        Some(path) => load_config(path)?,
        None => load_config(Path::new(DEFAULT_CONFIG_FILE))?,
    };

    if let Some(python) = &cli.python {
        settings.python.clone_from(python);
    }
    if let Some(cycles) = cli.cycles {
        settings.cycles = cycles;
    }
    if let Some(echo) = cli.echo() {
        settings.echo = echo;
    }
    settings.failure_focus |= cli.failure_focus;
    settings.resolve_modules |= cli.resolve_modules;
    settings
        .pytest_args
        .extend(expand_args(&cli.pytest_args));

    settings.validate().context("validate settings")?;
    debug!(?settings, "effective settings");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("testwang").chain(args.iter().copied()))
            .expect("parse")
    }

    #[test]
    fn parse_minimal() {
        let cli = parse(&["tests.txt"]);
        assert_eq!(cli.tests_file, PathBuf::from("tests.txt"));
        assert_eq!(cli.cycles, None);
        assert_eq!(cli.echo(), None);
        assert!(cli.pytest_args.is_empty());
    }

    #[test]
    fn parse_short_flags_and_passthrough() {
        let cli = parse(&[
            "tests.txt", "-N", "4", "-F", "-R", "-E", "-P", "/opt/py", "--", "-x", "-k", "slow",
        ]);
        assert_eq!(cli.cycles, Some(4));
        assert!(cli.failure_focus);
        assert!(cli.report_cycles);
        assert_eq!(cli.echo(), Some(Echo::Final));
        assert_eq!(cli.python.as_deref(), Some("/opt/py"));
        assert_eq!(cli.pytest_args, vec!["-x", "-k", "slow"]);
    }

    #[test]
    fn echo_flags_conflict() {
        let result = Cli::try_parse_from(["testwang", "tests.txt", "-e", "-E"]);
        assert!(result.is_err());
    }

    #[test]
    fn zero_cycles_rejected_by_parser() {
        let result = Cli::try_parse_from(["testwang", "tests.txt", "-N", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("testwang.toml");
        std::fs::write(
            &path,
            "python = \"python3.12\"\ncycles = 3\necho = \"all\"\npytest_args = [\"-q\"]\n",
        )
        .expect("write");
        let config = path.to_string_lossy().into_owned();

        let cli = parse(&["tests.txt", "--config", &config, "-N", "7", "-E", "--", "-x"]);
        let settings = settings(&cli).expect("settings");
        assert_eq!(settings.python, "python3.12");
        assert_eq!(settings.cycles, 7);
        assert_eq!(settings.echo, Echo::Final);
        assert_eq!(settings.pytest_args, vec!["-q", "-x"]);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("nope.toml");
        let missing = missing.to_string_lossy().into_owned();
        let cli = parse(&["tests.txt", "--config", &missing]);
        assert!(settings(&cli).is_err());
    }
}
