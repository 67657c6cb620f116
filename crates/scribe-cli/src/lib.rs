use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use scribe_core::{Clock, Configuration, EntryStore, ShowKind, SkipTimeout, SystemClock};
use scribe_fs::{
    default_entries_dir, long_date, state_dir, DirectoryConfig, DirectoryOrigin, FsConfigStore,
    FsEntryStore,
};
use scribe_tui::{run_daemon, run_review, start_logging, sync_login_item};
use scribe_watch::request_activation;

#[derive(Parser)]
#[command(name = "scribe", version, about = "Sunrise Scribe: write your morning entry before the day starts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Stay running and show the entry form after unlock or resume.
    Run,
    /// Open today's entry for review or editing.
    Review,
    /// Ask the running instance to show the form.
    Activate {
        /// Show today's entry even if it is already written.
        #[arg(long)]
        review: bool,
    },
    /// Choose the entries folder, skip timeout and login behaviour.
    Setup {
        /// Accept every default without prompting.
        #[arg(long)]
        yes: bool,
    },
    /// Show whether today's entry is written and where entries go.
    Status,
    /// Inspect or change settings.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the stored configuration.
    Show,
    /// Save new entries to another folder.
    SetDir { path: PathBuf },
    /// Seconds before the form can be skipped (10, 15, 30, 45, 60, 120).
    SetTimeout { seconds: u32 },
    /// Start automatically at login.
    LaunchAtLogin { state: Toggle },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl From<Toggle> for bool {
    fn from(value: Toggle) -> Self {
        matches!(value, Toggle::On)
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    start_logging();

    let command = match cli.command {
        Some(c) => c,
        None => return run_daemon(),
    };

    match command {
        Command::Run => run_daemon(),
        Command::Review => run_review(),
        Command::Activate { review } => activate(review),
        Command::Setup { yes } => setup(yes),
        Command::Status => status(),
        Command::Config { action } => config(action),
    }
}

fn activate(review: bool) -> Result<()> {
    let kind = review.then_some(ShowKind::Review);
    let path = request_activation(&state_dir()?, kind).context("failed to send activation request")?;
    info!("event=activation_requested path={}", path.display());
    println!("Asked Sunrise Scribe to show the form.");
    Ok(())
}

struct SetupAnswers {
    directory: PathBuf,
    skip_timeout: SkipTimeout,
    launch_at_login: bool,
}

fn setup(accept_defaults: bool) -> Result<()> {
    let store = FsConfigStore::open_default()?;
    let current = store.load_or_default();
    let default_dir = current
        .storage_directory
        .clone()
        .unwrap_or_else(default_entries_dir);

    let stdin = io::stdin();
    let answers = ask_setup(
        &mut stdin.lock(),
        &mut io::stdout(),
        &current,
        &default_dir,
        accept_defaults,
    )?;

    std::fs::create_dir_all(&answers.directory)
        .with_context(|| format!("failed to create {}", answers.directory.display()))?;
    DirectoryConfig::new(store.clone())
        .set(&answers.directory)
        .context("entries folder is not usable")?;
    let config = store.update(|config| {
        config.skip_timeout = answers.skip_timeout;
        config.launch_at_login = answers.launch_at_login;
        config.setup_completed = true;
    })?;
    if let Err(err) = sync_login_item(config.launch_at_login) {
        warn!("event=login_item_sync_failed reason=\"{err}\"");
        eprintln!("warning: could not update login item: {err:#}");
    }

    info!("event=setup_completed path={}", answers.directory.display());
    println!("Entries will be saved to {}", answers.directory.display());
    println!("The form can be skipped after {}", config.skip_timeout);
    println!("Setup complete. Keep `scribe run` going, or log in again to start it.");
    Ok(())
}

fn ask_setup(
    input: &mut impl BufRead,
    output: &mut impl Write,
    current: &Configuration,
    default_dir: &Path,
    accept_defaults: bool,
) -> Result<SetupAnswers> {
    if accept_defaults {
        return Ok(SetupAnswers {
            directory: default_dir.to_path_buf(),
            skip_timeout: current.skip_timeout,
            launch_at_login: current.launch_at_login,
        });
    }

    let directory = prompt(
        input,
        output,
        "Where should entries be saved?",
        &default_dir.display().to_string(),
    )?;
    let directory = expand_home(&directory);

    let skip_timeout = loop {
        let answer = prompt(
            input,
            output,
            "Seconds before the form can be skipped (10, 15, 30, 45, 60, 120)?",
            &current.skip_timeout.seconds().to_string(),
        )?;
        match answer.parse::<u32>().map_err(|err| anyhow!(err)).and_then(|secs| {
            SkipTimeout::new(secs).map_err(|err| anyhow!(err))
        }) {
            Ok(timeout) => break timeout,
            Err(err) => writeln!(output, "  {err}")?,
        }
    };

    let launch_default = if current.launch_at_login { "yes" } else { "no" };
    let launch_at_login = loop {
        let answer = prompt(input, output, "Start automatically at login?", launch_default)?;
        match answer.to_ascii_lowercase().as_str() {
            "y" | "yes" => break true,
            "n" | "no" => break false,
            _ => writeln!(output, "  please answer yes or no")?,
        }
    };

    Ok(SetupAnswers {
        directory,
        skip_timeout,
        launch_at_login,
    })
}

fn prompt(
    input: &mut impl BufRead,
    output: &mut impl Write,
    question: &str,
    default: &str,
) -> Result<String> {
    write!(output, "{question} [{default}]: ")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(anyhow!("setup cancelled: no more input"));
    }
    let answer = line.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

fn expand_home(raw: &str) -> PathBuf {
    match (raw.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ if raw == "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw)),
        _ => PathBuf::from(raw),
    }
}

fn status() -> Result<()> {
    let config_store = FsConfigStore::open_default()?;
    let config = config_store.load_or_default();
    let store = FsEntryStore::new(DirectoryConfig::new(config_store.clone()));
    print!(
        "{}",
        status_report(&store, &config, config_store.path(), SystemClock.today())
    );
    Ok(())
}

fn status_report(
    store: &FsEntryStore,
    config: &Configuration,
    config_path: &Path,
    today: NaiveDate,
) -> String {
    let written = match store.read(today) {
        Ok(Some(entry)) if entry.is_complete() => "written",
        Ok(Some(_)) => "partly written",
        Ok(None) => "not written yet",
        Err(_) => "unreadable",
    };
    let resolved = store.directory().resolved();
    let origin = match resolved.origin {
        DirectoryOrigin::Environment => "from SUNRISE_SCRIBE_DIR",
        DirectoryOrigin::Configured => "configured",
        DirectoryOrigin::Fallback(_) => "default",
    };

    let mut report = format!("Today ({}): {written}\n", long_date(today));
    report.push_str(&format!(
        "Entries: {} ({origin})\n",
        resolved.path.display()
    ));
    if let Some(notice) = store.directory().notice() {
        report.push_str(&format!("Notice: {notice}\n"));
    }
    report.push_str(&format!("Skip timeout: {}\n", config.skip_timeout));
    report.push_str(&format!(
        "Launch at login: {}\n",
        if config.launch_at_login { "on" } else { "off" }
    ));
    report.push_str(&format!(
        "Setup: {}\n",
        if config.setup_completed {
            "complete"
        } else {
            "pending (run `scribe setup`)"
        }
    ));
    report.push_str(&format!("Config file: {}\n", config_path.display()));
    report
}

fn config(action: ConfigCommand) -> Result<()> {
    let store = FsConfigStore::open_default()?;
    match action {
        ConfigCommand::Show => {
            let config = store.load().context("failed to read configuration")?;
            let yaml = serde_yaml::to_string(&config).context("failed to render configuration")?;
            println!("# {}", store.path().display());
            print!("{yaml}");
        }
        ConfigCommand::SetDir { path } => {
            let path = expand_home(&path.to_string_lossy());
            DirectoryConfig::new(store)
                .set(&path)
                .with_context(|| format!("cannot use {}", path.display()))?;
            println!("Entries will be saved to {}", path.display());
        }
        ConfigCommand::SetTimeout { seconds } => {
            let timeout = SkipTimeout::new(seconds)?;
            store.update(|config| config.skip_timeout = timeout)?;
            println!("The form can be skipped after {timeout}");
        }
        ConfigCommand::LaunchAtLogin { state } => {
            let enabled = bool::from(state);
            store.update(|config| config.launch_at_login = enabled)?;
            sync_login_item(enabled).context("failed to update login item")?;
            println!("Launch at login {}", if enabled { "on" } else { "off" });
        }
    }
    Ok(())
}
