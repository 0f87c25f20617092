mod app;
mod board;
mod config;
mod input;
mod store;
mod ui;

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, eyre, WrapErr};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use board::bulk::{BulkField, FieldChange};
use board::controller::BoardController;
use board::drag::DropTarget;
use board::notice::Severity;
use board::{columns, NewTask, Priority, Status, Task, TaskFilter, TaskId};
use store::fs::{
    find_store_dir, init_store, load_local_config, save_local_config, ActivityEntry, FsStore, STORE_DIR,
};
use store::{StoreError, TaskStore};

#[derive(Parser)]
#[command(name = "tasklane", about = "A keyboard-first kanban board with bulk edits and undo")]
struct Cli {
    /// Log filter, e.g. `debug` or `tasklane=trace` (overrides local.toml)
    #[arg(long, global = true, env = "TASKLANE_LOG")]
    log_level: Option<String>,

    /// Project to work on (defaults to the first configured project)
    #[arg(long, global = true)]
    project: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new .tasklane/ store in the current directory
    Init {
        /// Store name (defaults to current directory name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Add a new task
    Add {
        /// Task title
        title: String,
        /// Column to create the task in
        #[arg(short, long, default_value = "todo")]
        status: Status,
        /// Priority (low, medium, high, critical)
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Assigned user id
        #[arg(short, long)]
        assignee: Option<String>,
        /// Assigned team id
        #[arg(short, long)]
        team: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: Option<NaiveDate>,
    },
    /// List tasks column by column
    List {
        /// Fuzzy search on titles
        #[arg(short = 'q', long)]
        search: Option<String>,
        #[arg(short, long)]
        status: Option<Status>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(short, long)]
        assignee: Option<String>,
        #[arg(short, long)]
        team: Option<String>,
        /// Tasks of users this person manages or of teams they lead
        #[arg(short, long)]
        lead: Option<String>,
    },
    /// Move a task to a column, optionally in front of another task
    Move {
        /// Task ID
        task_id: String,
        /// Target column (todo, in-progress, review, done)
        status: Status,
        /// Take this task's position instead of appending
        #[arg(short, long)]
        before: Option<String>,
    },
    /// Edit or delete several tasks at once
    ///
    /// `tasklane bulk priority high 3 4 7` or `tasklane bulk delete 3 4`.
    /// Use `none` as the value to clear assignee, team or due date.
    Bulk {
        /// status, priority, assignee, team, due or delete
        field: String,
        /// The new value (except for delete) followed by task IDs
        #[arg(required = true)]
        args: Vec<String>,
    },
    /// Set a column's WIP limit for the current project (0 to remove)
    Wip {
        status: Status,
        limit: u32,
    },
    /// List users and who they report to
    Users,
    /// List teams and their leads
    Teams,
    /// Stream activity log to stdout (JSONL, one entry per line)
    Log {
        /// One readable line per entry instead of raw JSON
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    // Install color_eyre for unexpected panics/errors (developer bugs).
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let cwd = match env::current_dir() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: cannot determine current directory: {e}");
            std::process::exit(1);
        }
    };

    let level = cli
        .log_level
        .clone()
        .or_else(|| configured_log_level(&cwd));
    let project = cli.project.as_deref();

    let result = match cli.command {
        None => cmd_tui(&cwd, project, level.as_deref().unwrap_or("info")),
        Some(command) => {
            init_cli_logging(level.as_deref().unwrap_or("warn"));
            match command {
                Command::Init { name } => {
                    let name = name.unwrap_or_else(|| {
                        cwd.file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("My Project")
                            .to_string()
                    });
                    cmd_init(&cwd, &name)
                }
                Command::Add { title, status, priority, assignee, team, due } => {
                    let new = NewTask {
                        title,
                        status,
                        priority,
                        assigned_user_id: assignee,
                        assigned_team_id: team,
                        due_date: due,
                        ..NewTask::default()
                    };
                    cmd_add(&cwd, project, new)
                }
                Command::List { search, status, priority, assignee, team, lead } => {
                    let filter = TaskFilter {
                        search,
                        status,
                        priority,
                        assignee,
                        team,
                        lead,
                        ..TaskFilter::default()
                    };
                    cmd_list(&cwd, project, filter)
                }
                Command::Move { task_id, status, before } => {
                    cmd_move(&cwd, project, &task_id, status, before)
                }
                Command::Bulk { field, args } => cmd_bulk(&cwd, project, &field, &args),
                Command::Wip { status, limit } => cmd_wip(&cwd, project, status, limit),
                Command::Users => cmd_users(&cwd),
                Command::Teams => cmd_teams(&cwd),
                Command::Log { pretty: false } => cmd_log(&cwd),
                Command::Log { pretty: true } => cmd_log_pretty(&cwd),
            }
        }
    };

    if let Err(e) = result {
        print_user_error(&e);
        std::process::exit(1);
    }
}

/// The `log_level` from local.toml, if a store with a readable one exists.
fn configured_log_level(cwd: &Path) -> Option<String> {
    let dir = find_store_dir(cwd).ok()?;
    load_local_config(&dir).ok().map(|cfg| cfg.log_level)
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Subcommands log to stderr so stdout stays pipeable.
fn init_cli_logging(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(level))
        .with_target(false)
        .try_init();
}

/// The TUI owns the terminal, so logs go to `<cache dir>/tasklane/tasklane.log`.
/// Returns the guard that flushes the background writer; logging is skipped
/// if the directory cannot be created.
fn init_tui_logging(level: &str) -> Option<WorkerGuard> {
    let dir = dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("tasklane");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("warning: logging disabled, cannot create {}: {e}", dir.display());
        return None;
    }
    let appender = tracing_appender::rolling::never(&dir, "tasklane.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(env_filter(level))
        .with_ansi(false)
        .try_init();
    Some(guard)
}

/// Print a user-friendly error message, with actionable hints for known error types.
fn print_user_error(error: &color_eyre::Report) {
    if let Some(store_err) = error.downcast_ref::<StoreError>() {
        match store_err {
            StoreError::NotFound(_) => {
                eprintln!("error: no tasklane store found in this directory.");
                eprintln!("  Run `tasklane init` to create one.");
            }
            StoreError::InvalidTask { path, reason } => {
                eprintln!(
                    "error: invalid task file: {}",
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or(&path.to_string_lossy())
                );
                eprintln!("  {reason}");
            }
            StoreError::UnknownTask(id) => {
                eprintln!("error: no task with id {id:?}.");
                eprintln!("  Run `tasklane list` to see task ids.");
            }
            StoreError::UnknownProject(id) => {
                eprintln!("error: no project with id {id:?}.");
                eprintln!("  Projects are listed in {STORE_DIR}/config.toml.");
            }
            StoreError::TomlDe(e) => {
                eprintln!("error: config file has invalid TOML syntax.");
                eprintln!("  {e}");
            }
            StoreError::TomlSer(e) => {
                eprintln!("error: failed to save store config.");
                eprintln!("  {e}");
            }
            StoreError::Json(e) => {
                eprintln!("error: could not encode activity entry.");
                eprintln!("  {e}");
            }
            StoreError::Io(e) => {
                eprintln!("error: could not read or write store files.");
                eprintln!("  {e}");
            }
            StoreError::Unavailable(reason) => {
                eprintln!("error: task store unavailable.");
                eprintln!("  {reason}");
            }
        }
        return;
    }

    // Fallback: print the full error chain
    eprintln!("error: {error:#}");
}

/// Open the store and resolve which project to work on.
fn open_project(cwd: &Path, project: Option<&str>) -> color_eyre::Result<(PathBuf, FsStore, String)> {
    let dir = find_store_dir(cwd)?;
    let store = FsStore::open(&dir)?;
    let projects = store.projects()?;
    let id = match project {
        Some(p) if projects.iter().any(|known| known.id == p) => p.to_string(),
        Some(p) => return Err(StoreError::UnknownProject(p.to_string()).into()),
        None => match projects.into_iter().next() {
            Some(p) => p.id,
            None => bail!("no projects configured in {}", dir.display()),
        },
    };
    Ok((dir, store, id))
}

/// Open a board the way the TUI does: local settings and WIP limits applied.
fn open_board(cwd: &Path, project: Option<&str>) -> color_eyre::Result<BoardController<FsStore>> {
    let (dir, store, project_id) = open_project(cwd, project)?;
    let local = load_local_config(&dir).wrap_err("failed to read local.toml")?;
    let mut ctl = BoardController::open(store, TaskFilter::for_project(&project_id), local.settings())?;
    ctl.set_wip_limits(local.wip_limits_for(&project_id));
    Ok(ctl)
}

/// Turn the outcome notice of a CLI mutation into output or an error.
fn report_notice(ctl: &BoardController<FsStore>) -> color_eyre::Result<()> {
    match ctl.notice() {
        Some(n) if n.severity == Severity::Error => bail!("{}", n.message),
        Some(n) => println!("{}", n.message),
        None => {}
    }
    Ok(())
}

fn cmd_init(cwd: &Path, name: &str) -> color_eyre::Result<()> {
    if cwd.join(STORE_DIR).exists() {
        bail!("{STORE_DIR}/ already exists in this directory");
    }
    init_store(cwd, name)?;
    println!("Initialized tasklane store \"{name}\" in {STORE_DIR}/");
    Ok(())
}

fn cmd_add(cwd: &Path, project: Option<&str>, mut new: NewTask) -> color_eyre::Result<()> {
    let (_, store, project_id) = open_project(cwd, project)?;
    new.project_id = project_id;
    let task = store.create_task(new)?;
    println!("Created task #{}: {} ({})", task.id, task.title, task.status.label());
    Ok(())
}

fn task_line(task: &Task) -> String {
    let mut line = format!("  {:>4}  {}  [{}]", task.id, task.title, task.priority);
    if let Some(user) = &task.assigned_user_id {
        line.push_str(&format!(" @{user}"));
    }
    if let Some(team) = &task.assigned_team_id {
        line.push_str(&format!(" #{team}"));
    }
    if let Some(due) = task.due_date {
        line.push_str(&format!(" due {due}"));
    }
    line
}

fn cmd_list(cwd: &Path, project: Option<&str>, mut filter: TaskFilter) -> color_eyre::Result<()> {
    let (dir, store, project_id) = open_project(cwd, project)?;
    let local = load_local_config(&dir).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable local.toml");
        Default::default()
    });
    filter.project_id = project_id.clone();
    let tasks = store.list_tasks(&filter)?;
    let limits = local.wip_limits_for(&project_id);

    for view in columns::project(&tasks, &limits) {
        if view.count == 0 && filter.status.is_some_and(|s| s != view.status) {
            continue;
        }
        let badge = match view.wip_limit {
            Some(limit) if view.over_limit => format!(" [{}/{limit} over]", view.count),
            Some(limit) => format!(" [{}/{limit}]", view.count),
            None => String::new(),
        };
        println!("\n{} ({}){badge}", view.status.label(), view.count);
        println!("{}", "─".repeat(40));
        for task in &view.items {
            println!("{}", task_line(task));
        }
    }
    println!();
    Ok(())
}

fn cmd_move(
    cwd: &Path,
    project: Option<&str>,
    task_id: &str,
    status: Status,
    before: Option<String>,
) -> color_eyre::Result<()> {
    let mut ctl = open_board(cwd, project)?;
    let target = match before {
        Some(anchor) => {
            let Some(anchor_task) = ctl.cache().get(&anchor) else {
                return Err(StoreError::UnknownTask(anchor).into());
            };
            if anchor_task.status != status {
                bail!(
                    "task {anchor} is in {}, not {}",
                    anchor_task.status.label(),
                    status.label()
                );
            }
            DropTarget::Task(anchor)
        }
        None => DropTarget::Column(status),
    };

    if !ctl.begin_drag(task_id) {
        return Err(StoreError::UnknownTask(task_id.to_string()).into());
    }
    if !ctl.drop_on(&target, Instant::now()) {
        println!("Nothing to move");
        return Ok(());
    }
    report_notice(&ctl)?;
    println!("Moved task #{task_id} to {}", status.label());
    Ok(())
}

fn cmd_bulk(cwd: &Path, project: Option<&str>, field: &str, args: &[String]) -> color_eyre::Result<()> {
    let (change, ids): (Option<FieldChange>, &[String]) = if field.eq_ignore_ascii_case("delete") {
        (None, args)
    } else {
        let field: BulkField = field.parse().map_err(|e: String| eyre!(e))?;
        let Some((value, ids)) = args.split_first() else {
            bail!("missing value for {}", field.as_str());
        };
        let Some(change) = FieldChange::parse(field, value).map_err(|e| eyre!(e))? else {
            println!("Nothing to change: no value given for {}", field.as_str());
            return Ok(());
        };
        (Some(change), ids)
    };
    if ids.is_empty() {
        bail!("no task ids given");
    }

    let mut ctl = open_board(cwd, project)?;
    if let Some(unknown) = ids.iter().find(|id| !ctl.cache().contains(id)) {
        return Err(StoreError::UnknownTask(unknown.clone()).into());
    }
    let ids: Vec<TaskId> = ids.to_vec();
    ctl.select_all(&ids);

    let now = Instant::now();
    match change {
        Some(change) => {
            ctl.bulk_update(change, now);
        }
        None => {
            // No one is around to undo, so skip the grace period.
            ctl.bulk_delete(now);
            ctl.flush_scheduled_delete(now);
        }
    }
    report_notice(&ctl)
}

fn cmd_wip(cwd: &Path, project: Option<&str>, status: Status, limit: u32) -> color_eyre::Result<()> {
    let (dir, _, project_id) = open_project(cwd, project)?;
    let mut local = load_local_config(&dir).wrap_err("failed to read local.toml")?;
    let mut limits = local.wip_limits_for(&project_id);
    limits.set(status, Some(limit));
    local.set_wip_limits(&project_id, &limits);
    save_local_config(&dir, &local)?;

    if limit == 0 {
        println!("Removed WIP limit for {}", status.label());
    } else {
        println!("Set WIP limit for {} to {limit}", status.label());
    }
    Ok(())
}

fn cmd_users(cwd: &Path) -> color_eyre::Result<()> {
    let store = FsStore::open(&find_store_dir(cwd)?)?;
    for user in store.list_users()? {
        match &user.manager_id {
            Some(manager) => println!("{:<12} {}  (reports to {manager})", user.id, user.name),
            None => println!("{:<12} {}", user.id, user.name),
        }
    }
    Ok(())
}

fn cmd_teams(cwd: &Path) -> color_eyre::Result<()> {
    let store = FsStore::open(&find_store_dir(cwd)?)?;
    for team in store.list_teams()? {
        match &team.lead_id {
            Some(lead) => println!("{:<12} {}  (lead {lead})", team.id, team.name),
            None => println!("{:<12} {}", team.id, team.name),
        }
    }
    Ok(())
}

fn cmd_log(cwd: &Path) -> color_eyre::Result<()> {
    use std::io::{self, BufRead, BufWriter, ErrorKind, Write};

    let store_dir = find_store_dir(cwd)?;
    let log_path = store_dir.join("activity.log");

    let file = match std::fs::File::open(&log_path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).wrap_err("failed to open activity.log"),
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for line in io::BufReader::new(file).lines() {
        let line = line.wrap_err("error reading activity.log")?;
        match writeln!(out, "{line}") {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e).wrap_err("error writing to stdout"),
        }
    }
    // BufWriter drops flush errors silently; a closed pipe is a clean exit.
    if let Err(e) = out.flush() {
        if e.kind() != ErrorKind::BrokenPipe {
            return Err(e).wrap_err("error flushing stdout");
        }
    }
    Ok(())
}

fn format_activity(entry: &ActivityEntry) -> String {
    let mut line = format!("{}  {:<12} #{:<5} {}", entry.ts, entry.action, entry.id, entry.title);
    for (key, value) in &entry.extras {
        line.push_str(&format!("  {key}={value}"));
    }
    line
}

/// Like `cmd_log`, but parsed and aligned. Malformed lines are skipped.
fn cmd_log_pretty(cwd: &Path) -> color_eyre::Result<()> {
    use std::io::{self, BufWriter, ErrorKind, Write};

    let store = FsStore::open(&find_store_dir(cwd)?)?;
    let entries = store.activity()?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for entry in &entries {
        match writeln!(out, "{}", format_activity(entry)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e).wrap_err("error writing to stdout"),
        }
    }
    if let Err(e) = out.flush() {
        if e.kind() != ErrorKind::BrokenPipe {
            return Err(e).wrap_err("error flushing stdout");
        }
    }
    Ok(())
}

fn cmd_tui(cwd: &Path, project: Option<&str>, level: &str) -> color_eyre::Result<()> {
    let store_dir = find_store_dir(cwd)?;
    let _guard = init_tui_logging(level);
    let mut terminal = ratatui::init();
    let result = app::run(&mut terminal, &store_dir, project);
    ratatui::restore();
    result
}
