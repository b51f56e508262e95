use clap::{Parser, Subcommand};
use colored::*;
use std::time::Duration;
use taskdeck_client::{ClientConfig, SessionToken, TaskClient, TaskState};
use taskdeck_core::{PendingOperation, Task, TaskDraft};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "Offline-aware task list client", long_about = None)]
struct Cli {
    /// Collection API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Live update WebSocket URL
    #[arg(long)]
    ws_url: Option<String>,

    /// Disable the live update channel
    #[arg(long)]
    no_live: bool,

    /// SQLite database file (created if missing)
    #[arg(short, long)]
    database: Option<String>,

    /// Tasks per page
    #[arg(long)]
    page_size: Option<usize>,

    /// Session token sent as a bearer token
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show one page of tasks
    List {
        /// Zero-based page number
        #[arg(short, long, default_value_t = 0)]
        page: usize,
    },
    /// Create a task
    Add {
        text: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        /// ISO 8601 date
        #[arg(long)]
        date: Option<String>,
    },
    /// Mark a task on the first page as completed
    Complete { id: String },
    /// Delete a task on the first page
    Remove { id: String },
    /// Show operations waiting to be replayed
    Pending,
    /// Print the page on every change until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let wait_limit = config.request_timeout + Duration::from_secs(2);
    let session = SessionToken::new(cli.token.clone());

    let client = TaskClient::start(config, session).await?;
    let mut rx = client.tasks().subscribe();

    let ready = wait_for(&mut rx, wait_limit, |s| {
        !s.is_fetching() && (s.loaded || s.fetch_error.is_some())
    })
    .await?;

    match cli.command {
        Command::List { page } => {
            let offset = page * ready.window.page_size;
            let state = if offset == ready.offset() {
                ready
            } else {
                client.tasks().request_page(offset).await?;
                wait_for(&mut rx, wait_limit, |s| {
                    !s.is_fetching() && (s.offset() == offset || s.fetch_error.is_some())
                })
                .await?
            };
            print_page(&state);
        }
        Command::Add {
            text,
            description,
            amount,
            date,
        } => {
            let before = ready.tasks.len();
            let draft = TaskDraft {
                description,
                amount,
                date,
                ..TaskDraft::new(text)
            };
            client.tasks().add_task(draft).await?;
            let state = wait_for(&mut rx, wait_limit, |s| {
                !s.is_saving() && s.tasks.len() != before
            })
            .await?;
            report_save(&state, "Task created");
        }
        Command::Complete { id } => {
            let Some(task) = find_task(&ready, &id) else {
                println!("{} {}", "No task on this page with id".red(), id.yellow());
                return Ok(());
            };
            let updated = Task {
                is_completed: Some(true),
                ..task.clone()
            };
            client.tasks().update_task(updated).await?;
            let state = wait_for(&mut rx, wait_limit, |s| {
                !s.is_saving()
                    && (s.save_error.is_some()
                        || find_task(s, &id).and_then(|t| t.is_completed) == Some(true))
            })
            .await?;
            report_save(&state, "Task completed");
        }
        Command::Remove { id } => {
            if find_task(&ready, &id).is_none() {
                println!("{} {}", "No task on this page with id".red(), id.yellow());
                return Ok(());
            }
            client.tasks().remove_task(id.clone()).await?;
            let state = wait_for(&mut rx, wait_limit, |s| {
                !s.is_saving() && find_task(s, &id).is_none()
            })
            .await?;
            report_save(&state, "Task removed");
        }
        Command::Pending => {
            let ops = client.pending_operations().await;
            if ops.is_empty() {
                println!("{}", "Nothing waiting to sync".green());
            }
            for (index, op) in ops.iter().enumerate() {
                print_operation(index, op);
            }
        }
        Command::Watch => {
            print_page(&ready);
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = rx.borrow_and_update().clone();
                        if !state.is_fetching() {
                            print_page(&state);
                        }
                    }
                }
            }
        }
    }

    client.shutdown();
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(url) = &cli.ws_url {
        config.ws_url = Some(url.clone());
    }
    if cli.no_live {
        config.ws_url = None;
    }
    if let Some(database) = &cli.database {
        config.database_url = format!("sqlite:{}?mode=rwc", database);
    }
    if let Some(page_size) = cli.page_size.filter(|size| *size > 0) {
        config.page_size = page_size;
    }
    Ok(config)
}

async fn wait_for(
    rx: &mut watch::Receiver<TaskState>,
    limit: Duration,
    predicate: impl FnMut(&TaskState) -> bool,
) -> Result<TaskState, Box<dyn std::error::Error>> {
    let state = tokio::time::timeout(limit, rx.wait_for(predicate))
        .await
        .map_err(|_| "timed out waiting for the task list")??
        .clone();
    Ok(state)
}

fn find_task<'a>(state: &'a TaskState, id: &str) -> Option<&'a Task> {
    state.tasks.iter().find(|task| task.id.as_deref() == Some(id))
}

fn print_page(state: &TaskState) {
    let window = &state.window;
    let range_end = window.offset + state.tasks.len();
    let total = window
        .total
        .map(|total| total.to_string())
        .unwrap_or_else(|| "?".to_string());

    println!(
        "{} {}-{} of {}",
        "Tasks".bold().cyan(),
        window.offset + usize::from(!state.tasks.is_empty()),
        range_end,
        total
    );

    if let Some(error) = &state.fetch_error {
        println!("{} {}", "Could not load tasks:".red(), error);
    }
    for task in &state.tasks {
        print_task(task);
    }
    if state.tasks.is_empty() && state.fetch_error.is_none() {
        println!("  {}", "(no tasks)".dimmed());
    }
    if window.has_more {
        println!("  {}", "more tasks on the next page".dimmed());
    }
    if state.pending_operations > 0 {
        println!(
            "{}",
            format!("{} change(s) waiting to sync", state.pending_operations).yellow()
        );
    }
}

fn print_task(task: &Task) {
    let check = if task.is_completed == Some(true) {
        "[x]".green()
    } else {
        "[ ]".normal()
    };
    let id = task.id.as_deref().unwrap_or("-");
    let mut line = format!("  {} {} {}", check, task.text.bold(), id.dimmed());

    if let Some(amount) = task.amount {
        line.push_str(&format!(" {}", format!("{:.2}", amount).cyan()));
    }
    if let Some(date) = &task.date {
        line.push_str(&format!(" {}", date.blue()));
    }
    if let Some(action) = task.pending_action {
        line.push_str(&format!(" {}", format!("({} pending)", action).yellow()));
    }
    println!("{}", line);

    if let Some(description) = &task.description {
        println!("      {}", description.dimmed());
    }
}

fn print_operation(index: usize, op: &PendingOperation) {
    let label = match op {
        PendingOperation::Create { task } | PendingOperation::Update { task } => {
            task.text.clone()
        }
        PendingOperation::Delete { id } => id.clone(),
    };
    println!(
        "{:>3}. {} {}",
        index + 1,
        op.action().to_string().yellow(),
        label
    );
}

fn report_save(state: &TaskState, success: &str) {
    match &state.save_error {
        Some(error) => println!(
            "{} {}",
            "Saved locally, will sync when back online:".yellow(),
            error
        ),
        None => println!("{}", success.green()),
    }
}
