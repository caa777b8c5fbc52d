use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use taskbroker::cli::{Cli, Commands};
use taskbroker::cli::commands::{AdminCommands, PlanCommands};
use taskbroker::error::BrokerError;
use taskbroker::output::{render_err, render_ok};
use taskbroker::scheduler::PickOutcome;
use taskbroker::store;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let json_mode = cli.json;

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            render_err(json_mode, &e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, BrokerError> {
    match &cli.command {
        Commands::Init => {
            let path = store::init_db()?;
            render_ok(cli.json, &path.display().to_string(), || format!("initialized store at {}", path.display()));
            Ok(ExitCode::SUCCESS)
        }

        Commands::Plan(sub) => run_plan(cli, sub),

        Commands::Next { claim, worker_id, worker_type } => run_next(cli, *claim, worker_id.as_deref(), worker_type.as_deref()),

        Commands::Heartbeat { worker_id, worker_type, tasks } => {
            let conn = store::open_db()?;
            let allowed: Vec<String> = taskbroker::models::LANE_ORDER.iter().map(|s| s.to_string()).collect();
            let extended = taskbroker::scheduler::lease::heartbeat(&conn, worker_id, worker_type.as_deref(), &allowed, tasks)?;
            render_ok(cli.json, &extended, || format!("extended {extended} lease(s)"));
            Ok(ExitCode::SUCCESS)
        }

        Commands::Complete { task_id, worker_id, lease_id, ok, output } => {
            let conn = store::open_db()?;
            let active = store::plan_repo::resolve_scoped_plan(&conn, cli.plan.as_deref())?;
            let task = store::task_repo::resolve_task_ref(&conn, &active.id, task_id)?;
            let result = taskbroker::scheduler::lease::CompleteResult {
                output: output.clone(),
                evidence: Vec::new(),
                ok: *ok,
            };
            let updated = taskbroker::scheduler::lease::complete(&conn, &task.id, worker_id, lease_id, result)?;
            render_ok(cli.json, &updated, || taskbroker::output::text::format_task_line(&updated));
            Ok(ExitCode::SUCCESS)
        }

        Commands::Review { task_id, decision, notes, actor } => {
            let conn = store::open_db()?;
            let active = store::plan_repo::resolve_scoped_plan(&conn, cli.plan.as_deref())?;
            let task = store::task_repo::resolve_task_ref(&conn, &active.id, task_id)?;
            let state_dir = store::state_dir()?;
            let registry = taskbroker::gavel::cached_registry(&state_dir)?;
            let outcome =
                taskbroker::gavel::submit_review_decision(&conn, registry, &state_dir, &task.id, decision, notes, actor)?;
            render_ok(cli.json, &outcome, || {
                format!("{} -> {}", task.id, outcome.decision.as_str())
            });
            Ok(ExitCode::SUCCESS)
        }

        Commands::Snapshot => {
            let conn = store::open_db()?;
            let docs_dir = store::docs_dir()?;
            let snapshot = taskbroker::snapshot::get_exec_snapshot(&conn, &docs_dir);
            render_ok(cli.json, &snapshot, || format!("{:#?}", snapshot));
            Ok(ExitCode::SUCCESS)
        }

        Commands::Readiness => {
            let docs_dir = store::docs_dir()?;
            let readiness = taskbroker::readiness::get_context_readiness(&docs_dir);
            render_ok(cli.json, &readiness, || format!("{:?} blocking={:?}", readiness.status, readiness.blocking_files));
            Ok(ExitCode::SUCCESS)
        }

        Commands::Admin(sub) => run_admin(cli, sub),
    }
}

fn run_admin(cli: &Cli, sub: &AdminCommands) -> Result<ExitCode, BrokerError> {
    match sub {
        AdminCommands::Block { task_id, reason } => {
            let conn = store::open_db()?;
            let active = store::plan_repo::resolve_scoped_plan(&conn, cli.plan.as_deref())?;
            let task = store::task_repo::resolve_task_ref(&conn, &active.id, task_id)?;
            let updated = store::transaction(&conn, |tx| {
                let updated = store::state_writer::update_task_state(
                    tx,
                    &task.id,
                    taskbroker::models::TaskStatus::Blocked,
                    store::state_writer::StateMutation::default(),
                )?;
                store::message_repo::insert_message(
                    tx,
                    &task.id,
                    taskbroker::models::MessageRole::Admin,
                    "force_cancel",
                    reason,
                )?;
                Ok(updated)
            })?;
            render_ok(cli.json, &updated, || taskbroker::output::text::format_task_line(&updated));
            Ok(ExitCode::SUCCESS)
        }
        AdminCommands::Purge { task_id } => {
            let conn = store::open_db()?;
            let active = store::plan_repo::resolve_scoped_plan(&conn, cli.plan.as_deref())?;
            let task = store::task_repo::resolve_task_ref(&conn, &active.id, task_id)?;
            store::task_repo::delete_task(&conn, &task.id)?;
            render_ok(cli.json, &task.id, || format!("purged {}", task.id));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_plan(cli: &Cli, sub: &PlanCommands) -> Result<ExitCode, BrokerError> {
    match sub {
        PlanCommands::Accept { path } => {
            let conn = store::open_db()?;
            let docs_dir = store::docs_dir()?;
            let outcome = taskbroker::plan_acceptor::accept_plan(&conn, &docs_dir, path)?;
            match &outcome {
                taskbroker::plan_acceptor::AcceptOutcome::Created { plan_id, tasks, .. } => {
                    render_ok(cli.json, &outcome, || format!("plan {plan_id} accepted with {} tasks", tasks.len()));
                    Ok(ExitCode::SUCCESS)
                }
                taskbroker::plan_acceptor::AcceptOutcome::AlreadyAccepted { plan_hash } => {
                    render_ok(cli.json, &outcome, || format!("plan already accepted (hash {plan_hash})"));
                    Ok(ExitCode::SUCCESS)
                }
                taskbroker::plan_acceptor::AcceptOutcome::BlockedBootstrap { blocking_files } => {
                    render_ok(cli.json, &outcome, || format!("blocked: bootstrap incomplete ({})", blocking_files.join(", ")));
                    Ok(ExitCode::SUCCESS)
                }
            }
        }
        PlanCommands::Show { reference } => {
            let conn = store::open_db()?;
            let plan = store::plan_repo::resolve_plan_ref(&conn, reference)?;
            let tasks = store::task_repo::list_tasks_for_plan(&conn, &plan.id)?;
            render_ok(cli.json, &(&plan, &tasks), || {
                let mut out = format!("{} ({})\n", plan.title, plan.name);
                for t in &tasks {
                    out.push_str(&taskbroker::output::text::format_task_line(t));
                    out.push('\n');
                }
                out
            });
            Ok(ExitCode::SUCCESS)
        }
        PlanCommands::List => {
            let conn = store::open_db()?;
            let plans = store::plan_repo::list_plans(&conn)?;
            render_ok(cli.json, &plans, || {
                plans.iter().map(|p| format!("{} ({})", p.name, p.status.as_str())).collect::<Vec<_>>().join("\n")
            });
            Ok(ExitCode::SUCCESS)
        }
        PlanCommands::Activate { reference } => {
            let conn = store::open_db()?;
            let plan = store::plan_repo::resolve_plan_ref(&conn, reference)?;
            store::plan_repo::set_active_plan(&plan.id)?;
            render_ok(cli.json, &plan, || format!("active plan set to {} ({})", plan.name, plan.id));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_next(cli: &Cli, claim: bool, worker_id: Option<&str>, worker_type: Option<&str>) -> Result<ExitCode, BrokerError> {
    let conn = store::open_db()?;
    let active = store::plan_repo::resolve_scoped_plan(&conn, cli.plan.as_deref())?;
    let worker_id = worker_id.unwrap_or("anonymous");

    let outcome = taskbroker::scheduler::pick_next(&conn, &active.id, worker_id, worker_type, &[])?;

    // `--plan` without `--claim` previews the pick: release the lease
    // immediately so the task stays pending for whoever asks next.
    if !claim {
        if let PickOutcome::Picked { task, .. } = &outcome {
            store::state_writer::update_task_state(
                &conn,
                &task.id,
                taskbroker::models::TaskStatus::Pending,
                store::state_writer::StateMutation::default(),
            )?;
        }
    }

    render_ok(cli.json, &outcome, || taskbroker::output::text::format_pick_outcome(&outcome));

    match outcome {
        PickOutcome::Picked { .. } => Ok(ExitCode::SUCCESS),
        PickOutcome::NoWork { .. } => Ok(ExitCode::from(2)),
    }
}
