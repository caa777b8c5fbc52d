use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "taskbroker", version = env!("GIT_VERSION"), about = "Task broker and review pipeline", long_about = None)]
pub struct Cli {
    /// Emit machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Scope the command to a specific plan (name, id, or id prefix).
    #[arg(long, global = true)]
    pub plan: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the store and state directories.
    Init,

    #[command(subcommand)]
    Plan(PlanCommands),

    /// Ask the scheduler for the next task.
    #[command(after_help = "Exit code 2 means no schedulable work is currently available.")]
    Next {
        /// Claim and lease the task instead of only previewing it.
        #[arg(long)]
        claim: bool,
        #[arg(long)]
        worker_id: Option<String>,
        #[arg(long)]
        worker_type: Option<String>,
    },

    /// Extend leases for a worker's in-flight tasks and record liveness.
    Heartbeat {
        #[arg(long)]
        worker_id: String,
        #[arg(long)]
        worker_type: Option<String>,
        #[arg(long = "task")]
        tasks: Vec<String>,
    },

    /// Submit a finished task for review.
    Complete {
        task_id: String,
        #[arg(long)]
        worker_id: String,
        #[arg(long)]
        lease_id: String,
        #[arg(long)]
        ok: bool,
        #[arg(long)]
        output: Option<String>,
    },

    /// Record a Gavel review decision.
    Review {
        task_id: String,
        #[arg(long)]
        decision: String,
        #[arg(long)]
        notes: String,
        #[arg(long)]
        actor: String,
    },

    /// Print a read-only projection of current execution state.
    Snapshot,

    /// Print the readiness gate's current PRD/SPEC/DECISION_LOG scoring.
    Readiness,

    #[command(subcommand)]
    Admin(AdminCommands),
}

#[derive(Debug, Subcommand)]
pub enum AdminCommands {
    /// Force-cancel an in-progress task: clears its lease and moves it to
    /// `blocked`, the same transition a worker's own blocker message takes.
    Block {
        task_id: String,
        #[arg(long)]
        reason: String,
    },
    /// Permanently delete a task and everything that references it.
    Purge { task_id: String },
}

#[derive(Debug, Subcommand)]
pub enum PlanCommands {
    /// Accept a plan artifact from disk.
    Accept { path: std::path::PathBuf },
    /// Show a single plan and its tasks.
    Show { reference: String },
    /// List all known plans.
    List,
    /// Make a plan the default target for commands that omit `--plan`.
    Activate { reference: String },
}
