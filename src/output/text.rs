use crate::error::BrokerError;
use crate::models::Task;
use crate::scheduler::PickOutcome;

pub fn print_err(err: &BrokerError) {
    eprintln!("Error: {}", err.message);
}

pub fn format_task_line(task: &Task) -> String {
    format!(
        "[{}] {} ({}/{}) priority={} {}",
        &task.id[..8.min(task.id.len())],
        task.title,
        task.lane.as_str(),
        task.status.as_str(),
        task.priority,
        task.archetype.as_str(),
    )
}

pub fn format_pick_outcome(outcome: &PickOutcome) -> String {
    match outcome {
        PickOutcome::Picked { task, preempted, lease_id } => {
            format!(
                "picked {} lease={} reason={}",
                format_task_line(task),
                &lease_id[..8.min(lease_id.len())],
                if *preempted { "preempt" } else { "rotation" },
            )
        }
        PickOutcome::NoWork { pending_total, blocked_lanes } => {
            if blocked_lanes.is_empty() {
                format!("no work available ({pending_total} pending)")
            } else {
                format!(
                    "no work available ({pending_total} pending); blocked lanes: {}",
                    blocked_lanes
                        .iter()
                        .map(|(lane, info)| format!("{lane}:{}", info.blocked_reason))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        }
    }
}
