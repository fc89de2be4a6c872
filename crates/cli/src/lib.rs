pub mod commands;

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use hostdesk_core::config::{LogFormat, LoggingConfig};
use hostdesk_core::{
    EmployeeApprovalStatus, LinkedSection, NewGuestRequest, OrderId, Priority, RequestStatus,
    StatusFilter,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "hostdesk",
    about = "Hostdesk front desk operator CLI",
    long_about = "Create, approve and track guest requests, and inspect the shared request store.",
    after_help = "Examples:\n  hostdesk seed\n  hostdesk queue --employee emp1\n  hostdesk approve R1 --employee emp1\n  hostdesk list --status in-progress --search 204"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset, or remove it with --clean")]
    Seed {
        #[arg(long, help = "Remove demo records instead of loading them")]
        clean: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Create a guest request")]
    Create(CreateArgs),
    #[command(about = "Manager view: list requests by status and search term, with counters")]
    List {
        #[arg(long, default_value = "all", help = "Exact request status, or `all`")]
        status: StatusFilter<RequestStatus>,
        #[arg(long, default_value = "", help = "Matches guest, room, type or description")]
        search: String,
    },
    #[command(about = "Employee view: requests assigned to one employee")]
    Queue {
        #[arg(long)]
        employee: String,
        #[arg(long, default_value = "all", help = "Employee approval status, or `all`")]
        status: StatusFilter<EmployeeApprovalStatus>,
        #[arg(long, default_value = "")]
        search: String,
    },
    #[command(about = "Approve a pending request as the assigned employee")]
    Approve {
        id: String,
        #[arg(long)]
        employee: String,
    },
    #[command(about = "Reject a pending request as the assigned employee")]
    Reject {
        id: String,
        #[arg(long)]
        employee: String,
    },
    #[command(name = "set-status", about = "Manager override of a request's status")]
    SetStatus {
        id: String,
        status: RequestStatus,
        #[arg(long = "as", default_value = "manager")]
        operator: String,
    },
    #[command(about = "Permanently delete a request")]
    Delete {
        id: String,
        #[arg(long, help = "Confirm the irreversible deletion")]
        yes: bool,
        #[arg(long = "as", default_value = "manager")]
        operator: String,
    },
    #[command(about = "List manager notifications")]
    Notifications {
        #[arg(long, value_name = "ID", help = "Mark one notification read first")]
        mark_read: Option<String>,
    },
    #[command(about = "Stream queue snapshots as the store changes")]
    Watch {
        #[arg(long, help = "Watch one employee's queue and play the pending alert")]
        employee: Option<String>,
        #[arg(long, help = "Stop after this many changes")]
        max_events: Option<u32>,
    },
}

#[derive(Debug, Args)]
struct CreateArgs {
    #[arg(long)]
    room: String,
    #[arg(long)]
    guest: String,
    #[arg(long = "type")]
    request_type: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long, default_value = "medium")]
    priority: Priority,
    #[arg(long, help = "Assigned employee; the request then awaits their approval")]
    employee: Option<String>,
    #[arg(long, requires = "order")]
    section: Option<LinkedSection>,
    #[arg(long, requires = "section")]
    order: Option<String>,
    #[arg(long = "as", default_value = "frontdesk")]
    operator: String,
}

impl CreateArgs {
    fn into_input(self) -> (NewGuestRequest, String) {
        let input = NewGuestRequest {
            room: self.room,
            guest: self.guest,
            phone: self.phone,
            request_type: self.request_type,
            description: self.description,
            notes: self.notes,
            priority: self.priority,
            assigned_employee: self.employee,
            linked_section: self.section,
            original_order_id: self.order.map(OrderId),
        };
        (input, self.operator)
    }
}

/// Installs the stderr subscriber; stdout stays reserved for command output.
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(logging: &LoggingConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|error| error.to_string())
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed { clean } => commands::seed::run(clean),
        Command::Config => commands::config::run(),
        Command::Create(args) => {
            let (input, operator) = args.into_input();
            commands::requests::create(input, &operator)
        }
        Command::List { status, search } => commands::requests::list(status, search),
        Command::Queue { employee, status, search } => {
            commands::queue::run(&employee, status, search)
        }
        Command::Approve { id, employee } => commands::requests::approve(id, &employee),
        Command::Reject { id, employee } => commands::requests::reject(id, &employee),
        Command::SetStatus { id, status, operator } => {
            commands::requests::set_status(id, status, &operator)
        }
        Command::Delete { id, yes, operator } => commands::requests::delete(id, yes, &operator),
        Command::Notifications { mark_read } => commands::notifications::run(mark_read),
        Command::Watch { employee, max_events } => commands::watch::run(employee, max_events),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use hostdesk_core::{EmployeeApprovalStatus, StatusFilter};

    use super::{Cli, Command};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn queue_status_parses_into_filter() {
        let cli = Cli::try_parse_from([
            "hostdesk", "queue", "--employee", "emp1", "--status", "pending",
        ])
        .expect("queue args parse");
        match cli.command {
            Command::Queue { employee, status, search } => {
                assert_eq!(employee, "emp1");
                assert_eq!(status, StatusFilter::Only(EmployeeApprovalStatus::Pending));
                assert!(search.is_empty());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn linked_section_requires_an_order() {
        let result = Cli::try_parse_from([
            "hostdesk", "create", "--room", "204", "--guest", "Layla", "--type", "coffee",
            "--section", "coffee",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_status_is_rejected_by_the_parser() {
        let result = Cli::try_parse_from(["hostdesk", "set-status", "R1", "archived"]);
        assert!(result.is_err());
    }
}
