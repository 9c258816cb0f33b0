use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use guidance_scheduler::{
    api::{ApiClient, ScheduleTransport},
    calendar::{self, MonthGrid},
    config::Config,
    dates,
    directory::{self, StudentNames},
    lifecycle::{self, RescheduleFlow},
    models::{
        Appointment, AppointmentFilters, AppointmentStatus, CreateAdminScheduleRequest,
        ScheduleFilters, TimeSlot,
    },
    scope::ScopeToken,
    selection::{PickerMode, SlotPicker},
    store::AppointmentStore,
};

#[derive(Parser)]
#[command(name = "guidance-scheduler")]
#[command(about = "Guidance office appointment scheduling client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List appointments
    List {
        /// Filter by status (pending, approved, completed, cancelled, rescheduled)
        #[arg(short, long)]
        status: Option<AppointmentStatus>,
        /// First day, YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,
    },

    /// Show one appointment and the actions available on it
    Show { id: i64 },

    /// Show the time slots for a date (today when omitted)
    Slots {
        #[arg(value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Request a new appointment
    Schedule {
        #[arg(short, long, value_parser = parse_date)]
        date: NaiveDate,
        #[arg(short, long, value_parser = parse_time)]
        time: NaiveTime,
        #[arg(short, long)]
        reason: String,
        #[arg(short, long, default_value = "")]
        category: String,
    },

    /// Approve a pending or rescheduled appointment
    Approve { id: i64 },

    /// Mark an approved appointment as completed
    Complete { id: i64 },

    /// Cancel an appointment
    Cancel { id: i64 },

    /// Move an appointment to a new date and time
    Reschedule {
        id: i64,
        #[arg(short, long, value_parser = parse_date)]
        date: NaiveDate,
        #[arg(short, long, value_parser = parse_time)]
        time: NaiveTime,
        /// New reason (keeps the current one when omitted)
        #[arg(short, long)]
        reason: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete an appointment record
    Delete { id: i64 },

    /// Month calendar with booked days marked
    Calendar {
        /// Month as YYYY-MM (current month when omitted)
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Every appointment on one day, earliest first (today when omitted)
    Day {
        #[arg(value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Approved and rescheduled appointments from today on
    Upcoming,

    /// Front-desk availability schedules
    Schedules {
        #[command(subcommand)]
        action: ScheduleCommands,
    },
}

#[derive(Subcommand)]
enum ScheduleCommands {
    List {
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,
    },
    Create {
        #[arg(short, long, value_parser = parse_date)]
        date: NaiveDate,
        #[arg(short, long, value_parser = parse_time)]
        start: NaiveTime,
        #[arg(short, long, value_parser = parse_time)]
        end: NaiveTime,
        #[arg(short, long)]
        note: Option<String>,
    },
    Delete { id: i64 },
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    dates::normalize_date(raw).ok_or_else(|| format!("'{raw}' is not a YYYY-MM-DD date"))
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    dates::parse_time(raw).ok_or_else(|| format!("'{raw}' is not an HH:MM time"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;
    let client = Arc::new(ApiClient::from_config(&cfg)?);
    let store = AppointmentStore::new(client.clone(), cfg.session.clone());
    let token = ScopeToken::detached();
    let today = Local::now().date_naive();

    match cli.command {
        Commands::List { status, from, to } => {
            let filters = AppointmentFilters {
                status,
                start_date: from,
                end_date: to,
            };
            load(&store, filters, &token).await?;
            let list = store.visible_appointments();
            let names = names_for(&client, &store, &list).await;
            print_table(&list, &names);
            let counts: Vec<String> = store
                .status_counts()
                .into_iter()
                .filter(|(_, n)| *n > 0)
                .map(|(s, n)| format!("{s}: {n}"))
                .collect();
            println!("\n{}", counts.join("  "));
        }
        Commands::Show { id } => {
            let appointment = store
                .fetch_appointment(id, &token)
                .await
                .ok_or_else(|| anyhow!(store_error(&store)))?;
            print_detail(&appointment);
            let actions: Vec<String> = lifecycle::actions_for(&appointment, store.session())
                .into_iter()
                .map(|a| a.to_string())
                .collect();
            if actions.is_empty() {
                println!("Actions:  (none)");
            } else {
                println!("Actions:  {}", actions.join(", "));
            }
        }
        Commands::Slots { date } => {
            let date = date.unwrap_or(today);
            if !store.fetch_available_slots(date, &token).await {
                bail!(store_error(&store));
            }
            let picker = SlotPicker::new(picker_mode(&cfg));
            println!("Slots for {}:", dates::format_date(date));
            for (slot, state) in picker.grid(&store.slots()) {
                println!(
                    "  {}-{}  {:?}",
                    dates::format_time(slot.start_time),
                    dates::format_time(slot.end_time),
                    state
                );
            }
        }
        Commands::Schedule {
            date,
            time,
            reason,
            category,
        } => {
            let mut picker = SlotPicker::new(picker_mode(&cfg));
            picker.select_date(date, today)?;
            let slot = slot_at(&store, date, time, &token).await?;
            picker.select_slot(&slot)?;
            picker.set_reason(reason);
            picker.set_concern_category(category);
            let req = picker.to_request().map_err(join_validation)?;
            let created = store
                .create(req, &token)
                .await
                .ok_or_else(|| anyhow!(store_error(&store)))?;
            println!("Requested appointment #{} ({})", created.id, created.status);
        }
        Commands::Approve { id } => {
            let a = store
                .approve(id, &token)
                .await
                .ok_or_else(|| anyhow!(store_error(&store)))?;
            println!("Appointment #{} is now {}", a.id, a.status);
        }
        Commands::Complete { id } => {
            let a = store
                .complete(id, &token)
                .await
                .ok_or_else(|| anyhow!(store_error(&store)))?;
            println!("Appointment #{} is now {}", a.id, a.status);
        }
        Commands::Cancel { id } => {
            let a = store
                .cancel(id, &token)
                .await
                .ok_or_else(|| anyhow!(store_error(&store)))?;
            println!("Appointment #{} is now {}", a.id, a.status);
        }
        Commands::Reschedule {
            id,
            date,
            time,
            reason,
            category,
            yes,
        } => {
            let original = store
                .fetch_appointment(id, &token)
                .await
                .ok_or_else(|| anyhow!(store_error(&store)))?;
            let mut flow = RescheduleFlow::new(original, cfg.session.role);
            flow.begin(store.session())?;
            flow.select_date(date, today)?;
            let slot = slot_at(&store, date, time, &token).await?;
            flow.select_slot(&slot)?;
            if let Some(reason) = reason {
                flow.set_reason(reason);
            }
            if let Some(category) = category {
                flow.set_concern_category(category);
            }
            if !flow.advance() {
                return Err(join_validation(flow.field_errors().to_vec()));
            }
            let summary = flow.summary().context("reschedule summary unavailable")?;
            println!("Reschedule appointment #{}:", summary.appointment_id);
            println!("  Date:   {}", dates::format_date(summary.request.scheduled_date));
            println!("  Time:   {}", dates::format_time(summary.request.scheduled_time));
            println!("  Reason: {}", summary.request.reason);

            if !yes && !confirm_prompt()? {
                flow.cancel();
                println!("Nothing changed.");
                return Ok(());
            }
            match flow.confirm(&store, &token).await {
                Some(a) => println!(
                    "Appointment #{} is now {} on {} at {}",
                    a.id,
                    a.status,
                    dates::format_date(a.scheduled_date),
                    dates::format_time(a.scheduled_time)
                ),
                None => bail!(
                    flow.dialog_error()
                        .unwrap_or("Failed to reschedule appointment. Please try again.")
                        .to_string()
                ),
            }
        }
        Commands::Delete { id } => {
            if !store.delete(id, &token).await {
                bail!(store_error(&store));
            }
            println!("Deleted appointment #{id}");
        }
        Commands::Calendar { month } => {
            let first = match month {
                Some(m) => parse_date(&format!("{m}-01")).map_err(|e| anyhow!(e))?,
                None => today,
            };
            load(&store, AppointmentFilters::default(), &token).await?;
            let list = store.visible_appointments();
            let grid = MonthGrid::for_date(first, &list).context("month out of range")?;
            print!("{grid}");
        }
        Commands::Day { date } => {
            let date = date.unwrap_or(today);
            let filters = AppointmentFilters {
                status: None,
                start_date: Some(date),
                end_date: Some(date),
            };
            load(&store, filters, &token).await?;
            let list = store.visible_appointments();
            let on_day: Vec<Appointment> = calendar::appointments_on(date, &list)
                .into_iter()
                .cloned()
                .collect();
            println!("{}", date.format("%A, %B %-d %Y"));
            let names = names_for(&client, &store, &on_day).await;
            print_table(&on_day, &names);
        }
        Commands::Upcoming => {
            load(&store, AppointmentFilters::default(), &token).await?;
            let list = store.visible_appointments();
            let upcoming: Vec<Appointment> =
                calendar::upcoming(today, &list).into_iter().cloned().collect();
            let names = names_for(&client, &store, &upcoming).await;
            print_table(&upcoming, &names);
        }
        Commands::Schedules { action } => run_schedules(&client, action).await?,
    }

    Ok(())
}

async fn run_schedules(client: &ApiClient, action: ScheduleCommands) -> Result<()> {
    match action {
        ScheduleCommands::List { from, to } => {
            let filters = ScheduleFilters {
                start_date: from,
                end_date: to,
            };
            let schedules = client
                .list_admin_schedules(&filters)
                .await
                .map_err(|e| anyhow!(e.user_message("load schedules")))?;
            for s in schedules {
                println!(
                    "#{:<5} {}  {}-{}  {}  {}",
                    s.id,
                    dates::format_date(s.date),
                    dates::format_time(s.start_time),
                    dates::format_time(s.end_time),
                    if s.is_available { "open" } else { "closed" },
                    s.note.unwrap_or_default()
                );
            }
        }
        ScheduleCommands::Create {
            date,
            start,
            end,
            note,
        } => {
            if end <= start {
                bail!("end must be after start");
            }
            let req = CreateAdminScheduleRequest {
                date,
                start_time: start,
                end_time: end,
                is_available: Some(true),
                note,
            };
            let created = client
                .create_admin_schedule(&req)
                .await
                .map_err(|e| anyhow!(e.user_message("create schedule")))?;
            println!("Created schedule #{}", created.id);
        }
        ScheduleCommands::Delete { id } => {
            let resp = client
                .delete_schedule(id)
                .await
                .map_err(|e| anyhow!(e.user_message("delete schedule")))?;
            println!("{}", resp.message.unwrap_or_else(|| format!("Deleted schedule #{id}")));
        }
    }
    Ok(())
}

async fn load(store: &AppointmentStore, filters: AppointmentFilters, token: &ScopeToken) -> Result<()> {
    if store.fetch_appointments(filters, token).await {
        Ok(())
    } else {
        Err(anyhow!(store_error(store)))
    }
}

async fn names_for(client: &Arc<ApiClient>, store: &AppointmentStore, list: &[Appointment]) -> StudentNames {
    if !store.session().role.is_staff() {
        return StudentNames::default();
    }
    directory::resolve_names(client.clone(), list.iter().map(|a| a.user_id)).await
}

async fn slot_at(
    store: &AppointmentStore,
    date: NaiveDate,
    time: NaiveTime,
    token: &ScopeToken,
) -> Result<TimeSlot> {
    if !store.fetch_available_slots(date, token).await {
        bail!(store_error(store));
    }
    store
        .slots()
        .into_iter()
        .find(|s| s.start_time == time)
        .ok_or_else(|| {
            anyhow!(
                "No slot starts at {} on {}",
                dates::format_time(time),
                dates::format_date(date)
            )
        })
}

fn picker_mode(cfg: &Config) -> PickerMode {
    if cfg.session.role.is_staff() {
        PickerMode::Staff
    } else {
        PickerMode::Student
    }
}

fn store_error(store: &AppointmentStore) -> String {
    store
        .error()
        .unwrap_or_else(|| "Request was not completed".to_string())
}

fn join_validation(errors: Vec<guidance_scheduler::error::ValidationError>) -> anyhow::Error {
    let lines: Vec<String> = errors.into_iter().map(|e| e.message).collect();
    anyhow!(lines.join("; "))
}

fn confirm_prompt() -> Result<bool> {
    print!("Confirm? [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn print_table(list: &[Appointment], names: &StudentNames) {
    if list.is_empty() {
        println!("No appointments.");
        return;
    }
    println!(
        "{:<6} {:<10} {:<5} {:<12} {:<20} {}",
        "ID", "Date", "Time", "Status", "Student", "Reason"
    );
    for a in list {
        let student = if names.is_empty() {
            format!("#{}", a.user_id)
        } else {
            names.get(a.user_id).to_string()
        };
        println!(
            "{:<6} {:<10} {:<5} {:<12} {:<20} {}",
            a.id,
            dates::format_date(a.scheduled_date),
            dates::format_time(a.scheduled_time),
            a.status,
            student,
            a.reason
        );
    }
}

fn print_detail(a: &Appointment) {
    println!("Appointment #{}", a.id);
    println!("Student:  #{}", a.user_id);
    println!("Date:     {}", dates::format_date(a.scheduled_date));
    println!("Time:     {}", dates::format_time(a.scheduled_time));
    println!("Status:   {}", a.status);
    println!("Category: {}", a.concern_category.as_deref().unwrap_or("-"));
    println!("Reason:   {}", a.reason);
    if let Some(created) = &a.created_at {
        println!("Created:  {created}");
    }
}
