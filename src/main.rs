//! liftlog - workout tracker session client

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use liftlog::config::Config;
use liftlog::models::{RoutineDay, WorkoutSummary};
use liftlog::session::{self, ActiveWorkout, SessionState, WorkoutSession};
use liftlog::tui::App;
use liftlog::units::UnitSystem;

#[derive(Parser)]
#[command(name = "liftlog")]
#[command(author, version, about = "Workout tracker - log a gym session against the liftlog API")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the workout in progress, or what could be started
    Status,

    /// Start a workout (the suggested day unless told otherwise)
    Start {
        /// Routine day name from the active schedule
        #[arg(short, long, conflicts_with = "empty")]
        day: Option<String>,

        /// Quick workout seeded with the first catalog exercises
        #[arg(short, long)]
        empty: bool,
    },

    /// Finish the workout in progress
    Finish,

    /// Delete the workout in progress
    Discard {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Reopen a finished workout
    Reopen {
        /// Workout id
        id: i64,
    },

    /// List past workouts
    History {
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Open the session view
    Tui {
        /// Edit this workout instead of the one in progress
        #[arg(short, long)]
        workout: Option<i64>,

        /// Start on this exercise (1-based)
        #[arg(long)]
        exercise: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("liftlog=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let units = cli.config.units;
    let mut session = WorkoutSession::new(cli.config.session_context());

    match cli.command {
        Some(Commands::Status) => {
            session.load_session(None, None).await;
            print_state(session.state(), units);
        }

        Some(Commands::Start { day, empty }) => {
            session.load_session(None, None).await;
            let routine_day = match session.state() {
                SessionState::Active(active) => bail!("Workout {} is already in progress", active.id()),
                SessionState::NoActiveWorkout { suggestion, schedule } if !empty => match &day {
                    Some(name) => schedule
                        .iter()
                        .find(|d| d.name.eq_ignore_ascii_case(name))
                        .cloned()
                        .map(RoutineDay::from)
                        .or_else(|| {
                            suggestion
                                .clone()
                                .filter(|s| s.day_name.eq_ignore_ascii_case(name))
                                .map(RoutineDay::from)
                        }),
                    None => suggestion.clone().map(RoutineDay::from),
                },
                _ => None,
            };

            match (routine_day, day) {
                (Some(routine_day), _) => session.start_from_routine_day(&routine_day).await?,
                (None, Some(name)) => bail!("No routine day named '{}' in the active schedule", name),
                (None, None) if empty => session.start_empty().await?,
                (None, None) => bail!("No suggested workout; use --day NAME or --empty"),
            }
            print_state(session.state(), units);
        }

        Some(Commands::Finish) => {
            session.load_session(None, None).await;
            session.finish().await?;
            println!("Workout finished");
            print_state(session.state(), units);
        }

        Some(Commands::Discard { yes }) => {
            session.load_session(None, None).await;
            let Some(active) = session.active() else {
                bail!("No workout in progress");
            };
            if !yes {
                bail!("Refusing to discard workout {} without --yes", active.id());
            }
            session.discard().await?;
            println!("Workout discarded");
        }

        Some(Commands::Reopen { id }) => {
            session.load_session(None, None).await;
            session.reopen(id).await?;
            print_state(session.state(), units);
        }

        Some(Commands::History { limit }) => {
            let ctx = session.context();
            let workouts = session::list_history(ctx.api.as_ref(), limit).await?;
            println!("Recent workouts:");
            println!("{:-<60}", "");
            for w in &workouts {
                print_history_row(w);
            }
        }

        Some(Commands::Tui { workout, exercise }) => {
            session.load_session(workout, exercise.map(|e| e.saturating_sub(1))).await;
            App::new(session, cli.config.rest_seconds).run().await?;
        }

        None => {
            // Default: show TUI
            session.load_session(None, None).await;
            App::new(session, cli.config.rest_seconds).run().await?;
        }
    }

    Ok(())
}

fn print_state(state: &SessionState, units: UnitSystem) {
    match state {
        SessionState::Active(active) => print_workout(active, units),
        SessionState::NoActiveWorkout { suggestion, schedule } => {
            println!("No workout in progress");
            if let Some(s) = suggestion {
                println!("Suggested: {} - {} ({} exercises)", s.routine_name, s.day_name, s.exercises.len());
            }
            if !schedule.is_empty() {
                println!("Schedule:");
                for day in schedule {
                    println!("  {:20} | {} exercises", day.name, day.exercises.len());
                }
            }
        }
        SessionState::Uninitialized => println!("Session not loaded"),
    }
}

fn print_workout(active: &ActiveWorkout, units: UnitSystem) {
    println!(
        "Workout {} | {} | {}",
        active.id(),
        active.workout.date,
        active.workout.notes.as_deref().unwrap_or("-")
    );
    println!("{:-<60}", "");
    for (i, card) in active.cards.iter().enumerate() {
        let marker = if i == active.current_index() { ">" } else { " " };
        println!(
            "{} {}. {:24} {}/{} sets",
            marker,
            card.sequence(),
            card.name(),
            card.completed_sets(),
            card.editors().len()
        );
        for set in card.sets() {
            println!(
                "      set {} | {:>10} | {:>4} reps | {}",
                set.set_number,
                units.format(set.weight_kg),
                set.reps.map_or("-".to_string(), |r| r.to_string()),
                if set.completed { "done" } else { "" }
            );
        }
    }
}

fn print_history_row(w: &WorkoutSummary) {
    let (done, total) = w.set_counts();
    println!(
        "{} | {:>5} | {:30} | {:>2} ex | {:>3}/{:<3} sets | {}",
        w.date.format("%Y-%m-%d"),
        w.start_time.map(|t| t.format("%H:%M").to_string()).unwrap_or_default(),
        w.notes.as_deref().unwrap_or("-"),
        w.all_exercises().count(),
        done,
        total,
        if w.is_finished() { "finished" } else { "in progress" }
    );
}
