//! TUI module - in-gym view of the workout session with ratatui

use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Gauge, List, ListItem, Paragraph, Row, Table},
};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::grouping::group_exercises;
use crate::models::{Id, RoutineDay, TrackedMetric};
use crate::session::{
    ActiveWorkout, Direction as Move, ExerciseCard, SessionError, SessionState, SetEditor, SetRef, WorkoutSession,
};
use crate::timer::{self, Control, Countdown};

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Weight change per keypress, in display units
const WEIGHT_STEP: f64 = 2.5;

/// Rest duration change per keypress
const REST_STEP_SECS: u32 = 15;

enum TimerKind {
    Rest,
    TimedSet(SetRef),
}

/// Countdown driven by a background task; dropping it stops the task
struct RunningTimer {
    kind: TimerKind,
    controls: mpsc::UnboundedSender<Control>,
    updates: watch::Receiver<Countdown>,
}

impl RunningTimer {
    fn send(&self, control: Control) {
        if self.controls.send(control).is_err() {
            debug!("Timer task already stopped");
        }
    }
}

enum Confirm {
    Discard,
    RemoveExercise(Id),
}

/// App state for TUI
pub struct App {
    session: WorkoutSession,
    rest_secs: u32,
    selected_set: usize,
    timer: Option<RunningTimer>,
    confirm: Option<Confirm>,
    status: Option<String>,
    should_quit: bool,
}

impl App {
    /// `session` should already be loaded
    pub fn new(session: WorkoutSession, rest_secs: u32) -> Self {
        Self {
            session,
            rest_secs,
            selected_set: 0,
            timer: None,
            confirm: None,
            status: None,
            should_quit: false,
        }
    }

    /// Run the TUI application
    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;
        let result = self.event_loop(&mut terminal).await;
        restore_terminal()?;
        result
    }

    async fn event_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        while !self.should_quit {
            self.prepare_current().await;
            terminal.draw(|frame| self.render(frame))?;
            self.handle_events().await?;
            self.on_tick().await;
        }
        Ok(())
    }

    /// History hints for the exercise on screen; each set asks only once
    async fn prepare_current(&mut self) {
        let Some(active) = self.session.active() else { return };
        let index = active.current_index();
        if index < active.cards.len()
            && let Err(e) = self.session.load_history(index).await
        {
            debug!("History lookup skipped: {}", e);
        }
    }

    async fn on_tick(&mut self) {
        let now = Instant::now();
        if self.session.tick(now) {
            self.selected_set = 0;
        }

        let Some(RunningTimer { kind: TimerKind::TimedSet(target), updates, .. }) = &self.timer else {
            return;
        };
        if !updates.borrow().is_done() {
            return;
        }
        let target = *target;
        self.timer = None;
        let result = self.session.complete_timed_set(target, now).await;
        self.report(result.map(|_| ()), "Timed set logged");
    }

    fn start_timer(&mut self, kind: TimerKind, countdown: Countdown) {
        let (tx, rx) = watch::channel(countdown.clone());
        let (controls, control_rx) = mpsc::unbounded_channel();
        tokio::spawn(timer::run(countdown, control_rx, tx));
        self.timer = Some(RunningTimer {
            kind,
            controls,
            updates: rx,
        });
    }

    fn report(&mut self, result: Result<(), SessionError>, done: &str) {
        self.status = Some(match result {
            Ok(()) => done.to_string(),
            Err(e) => format!("Error: {}", e),
        });
    }

    async fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            self.on_key(key).await;
        }
        Ok(())
    }

    async fn on_key(&mut self, key: KeyEvent) {
        if let Some(confirm) = self.confirm.take() {
            if key.code == KeyCode::Char('y') {
                self.confirmed(confirm).await;
            } else {
                self.status = Some("Cancelled".to_string());
            }
            return;
        }

        if key.code == KeyCode::Char('q') {
            self.should_quit = true;
            return;
        }

        if self.session.active().is_some() {
            self.on_workout_key(key).await;
        } else {
            self.on_idle_key(key).await;
        }
    }

    async fn confirmed(&mut self, confirm: Confirm) {
        match confirm {
            Confirm::Discard => {
                let result = self.session.discard().await;
                self.report(result, "Workout discarded");
            }
            Confirm::RemoveExercise(id) => {
                let result = self.session.remove_exercise(id).await;
                self.report(result, "Exercise removed");
                self.selected_set = 0;
            }
        }
    }

    async fn on_idle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('n') => {
                let result = self.session.start_empty().await;
                self.report(result, "Quick workout started");
                return;
            }
            KeyCode::Char('r') => {
                self.session.load_session(None, None).await;
                self.status = Some("Refreshed".to_string());
                return;
            }
            _ => {}
        }

        let SessionState::NoActiveWorkout { suggestion, schedule } = self.session.state() else {
            return;
        };
        let day: Option<RoutineDay> = match key.code {
            KeyCode::Char('s') => suggestion.clone().map(RoutineDay::from),
            KeyCode::Char(c @ '1'..='9') => schedule.get(c as usize - '1' as usize).cloned().map(RoutineDay::from),
            _ => return,
        };

        match day {
            Some(day) => {
                let result = self.session.start_from_routine_day(&day).await;
                self.report(result, &format!("Started {}", day.day_name));
                self.selected_set = 0;
            }
            None => self.status = Some("Nothing to start".to_string()),
        }
    }

    async fn on_workout_key(&mut self, key: KeyEvent) {
        let now = Instant::now();
        let Some(active) = self.session.active() else { return };
        let exercise = active.current_index();
        let drawer_open = active.cursor.is_drawer_open();
        let current_id = active.current().map(ExerciseCard::id);
        let set_count = active.current().map_or(0, |c| c.editors().len());
        self.selected_set = self.selected_set.min(set_count.saturating_sub(1));

        if drawer_open {
            match key.code {
                KeyCode::Char(c @ '1'..='9') => {
                    self.session.jump_to(c as usize - '1' as usize);
                    self.selected_set = 0;
                }
                KeyCode::Char('e') | KeyCode::Esc => self.session.toggle_drawer(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Left | KeyCode::Char('h') => {
                self.session.prev_exercise();
                self.selected_set = 0;
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.session.next_exercise();
                self.selected_set = 0;
            }
            KeyCode::Up | KeyCode::Char('k') => self.selected_set = self.selected_set.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_set + 1 < set_count {
                    self.selected_set += 1;
                }
            }
            KeyCode::Char('e') => self.session.toggle_drawer(),

            KeyCode::Char(' ') | KeyCode::Enter => {
                let set = self.selected_set;
                match self.session.save_set(exercise, set, now).await {
                    Ok(Some(saved)) if saved.set.completed => {
                        self.status = Some(format!("Set {} done", saved.set.set_number));
                    }
                    Ok(Some(saved)) => self.status = Some(format!("Set {} reopened", saved.set.set_number)),
                    Ok(None) => {}
                    Err(e) => self.status = Some(format!("Error: {}", e)),
                }
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.edit(exercise, |ed| {
                let weight = ed.draft().weight.unwrap_or(0.0) + WEIGHT_STEP;
                ed.set_weight(Some(weight));
            }),
            KeyCode::Char('-') => self.edit(exercise, |ed| {
                let weight = ed.draft().weight.map(|w| (w - WEIGHT_STEP).max(0.0));
                ed.set_weight(weight.filter(|w| *w > 0.0));
            }),
            KeyCode::Char(']') => self.edit(exercise, |ed| {
                let reps = ed.draft().reps.unwrap_or(0) + 1;
                ed.set_reps(Some(reps));
            }),
            KeyCode::Char('[') => self.edit(exercise, |ed| {
                let reps = ed.draft().reps.and_then(|r| r.checked_sub(1)).filter(|r| *r > 0);
                ed.set_reps(reps);
            }),
            KeyCode::Char('a') => match self.session.add_set(exercise) {
                Ok(index) => self.selected_set = index,
                Err(e) => self.status = Some(format!("Error: {}", e)),
            },
            KeyCode::Char('x') => {
                let result = self.session.delete_set(exercise, self.selected_set).await;
                self.report(result, "Set deleted");
                self.selected_set = self.selected_set.saturating_sub(1);
            }

            KeyCode::Char('t') => {
                let countdown = match self.session.editor_mut(exercise, self.selected_set) {
                    Ok(ed) if ed.is_timed() && !ed.is_completed() => Some(ed.countdown()),
                    _ => None,
                };
                let target = self.session.active().and_then(|a| a.set_ref(exercise, self.selected_set));
                match (countdown, target) {
                    (Some(countdown), Some(target)) => self.start_timer(TimerKind::TimedSet(target), countdown),
                    _ => self.status = Some("Not a timed set".to_string()),
                }
            }
            KeyCode::Char('r') => match &self.timer {
                Some(timer) => timer.send(Control::Toggle),
                None => self.start_timer(TimerKind::Rest, Countdown::new(self.rest_secs)),
            },
            KeyCode::Char('z') => {
                if let Some(timer) = &self.timer {
                    timer.send(Control::Reset);
                }
            }
            KeyCode::Char('c') => self.timer = None,
            KeyCode::Char('<') | KeyCode::Char('>') => {
                self.rest_secs = if key.code == KeyCode::Char('>') {
                    self.rest_secs + REST_STEP_SECS
                } else {
                    self.rest_secs.saturating_sub(REST_STEP_SECS).max(REST_STEP_SECS)
                };
                if let Some(timer @ RunningTimer { kind: TimerKind::Rest, .. }) = &self.timer {
                    timer.send(Control::SetDuration(self.rest_secs));
                }
                self.status = Some(format!("Rest {}s", self.rest_secs));
            }

            KeyCode::Char('K') => {
                let result = self.session.reorder_exercise(Move::Up).await;
                self.report(result.map(|_| ()), "Moved up");
            }
            KeyCode::Char('J') => {
                let result = self.session.reorder_exercise(Move::Down).await;
                self.report(result.map(|_| ()), "Moved down");
            }
            KeyCode::Char('D') => {
                if let Some(id) = current_id {
                    self.confirm = Some(Confirm::RemoveExercise(id));
                    self.status = Some("Remove this exercise? (y/n)".to_string());
                }
            }
            KeyCode::Char('X') => {
                self.confirm = Some(Confirm::Discard);
                self.status = Some("Discard the whole workout? (y/n)".to_string());
            }
            KeyCode::Char('f') => {
                let result = self.session.finish().await;
                self.report(result, "Workout finished");
                self.timer = None;
            }
            _ => {}
        }
    }

    fn edit(&mut self, exercise: usize, change: impl FnOnce(&mut SetEditor)) {
        match self.session.editor_mut(exercise, self.selected_set) {
            Ok(editor) => change(editor),
            Err(e) => self.status = Some(format!("Error: {}", e)),
        }
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);

        // Header
        let title = match self.session.state() {
            SessionState::Active(active) => {
                let notes = active.workout.notes.as_deref().unwrap_or("Workout");
                let mode = if active.edit_mode { " [editing]" } else { "" };
                format!("liftlog - {} ({}){}", notes, active.workout.date, mode)
            }
            _ => "liftlog - No active workout".to_string(),
        };
        let header = Paragraph::new(title)
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        match self.session.state() {
            SessionState::Active(active) if active.cursor.is_drawer_open() => self.render_drawer(frame, chunks[1], active),
            SessionState::Active(active) => self.render_card(frame, chunks[1], active),
            SessionState::NoActiveWorkout { suggestion, schedule } => {
                let mut lines = Vec::new();
                match suggestion {
                    Some(s) => lines.push(Line::from(format!(
                        "[s] Suggested: {} - {} ({} exercises)",
                        s.routine_name,
                        s.day_name,
                        s.exercises.len()
                    ))),
                    None => lines.push(Line::from("No suggestion available")),
                }
                lines.push(Line::from("[n] Quick workout"));
                lines.push(Line::from(""));
                for (i, day) in schedule.iter().take(9).enumerate() {
                    lines.push(Line::from(format!("[{}] {} ({} exercises)", i + 1, day.name, day.exercises.len())));
                }
                let body = Paragraph::new(Text::from(lines))
                    .block(Block::default().borders(Borders::ALL).title("Start a workout"));
                frame.render_widget(body, chunks[1]);
            }
            SessionState::Uninitialized => {
                frame.render_widget(Paragraph::new("Loading...").block(Block::default().borders(Borders::ALL)), chunks[1]);
            }
        }

        // Timer
        let gauge = match &self.timer {
            Some(timer) => {
                let countdown = timer.updates.borrow().clone();
                let label = match timer.kind {
                    TimerKind::Rest => "Rest",
                    TimerKind::TimedSet(_) => "Set",
                };
                let done = if countdown.is_done() {
                    " - done"
                } else if !countdown.is_running() {
                    " - paused"
                } else {
                    ""
                };
                Gauge::default()
                    .gauge_style(Style::default().fg(Color::Green))
                    .ratio(countdown.progress().clamp(0.0, 1.0))
                    .label(format!("{} {}{}", label, countdown.display(), done))
            }
            None => Gauge::default().ratio(0.0).label(format!("r: rest timer ({}s)", self.rest_secs)),
        };
        frame.render_widget(gauge.block(Block::default().borders(Borders::ALL)), chunks[2]);

        // Footer
        let keys = if self.session.active().is_some() {
            "q quit | h/l exercise | j/k set | space done | +/- weight | [/] reps | a add | x del | t timed | r/z/c/</> timer | e list | K/J move | D remove | f finish | X discard"
        } else {
            "q quit | s suggested | n quick | 1-9 schedule day | r refresh"
        };
        let footer = Paragraph::new(self.status.clone().unwrap_or_else(|| keys.to_string()))
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[3]);
    }

    fn render_card(&self, frame: &mut Frame, area: Rect, active: &ActiveWorkout) {
        let Some(card) = active.current() else {
            let empty = Paragraph::new("No exercises yet").block(Block::default().borders(Borders::ALL));
            frame.render_widget(empty, area);
            return;
        };

        let now = Instant::now();
        let units = self.session.context().units;
        let rows: Vec<Row> = card
            .editors()
            .iter()
            .enumerate()
            .map(|(i, ed)| {
                let draft = ed.draft();
                let shown = |metric: TrackedMetric, value: Option<String>| {
                    if ed.shows(metric) {
                        value.unwrap_or_else(|| "-".to_string())
                    } else {
                        String::new()
                    }
                };
                let last = ed.history().map(|h| {
                    format!(
                        "last: {} x {}",
                        h.weight.map_or("-".to_string(), |w| w.to_string()),
                        h.reps.map_or("-".to_string(), |r| r.to_string())
                    )
                });
                let style = if ed.has_error(now) {
                    Style::default().fg(Color::Red)
                } else if ed.is_completed() {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default()
                };
                let style = if i == self.selected_set { style.reversed() } else { style };

                Row::new(vec![
                    Cell::from(ed.set_number().to_string()),
                    Cell::from(shown(TrackedMetric::Weight, draft.weight.map(|w| w.to_string()))),
                    Cell::from(shown(TrackedMetric::Reps, draft.reps.map(|r| r.to_string()))),
                    Cell::from(draft.duration_secs.map(|d| format!("{}s", d)).unwrap_or_default()),
                    Cell::from(draft.tempo.clone().unwrap_or_default()),
                    Cell::from(last.unwrap_or_default()),
                    Cell::from(if ed.is_completed() { "✓" } else { "" }),
                ])
                .style(style)
            })
            .collect();

        let title = format!(
            "{} ({}/{}) - {}/{} sets",
            card.name(),
            active.current_index() + 1,
            active.cards.len(),
            card.completed_sets(),
            card.editors().len()
        );
        let table = Table::new(
            rows,
            [
                Constraint::Length(5),
                Constraint::Length(10),
                Constraint::Length(6),
                Constraint::Length(7),
                Constraint::Length(9),
                Constraint::Min(16),
                Constraint::Length(3),
            ],
        )
        .header(
            Row::new(vec!["Set", units.label(), "Reps", "Time", "Tempo", "History", ""])
                .style(Style::default().bold()),
        )
        .block(Block::default().borders(Borders::ALL).title(title));

        frame.render_widget(table, area);
    }

    fn render_drawer(&self, frame: &mut Frame, area: Rect, active: &ActiveWorkout) {
        let exercises = active.snapshot().exercises;
        let mut items = Vec::new();
        for group in group_exercises(&exercises) {
            if group.is_superset() {
                items.push(ListItem::new(format!("Superset {}", group.name.as_deref().unwrap_or_default())).bold());
            }
            for index in group.indices {
                let we = &exercises[index];
                let marker = if index == active.current_index() { ">" } else { " " };
                let done = if we.is_complete() { " ✓" } else { "" };
                let indent = if group.name.is_some() { "  " } else { "" };
                items.push(ListItem::new(format!("{}{} {}. {}{}", marker, indent, index + 1, we.name(), done)));
            }
        }
        let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Exercises (1-9 jump, e close)"));
        frame.render_widget(list, area);
    }
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}
