//! Rest / interval timer
//!
//! A countdown with one-second resolution. It never touches persistence;
//! callers decide what to do once it reports done.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// Default rest period between sets
pub const DEFAULT_REST_SECS: u32 = 90;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    duration_secs: u32,
    remaining_secs: u32,
    running: bool,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(DEFAULT_REST_SECS)
    }
}

impl Countdown {
    pub fn new(duration_secs: u32) -> Self {
        Self {
            duration_secs,
            remaining_secs: duration_secs,
            running: false,
        }
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Reached zero. Stays done until reset; nothing closes automatically.
    pub fn is_done(&self) -> bool {
        self.remaining_secs == 0
    }

    /// No-op once done
    pub fn start(&mut self) {
        if !self.is_done() {
            self.running = true;
        }
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn toggle(&mut self) {
        if self.running {
            self.pause();
        } else {
            self.start();
        }
    }

    pub fn reset(&mut self) {
        self.running = false;
        self.remaining_secs = self.duration_secs;
    }

    /// Change the configured duration and reset to it
    pub fn set_duration(&mut self, duration_secs: u32) {
        self.duration_secs = duration_secs;
        self.reset();
    }

    /// Advance one second. Returns true on the tick that reaches zero.
    pub fn tick(&mut self) -> bool {
        if !self.running || self.remaining_secs == 0 {
            return false;
        }
        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            self.running = false;
            return true;
        }
        false
    }

    /// Fraction of the duration still left, 0.0..=1.0
    pub fn progress(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        self.remaining_secs as f64 / self.duration_secs as f64
    }

    /// MM:SS
    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.remaining_secs / 60, self.remaining_secs % 60)
    }
}

/// Commands accepted by a running [`run`] driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Pause when running, resume otherwise
    Toggle,
    Reset,
    SetDuration(u32),
}

/// Drive a countdown on the tokio clock, publishing every change.
///
/// Starts immediately. Reaching zero leaves the countdown done but the driver
/// keeps listening, so it can still be reset. Ends when the control sender
/// or every receiver is dropped, which is how the owner tears the timer down.
pub async fn run(
    mut countdown: Countdown,
    mut controls: mpsc::UnboundedReceiver<Control>,
    updates: watch::Sender<Countdown>,
) -> Countdown {
    countdown.start();
    updates.send_replace(countdown.clone());

    let mut interval = tokio::time::interval(TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            _ = interval.tick(), if countdown.is_running() => {
                countdown.tick();
            }
            control = controls.recv() => match control {
                Some(Control::Toggle) => {
                    countdown.toggle();
                    interval.reset();
                }
                Some(Control::Reset) => countdown.reset(),
                Some(Control::SetDuration(secs)) => countdown.set_duration(secs),
                None => break,
            },
        }
        if updates.send(countdown.clone()).is_err() {
            break;
        }
    }
    countdown
}
