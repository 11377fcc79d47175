//! Navigation cursor - which exercise of the active workout is on screen

use std::time::{Duration, Instant};

use crate::models::WorkoutExercise;

/// Pause between the last set being checked off and moving on,
/// so the completion mark is visible first
pub const AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingAdvance {
    from: usize,
    due: Instant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
    pending: Option<PendingAdvance>,
    drawer_open: bool, // exercise list overlay
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(index: usize, len: usize) -> Self {
        let mut cursor = Self::new();
        cursor.index = index;
        cursor.clamp(len);
        cursor
    }

    /// "Continue where you left off": first exercise whose sets are not all
    /// completed. Exercises without sets count as done; falls back to 0.
    pub fn resume(exercises: &[WorkoutExercise]) -> Self {
        let index = exercises
            .iter()
            .position(|we| !we.sets.iter().all(|s| s.completed))
            .unwrap_or(0);
        Self::at(index, exercises.len())
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Keep the cursor inside `[0, len-1]` (0 for an empty list)
    pub fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.index = 0;
        } else if self.index >= len {
            self.index = len - 1;
        }
    }

    pub fn prev(&mut self) {
        self.pending = None;
        self.index = self.index.saturating_sub(1);
    }

    pub fn next(&mut self, len: usize) {
        self.pending = None;
        if self.index + 1 < len {
            self.index += 1;
        }
    }

    /// Jump from the exercise list; closes the list
    pub fn jump(&mut self, index: usize, len: usize) {
        self.pending = None;
        self.index = index;
        self.clamp(len);
        self.drawer_open = false;
    }

    /// Follow an exercise that was moved to a new position
    pub fn follow(&mut self, index: usize, len: usize) {
        self.pending = None;
        self.index = index;
        self.clamp(len);
    }

    pub fn toggle_drawer(&mut self) {
        self.drawer_open = !self.drawer_open;
    }

    pub fn is_drawer_open(&self) -> bool {
        self.drawer_open
    }

    /// Queue a move to the next exercise once `delay` has passed.
    /// Never queued on the last exercise: finishing is explicit there.
    pub fn schedule_advance(&mut self, now: Instant, delay: Duration, len: usize) -> bool {
        if self.index + 1 >= len {
            return false;
        }
        self.pending = Some(PendingAdvance {
            from: self.index,
            due: now + delay,
        });
        true
    }

    pub fn has_pending_advance(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel_advance(&mut self) {
        self.pending = None;
    }

    /// Apply a due auto-advance. Returns true if the cursor moved.
    pub fn poll(&mut self, now: Instant, len: usize) -> bool {
        let Some(pending) = self.pending else {
            return false;
        };
        if now < pending.due {
            return false;
        }
        self.pending = None;
        if self.index != pending.from || self.index + 1 >= len {
            return false;
        }
        self.index += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkoutSet;

    fn exercise_with(completed: &[bool]) -> WorkoutExercise {
        WorkoutExercise {
            sets: completed
                .iter()
                .enumerate()
                .map(|(i, c)| WorkoutSet {
                    set_number: i as u32 + 1,
                    completed: *c,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resume_first_incomplete() {
        let list = vec![
            exercise_with(&[true, true]),
            exercise_with(&[]),
            exercise_with(&[true, false]),
            exercise_with(&[false]),
        ];
        assert_eq!(Cursor::resume(&list).index(), 2);
    }

    #[test]
    fn test_resume_all_complete_starts_at_zero() {
        let list = vec![exercise_with(&[true]), exercise_with(&[true])];
        assert_eq!(Cursor::resume(&list).index(), 0);
        assert_eq!(Cursor::resume(&[]).index(), 0);
    }

    #[test]
    fn test_prev_next_clamped() {
        let mut cursor = Cursor::new();
        cursor.prev();
        assert_eq!(cursor.index(), 0);

        cursor.next(2);
        cursor.next(2);
        assert_eq!(cursor.index(), 1);
    }

    #[test]
    fn test_clamp_after_shrink() {
        let mut cursor = Cursor::at(4, 5);
        cursor.clamp(3);
        assert_eq!(cursor.index(), 2);
        cursor.clamp(0);
        assert_eq!(cursor.index(), 0);
    }

    #[test]
    fn test_jump_closes_drawer() {
        let mut cursor = Cursor::new();
        cursor.toggle_drawer();
        assert!(cursor.is_drawer_open());
        cursor.jump(7, 4);
        assert_eq!(cursor.index(), 3);
        assert!(!cursor.is_drawer_open());
    }

    #[test]
    fn test_auto_advance_waits_for_delay() {
        let now = Instant::now();
        let mut cursor = Cursor::new();
        assert!(cursor.schedule_advance(now, AUTO_ADVANCE_DELAY, 3));

        assert!(!cursor.poll(now + Duration::from_millis(100), 3));
        assert_eq!(cursor.index(), 0);

        assert!(cursor.poll(now + AUTO_ADVANCE_DELAY, 3));
        assert_eq!(cursor.index(), 1);
        assert!(!cursor.has_pending_advance());
    }

    #[test]
    fn test_no_auto_advance_on_last() {
        let now = Instant::now();
        let mut cursor = Cursor::at(2, 3);
        assert!(!cursor.schedule_advance(now, AUTO_ADVANCE_DELAY, 3));
        assert!(!cursor.poll(now + AUTO_ADVANCE_DELAY, 3));
        assert_eq!(cursor.index(), 2);
    }

    #[test]
    fn test_manual_move_cancels_pending_advance() {
        let now = Instant::now();
        let mut cursor = Cursor::at(1, 4);
        cursor.schedule_advance(now, AUTO_ADVANCE_DELAY, 4);
        cursor.prev();
        assert!(!cursor.poll(now + AUTO_ADVANCE_DELAY, 4));
        assert_eq!(cursor.index(), 0);
    }

    #[test]
    fn test_pending_advance_dropped_if_list_shrinks() {
        let now = Instant::now();
        let mut cursor = Cursor::at(0, 2);
        cursor.schedule_advance(now, AUTO_ADVANCE_DELAY, 2);
        assert!(!cursor.poll(now + AUTO_ADVANCE_DELAY, 1));
        assert_eq!(cursor.index(), 0);
    }
}
