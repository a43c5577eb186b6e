//! Per-test step counters

use parking_lot::Mutex;
use std::collections::HashMap;

/// Counts captured artifacts per (browser, test name).
///
/// Counters start at 0 and only move forward; there is no reset. A fresh
/// recorder (a new session) is the only way to count from 1 again. The same
/// test run in two browsers numbers its steps independently.
#[derive(Debug, Default)]
pub struct StepRecorder {
    counters: Mutex<HashMap<(String, String), u32>>,
}

impl StepRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the counter for `test_name` and return the new value
    pub fn next_step(&self, test_name: &str) -> u32 {
        self.next_step_in("", test_name)
    }

    /// Advance the counter for `test_name` running in `browser`
    pub fn next_step_in(&self, browser: &str, test_name: &str) -> u32 {
        let mut counters = self.counters.lock();
        let counter = counters
            .entry((browser.to_string(), test_name.to_string()))
            .or_insert(0);
        *counter += 1;
        *counter
    }

    /// Steps captured so far for `test_name`
    pub fn current(&self, test_name: &str) -> u32 {
        self.current_in("", test_name)
    }

    /// Steps captured so far for `test_name` running in `browser`
    pub fn current_in(&self, browser: &str, test_name: &str) -> u32 {
        self.counters
            .lock()
            .get(&(browser.to_string(), test_name.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_per_name() {
        let steps = StepRecorder::new();
        let seen: Vec<u32> = (0..5).map(|_| steps.next_step("login")).collect();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(steps.current("login"), 5);
    }

    #[test]
    fn test_names_are_independent() {
        let steps = StepRecorder::new();
        assert_eq!(steps.next_step("a"), 1);
        assert_eq!(steps.next_step("a"), 2);
        assert_eq!(steps.next_step("b"), 1);
        assert_eq!(steps.next_step("a"), 3);
        assert_eq!(steps.next_step("b"), 2);
        assert_eq!(steps.current("c"), 0);
    }

    #[test]
    fn test_browsers_are_independent() {
        let steps = StepRecorder::new();
        assert_eq!(steps.next_step_in("chromium", "login"), 1);
        assert_eq!(steps.next_step_in("chromium", "login"), 2);
        assert_eq!(steps.next_step_in("firefox", "login"), 1);
        assert_eq!(steps.current_in("chromium", "login"), 2);
        assert_eq!(steps.current_in("firefox", "login"), 1);
        assert_eq!(steps.current_in("webkit", "login"), 0);
        assert_eq!(steps.current("login"), 0);
    }
}
