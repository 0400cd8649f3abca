//! Daily trading window
//!
//! Gates buys only. Bounds are inclusive at minute resolution and a window
//! whose stop is earlier than its start wraps past midnight.

use chrono::{Local, NaiveTime, Timelike};
use std::fmt;

use crate::config::TimerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub enabled: bool,
    pub start: NaiveTime,
    pub stop: NaiveTime,
    pub auto_sell_on_stop: bool,
}

/// Change of window state between two checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTransition {
    Opened,
    Closed,
}

impl TimeWindow {
    pub fn from_config(config: &TimerConfig) -> Self {
        Self {
            enabled: config.enabled,
            start: config.start_time,
            stop: config.stop_time,
            auto_sell_on_stop: config.auto_sell_on_stop,
        }
    }

    /// Whether buys are allowed at `time`
    pub fn contains(&self, time: NaiveTime) -> bool {
        if !self.enabled || self.start == self.stop {
            return true;
        }
        let t = time.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(time);
        if self.start < self.stop {
            self.start <= t && t <= self.stop
        } else {
            t >= self.start || t <= self.stop
        }
    }

    pub fn is_open_now(&self) -> bool {
        self.contains(Local::now().time())
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled {
            write!(f, "{}-{}", self.start.format("%H:%M"), self.stop.format("%H:%M"))
        } else {
            write!(f, "always")
        }
    }
}

/// Remembers the last observed window state to report transitions once
#[derive(Debug)]
pub struct WindowWatch {
    window: TimeWindow,
    open: bool,
}

impl WindowWatch {
    pub fn new(window: TimeWindow, now: NaiveTime) -> Self {
        Self {
            window,
            open: window.contains(now),
        }
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn check(&mut self, now: NaiveTime) -> Option<WindowTransition> {
        let open = self.window.contains(now);
        if open == self.open {
            return None;
        }
        self.open = open;
        Some(if open {
            WindowTransition::Opened
        } else {
            WindowTransition::Closed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn window(start: NaiveTime, stop: NaiveTime) -> TimeWindow {
        TimeWindow {
            enabled: true,
            start,
            stop,
            auto_sell_on_stop: true,
        }
    }

    #[test]
    fn test_daytime_window() {
        let w = window(t(9, 0), t(17, 30));
        assert!(w.contains(t(9, 0)));
        assert!(w.contains(t(12, 0)));
        assert!(w.contains(NaiveTime::from_hms_opt(17, 30, 45).unwrap()));
        assert!(!w.contains(t(17, 31)));
        assert!(!w.contains(t(8, 59)));
    }

    #[test]
    fn test_overnight_window_wraps() {
        let w = window(t(22, 0), t(2, 0));
        assert!(w.contains(t(23, 15)));
        assert!(w.contains(t(0, 30)));
        assert!(w.contains(t(2, 0)));
        assert!(!w.contains(t(2, 1)));
        assert!(!w.contains(t(12, 0)));
    }

    #[test]
    fn test_disabled_window_always_open() {
        let w = TimeWindow {
            enabled: false,
            ..window(t(9, 0), t(10, 0))
        };
        assert!(w.contains(t(3, 0)));
        assert_eq!(w.to_string(), "always");
    }

    #[test]
    fn test_watch_reports_close_once() {
        let mut watch = WindowWatch::new(window(t(9, 0), t(17, 0)), t(16, 58));
        assert!(watch.is_open());
        assert_eq!(watch.check(t(16, 59)), None);
        assert_eq!(watch.check(t(17, 1)), Some(WindowTransition::Closed));
        assert_eq!(watch.check(t(17, 2)), None);
        assert_eq!(watch.check(t(9, 0)), Some(WindowTransition::Opened));
    }
}
