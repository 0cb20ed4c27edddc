// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer-service session window policy.
//!
//! Free-form content may only be sent while the window opened by the last
//! inbound message is open. Templates are always allowed. Window status is
//! derived on every read and never stored.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use convoy_core::{ConversationId, ConvoyError, MessageContent};

/// Length of the window opened by an inbound message, in seconds.
pub const SESSION_WINDOW_SECS: i64 = 24 * 60 * 60;

pub fn session_window() -> TimeDelta {
    TimeDelta::seconds(SESSION_WINDOW_SECS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    /// No inbound message has ever been recorded.
    NoWindow,
    Open { remaining: TimeDelta },
    Closed,
}

impl WindowStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, WindowStatus::Open { .. })
    }

    /// Whether `content` may be sent under this status.
    pub fn permits(&self, content: &MessageContent) -> bool {
        content.is_template() || self.is_open()
    }

    /// Display form of the remaining time, when open.
    pub fn remaining(&self) -> Option<RemainingTime> {
        match self {
            WindowStatus::Open { remaining } => Some(RemainingTime::from_delta(*remaining)),
            _ => None,
        }
    }
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowStatus::NoWindow => f.write_str("no window"),
            WindowStatus::Open { remaining } => {
                write!(f, "open ({} left)", RemainingTime::from_delta(*remaining))
            }
            WindowStatus::Closed => f.write_str("closed"),
        }
    }
}

/// Evaluate the window for a conversation's last inbound timestamp.
///
/// Exactly 24h after the inbound message the window is closed. An inbound
/// timestamp ahead of `now` (clock skew) counts as zero elapsed time.
pub fn evaluate(last_inbound: Option<DateTime<Utc>>, now: DateTime<Utc>) -> WindowStatus {
    let Some(last_inbound) = last_inbound else {
        return WindowStatus::NoWindow;
    };
    let elapsed = (now - last_inbound).max(TimeDelta::zero());
    let window = session_window();
    if elapsed < window {
        WindowStatus::Open {
            remaining: window - elapsed,
        }
    } else {
        WindowStatus::Closed
    }
}

/// Reject free-form content when the window is not open.
pub fn ensure_sendable(
    conversation_id: ConversationId,
    content: &MessageContent,
    status: WindowStatus,
) -> Result<(), ConvoyError> {
    if status.permits(content) {
        Ok(())
    } else {
        Err(ConvoyError::WindowClosed { conversation_id })
    }
}

/// Remaining window time split for display, floored to whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingTime {
    pub hours: i64,
    pub minutes: i64,
    /// Open, but less than a minute left.
    pub under_a_minute: bool,
}

impl RemainingTime {
    pub fn from_delta(remaining: TimeDelta) -> Self {
        let total_minutes = remaining.num_minutes().max(0);
        Self {
            hours: total_minutes / 60,
            minutes: total_minutes % 60,
            under_a_minute: total_minutes == 0 && remaining > TimeDelta::zero(),
        }
    }
}

impl fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.under_a_minute {
            f.write_str("<1m")
        } else {
            write!(f, "{}h {}m", self.hours, self.minutes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 8, 30, 0).unwrap()
    }

    #[test]
    fn exactly_24h_is_closed() {
        assert_eq!(evaluate(Some(t0()), t0() + TimeDelta::hours(24)), WindowStatus::Closed);
    }

    #[test]
    fn one_second_short_is_open_and_floors() {
        let status = evaluate(Some(t0()), t0() + TimeDelta::seconds(1));
        let remaining = status.remaining().unwrap();
        assert_eq!((remaining.hours, remaining.minutes), (23, 59));
        assert_eq!(remaining.to_string(), "23h 59m");
    }

    #[test]
    fn no_inbound_means_no_window() {
        assert_eq!(evaluate(None, t0()), WindowStatus::NoWindow);
        assert!(!WindowStatus::NoWindow.permits(&MessageContent::text("hi")));
    }

    #[test]
    fn last_seconds_render_as_under_a_minute() {
        let status = evaluate(Some(t0()), t0() + session_window() - TimeDelta::seconds(20));
        assert!(status.is_open());
        assert_eq!(status.remaining().unwrap().to_string(), "<1m");
    }

    #[test]
    fn future_inbound_is_treated_as_just_received() {
        let status = evaluate(Some(t0() + TimeDelta::minutes(5)), t0());
        assert_eq!(
            status,
            WindowStatus::Open {
                remaining: session_window()
            }
        );
    }

    #[test]
    fn templates_are_always_permitted() {
        let template = MessageContent::Template {
            name: "shift_reminder".into(),
            language: "en".into(),
            parameters: Default::default(),
        };
        assert!(WindowStatus::Closed.permits(&template));
        assert!(ensure_sendable(ConversationId(1), &template, WindowStatus::NoWindow).is_ok());
        assert!(matches!(
            ensure_sendable(ConversationId(1), &MessageContent::text("x"), WindowStatus::Closed),
            Err(ConvoyError::WindowClosed { .. })
        ));
    }

    proptest! {
        #[test]
        fn closed_from_24h_on(secs in 0i64..10_000_000, extra in 0i64..1_000_000) {
            let t = t0() + TimeDelta::seconds(secs);
            prop_assert_eq!(
                evaluate(Some(t), t + session_window() + TimeDelta::seconds(extra)),
                WindowStatus::Closed
            );
        }

        #[test]
        fn open_before_24h_with_floored_display(secs in 0i64..10_000_000, elapsed in 0i64..86_400) {
            let t = t0() + TimeDelta::seconds(secs);
            let status = evaluate(Some(t), t + TimeDelta::seconds(elapsed));
            let remaining_secs = 86_400 - elapsed;
            prop_assert_eq!(status, WindowStatus::Open { remaining: TimeDelta::seconds(remaining_secs) });
            let display = status.remaining().unwrap();
            prop_assert_eq!(display.hours * 3600 + display.minutes * 60, remaining_secs / 60 * 60);
            prop_assert!(display.minutes < 60);
        }
    }
}
