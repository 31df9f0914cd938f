//! Terminal rendering of the session, chat and notifications.

use colored::*;

use crate::controller::{Notification, Tab};
use crate::models::{ActivityKind, ChatMessage, ConnectivityStatus, TripSession};

pub fn status_badge(status: ConnectivityStatus) -> String {
    let label = status.to_string();
    match status {
        ConnectivityStatus::Reachable => format!("● {label}").bright_green().to_string(),
        ConnectivityStatus::Unreachable => format!("● {label}").bright_red().to_string(),
        ConnectivityStatus::Unknown => format!("○ {label}").bright_black().to_string(),
    }
}

fn kind_label(kind: &ActivityKind) -> String {
    let tag = format!("[{kind}]");
    match kind {
        ActivityKind::Transport => tag.cyan().to_string(),
        ActivityKind::Food => tag.yellow().to_string(),
        ActivityKind::Fun => tag.magenta().to_string(),
        ActivityKind::Lodging => tag.blue().to_string(),
        ActivityKind::Sightseeing => tag.green().to_string(),
        ActivityKind::Other(_) => tag.normal().to_string(),
    }
}

/// The plan tab: trip header followed by one block per day.
pub fn itinerary(session: &TripSession) -> String {
    if session.is_empty() {
        return "No itinerary yet. Upload a ticket, booking or screenshot to build one.\n"
            .bright_black()
            .to_string();
    }

    let mut out = String::new();
    if let Some((start, end)) = session.date_range() {
        out.push_str(&format!("{} {start} → {end}\n", "Trip:".bold()));
    }
    if !session.destinations.is_empty() {
        out.push_str(&format!(
            "{} {}\n",
            "Destinations:".bold(),
            session.destinations.join(", ")
        ));
    }
    for plan in &session.itinerary {
        out.push('\n');
        out.push_str(&format!(
            "{}  {}\n",
            format!("Day {}", plan.day).bright_blue().bold(),
            plan.date.bright_black()
        ));
        for act in &plan.activities {
            out.push_str(&format!(
                "  {}  {} {}\n",
                act.time.bright_blue(),
                act.title,
                kind_label(&act.kind)
            ));
        }
    }
    out
}

/// The expense tab has no content yet.
pub fn expense_placeholder() -> String {
    "Expense tracking is not available yet.\n".bright_black().to_string()
}

pub fn tab(tab: Tab, session: &TripSession) -> String {
    match tab {
        Tab::Plan => itinerary(session),
        Tab::Expense => expense_placeholder(),
    }
}

/// One chat line; the local author is highlighted.
pub fn chat_line(message: &ChatMessage, local_author: &str) -> String {
    let author = if message.is_local(local_author) {
        message.author.bright_green().bold()
    } else {
        message.author.bright_cyan().bold()
    };
    format!("{} {}: {}", message.time.bright_black(), author, message.message)
}

pub fn notification(n: &Notification) -> String {
    match n {
        Notification::Info(text) => text.bright_blue().to_string(),
        Notification::Error(text) => text.bright_red().bold().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LOCAL_AUTHOR;

    #[test]
    fn test_itinerary_lists_days_and_activities() {
        let out = itinerary(&TripSession::sample());
        assert!(out.contains("Day 1"));
        assert!(out.contains("Day 2"));
        assert!(out.contains("Arrive at Narita Airport"));
        assert!(out.contains("Tokyo"));
        assert!(out.contains("2024-04-01"));
    }

    #[test]
    fn test_itinerary_empty_session_prompts_upload() {
        assert!(itinerary(&TripSession::empty()).contains("No itinerary yet"));
    }

    #[test]
    fn test_itinerary_preserves_day_order() {
        let out = itinerary(&TripSession::sample());
        let d1 = out.find("Day 1").unwrap();
        let d2 = out.find("Day 2").unwrap();
        assert!(d1 < d2);
    }

    #[test]
    fn test_expense_tab_is_placeholder() {
        assert!(tab(Tab::Expense, &TripSession::sample()).contains("not available"));
    }

    #[test]
    fn test_chat_line_contains_parts() {
        let msg = ChatMessage {
            id: None,
            author: LOCAL_AUTHOR.to_string(),
            message: "see you at 10".to_string(),
            time: "09:41".to_string(),
        };
        let line = chat_line(&msg, LOCAL_AUTHOR);
        assert!(line.contains("09:41"));
        assert!(line.contains(LOCAL_AUTHOR));
        assert!(line.contains("see you at 10"));
    }

    #[test]
    fn test_status_badge_contains_label() {
        assert!(status_badge(ConnectivityStatus::Reachable).contains("reachable"));
        assert!(status_badge(ConnectivityStatus::Unreachable).contains("unreachable"));
    }

    #[test]
    fn test_notification_contains_text() {
        assert!(notification(&Notification::Error("Upload failed".into())).contains("Upload failed"));
    }
}
