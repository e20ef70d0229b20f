use chrono::{Duration, NaiveDate};
use icalendar::{Calendar, Component, Event, EventLike};

use crate::models::ClassSession;

#[derive(Clone)]
pub struct ICalExporter {
    studio_name: String,
    location: Option<String>,
}

impl ICalExporter {
    pub fn new(studio_name: impl Into<String>, location: Option<String>) -> Self {
        Self {
            studio_name: studio_name.into(),
            location,
        }
    }

    /// Renders the weekly schedule as concrete events in the week starting at
    /// `monday`.
    pub fn generate(&self, sessions: &[ClassSession], monday: NaiveDate) -> Vec<u8> {
        if sessions.is_empty() {
            return Vec::new();
        }

        let mut calendar = Calendar::new();
        calendar.name(&format!("{} schedule", self.studio_name));

        for session in sessions {
            let date = monday + Duration::days(session.day_of_week.days_from_monday().into());
            let start = date.and_time(session.start_time);
            let end = start + Duration::minutes(session.duration.minutes().into());

            let mut event = Event::new();
            event.summary(session.specialization.label());
            event.starts(start);
            event.ends(end);
            event.location(self.location.as_deref().unwrap_or(&self.studio_name));
            event.description(&format!(
                "Instructor: {}\nFree spots: {} of {}",
                session.instructor_name, session.free_spots, session.total_capacity
            ));
            event.uid(&format!(
                "{}-session-{}-studio-booking",
                date.format("%Y%m%d"),
                session.id
            ));
            calendar.push(event);
        }

        calendar.to_string().into_bytes()
    }
}
