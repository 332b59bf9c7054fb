//! Per-contact meeting log with optimistic entries.

use chrono::Utc;
use log::debug;

use crate::api::models::{Meeting, MeetingInput};

const TEMP_PREFIX: &str = "temp-";

#[derive(Debug, Clone, Default)]
pub struct MeetingLog {
    contact_id: String,
    entries: Vec<Meeting>,
    loaded: bool,
}

impl MeetingLog {
    pub fn new(contact_id: impl Into<String>) -> Self {
        Self {
            contact_id: contact_id.into(),
            ..Default::default()
        }
    }

    pub fn contact_id(&self) -> &str {
        &self.contact_id
    }

    /// Newest first.
    pub fn entries(&self) -> &[Meeting] {
        &self.entries
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self, id: &str) -> Option<&Meeting> {
        self.entries.iter().find(|m| m.id == id)
    }

    pub fn is_pending(id: &str) -> bool {
        id.starts_with(TEMP_PREFIX)
    }

    pub fn replace_all(&mut self, mut meetings: Vec<Meeting>) {
        meetings.sort_by(|a, b| b.occurred_at().cmp(&a.occurred_at()));
        self.entries = meetings;
        self.loaded = true;
    }

    /// Shows `input` immediately under a temporary id.
    pub fn add_optimistic(&mut self, input: &MeetingInput) -> String {
        let mut temp_id = format!("{TEMP_PREFIX}{}", Utc::now().timestamp_millis());
        while self.get(&temp_id).is_some() {
            temp_id.push('0');
        }
        self.entries
            .insert(0, input.to_meeting(&temp_id, &self.contact_id));
        debug!("Added pending meeting {temp_id} for contact {}", self.contact_id);
        temp_id
    }

    /// Swaps the pending entry for the stored one.
    pub fn confirm(&mut self, temp_id: &str, meeting: Meeting) {
        match self.entries.iter_mut().find(|m| m.id == temp_id) {
            Some(slot) => *slot = meeting,
            None => self.entries.insert(0, meeting),
        }
    }

    pub fn discard(&mut self, temp_id: &str) -> bool {
        self.remove(temp_id).is_some()
    }

    /// Returns the previous entry so the edit can be rolled back.
    pub fn patch(&mut self, id: &str, input: &MeetingInput) -> Option<Meeting> {
        let slot = self.entries.iter_mut().find(|m| m.id == id)?;
        let updated = input.to_meeting(id, &slot.contact_id);
        Some(std::mem::replace(slot, updated))
    }

    pub fn restore(&mut self, previous: Meeting) {
        match self.entries.iter_mut().find(|m| m.id == previous.id) {
            Some(slot) => *slot = previous,
            None => self.entries.push(previous),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Meeting> {
        let pos = self.entries.iter().position(|m| m.id == id)?;
        Some(self.entries.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::MeetingOutcome;
    use chrono::TimeZone;

    fn input(title: &str) -> MeetingInput {
        MeetingInput {
            title: title.into(),
            body: String::new(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap(),
            outcome: MeetingOutcome::Completed,
        }
    }

    #[test]
    fn optimistic_entry_is_confirmed_in_place() {
        let mut log = MeetingLog::new("42");
        log.replace_all(vec![input("Older").to_meeting("1", "42")]);
        let temp = log.add_optimistic(&input("Drop-off"));

        assert!(MeetingLog::is_pending(&temp));
        assert_eq!(log.entries()[0].id, temp);

        log.confirm(&temp, input("Drop-off").to_meeting("900", "42"));
        let ids: Vec<_> = log.entries().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["900", "1"]);
    }

    #[test]
    fn failed_create_is_discarded() {
        let mut log = MeetingLog::new("42");
        let temp = log.add_optimistic(&input("Drop-off"));
        assert!(log.discard(&temp));
        assert!(log.entries().is_empty());
        assert!(!log.discard(&temp));
    }

    #[test]
    fn patch_returns_previous_for_rollback() {
        let mut log = MeetingLog::new("42");
        log.replace_all(vec![input("Visit").to_meeting("1", "42")]);

        let previous = log.patch("1", &input("Second visit")).unwrap();
        assert_eq!(log.get("1").unwrap().title, "Second visit");

        log.restore(previous);
        assert_eq!(log.get("1").unwrap().title, "Visit");
        assert!(log.patch("missing", &input("x")).is_none());
    }

    #[test]
    fn replace_all_sorts_newest_first() {
        let mut log = MeetingLog::new("42");
        let mut early = input("Early");
        early.timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        log.replace_all(vec![early.to_meeting("1", "42"), input("Late").to_meeting("2", "42")]);
        assert_eq!(log.entries()[0].id, "2");
        assert!(log.is_loaded());
    }
}
