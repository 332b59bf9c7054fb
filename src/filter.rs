//! What a contact filter means.
//!
//! The same [`ContactFilter`] is evaluated locally against the cached full
//! set and translated into vendor search filters for server-side paging.

use std::fmt;

use crate::api::models::{Contact, SearchFilter};

pub const ALL_STATUSES: &str = "all";
pub const NO_STATUS: &str = "none";
/// Free text shorter than this is ignored.
pub const MIN_QUERY_LEN: usize = 2;

/// Lead statuses a brand ambassador can set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadStatus {
    PendingVisit,
    VisitRequestedByRep,
    DroppedOff,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 3] = [
        LeadStatus::PendingVisit,
        LeadStatus::VisitRequestedByRep,
        LeadStatus::DroppedOff,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LeadStatus::PendingVisit => "pending visit",
            LeadStatus::VisitRequestedByRep => "visit requested by rep",
            LeadStatus::DroppedOff => "dropped off",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LeadStatus::PendingVisit => "Pending Visit",
            LeadStatus::VisitRequestedByRep => "Visit Requested by Rep",
            LeadStatus::DroppedOff => "Dropped Off",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum StatusFilter {
    #[default]
    All,
    /// Contacts that have no lead status yet.
    NoStatus,
    Only(String),
}

impl StatusFilter {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(ALL_STATUSES) {
            Self::All
        } else if raw.eq_ignore_ascii_case(NO_STATUS) {
            Self::NoStatus
        } else {
            Self::Only(raw.to_lowercase())
        }
    }

    pub fn as_param(&self) -> &str {
        match self {
            Self::All => ALL_STATUSES,
            Self::NoStatus => NO_STATUS,
            Self::Only(s) => s,
        }
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        match self {
            Self::All => true,
            Self::NoStatus => contact.lead_status().is_none(),
            Self::Only(wanted) => contact
                .lead_status()
                .is_some_and(|s| s.trim().eq_ignore_ascii_case(wanted)),
        }
    }
}

impl From<LeadStatus> for StatusFilter {
    fn from(status: LeadStatus) -> Self {
        Self::Only(status.as_str().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ContactFilter {
    pub status: StatusFilter,
    pub query: String,
    pub zip: Option<String>,
}

impl ContactFilter {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// The company query once it is long enough to apply.
    pub fn active_query(&self) -> Option<&str> {
        let q = self.query.trim();
        (q.chars().count() >= MIN_QUERY_LEN).then_some(q)
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        if let Some(zip) = &self.zip {
            let matches_zip = contact
                .zip()
                .is_some_and(|z| z.eq_ignore_ascii_case(zip.trim()));
            if !matches_zip {
                return false;
            }
        }
        if !self.status.matches(contact) {
            return false;
        }
        match self.active_query() {
            Some(q) => contact
                .company()
                .is_some_and(|c| c.to_lowercase().contains(&q.to_lowercase())),
            None => true,
        }
    }

    pub fn apply<'a>(&self, contacts: &'a [Contact]) -> Vec<&'a Contact> {
        contacts.iter().filter(|c| self.matches(c)).collect()
    }

    /// Vendor-side equivalent, always scoped to the owner's contacts.
    pub fn search_filters(&self, owner_email: &str) -> Vec<SearchFilter> {
        let mut filters = vec![SearchFilter::matching("ba_email", owner_email)];
        match &self.status {
            StatusFilter::All => {}
            StatusFilter::NoStatus => filters.push(SearchFilter::missing("l2_lead_status")),
            StatusFilter::Only(s) => filters.push(SearchFilter::matching("l2_lead_status", s)),
        }
        if let Some(zip) = &self.zip {
            filters.push(SearchFilter::matching("zip", zip));
        }
        if let Some(q) = self.active_query() {
            filters.push(SearchFilter::matching("company", q));
        }
        filters
    }
}

/// Records `[(page-1)*size, page*size)` and whether anything follows.
pub fn paginate<T: Clone>(items: &[T], page: u32, page_size: usize) -> (Vec<T>, bool) {
    let page = page.max(1) as usize;
    let start = (page - 1).saturating_mul(page_size);
    let end = start.saturating_add(page_size);
    let slice = items
        .get(start..end.min(items.len()))
        .map(<[T]>::to_vec)
        .unwrap_or_default();
    (slice, end < items.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::FilterOperator;

    fn contact(id: &str, company: &str, status: &str, zip: &str) -> Contact {
        Contact::new(id)
            .with_property("company", company)
            .with_property("l2_lead_status", status)
            .with_property("zip", zip)
    }

    #[test]
    fn company_query_is_case_insensitive_substring() {
        let filter = ContactFilter {
            query: "acme".into(),
            ..Default::default()
        };
        assert!(filter.matches(&contact("1", "The ACME Smoke Shop", "pending visit", "90013")));
        assert!(!filter.matches(&contact("2", "Globex", "pending visit", "90013")));
    }

    #[test]
    fn short_query_is_ignored() {
        let filter = ContactFilter {
            query: " a ".into(),
            ..Default::default()
        };
        assert_eq!(filter.active_query(), None);
        assert!(filter.matches(&contact("1", "Globex", "", "")));
    }

    #[test]
    fn status_and_zip_are_case_insensitive_exact() {
        let filter = ContactFilter {
            status: StatusFilter::parse("Dropped Off"),
            zip: Some("k1a 0b1".into()),
            ..Default::default()
        };
        assert!(filter.matches(&contact("1", "Acme", "dropped off", "K1A 0B1")));
        assert!(!filter.matches(&contact("2", "Acme", "dropped off soon", "K1A 0B1")));
        assert!(!filter.matches(&contact("3", "Acme", "dropped off", "K1A 0B12")));
    }

    #[test]
    fn no_status_matches_missing_property() {
        let filter = ContactFilter {
            status: StatusFilter::parse("none"),
            ..Default::default()
        };
        assert!(filter.matches(&Contact::new("1")));
        assert!(!filter.matches(&contact("2", "Acme", "pending visit", "")));
    }

    #[test]
    fn search_filters_mirror_local_semantics() {
        let filter = ContactFilter {
            status: StatusFilter::NoStatus,
            query: "Acme".into(),
            zip: Some("90013".into()),
        };
        let filters = filter.search_filters("ba@example.com");
        let ops: Vec<_> = filters
            .iter()
            .map(|f| (f.property_name.as_str(), f.operator))
            .collect();
        assert_eq!(
            ops,
            vec![
                ("ba_email", FilterOperator::Eq),
                ("l2_lead_status", FilterOperator::NotHasProperty),
                ("zip", FilterOperator::Eq),
                ("company", FilterOperator::ContainsToken),
            ]
        );
        assert_eq!(filters[3].value.as_deref(), Some("acme"));
    }

    #[test]
    fn paginate_slices_and_reports_next() {
        let items: Vec<u32> = (0..30).collect();
        let (first, more) = paginate(&items, 1, 12);
        assert_eq!(first, (0..12).collect::<Vec<_>>());
        assert!(more);

        let (third, more) = paginate(&items, 3, 12);
        assert_eq!(third, (24..30).collect::<Vec<_>>());
        assert!(!more);

        let (beyond, more) = paginate(&items, 9, 12);
        assert!(beyond.is_empty());
        assert!(!more);
    }

    #[test]
    fn paginate_exact_multiple_has_no_next() {
        let items: Vec<u32> = (0..24).collect();
        assert!(!paginate(&items, 2, 12).1);
        assert!(paginate(&items, 1, 12).1);
    }

    #[test]
    fn lead_status_parses_labels() {
        assert_eq!(LeadStatus::parse("Dropped Off"), Some(LeadStatus::DroppedOff));
        assert_eq!(LeadStatus::parse("shipped"), None);
        assert_eq!(
            StatusFilter::from(LeadStatus::PendingVisit).as_param(),
            "pending visit"
        );
    }
}
