use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Properties requested for every contact read.
pub const CONTACT_PROPERTIES: &[&str] = &[
    "firstname",
    "lastname",
    "email",
    "company",
    "jobtitle",
    "phone",
    "address",
    "city",
    "state",
    "zip",
    "hs_lead_status",
    "l2_lead_status",
    "ba_email",
];

pub const MEETING_PROPERTIES: &[&str] = &[
    "hs_meeting_title",
    "hs_meeting_body",
    "hs_timestamp",
    "hs_meeting_outcome",
];

/// HubSpot-defined association type for meeting → contact.
pub const MEETING_TO_CONTACT_ASSOCIATION: u32 = 200;

pub type PropertyPatch = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Contact {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: BTreeMap::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<String>) -> Self {
        self.properties.insert(name.to_string(), Some(value.into()));
        self
    }

    /// Non-empty value of a property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .and_then(|v| v.as_deref())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn company(&self) -> Option<&str> {
        self.property("company")
    }

    pub fn zip(&self) -> Option<&str> {
        self.property("zip").map(str::trim)
    }

    pub fn lead_status(&self) -> Option<&str> {
        self.property("l2_lead_status")
    }

    pub fn owner_email(&self) -> Option<&str> {
        self.property("ba_email")
    }

    pub fn display_name(&self) -> String {
        if let Some(company) = self.company() {
            return company.to_string();
        }
        let name = [self.property("firstname"), self.property("lastname")]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() { self.id.clone() } else { name }
    }

    pub fn apply_patch(&mut self, patch: &PropertyPatch) {
        for (name, value) in patch {
            self.properties.insert(name.clone(), Some(value.clone()));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Eq,
    ContainsToken,
    NotHasProperty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilter {
    pub property_name: String,
    pub operator: FilterOperator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl SearchFilter {
    /// Property filters compare against a trimmed, lowercased value; company
    /// is matched by token, everything else exactly.
    pub fn matching(property: &str, value: &str) -> Self {
        let operator = if property == "company" {
            FilterOperator::ContainsToken
        } else {
            FilterOperator::Eq
        };
        Self {
            property_name: property.to_string(),
            operator,
            value: Some(value.trim().to_lowercase()),
        }
    }

    pub fn missing(property: &str) -> Self {
        Self {
            property_name: property.to_string(),
            operator: FilterOperator::NotHasProperty,
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterGroup {
    pub filters: Vec<SearchFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSort {
    pub property_name: String,
    pub direction: SortDirection,
}

/// Body of `POST /crm/v3/objects/contacts/search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub filter_groups: Vec<FilterGroup>,
    pub properties: Vec<String>,
    pub sorts: Vec<SearchSort>,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl SearchRequest {
    /// Newest contacts first; an empty filter list searches everything.
    pub fn new(filters: Vec<SearchFilter>, limit: u32, after: Option<String>) -> Self {
        let filter_groups = if filters.is_empty() {
            Vec::new()
        } else {
            vec![FilterGroup { filters }]
        };
        Self {
            filter_groups,
            properties: CONTACT_PROPERTIES.iter().map(|p| p.to_string()).collect(),
            sorts: vec![SearchSort {
                property_name: "createdate".to_string(),
                direction: SortDirection::Descending,
            }],
            limit,
            after: after.filter(|a| !a.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextPage {
    pub after: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    pub next: Option<NextPage>,
}

/// Envelope shared by list, search and batch-read responses.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl<T> CollectionResponse<T> {
    pub fn next_cursor(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .map(|n| n.after.as_str())
            .filter(|a| !a.is_empty())
    }
}

/// One page of contacts plus the continuation token for the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactPage {
    pub results: Vec<Contact>,
    pub next: Option<String>,
    pub total: Option<u64>,
}

impl From<CollectionResponse<Contact>> for ContactPage {
    fn from(resp: CollectionResponse<Contact>) -> Self {
        let next = resp.next_cursor().map(str::to_string);
        Self {
            results: resp.results,
            next,
            total: resp.total,
        }
    }
}

/// Every contact of one owner, newest first. `complete` is false when the
/// fetch stopped at the configured cap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullSet {
    pub contacts: Vec<Contact>,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PropertyOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub field_type: String,
    #[serde(default)]
    pub options: Vec<PropertyOption>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationResult {
    pub to_object_id: Value,
}

impl AssociationResult {
    /// v4 associations return numeric ids, v3 objects use strings.
    pub fn object_id(&self) -> Option<String> {
        match &self.to_object_id {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRecord {
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MeetingOutcome {
    Scheduled,
    Completed,
    Rescheduled,
    NoShow,
    Canceled,
    Other(String),
    #[default]
    Unknown,
}

impl MeetingOutcome {
    pub const CHOICES: [MeetingOutcome; 5] = [
        MeetingOutcome::Scheduled,
        MeetingOutcome::Completed,
        MeetingOutcome::Rescheduled,
        MeetingOutcome::NoShow,
        MeetingOutcome::Canceled,
    ];

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().replace(' ', "_").as_str() {
            "" => Self::Unknown,
            "SCHEDULED" => Self::Scheduled,
            "COMPLETED" => Self::Completed,
            "RESCHEDULED" => Self::Rescheduled,
            "NO_SHOW" => Self::NoShow,
            "CANCELED" | "CANCELLED" => Self::Canceled,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    /// Vendor value, `None` when nothing was recorded.
    pub fn as_vendor(&self) -> Option<&str> {
        match self {
            Self::Scheduled => Some("SCHEDULED"),
            Self::Completed => Some("COMPLETED"),
            Self::Rescheduled => Some("RESCHEDULED"),
            Self::NoShow => Some("NO_SHOW"),
            Self::Canceled => Some("CANCELED"),
            Self::Other(s) => Some(s.as_str()),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for MeetingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_vendor() {
            Some(v) => write!(f, "{}", v.to_lowercase().replace('_', " ")),
            None => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meeting {
    pub id: String,
    pub contact_id: String,
    pub title: String,
    pub body: String,
    pub timestamp: Option<String>,
    pub outcome: MeetingOutcome,
}

impl Meeting {
    pub fn from_record(contact_id: &str, record: ObjectRecord) -> Self {
        let prop = |name: &str| {
            record
                .properties
                .get(name)
                .cloned()
                .flatten()
                .filter(|v| !v.trim().is_empty())
        };
        Self {
            contact_id: contact_id.to_string(),
            title: prop("hs_meeting_title").unwrap_or_else(|| "Untitled Meeting".to_string()),
            body: prop("hs_meeting_body").unwrap_or_default(),
            timestamp: prop("hs_timestamp"),
            outcome: prop("hs_meeting_outcome")
                .map(|o| MeetingOutcome::parse(&o))
                .unwrap_or_default(),
            id: record.id,
        }
    }

    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?;
        if let Ok(ms) = raw.parse::<i64>() {
            return DateTime::from_timestamp_millis(ms);
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Validated meeting fields ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingInput {
    pub title: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: MeetingOutcome,
}

impl MeetingInput {
    pub fn to_properties(&self) -> PropertyPatch {
        let mut props = PropertyPatch::new();
        props.insert("hs_meeting_title".into(), self.title.clone());
        props.insert("hs_meeting_body".into(), self.body.clone());
        props.insert(
            "hs_timestamp".into(),
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        if let Some(outcome) = self.outcome.as_vendor() {
            props.insert("hs_meeting_outcome".into(), outcome.to_string());
        }
        props
    }

    pub fn to_meeting(&self, id: &str, contact_id: &str) -> Meeting {
        Meeting {
            id: id.to_string(),
            contact_id: contact_id.to_string(),
            title: self.title.clone(),
            body: self.body.clone(),
            timestamp: Some(self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
            outcome: self.outcome.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_body_matches_vendor_shape() {
        let req = SearchRequest::new(
            vec![
                SearchFilter::matching("company", "  ACME "),
                SearchFilter::matching("ba_email", "ba@example.com"),
            ],
            12,
            Some("24".into()),
        );
        let body = serde_json::to_value(&req).unwrap();

        assert_eq!(
            body["filterGroups"],
            json!([{ "filters": [
                { "propertyName": "company", "operator": "CONTAINS_TOKEN", "value": "acme" },
                { "propertyName": "ba_email", "operator": "EQ", "value": "ba@example.com" }
            ]}])
        );
        assert_eq!(
            body["sorts"],
            json!([{ "propertyName": "createdate", "direction": "DESCENDING" }])
        );
        assert_eq!(body["limit"], 12);
        assert_eq!(body["after"], "24");
        assert!(body["properties"].as_array().unwrap().contains(&json!("l2_lead_status")));
    }

    #[test]
    fn empty_search_omits_groups_and_cursor() {
        let body = serde_json::to_value(SearchRequest::new(Vec::new(), 12, Some(String::new()))).unwrap();
        assert_eq!(body["filterGroups"], json!([]));
        assert!(body.get("after").is_none());
    }

    #[test]
    fn missing_property_filter_has_no_value() {
        let body = serde_json::to_value(SearchFilter::missing("l2_lead_status")).unwrap();
        assert_eq!(
            body,
            json!({ "propertyName": "l2_lead_status", "operator": "NOT_HAS_PROPERTY" })
        );
    }

    #[test]
    fn collection_response_decodes_cursor() {
        let raw = json!({
            "total": 31,
            "results": [{ "id": "101", "properties": { "company": "Acme", "zip": null } }],
            "paging": { "next": { "after": "12", "link": "ignored" } }
        });
        let page: ContactPage = serde_json::from_value::<CollectionResponse<Contact>>(raw)
            .unwrap()
            .into();

        assert_eq!(page.next.as_deref(), Some("12"));
        assert_eq!(page.total, Some(31));
        assert_eq!(page.results[0].company(), Some("Acme"));
        assert_eq!(page.results[0].zip(), None);
    }

    #[test]
    fn meeting_from_record_defaults() {
        let record: ObjectRecord = serde_json::from_value(json!({
            "id": "9",
            "properties": { "hs_timestamp": "1717000000000", "hs_meeting_outcome": "NO_SHOW" }
        }))
        .unwrap();
        let meeting = Meeting::from_record("101", record);

        assert_eq!(meeting.title, "Untitled Meeting");
        assert_eq!(meeting.outcome.to_string(), "no show");
        assert!(meeting.occurred_at().is_some());
    }

    #[test]
    fn association_ids_accept_numbers_and_strings() {
        let num: AssociationResult = serde_json::from_value(json!({ "toObjectId": 42 })).unwrap();
        let text: AssociationResult = serde_json::from_value(json!({ "toObjectId": "43" })).unwrap();
        assert_eq!(num.object_id().as_deref(), Some("42"));
        assert_eq!(text.object_id().as_deref(), Some("43"));
    }
}
