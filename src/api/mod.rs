pub mod client;
pub mod models;

use async_trait::async_trait;

use crate::error::ApiError;
use models::{
    Contact, ContactPage, FullSet, Meeting, MeetingInput, Owner, PropertyDefinition,
    PropertyPatch, SearchFilter, SearchRequest,
};

/// Largest page HubSpot's search endpoint accepts.
pub const SEARCH_PAGE_LIMIT: u32 = 100;

/// Operations the dashboard needs from the CRM.
///
/// [`client::HubSpotClient`] is the production implementation; tests plug in
/// an in-memory one.
#[async_trait]
pub trait ContactsApi: Send + Sync {
    async fn list_contacts(&self, after: Option<&str>, limit: u32) -> Result<ContactPage, ApiError>;

    async fn search_contacts(&self, request: &SearchRequest) -> Result<ContactPage, ApiError>;

    async fn get_contact(&self, id: &str) -> Result<Contact, ApiError>;

    async fn create_contact(&self, properties: &PropertyPatch) -> Result<Contact, ApiError>;

    async fn update_contact(&self, id: &str, properties: &PropertyPatch) -> Result<Contact, ApiError>;

    async fn contact_properties(&self) -> Result<Vec<PropertyDefinition>, ApiError>;

    /// Best effort: HubSpot only reports a total on some plans.
    async fn total_contacts_estimate(&self) -> Result<Option<u64>, ApiError>;

    async fn owners(&self) -> Result<Vec<Owner>, ApiError>;

    async fn meetings_for_contact(&self, contact_id: &str) -> Result<Vec<Meeting>, ApiError>;

    async fn create_meeting(&self, contact_id: &str, input: &MeetingInput) -> Result<Meeting, ApiError>;

    async fn update_meeting(
        &self,
        contact_id: &str,
        meeting_id: &str,
        input: &MeetingInput,
    ) -> Result<Meeting, ApiError>;

    async fn delete_meeting(&self, meeting_id: &str) -> Result<(), ApiError>;

    async fn update_lead_status(&self, id: &str, status: &str) -> Result<Contact, ApiError> {
        let mut patch = PropertyPatch::new();
        patch.insert("l2_lead_status".to_string(), status.to_string());
        self.update_contact(id, &patch).await
    }

    /// Every contact owned by `owner_email`, following cursors until the
    /// vendor reports no further page or `cap` contacts were collected.
    async fn fetch_all_contacts(&self, owner_email: &str, cap: usize) -> Result<FullSet, ApiError> {
        let mut contacts = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let request = SearchRequest::new(
                vec![SearchFilter::matching("ba_email", owner_email)],
                SEARCH_PAGE_LIMIT,
                after.take(),
            );
            let page = self.search_contacts(&request).await?;
            contacts.extend(page.results);
            match page.next {
                Some(next) if contacts.len() < cap => after = Some(next),
                Some(_) => {
                    contacts.truncate(cap);
                    return Ok(FullSet {
                        contacts,
                        complete: false,
                    });
                }
                None => {
                    return Ok(FullSet {
                        contacts,
                        complete: true,
                    });
                }
            }
        }
    }
}
