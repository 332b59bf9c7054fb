//! The dashboard controller.
//!
//! [`Dashboard`] owns the contact store, the location synchronizer and the
//! API handle, and runs each user operation end to end. Operations that a
//! front end wants to render in two steps (optimistic state first, server
//! result later) are also exposed as `begin_*`/`finish_*` pairs so the
//! network call can run without holding the controller.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::api::ContactsApi;
use crate::api::models::{Contact, Meeting, MeetingInput, Owner, PropertyPatch};
use crate::config::{DEFAULT_FULL_SET_CAP, Session, Settings};
use crate::error::{ApiError, MutationFailure};
use crate::filter::{ContactFilter, LeadStatus, StatusFilter};
use crate::forms::{CreateContactForm, EditContactForm, MeetingForm};
use crate::location::{DashboardLocation, LocationSync, SyncPhase};
use crate::meetings::MeetingLog;
use crate::store::{
    Applied, ContactStore, FetchTicket, PagePlan, PageRequest, RemotePage, Scope, resolve_page,
};

pub const CREATE_FALLBACK: &str = "Failed to create contact";
pub const UPDATE_FALLBACK: &str = "Update failed.";
pub const STATUS_FALLBACK: &str = "Failed to update status";
pub const MEETING_FALLBACK: &str = "Failed to save meeting";
pub const NO_OWNERS: &str = "No available HubSpot owners found.";
pub const NOT_YOUR_CONTACT: &str = "You can only update contacts assigned to you.";

/// `hs_lead_status` every ambassador-created contact starts with.
pub const NEW_CONTACT_HS_STATUS: &str = "Samples";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardOptions {
    pub full_set_cap: usize,
    pub preferred_owner_email: Option<String>,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            full_set_cap: DEFAULT_FULL_SET_CAP,
            preferred_owner_email: None,
        }
    }
}

impl DashboardOptions {
    pub fn from_settings(settings: &Settings, session: &Session) -> Self {
        Self {
            full_set_cap: settings.full_set_cap.max(1),
            preferred_owner_email: settings
                .brand(session.brand)
                .preferred_owner_email
                .clone()
                .filter(|e| !e.trim().is_empty()),
        }
    }
}

/// Snapshot of what the list view renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub contacts: Vec<Contact>,
    pub page: u32,
    pub has_next: bool,
    pub has_prev: bool,
    pub zips: Vec<String>,
    pub filter: ContactFilter,
    pub loading: bool,
    pub loaded_once: bool,
    pub total: Option<u64>,
}

impl DashboardView {
    /// Nothing to show once a load has finished.
    pub fn is_empty(&self) -> bool {
        self.loaded_once && !self.loading && self.contacts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedContact {
    pub contact_id: String,
    pub contact: Contact,
}

/// A remote page fetch detached from the controller.
#[derive(Debug)]
pub struct PageJob<A: ?Sized> {
    api: Arc<A>,
    request: PageRequest,
}

impl<A: ContactsApi + ?Sized> PageJob<A> {
    pub fn ticket(&self) -> &FetchTicket {
        &self.request.ticket
    }

    pub async fn run(self) -> PageOutcome {
        let result = resolve_page(self.api.as_ref(), &self.request).await;
        PageOutcome {
            ticket: self.request.ticket,
            result,
        }
    }
}

#[derive(Debug)]
pub struct PageOutcome {
    pub ticket: FetchTicket,
    pub result: Result<RemotePage, ApiError>,
}

/// An optimistic contact patch waiting for the vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub contact_id: String,
    pub patch: PropertyPatch,
    previous: Option<Contact>,
    fallback: &'static str,
}

/// What came back from a lead status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavedStatus {
    /// The contact as re-read after the change.
    Refetched(Contact),
    /// The change was saved but re-reading the contact failed; only the
    /// PATCH response is known.
    Unconfirmed(Contact),
}

/// PATCHes the lead status, then re-reads the contact to pick up whatever
/// HubSpot derived from it. Only a failed PATCH is an error.
pub async fn save_lead_status<A>(api: &A, id: &str, status: LeadStatus) -> Result<SavedStatus, ApiError>
where
    A: ContactsApi + ?Sized,
{
    let patched = api.update_lead_status(id, status.as_str()).await?;
    match api.get_contact(id).await {
        Ok(contact) => Ok(SavedStatus::Refetched(contact)),
        Err(e) => {
            warn!("Lead status of contact {id} was saved but re-reading it failed: {e}");
            Ok(SavedStatus::Unconfirmed(patched))
        }
    }
}

pub fn pick_owner<'a>(owners: &'a [Owner], preferred: Option<&str>) -> Option<&'a Owner> {
    preferred
        .and_then(|email| {
            owners
                .iter()
                .find(|o| o.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email.trim())))
        })
        .or_else(|| owners.first())
}

pub struct Dashboard<A: ?Sized> {
    api: Arc<A>,
    session: Session,
    options: DashboardOptions,
    store: ContactStore,
    sync: LocationSync,
    meetings: BTreeMap<String, MeetingLog>,
}

impl<A: ContactsApi + ?Sized> Dashboard<A> {
    pub fn new(api: Arc<A>, session: Session, options: DashboardOptions) -> Self {
        let mut store = ContactStore::new();
        store.set_scope(Scope::from(&session));
        Self {
            api,
            session,
            options,
            store,
            sync: LocationSync::new(),
            meetings: BTreeMap::new(),
        }
    }

    pub fn api(&self) -> Arc<A> {
        Arc::clone(&self.api)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &ContactStore {
        &self.store
    }

    pub fn sync_phase(&self) -> SyncPhase {
        self.sync.phase()
    }

    /// Signs in as someone else or switches brand. Cached contacts and
    /// meeting logs of the previous scope are dropped.
    pub fn switch_session(&mut self, session: Session) -> bool {
        let changed = self.store.set_scope(Scope::from(&session));
        if changed {
            self.meetings.clear();
        }
        self.session = session;
        changed
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            contacts: self.store.visible().to_vec(),
            page: self.store.page(),
            has_next: self.store.has_next(),
            has_prev: self.store.has_prev(),
            zips: self.store.known_zips().to_vec(),
            filter: self.store.filter().clone(),
            loading: self.store.is_loading(),
            loaded_once: self.store.loaded_once(),
            total: self.store.total(),
        }
    }

    pub fn current_location(&self) -> DashboardLocation {
        DashboardLocation::new(self.store.filter(), self.store.page())
    }

    /// The location to write back after a state change, if it moved.
    pub fn location(&mut self) -> Option<String> {
        let current = self.current_location();
        self.sync.observe(&current)
    }

    /// Restores filter and page from `raw`, loads the contact set and shows
    /// the requested page. The synchronizer is ready afterwards even when a
    /// fetch failed.
    pub async fn hydrate(&mut self, raw: &str) -> Result<DashboardLocation, ApiError> {
        self.store.abandon_full_load();
        self.sync.restart();
        let Some(initial) = self.sync.begin_hydration(raw) else {
            return Ok(self.current_location());
        };
        self.store.set_filter(initial.filter());

        if let Err(e) = self.load_full_set().await {
            warn!("Could not load the full contact set: {e}");
        }
        let result = self.load_page(initial.page).await;

        let settled = self.current_location();
        self.sync.finish_hydration(&settled);
        result.map(|_| settled)
    }

    /// Every async operation holds `&mut self` until it finishes, so a
    /// hydration or full load still marked as running on entry was dropped
    /// mid-fetch. The operation at hand takes over from it, and the contact
    /// set is loaded again when the dropped run never got it.
    async fn recover_interrupted(&mut self) {
        let dropped_load = self.store.abandon_full_load();
        let dropped_hydration = self.sync.take_over();
        if (dropped_load || dropped_hydration) && self.store.full_set().is_none() {
            if let Err(e) = self.load_full_set().await {
                warn!("Could not load the full contact set: {e}");
            }
        }
    }

    /// Reloads the full contact set of the current scope.
    pub async fn refresh_full_set(&mut self) -> Result<Applied, ApiError> {
        self.store.abandon_full_load();
        self.sync.take_over();
        self.load_full_set().await
    }

    async fn load_full_set(&mut self) -> Result<Applied, ApiError> {
        let Some(ticket) = self.store.begin_full_load() else {
            return Ok(Applied::Stale);
        };
        let result = self
            .api
            .fetch_all_contacts(&self.session.email, self.options.full_set_cap)
            .await;
        if let Ok(set) = &result {
            info!("Loaded {} contacts for {}", set.contacts.len(), self.session.email);
        }
        self.store.finish_full_load(&ticket, result)
    }

    /// Full reload followed by the current page.
    pub async fn refresh(&mut self) -> Result<Applied, ApiError> {
        self.refresh_full_set().await?;
        self.go_to_page(self.store.page()).await
    }

    /// Moves to `page`; the returned job is `None` when the page was derived
    /// from the cached set.
    pub fn begin_page(&mut self, page: u32) -> Result<Option<PageJob<A>>, ApiError> {
        self.store.abandon_full_load();
        self.sync.take_over();
        self.plan(page)
    }

    fn plan(&mut self, page: u32) -> Result<Option<PageJob<A>>, ApiError> {
        match self.store.plan_page(page)? {
            PagePlan::Local => Ok(None),
            PagePlan::Remote(request) => Ok(Some(PageJob {
                api: self.api(),
                request,
            })),
        }
    }

    pub fn finish_page(&mut self, outcome: PageOutcome) -> Result<Applied, ApiError> {
        self.store.finish_page(&outcome.ticket, outcome.result)
    }

    pub async fn go_to_page(&mut self, page: u32) -> Result<Applied, ApiError> {
        self.recover_interrupted().await;
        self.load_page(page).await
    }

    async fn load_page(&mut self, page: u32) -> Result<Applied, ApiError> {
        match self.plan(page)? {
            None => Ok(Applied::Current),
            Some(job) => {
                let outcome = job.run().await;
                self.finish_page(outcome)
            }
        }
    }

    pub async fn next_page(&mut self) -> Result<Applied, ApiError> {
        if !self.store.has_next() {
            return Ok(Applied::Stale);
        }
        self.go_to_page(self.store.page() + 1).await
    }

    pub async fn prev_page(&mut self) -> Result<Applied, ApiError> {
        if !self.store.has_prev() {
            return Ok(Applied::Stale);
        }
        self.go_to_page(self.store.page() - 1).await
    }

    async fn refetch_if(&mut self, changed: bool) -> Result<Applied, ApiError> {
        if changed {
            self.go_to_page(1).await
        } else {
            Ok(Applied::Stale)
        }
    }

    pub async fn set_status(&mut self, status: StatusFilter) -> Result<Applied, ApiError> {
        let changed = self.store.set_status(status);
        self.refetch_if(changed).await
    }

    pub async fn set_query(&mut self, query: &str) -> Result<Applied, ApiError> {
        let changed = self.store.set_query(query);
        self.refetch_if(changed).await
    }

    pub async fn set_zip(&mut self, zip: Option<&str>) -> Result<Applied, ApiError> {
        let changed = self.store.set_zip(zip);
        self.refetch_if(changed).await
    }

    pub async fn clear_filters(&mut self) -> Result<Applied, ApiError> {
        let changed = self.store.clear_filters();
        self.refetch_if(changed).await
    }

    pub async fn create_contact(
        &mut self,
        form: CreateContactForm,
    ) -> Result<CreatedContact, MutationFailure> {
        let fail = |e: ApiError| MutationFailure::from_api(&e, CREATE_FALLBACK);
        let mut props = form.into_properties().map_err(fail)?;

        let owners = self.api.owners().await.map_err(fail)?;
        let owner = pick_owner(&owners, self.options.preferred_owner_email.as_deref())
            .ok_or_else(|| MutationFailure::new(NO_OWNERS))?;
        debug!("Assigning new contact to owner {}", owner.id);

        props.insert("ba_email".into(), self.session.email.clone());
        props.insert("hs_lead_status".into(), NEW_CONTACT_HS_STATUS.into());
        props.insert("l2_lead_status".into(), LeadStatus::PendingVisit.as_str().into());
        props.insert("hubspot_owner_id".into(), owner.id.clone());

        let contact = self.api.create_contact(&props).await.map_err(fail)?;
        info!("Created contact {}", contact.id);
        self.store.insert_created(contact.clone());
        Ok(CreatedContact {
            contact_id: contact.id.clone(),
            contact,
        })
    }

    async fn cached_or_fetched(&self, id: &str) -> Result<Contact, ApiError> {
        match self.store.contact(id) {
            Some(contact) => Ok(contact.clone()),
            None => self.api.get_contact(id).await,
        }
    }

    fn ensure_owned(&self, contact: &Contact) -> Result<(), MutationFailure> {
        let owned = contact
            .owner_email()
            .is_some_and(|e| e.trim().eq_ignore_ascii_case(&self.session.email));
        if owned {
            Ok(())
        } else {
            warn!("Refusing to update contact {} owned by {:?}", contact.id, contact.owner_email());
            Err(MutationFailure::new(NOT_YOUR_CONTACT))
        }
    }

    /// Validates the edit, checks ownership and applies it optimistically.
    pub async fn begin_update(
        &mut self,
        id: &str,
        form: EditContactForm,
    ) -> Result<PendingUpdate, MutationFailure> {
        let fail = |e: ApiError| MutationFailure::from_api(&e, UPDATE_FALLBACK);
        let patch = form.into_properties().map_err(fail)?;
        let contact = self.cached_or_fetched(id).await.map_err(fail)?;
        self.ensure_owned(&contact)?;
        Ok(self.patch_optimistically(id, patch, UPDATE_FALLBACK))
    }

    pub fn begin_status_update(&mut self, id: &str, status: LeadStatus) -> PendingUpdate {
        let mut patch = PropertyPatch::new();
        patch.insert("l2_lead_status".into(), status.as_str().into());
        self.patch_optimistically(id, patch, STATUS_FALLBACK)
    }

    fn patch_optimistically(
        &mut self,
        id: &str,
        patch: PropertyPatch,
        fallback: &'static str,
    ) -> PendingUpdate {
        let previous = self.store.apply_patch(id, &patch);
        PendingUpdate {
            contact_id: id.to_string(),
            patch,
            previous,
            fallback,
        }
    }

    /// Reconciles with the vendor's record, or rolls the patch back.
    pub fn finish_update(
        &mut self,
        pending: PendingUpdate,
        result: Result<Contact, ApiError>,
    ) -> Result<Contact, MutationFailure> {
        match result {
            Ok(contact) => {
                self.store.reconcile(contact.clone());
                Ok(contact)
            }
            Err(e) => {
                warn!("Update of contact {} failed: {e}", pending.contact_id);
                if let Some(previous) = pending.previous {
                    self.store.reconcile(previous);
                }
                Err(MutationFailure::from_api(&e, pending.fallback))
            }
        }
    }

    pub async fn update_contact(
        &mut self,
        id: &str,
        form: EditContactForm,
    ) -> Result<Contact, MutationFailure> {
        let pending = self.begin_update(id, form).await?;
        let result = self.api.update_contact(id, &pending.patch).await;
        self.finish_update(pending, result)
    }

    /// Settles a status change. An unconfirmed save keeps the optimistic
    /// patch rather than rolling back a change HubSpot already has.
    pub fn finish_status_update(
        &mut self,
        pending: PendingUpdate,
        result: Result<SavedStatus, ApiError>,
    ) -> Result<Contact, MutationFailure> {
        match result {
            Ok(SavedStatus::Refetched(contact)) => self.finish_update(pending, Ok(contact)),
            Ok(SavedStatus::Unconfirmed(patched)) => Ok(self
                .store
                .contact(&pending.contact_id)
                .cloned()
                .unwrap_or(patched)),
            Err(e) => self.finish_update(pending, Err(e)),
        }
    }

    /// Optimistic status change, then a re-fetch of the contact.
    pub async fn update_lead_status(
        &mut self,
        id: &str,
        status: LeadStatus,
    ) -> Result<Contact, MutationFailure> {
        let pending = self.begin_status_update(id, status);
        let result = save_lead_status(self.api.as_ref(), id, status).await;
        self.finish_status_update(pending, result)
    }

    /// Fetches a contact for the detail view and refreshes cached copies.
    pub async fn contact_detail(&mut self, id: &str) -> Result<Contact, ApiError> {
        let contact = self.api.get_contact(id).await?;
        self.store.reconcile(contact.clone());
        Ok(contact)
    }

    /// Lead status values offered by the portal, falling back to the
    /// built-in ones when the property has no options.
    pub async fn lead_status_options(&self) -> Result<Vec<String>, ApiError> {
        let definitions = self.api.contact_properties().await?;
        let options: Vec<String> = definitions
            .into_iter()
            .find(|d| d.name == "l2_lead_status")
            .map(|d| d.options.into_iter().map(|o| o.value).collect())
            .unwrap_or_default();
        if options.is_empty() {
            Ok(LeadStatus::ALL.iter().map(|s| s.as_str().to_string()).collect())
        } else {
            Ok(options)
        }
    }

    pub async fn total_estimate(&self) -> Result<Option<u64>, ApiError> {
        self.api.total_contacts_estimate().await
    }

    pub fn meeting_log(&self, contact_id: &str) -> Option<&MeetingLog> {
        self.meetings.get(contact_id)
    }

    fn log_mut(&mut self, contact_id: &str) -> &mut MeetingLog {
        self.meetings
            .entry(contact_id.to_string())
            .or_insert_with(|| MeetingLog::new(contact_id))
    }

    pub async fn load_meetings(&mut self, contact_id: &str) -> Result<&MeetingLog, ApiError> {
        let meetings = self.api.meetings_for_contact(contact_id).await?;
        let log = self.log_mut(contact_id);
        log.replace_all(meetings);
        Ok(&*log)
    }

    pub async fn log_meeting(
        &mut self,
        contact_id: &str,
        form: MeetingForm,
    ) -> Result<Meeting, MutationFailure> {
        let input = form
            .into_input()
            .map_err(|e| MutationFailure::from_api(&e, MEETING_FALLBACK))?;
        let temp_id = self.log_mut(contact_id).add_optimistic(&input);
        match self.api.create_meeting(contact_id, &input).await {
            Ok(meeting) => {
                self.log_mut(contact_id).confirm(&temp_id, meeting.clone());
                Ok(meeting)
            }
            Err(e) => {
                self.log_mut(contact_id).discard(&temp_id);
                Err(MutationFailure::from_api(&e, MEETING_FALLBACK))
            }
        }
    }

    fn ensure_saved(meeting_id: &str) -> Result<(), MutationFailure> {
        if MeetingLog::is_pending(meeting_id) {
            Err(MutationFailure::new("Meeting is still being saved."))
        } else {
            Ok(())
        }
    }

    pub async fn edit_meeting(
        &mut self,
        contact_id: &str,
        meeting_id: &str,
        form: MeetingForm,
    ) -> Result<Meeting, MutationFailure> {
        Self::ensure_saved(meeting_id)?;
        let input: MeetingInput = form
            .into_input()
            .map_err(|e| MutationFailure::from_api(&e, MEETING_FALLBACK))?;
        let previous = self.log_mut(contact_id).patch(meeting_id, &input);
        match self.api.update_meeting(contact_id, meeting_id, &input).await {
            Ok(meeting) => {
                self.log_mut(contact_id).restore(meeting.clone());
                Ok(meeting)
            }
            Err(e) => {
                if let Some(previous) = previous {
                    self.log_mut(contact_id).restore(previous);
                }
                Err(MutationFailure::from_api(&e, MEETING_FALLBACK))
            }
        }
    }

    pub async fn delete_meeting(
        &mut self,
        contact_id: &str,
        meeting_id: &str,
    ) -> Result<(), MutationFailure> {
        Self::ensure_saved(meeting_id)?;
        self.api
            .delete_meeting(meeting_id)
            .await
            .map_err(|e| MutationFailure::from_api(&e, "Failed to delete meeting"))?;
        self.log_mut(contact_id).remove(meeting_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(id: &str, email: &str) -> Owner {
        Owner {
            id: id.into(),
            email: Some(email.into()),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn preferred_owner_wins_over_first() {
        let owners = vec![owner("1", "first@example.com"), owner("2", "Pref@Example.com")];
        assert_eq!(pick_owner(&owners, Some("pref@example.com")).unwrap().id, "2");
        assert_eq!(pick_owner(&owners, Some("gone@example.com")).unwrap().id, "1");
        assert_eq!(pick_owner(&owners, None).unwrap().id, "1");
        assert!(pick_owner(&[], None).is_none());
    }

    #[test]
    fn empty_view_only_after_load() {
        let view = DashboardView {
            contacts: Vec::new(),
            page: 1,
            has_next: false,
            has_prev: false,
            zips: Vec::new(),
            filter: ContactFilter::default(),
            loading: false,
            loaded_once: false,
            total: None,
        };
        assert!(!view.is_empty());
        assert!(DashboardView { loaded_once: true, ..view }.is_empty());
    }
}
