//! Contact list state holder.
//!
//! The store owns the full contact set of one scope (brand + ambassador),
//! the current filter and page, the cursor chain for server-side paging and
//! the page currently shown. Pages are derived in memory while the full set
//! is complete and planned as vendor searches otherwise. Every fetch carries
//! a ticket so that a response for a superseded filter or page is dropped.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::api::ContactsApi;
use crate::api::models::{Contact, FullSet, PropertyPatch, SearchRequest};
use crate::config::{Brand, Session};
use crate::error::ApiError;
use crate::filter::{ContactFilter, StatusFilter, paginate};

pub const PAGE_SIZE: usize = 12;

/// HubSpot search stops returning results after this many records.
pub const SEARCH_RESULT_CEILING: usize = 10_000;

/// Highest page the vendor search can serve.
pub const MAX_PAGE: u32 = SEARCH_RESULT_CEILING.div_ceil(PAGE_SIZE) as u32;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub brand: Brand,
    pub email: String,
}

impl From<&Session> for Scope {
    fn from(session: &Session) -> Self {
        Self {
            brand: session.brand,
            email: session.email.trim().to_lowercase(),
        }
    }
}

/// Identifies one page fetch. Only the most recently issued ticket is
/// accepted back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    seq: u64,
    scope: Scope,
    filter: ContactFilter,
    page: u32,
}

impl FetchTicket {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn filter(&self) -> &ContactFilter {
        &self.filter
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullLoadTicket {
    seq: u64,
    scope: Scope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Current,
    Stale,
}

/// Continuation tokens by page number. Page 1 never needs one; the token for
/// page N+1 is only known once page N has been seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorChain {
    cursors: BTreeMap<u32, String>,
}

impl CursorChain {
    /// `Some(None)` for page 1, `Some(Some(token))` for a known page, `None`
    /// when the page has not been reached yet.
    pub fn cursor_for(&self, page: u32) -> Option<Option<&str>> {
        if page <= 1 {
            Some(None)
        } else {
            self.cursors.get(&page).map(|c| Some(c.as_str()))
        }
    }

    pub fn is_known(&self, page: u32) -> bool {
        self.cursor_for(page).is_some()
    }

    /// A missing cursor means the vendor has nothing at `page` or beyond.
    pub fn record(&mut self, page: u32, cursor: Option<String>) {
        if page <= 1 {
            return;
        }
        match cursor.filter(|c| !c.is_empty()) {
            Some(cursor) => {
                self.cursors.insert(page, cursor);
            }
            None => {
                self.cursors.retain(|&p, _| p < page);
            }
        }
    }

    /// Highest page at or below `target` that can be fetched directly.
    pub fn nearest_known(&self, target: u32) -> (u32, Option<String>) {
        self.cursors
            .range(..=target)
            .next_back()
            .map(|(page, cursor)| (*page, Some(cursor.clone())))
            .unwrap_or((1, None))
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

/// A vendor search to run for a page, possibly walking forward from the
/// nearest page whose cursor is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub ticket: FetchTicket,
    pub owner_email: String,
    pub filter: ContactFilter,
    pub start_page: u32,
    pub start_cursor: Option<String>,
    pub target_page: u32,
}

impl PageRequest {
    pub fn search(&self, cursor: Option<String>) -> SearchRequest {
        SearchRequest::new(
            self.filter.search_filters(&self.owner_email),
            PAGE_SIZE as u32,
            cursor,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePage {
    pub page: u32,
    pub contacts: Vec<Contact>,
    /// Cursor observed for each following page, in walk order.
    pub discovered: Vec<(u32, Option<String>)>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagePlan {
    /// The page was derived from the cached full set; nothing to fetch.
    Local,
    Remote(PageRequest),
}

/// Runs the searches a [`PageRequest`] needs. Stops early on the last page
/// the vendor has.
pub async fn resolve_page<A>(api: &A, request: &PageRequest) -> Result<RemotePage, ApiError>
where
    A: ContactsApi + ?Sized,
{
    let mut page = request.start_page;
    let mut cursor = request.start_cursor.clone();
    let mut discovered = Vec::new();
    loop {
        let resp = api.search_contacts(&request.search(cursor.take())).await?;
        discovered.push((page + 1, resp.next.clone()));
        match resp.next {
            Some(next) if page < request.target_page => {
                debug!("Walking past page {page} toward page {}", request.target_page);
                page += 1;
                cursor = Some(next);
            }
            _ => {
                return Ok(RemotePage {
                    page,
                    contacts: resp.results,
                    discovered,
                    total: resp.total,
                });
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ContactStore {
    scope: Option<Scope>,
    full: Option<FullSet>,
    zips: Vec<String>,
    filter: ContactFilter,
    page: u32,
    cursors: CursorChain,
    visible: Vec<Contact>,
    has_next: bool,
    total: Option<u64>,
    seq: u64,
    pending: Option<FetchTicket>,
    full_pending: Option<u64>,
    loaded_once: bool,
}

impl ContactStore {
    pub fn new() -> Self {
        Self {
            page: 1,
            ..Default::default()
        }
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    pub fn filter(&self) -> &ContactFilter {
        &self.filter
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn visible(&self) -> &[Contact] {
        &self.visible
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some() || self.full_pending.is_some()
    }

    pub fn loaded_once(&self) -> bool {
        self.loaded_once
    }

    pub fn known_zips(&self) -> &[String] {
        &self.zips
    }

    pub fn full_set(&self) -> Option<&FullSet> {
        self.full.as_ref()
    }

    pub fn cursors(&self) -> &CursorChain {
        &self.cursors
    }

    /// Matching contacts across the whole filter; best effort for remote pages.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn contact(&self, id: &str) -> Option<&Contact> {
        self.full
            .iter()
            .flat_map(|s| s.contacts.iter())
            .chain(self.visible.iter())
            .find(|c| c.id == id)
    }

    /// Switching brand or ambassador drops everything cached for the old scope.
    pub fn set_scope(&mut self, scope: Scope) -> bool {
        if self.scope.as_ref() == Some(&scope) {
            return false;
        }
        info!("Contact scope is now {} / {}", scope.brand, scope.email);
        self.scope = Some(scope);
        self.full = None;
        self.full_pending = None;
        self.zips.clear();
        self.visible.clear();
        self.has_next = false;
        self.total = None;
        self.loaded_once = false;
        self.reset_paging();
        true
    }

    fn reset_paging(&mut self) {
        self.page = 1;
        self.cursors.clear();
        self.pending = None;
    }

    pub fn set_filter(&mut self, filter: ContactFilter) -> bool {
        if self.filter == filter {
            return false;
        }
        debug!("Filter changed to {filter:?}");
        self.filter = filter;
        self.reset_paging();
        true
    }

    pub fn set_status(&mut self, status: StatusFilter) -> bool {
        let filter = ContactFilter {
            status,
            ..self.filter.clone()
        };
        self.set_filter(filter)
    }

    pub fn set_query(&mut self, query: &str) -> bool {
        let filter = ContactFilter {
            query: query.trim().to_string(),
            ..self.filter.clone()
        };
        self.set_filter(filter)
    }

    pub fn set_zip(&mut self, zip: Option<&str>) -> bool {
        let zip = zip.map(str::trim).filter(|z| !z.is_empty()).map(str::to_string);
        let filter = ContactFilter {
            zip,
            ..self.filter.clone()
        };
        self.set_filter(filter)
    }

    pub fn clear_filters(&mut self) -> bool {
        self.set_filter(ContactFilter::default())
    }

    pub fn begin_full_load(&mut self) -> Option<FullLoadTicket> {
        let scope = self.scope.clone()?;
        self.seq += 1;
        self.full_pending = Some(self.seq);
        Some(FullLoadTicket {
            seq: self.seq,
            scope,
        })
    }

    pub fn finish_full_load(
        &mut self,
        ticket: &FullLoadTicket,
        result: Result<FullSet, ApiError>,
    ) -> Result<Applied, ApiError> {
        if self.full_pending != Some(ticket.seq) || self.scope.as_ref() != Some(&ticket.scope) {
            warn!("Discarding contact set fetched for a previous scope");
            return Ok(Applied::Stale);
        }
        self.full_pending = None;
        let set = result?;
        if !set.complete {
            warn!(
                "Contact set stopped at {} records, paging through HubSpot search instead",
                set.contacts.len()
            );
        }
        self.zips = collect_zips(&set.contacts);
        self.full = Some(set);
        Ok(Applied::Current)
    }

    /// Drops the marker of a full load whose future went away before
    /// finishing.
    pub fn abandon_full_load(&mut self) -> bool {
        if self.full_pending.take().is_some() {
            warn!("Abandoned an unfinished load of the contact set");
            true
        } else {
            false
        }
    }

    /// Moves to `page`. With a complete full set the page is derived right
    /// away; otherwise the returned request must be resolved and handed back
    /// to [`ContactStore::finish_page`].
    pub fn plan_page(&mut self, page: u32) -> Result<PagePlan, ApiError> {
        let page = page.max(1);
        let scope = self
            .scope
            .clone()
            .ok_or_else(|| ApiError::Unauthorized("You must be logged in.".into()))?;

        if let Some(set) = self.full.as_ref().filter(|s| s.complete) {
            let filtered = self.filter.apply(&set.contacts);
            let (visible, has_next) = paginate(&filtered, page, PAGE_SIZE);
            self.total = Some(filtered.len() as u64);
            self.visible = visible.into_iter().cloned().collect();
            self.has_next = has_next;
            self.page = page;
            self.pending = None;
            self.loaded_once = true;
            return Ok(PagePlan::Local);
        }

        let page = page.min(MAX_PAGE);
        self.seq += 1;
        let ticket = FetchTicket {
            seq: self.seq,
            scope: scope.clone(),
            filter: self.filter.clone(),
            page,
        };
        self.pending = Some(ticket.clone());
        let (start_page, start_cursor) = self.cursors.nearest_known(page);
        debug!("Planning remote page {page} from page {start_page}");
        Ok(PagePlan::Remote(PageRequest {
            ticket,
            owner_email: scope.email,
            filter: self.filter.clone(),
            start_page,
            start_cursor,
            target_page: page,
        }))
    }

    pub fn finish_page(
        &mut self,
        ticket: &FetchTicket,
        result: Result<RemotePage, ApiError>,
    ) -> Result<Applied, ApiError> {
        if self.pending.as_ref() != Some(ticket) {
            warn!("Discarding superseded response for page {}", ticket.page);
            return Ok(Applied::Stale);
        }
        self.pending = None;
        self.loaded_once = true;
        let remote = result?;
        for (page, cursor) in remote.discovered {
            self.cursors.record(page, cursor);
        }
        self.page = remote.page;
        self.visible = remote.contacts;
        self.has_next = self.cursors.is_known(remote.page + 1);
        self.total = remote.total;
        Ok(Applied::Current)
    }

    /// A freshly created contact goes on top of the page and the full set,
    /// and the filters reset so that it is visible. With a complete set the
    /// first unfiltered page is derived again.
    pub fn insert_created(&mut self, contact: Contact) {
        if let Some(zip) = contact.zip() {
            self.add_zip(zip);
        }
        if let Some(set) = self.full.as_mut() {
            set.contacts.insert(0, contact.clone());
        }
        self.filter = ContactFilter::default();
        self.reset_paging();
        self.loaded_once = true;

        if let Some(set) = self.full.as_ref().filter(|s| s.complete) {
            let (visible, has_next) = paginate(&set.contacts, 1, PAGE_SIZE);
            self.total = Some(set.contacts.len() as u64);
            self.visible = visible;
            self.has_next = has_next;
            return;
        }

        self.visible.insert(0, contact);
        let overflow = self.visible.len() > PAGE_SIZE;
        self.visible.truncate(PAGE_SIZE);
        // Clearing filters only widens the result, and page 2 can be walked
        // to from page 1 without a cursor.
        self.has_next = self.has_next || overflow || self.full.is_some();
        self.total = None;
    }

    /// Patches every cached copy and returns the contact as it was before.
    pub fn apply_patch(&mut self, id: &str, patch: &PropertyPatch) -> Option<Contact> {
        let mut previous = None;
        let copies = self
            .visible
            .iter_mut()
            .chain(self.full.iter_mut().flat_map(|s| s.contacts.iter_mut()))
            .filter(|c| c.id == id);
        for contact in copies {
            if previous.is_none() {
                previous = Some(contact.clone());
            }
            contact.apply_patch(patch);
        }
        if let Some(zip) = patch.get("zip") {
            self.add_zip(zip);
        }
        previous
    }

    /// Overwrites cached copies with the authoritative record.
    pub fn reconcile(&mut self, contact: Contact) -> bool {
        let mut found = false;
        let copies = self
            .visible
            .iter_mut()
            .chain(self.full.iter_mut().flat_map(|s| s.contacts.iter_mut()))
            .filter(|c| c.id == contact.id);
        for slot in copies {
            *slot = contact.clone();
            found = true;
        }
        if let Some(zip) = contact.zip() {
            self.add_zip(zip);
        }
        found
    }

    fn add_zip(&mut self, zip: &str) {
        let zip = zip.trim();
        if !zip.is_empty() && !self.zips.iter().any(|z| z.eq_ignore_ascii_case(zip)) {
            self.zips.push(zip.to_string());
        }
    }
}

fn collect_zips(contacts: &[Contact]) -> Vec<String> {
    let mut zips: Vec<String> = Vec::new();
    for zip in contacts.iter().filter_map(Contact::zip) {
        if !zips.iter().any(|z| z.eq_ignore_ascii_case(zip)) {
            zips.push(zip.to_string());
        }
    }
    zips
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope {
            brand: Brand::Litto,
            email: "ba@example.com".into(),
        }
    }

    fn contact(n: usize) -> Contact {
        Contact::new(n.to_string())
            .with_property("company", format!("Store {n}"))
            .with_property("l2_lead_status", "pending visit")
            .with_property("zip", format!("9000{}", n % 3))
    }

    fn loaded_store(n: usize) -> ContactStore {
        let mut store = ContactStore::new();
        store.set_scope(scope());
        let ticket = store.begin_full_load().unwrap();
        let set = FullSet {
            contacts: (1..=n).map(contact).collect(),
            complete: true,
        };
        assert_eq!(store.finish_full_load(&ticket, Ok(set)), Ok(Applied::Current));
        store
    }

    #[test]
    fn local_pages_are_fixed_size_slices() {
        let mut store = loaded_store(30);
        assert_eq!(store.plan_page(1), Ok(PagePlan::Local));
        assert_eq!(store.visible().len(), 12);
        assert!(store.has_next());
        assert!(!store.has_prev());

        assert_eq!(store.plan_page(3), Ok(PagePlan::Local));
        let ids: Vec<_> = store.visible().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["25", "26", "27", "28", "29", "30"]);
        assert!(!store.has_next());
        assert!(store.has_prev());
        assert_eq!(store.total(), Some(30));
    }

    #[test]
    fn status_scenario_single_dropped_off() {
        let mut store = ContactStore::new();
        store.set_scope(scope());
        let ticket = store.begin_full_load().unwrap();
        let contacts = (1..=15)
            .map(|n| {
                let status = if n == 7 { "dropped off" } else { "pending visit" };
                contact(n).with_property("l2_lead_status", status)
            })
            .collect();
        store
            .finish_full_load(&ticket, Ok(FullSet { contacts, complete: true }))
            .unwrap();

        store.set_status(StatusFilter::parse("dropped off"));
        store.plan_page(1).unwrap();
        assert_eq!(store.visible().len(), 1);
        assert_eq!(store.visible()[0].id, "7");
        assert_eq!(store.page(), 1);
        assert!(!store.has_next());
    }

    #[test]
    fn query_scenario_three_acme_stores() {
        let mut store = ContactStore::new();
        store.set_scope(scope());
        let ticket = store.begin_full_load().unwrap();
        let contacts = (1..=15)
            .map(|n| match n {
                2 => contact(n).with_property("company", "ACME Vapes"),
                9 => contact(n).with_property("company", "Little acme"),
                14 => contact(n).with_property("company", "Acme"),
                _ => contact(n),
            })
            .collect();
        store
            .finish_full_load(&ticket, Ok(FullSet { contacts, complete: true }))
            .unwrap();

        store.set_query("acme");
        store.plan_page(1).unwrap();
        let ids: Vec<_> = store.visible().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["2", "9", "14"]);
        assert!(!store.has_next());
    }

    #[test]
    fn filter_change_resets_page_and_cursors() {
        let mut store = ContactStore::new();
        store.set_scope(scope());
        let PagePlan::Remote(req) = store.plan_page(1).unwrap() else {
            panic!("expected remote plan");
        };
        let page = RemotePage {
            page: 1,
            contacts: (1..=12).map(contact).collect(),
            discovered: vec![(2, Some("12".into()))],
            total: None,
        };
        store.finish_page(&req.ticket, Ok(page)).unwrap();
        assert!(store.has_next());

        let PagePlan::Remote(req) = store.plan_page(2).unwrap() else {
            panic!("expected remote plan");
        };
        assert_eq!((req.start_page, req.start_cursor.as_deref()), (2, Some("12")));
        store
            .finish_page(
                &req.ticket,
                Ok(RemotePage {
                    page: 2,
                    contacts: (13..=24).map(contact).collect(),
                    discovered: vec![(3, Some("24".into()))],
                    total: None,
                }),
            )
            .unwrap();
        assert_eq!(store.page(), 2);

        for change in 0..3 {
            match change {
                0 => assert!(store.set_status(StatusFilter::parse("dropped off"))),
                1 => assert!(store.set_query("acme")),
                _ => assert!(store.set_zip(Some("90001"))),
            }
            assert_eq!(store.page(), 1);
            assert!(store.cursors().is_empty());
            assert!(!store.cursors().is_known(2));
        }

        assert!(!store.set_zip(Some(" 90001 ")), "same value is a no-op");
    }

    #[test]
    fn superseded_response_is_discarded() {
        let mut store = ContactStore::new();
        store.set_scope(scope());
        let PagePlan::Remote(old) = store.plan_page(1).unwrap() else {
            panic!("expected remote plan");
        };
        store.set_query("acme");
        let PagePlan::Remote(new) = store.plan_page(1).unwrap() else {
            panic!("expected remote plan");
        };

        let stale = RemotePage {
            page: 1,
            contacts: vec![contact(99)],
            discovered: vec![(2, None)],
            total: None,
        };
        assert_eq!(store.finish_page(&old.ticket, Ok(stale)), Ok(Applied::Stale));
        assert!(store.visible().is_empty());
        assert!(store.is_loading());

        let fresh = RemotePage {
            page: 1,
            contacts: vec![contact(1)],
            discovered: vec![(2, None)],
            total: Some(1),
        };
        assert_eq!(store.finish_page(&new.ticket, Ok(fresh)), Ok(Applied::Current));
        assert_eq!(store.visible()[0].id, "1");
        assert!(!store.has_next());
        assert!(!store.is_loading());
    }

    #[test]
    fn scope_change_invalidates_cache() {
        let mut store = loaded_store(5);
        let stale_ticket = store.begin_full_load().unwrap();
        assert!(store.set_scope(Scope {
            brand: Brand::Skwezed,
            email: "ba@example.com".into(),
        }));
        assert!(store.full_set().is_none());
        assert!(store.known_zips().is_empty());
        assert_eq!(
            store.finish_full_load(&stale_ticket, Ok(FullSet::default())),
            Ok(Applied::Stale)
        );
        assert!(!store.set_scope(Scope {
            brand: Brand::Skwezed,
            email: "ba@example.com".into(),
        }));
    }

    #[test]
    fn incomplete_set_pages_remotely() {
        let mut store = ContactStore::new();
        store.set_scope(scope());
        let ticket = store.begin_full_load().unwrap();
        store
            .finish_full_load(
                &ticket,
                Ok(FullSet {
                    contacts: (1..=20).map(contact).collect(),
                    complete: false,
                }),
            )
            .unwrap();
        assert_eq!(store.known_zips(), ["90001", "90002", "90000"]);
        assert!(matches!(store.plan_page(1), Ok(PagePlan::Remote(_))));
    }

    #[test]
    fn created_contact_goes_on_top() {
        let mut store = loaded_store(20);
        store.set_query("nomatch");
        store.plan_page(1).unwrap();
        assert!(store.visible().is_empty());

        let created = Contact::new("new")
            .with_property("company", "Fresh Leaf")
            .with_property("zip", "10001");
        store.insert_created(created);

        assert_eq!(store.visible().len(), PAGE_SIZE);
        assert_eq!(store.visible()[0].id, "new");
        assert_eq!(store.visible()[11].id, "11");
        assert_eq!(store.full_set().unwrap().contacts[0].id, "new");
        assert_eq!(store.full_set().unwrap().contacts.len(), 21);
        assert!(store.filter().is_default());
        assert_eq!(store.page(), 1);
        assert!(store.has_next());
        assert_eq!(store.total(), Some(21));
        assert_eq!(store.known_zips().last().map(String::as_str), Some("10001"));

        let zips_before = store.known_zips().len();
        store.insert_created(Contact::new("again").with_property("zip", "90001"));
        assert_eq!(store.known_zips().len(), zips_before);
    }

    #[test]
    fn patch_then_reconcile_touches_every_copy() {
        let mut store = loaded_store(3);
        store.plan_page(1).unwrap();

        let mut patch = PropertyPatch::new();
        patch.insert("company".into(), "Renamed".into());
        let previous = store.apply_patch("2", &patch).unwrap();
        assert_eq!(previous.company(), Some("Store 2"));
        assert_eq!(store.visible()[1].company(), Some("Renamed"));
        assert_eq!(store.full_set().unwrap().contacts[1].company(), Some("Renamed"));

        assert!(store.reconcile(previous));
        assert_eq!(store.contact("2").and_then(Contact::company), Some("Store 2"));
        assert!(!store.reconcile(Contact::new("missing")));
    }

    #[test]
    fn cursor_chain_forgets_pages_past_the_end() {
        let mut chain = CursorChain::default();
        chain.record(2, Some("12".into()));
        chain.record(3, Some("24".into()));
        chain.record(4, Some("36".into()));
        assert_eq!(chain.nearest_known(9), (4, Some("36".to_string())));

        chain.record(3, None);
        assert!(chain.is_known(2));
        assert!(!chain.is_known(3));
        assert!(!chain.is_known(4));
        assert_eq!(chain.cursor_for(1), Some(None));
        assert_eq!(chain.nearest_known(1), (1, None));
        assert_eq!(chain.nearest_known(u32::MAX), (2, Some("12".to_string())));
    }

    #[test]
    fn created_contact_on_remote_pages_keeps_next_open() {
        let mut store = ContactStore::new();
        store.set_scope(scope());
        store.set_query("nomatch");
        let PagePlan::Remote(req) = store.plan_page(1).unwrap() else {
            panic!("expected remote plan");
        };
        let empty = RemotePage {
            page: 1,
            contacts: Vec::new(),
            discovered: vec![(2, None)],
            total: Some(0),
        };
        store.finish_page(&req.ticket, Ok(empty)).unwrap();

        store.insert_created(Contact::new("new"));
        assert_eq!(store.visible().len(), 1);
        assert!(store.filter().is_default());
        assert_eq!(store.total(), None);
    }

    #[test]
    fn far_pages_are_capped_and_planned_from_the_last_cursor() {
        let mut store = ContactStore::new();
        store.set_scope(scope());
        let PagePlan::Remote(req) = store.plan_page(u32::MAX).unwrap() else {
            panic!("expected remote plan");
        };
        assert_eq!(req.target_page, MAX_PAGE);
        assert_eq!((req.start_page, req.start_cursor), (1, None));
    }

    #[test]
    fn abandoned_full_load_stops_loading() {
        let mut store = ContactStore::new();
        store.set_scope(scope());
        store.begin_full_load().unwrap();
        assert!(store.is_loading());
        assert!(store.abandon_full_load());
        assert!(!store.is_loading());
        assert!(!store.abandon_full_load());
    }
}
