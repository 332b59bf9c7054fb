//! Two-way binding between the dashboard state and its location string
//! (`/dashboard?page=2&status=dropped+off&query=acme&zip=90013`).

use log::{debug, info, warn};
use url::{Url, form_urlencoded};

use crate::filter::{ContactFilter, StatusFilter};
use crate::store::MAX_PAGE;

const ORIGIN: &str = "ba-dashboard://app/";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardLocation {
    pub page: u32,
    pub status: StatusFilter,
    pub query: String,
    pub zip: Option<String>,
}

impl Default for DashboardLocation {
    fn default() -> Self {
        Self {
            page: 1,
            status: StatusFilter::All,
            query: String::new(),
            zip: None,
        }
    }
}

impl DashboardLocation {
    pub fn new(filter: &ContactFilter, page: u32) -> Self {
        Self {
            page: page.max(1),
            status: filter.status.clone(),
            query: filter.query.trim().to_string(),
            zip: filter.zip.clone(),
        }
    }

    /// Accepts `/dashboard?...` and the zip-scoped `/dashboard/zipcodes/{zip}?...`.
    /// Anything unparsable falls back to the defaults.
    pub fn parse(raw: &str) -> Self {
        let url = match Url::parse(ORIGIN).and_then(|origin| origin.join(raw.trim())) {
            Ok(url) => url,
            Err(e) => {
                warn!("Ignoring unparsable location {raw:?}: {e}");
                return Self::default();
            }
        };

        let mut location = Self::default();
        let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
        if let Some(pos) = segments.iter().position(|s| *s == "zipcodes") {
            location.zip = segments
                .get(pos + 1)
                .map(|z| decode_segment(z))
                .filter(|z| !z.trim().is_empty());
        }

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "page" => {
                    location.page = value
                        .trim()
                        .parse()
                        .ok()
                        .filter(|p| *p >= 1)
                        .map_or(1, |p: u32| p.min(MAX_PAGE));
                }
                "status" => location.status = StatusFilter::parse(&value),
                "query" => location.query = value.trim().to_string(),
                "zip" => {
                    location.zip = Some(value.trim().to_string()).filter(|z| !z.is_empty());
                }
                _ => {}
            }
        }
        location
    }

    pub fn filter(&self) -> ContactFilter {
        ContactFilter {
            status: self.status.clone(),
            query: self.query.clone(),
            zip: self.zip.clone(),
        }
    }

    /// Query string without parameters at their default value.
    pub fn query_string(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        if self.page > 1 {
            out.append_pair("page", &self.page.to_string());
        }
        if self.status != StatusFilter::All {
            out.append_pair("status", self.status.as_param());
        }
        if !self.query.is_empty() {
            out.append_pair("query", &self.query);
        }
        if let Some(zip) = &self.zip {
            out.append_pair("zip", zip);
        }
        out.finish()
    }

    pub fn render(&self) -> String {
        let query = self.query_string();
        if query.is_empty() {
            DASHBOARD_PATH.to_string()
        } else {
            format!("{DASHBOARD_PATH}?{query}")
        }
    }
}

fn decode_segment(segment: &str) -> String {
    form_urlencoded::parse(format!("v={}", segment.replace('+', "%2B")).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| segment.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Uninitialized,
    Hydrating,
    Ready,
}

/// Orders the two directions of the binding: the location is read once,
/// and state is only written back after the first fetch has completed.
#[derive(Debug, Default)]
pub struct LocationSync {
    phase: SyncPhase,
    last_written: Option<String>,
    hydrating_from: Option<String>,
}

impl LocationSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Parses the initial location. Returns `None` once hydration has
    /// already started.
    pub fn begin_hydration(&mut self, raw: &str) -> Option<DashboardLocation> {
        if self.phase != SyncPhase::Uninitialized {
            debug!("Ignoring location {raw:?}, already hydrated");
            return None;
        }
        self.phase = SyncPhase::Hydrating;
        let location = DashboardLocation::parse(raw);
        self.hydrating_from = Some(location.render());
        Some(location)
    }

    /// Forgets a hydration that never finished so the location can be read
    /// again.
    pub fn restart(&mut self) -> bool {
        if self.phase != SyncPhase::Hydrating {
            return false;
        }
        warn!("Restarting an unfinished hydration");
        self.phase = SyncPhase::Uninitialized;
        self.hydrating_from = None;
        true
    }

    /// Ends an unfinished hydration because the user moved on. The location
    /// being hydrated counts as written, so whatever state follows is echoed.
    pub fn take_over(&mut self) -> bool {
        if self.phase != SyncPhase::Hydrating {
            return false;
        }
        warn!("Hydration was interrupted, following the current state instead");
        self.phase = SyncPhase::Ready;
        self.last_written = self.hydrating_from.take();
        true
    }

    /// Called after the first fetch; `current` is what the state settled on,
    /// remembered so it is not echoed back.
    pub fn finish_hydration(&mut self, current: &DashboardLocation) {
        if self.phase == SyncPhase::Hydrating {
            info!("Dashboard hydrated at {}", current.render());
            self.phase = SyncPhase::Ready;
            self.last_written = Some(current.render());
            self.hydrating_from = None;
        }
    }

    /// The location to write (replacing, not pushing) for `current`, if any.
    pub fn observe(&mut self, current: &DashboardLocation) -> Option<String> {
        if self.phase != SyncPhase::Ready {
            return None;
        }
        let rendered = current.render();
        if self.last_written.as_deref() == Some(rendered.as_str()) {
            return None;
        }
        self.last_written = Some(rendered.clone());
        Some(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_omitted() {
        assert_eq!(DashboardLocation::default().render(), "/dashboard");
        let loc = DashboardLocation {
            page: 2,
            status: StatusFilter::parse("dropped off"),
            query: "acme & co".into(),
            zip: Some("90013".into()),
        };
        assert_eq!(
            loc.render(),
            "/dashboard?page=2&status=dropped+off&query=acme+%26+co&zip=90013"
        );
    }

    #[test]
    fn parse_reads_all_parameters() {
        let loc = DashboardLocation::parse("/dashboard?page=3&status=Dropped%20Off&query=acme&zip=90013");
        assert_eq!(loc.page, 3);
        assert_eq!(loc.status, StatusFilter::Only("dropped off".into()));
        assert_eq!(loc.query, "acme");
        assert_eq!(loc.zip.as_deref(), Some("90013"));
        assert_eq!(DashboardLocation::parse(&loc.render()), loc);
    }

    #[test]
    fn invalid_page_falls_back_to_first() {
        assert_eq!(DashboardLocation::parse("/dashboard?page=0").page, 1);
        assert_eq!(DashboardLocation::parse("/dashboard?page=abc").page, 1);
        assert_eq!(DashboardLocation::parse("?page=-4").page, 1);
        assert_eq!(DashboardLocation::parse("?page=4000000000").page, MAX_PAGE);
    }

    #[test]
    fn zip_route_scopes_location() {
        let loc = DashboardLocation::parse("/dashboard/zipcodes/90013?status=all&page=2");
        assert_eq!(loc.zip.as_deref(), Some("90013"));
        assert_eq!(loc.status, StatusFilter::All);
        assert_eq!(loc.page, 2);
    }

    #[test]
    fn sync_stays_silent_until_ready() {
        let mut sync = LocationSync::new();
        let changed = DashboardLocation {
            page: 2,
            ..Default::default()
        };
        assert_eq!(sync.observe(&changed), None);

        let hydrated = sync.begin_hydration("/dashboard?query=acme").unwrap();
        assert_eq!(sync.phase(), SyncPhase::Hydrating);
        assert_eq!(sync.observe(&hydrated), None);
        assert!(sync.begin_hydration("/dashboard").is_none());

        sync.finish_hydration(&hydrated);
        assert_eq!(sync.phase(), SyncPhase::Ready);
        assert_eq!(sync.observe(&hydrated), None, "hydrated state is not echoed");

        let next = DashboardLocation {
            page: 2,
            ..hydrated
        };
        assert_eq!(sync.observe(&next).as_deref(), Some("/dashboard?page=2&query=acme"));
        assert_eq!(sync.observe(&next), None);
    }

    #[test]
    fn interrupted_hydration_can_restart_or_be_taken_over() {
        let mut sync = LocationSync::new();
        assert!(!sync.take_over());
        sync.begin_hydration("/dashboard?status=dropped+off").unwrap();
        assert!(sync.restart());
        assert_eq!(sync.phase(), SyncPhase::Uninitialized);

        sync.begin_hydration("/dashboard?status=dropped+off").unwrap();
        assert!(sync.take_over());
        assert_eq!(sync.phase(), SyncPhase::Ready);
        let same = DashboardLocation::parse("/dashboard?status=dropped+off");
        assert_eq!(sync.observe(&same), None);
        assert_eq!(
            sync.observe(&DashboardLocation::default()).as_deref(),
            Some("/dashboard")
        );
        assert!(!sync.restart());
    }
}
