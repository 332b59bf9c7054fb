pub mod contact_view;
pub mod dialogs;
pub mod login;
pub mod main_window;
pub mod sidebar;

use std::future::Future;
use std::sync::Arc;

use adw::prelude::*;
use ba_dashboard::error::MutationFailure;
use ba_dashboard::utils::spawn_async;
use ba_dashboard::{Dashboard, HubSpotClient};
use tokio::task::AbortHandle;

pub type SharedDashboard = Arc<tokio::sync::Mutex<Dashboard<HubSpotClient>>>;

/// Runs `fut` on the shared runtime and hands its output to `done` on the
/// GTK main loop. An aborted task never reaches `done`.
pub fn run_async_to_main<T, Fut, F>(fut: Fut, done: F) -> AbortHandle
where
    T: Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    F: FnOnce(T) + 'static,
{
    let handle = spawn_async(fut);
    let abort = handle.abort_handle();
    glib::spawn_future_local(async move {
        match handle.await {
            Ok(value) => done(value),
            Err(e) if e.is_cancelled() => log::debug!("Background task cancelled"),
            Err(e) => log::error!("Background task failed: {e}"),
        }
    });
    abort
}

/// What every dashboard view needs to reach the controller and report back.
#[derive(Clone)]
pub struct UiContext {
    pub dash: SharedDashboard,
    pub window: adw::ApplicationWindow,
    pub overlay: adw::ToastOverlay,
}

impl UiContext {
    pub fn toast(&self, message: &str) {
        self.overlay.add_toast(adw::Toast::new(message));
    }

    pub fn report(&self, failure: &MutationFailure) {
        if failure.field_errors.is_empty() {
            self.toast(&failure.message);
            return;
        }
        let fields: Vec<String> = failure
            .field_errors
            .iter()
            .map(|(field, msg)| format!("{field}: {msg}"))
            .collect();
        self.toast(&format!("{} ({})", failure.message, fields.join(", ")));
    }
}

pub fn padded_box(orientation: gtk4::Orientation, spacing: i32, margin: i32) -> gtk4::Box {
    let root = gtk4::Box::new(orientation, spacing);
    root.set_margin_top(margin);
    root.set_margin_bottom(margin);
    root.set_margin_start(margin);
    root.set_margin_end(margin);
    root
}

pub fn clear_list(list: &gtk4::ListBox) {
    while let Some(child) = list.first_child() {
        list.remove(&child);
    }
}

pub fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
