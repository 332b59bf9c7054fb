use std::sync::Arc;

use adw::Application;
use ba_dashboard::dashboard::DashboardOptions;
use ba_dashboard::{Dashboard, HubSpotClient, Session, Settings};
use log::{info, warn};

use crate::ui::SharedDashboard;

/// Builds the controller for a saved session, if its brand is configured.
pub fn open_dashboard(settings: &Settings, session: &Session) -> Option<SharedDashboard> {
    let client = settings
        .credentials(session.brand)
        .and_then(|creds| HubSpotClient::new(&creds, settings.request_timeout()));
    match client {
        Ok(client) => {
            let options = DashboardOptions::from_settings(settings, session);
            let dashboard = Dashboard::new(Arc::new(client), session.clone(), options);
            Some(Arc::new(tokio::sync::Mutex::new(dashboard)))
        }
        Err(e) => {
            warn!("Cannot open the {} dashboard: {e}", session.brand);
            None
        }
    }
}

pub fn build_ui(app: &Application) {
    let settings = Settings::load();
    let opened = settings
        .session
        .as_ref()
        .and_then(|session| open_dashboard(&settings, session).map(|dash| (dash, session)));
    match opened {
        Some((dash, session)) => {
            info!("Resuming saved session for {}", session.email);
            crate::ui::main_window::show_main_window(
                app,
                dash,
                session,
                settings.last_location.clone(),
            );
        }
        None => crate::ui::login::show_login_window(app),
    }
}
