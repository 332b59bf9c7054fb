mod app;
mod ui;

use adw::Application;
use adw::prelude::*;

fn main() -> glib::ExitCode {
    env_logger::init();
    let app = Application::builder()
        .application_id("com.littoskwezed.BaDashboard")
        .build();
    app.connect_activate(|app| {
        crate::app::build_ui(app);
    });
    app.run()
}
