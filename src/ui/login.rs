use std::rc::Rc;

use adw::Application;
use adw::prelude::*;
use ba_dashboard::config::BrandCredentials;
use ba_dashboard::utils::normalize_url;
use ba_dashboard::{ApiError, Brand, ContactsApi, HubSpotClient, Session, Settings};
use gtk4 as gtk;
use log::{info, warn};

use crate::ui::{capitalize, run_async_to_main};

pub fn show_login_window(app: &Application) {
    let settings = Settings::load();

    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Brand Ambassador Login")
        .default_width(420)
        .default_height(340)
        .resizable(false)
        .build();

    let toast_overlay = adw::ToastOverlay::new();
    let root = crate::ui::padded_box(gtk::Orientation::Vertical, 12, 24);

    let title = gtk::Label::new(Some("Sign in to your dashboard"));
    title.add_css_class("title-2");
    title.set_halign(gtk::Align::Start);
    root.append(&title);

    let email_entry = gtk::Entry::new();
    email_entry.set_placeholder_text(Some("Your e-mail"));
    email_entry.set_hexpand(true);
    if let Some(session) = &settings.session {
        email_entry.set_text(&session.email);
    }

    let labels: Vec<String> = Brand::ALL.iter().map(|b| capitalize(b.as_str())).collect();
    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    let brand_dropdown = gtk::DropDown::from_strings(&label_refs);
    let initial_brand = settings.session.as_ref().map(|s| s.brand).unwrap_or_default();
    if let Some(pos) = Brand::ALL.iter().position(|b| *b == initial_brand) {
        brand_dropdown.set_selected(pos as u32);
    }

    let server_entry = gtk::Entry::new();
    server_entry.set_placeholder_text(Some("HubSpot API base (e.g. https://api.hubapi.com)"));
    let token_entry = gtk::PasswordEntry::new();
    token_entry.set_placeholder_text(Some("Private app access token"));
    token_entry.set_show_peek_icon(true);

    let fill_brand = {
        let server_entry = server_entry.clone();
        let token_entry = token_entry.clone();
        move |brand: Brand| {
            let saved = Settings::load();
            let brand_settings = saved.brand(brand);
            server_entry.set_text(&brand_settings.base_url);
            token_entry.set_text(&brand_settings.token);
        }
    };
    fill_brand(initial_brand);
    brand_dropdown.connect_selected_notify(move |dd| {
        if let Some(brand) = Brand::ALL.get(dd.selected() as usize) {
            fill_brand(*brand);
        }
    });

    let form = gtk::Box::new(gtk::Orientation::Vertical, 8);
    form.append(&email_entry);
    form.append(&brand_dropdown);
    form.append(&server_entry);
    form.append(&token_entry);
    root.append(&form);

    let status = gtk::Label::new(None);
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    root.append(&status);

    let login_btn = gtk::Button::with_label("Sign in");
    login_btn.add_css_class("suggested-action");
    login_btn.set_halign(gtk::Align::End);
    root.append(&login_btn);

    toast_overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    header.set_title_widget(Some(&gtk::Label::new(Some("BA Dashboard"))));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    let on_connect = {
        let app = app.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let email_entry = email_entry.clone();
        let brand_dropdown = brand_dropdown.clone();
        let server_entry = server_entry.clone();
        let token_entry = token_entry.clone();
        move || {
            let brand = Brand::ALL
                .get(brand_dropdown.selected() as usize)
                .copied()
                .unwrap_or_default();
            let session = match Session::new(&email_entry.text(), brand) {
                Ok(session) => session,
                Err(e) => {
                    overlay.add_toast(adw::Toast::new(&e.to_string()));
                    return;
                }
            };
            let credentials = BrandCredentials {
                base_url: normalize_url(&server_entry.text()),
                token: token_entry.text().trim().to_string(),
            };
            let mut settings = Settings::load();
            let client = match HubSpotClient::new(&credentials, settings.request_timeout()) {
                Ok(client) => client,
                Err(e) => {
                    overlay.add_toast(adw::Toast::new(&e.to_string()));
                    return;
                }
            };

            status.set_label("Checking HubSpot access…");
            let status_label = status.clone();
            let app = app.clone();
            let window = window.clone();
            let overlay = overlay.clone();
            run_async_to_main(
                async move { client.owners().await.map(|owners| owners.len()) },
                move |res: Result<usize, ApiError>| match res {
                    Ok(owners) => {
                        info!("Signed in as {} ({brand}), {owners} owners visible", session.email);
                        let brand_settings = settings.brand_mut(brand);
                        brand_settings.base_url = credentials.base_url;
                        brand_settings.token = credentials.token;
                        if settings.session.as_ref() != Some(&session) {
                            settings.last_location = None;
                        }
                        settings.session = Some(session.clone());
                        if let Err(e) = settings.save() {
                            overlay.add_toast(adw::Toast::new(&format!("Failed to save settings: {e}")));
                        }
                        match crate::app::open_dashboard(&settings, &session) {
                            Some(dash) => {
                                crate::ui::main_window::show_main_window(
                                    &app,
                                    dash,
                                    &session,
                                    settings.last_location.clone(),
                                );
                                window.close();
                            }
                            None => status_label.set_label("Configuration incomplete"),
                        }
                    }
                    Err(err) => {
                        warn!("Login check failed: {err}");
                        status_label.set_label("Sign in failed");
                        overlay.add_toast(adw::Toast::new(&err.to_string()));
                    }
                },
            );
        }
    };

    let on_connect: Rc<dyn Fn()> = Rc::new(on_connect);
    {
        let on_connect = on_connect.clone();
        login_btn.connect_clicked(move |_| (on_connect)());
    }
    {
        let on_connect = on_connect.clone();
        email_entry.connect_activate(move |_| (on_connect)());
    }
    {
        let on_connect = on_connect.clone();
        token_entry.connect_activate(move |_| (on_connect)());
    }

    window.present();
}
