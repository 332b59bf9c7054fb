use adw::prelude::*;
use ba_dashboard::api::models::{Contact, Meeting, MeetingOutcome};
use ba_dashboard::filter::LeadStatus;
use ba_dashboard::forms::{CreateContactForm, EditContactForm, MeetingForm, US_STATES, format_phone};
use chrono::{NaiveDateTime, TimeZone, Utc};
use gtk4 as gtk;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

fn dialog(parent: &adw::ApplicationWindow, title: &str, confirm: &str) -> (gtk::Dialog, gtk::Grid) {
    let dialog = gtk::Dialog::builder()
        .title(title)
        .transient_for(parent)
        .modal(true)
        .build();
    let grid = gtk::Grid::new();
    grid.set_row_spacing(8);
    grid.set_column_spacing(12);
    grid.set_margin_top(12);
    grid.set_margin_bottom(12);
    grid.set_margin_start(12);
    grid.set_margin_end(12);
    dialog.set_child(Some(&grid));
    let _ = dialog.add_button("Cancel", gtk::ResponseType::Cancel);
    let ok_btn = dialog.add_button(confirm, gtk::ResponseType::Ok);
    ok_btn.add_css_class("suggested-action");
    dialog.set_default_response(gtk::ResponseType::Ok);
    (dialog, grid)
}

fn field(grid: &gtk::Grid, row: i32, label: &str, widget: &impl IsA<gtk::Widget>) {
    let caption = gtk::Label::new(Some(label));
    caption.set_halign(gtk::Align::End);
    caption.add_css_class("dim-label");
    grid.attach(&caption, 0, row, 1, 1);
    widget.set_hexpand(true);
    grid.attach(widget, 1, row, 1, 1);
}

fn entry(grid: &gtk::Grid, row: i32, label: &str, value: &str) -> gtk::Entry {
    let entry = gtk::Entry::new();
    entry.set_text(value);
    entry.set_activates_default(true);
    field(grid, row, label, &entry);
    entry
}

/// Reformats digits as they are typed.
fn phone_entry(grid: &gtk::Grid, row: i32, value: &str) -> gtk::Entry {
    let entry = entry(grid, row, "Phone", value);
    entry.set_placeholder_text(Some("555-555-5555"));
    entry.connect_changed(|e| {
        let formatted = format_phone(&e.text());
        if formatted != e.text().as_str() {
            e.set_text(&formatted);
            e.set_position(-1);
        }
    });
    entry
}

fn state_dropdown(grid: &gtk::Grid, row: i32, current: &str) -> gtk::DropDown {
    let names: Vec<&str> = std::iter::once("Select a state")
        .chain(US_STATES.iter().map(|(_, name)| *name))
        .collect();
    let dropdown = gtk::DropDown::from_strings(&names);
    dropdown.set_enable_search(true);
    if let Some(pos) = US_STATES
        .iter()
        .position(|(code, _)| code.eq_ignore_ascii_case(current.trim()))
    {
        dropdown.set_selected(pos as u32 + 1);
    }
    field(grid, row, "State", &dropdown);
    dropdown
}

fn selected_state(dropdown: &gtk::DropDown) -> String {
    (dropdown.selected() as usize)
        .checked_sub(1)
        .and_then(|i| US_STATES.get(i))
        .map(|(code, _)| code.to_string())
        .unwrap_or_default()
}

pub fn create_contact_dialog<F>(parent: &adw::ApplicationWindow, on_submit: F)
where
    F: Fn(CreateContactForm) + 'static,
{
    let (dialog, grid) = dialog(parent, "New Contact", "Create");
    let firstname = entry(&grid, 0, "First name", "");
    let lastname = entry(&grid, 1, "Last name", "");
    let jobtitle = entry(&grid, 2, "Job title", "");
    let email = entry(&grid, 3, "Email", "");
    let company = entry(&grid, 4, "Store name", "");
    let phone = phone_entry(&grid, 5, "");
    let address = entry(&grid, 6, "Address", "");
    let city = entry(&grid, 7, "City", "");
    let state = state_dropdown(&grid, 8, "");
    let zip = entry(&grid, 9, "Zip", "");

    dialog.connect_response(move |dlg, resp| {
        if resp == gtk::ResponseType::Ok {
            on_submit(CreateContactForm {
                firstname: firstname.text().into(),
                lastname: lastname.text().into(),
                jobtitle: jobtitle.text().into(),
                email: email.text().into(),
                company: company.text().into(),
                phone: phone.text().into(),
                address: address.text().into(),
                city: city.text().into(),
                state: selected_state(&state),
                zip: zip.text().into(),
            });
        }
        dlg.close();
    });
    dialog.present();
}

pub fn edit_contact_dialog<F>(parent: &adw::ApplicationWindow, contact: &Contact, on_submit: F)
where
    F: Fn(EditContactForm) + 'static,
{
    let current = EditContactForm::from_contact(contact);
    let (dialog, grid) = dialog(parent, "Edit Contact", "Save");
    let company = entry(&grid, 0, "Store name", &current.company);
    let email = entry(&grid, 1, "Email", current.email.as_deref().unwrap_or_default());
    let phone = phone_entry(&grid, 2, &current.phone);
    let address = entry(&grid, 3, "Address", &current.address);
    let city = entry(&grid, 4, "City", &current.city);
    let state = state_dropdown(&grid, 5, &current.state);
    let zip = entry(&grid, 6, "Zip", &current.zip);

    dialog.connect_response(move |dlg, resp| {
        if resp == gtk::ResponseType::Ok {
            on_submit(EditContactForm {
                company: company.text().into(),
                email: Some(email.text().into()),
                phone: phone.text().into(),
                address: address.text().into(),
                city: city.text().into(),
                state: selected_state(&state),
                zip: zip.text().into(),
            });
        }
        dlg.close();
    });
    dialog.present();
}

pub fn status_dialog<F>(parent: &adw::ApplicationWindow, current: Option<&str>, on_submit: F)
where
    F: Fn(LeadStatus) + 'static,
{
    let (dialog, grid) = dialog(parent, "Update Status", "Update");
    let labels: Vec<&str> = LeadStatus::ALL.iter().map(|s| s.label()).collect();
    let dropdown = gtk::DropDown::from_strings(&labels);
    if let Some(pos) = current
        .and_then(LeadStatus::parse)
        .and_then(|s| LeadStatus::ALL.iter().position(|x| *x == s))
    {
        dropdown.set_selected(pos as u32);
    }
    field(&grid, 0, "Lead status", &dropdown);

    dialog.connect_response(move |dlg, resp| {
        if resp == gtk::ResponseType::Ok {
            if let Some(status) = LeadStatus::ALL.get(dropdown.selected() as usize) {
                on_submit(*status);
            }
        }
        dlg.close();
    });
    dialog.present();
}

fn outcome_labels() -> Vec<String> {
    std::iter::once("No outcome".to_string())
        .chain(MeetingOutcome::CHOICES.iter().map(|o| o.to_string()))
        .collect()
}

/// Reads "YYYY-MM-DD HH:MM" as UTC; blank means now.
fn parse_timestamp(raw: &str) -> Option<chrono::DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn meeting_dialog<F>(parent: &adw::ApplicationWindow, existing: Option<&Meeting>, on_submit: F)
where
    F: Fn(MeetingForm) + 'static,
{
    let title_text = if existing.is_some() { "Edit Meeting" } else { "Log Meeting" };
    let (dialog, grid) = dialog(parent, title_text, "Save");
    let title = entry(&grid, 0, "Title", existing.map(|m| m.title.as_str()).unwrap_or_default());
    let when = entry(
        &grid,
        1,
        "When (UTC)",
        &existing
            .and_then(Meeting::occurred_at)
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default(),
    );
    when.set_placeholder_text(Some("2025-03-01 15:00, blank for now"));

    let labels = outcome_labels();
    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    let outcome = gtk::DropDown::from_strings(&label_refs);
    if let Some(pos) = existing
        .and_then(|m| MeetingOutcome::CHOICES.iter().position(|o| *o == m.outcome))
    {
        outcome.set_selected(pos as u32 + 1);
    }
    field(&grid, 2, "Outcome", &outcome);

    let body = gtk::TextView::new();
    body.set_wrap_mode(gtk::WrapMode::WordChar);
    body.set_size_request(-1, 96);
    body.buffer()
        .set_text(existing.map(|m| m.body.as_str()).unwrap_or_default());
    field(&grid, 3, "Notes", &body);

    dialog.connect_response(move |dlg, resp| {
        if resp == gtk::ResponseType::Ok {
            let buffer = body.buffer();
            let outcome = (outcome.selected() as usize)
                .checked_sub(1)
                .and_then(|i| MeetingOutcome::CHOICES.get(i))
                .and_then(MeetingOutcome::as_vendor)
                .unwrap_or_default()
                .to_string();
            on_submit(MeetingForm {
                title: title.text().into(),
                body: buffer
                    .text(&buffer.start_iter(), &buffer.end_iter(), false)
                    .into(),
                timestamp: parse_timestamp(&when.text()),
                outcome,
            });
        }
        dlg.close();
    });
    dialog.present();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_read_as_utc_minutes() {
        let parsed = parse_timestamp(" 2025-03-01 15:30 ").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-03-01T15:30:00+00:00");
        assert!(parse_timestamp("").is_none());
    }
}
