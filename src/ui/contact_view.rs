use std::cell::RefCell;
use std::rc::Rc;

use adw::prelude::*;
use ba_dashboard::api::models::{Contact, Meeting};
use ba_dashboard::dashboard::save_lead_status;
use ba_dashboard::error::MutationFailure;
use ba_dashboard::filter::LeadStatus;
use ba_dashboard::meetings::MeetingLog;
use ba_dashboard::{ApiError, ContactsApi};
use gtk4 as gtk;

use crate::ui::{UiContext, capitalize, clear_list, dialogs, padded_box, run_async_to_main};

const DETAIL_FIELDS: &[(&str, &str)] = &[
    ("jobtitle", "Job title"),
    ("email", "Email"),
    ("phone", "Phone"),
    ("address", "Address"),
    ("city", "City"),
    ("state", "State"),
    ("zip", "Zip"),
    ("hs_lead_status", "HubSpot status"),
];

/// Detail page of one contact with its meeting log.
pub struct ContactView {
    ctx: UiContext,
    root: gtk::Box,
    title: gtk::Label,
    company: gtk::Label,
    status_badge: gtk::Label,
    details: gtk::Grid,
    meetings: gtk::ListBox,
    contact: RefCell<Option<Contact>>,
    on_changed: RefCell<Option<Rc<dyn Fn()>>>,
}

impl ContactView {
    pub fn new(ctx: UiContext) -> Rc<Self> {
        let root = padded_box(gtk::Orientation::Vertical, 10, 16);

        let title = gtk::Label::new(None);
        title.add_css_class("title-2");
        title.set_halign(gtk::Align::Start);
        let company = gtk::Label::new(None);
        company.add_css_class("dim-label");
        company.set_halign(gtk::Align::Start);
        let status_badge = gtk::Label::new(None);
        status_badge.add_css_class("caption-heading");
        status_badge.set_halign(gtk::Align::Start);

        let actions = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let edit_btn = gtk::Button::with_label("Edit");
        let status_btn = gtk::Button::with_label("Update Status");
        let log_btn = gtk::Button::with_label("Log Meeting");
        log_btn.add_css_class("suggested-action");
        actions.append(&edit_btn);
        actions.append(&status_btn);
        actions.append(&log_btn);

        let details = gtk::Grid::new();
        details.set_row_spacing(4);
        details.set_column_spacing(12);

        let meetings_title = gtk::Label::new(Some("Meetings"));
        meetings_title.add_css_class("heading");
        meetings_title.set_halign(gtk::Align::Start);
        let meetings = gtk::ListBox::new();
        meetings.add_css_class("boxed-list");
        meetings.set_selection_mode(gtk::SelectionMode::None);

        root.append(&title);
        root.append(&company);
        root.append(&status_badge);
        root.append(&actions);
        root.append(&details);
        root.append(&meetings_title);
        root.append(&meetings);

        let view = Rc::new(Self {
            ctx,
            root,
            title,
            company,
            status_badge,
            details,
            meetings,
            contact: RefCell::new(None),
            on_changed: RefCell::new(None),
        });

        let this = Rc::downgrade(&view);
        edit_btn.connect_clicked(move |_| {
            if let Some(this) = this.upgrade() {
                this.edit();
            }
        });
        let this = Rc::downgrade(&view);
        status_btn.connect_clicked(move |_| {
            if let Some(this) = this.upgrade() {
                this.change_status();
            }
        });
        let this = Rc::downgrade(&view);
        log_btn.connect_clicked(move |_| {
            if let Some(this) = this.upgrade() {
                this.log_meeting();
            }
        });
        view
    }

    pub fn widget(&self) -> gtk::Widget {
        gtk::ScrolledWindow::builder()
            .vexpand(true)
            .child(&self.root)
            .build()
            .upcast()
    }

    /// Called after anything here changed cached contacts.
    pub fn connect_changed<F: Fn() + 'static>(&self, f: F) {
        *self.on_changed.borrow_mut() = Some(Rc::new(f));
    }

    fn notify_changed(&self) {
        let callback = self.on_changed.borrow().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    fn contact_id(&self) -> Option<String> {
        self.contact.borrow().as_ref().map(|c| c.id.clone())
    }

    /// Fetches the contact and its meetings. The cached copy stands in when
    /// the fetch fails.
    pub fn open(self: &Rc<Self>, id: String) {
        clear_list(&self.meetings);
        let dash = self.ctx.dash.clone();
        let this = Rc::clone(self);
        run_async_to_main(
            async move {
                let mut d = dash.lock().await;
                let cached = d.store().contact(&id).cloned();
                let fetched = d.contact_detail(&id).await;
                let meetings = d
                    .load_meetings(&id)
                    .await
                    .map(|log| log.entries().to_vec());
                (cached, fetched, meetings)
            },
            move |(cached, fetched, meetings): (Option<Contact>, Result<Contact, ApiError>, Result<Vec<Meeting>, ApiError>)| {
                match fetched {
                    Ok(contact) => this.show_contact(contact),
                    Err(e) => {
                        this.ctx.toast(&format!("Failed to load contact: {e}"));
                        if let Some(contact) = cached {
                            this.show_contact(contact);
                        }
                    }
                }
                match meetings {
                    Ok(meetings) => this.show_meetings(&meetings),
                    Err(e) => this.ctx.toast(&format!("Failed to load meetings: {e}")),
                }
            },
        );
    }

    fn show_contact(&self, contact: Contact) {
        self.title.set_label(&contact.display_name());
        self.company.set_label(contact.company().unwrap_or("No store name"));
        self.status_badge
            .set_label(&contact.lead_status().map(title_words).unwrap_or_else(|| "No status".into()));

        while let Some(child) = self.details.first_child() {
            self.details.remove(&child);
        }
        for (row, (name, label)) in DETAIL_FIELDS.iter().enumerate() {
            let caption = gtk::Label::new(Some(*label));
            caption.add_css_class("dim-label");
            caption.set_halign(gtk::Align::End);
            let value = gtk::Label::new(Some(contact.property(name).unwrap_or("-")));
            value.set_halign(gtk::Align::Start);
            value.set_selectable(true);
            self.details.attach(&caption, 0, row as i32, 1, 1);
            self.details.attach(&value, 1, row as i32, 1, 1);
        }
        *self.contact.borrow_mut() = Some(contact);
    }

    fn show_meetings(self: &Rc<Self>, meetings: &[Meeting]) {
        clear_list(&self.meetings);
        if meetings.is_empty() {
            let empty = gtk::Label::new(Some("No meetings logged yet."));
            empty.add_css_class("dim-label");
            empty.set_margin_top(12);
            empty.set_margin_bottom(12);
            self.meetings.append(&empty);
            return;
        }
        for meeting in meetings {
            self.meetings.append(&self.meeting_row(meeting));
        }
    }

    fn meeting_row(self: &Rc<Self>, meeting: &Meeting) -> gtk::Widget {
        let row = padded_box(gtk::Orientation::Vertical, 4, 8);
        let heading = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let title = gtk::Label::new(Some(meeting.title.as_str()));
        title.add_css_class("heading");
        title.set_hexpand(true);
        title.set_halign(gtk::Align::Start);
        heading.append(&title);

        let pending = MeetingLog::is_pending(&meeting.id);
        let edit_btn = gtk::Button::from_icon_name("document-edit-symbolic");
        let delete_btn = gtk::Button::from_icon_name("user-trash-symbolic");
        edit_btn.set_sensitive(!pending);
        delete_btn.set_sensitive(!pending);
        heading.append(&edit_btn);
        heading.append(&delete_btn);
        row.append(&heading);

        let when = meeting
            .occurred_at()
            .map(|t| t.format("%b %e, %Y %H:%M").to_string())
            .unwrap_or_else(|| "Unknown date".into());
        let meta = gtk::Label::new(Some(format!("{when} · {}", meeting.outcome).as_str()));
        meta.add_css_class("dim-label");
        meta.set_halign(gtk::Align::Start);
        row.append(&meta);

        if !meeting.body.is_empty() {
            let body = gtk::Label::new(Some(meeting.body.as_str()));
            body.set_wrap(true);
            body.set_halign(gtk::Align::Start);
            row.append(&body);
        }

        let this = Rc::downgrade(self);
        let for_edit = meeting.clone();
        edit_btn.connect_clicked(move |_| {
            if let Some(this) = this.upgrade() {
                this.edit_meeting(&for_edit);
            }
        });
        let this = Rc::downgrade(self);
        let meeting_id = meeting.id.clone();
        delete_btn.connect_clicked(move |_| {
            if let Some(this) = this.upgrade() {
                this.delete_meeting(meeting_id.clone());
            }
        });
        row.upcast()
    }

    /// Applies the edit optimistically, then sends it.
    fn edit(self: &Rc<Self>) {
        let Some(contact) = self.contact.borrow().clone() else { return };
        let this = Rc::clone(self);
        let contact_id = contact.id.clone();
        dialogs::edit_contact_dialog(&self.ctx.window, &contact, move |form| {
            let dash = this.ctx.dash.clone();
            let id = contact_id.clone();
            let this = Rc::clone(&this);
            run_async_to_main(
                async move {
                    let mut d = dash.lock().await;
                    let pending = d.begin_update(&id, form).await?;
                    let optimistic = d.store().contact(&id).cloned();
                    Ok::<_, MutationFailure>((pending, optimistic, d.api()))
                },
                move |res| match res {
                    Err(failure) => this.ctx.report(&failure),
                    Ok((pending, optimistic, api)) => {
                        if let Some(contact) = optimistic {
                            this.show_contact(contact);
                        }
                        this.notify_changed();
                        let dash = this.ctx.dash.clone();
                        let this = Rc::clone(&this);
                        run_async_to_main(
                            async move {
                                let result = api.update_contact(&pending.contact_id, &pending.patch).await;
                                let id = pending.contact_id.clone();
                                let mut d = dash.lock().await;
                                let outcome = d.finish_update(pending, result);
                                (outcome, d.store().contact(&id).cloned())
                            },
                            move |(outcome, current)| this.settle_update(outcome, current, "Contact updated"),
                        );
                    }
                },
            );
        });
    }

    fn change_status(self: &Rc<Self>) {
        let Some(contact) = self.contact.borrow().clone() else { return };
        let this = Rc::clone(self);
        let contact_id = contact.id.clone();
        dialogs::status_dialog(&self.ctx.window, contact.lead_status(), move |status: LeadStatus| {
            let dash = this.ctx.dash.clone();
            let id = contact_id.clone();
            let this = Rc::clone(&this);
            run_async_to_main(
                async move {
                    let (pending, api) = {
                        let mut d = dash.lock().await;
                        (d.begin_status_update(&id, status), d.api())
                    };
                    let result = save_lead_status(api.as_ref(), &id, status).await;
                    let mut d = dash.lock().await;
                    let outcome = d.finish_status_update(pending, result);
                    (outcome, d.store().contact(&id).cloned())
                },
                move |(outcome, current)| this.settle_update(outcome, current, "Status updated"),
            );
        });
    }

    fn settle_update(
        &self,
        outcome: Result<Contact, MutationFailure>,
        current: Option<Contact>,
        success: &str,
    ) {
        match outcome {
            Ok(contact) => {
                self.show_contact(contact);
                self.ctx.toast(success);
            }
            Err(failure) => {
                self.ctx.report(&failure);
                if let Some(contact) = current {
                    self.show_contact(contact);
                }
            }
        }
        self.notify_changed();
    }

    fn reload_meetings(self: &Rc<Self>, contact_id: String) {
        let dash = self.ctx.dash.clone();
        let this = Rc::clone(self);
        run_async_to_main(
            async move {
                let d = dash.lock().await;
                d.meeting_log(&contact_id)
                    .map(|log| log.entries().to_vec())
                    .unwrap_or_default()
            },
            move |meetings: Vec<Meeting>| this.show_meetings(&meetings),
        );
    }

    fn log_meeting(self: &Rc<Self>) {
        let Some(contact_id) = self.contact_id() else { return };
        let this = Rc::clone(self);
        dialogs::meeting_dialog(&self.ctx.window, None, move |form| {
            let dash = this.ctx.dash.clone();
            let id = contact_id.clone();
            let this = Rc::clone(&this);
            run_async_to_main(
                async move { dash.lock().await.log_meeting(&id, form).await },
                move |res| {
                    match res {
                        Ok(_) => this.ctx.toast("Meeting logged"),
                        Err(failure) => this.ctx.report(&failure),
                    }
                    if let Some(id) = this.contact_id() {
                        this.reload_meetings(id);
                    }
                },
            );
        });
    }

    fn edit_meeting(self: &Rc<Self>, meeting: &Meeting) {
        let this = Rc::clone(self);
        let contact_id = meeting.contact_id.clone();
        let meeting_id = meeting.id.clone();
        dialogs::meeting_dialog(&self.ctx.window, Some(meeting), move |form| {
            let dash = this.ctx.dash.clone();
            let (contact_id, meeting_id) = (contact_id.clone(), meeting_id.clone());
            let this = Rc::clone(&this);
            run_async_to_main(
                async move {
                    let mut d = dash.lock().await;
                    let res = d.edit_meeting(&contact_id, &meeting_id, form).await;
                    (res, contact_id)
                },
                move |(res, contact_id)| {
                    if let Err(failure) = res {
                        this.ctx.report(&failure);
                    }
                    this.reload_meetings(contact_id);
                },
            );
        });
    }

    fn delete_meeting(self: &Rc<Self>, meeting_id: String) {
        let Some(contact_id) = self.contact_id() else { return };
        let dash = self.ctx.dash.clone();
        let this = Rc::clone(self);
        run_async_to_main(
            async move {
                let res = dash.lock().await.delete_meeting(&contact_id, &meeting_id).await;
                (res, contact_id)
            },
            move |(res, contact_id)| {
                match res {
                    Ok(()) => this.ctx.toast("Meeting deleted"),
                    Err(failure) => this.ctx.report(&failure),
                }
                this.reload_meetings(contact_id);
            },
        );
    }
}

fn title_words(raw: &str) -> String {
    raw.split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}
