use std::cell::{Cell, RefCell};
use std::rc::Rc;

use adw::Application;
use adw::prelude::*;
use ba_dashboard::dashboard::{CreatedContact, DashboardView};
use ba_dashboard::error::MutationFailure;
use ba_dashboard::filter::{LeadStatus, StatusFilter};
use ba_dashboard::location::DASHBOARD_PATH;
use ba_dashboard::{ApiError, Dashboard, HubSpotClient, Session, Settings};
use gtk4 as gtk;
use log::{info, warn};
use tokio::task::AbortHandle;

use crate::ui::contact_view::ContactView;
use crate::ui::sidebar::Sidebar;
use crate::ui::{
    SharedDashboard, UiContext, capitalize, clear_list, dialogs, padded_box, run_async_to_main,
};

/// List operations; a newer one aborts the one in flight, except for the
/// initial hydration, which later operations queue behind.
enum ListOp {
    Hydrate(String),
    Refresh,
    Next,
    Prev,
    Status(StatusFilter),
    Query(String),
    Zip(Option<String>),
    ClearFilters,
}

impl ListOp {
    fn abortable(&self) -> bool {
        !matches!(self, ListOp::Hydrate(_))
    }

    async fn apply(self, dash: &mut Dashboard<HubSpotClient>) -> Result<(), ApiError> {
        match self {
            ListOp::Hydrate(raw) => dash.hydrate(&raw).await.map(|_| ()),
            ListOp::Refresh => dash.refresh().await.map(|_| ()),
            ListOp::Next => dash.next_page().await.map(|_| ()),
            ListOp::Prev => dash.prev_page().await.map(|_| ()),
            ListOp::Status(status) => dash.set_status(status).await.map(|_| ()),
            ListOp::Query(query) => dash.set_query(&query).await.map(|_| ()),
            ListOp::Zip(zip) => dash.set_zip(zip.as_deref()).await.map(|_| ()),
            ListOp::ClearFilters => dash.clear_filters().await.map(|_| ()),
        }
    }
}

fn status_choices() -> Vec<(String, StatusFilter)> {
    let mut choices = vec![
        ("All statuses".to_string(), StatusFilter::All),
        ("No status".to_string(), StatusFilter::NoStatus),
    ];
    choices.extend(
        LeadStatus::ALL
            .iter()
            .map(|s| (s.label().to_string(), StatusFilter::from(*s))),
    );
    choices
}

struct ListTask {
    generation: u64,
    handle: AbortHandle,
    abortable: bool,
}

struct DashboardWindow {
    ctx: UiContext,
    sidebar: Rc<Sidebar>,
    contact_view: Rc<ContactView>,
    stack: gtk::Stack,
    list: gtk::ListBox,
    empty: gtk::Label,
    spinner: gtk::Spinner,
    page_label: gtk::Label,
    prev_btn: gtk::Button,
    next_btn: gtk::Button,
    search: gtk::SearchEntry,
    status_dropdown: gtk::DropDown,
    visible_ids: RefCell<Vec<String>>,
    page_task: RefCell<Option<ListTask>>,
    generation: Cell<u64>,
    rendering: Cell<bool>,
}

impl DashboardWindow {
    fn run_list_op(self: &Rc<Self>, op: ListOp) {
        if let Some(previous) = self.page_task.borrow_mut().take() {
            if previous.abortable {
                previous.handle.abort();
            }
        }
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.spinner.start();

        let abortable = op.abortable();
        let dash = self.ctx.dash.clone();
        let this = Rc::clone(self);
        let handle = run_async_to_main(
            async move {
                let mut d = dash.lock().await;
                let result = op.apply(&mut d).await;
                (result, d.view(), d.location())
            },
            move |(result, view, location): (Result<(), ApiError>, DashboardView, Option<String>)| {
                let mut task = this.page_task.borrow_mut();
                if task.as_ref().is_some_and(|t| t.generation == generation) {
                    task.take();
                }
                drop(task);
                if let Err(e) = result {
                    this.ctx.toast(&format!("Failed to load contacts: {e}"));
                }
                this.render(&view);
                if let Some(location) = location {
                    persist_location(location);
                }
            },
        );
        *self.page_task.borrow_mut() = Some(ListTask {
            generation,
            handle,
            abortable,
        });
    }

    /// Re-renders from the store without fetching.
    fn refresh_view(self: &Rc<Self>) {
        let dash = self.ctx.dash.clone();
        let this = Rc::clone(self);
        run_async_to_main(
            async move { dash.lock().await.view() },
            move |view: DashboardView| this.render(&view),
        );
    }

    fn render(&self, view: &DashboardView) {
        self.rendering.set(true);

        clear_list(&self.list);
        for contact in &view.contacts {
            let row = padded_box(gtk::Orientation::Vertical, 2, 8);
            let company = gtk::Label::new(Some(contact.company().unwrap_or("No store name")));
            company.add_css_class("heading");
            company.set_halign(gtk::Align::Start);
            let status = contact
                .lead_status()
                .map(str::to_string)
                .unwrap_or_else(|| "no status".into());
            let meta = gtk::Label::new(Some(
                format!(
                    "{} · {} · {status}",
                    contact.display_name(),
                    contact.zip().unwrap_or("no zip")
                )
                .as_str(),
            ));
            meta.add_css_class("dim-label");
            meta.set_halign(gtk::Align::Start);
            row.append(&company);
            row.append(&meta);
            self.list.append(&row);
        }
        *self.visible_ids.borrow_mut() = view.contacts.iter().map(|c| c.id.clone()).collect();

        self.empty.set_visible(view.is_empty());
        if view.loading && !view.loaded_once {
            self.spinner.start();
        } else {
            self.spinner.stop();
        }

        let label = match view.total {
            Some(total) => format!("Page {} · {total} contacts", view.page),
            None => format!("Page {}", view.page),
        };
        self.page_label.set_label(&label);
        self.prev_btn.set_sensitive(view.has_prev);
        self.next_btn.set_sensitive(view.has_next);

        self.sidebar.set_items(&view.zips, view.filter.zip.as_deref());
        if self.search.text().trim() != view.filter.query {
            self.search.set_text(&view.filter.query);
        }
        if let Some(pos) = status_choices()
            .iter()
            .position(|(_, s)| *s == view.filter.status)
        {
            self.status_dropdown.set_selected(pos as u32);
        }

        self.rendering.set(false);
    }

    fn open_contact(self: &Rc<Self>, id: String) {
        self.contact_view.open(id);
        self.stack.set_visible_child_name("detail");
    }

    fn create_contact(self: &Rc<Self>) {
        let this = Rc::clone(self);
        dialogs::create_contact_dialog(&self.ctx.window, move |form| {
            let dash = this.ctx.dash.clone();
            let this = Rc::clone(&this);
            run_async_to_main(
                async move {
                    let mut d = dash.lock().await;
                    let created = d.create_contact(form).await;
                    (created, d.view(), d.location())
                },
                move |(created, view, location): (Result<CreatedContact, MutationFailure>, DashboardView, Option<String>)| {
                    this.render(&view);
                    if let Some(location) = location {
                        persist_location(location);
                    }
                    match created {
                        Ok(created) => {
                            this.ctx.toast("Contact created");
                            this.open_contact(created.contact_id);
                        }
                        Err(failure) => this.ctx.report(&failure),
                    }
                },
            );
        });
    }
}

fn persist_location(location: String) {
    let mut settings = Settings::load();
    if settings.last_location.as_deref() == Some(location.as_str()) {
        return;
    }
    settings.last_location = Some(location);
    if let Err(e) = settings.save() {
        warn!("Failed to remember dashboard location: {e}");
    }
}

fn sign_out(app: &Application, window: &adw::ApplicationWindow) {
    let mut settings = Settings::load();
    settings.session = None;
    settings.last_location = None;
    if let Err(e) = settings.save() {
        warn!("Failed to clear session: {e}");
    }
    info!("Signed out");
    crate::ui::login::show_login_window(app);
    window.close();
}

pub fn show_main_window(
    app: &Application,
    dash: SharedDashboard,
    session: &Session,
    last_location: Option<String>,
) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("BA Dashboard")
        .default_width(1080)
        .default_height(720)
        .build();
    let overlay = adw::ToastOverlay::new();
    let ctx = UiContext {
        dash,
        window: window.clone(),
        overlay: overlay.clone(),
    };

    let header = adw::HeaderBar::new();
    let title = adw::WindowTitle::new(
        &format!("{} Dashboard", capitalize(session.brand.as_str())),
        &session.email,
    );
    header.set_title_widget(Some(&title));
    let new_contact_btn = gtk::Button::with_label("New Contact");
    new_contact_btn.add_css_class("suggested-action");
    let refresh_btn = gtk::Button::from_icon_name("view-refresh-symbolic");
    refresh_btn.set_tooltip_text(Some("Reload contacts"));
    let sign_out_btn = gtk::Button::with_label("Sign out");
    header.pack_end(&new_contact_btn);
    header.pack_end(&refresh_btn);
    header.pack_start(&sign_out_btn);

    let filters = padded_box(gtk::Orientation::Horizontal, 6, 8);
    let search = gtk::SearchEntry::new();
    search.set_placeholder_text(Some("Search by store name"));
    search.set_hexpand(true);
    let labels: Vec<String> = status_choices().into_iter().map(|(l, _)| l).collect();
    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    let status_dropdown = gtk::DropDown::from_strings(&label_refs);
    let clear_btn = gtk::Button::with_label("Clear filters");
    filters.append(&search);
    filters.append(&status_dropdown);
    filters.append(&clear_btn);

    let list = gtk::ListBox::new();
    list.add_css_class("boxed-list");
    let empty = gtk::Label::new(Some("No contacts found"));
    empty.add_css_class("dim-label");
    empty.set_vexpand(true);
    empty.set_visible(false);
    let spinner = gtk::Spinner::new();

    let pager = gtk::Box::new(gtk::Orientation::Horizontal, 6);
    pager.set_halign(gtk::Align::Center);
    let prev_btn = gtk::Button::from_icon_name("go-previous-symbolic");
    let page_label = gtk::Label::new(Some("Page 1"));
    let next_btn = gtk::Button::from_icon_name("go-next-symbolic");
    pager.append(&prev_btn);
    pager.append(&page_label);
    pager.append(&next_btn);

    let list_page = padded_box(gtk::Orientation::Vertical, 8, 8);
    list_page.append(&filters);
    list_page.append(&spinner);
    list_page.append(
        &gtk::ScrolledWindow::builder()
            .vexpand(true)
            .child(&list)
            .build(),
    );
    list_page.append(&empty);
    list_page.append(&pager);

    let contact_view = ContactView::new(ctx.clone());
    let detail_page = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let back_btn = gtk::Button::with_label("Back to contacts");
    back_btn.set_halign(gtk::Align::Start);
    back_btn.set_margin_start(8);
    back_btn.set_margin_top(8);
    detail_page.append(&back_btn);
    detail_page.append(&contact_view.widget());

    let stack = gtk::Stack::new();
    stack.add_named(&list_page, Some("list"));
    stack.add_named(&detail_page, Some("detail"));
    stack.set_visible_child_name("list");

    let sidebar = Rc::new(Sidebar::new());
    let paned = gtk::Paned::new(gtk::Orientation::Horizontal);
    paned.set_start_child(Some(&sidebar.widget()));
    paned.set_end_child(Some(&stack));
    paned.set_position(220);
    overlay.set_child(Some(&paned));

    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));

    let ui = Rc::new(DashboardWindow {
        ctx,
        sidebar: Rc::clone(&sidebar),
        contact_view: Rc::clone(&contact_view),
        stack: stack.clone(),
        list: list.clone(),
        empty,
        spinner,
        page_label,
        prev_btn: prev_btn.clone(),
        next_btn: next_btn.clone(),
        search: search.clone(),
        status_dropdown: status_dropdown.clone(),
        visible_ids: RefCell::new(Vec::new()),
        page_task: RefCell::new(None),
        generation: Cell::new(0),
        rendering: Cell::new(false),
    });

    {
        let ui = Rc::downgrade(&ui);
        contact_view.connect_changed(move || {
            if let Some(ui) = ui.upgrade() {
                ui.refresh_view();
            }
        });
    }
    {
        let ui = Rc::downgrade(&ui);
        sidebar.connect_selected(move |zip| {
            if let Some(ui) = ui.upgrade() {
                if !ui.rendering.get() {
                    ui.stack.set_visible_child_name("list");
                    ui.run_list_op(ListOp::Zip(zip));
                }
            }
        });
    }
    {
        let ui = Rc::downgrade(&ui);
        search.connect_search_changed(move |entry| {
            if let Some(ui) = ui.upgrade() {
                if !ui.rendering.get() {
                    ui.run_list_op(ListOp::Query(entry.text().to_string()));
                }
            }
        });
    }
    {
        let ui = Rc::downgrade(&ui);
        status_dropdown.connect_selected_notify(move |dd| {
            let Some(ui) = ui.upgrade() else { return };
            if ui.rendering.get() {
                return;
            }
            if let Some((_, status)) = status_choices().into_iter().nth(dd.selected() as usize) {
                ui.run_list_op(ListOp::Status(status));
            }
        });
    }
    {
        let ui = Rc::downgrade(&ui);
        clear_btn.connect_clicked(move |_| {
            if let Some(ui) = ui.upgrade() {
                ui.run_list_op(ListOp::ClearFilters);
            }
        });
    }
    {
        let ui = Rc::downgrade(&ui);
        prev_btn.connect_clicked(move |_| {
            if let Some(ui) = ui.upgrade() {
                ui.run_list_op(ListOp::Prev);
            }
        });
    }
    {
        let ui = Rc::downgrade(&ui);
        next_btn.connect_clicked(move |_| {
            if let Some(ui) = ui.upgrade() {
                ui.run_list_op(ListOp::Next);
            }
        });
    }
    {
        let ui = Rc::downgrade(&ui);
        refresh_btn.connect_clicked(move |_| {
            if let Some(ui) = ui.upgrade() {
                ui.run_list_op(ListOp::Refresh);
            }
        });
    }
    {
        let ui = Rc::downgrade(&ui);
        list.connect_row_activated(move |_, row| {
            let Some(ui) = ui.upgrade() else { return };
            let id = usize::try_from(row.index())
                .ok()
                .and_then(|i| ui.visible_ids.borrow().get(i).cloned());
            if let Some(id) = id {
                ui.open_contact(id);
            }
        });
    }
    {
        let ui = Rc::downgrade(&ui);
        back_btn.connect_clicked(move |_| {
            if let Some(ui) = ui.upgrade() {
                ui.stack.set_visible_child_name("list");
                ui.refresh_view();
            }
        });
    }
    {
        let ui = Rc::downgrade(&ui);
        new_contact_btn.connect_clicked(move |_| {
            if let Some(ui) = ui.upgrade() {
                ui.create_contact();
            }
        });
    }
    {
        let app = app.clone();
        let window = window.clone();
        sign_out_btn.connect_clicked(move |_| sign_out(&app, &window));
    }

    window.present();
    // Signal handlers only hold weak references; this keeps `ui` alive.
    let keep_alive = Rc::clone(&ui);
    window.connect_close_request(move |_| {
        if let Some(task) = keep_alive.page_task.borrow_mut().take() {
            task.handle.abort();
        }
        glib::Propagation::Proceed
    });

    let initial = last_location.unwrap_or_else(|| DASHBOARD_PATH.to_string());
    info!("Opening dashboard at {initial}");
    ui.run_list_op(ListOp::Hydrate(initial));
}
