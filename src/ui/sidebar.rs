use gtk4 as gtk;
use gtk4::prelude::*;

use crate::ui::clear_list;

const ALL_ZIPS: &str = "All zip codes";

/// Known zip codes; selecting one scopes the list to it.
pub struct Sidebar {
    root: gtk::Box,
    list: gtk::ListBox,
    zips: std::cell::RefCell<Vec<String>>,
}

impl Sidebar {
    pub fn new() -> Self {
        let root = crate::ui::padded_box(gtk::Orientation::Vertical, 6, 8);

        let title = gtk::Label::new(Some("Zip Codes"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let list = gtk::ListBox::new();
        list.add_css_class("navigation-sidebar");
        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .child(&list)
            .build();
        root.append(&scroller);

        Self {
            root,
            list,
            zips: Default::default(),
        }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    /// `on_select` gets `None` for the "all" row.
    pub fn connect_selected<F: Fn(Option<String>) + 'static>(self: &std::rc::Rc<Self>, on_select: F) {
        let this = std::rc::Rc::downgrade(self);
        self.list.connect_row_activated(move |_, row| {
            let Some(this) = this.upgrade() else { return };
            let zip = usize::try_from(row.index() - 1)
                .ok()
                .and_then(|i| this.zips.borrow().get(i).cloned());
            on_select(zip);
        });
    }

    pub fn set_items(&self, zips: &[String], selected: Option<&str>) {
        if *self.zips.borrow() != zips {
            clear_list(&self.list);
            for label in std::iter::once(ALL_ZIPS).chain(zips.iter().map(String::as_str)) {
                let row = gtk::ListBoxRow::new();
                let text = gtk::Label::new(Some(label));
                text.set_margin_top(6);
                text.set_margin_bottom(6);
                text.set_margin_start(8);
                text.set_halign(gtk::Align::Start);
                row.set_child(Some(&text));
                self.list.append(&row);
            }
            *self.zips.borrow_mut() = zips.to_vec();
        }

        let index = selected
            .and_then(|zip| zips.iter().position(|z| z.eq_ignore_ascii_case(zip)))
            .map_or(0, |i| i as i32 + 1);
        if let Some(row) = self.list.row_at_index(index) {
            self.list.select_row(Some(&row));
        }
    }
}
