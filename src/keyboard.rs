//! Inline keyboard layouts.
//!
//! Button layout and emoji labels are presentation detail; the callback data
//! strings are the contract with [`crate::dispatch`]'s callback parser.
//! Every builder filters buttons by the caller's permissions, so a button
//! the role cannot act on is never rendered.

use serde_json::Value;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::format::{module_emoji, record_id, record_title_raw};
use crate::rbac::{Module, RbacContext};

/// Content modules served by the bot, in menu order.
pub const CONTENT_MODULES: [Module; 6] = [
    Module::Events,
    Module::Courses,
    Module::Vacancies,
    Module::News,
    Module::Projects,
    Module::Volunteers,
];

/// Longest button label before truncation.
const MAX_BUTTON_TITLE: usize = 28;

fn button(text: impl Into<String>, data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.into(), data.into())
}

fn menu_label(module: Module) -> String {
    let name = module.as_str();
    let mut chars = name.chars();
    let capitalized = chars
        .next()
        .map(|c| c.to_uppercase().collect::<String>() + chars.as_str())
        .unwrap_or_default();
    format!("{} {capitalized}", module_emoji(module))
}

/// Main menu: readable content modules two per row, admin panel for
/// administrative roles, logout at the bottom.
#[must_use]
pub fn main_menu(rbac: &RbacContext) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = CONTENT_MODULES
        .into_iter()
        .filter(|module| rbac.can_read(*module))
        .map(|module| button(menu_label(module), format!("menu:{module}")))
        .collect();

    let mut rows: Vec<Vec<InlineKeyboardButton>> =
        buttons.chunks(2).map(<[InlineKeyboardButton]>::to_vec).collect();

    if rbac.is_admin() {
        rows.push(vec![button("⚙️ Admin panel", "menu:admin")]);
    }
    rows.push(vec![button("🚪 Logout", "action:logout")]);

    InlineKeyboardMarkup::new(rows)
}

/// Pagination controls plus a main-menu row.
#[must_use]
pub fn pagination(module: Module, page: u32, total_pages: u32) -> InlineKeyboardMarkup {
    let mut nav = Vec::new();
    if page > 1 {
        nav.push(button("◀️ Prev", format!("{module}:page:{}", page - 1)));
    }
    nav.push(button(format!("📄 {page}/{total_pages}"), "noop"));
    if page < total_pages {
        nav.push(button("Next ▶️", format!("{module}:page:{}", page + 1)));
    }

    InlineKeyboardMarkup::new(vec![nav, vec![button("🏠 Main menu", "menu:main")]])
}

/// One button per record, linking to its detail view.
#[must_use]
pub fn list_items(module: Module, items: &[Value]) -> Vec<Vec<InlineKeyboardButton>> {
    let emoji = module_emoji(module);
    items
        .iter()
        .filter_map(|item| {
            let id = record_id(item)?;
            // Button text is plain text, so the title must not be escaped.
            let mut title = record_title_raw(item);
            if title.chars().count() > MAX_BUTTON_TITLE {
                title = title.chars().take(MAX_BUTTON_TITLE - 3).collect::<String>() + "...";
            }
            Some(vec![button(
                format!("{emoji} {title}"),
                format!("{module}:view:{id}"),
            )])
        })
        .collect()
}

/// List page keyboard: item buttons stacked above pagination.
#[must_use]
pub fn list_page(
    module: Module,
    items: &[Value],
    page: u32,
    total_pages: u32,
) -> InlineKeyboardMarkup {
    let mut rows = list_items(module, items);
    rows.extend(pagination(module, page, total_pages).inline_keyboard);
    InlineKeyboardMarkup::new(rows)
}

/// Detail view keyboard: mutation buttons only for permitted roles.
#[must_use]
pub fn item_detail(module: Module, id: i64, rbac: &RbacContext) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();

    let mut actions = Vec::new();
    if rbac.can_update(module) {
        actions.push(button("✏️ Edit", format!("{module}:edit:{id}")));
    }
    if rbac.can_delete(module) {
        actions.push(button("🗑 Delete", format!("{module}:delete:{id}")));
    }
    if !actions.is_empty() {
        rows.push(actions);
    }

    rows.push(vec![button("🔄 Refresh", format!("{module}:view:{id}"))]);
    rows.push(vec![button("◀️ Back to list", format!("menu:{module}"))]);

    InlineKeyboardMarkup::new(rows)
}

/// Confirm/cancel pair for a destructive action.
#[must_use]
pub fn confirmation(module: Module, action: &str, id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("✅ Confirm", format!("{module}:confirm_{action}:{id}")),
        button("❌ Cancel", format!("{module}:view:{id}")),
    ]])
}

/// Single back button.
#[must_use]
pub fn back(callback_data: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("◀️ Back", callback_data.to_string())]])
}

/// Admin panel menu.
#[must_use]
pub fn admin_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("📊 Dashboard", "admin:stats"),
            button("👥 Sessions", "admin:sessions"),
        ],
        vec![button("🏠 Main menu", "menu:main")],
    ])
}

/// Mark-as-read button attached to broadcast announcements.
#[must_use]
pub fn broadcast_read(broadcast_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button(
        "✅ Mark as read",
        format!("broadcast:read:{broadcast_id}"),
    )]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::{RbacContext, Role};
    use serde_json::json;

    fn callback_data(markup: &InlineKeyboardMarkup) -> Vec<String> {
        use teloxide::types::InlineKeyboardButtonKind;
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn main_menu_filters_by_read_permission() {
        let menu = main_menu(&RbacContext::new(Role::VolunteerAdmin));
        let data = callback_data(&menu);
        assert!(data.contains(&"menu:volunteers".to_string()));
        assert!(!data.contains(&"menu:vacancies".to_string()));
        assert!(!data.contains(&"menu:admin".to_string()));
        assert!(data.contains(&"action:logout".to_string()));
    }

    #[test]
    fn main_menu_for_super_admin_shows_admin_panel() {
        let menu = main_menu(&RbacContext::new(Role::SuperAdmin));
        let data = callback_data(&menu);
        for module in CONTENT_MODULES {
            assert!(data.contains(&format!("menu:{module}")));
        }
        assert!(data.contains(&"menu:admin".to_string()));
    }

    #[test]
    fn main_menu_for_anonymous_has_only_logout() {
        let menu = main_menu(&RbacContext::anonymous());
        assert_eq!(callback_data(&menu), vec!["action:logout".to_string()]);
    }

    #[test]
    fn pagination_edges() {
        let first = pagination(Module::Events, 1, 3);
        let data = callback_data(&first);
        assert!(!data.iter().any(|d| d.ends_with(":page:0")));
        assert!(data.contains(&"events:page:2".to_string()));

        let last = pagination(Module::Events, 3, 3);
        let data = callback_data(&last);
        assert!(data.contains(&"events:page:2".to_string()));
        assert!(!data.contains(&"events:page:4".to_string()));
        assert!(data.contains(&"menu:main".to_string()));
    }

    #[test]
    fn detail_keyboard_hides_mutations_for_read_only_role() {
        let markup = item_detail(Module::Events, 5, &RbacContext::new(Role::Government));
        let data = callback_data(&markup);
        assert!(!data.contains(&"events:edit:5".to_string()));
        assert!(!data.contains(&"events:delete:5".to_string()));
        assert!(data.contains(&"events:view:5".to_string()));
        assert!(data.contains(&"menu:events".to_string()));
    }

    #[test]
    fn detail_keyboard_shows_mutations_for_owner_role() {
        let markup = item_detail(Module::Projects, 9, &RbacContext::new(Role::Npo));
        let data = callback_data(&markup);
        assert!(data.contains(&"projects:edit:9".to_string()));
        assert!(data.contains(&"projects:delete:9".to_string()));
    }

    #[test]
    fn list_items_skip_records_without_id() {
        let rows = list_items(
            Module::News,
            &[json!({"id": 1, "title": "A"}), json!({"title": "no id"})],
        );
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn long_titles_are_truncated_on_buttons() {
        let rows = list_items(
            Module::News,
            &[json!({"id": 1, "title": "t".repeat(60)})],
        );
        let label = &rows[0][0].text;
        assert!(label.ends_with("..."));
        assert!(label.chars().count() <= MAX_BUTTON_TITLE + 3);
    }

    #[test]
    fn button_titles_stay_plain_text() {
        let rows = list_items(
            Module::Vacancies,
            &[json!({"id": 1, "title": "Sales & Marketing <Lead>"})],
        );
        let label = &rows[0][0].text;
        assert!(label.contains("Sales & Marketing <Lead>"));
        assert!(!label.contains("&amp;"));
    }

    #[test]
    fn confirmation_data_grammar() {
        let markup = confirmation(Module::Events, "delete", 4);
        let data = callback_data(&markup);
        assert_eq!(data, vec!["events:confirm_delete:4", "events:view:4"]);
    }
}
