//! Message formatting.
//!
//! Pure functions turning backend JSON records into Telegram HTML text.
//! Missing or malformed fields degrade to placeholders; nothing here fails
//! the interaction.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::rbac::Module;
use crate::session::UserSession;

/// Longest description/content fragment shown in a detail view.
const MAX_BODY_LEN: usize = 500;
/// Telegram caps messages at 4096 characters; leave headroom for markup.
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Escape the characters Telegram HTML parse mode treats specially.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render an ISO-8601 timestamp for display, `dd.mm.yyyy hh:mm`.
///
/// Unparseable input is shown as-is rather than dropped.
#[must_use]
pub fn format_timestamp(raw: &str, include_time: bool) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00")) {
        let dt = dt.with_timezone(&Utc);
        return if include_time {
            dt.format("%d.%m.%Y %H:%M").to_string()
        } else {
            dt.format("%d.%m.%Y").to_string()
        };
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%d.%m.%Y").to_string();
    }
    raw.to_string()
}

/// Render a chrono datetime for display.
#[must_use]
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%d.%m.%Y %H:%M").to_string()
}

fn str_field<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn escaped_field(record: &Value, keys: &[&str], fallback: &str) -> String {
    str_field(record, keys).map_or_else(|| fallback.to_string(), escape_html)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

/// Title of a record without HTML escaping, for plain-text surfaces such as
/// button labels. Tolerates the bilingual field naming used by several
/// backend modules.
#[must_use]
pub fn record_title_raw(record: &Value) -> String {
    str_field(record, &["title", "title_ru", "title_kz", "name", "full_name"])
        .map_or_else(|| "Untitled".to_string(), str::to_string)
}

/// Title of a record, HTML-escaped for message bodies.
#[must_use]
pub fn record_title(record: &Value) -> String {
    escape_html(&record_title_raw(record))
}

/// Numeric id of a record, if present.
#[must_use]
pub fn record_id(record: &Value) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

/// Detail view for a record of the given module.
#[must_use]
pub fn format_detail(module: Module, record: &Value) -> String {
    match module {
        Module::Events => format_event(record),
        Module::Courses => format_course(record),
        Module::Vacancies => format_vacancy(record),
        Module::News => format_news(record),
        Module::Projects => format_project(record),
        _ => format_generic(record),
    }
}

fn format_event(event: &Value) -> String {
    let title = record_title(event);
    let location = escaped_field(event, &["location"], "N/A");
    let format_type = escaped_field(event, &["format"], "N/A");
    let description = truncate(
        &escaped_field(event, &["description"], ""),
        MAX_BODY_LEN,
    );
    let date = str_field(event, &["event_date", "date"])
        .map_or_else(|| "N/A".to_string(), |d| format_timestamp(d, true));

    format!(
        "<b>{title}</b>\n\n\
         <b>Date:</b> {date}\n\
         <b>Location:</b> {location}\n\
         <b>Format:</b> {format_type}\n\n\
         <b>Description:</b>\n{description}"
    )
}

fn format_course(course: &Value) -> String {
    let title = record_title(course);
    let language = escaped_field(course, &["language"], "N/A");
    let level = escaped_field(course, &["level"], "N/A");
    let description = truncate(&escaped_field(course, &["description"], ""), MAX_BODY_LEN);

    let duration_min = course.get("duration").and_then(Value::as_u64).unwrap_or(0);
    let duration = if duration_min >= 60 {
        format!("{}h {}m", duration_min / 60, duration_min % 60)
    } else {
        format!("{duration_min}m")
    };

    let price = course.get("price").and_then(Value::as_f64).unwrap_or(0.0);
    let currency = str_field(course, &["currency"]).unwrap_or("KZT");
    let price = if price > 0.0 {
        format!("{price:.0} {}", escape_html(currency))
    } else {
        "Free".to_string()
    };

    format!(
        "<b>{title}</b>\n\n\
         <b>Language:</b> {language}\n\
         <b>Duration:</b> {duration}\n\
         <b>Level:</b> {level}\n\
         <b>Price:</b> {price}\n\n\
         <b>Description:</b>\n{description}"
    )
}

fn format_vacancy(vacancy: &Value) -> String {
    let title = record_title(vacancy);
    let company = escaped_field(vacancy, &["company_name"], "N/A");
    let employment = escaped_field(vacancy, &["employment_type"], "N/A");
    let work_type = escaped_field(vacancy, &["work_type"], "N/A");
    let description = truncate(
        &escaped_field(vacancy, &["description_ru", "description_kz", "description"], ""),
        MAX_BODY_LEN,
    );

    let min = vacancy.get("salary_min").and_then(Value::as_i64);
    let max = vacancy.get("salary_max").and_then(Value::as_i64);
    let flat = vacancy.get("salary").and_then(Value::as_i64);
    let salary = match (min, max, flat) {
        (Some(lo), Some(hi), _) => format!("{lo} - {hi} KZT"),
        (_, _, Some(s)) => format!("{s} KZT"),
        _ => "Negotiable".to_string(),
    };

    format!(
        "<b>{title}</b>\n\n\
         <b>Company:</b> {company}\n\
         <b>Employment:</b> {employment}\n\
         <b>Work Type:</b> {work_type}\n\
         <b>Salary:</b> {salary}\n\n\
         <b>Description:</b>\n{description}"
    )
}

fn format_news(article: &Value) -> String {
    let title = record_title(article);
    let category = escaped_field(article, &["category"], "N/A");
    let source = escaped_field(article, &["source"], "N/A");
    let content = truncate(
        &escaped_field(article, &["content_ru", "content_kz", "content"], ""),
        MAX_BODY_LEN,
    );
    let date = str_field(article, &["published_at", "created_at"])
        .map_or_else(|| "N/A".to_string(), |d| format_timestamp(d, true));

    format!(
        "<b>{title}</b>\n\n\
         <b>Date:</b> {date}\n\
         <b>Category:</b> {category}\n\
         <b>Source:</b> {source}\n\n\
         {content}"
    )
}

fn format_project(project: &Value) -> String {
    let title = record_title(project);
    let status = escaped_field(project, &["status"], "N/A");
    let description = truncate(
        &escaped_field(
            project,
            &["description_ru", "description_kz", "description"],
            "",
        ),
        MAX_BODY_LEN,
    );

    format!(
        "<b>{title}</b>\n\n\
         <b>Status:</b> {status}\n\n\
         <b>Description:</b>\n{description}"
    )
}

fn format_generic(record: &Value) -> String {
    let title = record_title(record);
    let status = escaped_field(record, &["status"], "");
    if status.is_empty() {
        format!("<b>{title}</b>")
    } else {
        format!("<b>{title}</b>\n\n<b>Status:</b> {status}")
    }
}

/// One numbered row of a list view.
#[must_use]
pub fn format_list_row(module: Module, record: &Value, index: usize) -> String {
    let title = record_title(record);
    match module {
        Module::Events => {
            let date = str_field(record, &["event_date", "date"])
                .map_or_else(|| "N/A".to_string(), |d| format_timestamp(d, false));
            format!("{index}. <b>{title}</b> - {date}")
        },
        Module::Courses => {
            let price = record.get("price").and_then(Value::as_f64).unwrap_or(0.0);
            let price = if price > 0.0 {
                format!("{price:.0} KZT")
            } else {
                "Free".to_string()
            };
            format!("{index}. <b>{title}</b> - {price}")
        },
        Module::Vacancies => {
            let company = escaped_field(record, &["company_name"], "");
            if company.is_empty() {
                format!("{index}. <b>{title}</b>")
            } else {
                format!("{index}. <b>{title}</b> - {company}")
            }
        },
        Module::Volunteers => {
            let status = escaped_field(record, &["status"], "unknown");
            format!("{index}. <b>{title}</b> - {status}")
        },
        _ => format!("{index}. <b>{title}</b>"),
    }
}

/// Numbered list body for one page of records.
#[must_use]
pub fn format_list(module: Module, items: &[Value], page: u32, page_size: u32) -> String {
    if items.is_empty() {
        return format!("No {module} found.");
    }
    let start = (page.saturating_sub(1) * page_size) as usize + 1;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format_list_row(module, item, start + i))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Session summary for `/status`.
#[must_use]
pub fn format_session_info(session: &UserSession) -> String {
    let age = Utc::now().signed_duration_since(session.created_at);
    let hours = age.num_hours();
    let minutes = age.num_minutes() % 60;

    format!(
        "📊 <b>Session Status</b>\n\n\
         ✅ <b>Status:</b> Authenticated\n\
         {icon} <b>Role:</b> <code>{role}</code>\n\
         🆔 <b>Admin ID:</b> <code>{admin_id}</code>\n\
         👤 <b>Telegram ID:</b> <code>{telegram_id}</code>\n\n\
         ⏱ <b>Session age:</b> {hours}h {minutes}m\n\
         🕒 <b>Created:</b> {created}\n\
         🔄 <b>Last activity:</b> {activity}",
        icon = role_emoji(session.role),
        role = session.role,
        admin_id = session.admin_id,
        telegram_id = escape_html(&session.telegram_user_id),
        created = format_datetime(session.created_at),
        activity = format_datetime(session.last_activity),
    )
}

/// Emoji marker for a role.
#[must_use]
pub const fn role_emoji(role: crate::rbac::Role) -> &'static str {
    use crate::rbac::Role;
    match role {
        Role::SuperAdmin => "👑",
        Role::Administrator => "⚡",
        Role::Government => "🏛",
        Role::Npo => "🌟",
        Role::Msb => "💼",
        Role::VolunteerAdmin => "🤝",
        Role::Client => "👤",
    }
}

/// Emoji marker for a content module.
#[must_use]
pub const fn module_emoji(module: Module) -> &'static str {
    match module {
        Module::Events => "📅",
        Module::Courses => "🎓",
        Module::Vacancies => "💼",
        Module::News => "📰",
        Module::Projects => "🚀",
        Module::Volunteers => "🤝",
        Module::Users => "👥",
        Module::Leisure => "🎮",
        Module::Certificates => "🎖",
        Module::Experts => "👨‍💼",
        Module::Resumes => "📄",
    }
}

/// Generic error block shown for a failed interaction.
#[must_use]
pub fn format_error(detail: &str) -> String {
    format!("❌ <b>Error</b>\n\n⚠️ {}", escape_html(detail))
}

/// Clamp a message to Telegram's length limit.
#[must_use]
pub fn clamp_message(text: String) -> String {
    if text.chars().count() > MAX_MESSAGE_LEN {
        let cut: String = text.chars().take(MAX_MESSAGE_LEN - 50).collect();
        format!("{cut}\n\n... (truncated)")
    } else {
        text
    }
}
