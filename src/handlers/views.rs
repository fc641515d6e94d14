//! Message texts and keyboards. Nothing here talks to the network.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};
use time::macros::format_description;

use super::actions::{Action, CalendarPurpose};
use crate::lifecycle::{self, BookingStatus, Role, TIME_SLOTS};
use crate::models::{Booking, NewBooking, Package, Photographer, Portfolio, UserAccount};
use crate::services::admin::DashboardStats;
use crate::session::Session;

pub const BOOKINGS_PER_PAGE: usize = 3;

pub const MENU_PHOTOGRAPHERS: &str = "📸 Photographers";
pub const MENU_MY_BOOKINGS: &str = "📋 My bookings";
pub const MENU_BOOKINGS: &str = "📋 Bookings";
pub const MENU_CALENDAR: &str = "📅 Calendar";
pub const MENU_PACKAGES: &str = "📦 Packages";
pub const MENU_PORTFOLIO: &str = "🖼 Portfolio";
pub const MENU_EDIT_BIO: &str = "✏️ Edit bio";
pub const MENU_DASHBOARD: &str = "📊 Dashboard";
pub const MENU_ALL_BOOKINGS: &str = "📋 All bookings";
pub const MENU_USERS: &str = "👥 Users";
pub const MENU_ADMIN_PHOTOGRAPHERS: &str = "📷 Photographers";
pub const MENU_LOGOUT: &str = "🚪 Log out";

/// Escapes text for Telegram's legacy Markdown.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Bold for Markdown. Telegram does not accept escapes inside an entity,
/// so text carrying markup characters is shown plain and escaped instead.
pub fn bold(text: &str) -> String {
    if text.contains(['_', '*', '`', '[']) {
        escape(text)
    } else {
        format!("*{text}*")
    }
}

pub fn main_menu(role: Role) -> KeyboardMarkup {
    let rows: Vec<Vec<&str>> = match role {
        Role::User => vec![vec![MENU_PHOTOGRAPHERS], vec![MENU_MY_BOOKINGS], vec![MENU_LOGOUT]],
        Role::Photographer => vec![
            vec![MENU_BOOKINGS, MENU_CALENDAR],
            vec![MENU_PACKAGES, MENU_PORTFOLIO],
            vec![MENU_EDIT_BIO, MENU_LOGOUT],
        ],
        Role::Admin => vec![
            vec![MENU_DASHBOARD, MENU_ALL_BOOKINGS],
            vec![MENU_USERS, MENU_ADMIN_PHOTOGRAPHERS],
            vec![MENU_LOGOUT],
        ],
    };
    let buttons: Vec<Vec<KeyboardButton>> = rows
        .into_iter()
        .map(|row| row.into_iter().map(KeyboardButton::new).collect())
        .collect();
    KeyboardMarkup::new(buttons).resize_keyboard()
}

pub fn welcome(session: &Session) -> String {
    let format = format_description!("[day].[month].[year] [hour]:[minute]");
    let until = session
        .expires_at
        .format(&format)
        .unwrap_or_else(|_| session.expires_at.to_string());
    let name = session.user.full_name.as_deref().unwrap_or(&session.user.email);
    format!(
        "Welcome, {}! You are logged in as {} until {} UTC.",
        name,
        session.role(),
        until
    )
}

pub fn role_keyboard(register: bool) -> InlineKeyboardMarkup {
    let roles = if register {
        vec![Role::User, Role::Photographer]
    } else {
        vec![Role::User, Role::Photographer, Role::Admin]
    };
    InlineKeyboardMarkup::new(vec![roles
        .into_iter()
        .map(|role| {
            let action = if register { Action::RegisterAs(role) } else { Action::LoginAs(role) };
            InlineKeyboardButton::callback(role.as_str(), action.to_string())
        })
        .collect::<Vec<_>>()])
}

pub fn status_badge(status: BookingStatus) -> String {
    let style = status.style();
    format!("{} {}", style.emoji, style.label)
}

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub fn booking_card(booking: &Booking, role: Role) -> String {
    let mut card = format!(
        "{}\n*Date:* {}\n*Time:* {}\n",
        bold(&format!("Booking #{}", short_id(&booking.id))),
        booking.date.format("%d.%m.%Y"),
        escape(&booking.time_slot),
    );
    if let Some(name) = booking.photographer_name() {
        card.push_str(&format!("*Photographer:* {}\n", escape(name)));
    }
    if let Some(name) = booking.package_name() {
        card.push_str(&format!("*Package:* {}\n", escape(name)));
    }
    if role != Role::User {
        let contact = &booking.contact_info;
        card.push_str(&format!(
            "*Client:* {} ({}, {})\n",
            escape(&contact.name),
            escape(&contact.email),
            escape(&contact.phone)
        ));
    }
    if !booking.location.is_empty() {
        card.push_str(&format!("*Location:* {}\n", escape(&booking.location)));
    }
    card.push_str(&format!("*Price:* ${:.2}\n", booking.total_price()));
    if let Some(notes) = booking.notes.as_deref() {
        card.push_str(&format!("*Notes:* {}\n", escape(notes)));
    }
    card.push_str(&format!("*Status:* {}\n", status_badge(booking.status)));
    card
}

/// Action buttons for one booking, straight from the transition table.
pub fn booking_buttons(booking: &Booking, role: Role) -> Vec<InlineKeyboardButton> {
    let mut buttons = vec![InlineKeyboardButton::callback(
        format!("🔢 #{}", short_id(&booking.id)),
        Action::Ignore.to_string(),
    )];
    for status in lifecycle::next_allowed(booking.status, role) {
        buttons.push(InlineKeyboardButton::callback(
            format!("{} {}", status.style().emoji, status.action_label()),
            Action::SetStatus {
                booking_id: booking.id.clone(),
                status,
            }
            .to_string(),
        ));
    }
    if role != Role::Photographer && !booking.status.is_terminal() {
        buttons.push(InlineKeyboardButton::callback(
            "🗓 Reschedule",
            Action::Reschedule(booking.id.clone()).to_string(),
        ));
    }
    if role == Role::User && booking.status == BookingStatus::Completed {
        buttons.push(InlineKeyboardButton::callback(
            "🖼 Photos",
            Action::Photos(booking.id.clone()).to_string(),
        ));
    }
    buttons
}

/// `(start, end, total_pages)` for `page`, clamped to the last page.
pub fn paginate(len: usize, page: usize) -> (usize, usize, usize) {
    let total_pages = len.div_ceil(BOOKINGS_PER_PAGE).max(1);
    let page = page.min(total_pages - 1);
    let start = page * BOOKINGS_PER_PAGE;
    let end = (start + BOOKINGS_PER_PAGE).min(len);
    (start, end, total_pages)
}

pub fn booking_page(
    title: &str,
    bookings: &[Booking],
    page: usize,
    role: Role,
) -> (String, InlineKeyboardMarkup) {
    if bookings.is_empty() {
        return (format!("{title}\n\nNo bookings yet."), InlineKeyboardMarkup::default());
    }

    let (start, end, total_pages) = paginate(bookings.len(), page);
    let page = start / BOOKINGS_PER_PAGE;
    let mut message = format!("{title}\n\n");
    let mut keyboard = vec![];

    for booking in &bookings[start..end] {
        message.push_str(&booking_card(booking, role));
        message.push('\n');
        keyboard.push(booking_buttons(booking, role));
    }

    if total_pages > 1 {
        let mut nav_buttons = vec![];
        if page > 0 {
            nav_buttons.push(InlineKeyboardButton::callback(
                "⬅️ Back",
                Action::BookingPage(page - 1).to_string(),
            ));
        }
        nav_buttons.push(InlineKeyboardButton::callback(
            format!("📄 {}/{}", page + 1, total_pages),
            Action::Ignore.to_string(),
        ));
        if page + 1 < total_pages {
            nav_buttons.push(InlineKeyboardButton::callback(
                "Next ➡️",
                Action::BookingPage(page + 1).to_string(),
            ));
        }
        keyboard.push(nav_buttons);
    }

    (message, InlineKeyboardMarkup::new(keyboard))
}

pub fn photographer_list(photographers: &[Photographer]) -> (String, InlineKeyboardMarkup) {
    if photographers.is_empty() {
        return ("No photographers found 😢".to_string(), InlineKeyboardMarkup::default());
    }
    let mut message = String::from("Choose a photographer 📷\n\n");
    let mut keyboard = vec![];
    for p in photographers {
        message.push_str(&bold(&p.full_name));
        if let Some(specialty) = p.specialty.as_deref() {
            message.push_str(&format!(" · {}", escape(specialty)));
        }
        if let Some(location) = p.location.as_deref() {
            message.push_str(&format!(" · {}", escape(location)));
        }
        if let Some(price) = p.price {
            message.push_str(&format!(" · from ${price:.0}"));
        }
        if let Some(rating) = p.rating {
            message.push_str(&format!(" · ⭐ {rating:.1}"));
        }
        message.push('\n');
        keyboard.push(vec![InlineKeyboardButton::callback(
            p.full_name.clone(),
            Action::Photographer(p.id.clone()).to_string(),
        )]);
    }
    message.push_str("\nSend /search <text> to filter, /help for options.");
    (message, InlineKeyboardMarkup::new(keyboard))
}

pub fn photographer_profile(photographer: &Photographer, portfolios: &[Portfolio]) -> String {
    let mut text = format!("📷 {}\n", bold(&photographer.full_name));
    if let Some(specialty) = photographer.specialty.as_deref() {
        text.push_str(&format!("{}\n", escape(specialty)));
    }
    if let Some(location) = photographer.location.as_deref() {
        text.push_str(&format!("📍 {}\n", escape(location)));
    }
    if let Some(bio) = photographer.bio.as_deref().filter(|b| !b.is_empty()) {
        text.push_str(&format!("\n{}\n", escape(bio)));
    }
    let published: Vec<&Portfolio> = portfolios.iter().filter(|p| p.is_published).collect();
    if !published.is_empty() {
        let photos: usize = published.iter().map(|p| p.images.len()).sum();
        text.push_str(&format!(
            "\n🖼 {} collection(s), {} photo(s)\n",
            published.len(),
            photos
        ));
    }
    text
}

/// Review text shown before a booking is sent.
pub fn booking_summary(request: &NewBooking, package: Option<&Package>) -> String {
    let mut text = String::from("*Please confirm your booking*\n\n");
    if let Some(package) = package {
        text.push_str(&format!("*Package:* {}\n", escape(&package.name)));
    }
    text.push_str(&format!(
        "*Date:* {}\n*Time:* {}\n*Location:* {}\n*Price:* ${:.2}\n*Contact:* {} ({}, {})\n",
        request.date.format("%d.%m.%Y"),
        escape(&request.time_slot),
        escape(&request.location),
        request.total_price(),
        escape(&request.contact_info.name),
        escape(&request.contact_info.email),
        escape(&request.contact_info.phone),
    ));
    if let Some(notes) = request.notes.as_deref() {
        text.push_str(&format!("*Notes:* {}\n", escape(notes)));
    }
    text
}

pub fn package_line(package: &Package) -> String {
    let mut line = format!(
        "{} · ${:.2} · {}\n{}\n",
        bold(&package.name),
        package.price,
        escape(&package.duration),
        escape(&package.description)
    );
    for item in &package.includes {
        line.push_str(&format!("  • {}\n", escape(item)));
    }
    line
}

/// Packages a client can book with `photographer_id`.
pub fn bookable_packages(photographer_id: &str, packages: &[Package]) -> (String, InlineKeyboardMarkup) {
    let active: Vec<&Package> = packages.iter().filter(|p| p.is_active).collect();
    if active.is_empty() {
        return (
            "This photographer has no packages yet.".to_string(),
            InlineKeyboardMarkup::default(),
        );
    }
    let mut message = String::from("Choose a package 📦\n\n");
    let mut keyboard = vec![];
    for package in active {
        message.push_str(&package_line(package));
        message.push('\n');
        keyboard.push(vec![InlineKeyboardButton::callback(
            format!("Book {}", package.name),
            Action::Package {
                photographer_id: photographer_id.to_string(),
                package_id: package.id.clone(),
            }
            .to_string(),
        )]);
    }
    (message, InlineKeyboardMarkup::new(keyboard))
}

/// A photographer's own packages with management buttons.
pub fn managed_packages(packages: &[Package]) -> (String, InlineKeyboardMarkup) {
    let mut message = String::from("Your packages 📦\n\n");
    let mut keyboard = vec![];
    for package in packages {
        let state = if package.is_active { "🟢" } else { "⏸" };
        message.push_str(&format!("{state} {}\n", package_line(package)));
        keyboard.push(vec![
            InlineKeyboardButton::callback(
                if package.is_active { "⏸ Hide" } else { "▶️ Show" },
                Action::TogglePackage(package.id.clone()).to_string(),
            ),
            InlineKeyboardButton::callback("🗑 Delete", Action::DeletePackage(package.id.clone()).to_string()),
        ]);
    }
    if packages.is_empty() {
        message.push_str("No packages yet.\n");
    }
    keyboard.push(vec![InlineKeyboardButton::callback("➕ New package", Action::NewPackage.to_string())]);
    (message, InlineKeyboardMarkup::new(keyboard))
}

pub const PACKAGE_FORM_HELP: &str = "Send the package in one message, one field per line:\n\n\
    Name\nDescription\nPrice\nDuration\nInclusion, inclusion, ...";

pub fn portfolio_list(portfolios: &[Portfolio], image_url: impl Fn(&str) -> String) -> (String, InlineKeyboardMarkup) {
    let mut message = String::from("Your portfolio 🖼\n\n");
    let mut keyboard = vec![];
    for folio in portfolios {
        message.push_str(&format!(
            "{} ({}) · {} photo(s) · {} view(s){}\n",
            bold(&folio.title),
            escape(&folio.category),
            folio.images.len(),
            folio.views,
            if folio.is_published { "" } else { " · draft" },
        ));
        if let Some(cover) = folio.images.iter().find(|i| i.is_featured).or(folio.images.first()) {
            message.push_str(&format!("  cover: {}\n", escape(&image_url(&cover.url))));
        }
        keyboard.push(vec![InlineKeyboardButton::callback(
            format!("⬆️ Add photos to {}", folio.title),
            Action::UploadTo(folio.id.clone()).to_string(),
        )]);
    }
    if portfolios.is_empty() {
        message.push_str("No collections yet.\n");
    }
    keyboard.push(vec![InlineKeyboardButton::callback("➕ New collection", Action::NewPortfolio.to_string())]);
    (message, InlineKeyboardMarkup::new(keyboard))
}

pub fn undo_upload(portfolio_id: &str, image_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "↩️ Undo",
        Action::DeleteImage {
            portfolio_id: portfolio_id.to_string(),
            image_id: image_id.to_string(),
        }
        .to_string(),
    )]])
}

pub fn time_slots(purpose: CalendarPurpose) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = TIME_SLOTS
        .chunks(2)
        .enumerate()
        .map(|(row, pair)| {
            pair.iter()
                .enumerate()
                .map(|(col, slot)| {
                    InlineKeyboardButton::callback(
                        *slot,
                        Action::Slot { purpose, index: row * 2 + col }.to_string(),
                    )
                })
                .collect()
        })
        .collect();
    keyboard.push(vec![InlineKeyboardButton::callback("⟵ Back", Action::Abort.to_string())]);
    InlineKeyboardMarkup::new(keyboard)
}

pub fn confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Book", Action::ConfirmBooking.to_string()),
        InlineKeyboardButton::callback("✖ Cancel", Action::Abort.to_string()),
    ]])
}

pub fn user_list(users: &[&UserAccount]) -> (String, InlineKeyboardMarkup) {
    let mut message = String::from("Users 👥\n\n");
    let mut keyboard = vec![];
    for user in users {
        let style = user.status.style();
        message.push_str(&format!(
            "{} {} · {} · {}\n",
            style.emoji,
            bold(&user.full_name),
            escape(&user.email),
            user.role
        ));
        keyboard.push(vec![InlineKeyboardButton::callback(
            format!("🗑 Delete {}", user.full_name),
            Action::DeleteUser(user.id.clone()).to_string(),
        )]);
    }
    if users.is_empty() {
        message.push_str("No users found.\n");
    }
    (message, InlineKeyboardMarkup::new(keyboard))
}

pub fn admin_photographer_list(photographers: &[Photographer]) -> (String, InlineKeyboardMarkup) {
    let mut message = String::from("Photographers 📷\n\n");
    let mut keyboard = vec![];
    for p in photographers {
        message.push_str(&format!(
            "{} {} · {} · {} booking(s)\n",
            p.status.style().emoji,
            bold(&p.full_name),
            escape(p.specialty.as_deref().unwrap_or("-")),
            p.bookings.unwrap_or(0)
        ));
        keyboard.push(vec![InlineKeyboardButton::callback(
            format!("🗑 Delete {}", p.full_name),
            Action::DeletePhotographer(p.id.clone()).to_string(),
        )]);
    }
    (message, InlineKeyboardMarkup::new(keyboard))
}

pub fn stats_text(stats: &DashboardStats) -> String {
    let mut text = format!(
        "📊 *Dashboard*\n\nUsers: {}\nPhotographers: {}\nBookings: {}\n",
        stats.users, stats.photographers, stats.bookings
    );
    for status in BookingStatus::ALL {
        let count = stats.by_status.get(&status).copied().unwrap_or(0);
        text.push_str(&format!("  {}: {}\n", status_badge(status), count));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use teloxide::types::InlineKeyboardButtonKind;

    fn booking(id: &str, status: &str) -> Booking {
        serde_json::from_value(json!({
            "_id": id,
            "contactInfo": {"name": "Ann_Lee", "email": "ann@example.com", "phone": "555"},
            "photographer": {"_id": "p1", "fullName": "Max Light"},
            "package": "k1",
            "date": "2024-05-20",
            "timeSlot": "9:00 AM - 11:00 AM",
            "totalPrice": 150,
            "status": status
        }))
        .unwrap()
    }

    fn callbacks(buttons: &[InlineKeyboardButton]) -> Vec<String> {
        buttons
            .iter()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn escapes_markdown() {
        assert_eq!(escape("a_b*c`d[e]"), "a\\_b\\*c\\`d\\[e]");
    }

    #[test]
    fn bold_never_wraps_markup() {
        assert_eq!(bold("Max Light"), "*Max Light*");
        assert_eq!(bold("*Max*Light*"), "\\*Max\\*Light\\*");
        assert_eq!(bold("snap_shot"), "snap\\_shot");
    }

    #[test]
    fn photographer_names_with_markup_stay_outside_bold() {
        let photographer: Photographer = serde_json::from_value(serde_json::json!({
            "_id": "p1",
            "fullName": "*Max*Light*"
        }))
        .unwrap();
        let profile = photographer_profile(&photographer, &[]);
        assert!(profile.starts_with("📷 \\*Max\\*Light\\*\n"));
    }

    #[test]
    fn card_hides_contact_from_clients() {
        let b = booking("65f1c2a9e4b0", "confirmed");
        let client_view = booking_card(&b, Role::User);
        assert!(client_view.contains("*Booking #65f1c2a9*"));
        assert!(client_view.contains("20.05.2024"));
        assert!(client_view.contains("$150.00"));
        assert!(client_view.contains("✅ Confirmed"));
        assert!(!client_view.contains("ann@example.com"));

        let photographer_view = booking_card(&b, Role::Photographer);
        assert!(photographer_view.contains("Ann\\_Lee"));
    }

    #[test]
    fn buttons_follow_transition_table() {
        let pending = booking("b1", "pending");
        assert_eq!(
            callbacks(&booking_buttons(&pending, Role::Photographer)),
            ["ignore", "st:b1:confirmed", "st:b1:cancelled"]
        );
        assert_eq!(
            callbacks(&booking_buttons(&pending, Role::User)),
            ["ignore", "st:b1:cancelled", "rs:b1"]
        );

        let completed = booking("b2", "completed");
        assert_eq!(callbacks(&booking_buttons(&completed, Role::Admin)), ["ignore"]);
        assert_eq!(callbacks(&booking_buttons(&completed, Role::User)), ["ignore", "bf:b2"]);
    }

    #[test]
    fn pages_of_three() {
        assert_eq!(paginate(0, 0), (0, 0, 1));
        assert_eq!(paginate(7, 0), (0, 3, 3));
        assert_eq!(paginate(7, 2), (6, 7, 3));
        assert_eq!(paginate(7, 9), (6, 7, 3));
    }

    #[test]
    fn booking_page_navigation() {
        let bookings: Vec<Booking> = (0..7).map(|i| booking(&format!("b{i}"), "pending")).collect();
        let (text, keyboard) = booking_page("Bookings", &bookings, 1, Role::Admin);
        assert!(text.contains("#b3") && text.contains("#b5") && !text.contains("#b6"));

        let nav = keyboard.inline_keyboard.last().unwrap();
        assert_eq!(callbacks(nav), ["bp:0", "ignore", "bp:2"]);
        assert_eq!(nav[1].text, "📄 2/3");
    }

    #[test]
    fn slot_buttons_cover_every_slot() {
        let keyboard = time_slots(CalendarPurpose::Book);
        let all: Vec<String> = keyboard
            .inline_keyboard
            .iter()
            .flat_map(|row| callbacks(row))
            .collect();
        assert_eq!(all, ["slot:b:0", "slot:b:1", "slot:b:2", "slot:b:3", "slot:b:4", "abort"]);
    }

    #[test]
    fn summary_shows_frozen_price() {
        let package: Package =
            serde_json::from_value(json!({"_id": "k1", "name": "Mini_Set", "price": 80, "isActive": true})).unwrap();
        let contact = crate::models::ContactInfo {
            name: "Ann".to_string(),
            email: "ann@example.com".to_string(),
            phone: "555".to_string(),
        };
        let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let request = NewBooking::for_package("p1", &package, date, TIME_SLOTS[0], contact, None, date).unwrap();

        let text = booking_summary(&request, Some(&package));
        assert!(text.contains("Mini\\_Set"));
        assert!(text.contains("20.05.2024"));
        assert!(text.contains("$80.00"));
        assert!(text.contains("To be determined"));
    }

    #[test]
    fn bookable_packages_skip_hidden_ones() {
        let packages: Vec<Package> = serde_json::from_value(json!([
            {"_id": "k1", "name": "Mini", "price": 50, "isActive": true},
            {"_id": "k2", "name": "Old", "price": 70, "isActive": false}
        ]))
        .unwrap();
        let (text, keyboard) = bookable_packages("p1", &packages);
        assert!(text.contains("Mini") && !text.contains("Old"));
        assert_eq!(callbacks(&keyboard.inline_keyboard[0]), ["pk:p1:k1"]);
    }
}
