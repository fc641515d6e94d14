use chrono::{Datelike, Local, NaiveDate};
use log::{error, info, warn};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, KeyboardRemove, MessageId, ParseMode};

use crate::api::{ImageUpload, MAX_IMAGE_BYTES};
use crate::error::{ApiError, AppError, ValidationError};
use crate::lifecycle::{self, Role, TIME_SLOTS};
use crate::models::Booking;
use crate::services::admin::filter_users;
use crate::services::auth::Credentials;
use crate::services::bookings::{bookings_on, split_upcoming, BookingFilter};
use crate::services::Services;
use crate::session::{Session, Sessions};

use self::actions::{Action, CalendarPurpose, UnknownAction};
use self::dialog::{BookingDraft, Dialog, Dialogs, Step};
use self::forms::SearchScope;

pub mod actions;
pub mod calendar;
pub mod dialog;
pub mod forms;
pub mod views;

/// Everything a handler needs, cloned into each update.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub sessions: Sessions,
    pub dialogs: Dialogs,
}

impl AppState {
    pub fn new(services: Services, sessions: Sessions) -> Self {
        AppState {
            services,
            sessions,
            dialogs: Dialogs::default(),
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn require_role(session: &Session, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&session.role()) {
        Ok(())
    } else {
        Err(AppError::Forbidden(session.role()))
    }
}

/// Upcoming bookings soonest first, then past ones most recent first.
pub fn order_for_display(bookings: Vec<Booking>, today: NaiveDate) -> Vec<Booking> {
    let (mut upcoming, mut past) = split_upcoming(bookings, today);
    upcoming.sort_by_key(|b| b.date);
    past.sort_by_key(|b| std::cmp::Reverse(b.date));
    upcoming.extend(past);
    upcoming
}

fn bookings_title(role: Role) -> &'static str {
    match role {
        Role::User => "📋 *Your bookings*",
        Role::Photographer => "📋 *Booking requests*",
        Role::Admin => "📋 *All bookings*",
    }
}

/// Month keyboard for `purpose`: booking needs a future day, rescheduling
/// needs the notice period, and the schedule marks days that have bookings.
pub fn calendar_for(
    purpose: CalendarPurpose,
    month: u32,
    year: i32,
    bookings: &[Booking],
    today: NaiveDate,
) -> InlineKeyboardMarkup {
    match purpose {
        CalendarPurpose::Book => calendar::generate_calendar(month, year, purpose, |d| d >= today, |_| false),
        CalendarPurpose::Reschedule => {
            let earliest = lifecycle::earliest_reschedule_date(today);
            calendar::generate_calendar(month, year, purpose, |d| d >= earliest, |_| false)
        }
        CalendarPurpose::Schedule => calendar::generate_calendar(
            month,
            year,
            purpose,
            |_| true,
            |d| !bookings_on(bookings, d).is_empty(),
        ),
    }
}

pub async fn on_message(bot: Bot, msg: Message, state: AppState) {
    let chat_id = msg.chat.id;
    if let Err(err) = handle_message(&bot, &msg, &state).await {
        report_error(&bot, chat_id, &state, err).await;
    }
}

pub async fn on_callback_query(bot: Bot, q: CallbackQuery, state: AppState) {
    if let Err(err) = bot.answer_callback_query(q.id.clone()).await {
        warn!("Failed to answer callback query: {}", err);
    }
    let Some(msg) = q.message.as_ref().and_then(|m| m.regular_message()) else {
        return;
    };
    let chat_id = msg.chat.id;
    if let Err(err) = handle_callback_query(&bot, &q, msg, &state).await {
        report_error(&bot, chat_id, &state, err).await;
    }
}

/// Logs the failure and tells the chat. A rejected token also ends the
/// chat's session.
pub async fn report_error(bot: &Bot, chat_id: ChatId, state: &AppState, err: AppError) {
    match &err {
        AppError::Validation(_) | AppError::Transition(_) | AppError::NotLoggedIn | AppError::Forbidden(_) => {
            warn!("Chat {}: {}", chat_id.0, err)
        }
        _ => error!("Chat {}: {}", chat_id.0, err),
    }

    let text = match state.sessions.invalidate_on(chat_id.0, &err).await {
        Ok(true) => {
            state.dialogs.reset(chat_id.0).await;
            "🔒 Your session has expired. Please /login again.".to_string()
        }
        Ok(false) => format!("⚠️ {}", err.user_message()),
        Err(store_err) => {
            error!("Failed to clear session for chat {}: {}", chat_id.0, store_err);
            format!("⚠️ {}", err.user_message())
        }
    };
    if let Err(send_err) = bot.send_message(chat_id, text).await {
        error!("Failed to report error to chat {}: {}", chat_id.0, send_err);
    }
}

pub async fn handle_message(bot: &Bot, msg: &Message, state: &AppState) -> Result<(), AppError> {
    if msg.photo().is_some() || msg.document().is_some() {
        return handle_upload(bot, msg, state).await;
    }
    let Some(text) = msg.text().map(str::trim) else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    if let Some(command) = text.strip_prefix('/') {
        let (command, args) = command.split_once(' ').unwrap_or((command, ""));
        let command = command.split('@').next().unwrap_or(command);
        return handle_command(bot, chat_id, state, command, args.trim()).await;
    }

    if handle_menu(bot, chat_id, state, text).await? {
        return Ok(());
    }

    let step = state.dialogs.update(chat_id.0, |d| d.step.clone()).await;
    match step {
        Step::Idle => {
            let hint = match state.sessions.current(chat_id.0).await? {
                Some(_) => "Use the menu below.",
                None => "Send /login or /register to get started.",
            };
            bot.send_message(chat_id, hint).await?;
        }
        Step::LoginCredentials(role) => {
            // Keep the password out of the chat history.
            if let Err(err) = bot.delete_message(chat_id, msg.id).await {
                warn!("Could not delete credentials message in chat {}: {}", chat_id.0, err);
            }
            let (email, password) = forms::parse_credentials(text)?;
            let credentials = state.services.auth.login(&email, &password, role).await?;
            start_session(bot, chat_id, state, credentials).await?;
        }
        Step::RegisterDetails(role) => {
            let registration = forms::parse_registration(text, role)?;
            let credentials = state.services.auth.register(&registration).await?;
            start_session(bot, chat_id, state, credentials).await?;
        }
        Step::BookingContact => {
            let (contact, notes) = forms::parse_contact(text)?;
            let draft = state.dialogs.update(chat_id.0, |d| d.draft.clone()).await;
            let request = draft.to_request(contact, notes, today())?;
            let summary = views::booking_summary(&request, draft.package.as_ref());
            state
                .dialogs
                .update(chat_id.0, |d| {
                    d.pending = Some(request);
                    d.step = Step::Idle;
                })
                .await;
            bot.send_message(chat_id, summary)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(views::confirm_keyboard())
                .await?;
        }
        Step::PackageForm => {
            let session = state.sessions.require(chat_id.0).await?;
            let draft = forms::parse_package_form(text)?;
            state.services.packages.create(&session, &draft).await?;
            state.dialogs.update(chat_id.0, |d| d.step = Step::Idle).await;
            show_packages(bot, chat_id, state, &session, None).await?;
        }
        Step::PortfolioForm => {
            let session = state.sessions.require(chat_id.0).await?;
            let portfolio = forms::parse_portfolio_form(text)?;
            let created = state.services.portfolio.create(&session, &portfolio).await?;
            let id = created.id.clone();
            state.dialogs.update(chat_id.0, |d| d.step = Step::PortfolioUpload(id)).await;
            bot.send_message(
                chat_id,
                format!("Collection {} created. Send photos to add them, then /done.", views::bold(&created.title)),
            )
            .parse_mode(ParseMode::Markdown)
            .await?;
        }
        Step::PortfolioUpload(_) => {
            bot.send_message(chat_id, "Send photos as pictures or image files, or /done when finished.")
                .await?;
        }
        Step::ProfileBio => {
            let session = state.sessions.require(chat_id.0).await?;
            let update = forms::parse_bio(text)?;
            state.services.photographers.update_profile(&session, &update).await?;
            state.dialogs.update(chat_id.0, |d| d.step = Step::Idle).await;
            bot.send_message(chat_id, "✅ Profile updated.").await?;
        }
    }
    Ok(())
}

async fn handle_command(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    command: &str,
    args: &str,
) -> Result<(), AppError> {
    match command {
        "start" | "help" => {
            match state.sessions.current(chat_id.0).await? {
                Some(session) => {
                    bot.send_message(chat_id, views::welcome(&session))
                        .reply_markup(views::main_menu(session.role()))
                        .await?;
                }
                None => {
                    bot.send_message(
                        chat_id,
                        "👋 Welcome to Photobook! Find a photographer and book a session.\n\n\
                         /login to sign in, /register to create an account.",
                    )
                    .await?;
                }
            }
            if command == "help" {
                bot.send_message(chat_id, forms::SEARCH_HELP).await?;
            }
        }
        "login" => {
            bot.send_message(chat_id, "Log in as:")
                .reply_markup(views::role_keyboard(false))
                .await?;
        }
        "register" => {
            bot.send_message(chat_id, "Register as:")
                .reply_markup(views::role_keyboard(true))
                .await?;
        }
        "logout" => logout(bot, chat_id, state).await?,
        "me" => {
            let session = state.sessions.require(chat_id.0).await?;
            let account = state.services.auth.verify(&session).await?;
            bot.send_message(
                chat_id,
                format!(
                    "{} ({})\nRole: {}\nStatus: {}",
                    account.full_name,
                    account.email,
                    account.role,
                    account.status.style().label
                ),
            )
            .await?;
        }
        "search" => search(bot, chat_id, state, args).await?,
        "cancel" | "done" => {
            state.dialogs.update(chat_id.0, Dialog::abort).await;
            bot.send_message(chat_id, "Okay.").await?;
        }
        _ => {
            bot.send_message(chat_id, "Unknown command").await?;
        }
    }
    Ok(())
}

/// Handles a main menu button. Returns false when `text` is not one.
async fn handle_menu(bot: &Bot, chat_id: ChatId, state: &AppState, text: &str) -> Result<bool, AppError> {
    let known = [
        views::MENU_PHOTOGRAPHERS,
        views::MENU_MY_BOOKINGS,
        views::MENU_BOOKINGS,
        views::MENU_CALENDAR,
        views::MENU_PACKAGES,
        views::MENU_PORTFOLIO,
        views::MENU_EDIT_BIO,
        views::MENU_DASHBOARD,
        views::MENU_ALL_BOOKINGS,
        views::MENU_USERS,
        views::MENU_ADMIN_PHOTOGRAPHERS,
        views::MENU_LOGOUT,
    ];
    if !known.contains(&text) {
        return Ok(false);
    }
    // A menu press abandons whatever form was open.
    state.dialogs.update(chat_id.0, Dialog::abort).await;

    if text == views::MENU_PHOTOGRAPHERS {
        let photographers = state.services.photographers.all().await?;
        let (message, keyboard) = views::photographer_list(&photographers);
        bot.send_message(chat_id, message)
            .parse_mode(ParseMode::Markdown)
            .reply_markup(keyboard)
            .await?;
        return Ok(true);
    }
    if text == views::MENU_LOGOUT {
        logout(bot, chat_id, state).await?;
        return Ok(true);
    }

    let session = state.sessions.require(chat_id.0).await?;
    match text {
        views::MENU_MY_BOOKINGS | views::MENU_BOOKINGS | views::MENU_ALL_BOOKINGS => {
            show_bookings(bot, chat_id, state, &session).await?;
        }
        views::MENU_CALENDAR => {
            require_role(&session, &[Role::Photographer])?;
            let bookings = state.services.bookings.for_photographer(&session).await?;
            let today = today();
            let keyboard = calendar_for(CalendarPurpose::Schedule, today.month(), today.year(), &bookings, today);
            state.dialogs.update(chat_id.0, |d| d.bookings = bookings).await;
            bot.send_message(chat_id, "📅 Your schedule. Days with bookings are marked with •")
                .reply_markup(keyboard)
                .await?;
        }
        views::MENU_PACKAGES => {
            require_role(&session, &[Role::Photographer])?;
            show_packages(bot, chat_id, state, &session, None).await?;
        }
        views::MENU_PORTFOLIO => {
            require_role(&session, &[Role::Photographer])?;
            let portfolios = state.services.portfolio.mine(&session).await?;
            let portfolio = &state.services.portfolio;
            let (message, keyboard) = views::portfolio_list(&portfolios, |path| portfolio.image_url(path));
            bot.send_message(chat_id, message)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(keyboard)
                .await?;
        }
        views::MENU_EDIT_BIO => {
            require_role(&session, &[Role::Photographer])?;
            state.dialogs.update(chat_id.0, |d| d.step = Step::ProfileBio).await;
            bot.send_message(chat_id, forms::BIO_HELP).await?;
        }
        views::MENU_DASHBOARD => {
            require_role(&session, &[Role::Admin])?;
            let stats = state.services.admin.stats(&session).await?;
            bot.send_message(chat_id, views::stats_text(&stats))
                .parse_mode(ParseMode::Markdown)
                .await?;
        }
        views::MENU_USERS => {
            require_role(&session, &[Role::Admin])?;
            show_users(bot, chat_id, state, &session, "", None).await?;
        }
        views::MENU_ADMIN_PHOTOGRAPHERS => {
            require_role(&session, &[Role::Admin])?;
            show_admin_photographers(bot, chat_id, state, &session, None).await?;
        }
        _ => {}
    }
    Ok(true)
}

async fn start_session(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    credentials: Credentials,
) -> Result<(), AppError> {
    let session = state
        .sessions
        .start(chat_id.0, credentials.token, credentials.user)
        .await?;
    state.dialogs.reset(chat_id.0).await;
    info!("Chat {} logged in as {}", chat_id.0, session.role());

    bot.send_message(chat_id, views::welcome(&session))
        .reply_markup(views::main_menu(session.role()))
        .await?;

    // Land each role on its own home screen.
    match session.role() {
        Role::User | Role::Photographer => show_bookings(bot, chat_id, state, &session).await?,
        Role::Admin => {
            let stats = state.services.admin.stats(&session).await?;
            bot.send_message(chat_id, views::stats_text(&stats))
                .parse_mode(ParseMode::Markdown)
                .await?;
        }
    }
    Ok(())
}

async fn logout(bot: &Bot, chat_id: ChatId, state: &AppState) -> Result<(), AppError> {
    state.sessions.end(chat_id.0).await?;
    state.dialogs.reset(chat_id.0).await;
    info!("Chat {} logged out", chat_id.0);
    bot.send_message(chat_id, "👋 Logged out. Send /login to sign in again.")
        .reply_markup(KeyboardRemove::new())
        .await?;
    Ok(())
}

async fn search(bot: &Bot, chat_id: ChatId, state: &AppState, text: &str) -> Result<(), AppError> {
    let args = forms::parse_search(text)?;
    let session = state.sessions.current(chat_id.0).await?;
    let Some(session) = session.filter(|s| s.role() != Role::User) else {
        let photographers = state.services.photographers.search(&args.photographer_query()).await?;
        let (message, keyboard) = views::photographer_list(&photographers);
        bot.send_message(chat_id, message)
            .parse_mode(ParseMode::Markdown)
            .reply_markup(keyboard)
            .await?;
        return Ok(());
    };
    match (session.role(), args.scope) {
        (Role::Admin, SearchScope::Default | SearchScope::Users) => {
            show_users(bot, chat_id, state, &session, &args.term, None).await?;
        }
        _ => search_bookings(bot, chat_id, state, &session, &args.term).await?,
    }
    Ok(())
}

async fn search_bookings(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &Session,
    term: &str,
) -> Result<(), AppError> {
    let bookings = state.services.bookings.visible_to(session).await?;
    let found = matching_bookings(&bookings, term, today());
    let (message, keyboard) = views::booking_page("🔎 *Matching bookings*", &found, 0, session.role());
    state
        .dialogs
        .update(chat_id.0, |d| {
            d.bookings = found;
            d.page = 0;
        })
        .await;
    bot.send_message(chat_id, message)
        .parse_mode(ParseMode::Markdown)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

/// Bookings matching `term`, in display order.
fn matching_bookings(bookings: &[Booking], term: &str, today: NaiveDate) -> Vec<Booking> {
    let found = BookingFilter::new(term).apply(bookings).into_iter().cloned().collect();
    order_for_display(found, today)
}

async fn show_bookings(bot: &Bot, chat_id: ChatId, state: &AppState, session: &Session) -> Result<(), AppError> {
    let bookings = order_for_display(state.services.bookings.visible_to(session).await?, today());
    let (message, keyboard) = views::booking_page(bookings_title(session.role()), &bookings, 0, session.role());
    state
        .dialogs
        .update(chat_id.0, |d| {
            d.bookings = bookings;
            d.page = 0;
        })
        .await;
    bot.send_message(chat_id, message)
        .parse_mode(ParseMode::Markdown)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn edit_bookings(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    dialog: &Dialog,
    role: Role,
) -> Result<(), AppError> {
    let (message, keyboard) = views::booking_page(bookings_title(role), &dialog.bookings, dialog.page, role);
    bot.edit_message_text(chat_id, message_id, message)
        .parse_mode(ParseMode::Markdown)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

/// Sends the photographer's packages, or edits `message_id` in place.
async fn show_packages(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &Session,
    message_id: Option<MessageId>,
) -> Result<(), AppError> {
    let packages = state.services.packages.mine(session).await?;
    let (message, keyboard) = views::managed_packages(&packages);
    state.dialogs.update(chat_id.0, |d| d.packages = packages).await;
    match message_id {
        Some(id) => {
            bot.edit_message_text(chat_id, id, message)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, message)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(keyboard)
                .await?;
        }
    }
    Ok(())
}

async fn show_users(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &Session,
    term: &str,
    message_id: Option<MessageId>,
) -> Result<(), AppError> {
    let users = state.services.admin.users(session).await?;
    let (message, keyboard) = views::user_list(&filter_users(&users, term));
    match message_id {
        Some(id) => {
            bot.edit_message_text(chat_id, id, message)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, message)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(keyboard)
                .await?;
        }
    }
    Ok(())
}

async fn show_admin_photographers(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &Session,
    message_id: Option<MessageId>,
) -> Result<(), AppError> {
    let photographers = state.services.admin.photographers(session).await?;
    let (message, keyboard) = views::admin_photographer_list(&photographers);
    match message_id {
        Some(id) => {
            bot.edit_message_text(chat_id, id, message)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, message)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(keyboard)
                .await?;
        }
    }
    Ok(())
}

/// Finds a booking in the chat's last list, refreshing the list once if
/// it is not there.
async fn cached_booking(
    chat_id: ChatId,
    state: &AppState,
    session: &Session,
    booking_id: &str,
) -> Result<Booking, AppError> {
    let cached = state
        .dialogs
        .update(chat_id.0, |d| d.booking(booking_id).cloned())
        .await;
    if let Some(booking) = cached {
        return Ok(booking);
    }
    let bookings = order_for_display(state.services.bookings.visible_to(session).await?, today());
    let found = bookings.iter().find(|b| b.id == booking_id).cloned();
    state.dialogs.update(chat_id.0, |d| d.bookings = bookings).await;
    found.ok_or_else(|| {
        ApiError::Status {
            status: 404,
            message: "Booking not found".to_string(),
        }
        .into()
    })
}

pub async fn handle_callback_query(
    bot: &Bot,
    q: &CallbackQuery,
    msg: &Message,
    state: &AppState,
) -> Result<(), AppError> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let action = match data.parse::<Action>() {
        Ok(action) => action,
        Err(UnknownAction(data)) => {
            warn!("Ignoring unknown callback data {:?}", data);
            return Ok(());
        }
    };
    let chat_id = msg.chat.id;
    let today = today();

    match action {
        Action::Ignore => {}
        Action::Abort => {
            state.dialogs.update(chat_id.0, Dialog::abort).await;
            bot.edit_message_text(chat_id, msg.id, "Cancelled.").await?;
        }
        Action::LoginAs(role) => {
            state.dialogs.update(chat_id.0, |d| d.step = Step::LoginCredentials(role)).await;
            bot.send_message(chat_id, forms::LOGIN_HELP).await?;
        }
        Action::RegisterAs(role) => {
            state.dialogs.update(chat_id.0, |d| d.step = Step::RegisterDetails(role)).await;
            bot.send_message(chat_id, forms::REGISTER_HELP).await?;
        }
        Action::Photographer(id) => {
            let photographer = state.services.photographers.by_id(&id).await?;
            let packages = state.services.packages.public(&id).await?;
            let portfolios = state.services.portfolio.public(&id).await?;
            let (list, keyboard) = views::bookable_packages(&id, &packages);
            let message = format!("{}\n{}", views::photographer_profile(&photographer, &portfolios), list);
            bot.send_message(chat_id, message)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(keyboard)
                .await?;
        }
        Action::Package { photographer_id, package_id } => {
            let session = state.sessions.require(chat_id.0).await?;
            require_role(&session, &[Role::User])?;
            let package = state
                .services
                .packages
                .public(&photographer_id)
                .await?
                .into_iter()
                .find(|p| p.id == package_id && p.is_active)
                .ok_or(ValidationError::InactivePackage)?;
            let text = format!(
                "Pick a date for {} (${:.2})",
                views::bold(&package.name),
                package.price
            );
            state
                .dialogs
                .update(chat_id.0, |d| {
                    d.abort();
                    d.draft = BookingDraft::for_package(&photographer_id, package);
                })
                .await;
            bot.edit_message_text(chat_id, msg.id, text)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(calendar_for(CalendarPurpose::Book, today.month(), today.year(), &[], today))
                .await?;
        }
        Action::Month { purpose, month, year } => {
            let bookings = state.dialogs.update(chat_id.0, |d| d.bookings.clone()).await;
            bot.edit_message_reply_markup(chat_id, msg.id)
                .reply_markup(calendar_for(purpose, month, year, &bookings, today))
                .await?;
        }
        Action::Day { purpose: CalendarPurpose::Book, date } => {
            if date < today {
                return Err(ValidationError::DateInPast { date }.into());
            }
            state.dialogs.update(chat_id.0, |d| d.draft.date = Some(date)).await;
            bot.edit_message_text(chat_id, msg.id, format!("Pick a time on {}", date.format("%d.%m.%Y")))
                .reply_markup(views::time_slots(CalendarPurpose::Book))
                .await?;
        }
        Action::Day { purpose: CalendarPurpose::Reschedule, date } => {
            let earliest = lifecycle::earliest_reschedule_date(today);
            if date < earliest {
                return Err(ValidationError::DateTooSoon { date, earliest }.into());
            }
            state.dialogs.update(chat_id.0, |d| d.reschedule_date = Some(date)).await;
            bot.edit_message_text(chat_id, msg.id, format!("Pick a new time on {}", date.format("%d.%m.%Y")))
                .reply_markup(views::time_slots(CalendarPurpose::Reschedule))
                .await?;
        }
        Action::Day { purpose: CalendarPurpose::Schedule, date } => {
            let session = state.sessions.require(chat_id.0).await?;
            let bookings = state.dialogs.update(chat_id.0, |d| d.bookings.clone()).await;
            let day = bookings_on(&bookings, date);
            let mut message = format!("📅 *{}*\n\n", date.format("%d.%m.%Y"));
            if day.is_empty() {
                message.push_str("Nothing booked.");
            }
            for booking in day {
                message.push_str(&views::booking_card(booking, session.role()));
                message.push('\n');
            }
            bot.send_message(chat_id, message)
                .parse_mode(ParseMode::Markdown)
                .await?;
        }
        Action::Slot { purpose, index } => {
            let slot = TIME_SLOTS
                .get(index)
                .ok_or(ValidationError::Invalid("time slot"))?
                .to_string();
            match purpose {
                CalendarPurpose::Book => {
                    state
                        .dialogs
                        .update(chat_id.0, |d| {
                            d.draft.time_slot = Some(slot);
                            d.step = Step::BookingContact;
                        })
                        .await;
                    bot.edit_message_text(chat_id, msg.id, forms::CONTACT_HELP).await?;
                }
                CalendarPurpose::Reschedule => {
                    let session = state.sessions.require(chat_id.0).await?;
                    let (booking_id, date) = state
                        .dialogs
                        .update(chat_id.0, |d| (d.reschedule.clone(), d.reschedule_date))
                        .await;
                    let booking_id = booking_id.ok_or(ValidationError::Required("booking"))?;
                    let date = date.ok_or(ValidationError::Required("date"))?;
                    let booking = cached_booking(chat_id, state, &session, &booking_id).await?;
                    let updated = state
                        .services
                        .bookings
                        .reschedule(&session, &booking, date, &slot, today)
                        .await?;
                    let card = views::booking_card(&updated, session.role());
                    state
                        .dialogs
                        .update(chat_id.0, |d| {
                            d.replace_booking(updated);
                            d.abort();
                        })
                        .await;
                    bot.edit_message_text(chat_id, msg.id, format!("🗓 Rescheduled\n\n{card}"))
                        .parse_mode(ParseMode::Markdown)
                        .await?;
                }
                CalendarPurpose::Schedule => {}
            }
        }
        Action::ConfirmBooking => {
            let session = state.sessions.require(chat_id.0).await?;
            let pending = state
                .dialogs
                .update(chat_id.0, |d| d.pending.clone())
                .await
                .ok_or(ValidationError::Required("booking details"))?;
            let created = state.services.bookings.create(&session, &pending).await?;
            state.dialogs.update(chat_id.0, Dialog::abort).await;
            bot.edit_message_text(
                chat_id,
                msg.id,
                format!(
                    "✅ Booking request sent! The photographer will confirm it.\n\n{}",
                    views::booking_card(&created, session.role())
                ),
            )
            .parse_mode(ParseMode::Markdown)
            .await?;
        }
        Action::BookingPage(page) => {
            let session = state.sessions.require(chat_id.0).await?;
            let dialog = state
                .dialogs
                .update(chat_id.0, |d| {
                    d.page = page;
                    d.clone()
                })
                .await;
            edit_bookings(bot, chat_id, msg.id, &dialog, session.role()).await?;
        }
        Action::SetStatus { booking_id, status } => {
            let session = state.sessions.require(chat_id.0).await?;
            let booking = cached_booking(chat_id, state, &session, &booking_id).await?;
            let updated = state.services.bookings.set_status(&session, &booking, status).await?;
            let dialog = state
                .dialogs
                .update(chat_id.0, |d| {
                    d.replace_booking(updated);
                    d.clone()
                })
                .await;
            edit_bookings(bot, chat_id, msg.id, &dialog, session.role()).await?;
        }
        Action::Reschedule(booking_id) => {
            let session = state.sessions.require(chat_id.0).await?;
            require_role(&session, &[Role::User, Role::Admin])?;
            let booking = cached_booking(chat_id, state, &session, &booking_id).await?;
            if booking.status.is_terminal() {
                return Err(ValidationError::BookingClosed(booking.status).into());
            }
            let earliest = lifecycle::earliest_reschedule_date(today);
            state
                .dialogs
                .update(chat_id.0, |d| {
                    d.reschedule = Some(booking.id.clone());
                    d.reschedule_date = None;
                })
                .await;
            bot.send_message(
                chat_id,
                format!(
                    "Pick a new date for booking #{}. The earliest possible day is {}.",
                    views::short_id(&booking.id),
                    earliest.format("%d.%m.%Y")
                ),
            )
            .reply_markup(calendar_for(
                CalendarPurpose::Reschedule,
                earliest.month(),
                earliest.year(),
                &[],
                today,
            ))
            .await?;
        }
        Action::Photos(booking_id) => {
            let session = state.sessions.require(chat_id.0).await?;
            let photos = state.services.bookings.photos(&session, &booking_id).await?;
            let message = if photos.is_empty() {
                "No photos have been shared for this booking yet.".to_string()
            } else {
                photos
                    .iter()
                    .map(|photo| state.services.portfolio.image_url(&photo.url))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            bot.send_message(chat_id, message).await?;
        }
        Action::NewPackage => {
            let session = state.sessions.require(chat_id.0).await?;
            require_role(&session, &[Role::Photographer])?;
            state.dialogs.update(chat_id.0, |d| d.step = Step::PackageForm).await;
            bot.send_message(chat_id, views::PACKAGE_FORM_HELP).await?;
        }
        Action::TogglePackage(package_id) => {
            let session = state.sessions.require(chat_id.0).await?;
            require_role(&session, &[Role::Photographer])?;
            let package = state
                .dialogs
                .update(chat_id.0, |d| d.package(&package_id).cloned())
                .await
                .ok_or(ValidationError::Required("package"))?;
            state
                .services
                .packages
                .set_active(&session, &package, !package.is_active)
                .await?;
            show_packages(bot, chat_id, state, &session, Some(msg.id)).await?;
        }
        Action::DeletePackage(package_id) => {
            let session = state.sessions.require(chat_id.0).await?;
            require_role(&session, &[Role::Photographer])?;
            state.services.packages.delete(&session, &package_id).await?;
            show_packages(bot, chat_id, state, &session, Some(msg.id)).await?;
        }
        Action::NewPortfolio => {
            let session = state.sessions.require(chat_id.0).await?;
            require_role(&session, &[Role::Photographer])?;
            state.dialogs.update(chat_id.0, |d| d.step = Step::PortfolioForm).await;
            bot.send_message(chat_id, forms::PORTFOLIO_HELP).await?;
        }
        Action::UploadTo(portfolio_id) => {
            let session = state.sessions.require(chat_id.0).await?;
            require_role(&session, &[Role::Photographer])?;
            state
                .dialogs
                .update(chat_id.0, |d| d.step = Step::PortfolioUpload(portfolio_id))
                .await;
            bot.send_message(
                chat_id,
                "Send photos as pictures or image files (JPEG, PNG or WebP, up to 10 MB each). Send /done when finished.",
            )
            .await?;
        }
        Action::DeleteImage { portfolio_id, image_id } => {
            let session = state.sessions.require(chat_id.0).await?;
            require_role(&session, &[Role::Photographer])?;
            let updated = state
                .services
                .portfolio
                .delete_image(&session, &portfolio_id, &image_id)
                .await?;
            bot.edit_message_text(
                chat_id,
                msg.id,
                format!(
                    "↩️ Removed. {} now has {} photo(s).",
                    views::bold(&updated.title),
                    updated.images.len()
                ),
            )
            .parse_mode(ParseMode::Markdown)
            .await?;
        }
        Action::DeleteUser(user_id) => {
            let session = state.sessions.require(chat_id.0).await?;
            require_role(&session, &[Role::Admin])?;
            state.services.admin.delete_user(&session, &user_id).await?;
            show_users(bot, chat_id, state, &session, "", Some(msg.id)).await?;
        }
        Action::DeletePhotographer(photographer_id) => {
            let session = state.sessions.require(chat_id.0).await?;
            require_role(&session, &[Role::Admin])?;
            state
                .services
                .admin
                .delete_photographer(&session, &photographer_id)
                .await?;
            show_admin_photographers(bot, chat_id, state, &session, Some(msg.id)).await?;
        }
    }
    Ok(())
}

async fn handle_upload(bot: &Bot, msg: &Message, state: &AppState) -> Result<(), AppError> {
    let chat_id = msg.chat.id;
    let step = state.dialogs.update(chat_id.0, |d| d.step.clone()).await;
    let Step::PortfolioUpload(portfolio_id) = step else {
        bot.send_message(chat_id, "To add photos, open 🖼 Portfolio and pick a collection first.")
            .await?;
        return Ok(());
    };
    let session = state.sessions.require(chat_id.0).await?;
    let upload = download_image(bot, msg).await?;
    let updated = state
        .services
        .portfolio
        .upload_images(&session, &portfolio_id, vec![upload])
        .await?;
    let mut request = bot
        .send_message(
            chat_id,
            format!(
                "📸 Added. {} now has {} photo(s). Send more or /done.",
                views::bold(&updated.title),
                updated.images.len()
            ),
        )
        .parse_mode(ParseMode::Markdown);
    if let Some(image_id) = updated.images.last().and_then(|image| image.id.clone()) {
        request = request.reply_markup(views::undo_upload(&updated.id, &image_id));
    }
    request.await?;
    Ok(())
}

/// Fetches the largest size of a photo, or an image sent as a file.
async fn download_image(bot: &Bot, msg: &Message) -> Result<ImageUpload, AppError> {
    let (file_id, file_name, content_type, size): (String, String, String, u32) =
        if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
            (
                photo.file.id.clone(),
                format!("photo_{}.jpg", msg.id.0),
                "image/jpeg".to_string(),
                photo.file.size,
            )
        } else if let Some(document) = msg.document() {
            let file_name = document
                .file_name
                .clone()
                .unwrap_or_else(|| format!("file_{}", msg.id.0));
            let content_type = document
                .mime_type
                .as_ref()
                .map(|mime| mime.essence_str().to_string())
                .or_else(|| forms::image_content_type(&file_name).map(str::to_string))
                .unwrap_or_default();
            (document.file.id.clone(), file_name, content_type, document.file.size)
        } else {
            return Err(ValidationError::NoImages.into());
        };

    if size as usize > MAX_IMAGE_BYTES {
        return Err(ValidationError::ImageTooLarge {
            name: file_name,
            size: size as usize,
            limit: MAX_IMAGE_BYTES,
        }
        .into());
    }

    let file = bot.get_file(file_id).await?;
    let mut bytes = Vec::with_capacity(size as usize);
    bot.download_file(&file.path, &mut bytes).await?;

    let upload = ImageUpload {
        file_name,
        content_type,
        bytes,
    };
    upload.validate()?;
    Ok(upload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_session;
    use serde_json::json;
    use teloxide::types::InlineKeyboardButtonKind;

    fn booking(id: &str, date: &str) -> Booking {
        serde_json::from_value(json!({
            "_id": id,
            "contactInfo": {"name": "Ann", "email": "ann@example.com", "phone": "555"},
            "photographer": "p1",
            "package": "k1",
            "date": date,
            "timeSlot": "9:00 AM - 11:00 AM",
            "totalPrice": 80,
            "status": "pending"
        }))
        .unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn upcoming_first_then_most_recent_past() {
        let bookings = vec![
            booking("past-old", "2024-05-01"),
            booking("soon-later", "2024-05-25"),
            booking("past-recent", "2024-05-08"),
            booking("soon", "2024-05-10"),
        ];
        let ids: Vec<String> = order_for_display(bookings, day(10)).into_iter().map(|b| b.id).collect();
        assert_eq!(ids, ["soon", "soon-later", "past-recent", "past-old"]);
    }

    #[test]
    fn booking_search_matches_any_field() {
        let mut beach = booking("beach", "2024-05-20");
        beach.location = "Sunny Beach".to_string();
        let bookings = vec![booking("a", "2024-05-01"), beach, booking("c", "2024-05-12")];

        let found = matching_bookings(&bookings, "BEACH", day(10));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "beach");

        let ids: Vec<String> = matching_bookings(&bookings, "ann", day(10)).into_iter().map(|b| b.id).collect();
        assert_eq!(ids, ["c", "beach", "a"]);
    }

    #[test]
    fn roles_are_gated() {
        let user = test_session(Role::User);
        assert!(require_role(&user, &[Role::User, Role::Admin]).is_ok());
        assert!(matches!(
            require_role(&user, &[Role::Admin]),
            Err(AppError::Forbidden(Role::User))
        ));
    }

    #[test]
    fn reschedule_calendar_respects_notice() {
        let keyboard = calendar_for(CalendarPurpose::Reschedule, 5, 2024, &[], day(10));
        let texts: Vec<&str> = keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .map(|b| b.text.as_str())
            .collect();
        assert!(texts.contains(&"❌11"));
        assert!(texts.contains(&"12"));
    }

    #[test]
    fn schedule_marks_booked_days() {
        let bookings = vec![booking("b1", "2024-05-20")];
        let keyboard = calendar_for(CalendarPurpose::Schedule, 5, 2024, &bookings, day(10));
        let marked = keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .find(|b| b.text == "20•")
            .unwrap();
        assert!(matches!(
            &marked.kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "day:s:2024-05-20"
        ));
    }
}
