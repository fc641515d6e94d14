use chrono::{Datelike, NaiveDate};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use super::actions::{Action, CalendarPurpose};

/// Month grid keyboard. Days for which `selectable` is false are shown
/// crossed out and do nothing when pressed; `marked` days get a dot.
pub fn generate_calendar(
    month: u32,
    year: i32,
    purpose: CalendarPurpose,
    selectable: impl Fn(NaiveDate) -> bool,
    marked: impl Fn(NaiveDate) -> bool,
) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    keyboard.push(vec![InlineKeyboardButton::callback(
        format!("📅 {} {}", month_name(month), year),
        Action::Ignore.to_string(),
    )]);

    let weekdays = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
    keyboard.push(
        weekdays
            .into_iter()
            .map(|day| InlineKeyboardButton::callback(day, Action::Ignore.to_string()))
            .collect(),
    );

    if let Some(first_day) = NaiveDate::from_ymd_opt(year, month, 1) {
        let mut row: Vec<InlineKeyboardButton> = Vec::new();
        let shift = first_day.weekday().num_days_from_monday() as usize;
        for _ in 0..shift {
            row.push(blank());
        }

        for date in first_day.iter_days().take_while(|d| d.month() == month) {
            let day = date.day();
            let button = if !selectable(date) {
                InlineKeyboardButton::callback(format!("❌{day}"), Action::Ignore.to_string())
            } else {
                let text = if marked(date) { format!("{day}•") } else { day.to_string() };
                InlineKeyboardButton::callback(text, Action::Day { purpose, date }.to_string())
            };
            row.push(button);

            if row.len() == 7 {
                keyboard.push(std::mem::take(&mut row));
            }
        }

        if !row.is_empty() {
            while row.len() < 7 {
                row.push(blank());
            }
            keyboard.push(row);
        }
    }

    let (prev_month, prev_year) = shift_month(month, year, -1);
    let (next_month, next_year) = shift_month(month, year, 1);
    keyboard.push(vec![
        InlineKeyboardButton::callback(
            "< Month",
            Action::Month { purpose, month: prev_month, year: prev_year }.to_string(),
        ),
        InlineKeyboardButton::callback(
            "Month >",
            Action::Month { purpose, month: next_month, year: next_year }.to_string(),
        ),
    ]);
    keyboard.push(vec![InlineKeyboardButton::callback("⟵ Back", Action::Abort.to_string())]);

    InlineKeyboardMarkup::new(keyboard)
}

fn blank() -> InlineKeyboardButton {
    InlineKeyboardButton::callback(" ", Action::Ignore.to_string())
}

pub fn shift_month(month: u32, year: i32, delta: i32) -> (u32, i32) {
    let index = year * 12 + month as i32 - 1 + delta;
    ((index.rem_euclid(12) + 1) as u32, index.div_euclid(12))
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January", 2 => "February", 3 => "March", 4 => "April",
        5 => "May", 6 => "June", 7 => "July", 8 => "August",
        9 => "September", 10 => "October", 11 => "November", 12 => "December",
        _ => "",
    }
}
