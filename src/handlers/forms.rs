//! Parsing of the free-text forms users type into the chat.

use crate::error::ValidationError;
use crate::lifecycle::Role;
use crate::models::{ContactInfo, NewPortfolio, PackageDraft, ProfileUpdate};
use crate::services::auth::Registration;
use crate::services::photographers::PhotographerQuery;

pub const LOGIN_HELP: &str = "Send your email and password separated by a space.";
pub const REGISTER_HELP: &str = "Send: Full name; email; password; phone (optional)";
pub const CONTACT_HELP: &str = "Send your contact details: name; email; phone; notes (optional)";
pub const PORTFOLIO_HELP: &str = "Send: title | category | description (optional)";
pub const BIO_HELP: &str = "Send your new bio in one message.";
pub const SEARCH_HELP: &str = "Search with /search <text>. Photographers can be narrowed with \
     cat:wedding,portrait and price:100-500. Admins search users by default, or bookings with \
     /search bookings <text>.";

fn fields(text: &str, separator: char) -> Vec<String> {
    text.split(separator).map(|part| part.trim().to_string()).collect()
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

pub fn parse_credentials(text: &str) -> Result<(String, String), ValidationError> {
    let mut parts = text.split_whitespace();
    let email = parts.next().ok_or(ValidationError::Required("email"))?;
    let password = parts.next().ok_or(ValidationError::Required("password"))?;
    if !email.contains('@') {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    Ok((email.to_string(), password.to_string()))
}

pub fn parse_registration(text: &str, role: Role) -> Result<Registration, ValidationError> {
    let parts = fields(text, ';');
    let registration = Registration {
        full_name: parts.first().cloned().unwrap_or_default(),
        email: parts.get(1).cloned().unwrap_or_default(),
        password: parts.get(2).cloned().unwrap_or_default(),
        role,
        phone: non_empty(parts.get(3)),
    };
    registration.validate()?;
    Ok(registration)
}

/// Contact details plus optional notes for a booking.
pub fn parse_contact(text: &str) -> Result<(ContactInfo, Option<String>), ValidationError> {
    let parts = fields(text, ';');
    let contact = ContactInfo {
        name: parts.first().cloned().unwrap_or_default(),
        email: parts.get(1).cloned().unwrap_or_default(),
        phone: parts.get(2).cloned().unwrap_or_default(),
    };
    contact.validate()?;
    // Notes may themselves contain semicolons.
    let notes = if parts.len() > 3 { Some(parts[3..].join("; ")) } else { None };
    Ok((contact, notes.filter(|n| !n.is_empty())))
}

/// Lines: name, description, price, duration, comma separated inclusions.
pub fn parse_package_form(text: &str) -> Result<PackageDraft, ValidationError> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let line = |i: usize| lines.get(i).copied().unwrap_or_default();

    let price = match line(2).trim_start_matches('$') {
        "" => return Err(ValidationError::Required("price")),
        raw => raw.parse::<f64>().map_err(|_| ValidationError::Invalid("price"))?,
    };
    let includes = if line(4).is_empty() {
        Vec::new()
    } else {
        line(4).split(',').map(|item| item.trim().to_string()).collect()
    };

    let draft = PackageDraft {
        name: line(0).to_string(),
        description: line(1).to_string(),
        price,
        duration: line(3).to_string(),
        includes,
        is_active: true,
    };
    draft.validate()?;
    Ok(draft)
}

pub fn parse_portfolio_form(text: &str) -> Result<NewPortfolio, ValidationError> {
    let parts = fields(text, '|');
    let portfolio = NewPortfolio {
        title: parts.first().cloned().unwrap_or_default(),
        category: parts.get(1).map(|c| c.to_lowercase()).unwrap_or_default(),
        description: non_empty(parts.get(2)),
        is_published: true,
    };
    portfolio.validate()?;
    Ok(portfolio)
}

pub fn parse_bio(text: &str) -> Result<ProfileUpdate, ValidationError> {
    let bio = text.trim();
    if bio.is_empty() {
        return Err(ValidationError::Required("bio"));
    }
    Ok(ProfileUpdate {
        bio: Some(bio.to_string()),
        ..ProfileUpdate::default()
    })
}

/// Which list an admin's `/search` looks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    #[default]
    Default,
    Bookings,
    Users,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchArgs {
    pub scope: SearchScope,
    pub term: String,
    pub categories: Vec<String>,
    pub price_range: Option<(f64, f64)>,
}

impl SearchArgs {
    pub fn photographer_query(&self) -> PhotographerQuery {
        PhotographerQuery {
            term: Some(self.term.clone()).filter(|t| !t.is_empty()),
            categories: self.categories.clone(),
            price_range: self.price_range,
        }
    }
}

/// `[bookings|users] words... [cat:a,b] [price:min-max]`
pub fn parse_search(text: &str) -> Result<SearchArgs, ValidationError> {
    let mut args = SearchArgs::default();
    let mut words = Vec::new();
    for (i, word) in text.split_whitespace().enumerate() {
        if let Some(list) = word.strip_prefix("cat:") {
            args.categories.extend(
                list.split(',')
                    .map(|c| c.trim().to_lowercase())
                    .filter(|c| !c.is_empty()),
            );
        } else if let Some(range) = word.strip_prefix("price:") {
            args.price_range = Some(parse_price_range(range)?);
        } else if i == 0 && word.eq_ignore_ascii_case("bookings") {
            args.scope = SearchScope::Bookings;
        } else if i == 0 && word.eq_ignore_ascii_case("users") {
            args.scope = SearchScope::Users;
        } else {
            words.push(word);
        }
    }
    args.term = words.join(" ");
    Ok(args)
}

fn parse_price_range(range: &str) -> Result<(f64, f64), ValidationError> {
    let price = |raw: &str| {
        raw.trim_start_matches('$')
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p >= 0.0)
            .ok_or(ValidationError::Invalid("price range"))
    };
    let (min, max) = range.split_once('-').ok_or(ValidationError::Invalid("price range"))?;
    let (min, max) = (price(min)?, price(max)?);
    if min > max {
        return Err(ValidationError::Invalid("price range"));
    }
    Ok((min, max))
}

/// Content type for an uploaded file, from its extension.
pub fn image_content_type(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_need_both_parts() {
        assert_eq!(
            parse_credentials(" ann@example.com  secret "),
            Ok(("ann@example.com".to_string(), "secret".to_string()))
        );
        assert_eq!(parse_credentials("ann@example.com"), Err(ValidationError::Required("password")));
        assert_eq!(
            parse_credentials("ann secret"),
            Err(ValidationError::InvalidEmail("ann".to_string()))
        );
    }

    #[test]
    fn registration_phone_is_optional() {
        let reg = parse_registration("Ann Lee; ann@example.com; pw", Role::User).unwrap();
        assert_eq!(reg.full_name, "Ann Lee");
        assert_eq!(reg.phone, None);

        let reg = parse_registration("Max; max@example.com; pw; +1 555", Role::Photographer).unwrap();
        assert_eq!(reg.phone.as_deref(), Some("+1 555"));
        assert_eq!(reg.role, Role::Photographer);

        assert_eq!(
            parse_registration("; ann@example.com; pw", Role::User),
            Err(ValidationError::Required("full name"))
        );
    }

    #[test]
    fn contact_keeps_semicolons_in_notes() {
        let (contact, notes) = parse_contact("Ann; ann@example.com; 555; outdoor; bring a dog").unwrap();
        assert_eq!(contact.phone, "555");
        assert_eq!(notes.as_deref(), Some("outdoor; bring a dog"));

        let (_, notes) = parse_contact("Ann; ann@example.com; 555").unwrap();
        assert_eq!(notes, None);

        assert_eq!(parse_contact("Ann; ann@example.com"), Err(ValidationError::Required("phone")));
    }

    #[test]
    fn search_arguments() {
        let args = parse_search("  studio  Kyiv cat:Wedding,portrait price:100-$500 ").unwrap();
        assert_eq!(args.scope, SearchScope::Default);
        assert_eq!(args.term, "studio Kyiv");
        assert_eq!(args.categories, ["wedding", "portrait"]);
        assert_eq!(args.price_range, Some((100.0, 500.0)));

        let query = args.photographer_query();
        assert_eq!(query.term.as_deref(), Some("studio Kyiv"));
        assert_eq!(query.price_range, Some((100.0, 500.0)));

        let admin = parse_search("bookings beach").unwrap();
        assert_eq!(admin.scope, SearchScope::Bookings);
        assert_eq!(admin.term, "beach");
        assert_eq!(parse_search("Users").unwrap().scope, SearchScope::Users);
        // Only the first word picks a scope.
        assert_eq!(parse_search("beach bookings").unwrap().term, "beach bookings");

        assert_eq!(parse_search("").unwrap().photographer_query().term, None);
        assert_eq!(parse_search("price:500-100"), Err(ValidationError::Invalid("price range")));
        assert_eq!(parse_search("price:cheap"), Err(ValidationError::Invalid("price range")));
        assert_eq!(parse_search("price:0-inf"), Err(ValidationError::Invalid("price range")));
    }

    #[test]
    fn package_form() {
        let draft = parse_package_form(
            "Wedding\nFull day coverage\n$1200.50\n8 hours\n300 photos, album ,  drone",
        )
        .unwrap();
        assert_eq!(draft.price, 1200.5);
        assert_eq!(draft.includes, ["300 photos", "album", "drone"]);
        assert!(draft.is_active);

        assert_eq!(
            parse_package_form("Wedding\nFull day\nlots\n8 hours\nalbum"),
            Err(ValidationError::Invalid("price"))
        );
        assert_eq!(
            parse_package_form("Wedding\nFull day\n-5\n8 hours\nalbum"),
            Err(ValidationError::NonPositivePrice)
        );
        assert_eq!(
            parse_package_form("Wedding\nFull day\ninf\n8 hours\nalbum"),
            Err(ValidationError::Invalid("price"))
        );
        assert_eq!(
            parse_package_form("Wedding\nFull day\n100\n8 hours"),
            Err(ValidationError::NoInclusions)
        );
        assert_eq!(
            parse_package_form("Wedding\nFull day\n100\n8 hours\nalbum,,prints"),
            Err(ValidationError::EmptyInclusion)
        );
    }

    #[test]
    fn portfolio_form() {
        let folio = parse_portfolio_form("Summer weddings | Wedding | Best of 2024").unwrap();
        assert_eq!(folio.category, "wedding");
        assert_eq!(folio.description.as_deref(), Some("Best of 2024"));

        assert_eq!(parse_portfolio_form("Only a title"), Err(ValidationError::Required("category")));
    }

    #[test]
    fn content_types() {
        assert_eq!(image_content_type("IMG_1.JPG"), Some("image/jpeg"));
        assert_eq!(image_content_type("shot.webp"), Some("image/webp"));
        assert_eq!(image_content_type("notes.txt"), None);
        assert_eq!(image_content_type("noextension"), None);
    }
}
