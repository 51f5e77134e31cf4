//! Cell renderers used by the grid's column definitions.
//!
//! Each renderer turns one typed cell value into the string placed in the
//! cell. Markup output is inserted into the cell as-is, so the fields are
//! embedded exactly as the server sent them.

use chrono::{Local, TimeZone};

use crate::models::{Automation, Link, Timestamp};

/// Shown for an absent timestamp.
pub const PLACEHOLDER: &str = "-";

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where a rendered cell ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderTarget {
    /// Markup for a cell that accepts it.
    Markup,
    /// Plain text for terminals, desktop cells, search and sort.
    #[default]
    Plain,
}

/// Three fixed columns: `C`, `S`, `R` when set, a space otherwise.
pub fn automation(flags: &Automation) -> String {
    [
        (flags.create, 'C'),
        (flags.start, 'S'),
        (flags.retrieve, 'R'),
    ]
    .iter()
    .map(|&(on, c)| if on { c } else { ' ' })
    .collect()
}

pub fn hyperlink(link: &Link) -> String {
    format!("<a href=\"{}\">{}</a>", link.url, link.name)
}

pub fn link(link: &Link, target: RenderTarget) -> String {
    match target {
        RenderTarget::Markup => hyperlink(link),
        RenderTarget::Plain => link.name.clone(),
    }
}

pub fn datetime(ts: Option<&Timestamp>) -> String {
    datetime_in(ts, &Local)
}

pub fn datetime_in<Tz>(ts: Option<&Timestamp>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match ts {
        Some(ts) => ts.with_timezone(tz).format(DATETIME_FORMAT).to_string(),
        None => PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset, Utc};

    use super::*;

    #[test]
    fn automation_keeps_positions() {
        let flags = Automation {
            create: true,
            start: false,
            retrieve: true,
        };
        assert_eq!(automation(&flags), "C R");
        assert_eq!(automation(&Automation::default()), "   ");
        assert_eq!(
            automation(&Automation {
                create: false,
                start: true,
                retrieve: false
            }),
            " S "
        );
    }

    #[test]
    fn hyperlink_embeds_fields_verbatim() {
        let link = Link {
            url: "http://h/scan/4/".into(),
            name: "a &amp; b".into(),
        };
        assert_eq!(hyperlink(&link), "<a href=\"http://h/scan/4/\">a &amp; b</a>");
        assert_eq!(self::link(&link, RenderTarget::Plain), "a &amp; b");
    }

    #[test]
    fn datetime_placeholder_for_none() {
        assert_eq!(datetime(None), "-");
        assert_eq!(datetime_in(None, &Utc), "-");
    }

    #[test]
    fn datetime_zero_pads() {
        let ts: DateTime<FixedOffset> = DateTime::parse_from_rfc3339("2024-03-05T07:08:09.999Z").unwrap();
        assert_eq!(datetime_in(Some(&ts), &Utc), "2024-03-05 07:08:09");

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(datetime_in(Some(&ts), &plus_two), "2024-03-05 09:08:09");
    }
}
