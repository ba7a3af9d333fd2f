//! Rendering events through `printf`-like templates.
//!
//! | token  | expands to                                              |
//! |--------|---------------------------------------------------------|
//! | `%w`   | path of the watch the event belongs to                  |
//! | `%f`   | name of the entry inside the watched directory          |
//! | `%e`   | event kinds, comma separated                            |
//! | `%Xe`  | event kinds, separated by the character `X`             |
//! | `%T`   | current time in the configured strftime format          |
//! | `%%`   | a literal `%`                                           |
//!
//! Any other `%` sequence is copied unchanged.

use std::{
    error::Error as StdError,
    fmt::{self, Write as _},
    path::Path,
};

use chrono::{
    format::{Item, StrftimeItems},
    Local,
};
use notify_tools_types::RawEvent;

/// Longest template, and largest output bound, accepted by the formatter.
pub const MAX_STRLEN: usize = 4096;

/// Reasons a template can't be rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// The template is empty.
    Empty,

    /// The template or the requested output bound exceeds [`MAX_STRLEN`].
    TooLong(usize),

    /// The template ends in a lone `%`.
    TrailingPercent,

    /// The time format is invalid or renders to nothing.
    Time(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::Empty => f.write_str("empty format template"),
            FormatError::TooLong(len) => {
                write!(f, "format length {len} exceeds the maximum of {MAX_STRLEN}")
            }
            FormatError::TrailingPercent => f.write_str("format template ends with '%'"),
            FormatError::Time(format) => write!(f, "cannot format time with {format:?}"),
        }
    }
}

impl StdError for FormatError {}

/// Renders events through templates, see the [module docs](self) for the tokens.
#[derive(Clone, Debug, Default)]
pub struct EventFormatter {
    time_format: Option<String>,
}

impl EventFormatter {
    /// Creates a formatter without a time format.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the strftime pattern used by `%T`. `None` makes `%T` expand to nothing.
    pub fn set_time_format(&mut self, format: Option<String>) {
        self.time_format = format;
    }

    /// The strftime pattern used by `%T`.
    pub fn time_format(&self) -> Option<&str> {
        self.time_format.as_deref()
    }

    /// Renders `event` into a new string of at most `max_len - 1` characters.
    pub fn render(
        &self,
        watch_path: Option<&Path>,
        event: &RawEvent,
        template: &str,
        max_len: usize,
    ) -> Result<String, FormatError> {
        let mut out = String::new();
        self.render_into(&mut out, watch_path, event, template, max_len)?;
        Ok(out)
    }

    /// Appends the rendering of `event` to `out`.
    ///
    /// At most `max_len - 1` characters are appended. A missing `watch_path` expands to an
    /// empty string. On error `out` may hold a partial rendering.
    pub fn render_into(
        &self,
        out: &mut String,
        watch_path: Option<&Path>,
        event: &RawEvent,
        template: &str,
        max_len: usize,
    ) -> Result<(), FormatError> {
        if template.is_empty() {
            return Err(FormatError::Empty);
        }
        if template.len() > MAX_STRLEN {
            return Err(FormatError::TooLong(template.len()));
        }
        if max_len > MAX_STRLEN {
            return Err(FormatError::TooLong(max_len));
        }

        let start = out.len();
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }

            match chars.next() {
                None => return Err(FormatError::TrailingPercent),
                Some('%') => out.push('%'),
                Some('w') => {
                    if let Some(path) = watch_path {
                        out.push_str(&path.to_string_lossy());
                    }
                }
                Some('f') => {
                    if let Some(name) = &event.name {
                        out.push_str(&name.to_string_lossy());
                    }
                }
                Some('e') => event.mask.render_into(out, ','),
                Some('T') => self.render_time(out)?,
                Some(sep) if chars.peek() == Some(&'e') => {
                    chars.next();
                    event.mask.render_into(out, sep);
                }
                Some(other) => {
                    out.push('%');
                    out.push(other);
                }
            }
        }

        let limit = max_len.saturating_sub(1);
        if let Some((cut, _)) = out[start..].char_indices().nth(limit) {
            out.truncate(start + cut);
        }
        Ok(())
    }

    fn render_time(&self, out: &mut String) -> Result<(), FormatError> {
        let Some(format) = &self.time_format else {
            return Ok(());
        };
        let invalid = || FormatError::Time(format.clone());

        let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(invalid());
        }

        let before = out.len();
        write!(out, "{}", Local::now().format_with_items(items.iter()))
            .map_err(|_| invalid())?;
        if out.len() == before {
            return Err(invalid());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use notify_tools_types::EventMask;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn created_dir() -> RawEvent {
        RawEvent::new(1, EventMask::CREATE | EventMask::ISDIR).set_name("sub")
    }

    fn render(template: &str) -> Result<String, FormatError> {
        let watch_path = Some(Path::new("/tmp/"));
        EventFormatter::new().render(watch_path, &created_dir(), template, MAX_STRLEN)
    }

    #[rustfmt::skip]
    #[rstest]
    #[case("in %w: %e", "in /tmp/: CREATE,ISDIR")]
    #[case("%w%f", "/tmp/sub")]
    #[case("%:e", "CREATE:ISDIR")]
    #[case("% e", "CREATE ISDIR")]
    #[case("100%%", "100%")]
    #[case("%x %q", "%x %q")]
    #[case("%we", "/tmp/e")]
    #[case("%T", "")]
    #[case("plain", "plain")]
    fn tokens(#[case] template: &str, #[case] expected: &str) {
        assert_eq!(render(template), Ok(expected.to_string()));
    }

    #[test]
    fn missing_path_and_name_expand_to_nothing() {
        let event = RawEvent::new(9, EventMask::DELETE_SELF);
        let out = EventFormatter::new().render(None, &event, "[%w][%f] %e", MAX_STRLEN);
        assert_eq!(out, Ok("[][] DELETE_SELF".to_string()));
    }

    #[test]
    fn rejects_bad_templates() {
        assert_eq!(render(""), Err(FormatError::Empty));
        assert_eq!(render("abc%"), Err(FormatError::TrailingPercent));

        let long = "x".repeat(MAX_STRLEN + 1);
        assert_eq!(render(&long), Err(FormatError::TooLong(MAX_STRLEN + 1)));

        let bound = EventFormatter::new().render(None, &created_dir(), "%e", MAX_STRLEN + 1);
        assert_eq!(bound, Err(FormatError::TooLong(MAX_STRLEN + 1)));
    }

    #[test]
    fn output_is_truncated() {
        let formatter = EventFormatter::new();
        let out = formatter.render(Some(Path::new("/tmp/")), &created_dir(), "%w%f", 5);
        assert_eq!(out, Ok("/tmp".to_string()));

        let out = formatter.render(None, &created_dir(), "%e", 1);
        assert_eq!(out, Ok(String::new()));
    }

    #[test]
    fn render_into_appends() {
        let mut out = String::from("> ");
        EventFormatter::new()
            .render_into(&mut out, None, &created_dir(), "%f", 3)
            .unwrap();
        assert_eq!(out, "> su");
    }

    #[test]
    fn time_token_uses_format() {
        let mut formatter = EventFormatter::new();
        formatter.set_time_format(Some("%Y".into()));
        let out = formatter
            .render(None, &created_dir(), "%T", MAX_STRLEN)
            .unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn invalid_or_empty_time_format_fails() {
        let mut formatter = EventFormatter::new();

        formatter.set_time_format(Some("%Q".into()));
        assert_eq!(
            formatter.render(None, &created_dir(), "%T", MAX_STRLEN),
            Err(FormatError::Time("%Q".into()))
        );

        formatter.set_time_format(Some(String::new()));
        assert_eq!(
            formatter.render(None, &created_dir(), "%T", MAX_STRLEN),
            Err(FormatError::Time(String::new()))
        );
    }
}
