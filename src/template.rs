//! Archive file naming.
//!
//! Archive names come from a format string with the placeholders
//! `{fileName}`, `{number}`, `{dateTime}` and `{extension}`. The same format
//! is also compiled into a [`Regex`] so that archives produced earlier (by
//! this process or a previous one) can be found again on disk.

use {
    crate::{archive::Compression, SinkError},
    chrono::{DateTime, FixedOffset},
    regex::Regex,
};

/// The format used when none is configured.
pub const DEFAULT_ARCHIVE_NAME_FORMAT: &str = "{fileName}-{dateTime}.{extension}";

/// `chrono` format of the `{dateTime}` placeholder, e.g. `2019-01-16__17-04-40`.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d__%H-%M-%S";

const DATE_TIME_PATTERN: &str = r"\d{4}-\d{2}-\d{2}__\d{2}-\d{2}-\d{2}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    FileName,
    Number,
    DateTime,
    Extension,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "fileName" => Some(Placeholder::FileName),
            "number" => Some(Placeholder::Number),
            "dateTime" => Some(Placeholder::DateTime),
            "extension" => Some(Placeholder::Extension),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder(Placeholder),
}

/// Split a format into literal text and recognized placeholders.
/// Unknown `{...}` groups and unbalanced braces stay literal.
fn segments(format: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;
    while let Some(offset) = format[pos..].find('{') {
        let open = pos + offset;
        let rest = &format[open + 1..];
        let Some(close) = rest.find('}') else {
            break;
        };
        let name = &rest[..close];
        if name.contains('{') {
            // Restart from the inner brace.
            pos = open + 1;
            continue;
        }
        match Placeholder::from_name(name) {
            Some(placeholder) => {
                if literal_start < open {
                    segments.push(Segment::Literal(&format[literal_start..open]));
                }
                segments.push(Segment::Placeholder(placeholder));
                pos = open + 1 + close + 1;
                literal_start = pos;
            }
            None => pos = open + 1 + close + 1,
        }
    }
    if literal_start < format.len() {
        segments.push(Segment::Literal(&format[literal_start..]));
    }
    segments
}

/// Render an archive file name.
///
/// # Arguments
/// * `format` - The name format, e.g. `{fileName}-{dateTime}.{extension}`.
/// * `file_name` - The live file's name without its extension.
/// * `extension` - The live file's extension without the leading dot.
/// * `number` - The sequence number of this rotation.
/// * `timestamp` - The time of this rotation.
/// * `compression` - When set, the codec's extension is appended (`.zip`,
///   `.gz`, `.xz`), whatever `{extension}` resolved to.
///
/// # Returns
/// The rendered name. Placeholders are substituted in one pass, so values that
/// themselves look like placeholders are not expanded again.
///
/// # Example
/// ```
/// use chrono::{FixedOffset, TimeZone};
/// use filelog_rotator::{render_archive_name, Compression};
///
/// let at = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2019, 1, 16, 17, 4, 40).unwrap();
/// let name = render_archive_name("{fileName}-{dateTime}.{extension}", "app", "log", 1, &at, None);
/// assert_eq!(name, "app-2019-01-16__17-04-40.log");
/// let zipped = render_archive_name("{fileName}-{dateTime}.{extension}", "app", "log", 1, &at, Some(&Compression::Zip));
/// assert_eq!(zipped, "app-2019-01-16__17-04-40.log.zip");
/// ```
pub fn render_archive_name(
    format: &str,
    file_name: &str,
    extension: &str,
    number: u64,
    timestamp: &DateTime<FixedOffset>,
    compression: Option<&Compression>,
) -> String {
    let mut rendered = String::with_capacity(format.len() + file_name.len() + 24);
    for segment in segments(format) {
        match segment {
            Segment::Literal(text) => rendered.push_str(text),
            Segment::Placeholder(Placeholder::FileName) => rendered.push_str(file_name),
            Segment::Placeholder(Placeholder::Number) => rendered.push_str(&number.to_string()),
            Segment::Placeholder(Placeholder::DateTime) => {
                rendered.push_str(&timestamp.format(DATE_TIME_FORMAT).to_string())
            }
            Segment::Placeholder(Placeholder::Extension) => rendered.push_str(extension),
        }
    }
    if let Some(compression) = compression {
        rendered.push('.');
        rendered.push_str(compression.get_extension());
    }
    rendered
}

/// Build a regex matching every name [`render_archive_name`] can produce for
/// this format and live file. The first `{number}` is captured as `number`.
pub fn archive_pattern(
    format: &str,
    file_name: &str,
    extension: &str,
    compression: Option<&Compression>,
) -> Result<Regex, SinkError> {
    let mut pattern = String::from("^");
    let mut captured = false;
    for segment in segments(format) {
        match segment {
            Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
            Segment::Placeholder(Placeholder::FileName) => pattern.push_str(&regex::escape(file_name)),
            Segment::Placeholder(Placeholder::Extension) => pattern.push_str(&regex::escape(extension)),
            Segment::Placeholder(Placeholder::DateTime) => pattern.push_str(DATE_TIME_PATTERN),
            Segment::Placeholder(Placeholder::Number) if !captured => {
                captured = true;
                pattern.push_str(r"(?P<number>\d+)");
            }
            Segment::Placeholder(Placeholder::Number) => pattern.push_str(r"\d+"),
        }
    }
    if let Some(compression) = compression {
        pattern.push_str(&regex::escape(&format!(".{}", compression.get_extension())));
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|err| SinkError::InvalidArchivePattern {
        format: format.to_string(),
        error: err.to_string(),
    })
}

/// Whether the format renders a different name for every sequence number.
pub fn has_number_placeholder(format: &str) -> bool {
    segments(format)
        .iter()
        .any(|segment| *segment == Segment::Placeholder(Placeholder::Number))
}
