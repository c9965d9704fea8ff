//! Filename timestamp parsing.
//!
//! Screenshot filenames carry their capture time. Four shapes are recognized,
//! tried in a fixed priority order — the **first** matching pattern wins, even
//! when a later pattern would also match. Priority order (not pattern
//! specificity) is what keeps extraction reproducible when the pattern set
//! changes, so the order is a first-class data structure here, not an
//! accident of code layout.
//!
//! Recognized shapes:
//!
//! 1. `Screenshot_YYYY-MM-DD_HHMMSS[_description].ext`
//! 2. `Screenshot_YYYYMMDD_HHMMSS[_description].ext`
//! 3. `Screenshot_YYYYMMDD-HHMMSS_description.ext`
//! 4. `YYYYMMDD_HHMMSS<suffix digits>.ext` — the suffix (typically
//!    milliseconds) is discarded, never parsed as sub-second precision
//!
//! All numeric groups are decimal; leading zeros are allowed and never
//! trigger octal interpretation. A filename matching no pattern is simply
//! unparsed — callers classify it as unprocessed.

use regex::Regex;
use std::sync::LazyLock;

/// A capture timestamp extracted from a filename, plus the optional
/// free-text description trailing it (underscores become spaces).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStamp {
    pub yyyy: u32,
    pub mm: u32,
    pub dd: u32,
    pub hh: u32,
    pub minute: u32,
    pub second: u32,
    pub description: Option<String>,
}

impl ParsedStamp {
    /// Composite sort key, most significant field first.
    pub fn sort_key(&self) -> (u32, u32, u32, u32, u32, u32) {
        (self.yyyy, self.mm, self.dd, self.hh, self.minute, self.second)
    }
}

/// One recognized filename shape.
struct Pattern {
    /// Short label used in tests and diagnostics.
    name: &'static str,
    regex: Regex,
}

/// The ordered pattern list. Earlier entries win.
///
/// All patterns share one group layout (`y`, `mo`, `d`, `h`, `mi`, `s`,
/// optional `desc`), so a single extractor serves the whole list.
static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        // Screenshot_2024-12-04_170033.jpg
        // Screenshot_2024-12-19_205547_com.ubercab.driver.jpg
        Pattern {
            name: "screenshot-dashed-date",
            regex: Regex::new(
                r"Screenshot_(?P<y>\d{4})-(?P<mo>\d{2})-(?P<d>\d{2})_(?P<h>\d{2})(?P<mi>\d{2})(?P<s>\d{2})(?:_(?P<desc>.+))?\.\w+$",
            )
            .unwrap(),
        },
        // Screenshot_20241204_170033.jpg
        // Screenshot_20241204_170033_Maps.jpg
        Pattern {
            name: "screenshot-compact-date",
            regex: Regex::new(
                r"Screenshot_(?P<y>\d{4})(?P<mo>\d{2})(?P<d>\d{2})_(?P<h>\d{2})(?P<mi>\d{2})(?P<s>\d{2})(?:_(?P<desc>.+))?\.\w+$",
            )
            .unwrap(),
        },
        // Screenshot_20240318-082104_Uber Driver.jpg
        Pattern {
            name: "screenshot-dashed-time",
            regex: Regex::new(
                r"Screenshot_(?P<y>\d{4})(?P<mo>\d{2})(?P<d>\d{2})-(?P<h>\d{2})(?P<mi>\d{2})(?P<s>\d{2})_(?P<desc>.+)\.\w+$",
            )
            .unwrap(),
        },
        // 20240921_135601295.jpeg — trailing digits discarded
        Pattern {
            name: "bare-compact-date",
            regex: Regex::new(
                r"(?P<y>\d{4})(?P<mo>\d{2})(?P<d>\d{2})_(?P<h>\d{2})(?P<mi>\d{2})(?P<s>\d{2})\d*\.\w+$",
            )
            .unwrap(),
        },
    ]
});

/// Parse a capture timestamp out of `file_name`.
///
/// Patterns are tried in priority order; the first match is extracted and
/// returned. `None` means no pattern matched and the file cannot be
/// cataloged.
pub fn parse_timestamp(file_name: &str) -> Option<ParsedStamp> {
    PATTERNS
        .iter()
        .find_map(|pattern| pattern.regex.captures(file_name).map(|caps| extract(&caps)))
}

/// Name of the pattern that would win for `file_name`, if any.
#[cfg(test)]
fn matching_pattern(file_name: &str) -> Option<&'static str> {
    PATTERNS
        .iter()
        .find(|pattern| pattern.regex.is_match(file_name))
        .map(|pattern| pattern.name)
}

fn extract(caps: &regex::Captures<'_>) -> ParsedStamp {
    // Groups are all \d{n}, so parse cannot fail.
    let field = |name: &str| caps.name(name).unwrap().as_str().parse::<u32>().unwrap();
    ParsedStamp {
        yyyy: field("y"),
        mm: field("mo"),
        dd: field("d"),
        hh: field("h"),
        minute: field("mi"),
        second: field("s"),
        description: caps.name("desc").map(|m| m.as_str().replace('_', " ")),
    }
}
