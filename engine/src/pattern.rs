//! Filename timestamp patterns.
//!
//! A pattern is a template such as `%Y%m%d%H*.mpl.gz` that mixes literal text,
//! date placeholders and glob wildcards. It is used in both directions:
//! rendered with a timestamp it yields a glob for candidate lookup, and
//! matched against an existing filename it recovers the encoded timestamp.
//!
//! Supported placeholders:
//! - `%Y` four digit year
//! - `%m` two digit month
//! - `%d` two digit day of month
//! - `%j` three digit day of year
//! - `%H` two digit hour
//! - `%%` a literal percent sign
//!
//! `*` matches any run of characters and `?` exactly one.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::TimeUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Year,
    Month,
    Day,
    DayOfYear,
    Hour,
}

impl Field {
    fn width(&self) -> usize {
        match self {
            Field::Year => 4,
            Field::DayOfYear => 3,
            Field::Month | Field::Day | Field::Hour => 2,
        }
    }

    fn unit(&self) -> TimeUnit {
        match self {
            Field::Year => TimeUnit::Year,
            Field::Month => TimeUnit::Month,
            Field::Day | Field::DayOfYear => TimeUnit::Day,
            Field::Hour => TimeUnit::Hour,
        }
    }

    fn render(&self, t: &NaiveDateTime) -> String {
        match self {
            Field::Year => format!("{:04}", t.year()),
            Field::Month => format!("{:02}", t.month()),
            Field::Day => format!("{:02}", t.day()),
            Field::DayOfYear => format!("{:03}", t.ordinal()),
            Field::Hour => format!("{:02}", t.hour()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Field(Field),
    AnyRun,
    AnyChar,
}

/// Field values collected while matching a filename.
#[derive(Debug, Clone, Copy, Default)]
struct Parsed {
    year: Option<u32>,
    month: Option<u32>,
    day: Option<u32>,
    day_of_year: Option<u32>,
    hour: Option<u32>,
}

impl Parsed {
    fn slot(&mut self, field: Field) -> &mut Option<u32> {
        match field {
            Field::Year => &mut self.year,
            Field::Month => &mut self.month,
            Field::Day => &mut self.day,
            Field::DayOfYear => &mut self.day_of_year,
            Field::Hour => &mut self.hour,
        }
    }

    fn to_timestamp(self) -> Option<NaiveDateTime> {
        let year = self.year? as i32;
        let date = match self.day_of_year {
            Some(doy) => {
                let date = NaiveDate::from_yo_opt(year, doy)?;
                if self.month.is_some_and(|m| m != date.month())
                    || self.day.is_some_and(|d| d != date.day())
                {
                    return None;
                }
                date
            }
            None => NaiveDate::from_ymd_opt(year, self.month.unwrap_or(1), self.day.unwrap_or(1))?,
        };
        date.and_hms_opt(self.hour.unwrap_or(0), 0, 0)
    }
}

/// A filename template with embedded date placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileTimestampPattern {
    template: String,
    tokens: Vec<Token>,
}

impl FileTimestampPattern {
    /// Tokenise and validate a template.
    pub fn parse(template: &str) -> Result<Self, EngineError> {
        let invalid = |reason: &str| EngineError::InvalidPattern {
            pattern: template.to_string(),
            reason: reason.to_string(),
        };

        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            let token = match c {
                '%' => match chars.next() {
                    Some('Y') => Token::Field(Field::Year),
                    Some('m') => Token::Field(Field::Month),
                    Some('d') => Token::Field(Field::Day),
                    Some('j') => Token::Field(Field::DayOfYear),
                    Some('H') => Token::Field(Field::Hour),
                    Some('%') => {
                        literal.push('%');
                        continue;
                    }
                    Some(other) => return Err(invalid(&format!("unsupported directive %{}", other))),
                    None => return Err(invalid("dangling '%' at end of pattern")),
                },
                '*' => {
                    // Consecutive stars behave like one
                    if literal.is_empty() && tokens.last() == Some(&Token::AnyRun) {
                        continue;
                    }
                    Token::AnyRun
                }
                '?' => Token::AnyChar,
                '/' | '\\' => return Err(invalid("patterns describe bare filenames, not paths")),
                other => {
                    literal.push(other);
                    continue;
                }
            };
            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(token);
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        if !tokens.iter().any(|t| matches!(t, Token::Field(_))) {
            return Err(invalid("pattern has no date placeholders"));
        }
        if !tokens.iter().any(|t| matches!(t, Token::Field(Field::Year))) {
            return Err(invalid("pattern must encode the year (%Y)"));
        }

        Ok(FileTimestampPattern {
            template: template.to_string(),
            tokens,
        })
    }

    /// Pattern for raw MPL files: `%Y%m%d%H*.mpl.gz`.
    pub fn mpl() -> Self {
        FileTimestampPattern {
            template: "%Y%m%d%H*.mpl.gz".to_string(),
            tokens: vec![
                Token::Field(Field::Year),
                Token::Field(Field::Month),
                Token::Field(Field::Day),
                Token::Field(Field::Hour),
                Token::AnyRun,
                Token::Literal(".mpl.gz".to_string()),
            ],
        }
    }

    /// Pattern for MMCR moment files, which use the Julian day: `%Y%j%H*MMCRMom.nc.zip`.
    pub fn mmcr() -> Self {
        FileTimestampPattern {
            template: "%Y%j%H*MMCRMom.nc.zip".to_string(),
            tokens: vec![
                Token::Field(Field::Year),
                Token::Field(Field::DayOfYear),
                Token::Field(Field::Hour),
                Token::AnyRun,
                Token::Literal("MMCRMom.nc.zip".to_string()),
            ],
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// The finest calendar unit any placeholder encodes.
    pub fn finest_unit(&self) -> TimeUnit {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Field(f) => Some(f.unit()),
                _ => None,
            })
            .max()
            .unwrap_or(TimeUnit::Year)
    }

    /// Render the pattern for `t` as a glob expression.
    ///
    /// Literal text is escaped so that glob metacharacters in it only match
    /// themselves; wildcards are kept as wildcards.
    pub fn render(&self, t: &NaiveDateTime) -> String {
        let mut out = String::with_capacity(self.template.len() + 8);
        for token in &self.tokens {
            match token {
                Token::Literal(s) => out.push_str(&globset::escape(s)),
                Token::Field(f) => out.push_str(&f.render(t)),
                Token::AnyRun => out.push('*'),
                Token::AnyChar => out.push('?'),
            }
        }
        out
    }

    /// Recover the timestamp encoded in `filename`.
    ///
    /// Units the pattern does not encode default to their start (January,
    /// day 1, hour 0). Returns `None` when the name does not fit the pattern
    /// or the encoded fields do not form a real date.
    pub fn timestamp_of(&self, filename: &str) -> Option<NaiveDateTime> {
        let chars: Vec<char> = filename.chars().collect();
        match_tokens(&self.tokens, &chars, Parsed::default())?.to_timestamp()
    }
}

fn match_tokens(tokens: &[Token], s: &[char], parsed: Parsed) -> Option<Parsed> {
    let Some((token, rest)) = tokens.split_first() else {
        return s.is_empty().then_some(parsed);
    };

    match token {
        Token::Literal(lit) => {
            let n = lit.chars().count();
            if s.len() < n || !s[..n].iter().copied().eq(lit.chars()) {
                return None;
            }
            match_tokens(rest, &s[n..], parsed)
        }
        Token::AnyChar => {
            if s.is_empty() {
                return None;
            }
            match_tokens(rest, &s[1..], parsed)
        }
        Token::AnyRun => (0..=s.len()).find_map(|i| match_tokens(rest, &s[i..], parsed)),
        Token::Field(field) => {
            let width = field.width();
            if s.len() < width || !s[..width].iter().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let value = s[..width]
                .iter()
                .fold(0u32, |acc, c| acc * 10 + c.to_digit(10).unwrap_or(0));

            let mut parsed = parsed;
            let slot = parsed.slot(*field);
            // A placeholder repeated in the template must carry the same value
            if slot.is_some_and(|v| v != value) {
                return None;
            }
            *slot = Some(value);
            match_tokens(rest, &s[width..], parsed)
        }
    }
}

impl fmt::Display for FileTimestampPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.template)
    }
}

impl FromStr for FileTimestampPattern {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FileTimestampPattern {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<FileTimestampPattern> for String {
    fn from(p: FileTimestampPattern) -> String {
        p.template
    }
}
