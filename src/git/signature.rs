use std::fmt;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::Serialize;

use crate::error::{GitError, Result};

/// Author, committer or tagger identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    /// Parses `Name <email> 1700000000 +0100`, the form used in commit
    /// headers and by `for-each-ref --format=%(creator)`.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let open = line
            .find('<')
            .ok_or_else(|| GitError::Parse(format!("signature without email: {line:?}")))?;
        let close = line[open..]
            .find('>')
            .map(|i| open + i)
            .ok_or_else(|| GitError::Parse(format!("unterminated email: {line:?}")))?;

        let name = line[..open].trim().to_string();
        let email = line[open + 1..close].to_string();
        let mut rest = line[close + 1..].split_whitespace();

        let when = match (rest.next(), rest.next()) {
            (Some(secs), tz) => {
                let secs: i64 = secs
                    .parse()
                    .map_err(|_| GitError::Parse(format!("bad timestamp in {line:?}")))?;
                let offset = tz.map(parse_offset).transpose()?.unwrap_or(0);
                time_at(secs, offset)?
            }
            (None, _) => time_at(0, 0)?,
        };

        Ok(Signature { name, email, when })
    }

    pub fn from_git2(sig: &git2::Signature<'_>) -> Result<Self> {
        let time = sig.when();
        Ok(Signature {
            name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
            email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
            when: time_at(time.seconds(), time.offset_minutes() * 60)?,
        })
    }

    pub fn timestamp(&self) -> i64 {
        self.when.timestamp()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.when.timestamp(),
            self.when.format("%z")
        )
    }
}

/// `+0130` → 5400 seconds.
fn parse_offset(tz: &str) -> Result<i32> {
    let bad = || GitError::Parse(format!("bad timezone {tz:?}"));
    let (sign, digits) = match tz.split_at_checked(1) {
        Some(("+", d)) => (1, d),
        Some(("-", d)) => (-1, d),
        _ => return Err(bad()),
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| bad())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| bad())?;
    Ok(sign * (hours * 3600 + minutes * 60))
}

fn time_at(secs: i64, offset_secs: i32) -> Result<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(offset_secs)
        .ok_or_else(|| GitError::Parse(format!("timezone offset out of range: {offset_secs}")))?;
    let utc = Utc
        .timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| GitError::Parse(format!("timestamp out of range: {secs}")))?;
    Ok(utc.with_timezone(&offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commit_line() {
        let sig = Signature::parse("Jane Doe <jane@example.com> 1700000000 +0130").unwrap();
        assert_eq!(sig.name, "Jane Doe");
        assert_eq!(sig.email, "jane@example.com");
        assert_eq!(sig.timestamp(), 1_700_000_000);
        assert_eq!(sig.when.offset().local_minus_utc(), 5400);
        assert_eq!(sig.to_string(), "Jane Doe <jane@example.com> 1700000000 +0130");
    }

    #[test]
    fn negative_offset_and_empty_name() {
        let sig = Signature::parse("<bot@ci> 10 -0800").unwrap();
        assert_eq!(sig.name, "");
        assert_eq!(sig.when.offset().local_minus_utc(), -8 * 3600);
    }

    #[test]
    fn rejects_missing_email() {
        assert!(Signature::parse("Jane 1700000000 +0000").is_err());
        assert!(Signature::parse("Jane <jane 1700000000 +0000").is_err());
        assert!(Signature::parse("Jane <j@x> soon +0000").is_err());
    }
}
