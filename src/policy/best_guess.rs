//! Structural comparison of release names
//!
//! Used when neither the listed order nor release times separate two releases.
//! Snapshot names (`13w16a`) compare by year, week and sub-letter; a snapshot
//! always sorts before a non-snapshot; everything else is tokenised and
//! compared token by token.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static SNAPSHOT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^(\d{2})w(\d{2})([a-z]*)$").expect("snapshot pattern is valid"));

/// Parsed weekly snapshot name such as `13w16a`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Snapshot {
  pub year: u32,
  pub week: u32,
  pub letter: String,
}

impl Snapshot {
  /// Parse a snapshot-shaped release name; two-digit years are 20xx
  pub fn parse(name: &str) -> Option<Self> {
    let caps = SNAPSHOT.captures(name)?;
    Some(Self {
      year: 2000 + caps[1].parse::<u32>().ok()?,
      week: caps[2].parse().ok()?,
      letter: caps[3].to_string(),
    })
  }
}

/// Compare two release names structurally
pub fn compare_names(a: &str, b: &str) -> Ordering {
  match (Snapshot::parse(a), Snapshot::parse(b)) {
    (Some(sa), Some(sb)) => sa.cmp(&sb),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => compare_tokens(a, b),
  }
}

fn tokens(name: &str) -> impl Iterator<Item = &str> {
  name.split([' ', '-', '.', '_'])
}

/// First run of ASCII digits in a token, if any
fn leading_number(token: &str) -> Option<u64> {
  let start = token.find(|c: char| c.is_ascii_digit())?;
  let digits: String = token[start..].chars().take_while(char::is_ascii_digit).collect();
  digits.parse().ok()
}

fn compare_tokens(a: &str, b: &str) -> Ordering {
  let mut left = tokens(a);
  let mut right = tokens(b);

  loop {
    match (left.next(), right.next()) {
      (Some(x), Some(y)) => {
        let by_number = match (leading_number(x), leading_number(y)) {
          (Some(nx), Some(ny)) => nx.cmp(&ny),
          _ => Ordering::Equal,
        };
        let ord = by_number.then_with(|| x.cmp(y));
        if ord != Ordering::Equal {
          return ord;
        }
      }
      (None, Some(_)) => return Ordering::Less,
      (Some(_), None) => return Ordering::Greater,
      (None, None) => return Ordering::Equal,
    }
  }
}
