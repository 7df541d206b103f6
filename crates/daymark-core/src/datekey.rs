use std::fmt;
use std::str::FromStr;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  NaiveDate,
  TimeZone,
  Utc
};
use serde::{
  Deserialize,
  Deserializer,
  Serialize,
  Serializer
};

use crate::datetime::project_timezone;

/// Canonical `YYYY-MM-DD` key for a local calendar day.
///
/// Built from the year/month/day fields of whatever value it is given,
/// so a zoned timestamp keys to the day it falls on in its own zone.
/// Every date key in the workspace goes through this type.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub struct DateKey(String);

impl DateKey {
  #[must_use]
  pub fn from_date<D: Datelike>(
    date: &D
  ) -> Self {
    Self(format!(
      "{:04}-{:02}-{:02}",
      date.year(),
      date.month(),
      date.day()
    ))
  }

  /// Keys an instant by the day it falls on in `tz`.
  #[must_use]
  pub fn from_instant_in<Tz: TimeZone>(
    instant: DateTime<Utc>,
    tz: &Tz
  ) -> Self {
    Self::from_date(
      &instant.with_timezone(tz)
    )
  }

  /// Keys an instant in the configured project timezone.
  #[must_use]
  pub fn from_instant(
    instant: DateTime<Utc>
  ) -> Self {
    Self::from_instant_in(
      instant,
      project_timezone()
    )
  }

  #[must_use]
  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The calendar date this key names.
  pub fn to_date(
    &self
  ) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(
      &self.0, "%Y-%m-%d"
    )
    .with_context(|| {
      format!(
        "date key is not a valid \
         date: {}",
        self.0
      )
    })
  }
}

impl fmt::Display for DateKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl FromStr for DateKey {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
      return Err(anyhow!(
        "date key cannot be empty"
      ));
    }
    let date = NaiveDate::parse_from_str(
      trimmed, "%Y-%m-%d"
    )
    .with_context(|| {
      format!(
        "expected YYYY-MM-DD, got: \
         {trimmed}"
      )
    })?;
    Ok(Self::from_date(&date))
  }
}

impl From<NaiveDate> for DateKey {
  fn from(date: NaiveDate) -> Self {
    Self::from_date(&date)
  }
}

impl Serialize for DateKey {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(&self.0)
  }
}

impl<'de> Deserialize<'de> for DateKey {
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw =
      String::deserialize(deserializer)?;
    raw
      .parse::<DateKey>()
      .map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    FixedOffset,
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::DateKey;

  #[test]
  fn keys_are_zero_padded() {
    let date =
      NaiveDate::from_ymd_opt(2025, 3, 7)
        .expect("valid date");
    assert_eq!(
      DateKey::from_date(&date).as_str(),
      "2025-03-07"
    );
  }

  #[test]
  fn time_of_day_never_changes_the_key()
  {
    let date =
      NaiveDate::from_ymd_opt(
        2025, 10, 9
      )
      .expect("valid date");
    let expected =
      DateKey::from_date(&date);
    for (h, m, s) in [
      (0, 0, 0),
      (0, 0, 1),
      (12, 30, 0),
      (23, 59, 59)
    ] {
      let dt = date
        .and_hms_opt(h, m, s)
        .expect("valid time");
      assert_eq!(
        DateKey::from_date(&dt),
        expected
      );
    }
  }

  #[test]
  fn zoned_instants_key_by_local_day() {
    let seoul =
      FixedOffset::east_opt(9 * 3600)
        .expect("valid offset");
    // 2025-10-09 20:30 UTC is already the 10th in Seoul.
    let instant = Utc
      .with_ymd_and_hms(
        2025, 10, 9, 20, 30, 0
      )
      .single()
      .expect("valid instant");
    assert_eq!(
      DateKey::from_instant_in(
        instant, &seoul
      )
      .as_str(),
      "2025-10-10"
    );
    assert_eq!(
      DateKey::from_instant_in(
        instant, &Utc
      )
      .as_str(),
      "2025-10-09"
    );
  }

  #[test]
  fn parse_then_rekey_is_stable() {
    let key: DateKey = "2024-02-29"
      .parse()
      .expect("parse key");
    let date =
      key.to_date().expect("to date");
    assert_eq!(
      DateKey::from_date(&date),
      key
    );
    assert_eq!(
      key.to_string(),
      "2024-02-29"
    );
  }

  #[test]
  fn rejects_malformed_keys() {
    assert!(
      "2025-02-30"
        .parse::<DateKey>()
        .is_err()
    );
    assert!(
      "10/09/2025"
        .parse::<DateKey>()
        .is_err()
    );
    assert!(
      "".parse::<DateKey>().is_err()
    );
  }

  #[test]
  fn serializes_as_plain_string() {
    let key: DateKey = "2025-10-09"
      .parse()
      .expect("parse key");
    let json = serde_json::to_string(&key)
      .expect("serialize");
    assert_eq!(json, "\"2025-10-09\"");
    let back: DateKey =
      serde_json::from_str(&json)
        .expect("deserialize");
    assert_eq!(back, key);
  }
}
