//! Validity period and timestamp handling

use der::asn1::{GeneralizedTime, UtcTime};
use der::{Choice, DateTime, Sequence};

use crate::error::{Error, ErrorKind};

/// First year that must be encoded as GeneralizedTime (RFC 5280 §4.1.2.5).
const GENERALIZED_TIME_FROM: u16 = 2050;

/// X.509 `Time` as defined in [RFC 5280 Section 4.1.2.5].
///
/// ```text
/// Time ::= CHOICE {
///      utcTime        UTCTime,
///      generalTime    GeneralizedTime }
/// ```
///
/// [RFC 5280 Section 4.1.2.5]: https://datatracker.ietf.org/doc/html/rfc5280#section-4.1.2.5
#[derive(Choice, Copy, Clone, Debug, Eq, PartialEq)]
pub enum Time {
    #[asn1(type = "UTCTime")]
    UtcTime(UtcTime),

    #[asn1(type = "GeneralizedTime")]
    GeneralTime(GeneralizedTime),
}

impl Time {
    /// Picks UTCTime up to 2049 and GeneralizedTime afterwards.
    pub fn from_date_time(date_time: DateTime) -> Result<Self, Error> {
        if date_time.year() >= GENERALIZED_TIME_FROM {
            Ok(Time::GeneralTime(GeneralizedTime::from_date_time(
                date_time,
            )))
        } else {
            Ok(Time::UtcTime(UtcTime::from_date_time(date_time)?))
        }
    }

    pub fn to_date_time(&self) -> DateTime {
        match self {
            Time::UtcTime(t) => t.to_date_time(),
            Time::GeneralTime(t) => t.to_date_time(),
        }
    }
}

/// X.509 `Validity` as defined in [RFC 5280 Section 4.1.2.5]
///
/// ```text
/// Validity ::= SEQUENCE {
///     notBefore      Time,
///     notAfter       Time
/// }
/// ```
/// [RFC 5280 Section 4.1.2.5]: https://datatracker.ietf.org/doc/html/rfc5280#section-4.1.2.5
#[derive(Copy, Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Validity {
    /// notBefore value
    pub not_before: Time,

    /// notAfter value
    pub not_after: Time,
}

/// Hour-resolution validity: an issue instant plus a whole number of years.
///
/// The expiry instant shares month, day and hour with the issue instant;
/// minutes and seconds are always zero.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ValidityInfo {
    pub issue_year: u16,
    pub issue_month: u8,
    pub issue_day: u8,
    pub issue_hour: u8,
    pub expire_years: u8,
}

impl ValidityInfo {
    /// Earliest issue year representable by either time encoding.
    pub const MIN_YEAR: u16 = 1970;
    /// Latest year representable by GeneralizedTime.
    pub const MAX_YEAR: u16 = 9999;

    pub fn set_issue_year(&mut self, year: u16) -> Result<(), Error> {
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(ErrorKind::OutOfRange.into());
        }
        self.issue_year = year;
        Ok(())
    }

    pub fn set_issue_month(&mut self, month: u8) -> Result<(), Error> {
        if !(1..=12).contains(&month) {
            return Err(ErrorKind::OutOfRange.into());
        }
        self.issue_month = month;
        Ok(())
    }

    pub fn set_issue_day(&mut self, day: u8) -> Result<(), Error> {
        if !(1..=31).contains(&day) {
            return Err(ErrorKind::OutOfRange.into());
        }
        self.issue_day = day;
        Ok(())
    }

    pub fn set_issue_hour(&mut self, hour: u8) -> Result<(), Error> {
        if hour > 23 {
            return Err(ErrorKind::OutOfRange.into());
        }
        self.issue_hour = hour;
        Ok(())
    }

    pub fn set_expire_years(&mut self, years: u8) -> Result<(), Error> {
        self.expire_years = years;
        Ok(())
    }

    pub fn expire_year(&self) -> u16 {
        self.issue_year + u16::from(self.expire_years)
    }

    pub fn not_before(&self) -> Result<DateTime, Error> {
        self.at_year(self.issue_year)
    }

    pub fn not_after(&self) -> Result<DateTime, Error> {
        self.at_year(self.expire_year())
    }

    fn at_year(&self, year: u16) -> Result<DateTime, Error> {
        if year > Self::MAX_YEAR {
            return Err(ErrorKind::OutOfRange.into());
        }
        Ok(DateTime::new(
            year,
            self.issue_month,
            self.issue_day,
            self.issue_hour,
            0,
            0,
        )?)
    }

    pub fn to_validity(&self) -> Result<Validity, Error> {
        Ok(Validity {
            not_before: Time::from_date_time(self.not_before()?)?,
            not_after: Time::from_date_time(self.not_after()?)?,
        })
    }

    /// Recovers the compact form from a decoded validity period.
    ///
    /// Minutes and seconds of the decoded times are dropped; the expiry
    /// offset is the difference of the two years.
    pub fn from_validity(validity: &Validity) -> Result<Self, Error> {
        let issue = validity.not_before.to_date_time();
        let expire = validity.not_after.to_date_time();

        let expire_years = expire
            .year()
            .checked_sub(issue.year())
            .and_then(|years| u8::try_from(years).ok())
            .ok_or(ErrorKind::OutOfRange)?;

        Ok(Self {
            issue_year: issue.year(),
            issue_month: issue.month(),
            issue_day: issue.day(),
            issue_hour: issue.hour(),
            expire_years,
        })
    }
}
