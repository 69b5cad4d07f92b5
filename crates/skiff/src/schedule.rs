//! ISO-8601 repeating interval schedules as accepted by Chronos.
//!
//! A schedule looks like `R<n>/<start>/<period>`, e.g. `R1//PT30M` to run
//! once right away or `R1/2017-08-15T00:00:00Z/PT30M` to run once at a
//! given time.

use chrono::DateTime;
use lazy_static::lazy_static;
use regex::Regex;

use crate::{Error, Result};

/// Run once, as soon as the scheduler picks the job up.
pub const RUN_ONCE: &str = "R1//PT30M";

lazy_static! {
    static ref REPEAT: Regex = Regex::new(r"^R\d*$").expect("valid repeat pattern");
    static ref PERIOD: Regex = Regex::new(
        r"^P(?:\d+Y)?(?:\d+M)?(?:\d+W)?(?:\d+D)?(?:T(?:\d+H)?(?:\d+M)?(?:\d+(?:\.\d+)?S)?)?$"
    )
    .expect("valid period pattern");
}

pub fn validate_schedule(schedule: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Error::Validation(format!("invalid schedule '{}': {}", schedule, reason))
    };

    let parts: Vec<&str> = schedule.split('/').collect();
    if parts.len() != 3 {
        return Err(invalid("expected R<n>/<start>/<period>"));
    }

    let (repeat, start, period) = (parts[0], parts[1], parts[2]);

    if !REPEAT.is_match(repeat) {
        return Err(invalid("repeat must look like R or R<count>"));
    }

    if !start.is_empty() && DateTime::parse_from_rfc3339(start).is_err() {
        return Err(invalid("start must be empty or an RFC 3339 timestamp"));
    }

    // "P" and "PT" alone match the pattern but carry no duration
    if !PERIOD.is_match(period) || period == "P" || period.ends_with('T') {
        return Err(invalid("period must be an ISO-8601 duration such as PT30M"));
    }

    Ok(())
}
