use chrono::NaiveDate;
use gtfs_structures::{Exception, Gtfs, Trip};
use log::warn;

use crate::network::Timestamp;

// A fast way to check a buffer is all zeros (https://stackoverflow.com/questions/65367552/how-to-efficiently-check-a-vecu8-to-see-if-its-all-zeros).
pub fn is_zero(buf: &[bool]) -> bool {
    let (prefix, aligned, suffix) = unsafe { buf.align_to::<u128>() };

    prefix.iter().all(|&x| !x)
        && aligned.iter().all(|&x| x == 0)
        && suffix.iter().all(|&x| !x)
}

pub fn does_trip_run(gtfs: &Gtfs, trip: &Trip, date: NaiveDate) -> bool {
    let service_id = trip.service_id.as_str();
    let calendar_dates = gtfs.calendar_dates.get(service_id);
    // An exception on the date overrides the weekly calendar.
    if let Some(exception) = calendar_dates.and_then(|dates| dates.iter().find(|calendar_date| calendar_date.date == date)) {
        return matches!(exception.exception_type, Exception::Added);
    }
    if let Some(calendar) = gtfs.calendar.get(service_id) {
        calendar.valid_weekday(date) && calendar.start_date <= date && date <= calendar.end_date
    } else {
        if calendar_dates.is_none() {
            warn!("Trip {} does not have a valid service_id", trip.id);
        }
        false
    }
}

/// Parses `HH:MM:SS`. Hours may exceed 24 for trips running past midnight.
pub fn parse_time(s: &str) -> Result<Timestamp, gtfs_structures::Error> {
    let invalid = || gtfs_structures::Error::InvalidTime(s.to_owned());
    let mut parts = s.split(':');
    let (Some(hours), Some(minutes), Some(seconds), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    if hours.is_empty() || minutes.len() != 2 || seconds.len() != 2 {
        return Err(invalid());
    }
    let field = |part: &str| part.parse::<Timestamp>().map_err(|_| invalid());
    field(hours)?
        .checked_mul(3600)
        .and_then(|time| time.checked_add(field(minutes).ok()? * 60))
        .and_then(|time| time.checked_add(field(seconds).ok()?))
        .ok_or_else(invalid)
}

pub fn get_time_str(time: Timestamp) -> String {
    format!("{:02}:{:02}:{:02}", time / 3600, time % 3600 / 60, time % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_round_trip_through_strings() {
        assert_eq!(parse_time("08:30:00").unwrap(), 8 * 3600 + 30 * 60);
        assert_eq!(parse_time("25:01:02").unwrap(), 25 * 3600 + 62);
        assert!(parse_time("8:30").is_err());
        assert!(parse_time("08:3:000").is_err());
        assert!(parse_time("08:30:00:00").is_err());
        assert!(parse_time("ab:30:00").is_err());
        assert!(parse_time("2000000:00:00").is_err());
        assert!(parse_time("1193046:28:15").is_ok());
        assert!(parse_time("1193046:28:16").is_err());
        assert_eq!(get_time_str(8 * 3600 + 30 * 60 + 5), "08:30:05");
    }

    #[test]
    fn zero_buffers_are_detected() {
        let mut buf = vec![false; 100];
        assert!(is_zero(&buf));
        buf[77] = true;
        assert!(!is_zero(&buf));
    }
}
