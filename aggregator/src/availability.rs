//! Date-range capacity evaluation.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::protocol::{CapacityDay, StayWindow};

/// Checks whether a facility has enough free beds for every night of the
/// requested window.
///
/// Builds a date keyed lookup over the records (the last record wins when the
/// upstream repeats a date) and walks every calendar day from `window.start`
/// through `window.end` inclusive. A day that is missing from the records, or
/// that offers fewer beds than requested, makes the whole window unavailable.
///
/// Pure function: identical inputs always produce identical output.
pub fn is_available(records: &[CapacityDay], window: &StayWindow) -> bool {
    let mut beds_by_date: HashMap<NaiveDate, i64> = HashMap::with_capacity(records.len());
    for record in records {
        beds_by_date.insert(record.date.date_naive(), record.free_beds);
    }

    let mut day = window.start;
    loop {
        match beds_by_date.get(&day) {
            Some(&beds) if beds >= i64::from(window.required_beds) => {}
            _ => return false,
        }
        if day == window.end {
            return true;
        }
        let Some(next) = day.succ_opt() else {
            return false;
        };
        day = next;
    }
}
