use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use gtfs::{files, Calendar, EntityError, ErrorKind};

use super::Copier;
use crate::result::SkipReason;

impl<'a> Copier<'a> {
    pub(super) fn copy_services(&mut self) {
        let mut calendar_services = BTreeSet::new();
        if let Some(calendars) = self.read(files::CALENDAR, |r| r.calendars()) {
            for calendar in calendars {
                calendar_services.insert(calendar.service_id.clone());
                self.copy_entity(calendar);
            }
        }

        // Services only described by calendar_dates.txt, with the range of dates they cover
        let mut orphans: BTreeMap<String, (NaiveDate, NaiveDate)> = BTreeMap::new();
        if let Some(dates) = self.read(files::CALENDAR_DATES, |r| r.calendar_dates()) {
            for date in dates {
                if calendar_services.contains(&date.service_id) {
                    continue;
                }
                let range = orphans
                    .entry(date.service_id.clone())
                    .or_insert((date.date, date.date));
                range.0 = range.0.min(date.date);
                range.1 = range.1.max(date.date);
            }
        }
        for (service_id, (start, end)) in orphans {
            if !self.marker.is_marked(files::CALENDAR, &service_id) {
                continue;
            }
            if self.options.normalize_service_ids {
                self.write_generated(Calendar::from_dates(&service_id, start, end).into());
            } else if let Err(err) = self
                .entity_map
                .set(files::CALENDAR, &service_id, &service_id)
            {
                error!("{err}");
            }
        }

        let Some(dates) = self.read(files::CALENDAR_DATES, |r| r.calendar_dates()) else {
            return;
        };
        let mut copied = HashSet::new();
        for date in dates {
            let key = (date.service_id.clone(), date.date);
            if copied.contains(&key) {
                self.result.add_error(
                    EntityError::new(ErrorKind::DuplicateId)
                        .field("date")
                        .value(date.date.format("%Y%m%d"))
                        .in_entity(files::CALENDAR_DATES, &date.service_id),
                );
                self.result.add_skipped(files::CALENDAR_DATES, SkipReason::Duplicate);
                continue;
            }
            if self.copy_entity(date).is_some() {
                copied.insert(key);
            }
        }
        info!(
            "Copied {} calendars and {} calendar dates",
            self.result.written(files::CALENDAR),
            self.result.written(files::CALENDAR_DATES)
        );
    }
}
