use crate::{
    Agency, Calendar, CalendarDate, EntityError, EntityMap, FareAttribute, FareRule, FeedInfo,
    Frequency, Route, Shape, Stop, StopTime, Transfer, Trip,
};

pub mod files {
    pub const AGENCY: &str = "agency.txt";
    pub const ROUTES: &str = "routes.txt";
    pub const STOPS: &str = "stops.txt";
    pub const TRIPS: &str = "trips.txt";
    pub const STOP_TIMES: &str = "stop_times.txt";
    pub const CALENDAR: &str = "calendar.txt";
    pub const CALENDAR_DATES: &str = "calendar_dates.txt";
    pub const SHAPES: &str = "shapes.txt";
    pub const FREQUENCIES: &str = "frequencies.txt";
    pub const TRANSFERS: &str = "transfers.txt";
    pub const FARE_ATTRIBUTES: &str = "fare_attributes.txt";
    pub const FARE_RULES: &str = "fare_rules.txt";
    pub const FEED_INFO: &str = "feed_info.txt";
}

/// Errors and warnings attached to an entity while it's being processed, on top of whatever its
/// own validation finds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Problems {
    pub errors: Vec<EntityError>,
    pub warnings: Vec<EntityError>,
}

/// One row of one GTFS file.
pub trait Entity {
    fn filename(&self) -> &'static str;

    /// The natural key, or empty for files without one (like stop_times.txt).
    fn entity_id(&self) -> &str;

    fn problems(&self) -> &Problems;
    fn problems_mut(&mut self) -> &mut Problems;

    /// Checks that only need this entity's own fields.
    fn validate(&self) -> Vec<EntityError> {
        Vec::new()
    }

    fn check_warnings(&self) -> Vec<EntityError> {
        Vec::new()
    }

    /// Rewrite every foreign key from its source value to the destination value. Fails on the
    /// first required key that the map doesn't know.
    fn update_keys(&mut self, _emap: &EntityMap) -> Result<(), EntityError> {
        Ok(())
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = self.problems().errors.clone();
        errors.extend(self.validate());
        self.contextualize(errors)
    }

    fn warnings(&self) -> Vec<EntityError> {
        let mut warnings = self.problems().warnings.clone();
        warnings.extend(self.check_warnings());
        self.contextualize(warnings)
    }

    fn add_error(&mut self, err: EntityError) {
        self.problems_mut().errors.push(err);
    }

    fn add_warning(&mut self, err: EntityError) {
        self.problems_mut().warnings.push(err);
    }

    fn contextualize(&self, errors: Vec<EntityError>) -> Vec<EntityError> {
        errors
            .into_iter()
            .map(|err| err.in_entity(self.filename(), self.entity_id()))
            .collect()
    }
}

/// Any entity, so the copier, filters and writers can handle every file kind uniformly.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Agency(Agency),
    Route(Route),
    Stop(Stop),
    Trip(Trip),
    StopTime(StopTime),
    Calendar(Calendar),
    CalendarDate(CalendarDate),
    Shape(Shape),
    Frequency(Frequency),
    Transfer(Transfer),
    FareAttribute(FareAttribute),
    FareRule(FareRule),
    FeedInfo(FeedInfo),
}

macro_rules! dispatch {
    ($self:expr, $x:ident => $body:expr) => {
        match $self {
            Record::Agency($x) => $body,
            Record::Route($x) => $body,
            Record::Stop($x) => $body,
            Record::Trip($x) => $body,
            Record::StopTime($x) => $body,
            Record::Calendar($x) => $body,
            Record::CalendarDate($x) => $body,
            Record::Shape($x) => $body,
            Record::Frequency($x) => $body,
            Record::Transfer($x) => $body,
            Record::FareAttribute($x) => $body,
            Record::FareRule($x) => $body,
            Record::FeedInfo($x) => $body,
        }
    };
}

impl Entity for Record {
    fn filename(&self) -> &'static str {
        dispatch!(self, x => x.filename())
    }

    fn entity_id(&self) -> &str {
        dispatch!(self, x => x.entity_id())
    }

    fn problems(&self) -> &Problems {
        dispatch!(self, x => x.problems())
    }

    fn problems_mut(&mut self) -> &mut Problems {
        dispatch!(self, x => x.problems_mut())
    }

    fn validate(&self) -> Vec<EntityError> {
        dispatch!(self, x => x.validate())
    }

    fn check_warnings(&self) -> Vec<EntityError> {
        dispatch!(self, x => x.check_warnings())
    }

    fn update_keys(&mut self, emap: &EntityMap) -> Result<(), EntityError> {
        dispatch!(self, x => x.update_keys(emap))
    }
}

macro_rules! impl_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Record {
                fn from(x: $variant) -> Self {
                    Record::$variant(x)
                }
            }
        )*
    };
}

impl_from!(
    Agency,
    Route,
    Stop,
    Trip,
    StopTime,
    Calendar,
    CalendarDate,
    Shape,
    Frequency,
    Transfer,
    FareAttribute,
    FareRule,
    FeedInfo
);

/// Implements the bookkeeping half of `Entity`; the per-kind validation lives with each type.
macro_rules! entity_basics {
    ($file:expr, $id:ident) => {
        fn filename(&self) -> &'static str {
            $file
        }

        fn entity_id(&self) -> &str {
            &self.$id
        }

        fn problems(&self) -> &$crate::Problems {
            &self.problems
        }

        fn problems_mut(&mut self) -> &mut $crate::Problems {
            &mut self.problems
        }
    };
    ($file:expr) => {
        fn filename(&self) -> &'static str {
            $file
        }

        fn entity_id(&self) -> &str {
            ""
        }

        fn problems(&self) -> &$crate::Problems {
            &self.problems
        }

        fn problems_mut(&mut self) -> &mut $crate::Problems {
            &mut self.problems
        }
    };
}
pub(crate) use entity_basics;

/// Pushes a required-field error when the field is blank.
pub(crate) fn require(errors: &mut Vec<EntityError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(EntityError::required(field));
    }
}

pub(crate) fn require_optional(errors: &mut Vec<EntityError>, field: &str, value: &Option<String>) {
    require(errors, field, value.as_deref().unwrap_or(""));
}

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|x| x.trim().is_empty()).unwrap_or(true)
}
