pub mod calendar;
pub mod core;
pub mod schedule;
pub mod school_years;
pub mod sections;
pub mod subjects;
pub mod teachers;
