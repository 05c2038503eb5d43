pub mod availability;
pub mod doctor;
pub mod rating;

pub use availability::{slots_for, AvailabilityService};
pub use doctor::DoctorService;
pub use rating::RatingAggregator;
