//! FundTrack Grievance - citizen issue intake
//!
//! Citizens report suspected fund misuse, irregularities, or delays against a
//! scheme. Reports move pending → under-review → resolved/rejected under
//! administrator review. Pure keyed CRUD with filtered listing.

mod error;
mod intake;
mod store;
mod types;

pub use error::GrievanceError;
pub use intake::GrievanceIntake;
pub use store::GrievanceStore;
pub use types::{Grievance, GrievanceCategory, GrievanceFilter, GrievanceStatus, NewGrievance};
