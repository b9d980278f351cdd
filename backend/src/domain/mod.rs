//! # Domain Module
//!
//! Business logic for Mirror: the entity store, the derived-state
//! calculations, the calendar, and form validation.
//!
//! The calculation, date and money modules are pure; only [`MirrorStore`]
//! touches persistence, and it does so through the storage layer.

pub mod calculations;
pub mod calendar;
pub mod dates;
pub mod errors;
pub mod mirror_store;
pub mod money;
pub mod validation;

pub use calendar::CalendarService;
pub use dates::{Clock, FixedClock, SystemClock};
pub use errors::StoreError;
pub use mirror_store::MirrorStore;
pub use validation::{BillValidationError, IncomeValidationError, SavingsValidationError};
