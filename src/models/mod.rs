pub mod booking;
pub mod catalog;
pub mod staff;

pub use booking::{Booking, BookingStatus};
pub use catalog::{Category, Customer, Service};
pub use staff::StaffMember;
