pub mod admin;
pub mod bookings;
pub mod jobs;
pub mod users;
