pub mod currency;
pub mod geo;
pub mod schedule;
pub mod text;
