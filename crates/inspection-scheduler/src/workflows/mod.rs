pub mod inspections;
pub mod rent_roll;
