pub mod cars;
pub mod playground;
