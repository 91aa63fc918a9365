pub mod car;
mod file;
mod model;

pub use car::{valid_car_id, Car, Status};
pub use file::FileStore;
pub use model::ID;
