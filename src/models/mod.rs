pub mod appointment;
pub mod enums;
pub mod lenient;

pub use appointment::*;
pub use enums::*;
