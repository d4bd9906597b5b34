//! Hospital receptionist domain: doctor roster, appointment book, the tools
//! the model may call, and the persona it speaks with.

mod directory;
pub mod persona;
pub mod tools;

pub use directory::{Appointment, Directory, Doctor, Slot};
pub use tools::register_tools;
