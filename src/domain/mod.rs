pub mod email;
pub mod persona;
