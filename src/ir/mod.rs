pub mod assembly;
pub mod tacky;
pub mod value;
