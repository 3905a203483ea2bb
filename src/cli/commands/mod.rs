pub mod key;
pub mod new_key;
pub mod open;
pub mod report;
pub mod session;
