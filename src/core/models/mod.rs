pub mod data;
pub mod features;
pub mod items;
pub mod key;
pub mod messages;
pub mod operations;
pub mod private_key;
pub mod public_key;
pub mod public_keys;
pub mod task;
