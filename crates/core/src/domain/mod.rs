pub mod appointment;
pub mod contact;
pub mod conversation;
pub mod transcript;
