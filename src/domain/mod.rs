//! Domain model: documents, the credit arithmetic rules and the store port.

pub mod clock;
pub mod history;
pub mod notification;
pub mod order;
pub mod ports;
pub mod product;
pub mod settings;
pub mod user;
