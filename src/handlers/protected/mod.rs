pub mod collections;
pub mod content;
pub mod fields;
pub mod notifications;
pub mod organizations;
pub mod profile;
pub mod resources;
pub mod session;
pub mod users;
