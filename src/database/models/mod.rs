pub mod collection;
pub mod content;
pub mod field;
pub mod organization;
pub mod resource;
pub mod user;

pub use collection::{Collection, NewCollection};
pub use content::{validate_payload, ContentItem, FieldValue};
pub use field::{Field, FieldOption, FieldType, NewField};
pub use organization::{Organization, OrganizationMember};
pub use resource::{writable_columns, Blog, Contact, FixedResource, Lead, Task};
pub use user::User;
