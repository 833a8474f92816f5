//! # Data Models
//!
//! SeaORM entity models for provider configuration rows, authenticated users,
//! their provider lookup bindings and local (builtin) credentials.

pub mod auth_provider_row;
pub mod authenticated_user;
pub mod builtin_user;
pub mod user_lookup;

pub use auth_provider_row::Entity as AuthProviderRow;
pub use authenticated_user::Entity as AuthenticatedUser;
pub use builtin_user::Entity as BuiltinUser;
pub use user_lookup::Entity as UserLookup;
