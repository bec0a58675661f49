//! # herald-store
//!
//! SQLite-backed persistence for Herald.

pub mod store;

pub use store::{
    Campaign, Category, CategoryFilters, Contact, ContactStats, NewContact, SessionRecord, Store,
};
