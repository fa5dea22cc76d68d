//! Database query functions organized by domain.

pub mod documents;
