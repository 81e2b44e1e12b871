//! Database query functions organized by table.

pub mod events;
pub mod index;
pub mod settings;
