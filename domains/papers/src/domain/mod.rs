//! Domain types for the Papers domain

pub mod entities;
