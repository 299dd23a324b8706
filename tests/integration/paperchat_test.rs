//! End-to-end tests for the paperchat library
//!
//! Papers are opened through `Library` on a shared in-memory store (or a file
//! store in a temp directory) with a scripted chat gateway.

#![allow(dead_code)]

mod cache;
mod common;
mod conversations;
mod papers;
mod persistence;
