//! `mimecrypt`: crypto structure detection for MIME messages.
//!
//! This crate locates OpenPGP/MIME and inline PGP content in parsed
//! message trees, drives an external OpenPGP provider over what it finds,
//! and classifies batches of IMAP server responses into typed values.

pub mod config;
pub mod crypto;
pub mod error;
pub mod imap;
pub mod model;
pub mod parser;
