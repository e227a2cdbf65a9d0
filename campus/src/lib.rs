//! Campus - multi-tenant school management backend
//!
//! One control-plane database holds schools, users and the shared syllabus
//! catalog. Every school gets its own database, selected per request from
//! the caller's token.

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod collaborators;
pub mod config;
pub mod crypto;
pub mod entity;
pub mod password_reset;
pub mod tenancy;
