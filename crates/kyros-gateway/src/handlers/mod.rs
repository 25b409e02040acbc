//! HTTP handlers

pub mod admin;
pub mod auth;
pub mod health;
pub mod mfa;
pub mod oauth;
pub mod projects;
pub mod sessions;
