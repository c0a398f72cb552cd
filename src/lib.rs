//! Newsdesk - a paginated news reader backend
//!
//! This crate fetches headlines, search results and the source directory from
//! a NewsAPI-compatible service, accumulates pages per stream and serves the
//! result, saved articles and UI preferences over a JSON API.

pub mod client;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
