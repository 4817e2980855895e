//! Reolink camera input over the CGI JSON API.

pub mod api;
mod client;

pub use client::ReolinkClient;
