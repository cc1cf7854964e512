#![forbid(unsafe_code)]

pub mod cache;
pub mod http;
pub mod repository;
