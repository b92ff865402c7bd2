pub mod config;
pub mod connection;
pub mod error;
pub mod fragment;
pub mod http;
pub mod source;
pub mod url;
pub mod xap;
