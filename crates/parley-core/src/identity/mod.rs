//! Registration and login.

pub mod service;
