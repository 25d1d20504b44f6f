//! Modules layer - Infrastructure components shared by features
//!
//! Contains the local media storage uploads are written to.

pub mod storage;
