// src/infrastructure/mod.rs
pub mod market;
pub mod persistence;
