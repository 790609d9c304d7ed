//! TokenForge: reconciles Solana SPL token data from several providers,
//! scores it and grounds generated answers in current market prices.

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod market;
pub mod models;
pub mod storage;
pub mod web;
