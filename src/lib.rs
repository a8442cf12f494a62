//! Cashbook
//!
//! A small bookkeeping backend. Income, expense, worker and return entries
//! live in the tables of a spreadsheet-style store; a Summary table of
//! per-currency totals is rebuilt after every change, and a parameter-based
//! HTTP gateway exposes reads, appends, deletes and phone/password login.

pub mod cloud_adapters;
pub mod config;
pub mod core;
pub mod gateway;
