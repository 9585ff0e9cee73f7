//! turngate-api — HTTP client for the turnstile controller.
//!
//! Covers the three endpoints the loop and the operator tooling need:
//! token auth, pass requests, and the staff roster. An authorization
//! failure on any authenticated call is retried exactly once through a
//! transparent token refresh.

pub mod client;

pub use client::{DoorClient, DoorError, StaffUser};
