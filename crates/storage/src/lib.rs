#![forbid(unsafe_code)]

//! Local cache for the LMS client: progress snapshots, notifications,
//! announcement read receipts and the signed-in session.

pub mod repository;
pub mod sqlite;
