//! Core implementation of the bastion IAM engine
//!
//! Leaves first: validation and the pure scope authorizer, then the storage
//! collaborators, the namespace-partitioned directory on top of them, and the
//! token lifecycle manager that orchestrates everything.

pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod iam;
pub mod storage;
pub mod token;
pub mod validation;
