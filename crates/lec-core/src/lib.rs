//! # lec-core
//!
//! Core types, document contract, ID generation, and error types for Lectern.
//!
//! This crate provides the foundational types shared across all Lectern crates:
//! - Entity structs for the course domain (courses, assignments, instances)
//! - Status enums with state machine transitions
//! - ID prefix constants and client-side ID generation
//! - The document/filter/write-op vocabulary of the remote store
//! - The `CollectionGateway` contract consumed by the sync core
//! - Session identity and CLI/UI response types
//! - Cross-cutting error types

pub mod documents;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod gateway;
pub mod identity;
pub mod ids;
pub mod responses;
