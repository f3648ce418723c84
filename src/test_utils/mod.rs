//! Test utilities for integration testing.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory repository implementations for mocking persistence
//! - Scripted system adapters standing in for external subsystems
//! - A builder for constructing `AppState` with test dependencies

mod app_state_builder;
mod factories;
mod signup_mocks;
mod system_mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use signup_mocks::*;
pub use system_mocks::*;

use base64::{Engine as _, engine::general_purpose};

use crate::infra::crypto::SecretVault;

/// Vault with a fixed key so encrypted fixtures decrypt across the suite.
pub fn test_vault() -> SecretVault {
    let key = general_purpose::STANDARD.encode([42u8; 32]);
    SecretVault::new_from_base64(&key).unwrap()
}
