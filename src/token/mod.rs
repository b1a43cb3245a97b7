//! Token Management
//!
//! Provider token refresh and the credential lifecycle of stored integrations.
//!
//! This module provides:
//!
//! - **Token Refresher**: `refresh_token` grant against Google and Zoom
//! - **Token Manager**: lookup, expiry check, refresh, persist, disable on failure

pub mod manager;
pub mod refresher;

// Token Refresher
pub use refresher::{
    create_mock_refresher, GoogleTokenRefresher, MockTokenRefresher, TokenRefresher,
    ZoomTokenRefresher,
};

// Token Manager
pub use manager::{CredentialLifecycleManager, TokenManager};
