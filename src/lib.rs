//! # Bioauth
//!
//! Gate an action behind device-local biometric verification, with passcode
//! fallback where the platform offers it.
//!
//! ## Features
//!
//! - `biometric` (default): the authentication controller, re-exported as [`biometric`].
//! - `mock`: a scriptable provider for testing code that depends on the controller.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! bioauth = "0.1"
//! ```
//!
//! ```rust,no_run
//! use bioauth::biometric::AuthController;
//!
//! async fn unlock() -> bool {
//!     let controller = AuthController::platform();
//!     controller.permit_and_auth().await
//! }
//! ```

#[cfg(feature = "biometric")]
pub use bioauth_biometric as biometric;
