//! Authentication and trust policy
//!
//! One policy for both protocol paths: static credentials win, then the
//! explicit unprotected override, then peer locality.

mod credentials;
mod gate;

pub use credentials::Credentials;
pub use gate::{decide, AuthDecision, AuthPolicy, TrustGate};
