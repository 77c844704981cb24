//! Authentication resolvers.
//!
//! Pure transition functions for the top-level flow and its sub-flows. The
//! top-level [`AuthResolver`] delegates sub-flow events to
//! [`SignUpResolver`] and [`SignInResolver`] and folds their resolutions back
//! with [`nest`](authflow_core::composition::nest).

use authflow_core::effect::EffectId;

mod auth;
mod sign_in;
mod sign_up;

pub use auth::AuthResolver;
pub use sign_in::SignInResolver;
pub use sign_up::SignUpResolver;

/// In-flight sign-up provider calls.
pub const SIGN_UP: EffectId = EffectId::new("sign-up");

/// Sign-up flow timeout timer.
pub const SIGN_UP_TIMEOUT: EffectId = EffectId::new("sign-up.timeout");

/// In-flight sign-in provider calls.
pub const SIGN_IN: EffectId = EffectId::new("sign-in");

/// Sign-in flow timeout timer.
pub const SIGN_IN_TIMEOUT: EffectId = EffectId::new("sign-in.timeout");
