//! Nested flow composition
//!
//! A parent flow embeds a child flow by carrying the child's state as a
//! payload of one of its own state variants. Events meant for the child are
//! delegated to the child's resolver and the result is folded back with
//! [`nest`]:
//!
//! - the child's next state is embedded into a parent state,
//! - the child's actions are wrapped into the parent's action type,
//! - the child's delayed events are wrapped into the parent's event type,
//! - the child's diagnostic is passed through unchanged.
//!
//! No state is shared between parent and child; the child resolution is a
//! plain value.
//!
//! # Example
//!
//! ```ignore
//! AuthState::SigningUp { configuration, flow } => {
//!     let child = self.sign_up.resolve(flow, sign_up_event);
//!     nest(
//!         child,
//!         |flow| AuthState::SigningUp { configuration: configuration.clone(), flow },
//!         AuthAction::SignUp,
//!         AuthEvent::SignUp,
//!     )
//! }
//! ```

use crate::action::Action;
use crate::resolver::Resolution;

/// Fold a child flow's resolution into the parent's types.
pub fn nest<CS, CA, PS, PA, FS, FA, FE>(
    child: Resolution<CS, CA>,
    embed_state: FS,
    embed_action: FA,
    embed_event: FE,
) -> Resolution<PS, PA>
where
    CA: Action,
    PA: Action,
    FS: FnOnce(CS) -> PS,
    FA: Fn(CA) -> PA,
    FE: Fn(CA::Event) -> PA::Event,
{
    let Resolution {
        state,
        effects,
        diagnostic,
    } = child;

    Resolution {
        state: embed_state(state),
        effects: effects
            .into_iter()
            .map(|effect| effect.map(&embed_action, &embed_event))
            .collect(),
        diagnostic,
    }
}
