//! Port for authorization decisions.

use crate::domain::registry::GateAction;
use crate::domain::Actor;

/// Yes/no gate consulted before guarded writes.
#[cfg_attr(test, mockall::automock)]
pub trait AccessGate: Send + Sync {
    /// Whether `actor` may perform `action`.
    fn is_allowed(&self, action: GateAction, actor: &Actor) -> bool;
}
