//! Authorization - role-derived rule sets and a request-scoped evaluator
//!
//! Every authenticated request gets its own [`Ability`]: an immutable,
//! ordered list of allow/deny rules built from the principal's role by
//! [`abilities_for`]. Services consult it explicitly; nothing is stashed in
//! ambient request state. Instruments carry no rules of their own - access
//! is inherited from the parent portfolio, so services authorize the
//! portfolio first.

mod evaluator;
mod principal;
mod rules;

pub use evaluator::{Ability, Scope};
pub use principal::{Principal, Role};
pub use rules::{abilities_for, Action, Condition, Effect, Resource, Rule, Subject};
