use crate::errors::{AppError, AppResult};

use super::rules::{Action, Condition, Effect, Resource, Rule, Subject};

/// Request-scoped authorization evaluator. Holds the immutable rule list
/// built by [`super::abilities_for`]; safe to reuse within one request,
/// never shared across requests.
#[derive(Debug, Clone)]
pub struct Ability {
    rules: Vec<Rule>,
}

/// Implicit filter a list query must apply for an (action, resource) pair,
/// folded from the allow-rule conditions. `Nothing` means no rule can ever
/// grant, so the query should short-circuit to an empty page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Unrestricted,
    /// Any one of these conditions grants access.
    Any(Vec<Condition>),
    Nothing,
}

impl Ability {
    pub(crate) fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Can the principal perform `action` on this instance?
    pub fn can(&self, action: Action, subject: &Subject) -> bool {
        self.check(action, subject, None)
    }

    /// Per-field check for partial updates: every requested field must pass
    /// individually, so one disallowed field fails the whole update.
    pub fn can_fields(&self, action: Action, subject: &Subject, fields: &[&str]) -> bool {
        fields
            .iter()
            .all(|field| self.check(action, subject, Some(field)))
    }

    /// Fail-loudly variant of [`can`](Self::can). The message is generic on
    /// purpose; rule internals stay out of responses.
    pub fn ensure_can(&self, action: Action, subject: &Subject) -> AppResult<()> {
        if self.can(action, subject) {
            Ok(())
        } else {
            Err(AppError::forbidden("Forbidden"))
        }
    }

    pub fn ensure_can_fields(
        &self,
        action: Action,
        subject: &Subject,
        fields: &[&str],
    ) -> AppResult<()> {
        if self.can_fields(action, subject, fields) {
            Ok(())
        } else {
            Err(AppError::forbidden("Forbidden"))
        }
    }

    /// Last-match-wins scan: evaluate every rule that matches the subject
    /// and action (a rule whose condition fails against the instance does
    /// not match), keep the final effect. No match means deny.
    fn check(&self, action: Action, subject: &Subject, field: Option<&str>) -> bool {
        let mut verdict = false;
        for rule in &self.rules {
            if rule.matches(action, subject, field) {
                verdict = rule.effect == Effect::Allow;
            }
        }

        tracing::debug!(
            action = action.as_str(),
            subject = ?subject,
            field = field.unwrap_or("*"),
            allowed = verdict,
            "ability check"
        );

        verdict
    }

    /// Fold the rule conditions for `(action, resource)` into a list-query
    /// scope. An unconditioned allow lifts all restrictions; an
    /// unconditioned deny after it resets them.
    pub fn scope_for(&self, action: Action, resource: Resource) -> Scope {
        let mut unrestricted = false;
        let mut conditions: Vec<Condition> = Vec::new();

        for rule in &self.rules {
            if !action.covered_by(rule.action) {
                continue;
            }
            let rule_resource_matches =
                rule.resource == Resource::All || rule.resource == resource;
            if !rule_resource_matches {
                continue;
            }

            match (rule.effect, rule.condition) {
                (Effect::Allow, None) => unrestricted = true,
                (Effect::Allow, Some(condition)) => conditions.push(condition),
                (Effect::Deny, None) => {
                    unrestricted = false;
                    conditions.clear();
                }
                // A conditioned deny has no sound translation to a scope
                // filter; no role's rule set produces one.
                (Effect::Deny, Some(_)) => {}
            }
        }

        if unrestricted {
            Scope::Unrestricted
        } else if conditions.is_empty() {
            Scope::Nothing
        } else {
            Scope::Any(conditions)
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::authz::{abilities_for, Principal, Role};

    fn user_principal() -> Principal {
        Principal::new(Uuid::new_v4(), Role::User)
    }

    #[test]
    fn owner_manages_own_portfolio() {
        let principal = user_principal();
        let ability = abilities_for(&principal);
        let own = Subject::portfolio(principal.id, false);

        for action in [Action::Create, Action::Read, Action::Update, Action::Delete, Action::Manage] {
            assert!(ability.can(action, &own), "owner should pass {action:?}");
        }
    }

    #[test]
    fn non_owner_reads_only_public_portfolios() {
        let ability = abilities_for(&user_principal());
        let other = Uuid::new_v4();

        assert!(!ability.can(Action::Read, &Subject::portfolio(other, false)));
        assert!(ability.can(Action::Read, &Subject::portfolio(other, true)));
        assert!(!ability.can(Action::Update, &Subject::portfolio(other, true)));
        assert!(!ability.can(Action::Delete, &Subject::portfolio(other, true)));
    }

    #[test]
    fn user_updates_own_name_and_password_only() {
        let principal = user_principal();
        let ability = abilities_for(&principal);
        let me = Subject::user(principal.id);

        assert!(ability.can_fields(Action::Update, &me, &["name", "password"]));
        // AND semantics: one disallowed field fails the whole set.
        assert!(!ability.can_fields(Action::Update, &me, &["name", "role"]));
        assert!(!ability.can_fields(Action::Update, &me, &["email"]));
    }

    #[test]
    fn user_cannot_touch_other_users() {
        let ability = abilities_for(&user_principal());
        let other = Subject::user(Uuid::new_v4());

        assert!(!ability.can(Action::Read, &other));
        assert!(!ability.can_fields(Action::Update, &other, &["name"]));
        assert!(!ability.can(Action::Delete, &other));
    }

    #[test]
    fn admin_manages_any_user_but_not_portfolios() {
        let principal = Principal::new(Uuid::new_v4(), Role::Admin);
        let ability = abilities_for(&principal);
        let someone = Subject::user(Uuid::new_v4());

        for action in [Action::Create, Action::Read, Action::Update, Action::Delete] {
            assert!(ability.can(action, &someone));
        }
        assert!(ability.can_fields(Action::Update, &someone, &["name", "email", "role"]));

        // Admin rule set says nothing about portfolios.
        assert!(!ability.can(Action::Update, &Subject::portfolio(Uuid::new_v4(), true)));
    }

    #[test]
    fn anonymous_is_denied_everything() {
        let principal = Principal::new(Uuid::new_v4(), Role::Anonymous);
        let ability = abilities_for(&principal);

        assert!(!ability.can(Action::Read, &Subject::user(principal.id)));
        assert!(!ability.can(Action::Read, &Subject::portfolio(principal.id, true)));
        assert!(!ability.can(Action::Manage, &Subject::portfolio(principal.id, true)));
    }

    #[test]
    fn building_twice_gives_identical_decisions() {
        let principal = user_principal();
        let first = abilities_for(&principal);
        let second = abilities_for(&principal);
        let subjects = [
            Subject::user(principal.id),
            Subject::user(Uuid::new_v4()),
            Subject::portfolio(principal.id, false),
            Subject::portfolio(Uuid::new_v4(), true),
            Subject::portfolio(Uuid::new_v4(), false),
        ];

        for subject in &subjects {
            for action in [Action::Create, Action::Read, Action::Update, Action::Delete, Action::Manage] {
                assert_eq!(first.can(action, subject), second.can(action, subject));
            }
        }
    }

    #[test]
    fn user_portfolio_scope_is_own_or_public() {
        let principal = user_principal();
        let ability = abilities_for(&principal);

        let scope = ability.scope_for(Action::Read, Resource::Portfolio);
        assert_eq!(
            scope,
            Scope::Any(vec![Condition::OwnerIs(principal.id), Condition::IsPublic])
        );

        // Writes never widen to public portfolios.
        let scope = ability.scope_for(Action::Update, Resource::Portfolio);
        assert_eq!(scope, Scope::Any(vec![Condition::OwnerIs(principal.id)]));
    }

    #[test]
    fn scope_edges() {
        let admin = abilities_for(&Principal::new(Uuid::new_v4(), Role::Admin));
        assert_eq!(admin.scope_for(Action::Read, Resource::User), Scope::Unrestricted);
        assert_eq!(admin.scope_for(Action::Read, Resource::Portfolio), Scope::Nothing);

        let anon = abilities_for(&Principal::new(Uuid::new_v4(), Role::Anonymous));
        assert_eq!(anon.scope_for(Action::Read, Resource::User), Scope::Nothing);
        assert_eq!(anon.scope_for(Action::Read, Resource::Portfolio), Scope::Nothing);
    }
}
