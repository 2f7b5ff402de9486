use uuid::Uuid;

use super::evaluator::Ability;
use super::principal::{Principal, Role};

/// Fields a regular user may change on their own record.
pub const USER_SELF_UPDATE_FIELDS: &[&str] = &["name", "password"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    /// Superset action: a `Manage` rule grants every other action.
    Manage,
}

impl Action {
    pub(crate) fn covered_by(self, granted: Action) -> bool {
        granted == Action::Manage || granted == self
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Portfolio,
    /// Wildcard, used by the anonymous deny-all rule.
    All,
}

impl Resource {
    fn matches(self, other: Resource) -> bool {
        self == Resource::All || self == other
    }
}

/// Rule condition as plain data rather than a closure or query tree: it can
/// be evaluated against an already-loaded instance and translated into a
/// list-query filter by the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Instance id equals the given user id.
    SelfIs(Uuid),
    /// Portfolio owner equals the given user id.
    OwnerIs(Uuid),
    /// Portfolio is publicly visible.
    IsPublic,
}

impl Condition {
    pub(crate) fn holds(&self, subject: &Subject) -> bool {
        match (self, subject) {
            (Condition::SelfIs(id), Subject::User { id: subject_id }) => subject_id == id,
            (Condition::OwnerIs(id), Subject::Portfolio { owner, .. }) => owner == id,
            (Condition::IsPublic, Subject::Portfolio { public, .. }) => *public,
            _ => false,
        }
    }
}

/// The attributes of a concrete resource instance that rule conditions can
/// see. Built by services from loaded (or about-to-be-written) records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    User { id: Uuid },
    Portfolio { owner: Uuid, public: bool },
}

impl Subject {
    pub fn user(id: Uuid) -> Self {
        Subject::User { id }
    }

    pub fn portfolio(owner: Uuid, public: bool) -> Self {
        Subject::Portfolio { owner, public }
    }

    pub(crate) fn resource(&self) -> Resource {
        match self {
            Subject::User { .. } => Resource::User,
            Subject::Portfolio { .. } => Resource::Portfolio,
        }
    }
}

/// One allow/deny statement. Rules are ordered; the evaluator keeps the last
/// matching rule's effect.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub effect: Effect,
    pub action: Action,
    pub resource: Resource,
    /// `None` grants every field.
    pub fields: Option<&'static [&'static str]>,
    pub condition: Option<Condition>,
}

impl Rule {
    pub fn allow(action: Action, resource: Resource) -> Self {
        Self {
            effect: Effect::Allow,
            action,
            resource,
            fields: None,
            condition: None,
        }
    }

    pub fn deny(action: Action, resource: Resource) -> Self {
        Self {
            effect: Effect::Deny,
            ..Self::allow(action, resource)
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn on_fields(mut self, fields: &'static [&'static str]) -> Self {
        self.fields = Some(fields);
        self
    }

    /// A rule matches when it covers the action, targets the subject's
    /// resource type, grants the requested field and its condition holds
    /// against the instance. A failed condition means "does not match",
    /// never "deny".
    pub(crate) fn matches(&self, action: Action, subject: &Subject, field: Option<&str>) -> bool {
        if !action.covered_by(self.action) || !self.resource.matches(subject.resource()) {
            return false;
        }

        if let (Some(field), Some(fields)) = (field, self.fields) {
            if !fields.contains(&field) {
                return false;
            }
        }

        match &self.condition {
            Some(condition) => condition.holds(subject),
            None => true,
        }
    }
}

/// Build the rule set for a principal. Pure function of role and id; called
/// once per request by the auth extractor.
pub fn abilities_for(principal: &Principal) -> Ability {
    let rules = match principal.role {
        Role::Admin => vec![Rule::allow(Action::Manage, Resource::User)],
        Role::User => vec![
            Rule::allow(Action::Read, Resource::User).when(Condition::SelfIs(principal.id)),
            Rule::allow(Action::Update, Resource::User)
                .on_fields(USER_SELF_UPDATE_FIELDS)
                .when(Condition::SelfIs(principal.id)),
            Rule::allow(Action::Manage, Resource::Portfolio).when(Condition::OwnerIs(principal.id)),
            Rule::allow(Action::Read, Resource::Portfolio).when(Condition::IsPublic),
        ],
        Role::Anonymous => vec![Rule::deny(Action::Manage, Resource::All)],
    };

    Ability::new(rules)
}
