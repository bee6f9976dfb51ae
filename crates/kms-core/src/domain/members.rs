//! Members - ロールによるメンバー一括キックの計画

use std::collections::HashSet;

use super::ids::{RoleId, UserId};

/// Guild member as seen by the moderation commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSummary {
    pub user_id: UserId,
    pub name: String,
    pub roles: Vec<RoleId>,
}

/// Partition of the guild produced by [`plan_member_purge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberPurgePlan {
    pub protected: Vec<MemberSummary>,
    pub to_kick: Vec<MemberSummary>,
}

impl MemberPurgePlan {
    pub fn names_to_kick(&self) -> Vec<&str> {
        self.to_kick.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Splits members into those holding at least one protected role and the rest.
pub fn plan_member_purge(
    members: impl IntoIterator<Item = MemberSummary>,
    protected_roles: &HashSet<RoleId>,
) -> MemberPurgePlan {
    let mut plan = MemberPurgePlan::default();
    for member in members {
        if member.roles.iter().any(|r| protected_roles.contains(r)) {
            plan.protected.push(member);
        } else {
            plan.to_kick.push(member);
        }
    }
    plan
}
