use crate::engine::error::{AuthzAxis, EngineError};
use crate::engine::lifecycle::Transition;
use crate::model::permission::{Permission, PermissionSet};
use crate::model::request::RequestRecord;
use crate::model::role::Role;

/// The authenticated actor, resolved from session claims and passed
/// explicitly into every transition. No ambient session state.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Present only when the account is linked to an employee record.
    pub employee_id: Option<u64>,
    pub employee_name: String,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl Principal {
    pub fn owns(&self, record: &RequestRecord) -> bool {
        self.employee_id == Some(record.employee_id)
    }
}

fn deny(axis: AuthzAxis, transition: Transition) -> EngineError {
    EngineError::Unauthorized { axis, transition }
}

pub(crate) fn require_reviewer(
    principal: &Principal,
    transition: Transition,
) -> Result<(), EngineError> {
    if principal.role.is_reviewer() {
        Ok(())
    } else {
        Err(deny(AuthzAxis::Role, transition))
    }
}

pub(crate) fn require_permission(
    principal: &Principal,
    permission: Permission,
    transition: Transition,
) -> Result<(), EngineError> {
    if principal.permissions.contains(permission) {
        Ok(())
    } else {
        Err(deny(AuthzAxis::Permission, transition))
    }
}

pub(crate) fn require_owner(
    principal: &Principal,
    record: &RequestRecord,
    transition: Transition,
) -> Result<(), EngineError> {
    if principal.owns(record) {
        Ok(())
    } else {
        Err(deny(AuthzAxis::Role, transition))
    }
}

/// First gate: role and permission axes. Runs before any store call, so a
/// caller the gate turns away never generates remote traffic.
pub fn check_actor(principal: &Principal, transition: Transition) -> Result<(), EngineError> {
    match transition {
        Transition::Create => {
            // Self-service submission requires an employee profile.
            if principal.employee_id.is_some() {
                Ok(())
            } else {
                Err(deny(AuthzAxis::Role, transition))
            }
        }
        Transition::Assign => {
            require_reviewer(principal, transition)?;
            require_permission(principal, Permission::AssignRequests, transition)
        }
        Transition::Accept | Transition::Reject => {
            require_reviewer(principal, transition)?;
            require_permission(principal, Permission::AcceptRejectRequests, transition)
        }
        Transition::Delete => {
            require_reviewer(principal, transition)?;
            require_permission(principal, Permission::DeleteRequests, transition)
        }
        // Ownership-dependent; decided against the loaded record.
        Transition::Update | Transition::ConvertToSick => Ok(()),
    }
}

/// Second gate: ownership, once the record is in hand. Reviewers may act on
/// anyone's requests; employees only on their own.
pub fn check_target(
    principal: &Principal,
    transition: Transition,
    record: &RequestRecord,
) -> Result<(), EngineError> {
    match transition {
        Transition::ConvertToSick if !principal.role.is_reviewer() => {
            require_owner(principal, record, transition)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee() -> Principal {
        Principal {
            employee_id: Some(1000),
            employee_name: "John Doe".into(),
            role: Role::Employee,
            permissions: PermissionSet::empty(),
        }
    }

    fn manager(permissions: PermissionSet) -> Principal {
        Principal {
            employee_id: None,
            employee_name: "Jane Roe".into(),
            role: Role::Manager,
            permissions,
        }
    }

    #[test]
    fn employee_cannot_accept() {
        let err = check_actor(&employee(), Transition::Accept).unwrap_err();
        assert_eq!(
            err,
            EngineError::Unauthorized {
                axis: AuthzAxis::Role,
                transition: Transition::Accept
            }
        );
    }

    #[test]
    fn manager_without_permission_is_denied_on_permission_axis() {
        let err = check_actor(&manager(PermissionSet::empty()), Transition::Accept).unwrap_err();
        assert_eq!(
            err,
            EngineError::Unauthorized {
                axis: AuthzAxis::Permission,
                transition: Transition::Accept
            }
        );
    }

    #[test]
    fn manager_with_permission_passes() {
        let principal = manager(PermissionSet::empty().grant(Permission::AcceptRejectRequests));
        assert!(check_actor(&principal, Transition::Accept).is_ok());
        assert!(check_actor(&principal, Transition::Reject).is_ok());
        // but not the ones gated by other permissions
        assert!(check_actor(&principal, Transition::Delete).is_err());
        assert!(check_actor(&principal, Transition::Assign).is_err());
    }

    #[test]
    fn ownership_gated_transitions_pass_the_actor_gate() {
        // Their axes are decided against the loaded record, not up front.
        assert!(check_actor(&employee(), Transition::Update).is_ok());
        assert!(check_actor(&employee(), Transition::ConvertToSick).is_ok());
    }

    #[test]
    fn create_requires_an_employee_profile() {
        assert!(check_actor(&employee(), Transition::Create).is_ok());
        assert!(check_actor(&manager(PermissionSet::all()), Transition::Create).is_err());
    }
}
