#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Manager = 2,
    Employee = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Manager),
            3 => Some(Role::Employee),
            _ => None,
        }
    }

    /// Reviewer-side roles: may act on other employees' requests.
    pub fn is_reviewer(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}
