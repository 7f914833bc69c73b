use crate::{jwt::SessionData, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (UserRole::User, &[]),
    (UserRole::Staff, &[ActionType::ViewUsers]),
    (
        UserRole::Superuser,
        &[ActionType::ViewUsers, ActionType::ManageUsers],
    ),
];

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    ViewUsers,
    ManageUsers,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find_map(|(role, actions)| {
                if &session.role != role {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}
