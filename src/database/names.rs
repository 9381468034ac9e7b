//! Role names derived from a canonical database name.
//!
//! A restore never writes into the canonical database directly. It stages the
//! data in `{name}__temp`, moves the live database aside to `{name}__swap`, and
//! optionally keeps undo history in `{name}__pre` and `{name}__post`.

use super::DatabaseConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Temp,
    Swap,
    Pre,
    Post,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Temp, Role::Swap, Role::Pre, Role::Post];

    pub fn suffix(self) -> &'static str {
        match self {
            Role::Temp => "__temp",
            Role::Swap => "__swap",
            Role::Pre => "__pre",
            Role::Post => "__post",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseNameSet {
    pub canonical: DatabaseConfig,
    pub temp: DatabaseConfig,
    pub swap: DatabaseConfig,
    pub pre: DatabaseConfig,
    pub post: DatabaseConfig,
}

impl DatabaseNameSet {
    pub fn derive(canonical: &DatabaseConfig) -> Self {
        let role = |role: Role| canonical.with_name(&role_name(&canonical.name, role));
        DatabaseNameSet {
            canonical: canonical.clone(),
            temp: role(Role::Temp),
            swap: role(Role::Swap),
            pre: role(Role::Pre),
            post: role(Role::Post),
        }
    }

    pub fn role(&self, role: Role) -> &DatabaseConfig {
        match role {
            Role::Temp => &self.temp,
            Role::Swap => &self.swap,
            Role::Pre => &self.pre,
            Role::Post => &self.post,
        }
    }

    /// True if `name` is one of the derived role names (not the canonical one).
    pub fn is_role_name(&self, name: &str) -> bool {
        Role::ALL.iter().any(|role| self.role(*role).name == name)
    }
}

pub fn role_name(canonical: &str, role: Role) -> String {
    format!("{}{}", canonical, role.suffix())
}
