//! Access predicate for trading and control commands.
//!
//! Authentication happens upstream; by the time a caller reaches the
//! agent or controller it is reduced to a `Grants` value. `permits` is a
//! pure function of that value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller role, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Fund,
    Trader,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::User => "USER",
            Self::Fund => "FUND",
            Self::Trader => "TRADER",
            Self::Admin => "ADMIN",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "FUND" => Ok(Self::Fund),
            "TRADER" => Ok(Self::Trader),
            "ADMIN" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Something a caller may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewState,
    Trade,
    ControlModes,
    ManageCapital,
    ManageRisk,
}

impl Capability {
    /// Lowest role that holds this capability.
    pub fn required_role(&self) -> Role {
        match self {
            Self::ViewState => Role::User,
            Self::Trade | Self::ControlModes => Role::Trader,
            Self::ManageCapital | Self::ManageRisk => Role::Admin,
        }
    }
}

/// What an authenticated caller is allowed to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grants {
    /// Identifier used in audit events.
    pub subject: String,
    pub role: Option<Role>,
    /// Caller presented the operations token.
    pub ops_token: bool,
    /// Deactivated accounts hold no capability, token or not.
    pub active: bool,
}

impl Grants {
    pub fn new(subject: impl Into<String>, role: Role) -> Self {
        Self {
            subject: subject.into(),
            role: Some(role),
            ops_token: false,
            active: true,
        }
    }

    /// Caller identified only by the operations token.
    ///
    /// Grants everything when `presented` matches a non-empty `expected`.
    pub fn from_ops_token(presented: &str, expected: &str) -> Self {
        Self {
            subject: "ops_token".to_string(),
            role: None,
            ops_token: !expected.is_empty() && presented == expected,
            active: true,
        }
    }

    /// Grants of the process itself (tick loop, start-up).
    pub fn system() -> Self {
        Self::new("system", Role::Admin)
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn permits(&self, capability: Capability) -> bool {
        if !self.active {
            return false;
        }
        if self.ops_token {
            return true;
        }
        match self.role {
            Some(Role::Admin) => true,
            Some(role) => role >= capability.required_role(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(Role::User < Role::Fund);
        assert!(Role::Fund < Role::Trader);
        assert!(Role::Trader < Role::Admin);
        assert_eq!("trader".parse::<Role>().unwrap(), Role::Trader);
    }

    #[test]
    fn test_trader_permissions() {
        let trader = Grants::new("alice", Role::Trader);
        assert!(trader.permits(Capability::Trade));
        assert!(trader.permits(Capability::ControlModes));
        assert!(trader.permits(Capability::ViewState));
        assert!(!trader.permits(Capability::ManageCapital));
    }

    #[test]
    fn test_user_and_fund_cannot_trade() {
        assert!(!Grants::new("u", Role::User).permits(Capability::Trade));
        assert!(!Grants::new("f", Role::Fund).permits(Capability::Trade));
        assert!(Grants::new("f", Role::Fund).permits(Capability::ViewState));
    }

    #[test]
    fn test_admin_and_ops_token_permit_everything() {
        let admin = Grants::new("root", Role::Admin);
        let token = Grants::from_ops_token("secret", "secret");
        for cap in [
            Capability::ViewState,
            Capability::Trade,
            Capability::ControlModes,
            Capability::ManageCapital,
            Capability::ManageRisk,
        ] {
            assert!(admin.permits(cap));
            assert!(token.permits(cap));
        }
    }

    #[test]
    fn test_bad_or_empty_token() {
        assert!(!Grants::from_ops_token("guess", "secret").permits(Capability::ViewState));
        assert!(!Grants::from_ops_token("", "").permits(Capability::ViewState));
    }

    #[test]
    fn test_inactive_caller_denied() {
        let admin = Grants::new("root", Role::Admin).inactive();
        assert!(!admin.permits(Capability::ViewState));
    }
}
