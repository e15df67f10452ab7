//! Caller identity as handed to us by the fronting identity provider.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeagueRole {
    Admin,
    Coach,
    Viewer,
}

impl LeagueRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "leagueadmin" | "globaladmin" => Some(LeagueRole::Admin),
            "coach" => Some(LeagueRole::Coach),
            "viewer" => Some(LeagueRole::Viewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamAssignment {
    pub division: String,
    pub team_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub league_id: String,
    pub role: LeagueRole,
    pub team: Option<TeamAssignment>,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == LeagueRole::Admin
    }

    /// Exact match on both division and team id.
    pub fn is_team(&self, division: &str, team_id: &str) -> bool {
        self.team
            .as_ref()
            .is_some_and(|t| t.division == division && t.team_id == team_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse() {
        assert_eq!(LeagueRole::parse("Admin"), Some(LeagueRole::Admin));
        assert_eq!(LeagueRole::parse("LeagueAdmin"), Some(LeagueRole::Admin));
        assert_eq!(LeagueRole::parse("coach"), Some(LeagueRole::Coach));
        assert_eq!(LeagueRole::parse("owner"), None);
    }

    #[test]
    fn team_match_is_exact() {
        let caller = Caller {
            user_id: "u".into(),
            league_id: "lg".into(),
            role: LeagueRole::Coach,
            team: Some(TeamAssignment {
                division: "10U".into(),
                team_id: "A".into(),
            }),
        };
        assert!(caller.is_team("10U", "A"));
        assert!(!caller.is_team("10u", "A"));
        assert!(!caller.is_team("10U", "B"));
        assert!(!caller.is_admin());
    }
}
