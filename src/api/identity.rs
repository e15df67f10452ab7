//! Caller extraction from identity-provider headers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::identity::{Caller, LeagueRole, TeamAssignment};

use super::error::ApiError;

pub const USER_ID: &str = "x-user-id";
pub const LEAGUE_ID: &str = "x-league-id";
pub const LEAGUE_ROLE: &str = "x-league-role";
pub const TEAM_DIVISION: &str = "x-team-division";
pub const TEAM_ID: &str = "x-team-id";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn required<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    header(headers, name).ok_or_else(|| ApiError::Unauthenticated(format!("missing {name} header")))
}

pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let user_id = required(headers, USER_ID)?;
    let league_id = required(headers, LEAGUE_ID)?;
    let raw_role = required(headers, LEAGUE_ROLE)?;
    let role = LeagueRole::parse(raw_role)
        .ok_or_else(|| ApiError::Unauthenticated(format!("unknown league role {raw_role:?}")))?;

    let team = match (header(headers, TEAM_DIVISION), header(headers, TEAM_ID)) {
        (Some(division), Some(team_id)) => Some(TeamAssignment {
            division: division.to_string(),
            team_id: team_id.to_string(),
        }),
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(format!(
                "{TEAM_DIVISION} and {TEAM_ID} must be sent together"
            )));
        }
    };

    Ok(Caller {
        user_id: user_id.to_string(),
        league_id: league_id.to_string(),
        role,
        team,
    })
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(*k, HeaderValue::from_static(v));
        }
        h
    }

    #[test]
    fn coach_with_team() {
        let caller = caller_from_headers(&headers(&[
            (USER_ID, "u1"),
            (LEAGUE_ID, "metro"),
            (LEAGUE_ROLE, "Coach"),
            (TEAM_DIVISION, "10U"),
            (TEAM_ID, " B "),
        ]))
        .unwrap();
        assert_eq!(caller.role, LeagueRole::Coach);
        assert!(caller.is_team("10U", "B"));
    }

    #[test]
    fn admin_without_team() {
        let caller = caller_from_headers(&headers(&[
            (USER_ID, "u1"),
            (LEAGUE_ID, "metro"),
            (LEAGUE_ROLE, "LeagueAdmin"),
        ]))
        .unwrap();
        assert!(caller.is_admin());
        assert!(caller.team.is_none());
    }

    #[test]
    fn missing_identity_is_unauthenticated() {
        let err = caller_from_headers(&headers(&[(USER_ID, "u1"), (LEAGUE_ROLE, "Coach")]))
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));

        let err = caller_from_headers(&headers(&[
            (USER_ID, "u1"),
            (LEAGUE_ID, "metro"),
            (LEAGUE_ROLE, "Owner"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));
    }

    #[test]
    fn half_team_assignment_rejected() {
        let err = caller_from_headers(&headers(&[
            (USER_ID, "u1"),
            (LEAGUE_ID, "metro"),
            (LEAGUE_ROLE, "Coach"),
            (TEAM_ID, "B"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
