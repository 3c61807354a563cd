use crate::error::Error;

pub const OPENID: &str = "openid";
pub const PROFILE: &str = "profile";

/// Scopes every login request carries.
pub const LOGIN_SCOPES: [&str; 2] = [OPENID, PROFILE];

/// Splits a space-delimited scope string.
#[must_use]
pub fn parse_scopes(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_owned).collect()
}

/// Joins scopes into the space-delimited wire form.
#[must_use]
pub fn join_scopes(scopes: &[String]) -> String {
    scopes.join(" ")
}

/// Case-insensitive scope membership.
#[must_use]
pub fn contains_scope(scopes: &[String], scope: &str) -> bool {
    scopes.iter().any(|s| s.eq_ignore_ascii_case(scope))
}

/// Appends `extra` to `scopes`, skipping case-insensitive duplicates.
pub fn append_unique<S: AsRef<str>>(scopes: &mut Vec<String>, extra: &[S]) {
    for scope in extra {
        let scope = scope.as_ref();
        if !contains_scope(scopes, scope) {
            scopes.push(scope.to_owned());
        }
    }
}

/// True when the scopes only ask for an id token.
///
/// The client id stands in for `openid profile`.
#[must_use]
pub fn is_identity_only(scopes: &[String], client_id: &str) -> bool {
    scopes.iter().all(|s| {
        s.eq_ignore_ascii_case(OPENID)
            || s.eq_ignore_ascii_case(PROFILE)
            || s == client_id
    })
}

/// Rejects blank entries and scopes with embedded whitespace.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] on the first malformed scope.
pub fn validate_scopes(scopes: &[String]) -> Result<(), Error> {
    for scope in scopes {
        if scope.trim().is_empty() {
            return Err(Error::InvalidRequest("scope must not be empty".into()));
        }
        if scope.chars().any(char::is_whitespace) {
            return Err(Error::InvalidRequest(format!(
                "scope must not contain whitespace: '{scope}'"
            )));
        }
    }
    Ok(())
}
