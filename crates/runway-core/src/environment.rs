use std::fmt;

/// Name of a deployment target, e.g. `dev`, `prod`, `preview-alice`.
///
/// Every provisioned resource is named after it, so it is resolved once at
/// startup and never changes for the rest of the invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Environment(String);

impl Environment {
    /// Used when neither an explicit name nor the operator's identity is known.
    pub const FALLBACK: &'static str = "preview-local";

    const PREVIEW_PREFIX: &'static str = "preview-";

    /// Explicit name > `preview-<identity>` > [`Environment::FALLBACK`].
    ///
    /// No validation happens here; call [`Environment::validate`] before the
    /// name reaches any provider call.
    pub fn resolve(explicit: Option<&str>, identity: Option<&str>) -> Self {
        if let Some(name) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
            return Self(name.to_owned());
        }
        match identity.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Self(format!("{}{id}", Self::PREVIEW_PREFIX)),
            None => Self(Self::FALLBACK.to_owned()),
        }
    }

    /// Resolve against the invoking user (`$USER`, then `$USERNAME`) and validate.
    pub fn from_args(explicit: Option<&str>) -> crate::Result<Self> {
        let identity = current_identity();
        let env = Self::resolve(explicit, identity.as_deref());
        env.validate()?;
        Ok(env)
    }

    /// A validated environment from an explicit name.
    pub fn parse(name: &str) -> crate::Result<Self> {
        let env = Self(name.trim().to_owned());
        env.validate()?;
        Ok(env)
    }

    /// Checks the character rules shared by CloudFormation stack names,
    /// ECR repository names, and App Runner service names.
    pub fn validate(&self) -> crate::Result<()> {
        check_name_chars(&self.0).map_err(|reason| crate::Error::InvalidEnvironment {
            name: self.0.clone(),
            reason,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Login name of the invoking user, if the environment exposes one.
pub fn current_identity() -> Option<String> {
    ["USER", "USERNAME"].iter().find_map(|key| {
        std::env::var_os(key)
            .and_then(|v| v.to_str().map(str::trim).map(str::to_owned))
            .filter(|v| !v.is_empty())
    })
}

/// Lowercase letters, digits, and single hyphens; starts with a letter.
pub(crate) fn check_name_chars(name: &str) -> std::result::Result<(), &'static str> {
    let Some(first) = name.chars().next() else {
        return Err("must not be empty");
    };
    if !first.is_ascii_lowercase() {
        return Err("must start with a lowercase letter");
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return if bad.is_ascii_uppercase() {
            Err("uppercase letters are not allowed")
        } else {
            Err("only lowercase letters, digits, and '-' are allowed")
        };
    }
    if name.ends_with('-') {
        return Err("must not end with '-'");
    }
    if name.contains("--") {
        return Err("must not contain '--'");
    }
    Ok(())
}
