//! Placeholder substitution in argv templates.

use std::collections::BTreeMap;

use galera_cluster::{MemberRef, Role};

use crate::Error;

/// Values substituted into `{name}` placeholders.
#[derive(Clone, Debug, Default)]
pub struct Vars(BTreeMap<&'static str, String>);

impl Vars {
    /// Variables describing one member: `{cluster}`, `{namespace}`, `{member}`,
    /// `{ordinal}`, and an empty `{peer}` and `{role}`.
    #[must_use]
    pub fn for_member(member: &MemberRef) -> Self {
        Self::default()
            .with("cluster", &member.cluster.name)
            .with("namespace", &member.cluster.namespace)
            .with("member", member.name())
            .with("ordinal", member.ordinal.to_string())
            .with("peer", "")
            .with("role", "")
    }

    /// Sets one variable.
    #[must_use]
    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.0.insert(name, value.into());
        self
    }

    /// Sets `{peer}` to the peer's compute unit name.
    #[must_use]
    pub fn with_peer(self, peer: Option<&MemberRef>) -> Self {
        self.with("peer", peer.map(MemberRef::name).unwrap_or_default())
    }

    /// Sets `{role}`.
    #[must_use]
    pub fn with_role(self, role: Role) -> Self {
        match role {
            Role::Unknown => self.with("role", ""),
            role => self.with("role", role.as_str()),
        }
    }

    fn substitute(&self, arg: &str) -> String {
        self.0.iter().fold(arg.to_string(), |arg, (name, value)| {
            arg.replace(&format!("{{{name}}}"), value)
        })
    }
}

/// Renders one template. Unknown placeholders are left untouched.
///
/// # Errors
///
/// Returns an error if the template has no program.
pub fn render(
    operation: &'static str,
    template: &[String],
    vars: &Vars,
) -> Result<Vec<String>, Error> {
    let argv: Vec<String> = template.iter().map(|arg| vars.substitute(arg)).collect();
    match argv.first() {
        Some(program) if !program.trim().is_empty() => Ok(argv),
        _ => Err(Error::EmptyTemplate(operation)),
    }
}
