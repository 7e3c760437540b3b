//! Catch-all path normalisation.
//!
//! Routes are always written in one canonical syntax: `/files/*filepath` for
//! a named catch-all, `/files/*` for an anonymous one. Engines differ in what
//! they accept, so every path passes through [`fix_wildcard_path_if_need`]
//! once, at registration, and the engine receives a path it understands plus
//! the parameter key under which the matched tail will show up.

/// Capability query: can this engine bind a catch-all to a name?
pub trait WildcardSupport {
    fn supports_named_wildcard(&self) -> bool;
}

/// A fixed answer, handy for tests and for adapters with static capabilities.
impl WildcardSupport for bool {
    fn supports_named_wildcard(&self) -> bool {
        *self
    }
}

impl<T: WildcardSupport + ?Sized> WildcardSupport for &T {
    fn supports_named_wildcard(&self) -> bool {
        (**self).supports_named_wildcard()
    }
}

/// Result of normalising one route path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WildcardPath {
    /// The path to hand to the engine.
    pub path: String,
    /// Where the engine reports the matched tail: `""` when the path has no
    /// catch-all, `"*"` for an anonymous one, the name otherwise.
    pub key: String,
    /// The name written in the canonical path, if any (`"filepath"` for
    /// `/files/*filepath`), even when the engine could not keep it.
    pub name: Option<String>,
}

impl WildcardPath {
    pub fn has_wildcard(&self) -> bool {
        !self.key.is_empty()
    }
}

/// The key engines report anonymous catch-alls under.
pub const ANONYMOUS: &str = "*";

/// Rewrites `path` for an engine with the given wildcard capability.
///
/// - no `*`: path unchanged, key `""`;
/// - engine supports names: path unchanged, key is the name (or `"*"` when
///   the catch-all is already anonymous);
/// - otherwise: the name after `*` is dropped (`/files/*filepath/x` becomes
///   `/files/*/x`) and the key is `"*"`.
///
/// Only the first `*` is considered. Normalising an already-normalised path
/// returns it unchanged.
pub fn fix_wildcard_path_if_need(engine: &(impl WildcardSupport + ?Sized), path: &str) -> WildcardPath {
    let Some(star) = path.find('*') else {
        return WildcardPath { path: path.to_owned(), key: String::new(), name: None };
    };

    let after = &path[star + 1..];
    let name_len = after.find('/').unwrap_or(after.len());
    let name = &after[..name_len];
    let rest = &after[name_len..];

    let name = (!name.is_empty()).then(|| name.to_owned());

    if engine.supports_named_wildcard() {
        let key = name.clone().unwrap_or_else(|| ANONYMOUS.to_owned());
        return WildcardPath { path: path.to_owned(), key, name };
    }

    WildcardPath {
        path: format!("{}{rest}", &path[..=star]),
        key: ANONYMOUS.to_owned(),
        name,
    }
}
