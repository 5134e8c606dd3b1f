/*!
 * Resolution of numeric owner and group ids to display strings
 */

use std::collections::HashMap;

use nix::unistd::{Gid, Group, Uid, User};
use tracing::debug;

/// Memoising uid/gid resolver
///
/// Lookups go through the system user and group databases of the process
/// running the walk. Misses are cached as well, so an unknown id costs one
/// lookup per run.
#[derive(Debug, Default)]
pub struct OwnerResolver {
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
}

impl OwnerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display string for a uid, `name(uid)` or `(uid)`
    pub fn user(&mut self, uid: u32) -> String {
        self.users
            .entry(uid)
            .or_insert_with(|| {
                let name = match User::from_uid(Uid::from_raw(uid)) {
                    Ok(Some(user)) => Some(user.name),
                    Ok(None) => None,
                    Err(e) => {
                        debug!("user lookup for {} failed: {}", uid, e);
                        None
                    }
                };
                display_id(name.as_deref(), uid)
            })
            .clone()
    }

    /// Display string for a gid, `name(gid)` or `(gid)`
    pub fn group(&mut self, gid: u32) -> String {
        self.groups
            .entry(gid)
            .or_insert_with(|| {
                let name = match Group::from_gid(Gid::from_raw(gid)) {
                    Ok(Some(group)) => Some(group.name),
                    Ok(None) => None,
                    Err(e) => {
                        debug!("group lookup for {} failed: {}", gid, e);
                        None
                    }
                };
                display_id(name.as_deref(), gid)
            })
            .clone()
    }
}

/// Combine an optional resolved name with the raw id
pub fn display_id(name: Option<&str>, id: u32) -> String {
    match name {
        Some(name) => format!("{}({})", name, id),
        None => format!("({})", id),
    }
}

/// Recover the numeric id from a display string such as `nginx(101)`
pub fn parse_display_id(display: &str) -> Option<u32> {
    let open = display.rfind('(')?;
    let close = display.rfind(')')?;
    if open >= close {
        return None;
    }
    display[open + 1..close].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_id_forms() {
        assert_eq!(display_id(Some("nginx"), 101), "nginx(101)");
        assert_eq!(display_id(None, 101), "(101)");
    }

    #[test]
    fn test_parse_display_id() {
        assert_eq!(parse_display_id("nginx(101)"), Some(101));
        assert_eq!(parse_display_id("(0)"), Some(0));
        assert_eq!(parse_display_id("weird(name)(42)"), Some(42));
        assert_eq!(parse_display_id("nobody"), None);
        assert_eq!(parse_display_id(")("), None);
        assert_eq!(parse_display_id("x(abc)"), None);
    }

    #[test]
    fn test_resolver_keeps_numeric_id() {
        let mut resolver = OwnerResolver::new();
        let uid = nix::unistd::getuid().as_raw();

        let display = resolver.user(uid);
        assert_eq!(parse_display_id(&display), Some(uid));
        // Second lookup is served from the cache
        assert_eq!(resolver.user(uid), display);
    }

    #[test]
    fn test_unresolvable_id_degrades_to_numeric_form() {
        let mut resolver = OwnerResolver::new();
        // Far outside any allocated range on a test host
        assert_eq!(resolver.group(3_999_999_999), "(3999999999)");
    }
}
