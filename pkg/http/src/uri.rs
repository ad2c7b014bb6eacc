//! Server address derivation and the placeholder substitution used on
//! every endpoint template (spec §4.5). Deliberately not a generic
//! template engine — just sequential literal replacement of the four
//! placeholders the API ever uses, per design note "URL placeholder
//! substitution" in SPEC_FULL.md/spec.md §9.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Live,
    Test,
}

/// Derives the `g-<gameId>.modapi.io` / `g-<gameId>.test.mod.io` host,
/// or an explicit override if one was configured (e.g. a private
/// on-premise deployment).
pub fn server_host(game_id: u64, environment: Environment, override_host: Option<&str>) -> String {
    if let Some(host) = override_host {
        return host.to_string();
    }
    match environment {
        Environment::Live => format!("g-{}.modapi.io", game_id),
        Environment::Test => format!("g-{}.test.mod.io", game_id),
    }
}

/// Replaces `{game-id}`, `{mod-id}`, `{user-id}`, and `{collection-id}`
/// in `template` with the given values, when present.
pub fn substitute_placeholders(
    template: &str,
    game_id: Option<u64>,
    mod_id: Option<u64>,
    user_id: Option<u64>,
    collection_id: Option<u64>,
) -> String {
    let mut out = template.to_string();
    if let Some(v) = game_id {
        out = out.replace("{game-id}", &v.to_string());
    }
    if let Some(v) = mod_id {
        out = out.replace("{mod-id}", &v.to_string());
    }
    if let Some(v) = user_id {
        out = out.replace("{user-id}", &v.to_string());
    }
    if let Some(v) = collection_id {
        out = out.replace("{collection-id}", &v.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_host_uses_modapi_domain() {
        assert_eq!(server_host(42, Environment::Live, None), "g-42.modapi.io");
    }

    #[test]
    fn test_host_uses_test_domain() {
        assert_eq!(server_host(42, Environment::Test, None), "g-42.test.mod.io");
    }

    #[test]
    fn override_host_wins() {
        assert_eq!(
            server_host(42, Environment::Live, Some("modio.internal.example")),
            "modio.internal.example"
        );
    }

    #[test]
    fn substitutes_known_placeholders_only() {
        let path = substitute_placeholders(
            "/v1/games/{game-id}/mods/{mod-id}/users/{user-id}",
            Some(42),
            Some(7),
            Some(99),
            None,
        );
        assert_eq!(path, "/v1/games/42/mods/7/users/99");
    }

    #[test]
    fn leaves_unprovided_placeholders_untouched() {
        let path = substitute_placeholders("/v1/games/{game-id}/collections/{collection-id}", Some(42), None, None, None);
        assert_eq!(path, "/v1/games/42/collections/{collection-id}");
    }
}
