//! Deterministic on-disk layout (spec §6): every path the rest of the
//! workspace needs is a pure function of a root directory plus a few
//! numeric ids, so nothing else in the crate hardcodes a path fragment.
//!
//! Grounded on the teacher's `file::local::path` helpers for joining and
//! sanitizing path segments; the actual layout (game/mods/cache/
//! metadata tree) is new to this spec and has no teacher analogue.

use std::path::{Path, PathBuf};

pub fn game_root(storage_root: &Path, game_id: u64) -> PathBuf {
    storage_root.join(game_id.to_string())
}

pub fn mods_dir(storage_root: &Path, game_id: u64) -> PathBuf {
    game_root(storage_root, game_id).join("mods")
}

pub fn mod_dir(storage_root: &Path, game_id: u64, mod_id: u64) -> PathBuf {
    mods_dir(storage_root, game_id).join(mod_id.to_string())
}

pub fn metadata_dir(storage_root: &Path, game_id: u64) -> PathBuf {
    game_root(storage_root, game_id).join("metadata")
}

pub fn user_metadata_file(storage_root: &Path, game_id: u64, user_id: u64) -> PathBuf {
    metadata_dir(storage_root, game_id).join(format!("{}.json", user_id))
}

pub fn cache_mods_dir(storage_root: &Path, game_id: u64, mod_id: u64) -> PathBuf {
    game_root(storage_root, game_id)
        .join("cache")
        .join("mods")
        .join(mod_id.to_string())
}

pub fn mod_logo_file(storage_root: &Path, game_id: u64, mod_id: u64, size_tag: &str) -> PathBuf {
    cache_mods_dir(storage_root, game_id, mod_id)
        .join("logos")
        .join(format!("{}.png", size_tag))
}

pub fn mod_gallery_file(
    storage_root: &Path,
    game_id: u64,
    mod_id: u64,
    index: usize,
    size_tag: &str,
) -> PathBuf {
    cache_mods_dir(storage_root, game_id, mod_id)
        .join("gallery")
        .join(index.to_string())
        .join(format!("{}.png", size_tag))
}

pub fn cache_users_dir(storage_root: &Path, game_id: u64, user_id: u64) -> PathBuf {
    game_root(storage_root, game_id)
        .join("cache")
        .join("users")
        .join(user_id.to_string())
}

pub fn user_avatar_file(storage_root: &Path, game_id: u64, user_id: u64, size_tag: &str) -> PathBuf {
    cache_users_dir(storage_root, game_id, user_id)
        .join("avatars")
        .join(format!("{}.png", size_tag))
}

/// The archive downloaded for `mod_id` while a download/extract is in
/// flight. Lives alongside (not inside) the mod's own directory, so a
/// partial download never shows up as part of the installed payload.
pub fn mod_archive_file(storage_root: &Path, game_id: u64, mod_id: u64) -> PathBuf {
    mods_dir(storage_root, game_id).join(format!("{}.zip", mod_id))
}

/// The side file a download writes into before it's renamed onto its
/// final path, used both to detect a resumable partial transfer and to
/// make a cancelled download leave nothing at the real destination.
pub fn download_side_file(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_owned())
        .unwrap_or_default();
    name.push(".download");
    final_path.with_file_name(name)
}
