//! Deterministic names derived from the image tag and the project directory
//!
//! Two projects whose work directories share a basename and that use the
//! same image get the same container name. That is left to the operator.

use std::path::{Path, PathBuf};

const REPLACEMENT: char = '_';

fn is_name_safe(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-'
}

/// Last path component, ignoring trailing separators
fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Lower-case `image_tag` and replace everything outside `[a-z0-9_-]` with `_`.
///
/// Lower-casing is per character and Unicode aware, so U+212A (Kelvin sign)
/// becomes `k`. Each input character yields exactly one output character.
pub fn gen_image_name(image_tag: &str) -> String {
    image_tag
        .chars()
        .map(|ch| ch.to_lowercase().next().unwrap_or(ch))
        .map(|ch| if is_name_safe(ch) { ch } else { REPLACEMENT })
        .collect()
}

/// `<image>_<workdir basename>`
pub fn gen_container_name(image_tag: &str, work_dir: &Path) -> String {
    format!("{}_{}", gen_image_name(image_tag), base_name(work_dir))
}

/// `.<workdir basename>--<image>--dev-home`
pub fn gen_dev_home_dir_name(image_tag: &str, work_dir: &Path) -> String {
    format!(
        ".{}--{}--dev-home",
        base_name(work_dir),
        gen_image_name(image_tag)
    )
}

/// Dev-home directory, next to the work dir inside its parent
pub fn dev_home_dir(image_tag: &str, work_dir: &Path) -> PathBuf {
    work_dir
        .parent()
        .unwrap_or(work_dir)
        .join(gen_dev_home_dir_name(image_tag, work_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_name_replaces_unsafe_chars() {
        assert_eq!(gen_image_name("My/Image:1.0"), "my_image_1_0");
        assert_eq!(
            gen_image_name("registry.example.com:5000/team/dev-env:latest"),
            "registry_example_com_5000_team_dev-env_latest"
        );
        assert_eq!(gen_image_name("already_safe-1"), "already_safe-1");
        assert_eq!(gen_image_name(""), "");
    }

    #[test]
    fn test_image_name_alphabet() {
        let samples = [
            "UPPER lower",
            "tabs\tand\nnewlines",
            "ümlaut/ß/日本語",
            "sha256@deadBEEF",
            "~!#$%^&*()+=",
        ];
        for sample in samples {
            let name = gen_image_name(sample);
            assert!(name.chars().all(is_name_safe), "{:?} -> {:?}", sample, name);
            assert_eq!(name.chars().count(), sample.chars().count());
        }
    }

    #[test]
    fn test_unicode_lowercase() {
        assert_eq!(gen_image_name("\u{212A}"), "k");
        assert_eq!(gen_image_name("\u{212A}ube:V1"), "kube_v1");
        // dotted capital I lowers to `i` plus a combining dot; only `i` is kept
        assert_eq!(gen_image_name("\u{0130}mage"), "image");
        assert_eq!(gen_image_name("\u{00C9}T\u{00C9}"), "_t_");
    }

    #[test]
    fn test_container_name() {
        assert_eq!(gen_container_name("demo", Path::new("/proj/app")), "demo_app");
        assert_eq!(
            gen_container_name("Go:1.22", Path::new("/home/me/src/api/")),
            "go_1_22_api"
        );
    }

    #[test]
    fn test_names_are_stable() {
        let work_dir = Path::new("/proj/app");
        assert_eq!(
            gen_container_name("demo", work_dir),
            gen_container_name("demo", work_dir)
        );
        assert_eq!(
            gen_dev_home_dir_name("demo", work_dir),
            gen_dev_home_dir_name("demo", work_dir)
        );
    }

    #[test]
    fn test_dev_home_dir_sits_in_parent() {
        assert_eq!(
            gen_dev_home_dir_name("My/Image:1.0", Path::new("/proj/app")),
            ".app--my_image_1_0--dev-home"
        );
        assert_eq!(
            dev_home_dir("demo", Path::new("/proj/app")),
            PathBuf::from("/proj/.app--demo--dev-home")
        );
    }

    #[test]
    fn test_relative_work_dir() {
        assert_eq!(gen_container_name("demo", Path::new("app")), "demo_app");
        assert_eq!(
            dev_home_dir("demo", Path::new("src/app")),
            PathBuf::from("src/.app--demo--dev-home")
        );
    }
}
