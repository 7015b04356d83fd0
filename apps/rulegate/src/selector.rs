//! File selection for rules: language, include and exclude filters.
//!
//! All functions here are pure. Paths are compared with `/` separators
//! regardless of platform, and globs use double-star semantics: `**` spans
//! any number of path segments while `*` stays inside one segment.

use crate::models::rule::Selector;
use globset::GlobBuilder;
use std::borrow::Cow;
use std::path::Path;

type LanguageEntry = (&'static str, &'static [&'static str], &'static [&'static str]);

/// Canonical language names with their aliases and file extensions.
/// Order matters for `detect_language`: the first entry owning an
/// extension wins.
const LANGUAGES: &[LanguageEntry] = &[
    ("javascript", &["js"], &["js", "mjs", "cjs"]),
    ("typescript", &["ts"], &["ts", "mts", "cts"]),
    ("jsx", &[], &["jsx"]),
    ("tsx", &[], &["tsx"]),
    ("python", &["py"], &["py", "pyi", "pyw"]),
    ("go", &["golang"], &["go"]),
    ("java", &[], &["java"]),
    ("c", &[], &["c", "h"]),
    ("cpp", &["c++"], &["cpp", "cc", "cxx", "hpp", "hh", "hxx"]),
    ("rust", &[], &["rs"]),
    ("ruby", &[], &["rb"]),
    ("php", &[], &["php"]),
    ("swift", &[], &["swift"]),
    ("kotlin", &[], &["kt", "kts"]),
    ("scala", &[], &["scala"]),
    ("shell", &["sh"], &["sh", "bash", "zsh"]),
];

/// Language assumed when neither the rule nor the files say otherwise.
pub const DEFAULT_LANGUAGE: &str = "javascript";

fn lookup(language: &str) -> Option<&'static LanguageEntry> {
    let lang = language.trim().to_ascii_lowercase();
    LANGUAGES
        .iter()
        .find(|(name, aliases, _)| *name == lang || aliases.contains(&lang.as_str()))
}

fn extensions_for(language: &str) -> Option<&'static [&'static str]> {
    lookup(language).map(|(_, _, exts)| *exts)
}

/// Canonical name for a language or one of its aliases, case-insensitive.
pub fn canonical_language(language: &str) -> Option<&'static str> {
    lookup(language).map(|(name, _, _)| *name)
}

fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

fn to_slash(path: &str) -> Cow<'_, str> {
    if path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        Cow::Borrowed(path)
    }
}

/// Whether the file extension of `path` belongs to `language`.
///
/// Language names are case-insensitive and accept common aliases
/// (`js`, `ts`, `py`, `golang`, `c++`, `sh`). Unknown languages never match.
pub fn matches_language(path: &str, language: &str) -> bool {
    let Some(exts) = extensions_for(language) else {
        return false;
    };
    match extension_of(path) {
        Some(ext) => exts.contains(&ext.as_str()),
        None => false,
    }
}

/// Double-star glob match on a normalized path.
///
/// Invalid patterns never match.
pub fn match_glob(path: &str, pattern: &str) -> bool {
    let path = to_slash(path);
    let pattern = to_slash(pattern);
    match GlobBuilder::new(&pattern).literal_separator(true).build() {
        Ok(glob) => glob.compile_matcher().is_match(path.as_ref()),
        Err(_) => false,
    }
}

/// Whether `path` passes every criterion of `selector`.
///
/// `None` matches everything. Empty lists impose no constraint. Exclude
/// globs reject regardless of language and include matches.
pub fn matches_selector(path: &str, selector: Option<&Selector>) -> bool {
    let Some(sel) = selector else {
        return true;
    };
    let path = to_slash(path);

    if !sel.languages.is_empty() && !sel.languages.iter().any(|l| matches_language(&path, l)) {
        return false;
    }
    if !sel.include.is_empty() && !sel.include.iter().any(|p| match_glob(&path, p)) {
        return false;
    }
    !sel.exclude.iter().any(|p| match_glob(&path, p))
}

/// Keep the files matching `selector`, in input order.
///
/// Returns the input untouched (borrowed) when there is no selector.
pub fn filter_files<'a>(files: &'a [String], selector: Option<&Selector>) -> Cow<'a, [String]> {
    match selector {
        None => Cow::Borrowed(files),
        Some(_) => Cow::Owned(
            files
                .iter()
                .filter(|f| matches_selector(f, selector))
                .cloned()
                .collect(),
        ),
    }
}

/// Canonical language for a file, by extension.
pub fn language_of(path: &str) -> Option<&'static str> {
    let ext = extension_of(path)?;
    LANGUAGES
        .iter()
        .find(|(_, _, exts)| exts.contains(&ext.as_str()))
        .map(|(name, _, _)| *name)
}

/// Governing language for a rule evaluation: the first selector language
/// (canonicalized), else the language of the first file, else
/// `DEFAULT_LANGUAGE`.
pub fn detect_language(selector: Option<&Selector>, files: &[String]) -> String {
    if let Some(lang) = selector.and_then(|s| s.languages.first()) {
        return match canonical_language(lang) {
            Some(name) => name.to_string(),
            None => lang.trim().to_ascii_lowercase(),
        };
    }
    files
        .first()
        .and_then(|f| language_of(f))
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(languages: &[&str], include: &[&str], exclude: &[&str]) -> Selector {
        Selector {
            languages: languages.iter().map(|s| s.to_string()).collect(),
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn files(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_match_glob_table() {
        let cases = [
            ("main.go", "main.go", true),
            ("main.go", "*.go", true),
            ("main.go", "main.*", true),
            ("main.go", "*.js", false),
            ("src/main.go", "**/*.go", true),
            ("main.go", "**/*.go", true),
            ("src/foo/bar/test.js", "src/**/*.js", true),
            ("test/main.go", "src/**/*.go", false),
            ("src/foo/bar/baz/test.ts", "src/**/test.ts", true),
            ("src/components/Button.tsx", "src/components/*.tsx", true),
            ("src/components/ui/Button.tsx", "src/components/*.tsx", false),
            ("src/main_test.go", "**/*_test.go", true),
            ("tests/unit/main.go", "tests/**/*.go", true),
            ("src\\subdir\\main.go", "src/**/*.go", true),
            ("main.go", "", false),
            ("src/foo/bar/test_main.go", "src/**/test_*.go", true),
        ];
        for (path, pattern, want) in cases {
            assert_eq!(match_glob(path, pattern), want, "{path} vs {pattern}");
        }
    }

    #[test]
    fn test_invalid_glob_never_matches() {
        assert!(!match_glob("src/a.js", "src/[a.js"));
    }

    #[test]
    fn test_matches_language_aliases_and_case() {
        assert!(matches_language("main.mjs", "javascript"));
        assert!(matches_language("main.cjs", "JS"));
        assert!(matches_language("main.cts", "TypeScript"));
        assert!(matches_language("Component.tsx", "tsx"));
        assert!(!matches_language("Component.tsx", "typescript"));
        assert!(matches_language("main.pyi", "py"));
        assert!(matches_language("main.go", "golang"));
        assert!(matches_language("Main.JAVA", "java"));
        assert!(matches_language("lib.hxx", "c++"));
        assert!(matches_language("run.zsh", "shell"));
        assert!(!matches_language("main.go", "cobol"));
        assert!(!matches_language("Makefile", "c"));
    }

    #[test]
    fn test_none_selector_matches_everything() {
        assert!(matches_selector("anything.xyz", None));
        let input = files(&["a.js", "b.py"]);
        let out = filter_files(&input, None);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out.as_ref(), input.as_slice());
    }

    #[test]
    fn test_empty_lists_are_no_constraint() {
        let s = Selector::default();
        assert!(matches_selector("deep/nested/file.rb", Some(&s)));
    }

    #[test]
    fn test_exclude_takes_precedence() {
        let s = sel(&["javascript"], &["src/**/*.js"], &["**/*.test.js"]);
        assert!(matches_selector("src/app/main.js", Some(&s)));
        assert!(!matches_selector("src/app/main.test.js", Some(&s)));
        assert!(!matches_selector("lib/main.js", Some(&s)));
        assert!(!matches_selector("src/app/main.ts", Some(&s)));
    }

    #[test]
    fn test_filter_preserves_order_and_is_idempotent() {
        let s = sel(&["typescript", "javascript"], &[], &["vendor/**"]);
        let input = files(&[
            "z.ts",
            "vendor/lib.js",
            "a.js",
            "README.md",
            "m/n.mts",
            "b.py",
        ]);
        let once = filter_files(&input, Some(&s)).into_owned();
        assert_eq!(once, files(&["z.ts", "a.js", "m/n.mts"]));
        let twice = filter_files(&once, Some(&s)).into_owned();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_detect_language_order() {
        let s = sel(&["Java"], &[], &[]);
        assert_eq!(detect_language(Some(&s), &files(&["a.ts"])), "java");
        assert_eq!(detect_language(None, &files(&["src/x.tsx", "a.js"])), "tsx");
        assert_eq!(detect_language(None, &files(&["notes.txt"])), DEFAULT_LANGUAGE);
        assert_eq!(detect_language(None, &[]), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_detect_language_resolves_aliases() {
        for (alias, canonical) in [
            ("JS", "javascript"),
            ("ts", "typescript"),
            ("py", "python"),
            ("golang", "go"),
            ("c++", "cpp"),
            ("sh", "shell"),
        ] {
            let s = sel(&[alias], &[], &[]);
            assert_eq!(detect_language(Some(&s), &[]), canonical, "{alias}");
        }
        let unknown = sel(&["Elixir"], &[], &[]);
        assert_eq!(detect_language(Some(&unknown), &[]), "elixir");
        assert_eq!(canonical_language("TypeScript"), Some("typescript"));
        assert_eq!(canonical_language("cobol"), None);
    }
}
