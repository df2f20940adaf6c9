use crate::error::{Error, Result};
use include_dir::{include_dir, Dir};
use serde::Deserialize;
use std::fs;
use std::path::Path;

static LANG_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/lang");

const FALLBACK_WORDS: [&str; 10] = [
    "apple", "banana", "cherry", "dragon", "elephant", "forest", "galaxy", "house", "island",
    "jungle",
];

/// A list of candidate words for the words game.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Dictionary {
    pub name: String,
    #[serde(default)]
    pub size: u32,
    pub words: Vec<String>,
}

impl Dictionary {
    /// Load one of the dictionaries compiled into the binary.
    pub fn bundled(name: &str) -> Result<Self> {
        let file = LANG_DIR
            .get_file(format!("{name}.json"))
            .ok_or_else(|| Error::DictionaryNotFound(name.to_string()))?;
        let contents = file
            .contents_utf8()
            .ok_or_else(|| Error::DictionaryNotFound(name.to_string()))?;
        let mut dictionary: Dictionary = serde_json::from_str(contents)?;
        dictionary.size = dictionary.words.len() as u32;

        Ok(dictionary)
    }

    /// Names of the bundled dictionaries, sorted.
    pub fn bundled_names() -> Vec<String> {
        let mut names: Vec<String> = LANG_DIR
            .files()
            .filter_map(|f| f.path().file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Load a newline-separated word list; blank and multi-word lines are skipped.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".to_string());

        Ok(Self::from_lines(name, &text))
    }

    /// Answers are split on whitespace, so a line holding a phrase could never be typed back.
    pub fn from_lines(name: impl Into<String>, text: &str) -> Self {
        let name = name.into();
        let (words, phrases): (Vec<&str>, Vec<&str>) = text
            .lines()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .partition(|w| !w.contains(char::is_whitespace));

        if !phrases.is_empty() {
            log::warn!(
                "skipped {} multi-word lines in {name}, e.g. {:?}",
                phrases.len(),
                phrases[0]
            );
        }
        let words: Vec<String> = words.into_iter().map(str::to_string).collect();

        Self {
            name,
            size: words.len() as u32,
            words,
        }
    }

    /// The short built-in list used when nothing else can be loaded.
    pub fn fallback() -> Self {
        Self {
            name: "fallback".to_string(),
            size: FALLBACK_WORDS.len() as u32,
            words: FALLBACK_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Resolve a selector: an existing file path, else a bundled name, else the fallback list.
    pub fn resolve(selector: &str) -> Self {
        let as_path = Path::new(selector);
        let loaded = if as_path.is_file() {
            Self::from_path(as_path)
        } else {
            Self::bundled(selector)
        };

        match loaded {
            Ok(dictionary) => {
                log::debug!(
                    "loaded dictionary {} ({} words)",
                    dictionary.name,
                    dictionary.words.len()
                );
                dictionary
            }
            Err(e) => {
                log::warn!(
                    "falling back to the built-in word list: {e} (bundled: {})",
                    Self::bundled_names().join(", ")
                );
                Self::fallback()
            }
        }
    }

    pub fn into_words(self) -> Vec<String> {
        self.words
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_bundled_english() {
        let dict = Dictionary::bundled("english").unwrap();

        assert_eq!(dict.name, "english");
        assert!(!dict.words.is_empty());
        assert_eq!(dict.size as usize, dict.words.len());
    }

    #[test]
    fn test_bundled_names() {
        let names = Dictionary::bundled_names();
        assert!(names.contains(&"english".to_string()));
        assert!(names.contains(&"spanish".to_string()));
    }

    #[test]
    fn test_bundled_missing() {
        assert_matches!(
            Dictionary::bundled("klingon"),
            Err(Error::DictionaryNotFound(name)) if name == "klingon"
        );
    }

    #[test]
    fn test_from_lines_trims_and_skips_blanks() {
        let dict = Dictionary::from_lines("t", "  apple \n\n mango\r\n   \nkiwi");
        assert_eq!(dict.words, vec!["apple", "mango", "kiwi"]);
        assert_eq!(dict.size, 3);
    }

    #[test]
    fn test_from_lines_skips_phrases() {
        let dict = Dictionary::from_lines("t", "ice cream\napple\n  hot\tdog \nkiwi");
        assert_eq!(dict.words, vec!["apple", "kiwi"]);
        assert_eq!(dict.size, 2);
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alpha\nbeta\n\ngamma").unwrap();

        let dict = Dictionary::from_path(file.path()).unwrap();
        assert_eq!(dict.words, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_resolve_prefers_existing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "one\ntwo").unwrap();

        let dict = Dictionary::resolve(file.path().to_str().unwrap());
        assert_eq!(dict.words, vec!["one", "two"]);
    }

    #[test]
    fn test_resolve_falls_back() {
        let dict = Dictionary::resolve("does-not-exist");
        assert_eq!(dict, Dictionary::fallback());
        assert_eq!(dict.words.len(), 10);
    }
}
