//! Format converters normalizing source files to Markdown.
//!
//! The engine only ever indexes Markdown; everything else goes through a
//! [`Converter`] first. Markdown, plain text, and SubRip subtitles ship
//! built in. EPUB and PDF are external collaborators: register an
//! implementation for their extensions and the scanner and `add` pick them
//! up, otherwise those files are rejected as unsupported.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Source extensions the engine knows about, registered or not.
pub const KNOWN_EXTENSIONS: [&str; 6] = ["md", "markdown", "epub", "pdf", "srt", "txt"];

/// Converts one source format to Markdown text. Implementations should fail
/// fast on malformed input; the engine treats failures as per-file skips.
pub trait Converter: Send + Sync {
    fn convert(&self, input: &[u8]) -> Result<String>;
}

/// Extension-keyed converter table.
pub struct ConverterRegistry {
    by_extension: HashMap<String, Box<dyn Converter>>,
}

impl ConverterRegistry {
    /// Registry with the built-in Markdown, text, and subtitle converters.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            by_extension: HashMap::new(),
        };
        registry.register("md", Box::new(MarkdownConverter));
        registry.register("markdown", Box::new(MarkdownConverter));
        registry.register("txt", Box::new(TextConverter));
        registry.register("srt", Box::new(SrtConverter));
        registry
    }

    /// Register (or replace) the converter for an extension.
    pub fn register(&mut self, extension: &str, converter: Box<dyn Converter>) {
        self.by_extension
            .insert(extension.to_ascii_lowercase(), converter);
    }

    /// Whether files with this extension can be converted.
    #[must_use]
    pub fn supports(&self, extension: &str) -> bool {
        self.by_extension
            .contains_key(&extension.to_ascii_lowercase())
    }

    /// Convert raw bytes of the given extension to Markdown.
    pub fn convert(&self, extension: &str, input: &[u8]) -> Result<String> {
        let key = extension.to_ascii_lowercase();
        match self.by_extension.get(&key) {
            Some(converter) => converter.convert(input),
            None => Err(Error::UnsupportedFormat(key)),
        }
    }
}

/// Markdown passes through untouched apart from lossy UTF-8 decoding.
struct MarkdownConverter;

impl Converter for MarkdownConverter {
    fn convert(&self, input: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(input).into_owned())
    }
}

/// Plain text is valid Markdown already.
struct TextConverter;

impl Converter for TextConverter {
    fn convert(&self, input: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(input).into_owned())
    }
}

/// SubRip subtitles: cue numbers and timestamp lines dropped, cue text
/// gathered into paragraphs.
struct SrtConverter;

impl Converter for SrtConverter {
    fn convert(&self, input: &[u8]) -> Result<String> {
        let text = String::from_utf8_lossy(input);
        if !text.contains("-->") {
            return Err(Error::Parse("not a SubRip subtitle file".into()));
        }

        let mut paragraphs = Vec::new();
        for block in text.split("\n\n") {
            let mut lines = Vec::new();
            for line in block.lines() {
                let trimmed = line.trim().trim_start_matches('\u{feff}');
                if trimmed.is_empty()
                    || trimmed.contains("-->")
                    || trimmed.chars().all(|c| c.is_ascii_digit())
                {
                    continue;
                }
                lines.push(trimmed);
            }
            if !lines.is_empty() {
                paragraphs.push(lines.join(" "));
            }
        }
        Ok(paragraphs.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_cover_markdown_text_srt() {
        let registry = ConverterRegistry::with_builtins();
        assert!(registry.supports("md"));
        assert!(registry.supports("MARKDOWN"));
        assert!(registry.supports("txt"));
        assert!(registry.supports("srt"));
        assert!(!registry.supports("pdf"));
        assert!(!registry.supports("epub"));
    }

    #[test]
    fn unregistered_extension_is_unsupported() {
        let registry = ConverterRegistry::with_builtins();
        let err = registry.convert("pdf", b"%PDF-1.4").unwrap_err();
        assert_eq!(err.category(), "unsupported_format");
    }

    #[test]
    fn markdown_passes_through() {
        let registry = ConverterRegistry::with_builtins();
        let out = registry.convert("md", "# Título\n\ncuerpo\n".as_bytes()).unwrap();
        assert_eq!(out, "# Título\n\ncuerpo\n");
    }

    #[test]
    fn srt_drops_cues_and_timestamps() {
        let srt = "1\n00:00:01,000 --> 00:00:03,000\nHello there\nfriend\n\n\
                   2\n00:00:04,000 --> 00:00:06,000\nSecond cue\n";
        let registry = ConverterRegistry::with_builtins();
        let out = registry.convert("srt", srt.as_bytes()).unwrap();
        assert_eq!(out, "Hello there friend\n\nSecond cue");
    }

    #[test]
    fn srt_rejects_non_subtitles() {
        let registry = ConverterRegistry::with_builtins();
        assert!(registry.convert("srt", b"just some text").is_err());
    }

    #[test]
    fn external_converter_can_be_registered() {
        struct Fake;
        impl Converter for Fake {
            fn convert(&self, _input: &[u8]) -> Result<String> {
                Ok("# from pdf".into())
            }
        }
        let mut registry = ConverterRegistry::with_builtins();
        registry.register("pdf", Box::new(Fake));
        assert!(registry.supports("pdf"));
        assert_eq!(registry.convert("pdf", b"x").unwrap(), "# from pdf");
    }
}
