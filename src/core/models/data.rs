use futures::future::BoxFuture;

use crate::core::errors::Result;

/// Raw bytes handed to the dispatcher, with whatever metadata the source
/// (file, fetch, fragment) could provide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Input {
    pub data: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl Input {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// The input as text, if it is non-empty and strictly valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data)
            .ok()
            .filter(|text| !text.is_empty())
    }
}

/// A lazily produced list of lazily read inputs.
///
/// Every dropped path becomes one batch; a directory expands to several
/// inputs. Both levels are awaited in order.
pub type InputBatch = BoxFuture<'static, Result<Vec<BoxFuture<'static, Result<Input>>>>>;

/// A downloadable result before it is materialized into a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub data: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub title: Option<String>,
    pub kind: Option<String>,
}

/// Informational text shown as a result slot.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Info {
    pub error: bool,
    pub info: String,
}

impl Info {
    pub fn ok(info: impl Into<String>) -> Self {
        Self {
            error: false,
            info: info.into(),
        }
    }

    pub fn error(info: impl Into<String>) -> Self {
        Self {
            error: true,
            info: info.into(),
        }
    }
}

/// Drop a trailing `.pgp`, `.gpg` or `.asc` from a filename.
pub fn strip_openpgp_suffix(filename: &str) -> &str {
    [".pgp", ".gpg", ".asc"]
        .iter()
        .find_map(|suffix| filename.strip_suffix(suffix))
        .unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_rejects_invalid_utf8_and_empty_input() {
        assert_eq!(Input::new("hello").text(), Some("hello"));
        assert_eq!(Input::new(Vec::new()).text(), None);
        assert_eq!(Input::new(vec![0xff, 0xfe, 0x00]).text(), None);
    }

    #[test]
    fn strip_suffix_only_strips_openpgp_extensions() {
        assert_eq!(strip_openpgp_suffix("report.pdf.pgp"), "report.pdf");
        assert_eq!(strip_openpgp_suffix("notes.txt.asc"), "notes.txt");
        assert_eq!(strip_openpgp_suffix("key.gpg"), "key");
        assert_eq!(strip_openpgp_suffix("archive.tar"), "archive.tar");
    }
}
