use std::io::Cursor;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraSummary {
    pub make: Option<String>,
    pub model: Option<String>,
    pub software: Option<String>,
}

impl CameraSummary {
    pub fn describe(&self) -> String {
        let camera = match (&self.make, &self.model) {
            (Some(make), Some(model)) => format!("{make} {model}"),
            (Some(only), None) | (None, Some(only)) => only.clone(),
            (None, None) => "unknown camera".into(),
        };

        match &self.software {
            Some(software) => format!("{camera} ({software})"),
            None => camera,
        }
    }
}

pub struct ExifExtractor;

impl ExifExtractor {
    /// Reads the camera summary from an in-memory image container.
    ///
    /// Missing or malformed EXIF is not an error; it simply yields `None`.
    pub fn extract(data: &[u8]) -> Option<CameraSummary> {
        let mut reader = Cursor::new(data);
        let exif_data = exif::Reader::new().read_from_container(&mut reader).ok()?;

        let field = |tag: exif::Tag| {
            exif_data
                .get_field(tag, exif::In::PRIMARY)
                .map(|f| f.display_value().to_string().trim_matches('"').trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let summary = CameraSummary {
            make: field(exif::Tag::Make),
            model: field(exif::Tag::Model),
            software: field(exif::Tag::Software),
        };

        if summary.make.is_none() && summary.model.is_none() && summary.software.is_none() {
            None
        } else {
            Some(summary)
        }
    }
}
