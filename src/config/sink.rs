use super::*;

#[derive(Clone, Default, Deserialize)]
pub struct Sink {
    /// Append metric records to this file. When unset, records are written
    /// to stdout.
    #[serde(default)]
    file: Option<String>,
}

impl Sink {
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }
}
