use crate::UrlError;

/// One line of a per-domain frontier file: `url|depth|priority|added_at\n`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
    pub priority: u32,
    pub added_at: i64,
}

impl FrontierEntry {
    pub fn new(url: String, depth: u32, added_at: i64) -> Self {
        Self {
            url,
            depth,
            priority: 0,
            added_at,
        }
    }

    pub fn serialize(&self) -> String {
        format!(
            "{}|{}|{}|{}\n",
            self.url, self.depth, self.priority, self.added_at
        )
    }

    /// Parses one already-trimmed line (no trailing newline) back into an entry.
    pub fn parse(line: &str) -> Result<Self, UrlError> {
        let mut parts = line.splitn(4, '|');
        let url = parts
            .next()
            .ok_or_else(|| UrlError::Malformed("missing url field".to_string()))?
            .to_string();
        let depth = parts
            .next()
            .ok_or_else(|| UrlError::Malformed("missing depth field".to_string()))?
            .parse()
            .map_err(|_| UrlError::Malformed("invalid depth field".to_string()))?;
        let priority = parts
            .next()
            .ok_or_else(|| UrlError::Malformed("missing priority field".to_string()))?
            .parse()
            .map_err(|_| UrlError::Malformed("invalid priority field".to_string()))?;
        let added_at = parts
            .next()
            .ok_or_else(|| UrlError::Malformed("missing added_at field".to_string()))?
            .parse()
            .map_err(|_| UrlError::Malformed("invalid added_at field".to_string()))?;
        Ok(Self {
            url,
            depth,
            priority,
            added_at,
        })
    }
}
