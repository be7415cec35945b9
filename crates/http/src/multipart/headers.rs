/// Headers of one multipart part.
///
/// Names are matched case-insensitively but kept as they appeared on the wire. Values of a
/// repeated name are grouped under the first occurrence, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartHeaders {
    entries: Vec<(String, Vec<String>)>,
}

impl PartHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| existing.eq_ignore_ascii_case(&name)) {
            Some((_, values)) => values.push(value.into()),
            None => self.entries.push((name, vec![value.into()])),
        }
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    /// Iterates names with their values, names in their original casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn content_type(&self) -> Option<mime::Mime> {
        self.get("content-type").and_then(|value| value.parse().ok())
    }

    /// The `name` parameter of `Content-Disposition`.
    pub fn field_name(&self) -> Option<&str> {
        self.disposition_param("name")
    }

    /// The `filename` parameter of `Content-Disposition`.
    pub fn file_name(&self) -> Option<&str> {
        self.disposition_param("filename")
    }

    fn disposition_param(&self, param: &str) -> Option<&str> {
        let disposition = self.get("content-disposition")?;
        disposition.split(';').skip(1).find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case(param) {
                return None;
            }
            let value = value.trim();
            Some(value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_keep_their_casing() {
        let mut headers = PartHeaders::new();
        headers.append("content-TYPE", "text/plain");
        headers.append("X-Tag", "a");
        headers.append("x-tag", "b");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get_all("X-TAG"), ["a".to_string(), "b".to_string()]);

        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["content-TYPE", "X-Tag"]);
        assert!(headers.get("missing").is_none());
    }

    #[test]
    fn disposition_params() {
        let mut headers = PartHeaders::new();
        headers.append("Content-Disposition", r#"form-data; name="my field"; filename="file abc.txt""#);
        headers.append("Content-Type", "image/png");

        assert_eq!(headers.field_name(), Some("my field"));
        assert_eq!(headers.file_name(), Some("file abc.txt"));
        assert_eq!(headers.content_type(), Some(mime::IMAGE_PNG));

        let mut headers = PartHeaders::new();
        headers.append("Content-Disposition", "form-data; name=plain");
        assert_eq!(headers.field_name(), Some("plain"));
        assert_eq!(headers.file_name(), None);
    }
}
