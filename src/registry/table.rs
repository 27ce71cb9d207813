//! Table descriptions - the static shape of every catalog table

/// A foreign-key-like link: the owning table references `target` by
/// equality on `column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub target: &'static str,
    pub column: &'static str,
}

impl Link {
    pub const fn new(target: &'static str, column: &'static str) -> Self {
        Self { target, column }
    }
}

/// Description of one relational table.
///
/// `keys` form the natural (possibly composite) identity of a row, `fields`
/// are the remaining columns. A table without keys can only be read or
/// replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub name: &'static str,
    pub keys: &'static [&'static str],
    pub fields: &'static [&'static str],
    pub links: &'static [Link],
}

impl TableDescription {
    pub const fn new(
        name: &'static str,
        keys: &'static [&'static str],
        fields: &'static [&'static str],
        links: &'static [Link],
    ) -> Self {
        Self { name, keys, fields, links }
    }

    /// Keys followed by fields, in declaration order
    pub fn all_fields(&self) -> Vec<&'static str> {
        self.keys.iter().chain(self.fields.iter()).copied().collect()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.keys.contains(&column) || self.fields.contains(&column)
    }

    pub fn is_key(&self, column: &str) -> bool {
        self.keys.contains(&column)
    }

    pub fn is_keyed(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Column qualified with the table name (`images.width`)
    pub fn qualify(&self, column: &str) -> String {
        format!("{}.{}", self.name, column)
    }

    /// Find the link declared towards `target`
    pub fn link_to(&self, target: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENES: TableDescription = TableDescription::new(
        "scenes",
        &["mandragoreID", "imageID"],
        &["x", "y", "width", "height"],
        &[Link::new("images", "imageID")],
    );

    #[test]
    fn test_all_fields_order() {
        assert_eq!(
            SCENES.all_fields(),
            vec!["mandragoreID", "imageID", "x", "y", "width", "height"]
        );
    }

    #[test]
    fn test_columns_and_links() {
        assert!(SCENES.has_column("width"));
        assert!(!SCENES.has_column("label"));
        assert!(SCENES.is_key("imageID"));
        assert!(!SCENES.is_key("x"));
        assert_eq!(SCENES.qualify("x"), "scenes.x");
        assert_eq!(SCENES.link_to("images").map(|l| l.column), Some("imageID"));
        assert!(SCENES.link_to("classes").is_none());
    }
}
