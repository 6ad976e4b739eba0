//! Item input validation

use super::validation::{bounded_text, ValidationError};

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 2000;

/// An item ready to be inserted for some owner
#[derive(Debug, Clone)]
pub struct NewItem {
    pub title: String,
    pub description: Option<String>,
}

impl NewItem {
    /// A blank description is stored as `NULL`.
    pub fn parse(title: &str, description: Option<&str>) -> Result<Self, ValidationError> {
        let title = bounded_text("title", title, MAX_TITLE_LEN)?;
        let description = match description.map(str::trim).filter(|d| !d.is_empty()) {
            Some(d) => Some(bounded_text("description", d, MAX_DESCRIPTION_LEN)?),
            None => None,
        };
        Ok(Self { title, description })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_description_becomes_none() {
        let item = NewItem::parse("Lamp", Some("  ")).unwrap();
        assert_eq!(item.title, "Lamp");
        assert!(item.description.is_none());
    }

    #[test]
    fn rejects_long_description() {
        let long = "d".repeat(2001);
        assert!(matches!(
            NewItem::parse("Lamp", Some(&long)),
            Err(ValidationError::TooLong { field: "description", .. })
        ));
    }

    #[test]
    fn rejects_empty_title() {
        assert_eq!(
            NewItem::parse("", None).unwrap_err(),
            ValidationError::Empty { field: "title" }
        );
    }
}
