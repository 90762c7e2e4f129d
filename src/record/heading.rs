//! # Heading - Column Schema as a Record
//!
//! The first record of every stream is its heading: each field is a
//! `type:name` column descriptor (`int:age`), or a bare `name` defaulting
//! to `string`. The heading is parsed once per operator invocation into
//! typed [`Column`]s; per-record processing never re-reads type tags.
//!
//! ## Name Lookup
//!
//! Expressions refer to columns by bare name (`age`) while storage retains
//! the tagged form; lookup therefore matches either spelling. A candidate
//! tag that is not one of the seven kinds fails heading validation rather
//! than silently becoming part of the name: a typo like `unit:price`
//! should be caught before any record is processed.

use eyre::{bail, Result};

use crate::record::builder::RecordBuilder;
use crate::record::view::RecordView;
use crate::types::DataType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    /// Whether the heading spelled the tag out. Untagged columns default
    /// to string but render back without a tag.
    pub tagged: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Column {
        Column {
            name: name.into(),
            data_type,
            tagged: true,
        }
    }

    /// The heading field text for this column.
    pub fn descriptor(&self) -> String {
        if self.tagged {
            format!("{}:{}", self.data_type.tag(), self.name)
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Heading {
    columns: Vec<Column>,
}

impl Heading {
    /// Parses a heading record into typed columns.
    pub fn parse(view: &RecordView<'_>) -> Result<Heading> {
        let mut columns = Vec::with_capacity(view.number_fields());
        for (index, field) in view.fields().enumerate() {
            let text = match std::str::from_utf8(field) {
                Ok(t) => t,
                Err(_) => bail!(
                    "heading field {} is not valid UTF-8: {:?}",
                    index,
                    String::from_utf8_lossy(field)
                ),
            };
            columns.push(Self::parse_descriptor(text)?);
        }
        Ok(Heading { columns })
    }

    /// Parses one `[type:]name` descriptor.
    pub fn parse_descriptor(text: &str) -> Result<Column> {
        if let Some((tag, name)) = text.split_once(':') {
            let data_type = DataType::mandatory_from_tag(tag)?;
            if name.is_empty() {
                bail!("heading descriptor '{}' has an empty column name", text);
            }
            Ok(Column {
                name: name.to_string(),
                data_type,
                tagged: true,
            })
        } else {
            if text.is_empty() {
                bail!("heading descriptor is empty");
            }
            Ok(Column {
                name: text.to_string(),
                data_type: DataType::Str,
                tagged: false,
            })
        }
    }

    pub fn from_columns(columns: Vec<Column>) -> Heading {
        Heading { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Finds a column by bare name or full `type:name` descriptor.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| {
            c.name == name
                || name
                    .split_once(':')
                    .is_some_and(|(tag, bare)| tag == c.data_type.tag() && bare == c.name)
        })
    }

    /// [`find`](Self::find) that fails with the available column names.
    pub fn mandatory_find(&self, name: &str) -> Result<usize> {
        match self.find(name) {
            Some(index) => Ok(index),
            None => bail!(
                "no column '{}' in heading [{}]",
                name,
                self.columns
                    .iter()
                    .map(|c| c.descriptor())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Encodes this heading as the stream's first record.
    pub fn build_into(&self, out: &mut Vec<u8>) {
        let mut builder = RecordBuilder::new();
        for column in &self.columns {
            builder.push_str(&column.descriptor());
        }
        builder.build_into(out);
    }
}
