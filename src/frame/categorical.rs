use std::collections::BTreeMap;

use crate::error::{Error, Result, Section};

/// A column whose cells are drawn from a small ordered pool of category
/// strings, stored as integer codes plus the shared pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Categorical {
    codes: Vec<Option<u32>>,
    levels: Vec<String>,
}

impl Categorical {
    /// Builds a categorical from an explicit level pool and per-cell codes.
    ///
    /// # Errors
    ///
    /// Returns an error if any code does not index into the pool.
    pub fn from_parts(levels: Vec<String>, codes: Vec<Option<u32>>) -> Result<Self> {
        let bound = levels.len();
        for code in codes.iter().flatten() {
            if *code as usize >= bound {
                return Err(Error::format(
                    Section::Table,
                    format!("categorical code {code} exceeds pool of {bound} levels"),
                ));
            }
        }
        Ok(Self { codes, levels })
    }

    /// Pools a string column, with levels in lexicographic order.
    #[must_use]
    pub fn from_values(values: Vec<Option<String>>) -> Self {
        let mut index: BTreeMap<String, u32> = values
            .iter()
            .flatten()
            .map(|text| (text.clone(), 0))
            .collect();
        for (position, slot) in index.values_mut().enumerate() {
            *slot = position as u32;
        }
        let codes = values
            .into_iter()
            .map(|value| value.map(|text| *index.get(&text).expect("level recorded above")))
            .collect();
        let levels = index.into_keys().collect();
        Self { codes, levels }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    #[must_use]
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    #[must_use]
    pub fn codes(&self) -> &[Option<u32>] {
        &self.codes
    }

    /// Category text of the cell at `row`, or `None` when missing.
    #[must_use]
    pub fn value_at(&self, row: usize) -> Option<&str> {
        self.codes
            .get(row)
            .copied()
            .flatten()
            .map(|code| self.levels[code as usize].as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.codes
            .iter()
            .map(|code| code.map(|code| self.levels[code as usize].as_str()))
    }
}
