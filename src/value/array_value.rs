use crate::value::FieldValue;

#[derive(Clone, Debug, PartialEq, Default)]
pub struct ArrayValue {
    values: Vec<FieldValue>,
}

impl ArrayValue {
    pub fn new(values: Vec<FieldValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when some element `equals` `value`.
    pub fn contains(&self, value: &FieldValue) -> bool {
        self.values.iter().any(|element| element.equals(value))
    }

    /// Appends every element of `values` not already present, keeping existing order first.
    pub fn union(&self, values: &[FieldValue]) -> ArrayValue {
        let mut merged = self.values.clone();
        for value in values {
            if !merged.iter().any(|existing| existing.equals(value)) {
                merged.push(value.clone());
            }
        }
        ArrayValue::new(merged)
    }

    pub fn remove_all(&self, values: &[FieldValue]) -> ArrayValue {
        let retained = self
            .values
            .iter()
            .filter(|element| !values.iter().any(|value| value.equals(element)))
            .cloned()
            .collect();
        ArrayValue::new(retained)
    }
}
