use std::collections::BTreeMap;

use crate::value::FieldValue;

#[derive(Clone, Debug, PartialEq, Default)]
pub struct MapValue {
    fields: BTreeMap<String, FieldValue>,
}

impl MapValue {
    pub fn new(fields: BTreeMap<String, FieldValue>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

impl From<BTreeMap<String, FieldValue>> for MapValue {
    fn from(fields: BTreeMap<String, FieldValue>) -> Self {
        Self::new(fields)
    }
}
