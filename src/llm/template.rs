use serde_json::Value;
use std::collections::BTreeMap;

/// Structured fields extracted from a model reply, keyed by template category.
pub type StructuredResult = BTreeMap<String, Value>;

/// Expected kind of value for a template category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// An ordered list of strings.
    Sequence,
    /// A single string.
    Scalar,
}

impl Shape {
    /// The empty default substituted when the model's value is missing or has the wrong shape.
    pub fn empty(&self) -> Value {
        match self {
            Shape::Sequence => Value::Array(Vec::new()),
            Shape::Scalar => Value::String(String::new()),
        }
    }
}

/// Ordered mapping from result category to its expected shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    categories: Vec<(String, Shape)>,
}

impl Default for Template {
    fn default() -> Self {
        Self::empty()
            .category("Systems", Shape::Sequence)
            .category("Type", Shape::Scalar)
            .category("Methods", Shape::Sequence)
            .category("Main Scope", Shape::Scalar)
            .category("Main Results", Shape::Scalar)
            .category("Keywords", Shape::Sequence)
    }
}

impl Template {
    /// A template with no categories.
    pub fn empty() -> Self {
        Self {
            categories: Vec::new(),
        }
    }

    /// Add (or reshape) a category, keeping first-insertion order.
    pub fn category(mut self, name: impl Into<String>, shape: Shape) -> Self {
        let name = name.into();
        match self.categories.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = shape,
            None => self.categories.push((name, shape)),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Shape)> {
        self.categories.iter().map(|(name, shape)| (name.as_str(), *shape))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Every category at its empty default.
    pub fn defaults(&self) -> StructuredResult {
        self.iter()
            .map(|(name, shape)| (name.to_string(), shape.empty()))
            .collect()
    }

    /// Render the template as a JSON object of empty defaults, in category order.
    pub fn to_prompt_json(&self) -> String {
        let body = self
            .iter()
            .map(|(name, shape)| format!("{}: {}", Value::from(name), shape.empty()))
            .collect::<Vec<String>>()
            .join(", ");
        format!("{{{}}}", body)
    }
}

/// Name of the analysis record field holding a template category.
pub fn analysis_field(category: &str) -> String {
    format!("AI-{}", category)
}
