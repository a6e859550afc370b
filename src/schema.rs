use std::collections::HashMap;
use std::rc::Rc;

/// Type placeholder for fields of a schema synthesized from record data.
pub const ANY_TYPE: &str = "any";

#[derive(Debug, PartialEq, Clone)]
pub struct SchemaField {
    pub name: String,
    pub field_type: String,
}

/// Field definitions for a record, as supplied by the host's schema registry.
#[derive(Debug, PartialEq, Clone)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new(name: impl Into<String>, fields: Vec<SchemaField>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Builds a stand-in schema when no registry knows `name`: every observed
    /// field is kept with the `any` type so the record still round-trips.
    pub fn synthesize<'k>(name: &str, field_names: impl IntoIterator<Item = &'k String>) -> Self {
        let fields = field_names
            .into_iter()
            .map(|field| SchemaField {
                name: field.clone(),
                field_type: ANY_TYPE.to_string(),
            })
            .collect();
        Self::new(name, fields)
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Looks a schema up by name.
pub trait SchemaResolver {
    fn resolve(&self, name: &str) -> Option<Rc<Schema>>;
}

impl<F> SchemaResolver for F
where
    F: Fn(&str) -> Option<Rc<Schema>>,
{
    fn resolve(&self, name: &str) -> Option<Rc<Schema>> {
        self(name)
    }
}

/// A simple in-memory resolver.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Rc<Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: Schema) -> Rc<Schema> {
        let schema = Rc::new(schema);
        self.schemas.insert(schema.name.clone(), Rc::clone(&schema));
        schema
    }
}

impl SchemaResolver for SchemaRegistry {
    fn resolve(&self, name: &str) -> Option<Rc<Schema>> {
        self.schemas.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_keeps_field_order() {
        let names = vec!["name".to_string(), "age".to_string()];
        let schema = Schema::synthesize("Person", &names);
        assert_eq!(schema.name, "Person");
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[0].name, "name");
        assert_eq!(schema.fields[1].field_type, ANY_TYPE);
    }

    #[test]
    fn test_registry_and_closure_resolvers() {
        let mut registry = SchemaRegistry::new();
        registry.register(Schema::new(
            "User",
            vec![SchemaField {
                name: "email".to_string(),
                field_type: "email".to_string(),
            }],
        ));

        let user = registry.resolve("User").unwrap();
        assert_eq!(user.field("email").unwrap().field_type, "email");
        assert!(registry.resolve("Missing").is_none());

        let closure = |name: &str| (name == "Thing").then(|| Rc::new(Schema::new("Thing", vec![])));
        assert!(closure.resolve("Thing").is_some());
        assert!(closure.resolve("Other").is_none());
    }
}
