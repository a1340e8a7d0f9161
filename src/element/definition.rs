//! Element definitions - the finalized property table of a component type.
//!
//! Built once per component type on first use and shared by every instance.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use super::declaration::PropertyDeclaration;
use super::reactive::Component;
use super::styles::{CssResult, CssStyles, flatten_styles};

#[derive(Debug)]
pub struct ElementDefinition {
    tag_name: String,
    properties: IndexMap<String, PropertyDeclaration>,
    /// Observed attribute name to property name.
    attribute_to_property: HashMap<String, String>,
    styles: Vec<CssResult>,
}

thread_local! {
    static DEFINITIONS: RefCell<HashMap<TypeId, Rc<ElementDefinition>>> = RefCell::new(HashMap::new());
}

impl ElementDefinition {
    /// The definition of `C`, finalized on first call.
    pub fn of<C: Component>() -> Rc<Self> {
        let id = TypeId::of::<C>();
        if let Some(definition) = DEFINITIONS.with(|defs| defs.borrow().get(&id).cloned()) {
            return definition;
        }
        let definition = Rc::new(Self::finalize(C::tag_name(), C::properties(), &C::styles()));
        tracing::debug!(
            tag = %definition.tag_name,
            properties = definition.properties.len(),
            styles = definition.styles.len(),
            "finalized element definition"
        );
        DEFINITIONS.with(|defs| defs.borrow_mut().insert(id, definition.clone()));
        definition
    }

    /// Later declarations of the same name replace earlier ones.
    fn finalize(
        tag_name: &str,
        declarations: Vec<PropertyDeclaration>,
        styles: &[CssStyles],
    ) -> Self {
        let mut properties = IndexMap::new();
        for declaration in declarations {
            properties.insert(declaration.name.clone(), declaration);
        }
        let attribute_to_property = properties
            .values()
            .filter_map(|decl| decl.attribute_name().map(|attr| (attr, decl.name.clone())))
            .collect();
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            properties,
            attribute_to_property,
            styles: flatten_styles(styles),
        }
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDeclaration> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDeclaration> {
        self.properties.values()
    }

    /// Property mapped to `attribute`.
    pub fn property_for_attribute(&self, attribute: &str) -> Option<&PropertyDeclaration> {
        self.attribute_to_property
            .get(attribute)
            .and_then(|name| self.properties.get(name))
    }

    /// Attribute names whose changes reach the element, in declaration order.
    pub fn observed_attributes(&self) -> Vec<String> {
        self.properties
            .values()
            .filter_map(PropertyDeclaration::attribute_name)
            .collect()
    }

    pub fn styles(&self) -> &[CssResult] {
        &self.styles
    }
}
