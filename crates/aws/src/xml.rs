//! XML response decoding
//!
//! Responses are read into a small element tree with `quick-xml`, then
//! converted into [`Attributes`] according to a per-service [`Shape`] that
//! says which elements are lists and which leaves carry typed values.

use quick_xml::Reader;
use quick_xml::events::Event;

use nb_core::{Attributes, Error, FieldType, Result, Value};

/// One XML element with its concatenated text and child elements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn named(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Default::default()
        }
    }

    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> Result<Element> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(Element::named(e.local_name().as_ref())),
                Ok(Event::Empty(e)) => {
                    let element = Element::named(e.local_name().as_ref());
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape()
                        .map_err(|err| Error::Parse(format!("Invalid XML text: {err}")))?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::Parse("Unbalanced XML end tag".to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::Parse(format!(
                        "XML error at position {}: {e}",
                        reader.buffer_position()
                    )));
                }
            }
        }

        if !stack.is_empty() {
            return Err(Error::Parse("Unexpected end of XML document".to_string()));
        }
        root.ok_or_else(|| Error::Parse("Empty XML document".to_string()))
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First element named `name` anywhere below self, depth first
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find_map(|c| if c.name == name { Some(c) } else { c.find(name) })
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// How a service lays out its XML
pub struct Shape {
    /// Elements whose children are list items (`<groupSet><item>..`)
    pub is_list: fn(&str) -> bool,
    /// Elements that repeat as siblings and collect into one list (`Contents`)
    pub repeated: &'static [&'static str],
    /// Declared type of a leaf element, if not a plain string
    pub type_of: fn(&str) -> Option<FieldType>,
}

impl Shape {
    /// Convert the children of `element` into an attribute mapping
    pub fn attributes(&self, element: &Element) -> Attributes {
        let mut attrs = Attributes::new();
        for child in &element.children {
            if self.repeated.contains(&child.name.as_str()) {
                let item = self.item(child);
                match attrs.get_mut(&child.name) {
                    Some(Value::List(items)) => items.push(item),
                    _ => {
                        attrs.insert(child.name.clone(), Value::List(vec![item]));
                    }
                }
            } else if (self.is_list)(&child.name) {
                let items = child.children.iter().map(|i| self.item(i)).collect();
                attrs.insert(child.name.clone(), Value::List(items));
            } else if child.has_children() {
                attrs.insert(child.name.clone(), self.attributes(child));
            } else {
                attrs.insert(child.name.clone(), self.scalar(child));
            }
        }
        attrs
    }

    fn item(&self, element: &Element) -> Value {
        if element.has_children() {
            Value::Map(self.attributes(element))
        } else {
            self.scalar(element)
        }
    }

    fn scalar(&self, element: &Element) -> Value {
        let value = Value::String(element.text.clone());
        match (self.type_of)(&element.name) {
            Some(ty) if !element.text.is_empty() => value.coerce(ty),
            _ => value,
        }
    }
}

/// Error code of a provider error document (`<Error><Code>..`)
pub fn error_code(body: &str) -> Option<String> {
    let root = Element::parse(body).ok()?;
    let code = if root.name == "Code" {
        &root
    } else {
        root.find("Code")?
    };
    Some(code.text.clone())
}

/// Insert an empty list for each of `keys` the document omitted
pub fn with_lists(mut attrs: Attributes, keys: &[&str]) -> Attributes {
    for key in keys {
        if !attrs.contains_key(key) {
            attrs.insert(*key, Value::List(Vec::new()));
        }
    }
    attrs
}

/// Minimal XML text escaping for generated documents
pub fn escape(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}
