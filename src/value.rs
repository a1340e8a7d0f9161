//! Value - The dynamic value type bound into template parts.
//!
//! Every expression slot of a [`TemplateResult`] carries a [`Value`]. Parts
//! classify the value when they commit:
//!
//! ```text
//! Null / Bool / Number / Str  → primitive (text, attribute string)
//! Template                    → nested template instance
//! Node                        → adopted live node
//! List                        → positional list of child parts
//! Nothing                     → clears the part
//! NoChange                    → leaves the part untouched
//! Directive                   → deferred, invoked with the part
//! Listener                    → event binding target
//! ```
//!
//! Reactive element properties store the same type, so a property can hold a
//! template, a list or structured JSON just as easily as a number.

use std::fmt;
use std::rc::Rc;

use crate::dom::{Event, ListenerOptions, Node};
use crate::parts::Part;
use crate::template::TemplateResult;

// =============================================================================
// Value
// =============================================================================

/// A dynamic value bound to a part or stored in a reactive property.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value (`null` / `undefined`). Renders as empty text.
    #[default]
    Null,
    /// Sentinel: leave the part exactly as it is.
    NoChange,
    /// Sentinel: clear whatever the part currently shows.
    Nothing,
    Bool(bool),
    Number(f64),
    Str(String),
    /// A nested render result.
    Template(TemplateResult),
    /// A live host node, adopted as-is.
    Node(Node),
    /// An iterable, diffed positionally.
    List(Vec<Value>),
    /// Structured data (objects / arrays parsed from attributes).
    Json(serde_json::Value),
    /// An event listener for `@event` bindings.
    Listener(Listener),
    /// A deferred value, invoked with its part until it yields a concrete one.
    Directive(Directive),
}

impl Value {
    /// Primitive values are compared by value; everything else by identity.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::Str(_)
        )
    }

    /// Strict equality between two primitives (`NaN` is never equal).
    pub(crate) fn same_primitive(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }

    /// JavaScript-style truthiness, used by boolean attribute bindings.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null | Value::Nothing | Value::NoChange => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Json(json) => !json.is_null(),
            _ => true,
        }
    }

    /// Text form used when a value lands in a text node or attribute string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null | Value::NoChange | Value::Nothing => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Template(_) => "[template]".to_string(),
            Value::Node(node) => node.text_content(),
            Value::List(items) => items.iter().map(Value::to_text).collect(),
            Value::Json(serde_json::Value::String(s)) => s.clone(),
            Value::Json(json) => json.to_string(),
            Value::Listener(_) => "[listener]".to_string(),
            Value::Directive(_) => "[directive]".to_string(),
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::NoChange => "no-change",
            Value::Nothing => "nothing",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Template(_) => "template",
            Value::Node(_) => "node",
            Value::List(_) => "list",
            Value::Json(_) => "json",
            Value::Listener(_) => "listener",
            Value::Directive(_) => "directive",
        }
    }

    /// Convert to JSON where the value has a structured form.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Value::Null => Some(serde_json::Value::Null),
            Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Value::Number(n) => serde_json::Number::from_f64(*n).map(serde_json::Value::Number),
            Value::Str(s) => Some(serde_json::Value::String(s.clone())),
            Value::Json(json) => Some(json.clone()),
            Value::List(items) => items
                .iter()
                .map(Value::to_json)
                .collect::<Option<Vec<_>>>()
                .map(serde_json::Value::Array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Format a number the way a script host stringifies it (`5`, not `5.0`).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        // Shortest round-trip digits; exponent form outside 1e-7 < |n| < 1e21.
        let scientific = format!("{n:e}");
        let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
        match exponent.parse::<i32>() {
            Ok(exp) if exp >= 21 => format!("{mantissa}e+{exp}"),
            Ok(exp) if exp <= -7 => format!("{mantissa}e{exp}"),
            _ => n.to_string(),
        }
    }
}

/// Parse text the way a script host's `Number(text)` does: surrounding
/// whitespace is ignored, blank is `0`, `0x`/`0o`/`0b` select a radix,
/// `Infinity` is the only spelled-out value and anything else that is not a
/// decimal literal is `NaN`.
pub fn parse_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    let radix = match text.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &text[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return f64::NAN;
        }
        return digits
            .chars()
            .filter_map(|c| c.to_digit(radix))
            .fold(0.0, |acc, digit| acc * f64::from(radix) + f64::from(digit));
    }

    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if unsigned == "Infinity" {
        return if text.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let decimal = unsigned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !decimal {
        return f64::NAN;
    }
    text.parse().unwrap_or(f64::NAN)
}

/// Identity for Rc-backed variants, value equality for data.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null)
            | (Value::NoChange, Value::NoChange)
            | (Value::Nothing, Value::Nothing) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Template(a), Value::Template(b)) => a.ptr_eq(b),
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Listener(a), Value::Listener(b)) => a.ptr_eq(b),
            (Value::Directive(a), Value::Directive(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::NoChange => write!(f, "NoChange"),
            Value::Nothing => write!(f, "Nothing"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Template(t) => write!(f, "Template({} values)", t.values().len()),
            Value::Node(n) => write!(f, "Node({n:?})"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Json(json) => write!(f, "Json({json})"),
            Value::Listener(l) => write!(f, "Listener({:?})", l.options()),
            Value::Directive(_) => write!(f, "Directive"),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Number(value as f64)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::Number(value as f64)
            }
        })*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Str(value.clone())
    }
}

impl From<TemplateResult> for Value {
    fn from(value: TemplateResult) -> Self {
        Value::Template(value)
    }
}

impl From<Node> for Value {
    fn from(value: Node) -> Self {
        Value::Node(value)
    }
}

impl From<&Node> for Value {
    fn from(value: &Node) -> Self {
        Value::Node(value.clone())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Json(value)
    }
}

impl From<Listener> for Value {
    fn from(value: Listener) -> Self {
        Value::Listener(value)
    }
}

impl From<Directive> for Value {
    fn from(value: Directive) -> Self {
        Value::Directive(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Directive
// =============================================================================

/// A deferred value: invoked with a handle to its part at commit time.
///
/// The directive may call [`Part::set_value`] synchronously, or keep the handle
/// and set + commit later as often as it likes. Until a concrete value arrives
/// the part stays uncommitted.
#[derive(Clone)]
pub struct Directive(Rc<dyn Fn(&Rc<dyn Part>)>);

impl Directive {
    pub fn new(f: impl Fn(&Rc<dyn Part>) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub(crate) fn invoke(&self, part: &Rc<dyn Part>) {
        (self.0)(part)
    }
}

// =============================================================================
// Listener
// =============================================================================

/// Listener callback: receives the event and the event context node
/// (the render's `event_context`, or the element the binding sits on).
pub type ListenerFn = Rc<dyn Fn(&Event, &Node)>;

/// An object exposing a dispatch capability, as an alternative to a closure.
pub trait HandleEvent {
    fn handle_event(&self, event: &Event);
}

/// What an event binding calls.
#[derive(Clone)]
pub enum EventHandler {
    Function(ListenerFn),
    Object(Rc<dyn HandleEvent>),
}

/// An event binding target plus the options it wants to be registered with.
#[derive(Clone)]
pub struct Listener {
    handler: EventHandler,
    options: ListenerOptions,
}

impl Listener {
    pub fn new(f: impl Fn(&Event, &Node) + 'static) -> Self {
        Self {
            handler: EventHandler::Function(Rc::new(f)),
            options: ListenerOptions::default(),
        }
    }

    pub fn object(handler: Rc<dyn HandleEvent>) -> Self {
        Self {
            handler: EventHandler::Object(handler),
            options: ListenerOptions::default(),
        }
    }

    pub fn capture(mut self, capture: bool) -> Self {
        self.options.capture = capture;
        self
    }

    pub fn passive(mut self, passive: bool) -> Self {
        self.options.passive = passive;
        self
    }

    pub fn once(mut self, once: bool) -> Self {
        self.options.once = once;
        self
    }

    pub fn options(&self) -> ListenerOptions {
        self.options
    }

    pub fn handler(&self) -> &EventHandler {
        &self.handler
    }

    pub fn ptr_eq(&self, other: &Listener) -> bool {
        let same_handler = match (&self.handler, &other.handler) {
            (EventHandler::Function(a), EventHandler::Function(b)) => {
                Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
            }
            (EventHandler::Object(a), EventHandler::Object(b)) => {
                Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
            }
            _ => false,
        };
        same_handler && self.options == other.options
    }
}

/// Shorthand for [`Listener::new`].
pub fn listener(f: impl Fn(&Event, &Node) + 'static) -> Listener {
    Listener::new(f)
}

// =============================================================================
// Tests
// =============================================================================
