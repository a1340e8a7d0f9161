//! Directives - deferred values that receive their part.
//!
//! [`directive`] wraps a closure; it runs when the part commits and may set
//! the part's value right away or keep the handle and commit later.
//! [`watch`] binds a signal: the part shows the signal's value and
//! re-commits on its own whenever the signal changes.
//!
//! ```ignore
//! let count = signal(0);
//! render(html!(["<p>", "</p>"], watch(count.clone())), &container, RenderOptions::default())?;
//! count.set(5); // container now shows 5, no re-render needed
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use spark_signals::{Signal, effect};

use crate::parts::Part;
use crate::value::{Directive, Value};

/// A value that calls `f` with its part at commit time.
pub fn directive(f: impl Fn(&Rc<dyn Part>) + 'static) -> Value {
    Value::Directive(Directive::new(f))
}

// =============================================================================
// Signal watching
// =============================================================================

struct Watcher {
    part: Weak<dyn Part>,
    stop: Box<dyn FnOnce()>,
}

thread_local! {
    /// Live signal effects, one per watched part.
    static WATCHERS: RefCell<Vec<Watcher>> = RefCell::new(Vec::new());
}

/// Stop the effect bound to `part`, and any whose part is gone.
fn stop_watchers(part: &Rc<dyn Part>) {
    let stopped: Vec<Watcher> = WATCHERS.with(|watchers| {
        let mut watchers = watchers.borrow_mut();
        let (stopped, kept): (Vec<Watcher>, Vec<Watcher>) = watchers.drain(..).partition(|watcher| {
            watcher.part.strong_count() == 0
                || std::ptr::addr_eq(watcher.part.as_ptr(), Rc::as_ptr(part))
        });
        *watchers = kept;
        stopped
    });
    for watcher in stopped {
        (watcher.stop)();
    }
}

/// Number of parts currently bound to a signal.
pub fn watcher_count() -> usize {
    WATCHERS.with(|watchers| {
        watchers
            .borrow()
            .iter()
            .filter(|watcher| watcher.part.strong_count() > 0)
            .count()
    })
}

/// Show the current value of `source` and re-commit whenever it changes.
pub fn watch<T>(source: Signal<T>) -> Value
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    directive(move |part| {
        stop_watchers(part);

        let weak = Rc::downgrade(part);
        let first_run = Rc::new(Cell::new(true));
        let source = source.clone();
        let stop = effect(move || {
            let value: Value = source.get().into();
            let Some(part) = weak.upgrade() else {
                return;
            };
            part.set_value(value);
            // The first run happens inside the part's own commit.
            if !first_run.replace(false) {
                if let Err(err) = part.commit() {
                    tracing::warn!(%err, "failed to commit watched value");
                }
            }
        });

        WATCHERS.with(|watchers| {
            watchers.borrow_mut().push(Watcher {
                part: Rc::downgrade(part),
                stop: Box::new(stop),
            });
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Node;
    use crate::html;
    use crate::render::{RenderOptions, render};
    use spark_signals::signal;

    #[test]
    fn test_directive_sets_value() {
        let container = Node::element("div");
        let upper = directive(|part| part.set_value("LOUD".into()));
        render(html!(["<b>", "</b>"], upper), &container, RenderOptions::default()).unwrap();
        assert_eq!(container.text_content(), "LOUD");
    }

    #[test]
    fn test_watch_recommits_on_change() {
        let container = Node::element("div");
        let count = signal(1);
        render(html!(["<p>", "</p>"], watch(count.clone())), &container, RenderOptions::default()).unwrap();
        let text = container.query_selector("p").map(|p| p.text_content());
        assert_eq!(text.as_deref(), Some("1"));

        count.set(5);
        let text = container.query_selector("p").map(|p| p.text_content());
        assert_eq!(text.as_deref(), Some("5"));
    }

    #[test]
    fn test_rewatch_replaces_previous_effect() {
        let container = Node::element("div");
        let a = signal("a".to_string());
        let b = signal("b".to_string());
        let view = |s: &Signal<String>| html!(["<i>", "</i>"], watch(s.clone()));

        render(view(&a), &container, RenderOptions::default()).unwrap();
        let before = watcher_count();
        render(view(&b), &container, RenderOptions::default()).unwrap();
        assert_eq!(watcher_count(), before);

        a.set("stale".to_string());
        assert_eq!(container.text_content(), "b");
        b.set("fresh".to_string());
        assert_eq!(container.text_content(), "fresh");
    }
}
