//! Node types shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use arbor_model::{Node, Value, json};
use arbor_reactive::{ManualScheduler, NodeTypeSpec, Reaction, ReactiveError, Schema, Teardown};

pub fn paragraph() -> NodeTypeSpec {
    NodeTypeSpec::new("paragraph")
}

pub fn calculator() -> NodeTypeSpec {
    NodeTypeSpec::new("calculator")
        .reactive()
        .attrs(["id", "x", "y"])
        .reactive_attr("sum", |node, _| {
            Ok(Reaction::ready(node.attr_i64("x").unwrap_or(0) + node.attr_i64("y").unwrap_or(0)))
        })
        .reactive_attr("product", |node, _| {
            Ok(Reaction::ready(node.attr_i64("x").unwrap_or(0) * node.attr_i64("y").unwrap_or(0)))
        })
}

fn joined(node: &Node, first: &str, second: &str) -> arbor_reactive::Result<Reaction<Value>> {
    let a = node.attr_str(first).unwrap_or_default();
    let b = node.attr_str(second).unwrap_or_default();
    Ok(Reaction::ready(format!("{a}{b}")))
}

pub fn concatenator() -> NodeTypeSpec {
    NodeTypeSpec::new("concatenator")
        .reactive()
        .attrs(["id", "a", "b"])
        .reactive_attr("ab", |node, _| joined(node, "a", "b"))
        .reactive_attr("ba", |node, _| joined(node, "b", "a"))
}

pub fn food() -> NodeTypeSpec {
    NodeTypeSpec::new("food").attrs(["id", "color"])
}

pub fn feed_me() -> NodeTypeSpec {
    NodeTypeSpec::new("feedMe")
        .reactive()
        .attrs(["id", "wantsToEatId"])
        .reactive_attr("report", |node, hooks| {
            let wanted = node.attr_str("wantsToEatId").unwrap_or_default().to_string();
            Ok(hooks.use_deferred_node(wanted, |food| match food.and_then(|f| f.attr_str("color")) {
                Some(color) => format!("yum, {color}!"),
                None => "still hungry".to_string(),
            }))
        })
}

pub fn feed_me_more() -> NodeTypeSpec {
    NodeTypeSpec::new("feedMeMore")
        .reactive()
        .attrs(["id", "wantsToEatIds"])
        .reactive_attr("report", |node, hooks| {
            let wanted: Vec<String> = node
                .attr("wantsToEatIds")
                .and_then(Value::as_array)
                .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_owned).collect())
                .unwrap_or_default();
            Ok(hooks.use_deferred_nodes(wanted, |foods| {
                let colors: Option<Vec<&str>> = foods
                    .iter()
                    .map(|f| f.as_deref().and_then(|f| f.attr_str("color")))
                    .collect();
                match colors {
                    Some(colors) => Value::from(format!("yum, {}!", colors.join(" and "))),
                    None => Value::Null,
                }
            }))
        })
}

pub fn boxed() -> NodeTypeSpec {
    NodeTypeSpec::new("box").attrs(["id", "value"])
}

pub fn box_opener() -> NodeTypeSpec {
    NodeTypeSpec::new("boxOpener")
        .reactive()
        .attrs(["id", "value", "lookForBoxId"])
        .reactive_attr("myValue", |node, _| {
            Ok(Reaction::ready(node.attr("value").cloned().unwrap_or(Value::Null)))
        })
        .reactive_attr("boxValue", |node, hooks| {
            let target = node.attr_str("lookForBoxId").unwrap_or_default().to_string();
            Ok(hooks.use_deferred_node(target, |found| {
                found.and_then(|b| b.attr("value").cloned()).unwrap_or(Value::Null)
            }))
        })
}

pub fn sheep() -> NodeTypeSpec {
    NodeTypeSpec::new("sheep").attrs(["id", "name"])
}

/// Counts one sheep per second of scheduler time.
pub fn sheep_counter(clock: &ManualScheduler) -> NodeTypeSpec {
    let clock = clock.clone();
    NodeTypeSpec::new("sheepCounter")
        .reactive()
        .attrs(["id", "skip"])
        .reactive_attr("report", move |node, hooks| {
            let (count, set_count) = hooks.use_state(0_i64)?;
            let clock = clock.clone();
            hooks.use_effect_with((), move || {
                let timer = clock.set_interval(1_000, move || set_count.update(|c| c + 1));
                Some(Teardown::new(move || {
                    clock.clear(timer);
                }))
            })?;
            let skip = node.attr_i64("skip").unwrap_or(1).max(1);
            Ok(Reaction::ready(format!("I have counted {} sheep", count / skip)))
        })
}

/// Names sheep `sheep-0`, `sheep-1`, ... advancing one per second.
pub fn sheep_namer(clock: &ManualScheduler) -> NodeTypeSpec {
    let clock = clock.clone();
    NodeTypeSpec::new("sheepNamer")
        .reactive()
        .attr("id")
        .reactive_attr("report", move |_, hooks| {
            let (index, set_index) = hooks.use_state(0_i64)?;
            let clock = clock.clone();
            hooks.use_effect_with((), move || {
                let timer = clock.set_interval(1_000, move || set_index.update(|i| i + 1));
                Some(Teardown::new(move || {
                    clock.clear(timer);
                }))
            })?;
            Ok(hooks.use_deferred_node(format!("sheep-{index}"), move |found| {
                match found.and_then(|s| s.attr_str("name")) {
                    Some(name) => format!("Sheep {index} is named {name}"),
                    None => "I don't see any more sheep".to_string(),
                }
            }))
        })
}

/// Fails with a compute error when the node has `fail: true`.
pub fn fragile() -> NodeTypeSpec {
    NodeTypeSpec::new("fragile")
        .reactive()
        .attrs(["id", "fail"])
        .reactive_attr("status", |node, _| {
            if node.attr("fail").and_then(Value::as_bool).unwrap_or(false) {
                return Err(ReactiveError::compute("asked to fail"));
            }
            Ok(Reaction::ready("fine"))
        })
}

/// Mirrors the `result` of another node. Two of these pointing at each other
/// form a dependency cycle.
pub fn mirror() -> NodeTypeSpec {
    NodeTypeSpec::new("mirror")
        .reactive()
        .attrs(["id", "of"])
        .reactive_attr("result", |node, hooks| {
            let of = node.attr_str("of").unwrap_or_default().to_string();
            Ok(hooks.use_deferred_node(of, |target| {
                target.and_then(|t| t.attr("result").cloned()).unwrap_or(Value::Null)
            }))
        })
}

/// Every fixture type, using `clock` for the timer-driven ones.
pub fn full_schema(clock: &ManualScheduler) -> Schema {
    Schema::builder()
        .nodes([
            NodeTypeSpec::new("doc"),
            NodeTypeSpec::new("text"),
            paragraph(),
            calculator(),
            concatenator(),
            food(),
            feed_me(),
            feed_me_more(),
            boxed(),
            box_opener(),
            sheep(),
            sheep_counter(clock),
            sheep_namer(clock),
            fragile(),
            mirror(),
        ])
        .build()
        .expect("fixture schema is valid")
}

/// A `doc` node wrapping `content`.
pub fn doc(content: Value) -> Node {
    Node::from_json(json!({ "type": "doc", "content": content })).expect("fixture doc is valid")
}

/// Records every invalidated ID.
#[derive(Clone, Default)]
pub struct InvalidationLog(Rc<RefCell<Vec<String>>>);

impl InvalidationLog {
    pub fn callback(&self) -> impl Fn(&str) + 'static {
        let log = Rc::clone(&self.0);
        move |id| log.borrow_mut().push(id.to_string())
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }
}
