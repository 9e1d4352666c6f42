//! Question preloaders: values filled in when an instance (or a repeat instance) is created, and
//! post-processing run when the entry is finalized.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use xform_model::{AnswerValue, DataInstance, TreeElement, TreeReference};

pub trait PreloadHandler: Send + Sync {
    /// Name used by `jr:preload` bindings, e.g. `timestamp`.
    fn name(&self) -> &str;

    /// Value for a freshly created node, or `None` to leave it untouched.
    fn preload(&self, params: &str, now: NaiveDateTime) -> Option<AnswerValue>;

    /// Value to write when the entry is post-processed, or `None` to leave it untouched.
    fn post_process(
        &self,
        _node: &TreeElement,
        _params: &str,
        _now: NaiveDateTime,
    ) -> Option<AnswerValue> {
        None
    }
}

/// `date` with params `today`.
struct DatePreloader;

impl PreloadHandler for DatePreloader {
    fn name(&self) -> &str {
        "date"
    }

    fn preload(&self, params: &str, now: NaiveDateTime) -> Option<AnswerValue> {
        (params == "today").then(|| AnswerValue::Date(now.date()))
    }
}

/// `timestamp` with params `start` (on creation) or `end` (on post-processing).
struct TimestampPreloader;

impl PreloadHandler for TimestampPreloader {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn preload(&self, params: &str, now: NaiveDateTime) -> Option<AnswerValue> {
        (params == "start").then_some(AnswerValue::DateTime(now))
    }

    fn post_process(
        &self,
        _node: &TreeElement,
        params: &str,
        now: NaiveDateTime,
    ) -> Option<AnswerValue> {
        (params == "end").then_some(AnswerValue::DateTime(now))
    }
}

/// `uid`: a random v4 UUID.
struct UidPreloader;

impl PreloadHandler for UidPreloader {
    fn name(&self) -> &str {
        "uid"
    }

    fn preload(&self, _params: &str, _now: NaiveDateTime) -> Option<AnswerValue> {
        Some(AnswerValue::Text(uuid::Uuid::new_v4().to_string()))
    }
}

/// Preload handlers keyed by name. Comes with `date`, `timestamp` and `uid`.
#[derive(Clone)]
pub struct QuestionPreloader {
    handlers: HashMap<String, Arc<dyn PreloadHandler>>,
}

impl Default for QuestionPreloader {
    fn default() -> Self {
        let mut preloader = Self {
            handlers: HashMap::new(),
        };
        preloader.register(DatePreloader);
        preloader.register(TimestampPreloader);
        preloader.register(UidPreloader);
        preloader
    }
}

impl fmt::Debug for QuestionPreloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("QuestionPreloader")
            .field("handlers", &names)
            .finish()
    }
}

impl QuestionPreloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler`, replacing a built-in or earlier handler of the same name.
    pub fn register(&mut self, handler: impl PreloadHandler + 'static) {
        self.handlers
            .insert(handler.name().to_string(), Arc::new(handler));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Writes preload values into every live leaf at or below `scope`. Existing answers are
    /// overwritten; templates are skipped.
    pub fn preload_subtree(&self, instance: &mut DataInstance, scope: &TreeReference, now: NaiveDateTime) {
        let Some(node) = instance.resolve_reference_mut(scope) else {
            return;
        };
        node.visit_live_mut(&mut |node: &mut TreeElement| {
            let Some(preload) = node.preload().filter(|_| node.is_leaf()) else {
                return;
            };
            let Some(handler) = self.handlers.get(&preload.handler) else {
                log::warn!("no preload handler named `{}`", preload.handler);
                return;
            };
            if let Some(value) = handler.preload(&preload.params, now) {
                // Leaves only, so the write cannot fail.
                let _ = node.set_answer(Some(value));
            }
        });
    }

    /// Runs post-processing over every live leaf at or below `scope`; `true` when any answer
    /// changed.
    pub fn post_process_subtree(
        &self,
        instance: &mut DataInstance,
        scope: &TreeReference,
        now: NaiveDateTime,
    ) -> bool {
        let Some(node) = instance.resolve_reference_mut(scope) else {
            return false;
        };
        let mut modified = false;
        node.visit_live_mut(&mut |node: &mut TreeElement| {
            let Some(preload) = node.preload().filter(|_| node.is_leaf()) else {
                return;
            };
            let Some(handler) = self.handlers.get(&preload.handler) else {
                return;
            };
            if let Some(value) = handler.post_process(node, &preload.params, now) {
                modified |= matches!(node.set_answer(Some(value)), Ok(true));
            }
        });
        modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use xform_model::DataType;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    #[test]
    fn builtins_fill_start_and_end_timestamps() {
        let mut instance = DataInstance::new(TreeElement::group(
            "data",
            vec![
                TreeElement::leaf("start", DataType::DateTime).with_preload("timestamp", "start"),
                TreeElement::leaf("end", DataType::DateTime).with_preload("timestamp", "end"),
                TreeElement::leaf("day", DataType::Date).with_preload("date", "today"),
            ],
        ));
        let preloader = QuestionPreloader::new();
        let root = TreeReference::root();

        preloader.preload_subtree(&mut instance, &root, now());
        let get = |i: &DataInstance, p: &str| {
            i.resolve_reference(&TreeReference::path(p))
                .and_then(|n| n.value().cloned())
        };
        assert_eq!(get(&instance, "/data/start"), Some(AnswerValue::DateTime(now())));
        assert_eq!(get(&instance, "/data/end"), None);
        assert_eq!(get(&instance, "/data/day"), Some(AnswerValue::Date(now().date())));

        assert!(preloader.post_process_subtree(&mut instance, &root, now()));
        assert_eq!(get(&instance, "/data/end"), Some(AnswerValue::DateTime(now())));
        assert!(!preloader.post_process_subtree(&mut instance, &root, now()));
    }
}
