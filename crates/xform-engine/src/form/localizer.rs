use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EvalResult;
use crate::functions::{ArgType, FunctionContext, FunctionHandler};
use crate::value::Value;

/// Localized form texts: locale -> text id -> text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCatalog {
    locale: Option<String>,
    texts: BTreeMap<String, BTreeMap<String, String>>,
}

impl TextCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a text. The first locale added becomes the active one.
    pub fn add_text(
        &mut self,
        locale: impl Into<String>,
        id: impl Into<String>,
        text: impl Into<String>,
    ) {
        let locale = locale.into();
        if self.locale.is_none() {
            self.locale = Some(locale.clone());
        }
        self.texts
            .entry(locale)
            .or_default()
            .insert(id.into(), text.into());
    }

    /// Switches the active locale. Returns `false` (and changes nothing) for an unknown locale.
    pub fn set_locale(&mut self, locale: &str) -> bool {
        if !self.texts.contains_key(locale) {
            return false;
        }
        self.locale = Some(locale.to_string());
        true
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.texts.keys().map(String::as_str)
    }

    /// Text for `id` in the active locale.
    pub fn text(&self, id: &str) -> Option<&str> {
        self.texts
            .get(self.locale.as_deref()?)?
            .get(id)
            .map(String::as_str)
    }
}

/// `jr:itext(id)`: the localized text for `id`.
pub(crate) struct ItextHandler {
    catalog: Arc<TextCatalog>,
    prototypes: Vec<Vec<ArgType>>,
}

impl ItextHandler {
    pub(crate) const NAME: &'static str = "jr:itext";

    pub(crate) fn new(catalog: TextCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            prototypes: vec![vec![ArgType::Text]],
        }
    }
}

impl FunctionHandler for ItextHandler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn prototypes(&self) -> &[Vec<ArgType>] {
        &self.prototypes
    }

    fn eval(&self, args: &[Value], _ctx: &dyn FunctionContext) -> EvalResult<Value> {
        let id = match args.first() {
            Some(Value::Text(id)) => id.as_str(),
            _ => "",
        };
        let text = match (self.catalog.locale(), self.catalog.text(id)) {
            (None, _) => "[nolocale]".to_string(),
            (Some(_), Some(text)) => text.to_string(),
            (Some(_), None) => format!("[itext:{id}]"),
        };
        Ok(Value::Text(text))
    }
}
