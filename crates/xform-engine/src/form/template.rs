use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use xform_model::TreeReference;

use crate::coercion::to_text;
use crate::error::{FormError, FormResult};
use crate::eval::evaluate;
use crate::form::FormDef;

fn argument_re() -> &'static Regex {
    static ARGUMENT_RE: OnceLock<Regex> = OnceLock::new();
    ARGUMENT_RE.get_or_init(|| Regex::new(r"\$\{([^}]*)\}").expect("valid regex"))
}

impl FormDef {
    /// Replaces every `${n}` in `template` with the text of output fragment `n`, evaluated at
    /// `context_ref`.
    ///
    /// Fragments may produce further placeholders, so substitution repeats until none is
    /// left. The settings' `templating_recursion_limit` is the number of substitution passes
    /// allowed; placeholders still outstanding after that many passes are
    /// [`FormError::TemplateRecursionLimit`]. Placeholders that do not name a fragment are left
    /// as they are.
    pub fn fill_template_string(
        &self,
        template: &str,
        context_ref: &TreeReference,
    ) -> FormResult<String> {
        let limit = self.settings.templating_recursion_limit;
        let ctx = self.evaluation_context(context_ref.clone());
        let mut values: HashMap<String, String> = HashMap::new();
        let mut text = template.to_string();
        let mut passes = 0u32;

        loop {
            let outstanding = self.outstanding_arguments(&text);
            if outstanding.is_empty() {
                return Ok(text);
            }
            if passes >= limit {
                return Err(FormError::TemplateRecursionLimit { limit });
            }

            for (name, fragment) in outstanding {
                if values.contains_key(&name) {
                    continue;
                }
                let value = evaluate(&self.output_fragments[fragment], &self.instance, &ctx)?;
                values.insert(name, to_text(&value)?);
            }
            text = argument_re()
                .replace_all(&text, |caps: &Captures<'_>| match values.get(&caps[1]) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                })
                .into_owned();
            passes += 1;
        }
    }

    /// Placeholders in `text` naming an existing output fragment.
    fn outstanding_arguments(&self, text: &str) -> Vec<(String, usize)> {
        argument_re()
            .captures_iter(text)
            .filter_map(|caps| {
                let name = &caps[1];
                match name.parse::<usize>() {
                    Ok(n) if n < self.output_fragments.len() => Some((name.to_string(), n)),
                    Ok(_) => None,
                    Err(_) => {
                        log::warn!("expected a numeric output argument, found `{name}`");
                        None
                    }
                }
            })
            .collect()
    }
}
