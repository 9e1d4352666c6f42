use serde::{Deserialize, Serialize};

/// Form-wide engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSettings {
    /// Maximum number of `${n}` expansion passes performed by output templating.
    ///
    /// Output fragments may themselves produce `${n}` arguments; a form that keeps producing
    /// them is malformed and is reported once this many passes have run.
    pub templating_recursion_limit: u32,
    /// Whether initializing a blank instance runs the question preloaders.
    pub preload_new_instances: bool,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            templating_recursion_limit: 10,
            preload_new_instances: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: FormSettings =
            serde_json::from_str(r#"{"templating_recursion_limit": 3}"#).unwrap();
        assert_eq!(settings.templating_recursion_limit, 3);
        assert!(settings.preload_new_instances);
    }
}
