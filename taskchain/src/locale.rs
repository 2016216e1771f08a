//! Message lookup with `%{name}` interpolation.
//!
//! Resolution order for [`Locale::translate_or`]:
//!
//! 1. A configured [`Translator`], if it knows the key for the active locale.
//! 2. The explicit default passed by the caller.
//! 3. The built-in English table.
//! 4. `"translation missing: <key>"`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};

/// External message source consulted before the built-in table.
pub trait Translator: Send + Sync {
    /// Return `None` to fall back to the built-in resolution.
    fn translate(&self, locale: &str, key: &str, vars: &[(&str, String)]) -> Option<String>;
}

#[derive(Clone)]
pub struct Locale {
    name: String,
    translator: Option<Arc<dyn Translator>>,
}

impl Default for Locale {
    fn default() -> Self {
        Self::new("en")
    }
}

impl fmt::Debug for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locale")
            .field("name", &self.name)
            .field("translator", &self.translator.is_some())
            .finish()
    }
}

impl Locale {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            translator: None,
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn translate(&self, key: &str, vars: &[(&str, String)]) -> String {
        self.resolve(key, vars, None)
    }

    pub fn translate_or(&self, key: &str, vars: &[(&str, String)], default: &str) -> String {
        self.resolve(key, vars, Some(default))
    }

    fn resolve(&self, key: &str, vars: &[(&str, String)], default: Option<&str>) -> String {
        if let Some(text) = self
            .translator
            .as_ref()
            .and_then(|translator| translator.translate(&self.name, key, vars))
        {
            return text;
        }
        if let Some(default) = default {
            return interpolate(default, vars);
        }
        match BUILTIN.get(key) {
            Some(template) => interpolate(template, vars),
            None => format!("translation missing: {key}"),
        }
    }
}

/// Replace `%{name}` with the matching value. Unknown names are left as-is.
pub fn interpolate(template: &str, vars: &[(&str, String)]) -> String {
    static PLACEHOLDER: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"%\{(\w+)\}").expect("placeholder pattern"));

    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map_or_else(|| caps[0].to_string(), |(_, value)| value.clone())
        })
        .into_owned()
}

static BUILTIN: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("taskchain.faults.unspecified", "no reason given"),
        ("taskchain.params.required", "is a required parameter"),
        ("taskchain.coercions.into_a", "could not coerce into a %{type}"),
        ("taskchain.coercions.into_an", "could not coerce into an %{type}"),
        ("taskchain.validators.presence", "cannot be empty"),
        ("taskchain.validators.format", "is an invalid format"),
        ("taskchain.validators.custom", "is not valid"),
        ("taskchain.validators.length.within", "length must be within %{min} and %{max}"),
        ("taskchain.validators.length.not_within", "length must not be within %{min} and %{max}"),
        ("taskchain.validators.length.min", "length must be at least %{min}"),
        ("taskchain.validators.length.max", "length must be at most %{max}"),
        ("taskchain.validators.length.is", "length must be %{is}"),
        ("taskchain.validators.length.is_not", "length must not be %{is_not}"),
        ("taskchain.validators.numeric.nan", "must be a number"),
        ("taskchain.validators.numeric.within", "must be within %{min} and %{max}"),
        ("taskchain.validators.numeric.not_within", "must not be within %{min} and %{max}"),
        ("taskchain.validators.numeric.min", "must be at least %{min}"),
        ("taskchain.validators.numeric.max", "must be at most %{max}"),
        ("taskchain.validators.numeric.is", "must be %{is}"),
        ("taskchain.validators.numeric.is_not", "must not be %{is_not}"),
        ("taskchain.validators.inclusion.of", "must be one of: %{values}"),
        ("taskchain.validators.inclusion.within", "must be within %{min} and %{max}"),
        ("taskchain.validators.exclusion.of", "must not be one of: %{values}"),
        ("taskchain.validators.exclusion.within", "must not be within %{min} and %{max}"),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;

    struct Spanish;

    impl Translator for Spanish {
        fn translate(&self, locale: &str, key: &str, vars: &[(&str, String)]) -> Option<String> {
            (locale == "es" && key == "taskchain.params.required")
                .then(|| interpolate("es un parámetro obligatorio %{note}", vars))
        }
    }

    #[test]
    fn builtin_key_is_interpolated() {
        let text = Locale::default().translate(
            "taskchain.validators.length.min",
            &[("min", 5.to_string())],
        );
        assert_eq!(text, "length must be at least 5");
    }

    #[test]
    fn unknown_key_reports_missing_translation() {
        let text = Locale::default().translate("taskchain.nope", &[]);
        assert_eq!(text, "translation missing: taskchain.nope");
    }

    #[test]
    fn explicit_default_wins_without_translator() {
        let text = Locale::default().translate_or(
            "taskchain.params.required",
            &[("name", "sku".to_string())],
            "%{name} is needed",
        );
        assert_eq!(text, "sku is needed");
    }

    #[test]
    fn translator_takes_precedence_over_default() {
        let locale = Locale::new("es").with_translator(Arc::new(Spanish));
        let text = locale.translate_or(
            "taskchain.params.required",
            &[("note", "!".to_string())],
            "ignored",
        );
        assert_eq!(text, "es un parámetro obligatorio !");
    }

    #[test]
    fn translator_miss_falls_back_to_builtin() {
        let locale = Locale::new("es").with_translator(Arc::new(Spanish));
        assert_eq!(
            locale.translate("taskchain.validators.presence", &[]),
            "cannot be empty"
        );
    }

    #[test]
    fn unknown_placeholders_are_preserved() {
        assert_eq!(interpolate("at least %{min}", &[]), "at least %{min}");
    }
}
