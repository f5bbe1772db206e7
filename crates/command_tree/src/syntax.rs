//! Declarative command syntax strings.
//!
//! ```text
//! math add|plus <x:int{1..10}> [y:int=5] [-v|verbose] [-n:int] <msg:string...>
//! ```
//!
//! | Form | Meaning |
//! |---|---|
//! | `word`, `word|alias` | literal with aliases |
//! | `<name:type>` | required value (`type` defaults to `string`) |
//! | `[name:type]`, `[name:type=raw]` | optional value, with default |
//! | `<name:type...>` | greedy tail |
//! | `<name:int{lo..hi}>` | inclusive range, either bound may be empty |
//! | `<name:(a|b)>` | one of a fixed set of words |
//! | `[-flag|alias]`, `[-flag:type]` | presence flag, value flag |

use command_tree_contract::{Specifier, TypeKey};

use crate::{
    command::CommandBuilder,
    component::CommandComponent,
    error::RegistrationError,
    parser::ParserRegistry,
};

/// Parser for declarative syntax strings.
#[derive(Debug, Clone, Copy)]
pub struct CommandSyntax<'a> {
    raw: &'a str,
}

impl<'a> CommandSyntax<'a> {
    /// Parses `raw` into a builder still lacking a handler and metadata.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidSyntax`] for malformed segments, or the registry error
    /// for unknown types and invalid ranges.
    pub fn parse<C: 'static>(
        registry: &ParserRegistry<C>,
        raw: &'a str,
    ) -> Result<CommandBuilder<C>, RegistrationError> {
        let syntax = Self { raw };
        let mut builder = CommandBuilder::new();
        for segment in raw.split_whitespace() {
            builder = builder.argument(syntax.segment(registry, segment)?);
        }
        Ok(builder)
    }

    fn invalid(&self, message: impl Into<String>) -> RegistrationError {
        RegistrationError::InvalidSyntax {
            syntax: self.raw.to_string(),
            message: message.into(),
        }
    }

    fn segment<C: 'static>(
        &self,
        registry: &ParserRegistry<C>,
        segment: &str,
    ) -> Result<CommandComponent<C>, RegistrationError> {
        if let Some(inner) = segment.strip_prefix('<') {
            let inner = inner
                .strip_suffix('>')
                .ok_or_else(|| self.invalid(format!("`{segment}` is missing `>`")))?;
            if inner.starts_with('-') {
                return Err(self.invalid(format!("flag `{segment}` must use `[...]`")));
            }
            if inner.contains('=') {
                return Err(self.invalid(format!("required `{segment}` cannot have a default")));
            }
            return self.value(registry, inner);
        }
        if let Some(inner) = segment.strip_prefix('[') {
            let inner = inner
                .strip_suffix(']')
                .ok_or_else(|| self.invalid(format!("`{segment}` is missing `]`")))?;
            if let Some(flag) = inner.strip_prefix('-') {
                return self.flag(registry, flag);
            }
            let (body, default) = match inner.split_once('=') {
                Some((body, default)) => (body, Some(default)),
                None => (inner, None),
            };
            let component = self.value(registry, body)?;
            return Ok(match default {
                Some(raw) if raw.is_empty() => {
                    return Err(self.invalid(format!("`{segment}` has an empty default")));
                }
                Some(raw) => component.with_default(raw),
                None => component.into_optional(),
            });
        }
        if segment.contains(['<', '>', '[', ']', ':']) {
            return Err(self.invalid(format!("unbalanced segment `{segment}`")));
        }
        let mut names = segment.split('|');
        let name = names.next().unwrap_or_default();
        let aliases = names.collect::<Vec<_>>();
        if name.is_empty() || aliases.iter().any(|alias| alias.is_empty()) {
            return Err(self.invalid(format!("empty literal in `{segment}`")));
        }
        Ok(CommandComponent::literal(name).with_aliases(aliases))
    }

    fn value<C: 'static>(
        &self,
        registry: &ParserRegistry<C>,
        body: &str,
    ) -> Result<CommandComponent<C>, RegistrationError> {
        let (name, ty) = match body.split_once(':') {
            Some((name, ty)) => (name, ty),
            None => match body.strip_suffix("...") {
                Some(name) => (name, "string..."),
                None => (body, "string"),
            },
        };
        if name.is_empty() {
            return Err(self.invalid(format!("`{body}` has no name")));
        }
        let (key, specifiers) = self.type_spec(ty)?;
        registry.component(name, key, &specifiers)
    }

    fn flag<C: 'static>(
        &self,
        registry: &ParserRegistry<C>,
        body: &str,
    ) -> Result<CommandComponent<C>, RegistrationError> {
        let (names, ty) = match body.split_once(':') {
            Some((names, ty)) => (names, Some(ty)),
            None => (body, None),
        };
        let mut names = names.split('|');
        let name = names.next().unwrap_or_default();
        let aliases = names.collect::<Vec<_>>();
        if name.is_empty() || aliases.iter().any(|alias| alias.is_empty()) {
            return Err(self.invalid(format!("empty flag name in `-{body}`")));
        }
        let component = match ty {
            None => CommandComponent::flag(name),
            Some(ty) => {
                let (key, specifiers) = self.type_spec(ty)?;
                if specifiers.contains(&Specifier::Greedy) {
                    return Err(self.invalid(format!("flag `-{name}` cannot be greedy")));
                }
                registry.component(name, key, &specifiers)?.into_flag()
            }
        };
        Ok(component.with_aliases(aliases))
    }

    fn type_spec(&self, ty: &str) -> Result<(TypeKey, Vec<Specifier>), RegistrationError> {
        let mut specifiers = Vec::new();
        let mut ty = ty;
        if let Some(rest) = ty.strip_suffix("...") {
            specifiers.push(Specifier::Greedy);
            ty = rest;
        }
        if let Some(words) = ty.strip_prefix('(') {
            let words = words
                .strip_suffix(')')
                .ok_or_else(|| self.invalid(format!("choice list `{ty}` is missing `)`")))?;
            let values = words.split('|').map(str::to_string).collect::<Vec<_>>();
            if values.iter().any(String::is_empty) {
                return Err(self.invalid(format!("empty choice in `{ty}`")));
            }
            specifiers.push(Specifier::Choices { values });
            return Ok((TypeKey::String, specifiers));
        }
        if let Some((base, range)) = ty.split_once('{') {
            let range = range
                .strip_suffix('}')
                .ok_or_else(|| self.invalid(format!("range in `{ty}` is missing `}}`")))?;
            let (min, max) = range
                .split_once("..")
                .ok_or_else(|| self.invalid(format!("range `{range}` must look like `lo..hi`")))?;
            let bound = |raw: &str| (!raw.is_empty()).then(|| raw.to_string());
            specifiers.push(Specifier::Range {
                min: bound(min),
                max: bound(max),
            });
            ty = base;
        }
        if ty.is_empty() {
            return Err(self.invalid("missing type name"));
        }
        Ok((TypeKey::from_name(ty), specifiers))
    }
}
