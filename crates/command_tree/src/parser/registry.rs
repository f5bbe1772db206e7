//! Type-keyed parser suppliers and specifier-to-parameter mappers.

use std::{collections::HashMap, fmt, sync::Arc};

use command_tree_contract::{
    ArgumentType, ArityClass, ParamValue, ParameterKey, ParserParameters, Specifier,
    SpecifierKind, TypeKey,
};
use tracing::debug;

use super::{
    BooleanParser, CharParser, ChoiceParser, FloatParser, IntegerParser, SharedParser,
    StringParser,
};
use crate::{component::CommandComponent, error::RegistrationError};

/// Factory building a parser from a parameter set.
pub type ParserSupplier<C> = Arc<
    dyn Fn(&ParserParameters) -> Result<SharedParser<C>, RegistrationError> + Send + Sync,
>;

/// Maps one declarative specifier on a given type to parser parameters.
pub type AnnotationMapper = Arc<
    dyn Fn(&Specifier, &TypeKey) -> Result<ParserParameters, RegistrationError> + Send + Sync,
>;

/// Lookup table from semantic type to parser factory.
pub struct ParserRegistry<C> {
    suppliers: HashMap<TypeKey, ParserSupplier<C>>,
    mappers: HashMap<SpecifierKind, AnnotationMapper>,
}

impl<C> fmt::Debug for ParserRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types = self.suppliers.keys().collect::<Vec<_>>();
        types.sort();
        f.debug_struct("ParserRegistry")
            .field("types", &types)
            .field("mappers", &self.mappers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<C: 'static> Default for ParserRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> ParserRegistry<C> {
    /// Registry preloaded with suppliers for every built-in type and the standard mappers.
    pub fn new() -> Self {
        let mut registry = Self {
            suppliers: HashMap::new(),
            mappers: HashMap::new(),
        };
        for key in [
            TypeKey::Byte,
            TypeKey::Short,
            TypeKey::Integer,
            TypeKey::Long,
        ] {
            let (low, high) = IntegerParser::type_bounds(&key).unwrap_or((i64::MIN, i64::MAX));
            registry.register_parser_supplier(key, move |params: &ParserParameters| {
                let min = int_param(params, &ParameterKey::RangeMin)?.unwrap_or(low);
                let max = int_param(params, &ParameterKey::RangeMax)?.unwrap_or(high);
                Ok(Arc::new(IntegerParser::new(min, max)?) as SharedParser<C>)
            });
        }
        for key in [TypeKey::Float, TypeKey::Double] {
            let (low, high) = FloatParser::type_bounds(&key).unwrap_or((f64::MIN, f64::MAX));
            registry.register_parser_supplier(key, move |params: &ParserParameters| {
                let min = float_param(params, &ParameterKey::RangeMin)?.unwrap_or(low);
                let max = float_param(params, &ParameterKey::RangeMax)?.unwrap_or(high);
                Ok(Arc::new(FloatParser::new(min, max)?) as SharedParser<C>)
            });
        }
        registry.register_parser_supplier(TypeKey::Boolean, |params: &ParserParameters| {
            let liberal = params.flag(&ParameterKey::Custom("liberal".to_string()));
            Ok(Arc::new(BooleanParser::new(liberal)) as SharedParser<C>)
        });
        registry.register_parser_supplier(TypeKey::Char, |_: &ParserParameters| {
            Ok(Arc::new(CharParser) as SharedParser<C>)
        });
        registry.register_parser_supplier(TypeKey::String, |params: &ParserParameters| {
            if let Some(choices) = params.get(&ParameterKey::Choices) {
                let ParamValue::List(values) = choices else {
                    return Err(RegistrationError::InvalidParameter {
                        key: "choices".to_string(),
                        message: "expected a list of words".to_string(),
                    });
                };
                return Ok(Arc::new(ChoiceParser::new(values.clone())?) as SharedParser<C>);
            }
            let parser = if params.flag(&ParameterKey::Greedy) {
                StringParser::greedy()
            } else {
                StringParser::single()
            };
            Ok(Arc::new(parser) as SharedParser<C>)
        });

        registry.register_annotation_mapper(SpecifierKind::Range, map_range);
        registry.register_annotation_mapper(SpecifierKind::Greedy, |_, key| {
            if key.canonical() != TypeKey::String {
                return Err(RegistrationError::InvalidParameter {
                    key: "greedy".to_string(),
                    message: format!("greedy applies to strings, not `{}`", key.display_name()),
                });
            }
            Ok(ParserParameters::empty().with(ParameterKey::Greedy, ParamValue::Bool(true)))
        });
        registry.register_annotation_mapper(SpecifierKind::Choices, |specifier, _| {
            let Specifier::Choices { values } = specifier else {
                return Ok(ParserParameters::empty());
            };
            Ok(ParserParameters::empty()
                .with(ParameterKey::Choices, ParamValue::List(values.clone())))
        });
        registry
    }

    /// Registers the factory for `key`, replacing any previous one.
    pub fn register_parser_supplier<F>(&mut self, key: TypeKey, supplier: F)
    where
        F: Fn(&ParserParameters) -> Result<SharedParser<C>, RegistrationError>
            + Send
            + Sync
            + 'static,
    {
        let key = key.canonical();
        if self.suppliers.insert(key.clone(), Arc::new(supplier)).is_some() {
            debug!(type_key = %key.display_name(), "parser supplier replaced");
        }
    }

    /// Registers the mapper for specifiers of `kind`, replacing any previous one.
    pub fn register_annotation_mapper<F>(&mut self, kind: SpecifierKind, mapper: F)
    where
        F: Fn(&Specifier, &TypeKey) -> Result<ParserParameters, RegistrationError>
            + Send
            + Sync
            + 'static,
    {
        self.mappers.insert(kind, Arc::new(mapper));
    }

    /// Whether a supplier exists for `key` or its canonical form.
    pub fn has_supplier(&self, key: &TypeKey) -> bool {
        self.suppliers.contains_key(&key.canonical())
    }

    /// Folds every specifier with a registered mapper into one parameter set.
    ///
    /// Sets are combined with [`ParserParameters::merge`]: keys produced by a single specifier are
    /// kept whatever the order, and for a key produced by several specifiers the last one wins.
    /// Specifiers without a mapper are ignored.
    ///
    /// # Errors
    ///
    /// Propagates the first mapper error.
    pub fn parse_annotations(
        &self,
        key: &TypeKey,
        specifiers: &[Specifier],
    ) -> Result<ParserParameters, RegistrationError> {
        let key = key.canonical();
        let mut params = ParserParameters::empty();
        for specifier in specifiers {
            let Some(mapper) = self.mappers.get(&specifier.kind()) else {
                debug!(?specifier, "no mapper for specifier");
                continue;
            };
            params.merge(mapper(specifier, &key)?);
        }
        Ok(params)
    }

    /// Builds a parser for `key`, resolving primitive aliases first.
    ///
    /// Returns `Ok(None)` when no supplier is registered; the caller decides whether that is fatal.
    ///
    /// # Errors
    ///
    /// Propagates supplier errors such as [`RegistrationError::InvalidRange`].
    pub fn create_parser(
        &self,
        key: &TypeKey,
        params: &ParserParameters,
    ) -> Result<Option<SharedParser<C>>, RegistrationError> {
        match self.suppliers.get(&key.canonical()) {
            Some(supplier) => supplier(params).map(Some),
            None => Ok(None),
        }
    }

    /// [`ParserRegistry::create_parser`] keyed by a Rust type.
    ///
    /// # Errors
    ///
    /// Propagates supplier errors.
    pub fn create_parser_for<T: ArgumentType>(
        &self,
        params: &ParserParameters,
    ) -> Result<Option<SharedParser<C>>, RegistrationError> {
        self.create_parser(&T::type_key(), params)
    }

    /// Builds a required positional component of type `key` from declarative specifiers.
    ///
    /// A greedy parameter makes the component greedy.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UnknownType`] when no supplier is registered, or any mapper or
    /// supplier error.
    pub fn component(
        &self,
        name: impl Into<String>,
        key: TypeKey,
        specifiers: &[Specifier],
    ) -> Result<CommandComponent<C>, RegistrationError> {
        let key = key.canonical();
        let params = self.parse_annotations(&key, specifiers)?;
        let parser = self
            .create_parser(&key, &params)?
            .ok_or_else(|| RegistrationError::UnknownType {
                type_name: key.display_name(),
            })?;
        let arity = if params.flag(&ParameterKey::Greedy) {
            ArityClass::Greedy
        } else {
            ArityClass::Single
        };
        Ok(CommandComponent::typed(name, arity, key, params, parser))
    }
}

fn int_param(
    params: &ParserParameters,
    key: &ParameterKey,
) -> Result<Option<i64>, RegistrationError> {
    match params.get(key) {
        None => Ok(None),
        Some(ParamValue::Int(value)) => Ok(Some(*value)),
        Some(other) => Err(RegistrationError::InvalidParameter {
            key: parameter_name(key),
            message: format!("expected an integer, found {other:?}"),
        }),
    }
}

fn float_param(
    params: &ParserParameters,
    key: &ParameterKey,
) -> Result<Option<f64>, RegistrationError> {
    match params.get(key) {
        None => Ok(None),
        Some(ParamValue::Float(value)) => Ok(Some(*value)),
        Some(ParamValue::Int(value)) => Ok(Some(*value as f64)),
        Some(other) => Err(RegistrationError::InvalidParameter {
            key: parameter_name(key),
            message: format!("expected a number, found {other:?}"),
        }),
    }
}

fn parameter_name(key: &ParameterKey) -> String {
    match key {
        ParameterKey::RangeMin => "range-min".to_string(),
        ParameterKey::RangeMax => "range-max".to_string(),
        ParameterKey::Greedy => "greedy".to_string(),
        ParameterKey::Choices => "choices".to_string(),
        ParameterKey::Custom(name) => name.clone(),
    }
}

fn map_range(specifier: &Specifier, key: &TypeKey) -> Result<ParserParameters, RegistrationError> {
    let Specifier::Range { min, max } = specifier else {
        return Ok(ParserParameters::empty());
    };
    if !key.is_numeric() {
        return Err(RegistrationError::InvalidParameter {
            key: "range".to_string(),
            message: format!("ranges apply to numbers, not `{}`", key.display_name()),
        });
    }
    let mut params = ParserParameters::empty();
    for (raw, param) in [(min, ParameterKey::RangeMin), (max, ParameterKey::RangeMax)] {
        let Some(raw) = raw.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) else {
            continue;
        };
        params.store(param.clone(), range_bound(raw, key, &param)?);
    }
    Ok(params)
}

fn range_bound(
    raw: &str,
    key: &TypeKey,
    param: &ParameterKey,
) -> Result<ParamValue, RegistrationError> {
    let invalid = |message: String| RegistrationError::InvalidParameter {
        key: parameter_name(param),
        message,
    };
    if let Some((low, high)) = IntegerParser::type_bounds(key) {
        let value = raw
            .parse::<i64>()
            .map_err(|_| invalid(format!("`{raw}` is not an integer")))?;
        if !(low..=high).contains(&value) {
            return Err(invalid(format!(
                "`{raw}` does not fit in `{}`",
                key.display_name()
            )));
        }
        return Ok(ParamValue::Int(value));
    }
    let value = raw
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| invalid(format!("`{raw}` is not a finite number")))?;
    Ok(ParamValue::Float(value))
}

#[cfg(test)]
mod tests {
    use command_tree_contract::ArgValue;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{context::CommandContext, tokens::TokenQueue};

    fn range(min: &str, max: &str) -> Specifier {
        Specifier::Range {
            min: Some(min.to_string()),
            max: Some(max.to_string()),
        }
    }

    #[test]
    fn primitive_aliases_resolve_before_lookup() {
        let registry = ParserRegistry::<()>::new();
        let parser = registry
            .create_parser(&TypeKey::from_name("i32"), &ParserParameters::empty())
            .expect("create")
            .expect("registered");
        let mut queue = TokenQueue::from_input("7");
        assert_eq!(
            parser.parse(&CommandContext::new(()), &mut queue),
            Ok(ArgValue::Int(7))
        );
        assert!(registry
            .create_parser_for::<i64>(&ParserParameters::empty())
            .expect("create")
            .is_some());
    }

    #[test]
    fn unregistered_type_yields_no_parser() {
        let registry = ParserRegistry::<()>::new();
        let parser = registry
            .create_parser(&TypeKey::from_name("player"), &ParserParameters::empty())
            .expect("lookup never fails for unknown types");
        assert!(parser.is_none());
        assert_eq!(
            registry
                .component("target", TypeKey::from_name("player"), &[])
                .err(),
            Some(RegistrationError::UnknownType {
                type_name: "player".to_string()
            })
        );
    }

    #[test]
    fn last_supplier_registration_wins() {
        let mut registry = ParserRegistry::<()>::new();
        registry.register_parser_supplier(TypeKey::Integer, |_: &ParserParameters| {
            Ok(Arc::new(IntegerParser::new(0, 1)?) as SharedParser<()>)
        });
        let parser = registry
            .create_parser(&TypeKey::Integer, &ParserParameters::empty())
            .expect("create")
            .expect("registered");
        let mut queue = TokenQueue::from_input("5");
        assert!(parser.parse(&CommandContext::new(()), &mut queue).is_err());
    }

    #[test]
    fn inverted_range_fails_at_registration() {
        let registry = ParserRegistry::<()>::new();
        let result = registry.component("x", TypeKey::Integer, &[range("10", "1")]);
        assert_eq!(
            result.err(),
            Some(RegistrationError::InvalidRange {
                min: "10".to_string(),
                max: "1".to_string(),
            })
        );
    }

    #[test]
    fn range_bound_must_fit_type_width() {
        let registry = ParserRegistry::<()>::new();
        assert!(matches!(
            registry.parse_annotations(&TypeKey::Byte, &[range("0", "300")]),
            Err(RegistrationError::InvalidParameter { .. })
        ));
        assert!(matches!(
            registry.parse_annotations(&TypeKey::String, &[range("0", "3")]),
            Err(RegistrationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn annotation_merge_is_order_independent_for_disjoint_keys() {
        let registry = ParserRegistry::<()>::new();
        let low = Specifier::Range {
            min: Some("1".to_string()),
            max: None,
        };
        let high = Specifier::Range {
            min: None,
            max: Some("9".to_string()),
        };
        let forward = registry
            .parse_annotations(&TypeKey::Integer, &[low.clone(), high.clone()])
            .expect("merge");
        let backward = registry
            .parse_annotations(&TypeKey::Integer, &[high, low])
            .expect("merge");
        assert_eq!(forward, backward);
    }

    #[test]
    fn annotation_merge_conflict_takes_last_applied_value() {
        let registry = ParserRegistry::<()>::new();
        let params = registry
            .parse_annotations(&TypeKey::Integer, &[range("1", "5"), range("2", "5")])
            .expect("merge");
        assert_eq!(
            params.get(&ParameterKey::RangeMin),
            Some(&ParamValue::Int(2))
        );
    }

    #[test]
    fn greedy_specifier_builds_greedy_component() {
        let registry = ParserRegistry::<()>::new();
        let component = registry
            .component("message", TypeKey::String, &[Specifier::Greedy])
            .expect("component");
        assert_eq!(component.arity(), ArityClass::Greedy);
        assert!(registry
            .component("count", TypeKey::Integer, &[Specifier::Greedy])
            .is_err());
    }
}
