//! Action Registry & Validator (spec §4.3).
//!
//! The Validator is pure and side-effect-free: it only inspects a candidate `Action`
//! against its `ActionSchema` and returns `Ok(())` or a `Validation`-kind `Error`. It
//! never executes anything, which is what lets `batch_sync`/`batch_async` validate
//! every sub-action up front before the Router dispatches the first one.

use conclave_core::{Action, ActionSchema, ActionType, Error, ParamType, Result, Value};
use std::collections::BTreeMap;

pub struct Validator<'a> {
    registry: &'a BTreeMap<ActionType, ActionSchema>,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a BTreeMap<ActionType, ActionSchema>) -> Self {
        Self { registry }
    }

    /// Validates one action (recursing into batch sub-actions). Does not execute
    /// anything.
    pub fn validate(&self, action: &Action) -> Result<()> {
        let schema = self
            .registry
            .get(&action.action_type)
            .ok_or_else(|| Error::UnknownAction(action.action_type.as_str().to_string()))?;

        for spec in &schema.required {
            let value = action
                .params
                .get(&spec.name)
                .ok_or_else(|| Error::MissingRequiredParam(spec.name.clone()))?;
            self.validate_type(&spec.name, &spec.ty, value)?;
        }

        for spec in &schema.optional {
            if let Some(value) = action.params.get(&spec.name) {
                self.validate_type(&spec.name, &spec.ty, value)?;
            }
        }

        self.validate_xor_groups(schema, action)?;

        if action.action_type.is_batch() {
            self.validate_batch(action)?;
        }

        Ok(())
    }

    /// Validates every sub-action in a batch up front; a batch's sub-actions may not
    /// themselves be `batch_sync`/`batch_async` (spec §6: batch actions may not nest).
    fn validate_batch(&self, action: &Action) -> Result<()> {
        let Some(Value::List(items)) = action.params.get("actions") else {
            return Ok(());
        };
        for item in items {
            let Value::Map(map) = item else {
                return Err(Error::MissingRequiredParam("actions[].type".into()));
            };
            let type_str = map
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::MissingRequiredParam("actions[].type".into()))?;
            let sub_type = ActionType::from_str(type_str)
                .ok_or_else(|| Error::UnknownAction(type_str.to_string()))?;
            if sub_type.is_batch() {
                return Err(Error::XorViolation(vec!["actions[].type".into()]));
            }
            let sub_params = match map.get("params") {
                Some(Value::Map(m)) => m.clone(),
                _ => BTreeMap::new(),
            };
            let sub_action = Action::new(sub_type, sub_params);
            self.validate(&sub_action)?;
        }
        Ok(())
    }

    /// Exactly one alternative of each XOR group must be fully present.
    fn validate_xor_groups(&self, schema: &ActionSchema, action: &Action) -> Result<()> {
        for group in &schema.xor_groups {
            let satisfied: Vec<&Vec<String>> = group
                .iter()
                .filter(|alt| alt.iter().all(|name| action.params.contains_key(name)))
                .collect();
            if satisfied.len() != 1 {
                let names: Vec<String> = group.iter().flatten().cloned().collect();
                return Err(Error::XorViolation(names));
            }
        }
        Ok(())
    }

    fn validate_type(&self, name: &str, ty: &ParamType, value: &Value) -> Result<()> {
        match ty {
            ParamType::Bool => value
                .as_bool()
                .map(|_| ())
                .ok_or_else(|| Error::InvalidEnum { param: name.into(), value: format!("{value:?}") }),
            ParamType::Int | ParamType::Float | ParamType::Decimal => value
                .as_f64()
                .map(|_| ())
                .ok_or_else(|| Error::InvalidEnum { param: name.into(), value: format!("{value:?}") }),
            ParamType::Str => value
                .as_str()
                .map(|_| ())
                .ok_or_else(|| Error::InvalidEnum { param: name.into(), value: format!("{value:?}") }),
            ParamType::List(inner) => match value {
                Value::List(items) => {
                    for item in items {
                        self.validate_type(name, inner, item)?;
                    }
                    Ok(())
                }
                // Models occasionally emit `{}` instead of `[]` for an empty list; tolerate it.
                v if v.is_empty_container() => Ok(()),
                _ => Err(Error::InvalidEnum { param: name.into(), value: format!("{value:?}") }),
            },
            ParamType::Map(inner) => match value {
                Value::Map(map) => {
                    for v in map.values() {
                        self.validate_type(name, inner, v)?;
                    }
                    Ok(())
                }
                _ => Err(Error::InvalidEnum { param: name.into(), value: format!("{value:?}") }),
            },
            ParamType::NestedMap { keys, all_optional } => match value {
                Value::List(items) => {
                    for item in items {
                        self.validate_nested_map(name, keys, *all_optional, item)?;
                    }
                    Ok(())
                }
                Value::Map(_) => self.validate_nested_map(name, keys, *all_optional, value),
                _ => Err(Error::InvalidEnum { param: name.into(), value: format!("{value:?}") }),
            },
            ParamType::Enum(allowed) => match value.as_str() {
                Some(s) if allowed.iter().any(|a| a == s) => Ok(()),
                _ => Err(Error::InvalidEnum { param: name.into(), value: format!("{value:?}") }),
            },
            ParamType::Union(alts) => {
                if alts.iter().any(|alt| self.validate_type(name, alt, value).is_ok()) {
                    Ok(())
                } else {
                    Err(Error::InvalidEnum { param: name.into(), value: format!("{value:?}") })
                }
            }
            ParamType::ActionSpec => match value {
                Value::Map(map) if map.contains_key("type") => Ok(()),
                _ => Err(Error::MissingRequiredParam(format!("{name}.type"))),
            },
        }
    }

    fn validate_nested_map(&self, name: &str, keys: &[String], all_optional: bool, value: &Value) -> Result<()> {
        let Value::Map(map) = value else {
            return Err(Error::InvalidEnum { param: name.into(), value: format!("{value:?}") });
        };
        if !all_optional {
            for k in keys {
                if !map.contains_key(k) {
                    return Err(Error::MissingRequiredParam(format!("{name}.{k}")));
                }
            }
        }
        for k in map.keys() {
            if !keys.iter().any(|allowed| allowed == k) {
                return Err(Error::InvalidEnum { param: name.into(), value: k.clone() });
            }
        }
        Ok(())
    }
}
