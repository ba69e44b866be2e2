//! Declarative canonical-to-provider parameter mapping
//!
//! Each (provider, function) pair owns a [`FunctionTable`]: an ordered map
//! from canonical field name to one or more [`ParamSpec`] entries. Tables
//! are built once into `LazyLock` statics and shared read-only across all
//! concurrent requests. [`build_request`] applies a table to a canonical
//! body, producing the provider-native request body without touching the
//! network.

use indexmap::IndexMap;
use plexus_core::error::GatewayError;
use plexus_core::types::{ProviderId, Target};
use serde_json::{Map, Value};

/// Compute a provider-native value from the full canonical body and target
pub type TransformFn = fn(&Value, &Target) -> Option<Value>;

/// What to do with a numeric value outside its bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsPolicy {
    /// Fail the request with a validation error (the default)
    Reject,
    /// Clamp into range; used only where the upstream documents clamping
    Clamp,
}

/// Numeric bounds for a mapped parameter
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    /// Inclusive minimum
    pub min: f64,
    /// Inclusive maximum
    pub max: f64,
    /// Out-of-range handling for this field
    pub policy: BoundsPolicy,
}

/// Mapping rule for one provider-native parameter
///
/// Value resolution order: `transform` → raw canonical field → `default_fn`
/// → `default`. A transform returning JSON `null` removes the target
/// parameter from the output (explicit null-out of a conflicting field).
pub struct ParamSpec {
    /// Provider-native parameter name; dotted segments nest
    /// (`generationConfig.topK`)
    pub param: &'static str,
    /// Fail request construction when no value resolves
    pub required: bool,
    /// Static default value
    pub default: Option<Value>,
    /// Computed default, consulted before `default`
    pub default_fn: Option<TransformFn>,
    /// Numeric bounds
    pub bounds: Option<Bounds>,
    /// Value transform over the whole canonical body
    pub transform: Option<TransformFn>,
}

impl ParamSpec {
    /// Rule mapping a canonical field straight to `param`
    pub const fn new(param: &'static str) -> Self {
        Self {
            param,
            required: false,
            default: None,
            default_fn: None,
            bounds: None,
            transform: None,
        }
    }

    /// Mark the parameter required
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a static default
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Attach a computed default
    #[must_use]
    pub const fn default_with(mut self, f: TransformFn) -> Self {
        self.default_fn = Some(f);
        self
    }

    /// Reject values outside `[min, max]`
    #[must_use]
    pub const fn bounded(mut self, min: f64, max: f64) -> Self {
        self.bounds = Some(Bounds {
            min,
            max,
            policy: BoundsPolicy::Reject,
        });
        self
    }

    /// Clamp values into `[min, max]` (documented per-field choice)
    #[must_use]
    pub const fn clamped(mut self, min: f64, max: f64) -> Self {
        self.bounds = Some(Bounds {
            min,
            max,
            policy: BoundsPolicy::Clamp,
        });
        self
    }

    /// Attach a value transform
    #[must_use]
    pub const fn transform(mut self, f: TransformFn) -> Self {
        self.transform = Some(f);
        self
    }
}

/// Ordered mapping from canonical field name to provider parameter rules
#[derive(Default)]
pub struct FunctionTable {
    mappings: IndexMap<&'static str, Vec<ParamSpec>>,
}

impl FunctionTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a canonical field to one provider parameter
    #[must_use]
    pub fn map(mut self, field: &'static str, spec: ParamSpec) -> Self {
        self.mappings.entry(field).or_default().push(spec);
        self
    }

    /// Map a canonical field to several provider parameters (fan-out)
    #[must_use]
    pub fn map_many(mut self, field: &'static str, specs: Vec<ParamSpec>) -> Self {
        self.mappings.entry(field).or_default().extend(specs);
        self
    }

    /// Remove a canonical field mapping (used when deriving one provider's
    /// table from another's)
    #[must_use]
    pub fn unmap(mut self, field: &'static str) -> Self {
        self.mappings.shift_remove(field);
        self
    }

    /// Iterate mappings in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&&'static str, &Vec<ParamSpec>)> {
        self.mappings.iter()
    }

    /// Whether any canonical field is mapped
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Apply a mapping table to a canonical body, producing the provider-native
/// request body
///
/// Pure function of its inputs; identical inputs always produce identical
/// outputs. Fails before any network call when a required mapping cannot be
/// resolved or a bounded value is rejected.
pub fn build_request(
    provider: ProviderId,
    table: &FunctionTable,
    body: &Value,
    target: &Target,
) -> Result<Map<String, Value>, GatewayError> {
    let mut out = Map::new();

    for (field, specs) in table.iter() {
        for spec in specs {
            let mut value = match spec.transform {
                Some(transform) => transform(body, target),
                None => body.get(*field).filter(|v| !v.is_null()).cloned(),
            };
            if value.is_none() {
                value = spec
                    .default_fn
                    .and_then(|f| f(body, target))
                    .or_else(|| spec.default.clone());
            }

            match value {
                None if spec.required => {
                    return Err(GatewayError::MissingRequiredParameter {
                        field: (*field).to_owned(),
                        provider,
                    });
                }
                None => {}
                // Explicit null-out: a later entry may erase a parameter an
                // earlier entry (or another field's fan-out) produced.
                Some(Value::Null) => remove_path(&mut out, spec.param),
                Some(resolved) => {
                    let resolved = apply_bounds(provider, field, spec, resolved)?;
                    insert_path(&mut out, spec.param, resolved);
                }
            }
        }
    }

    Ok(out)
}

/// Enforce a spec's bounds on a resolved value
///
/// Non-numeric values pass through untouched; bounds only constrain numbers.
fn apply_bounds(provider: ProviderId, field: &str, spec: &ParamSpec, value: Value) -> Result<Value, GatewayError> {
    let Some(bounds) = spec.bounds else {
        return Ok(value);
    };
    let Some(number) = value.as_f64() else {
        return Ok(value);
    };

    if number >= bounds.min && number <= bounds.max {
        return Ok(value);
    }

    match bounds.policy {
        BoundsPolicy::Reject => Err(GatewayError::ParameterOutOfRange {
            field: field.to_owned(),
            provider,
            detail: format!("{number} not in [{}, {}]", bounds.min, bounds.max),
        }),
        BoundsPolicy::Clamp => {
            let clamped = number.clamp(bounds.min, bounds.max);
            // Integer inputs stay integers after clamping
            if value.is_i64() || value.is_u64() {
                #[allow(clippy::cast_possible_truncation)]
                Ok(Value::from(clamped as i64))
            } else {
                Ok(serde_json::Number::from_f64(clamped).map_or(Value::Null, Value::Number))
            }
        }
    }
}

/// Insert a value at a dotted path, creating intermediate objects
fn insert_path(out: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            out.insert(path.to_owned(), value);
        }
        Some((head, rest)) => {
            let entry = out
                .entry(head.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(nested) = entry {
                insert_path(nested, rest, value);
            }
        }
    }
}

/// Remove a value at a dotted path, if present
fn remove_path(out: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            out.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(nested)) = out.get_mut(head) {
                remove_path(nested, rest);
            }
        }
    }
}
