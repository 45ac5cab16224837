//! Cluster variable resolution: `%{<id>[.<setting>][|<filter>]*}` template
//! substitution, grounded on `KiSC.Cluster.Config.resolveString`/
//! `resolveFile`.
use std::path::Path;

use regex::Regex;

use crate::error::KiscError;
use crate::resource::ConfigMap;
use crate::runtime;

/// How a resolver looks up the configuration backing a `%{<id>...}`
/// reference. Implemented by [`crate::config::Configuration`]; kept as a
/// trait here so `variable` does not need to depend on `config`.
pub trait VariableLookup {
    /// The root `[KiSC]` section, substituted for the `KiSC` id.
    fn kisc(&self) -> &ConfigMap;
    /// A resource's configuration/runtime map, by id (bootstrap or regular).
    fn resource(&self, id: &str) -> Option<&ConfigMap>;
}

/// Resolve every `%{...}` occurrence in `input`.
///
/// `host` substitutes the `$HOST` magic id, `resource_self` the `$SELF`
/// magic id. Each distinct variable is resolved once and spliced at every
/// occurrence (pure and associative: resolving twice or reordering
/// independent variables yields the same result).
pub fn resolve_string(
    input: &str,
    lookup: &dyn VariableLookup,
    host: Option<&ConfigMap>,
    resource_self: Option<&ConfigMap>,
) -> Result<String, KiscError> {
    let variable_re = Regex::new(r"%\{[^\{]*\}").expect("valid regex");
    let mut output = input.to_string();

    let mut seen = std::collections::HashSet::new();
    for capture in variable_re.find_iter(input) {
        let variable = capture.as_str().to_string();
        if !seen.insert(variable.clone()) {
            continue;
        }

        let body = &variable[2..variable.len() - 1];
        let (resource_id, setting) = match body.split_once('.') {
            Some((id, setting)) => (id, setting),
            None => (body, "ID"),
        };

        let mut filters = setting.split('|');
        let setting = filters.next().unwrap_or("ID");

        let config = match resource_id {
            "KiSC" => lookup.kisc(),
            "$HOST" => host.ok_or_else(|| KiscError::InvalidVariable("Target host not specified".to_string()))?,
            "$SELF" => resource_self.ok_or_else(|| KiscError::InvalidVariable("Target resource not specified".to_string()))?,
            other => lookup
                .resource(other)
                .ok_or_else(|| KiscError::InvalidVariable(format!("Invalid cluster variable; {variable} (unknown resource {other})")))?,
        };

        let raw_value = resolve_setting(config, setting)
            .ok_or_else(|| KiscError::InvalidVariable(format!("Invalid cluster variable; {variable}")))?;

        let mut value = FilterValue::Str(raw_value);
        for filter in filters {
            value = apply_filter(value, filter).map_err(|e| KiscError::InvalidVariable(format!("Invalid variable filter; {e}")))?;
        }

        output = output.replace(&variable, &value.to_string());
    }

    Ok(output)
}

fn resolve_setting(config: &ConfigMap, setting: &str) -> Option<String> {
    if let Some(consumable_id) = setting.strip_prefix("CONSUMES(").and_then(|s| s.strip_suffix(')')) {
        let consumes = runtime::parse_dictionary(config.get_or("CONSUMES", ""), Some(1)).ok()?;
        return consumes.into_iter().find(|(id, _)| id == consumable_id).map(|(_, v)| v.to_string());
    }
    if let Some(consumable_id) = setting.strip_prefix("CONSUMABLES(").and_then(|s| s.strip_suffix(')')) {
        let consumables = runtime::parse_dictionary(config.get_or("CONSUMABLES", ""), Some(1)).ok()?;
        return consumables.into_iter().find(|(id, _)| id == consumable_id).map(|(_, v)| v.to_string());
    }
    config.get(setting).map(str::to_string)
}

#[derive(Debug, Clone)]
enum FilterValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl std::fmt::Display for FilterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterValue::Int(v) => write!(f, "{v}"),
            FilterValue::Float(v) => write!(f, "{v}"),
            FilterValue::Str(v) => write!(f, "{v}"),
        }
    }
}

fn apply_filter(value: FilterValue, filter: &str) -> Result<FilterValue, String> {
    let filter = filter.trim();
    match filter {
        "int" => Ok(FilterValue::Int(as_str(&value).trim().parse().map_err(|_| filter.to_string())?)),
        "float" => Ok(FilterValue::Float(as_str(&value).trim().parse().map_err(|_| filter.to_string())?)),
        "strip" => Ok(FilterValue::Str(as_str(&value).trim().to_string())),
        "lower" => Ok(FilterValue::Str(as_str(&value).to_lowercase())),
        "upper" => Ok(FilterValue::Str(as_str(&value).to_uppercase())),
        "dirname" => Ok(FilterValue::Str(
            Path::new(&as_str(&value)).parent().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default(),
        )),
        "basename" => Ok(FilterValue::Str(
            Path::new(&as_str(&value)).file_name().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default(),
        )),
        _ => apply_parametrized_filter(value, filter),
    }
}

fn apply_parametrized_filter(value: FilterValue, filter: &str) -> Result<FilterValue, String> {
    let arithmetic_re = Regex::new(r"^(add|sub|mul|div)\( *([.0-9]+) *\)$").expect("valid regex");
    let remove_re = Regex::new(r"^remove\( *'([^']*)' *\)$").expect("valid regex");
    let replace_re = Regex::new(r"^replace\( *'([^']*)' *, *'([^']*)' *\)$").expect("valid regex");

    if let Some(captures) = arithmetic_re.captures(filter) {
        let operator = &captures[1];
        let operand: f64 = captures[2].parse().map_err(|_| filter.to_string())?;
        return Ok(match value {
            FilterValue::Float(current) => FilterValue::Float(arithmetic(current, operand, operator)),
            FilterValue::Int(current) => {
                let result = arithmetic(current as f64, operand, operator);
                FilterValue::Int(result as i64)
            }
            FilterValue::Str(current) => {
                let current: f64 = current.parse().map_err(|_| filter.to_string())?;
                FilterValue::Float(arithmetic(current, operand, operator))
            }
        });
    }

    if let Some(captures) = remove_re.captures(filter) {
        return Ok(FilterValue::Str(as_str(&value).replace(&captures[1], "")));
    }

    if let Some(captures) = replace_re.captures(filter) {
        return Ok(FilterValue::Str(as_str(&value).replace(&captures[1], &captures[2])));
    }

    Err(filter.to_string())
}

fn arithmetic(current: f64, operand: f64, operator: &str) -> f64 {
    match operator {
        "add" => current + operand,
        "sub" => current - operand,
        "mul" => current * operand,
        "div" => current / operand,
        _ => current,
    }
}

fn as_str(value: &FilterValue) -> String {
    value.to_string()
}

/// Read `source`, resolve cluster variables in its content and write the
/// result to `destination` (creating parent directories, applying
/// `user`/`group`/`mode` permissions if given).
pub fn resolve_file(
    source: &Path,
    destination: &Path,
    lookup: &dyn VariableLookup,
    host: Option<&ConfigMap>,
    resource_self: Option<&ConfigMap>,
    permissions: Option<(Option<&str>, Option<&str>, Option<u32>)>,
) -> Result<(), KiscError> {
    let content = std::fs::read_to_string(source).map_err(|e| KiscError::io(format!("reading {}", source.display()), e))?;
    let resolved = resolve_string(&content, lookup, host, resource_self)?;

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|e| KiscError::io(format!("creating {}", parent.display()), e))?;
    }
    std::fs::write(destination, &resolved).map_err(|e| KiscError::io(format!("writing {}", destination.display()), e))?;

    if let Some((user, group, mode)) = permissions {
        if let Some(mode) = mode {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(destination, std::fs::Permissions::from_mode(mode))
                .map_err(|e| KiscError::io(format!("chmod {}", destination.display()), e))?;
        }
        runtime::perms(destination, user, group, None)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeLookup {
        kisc: ConfigMap,
        resources: std::collections::HashMap<String, ConfigMap>,
    }

    impl VariableLookup for FakeLookup {
        fn kisc(&self) -> &ConfigMap {
            &self.kisc
        }

        fn resource(&self, id: &str) -> Option<&ConfigMap> {
            self.resources.get(id)
        }
    }

    fn lookup_with(id: &str, key: &str, value: &str) -> FakeLookup {
        let mut config = ConfigMap::new();
        config.insert(key, value);
        let mut resources = std::collections::HashMap::new();
        resources.insert(id.to_string(), config);
        FakeLookup { kisc: ConfigMap::new(), resources }
    }

    #[test]
    fn resolves_a_plain_setting_reference() {
        let lookup = lookup_with("db1", "host", "10.0.0.1");
        let resolved = resolve_string("connect to %{db1.host}", &lookup, None, None).unwrap();
        assert_eq!(resolved, "connect to 10.0.0.1");
    }

    #[test]
    fn applies_a_filter_chain() {
        let lookup = lookup_with("db1", "host", "  DB.EXAMPLE.COM  ");
        let resolved = resolve_string("%{db1.host|strip|lower}", &lookup, None, None).unwrap();
        assert_eq!(resolved, "db.example.com");
    }

    #[test]
    fn applies_arithmetic_filters() {
        let lookup = lookup_with("vm1", "memory", "512");
        let resolved = resolve_string("%{vm1.memory|int|add(256)}", &lookup, None, None).unwrap();
        assert_eq!(resolved, "768");
    }

    #[test]
    fn resolves_consumes_special_form() {
        let mut config = ConfigMap::new();
        config.insert("CONSUMES", "gpu:2");
        let mut resources = std::collections::HashMap::new();
        resources.insert("job1".to_string(), config);
        let lookup = FakeLookup { kisc: ConfigMap::new(), resources };
        let resolved = resolve_string("%{job1.CONSUMES(gpu)}", &lookup, None, None).unwrap();
        assert_eq!(resolved, "2");
    }

    #[test]
    fn unknown_resource_is_an_error() {
        let lookup = FakeLookup {
            kisc: ConfigMap::new(),
            resources: std::collections::HashMap::new(),
        };
        assert!(resolve_string("%{missing.setting}", &lookup, None, None).is_err());
    }

    #[test]
    fn each_distinct_variable_is_substituted_at_every_occurrence() {
        let lookup = lookup_with("db1", "host", "10.0.0.1");
        let resolved = resolve_string("%{db1.host} == %{db1.host}", &lookup, None, None).unwrap();
        assert_eq!(resolved, "10.0.0.1 == 10.0.0.1");
    }
}
