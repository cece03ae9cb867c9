use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::registry::{Registry, RegistryError};

const HEADER: &str = "# Managed by ananke. Changes are overwritten whenever a course is added or removed.\nimport json\n";
const OPEN: &str = " = json.loads(r'''";
const CLOSE: &str = "''')";
const FOOTER: &str = "c.JupyterHub.services.extend(services)\n\
c.JupyterHub.load_roles.extend(roles)\n\
c.JupyterHub.load_groups.update(groups)\n";

/// Renders the registry as the hub configuration fragment.
///
/// Payloads sit inside Python raw triple-quoted strings, so every `'` is
/// written as the JSON escape `\u0027` and a payload can never close the
/// string early.
pub fn encode(registry: &Registry) -> Result<String, RegistryError> {
    let mut out = String::from(HEADER);
    out.push('\n');
    push_section(&mut out, "services", &registry.services)?;
    push_section(&mut out, "roles", &registry.roles)?;
    push_section(&mut out, "groups", &registry.groups)?;
    out.push('\n');
    out.push_str(FOOTER);
    Ok(out)
}

fn push_section<T: Serialize>(
    out: &mut String,
    name: &'static str,
    value: &T,
) -> Result<(), RegistryError> {
    let json = serde_json::to_string_pretty(value).map_err(|err| {
        RegistryError::Malformed {
            section: name,
            reason: err.to_string(),
        }
    })?;
    out.push_str(name);
    out.push_str(OPEN);
    out.push_str(&json.replace('\'', "\\u0027"));
    out.push_str(CLOSE);
    out.push('\n');
    Ok(())
}

/// Parses a fragment produced by [`encode`]. Nothing is evaluated.
///
/// Blank input decodes to an empty registry.
pub fn decode(source: &str) -> Result<Registry, RegistryError> {
    if source.trim().is_empty() {
        return Ok(Registry::default());
    }
    Ok(Registry {
        services: section(source, "services")?,
        roles: section(source, "roles")?,
        groups: section::<BTreeMap<String, Vec<String>>>(source, "groups")?,
    })
}

fn section<T: DeserializeOwned>(
    source: &str,
    name: &'static str,
) -> Result<T, RegistryError> {
    let marker = format!("{name}{OPEN}");
    let start = source
        .match_indices(&marker)
        .map(|(at, _)| at)
        .find(|&at| at == 0 || source[..at].ends_with('\n'))
        .map(|at| at + marker.len())
        .ok_or_else(|| RegistryError::Malformed {
            section: name,
            reason: "assignment not found".into(),
        })?;

    let len = source[start..].find(CLOSE).ok_or_else(|| {
        RegistryError::Malformed {
            section: name,
            reason: "unterminated payload".into(),
        }
    })?;

    serde_json::from_str(&source[start..start + len]).map_err(|err| {
        RegistryError::Malformed {
            section: name,
            reason: err.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::CourseIdentity;
    use crate::registry::{ServiceSettings, generate_api_token};
    use std::path::Path;

    fn populated() -> Registry {
        let identity = CourseIdentity {
            course_id: "c-0011223344556677".into(),
            course_title: "Intro (c-0011223344556677)".into(),
            course_title_short: "Intro".into(),
            grader_account_id: "c-0011223344556677".into(),
        };
        let mut registry = Registry::default();
        registry
            .register_course(
                &identity,
                Path::new("/home/c-0011223344556677"),
                &ServiceSettings::default(),
                generate_api_token(),
            )
            .unwrap();
        registry.add_group_member("formgrade-c-0011223344556677", "o'neil");
        registry
    }

    #[test]
    fn decode_reads_back_what_encode_wrote() {
        let registry = populated();
        let text = encode(&registry).unwrap();
        assert_eq!(decode(&text).unwrap(), registry);
    }

    #[test]
    fn quotes_never_reach_the_python_source() {
        let text = encode(&populated()).unwrap();
        assert!(!text.contains("o'neil"));
        assert!(text.contains("o\\u0027neil"));
        assert_eq!(text.matches("'''").count(), 6);
    }

    #[test]
    fn fragment_wires_sections_into_the_hub() {
        let text = encode(&Registry::default()).unwrap();
        assert!(text.contains("import json"));
        assert!(text.contains("services = json.loads(r'''[]''')"));
        assert!(text.contains("groups = json.loads(r'''{}''')"));
        assert!(text.ends_with("c.JupyterHub.load_groups.update(groups)\n"));
    }

    #[test]
    fn blank_source_is_an_empty_registry() {
        assert_eq!(decode("").unwrap(), Registry::default());
        assert_eq!(decode("\n  \n").unwrap(), Registry::default());
    }

    #[test]
    fn truncated_source_is_malformed() {
        let text = encode(&populated()).unwrap();
        let cut = &text[..text.len() / 2];
        assert!(matches!(
            decode(cut),
            Err(RegistryError::Malformed { .. })
        ));
    }
}
