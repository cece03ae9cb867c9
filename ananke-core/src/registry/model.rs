use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::course::CourseIdentity;
use crate::registry::RegistryError;

/// Role shared by every course service.
pub const SHARED_SERVICE_ROLE: &str = "formgrader-service-role";

const SHARED_SERVICE_SCOPES: [&str; 6] = [
    "read:users:groups",
    "list:services",
    "list:users",
    "groups",
    "admin:users",
    "admin:groups",
];

const SERVICE_COMMAND: [&str; 1] = ["jupyterhub-singleuser"];
const KORE_SERVICE: &str = "kore";

/// One hub service entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Service name; the course id for course services.
    pub name: String,
    /// Where the hub proxies the service to.
    pub url: String,
    /// Command the hub spawns for a managed service.
    #[serde(default)]
    pub command: Vec<String>,
    /// Account the service runs as.
    #[serde(default)]
    pub user: String,
    /// Working directory of the spawned service.
    #[serde(default)]
    pub cwd: String,
    /// Token the service authenticates to the hub with.
    #[serde(default)]
    pub api_token: String,
    /// Remaining hub service options (`oauth_no_confirm`, `display`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServiceRecord {
    /// Port of `url`, explicit or implied by its scheme.
    pub fn port(&self) -> Option<u16> {
        Url::parse(&self.url).ok()?.port_or_known_default()
    }
}

/// One hub role entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    /// Role name.
    pub name: String,
    /// Granted hub scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Services holding the role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    /// Groups holding the role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// Users holding the role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    /// Remaining role options, kept as read.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RoleRecord {
    fn new(name: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            scopes,
            services: Vec::new(),
            groups: Vec::new(),
            users: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// Where new course services listen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Interface course services bind to.
    pub host: String,
    /// Lowest port handed to a course service.
    pub base_port: u16,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            base_port: 8100,
        }
    }
}

/// Services, roles and groups the hub loads from the registry file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    /// `c.JupyterHub.services`.
    pub services: Vec<ServiceRecord>,
    /// `c.JupyterHub.load_roles`.
    pub roles: Vec<RoleRecord>,
    /// `c.JupyterHub.load_groups`, group name to members.
    pub groups: BTreeMap<String, Vec<String>>,
}

impl Registry {
    /// Service entry by name.
    pub fn service(&self, name: &str) -> Option<&ServiceRecord> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Role entry by name.
    pub fn role(&self, name: &str) -> Option<&RoleRecord> {
        self.roles.iter().find(|r| r.name == name)
    }

    /// Members of a group, if it exists.
    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    /// True when `user` is listed in `group`.
    pub fn is_member(&self, group: &str, user: &str) -> bool {
        self.group(group)
            .is_some_and(|members| members.iter().any(|m| m == user))
    }

    /// Next free port: one above the highest port in use, or `base`.
    pub fn next_port(&self, base: u16) -> Result<u16, RegistryError> {
        match self.services.iter().filter_map(ServiceRecord::port).max() {
            None => Ok(base),
            Some(max) => max.checked_add(1).ok_or_else(|| {
                RegistryError::Invariant("service port range exhausted".into())
            }),
        }
    }

    /// Adds the service, roles and groups of a new course.
    ///
    /// Returns `false` without touching anything when a service named after
    /// the course already exists.
    pub fn register_course(
        &mut self,
        identity: &CourseIdentity,
        grader_home: &Path,
        settings: &ServiceSettings,
        api_token: String,
    ) -> Result<bool, RegistryError> {
        let course_id = identity.course_id.as_str();
        if self.service(course_id).is_some() {
            return Ok(false);
        }

        let port = self.next_port(settings.base_port)?;
        let mut command: Vec<String> =
            SERVICE_COMMAND.iter().map(|s| s.to_string()).collect();
        command.push(format!("--group={}", identity.formgrade_group()));
        command.push("--KernelSpecManager.ensure_native_kernel=False".into());

        let mut extra = Map::new();
        extra.insert("oauth_no_confirm".into(), Value::Bool(true));
        extra.insert("display".into(), Value::Bool(false));

        self.services.push(ServiceRecord {
            name: course_id.to_string(),
            url: format!("http://{}:{port}", settings.host),
            command,
            user: identity.grader_account_id.clone(),
            cwd: grader_home.display().to_string(),
            api_token,
            extra,
        });

        match self.roles.iter_mut().find(|r| r.name == SHARED_SERVICE_ROLE) {
            Some(role) => {
                push_unique(&mut role.services, course_id);
            }
            None => {
                let mut role = RoleRecord::new(
                    SHARED_SERVICE_ROLE,
                    SHARED_SERVICE_SCOPES.iter().map(|s| s.to_string()).collect(),
                );
                role.services.push(course_id.to_string());
                self.roles.push(role);
            }
        }

        let course_role = identity.course_role();
        if self.role(&course_role).is_none() {
            let mut role = RoleRecord::new(
                course_role,
                vec![
                    format!("access:services!service={course_id}"),
                    format!("list:services!service={course_id}"),
                    format!("read:services!service={course_id}"),
                    format!("access:services!service={KORE_SERVICE}"),
                ],
            );
            role.groups.push(identity.formgrade_group());
            self.roles.push(role);
        }

        for group in [identity.formgrade_group(), identity.nbgrader_group()] {
            self.add_group_member(&group, &identity.grader_account_id);
        }

        Ok(true)
    }

    /// Returns `true` when the membership was added.
    pub fn add_group_member(&mut self, group: &str, user: &str) -> bool {
        push_unique(self.groups.entry(group.to_string()).or_default(), user)
    }

    /// Drops every registry entry that belongs to `course_id`.
    pub fn remove_course(&mut self, identity: &CourseIdentity) -> bool {
        let course_id = identity.course_id.as_str();
        let course_role = identity.course_role();
        let before = (self.services.len(), self.roles.len(), self.groups.len());

        self.services.retain(|s| s.name != course_id);
        self.roles.retain(|r| r.name != course_role);

        let mut shared_changed = false;
        if let Some(role) =
            self.roles.iter_mut().find(|r| r.name == SHARED_SERVICE_ROLE)
        {
            let len = role.services.len();
            role.services.retain(|s| s != course_id);
            shared_changed = role.services.len() != len;
        }

        self.groups.remove(&identity.formgrade_group());
        self.groups.remove(&identity.nbgrader_group());

        shared_changed
            || before != (self.services.len(), self.roles.len(), self.groups.len())
    }

    /// Checks name and port uniqueness and role service references.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut names = HashSet::new();
        let mut ports = HashSet::new();
        for service in &self.services {
            if !names.insert(service.name.as_str()) {
                return Err(RegistryError::Invariant(format!(
                    "duplicate service `{}`",
                    service.name
                )));
            }
            if let Some(port) = service.port()
                && !ports.insert(port)
            {
                return Err(RegistryError::Invariant(format!(
                    "port {port} used by more than one service"
                )));
            }
        }

        let mut roles = HashSet::new();
        for role in &self.roles {
            if !roles.insert(role.name.as_str()) {
                return Err(RegistryError::Invariant(format!(
                    "duplicate role `{}`",
                    role.name
                )));
            }
            if let Some(missing) =
                role.services.iter().find(|s| !names.contains(s.as_str()))
            {
                return Err(RegistryError::Invariant(format!(
                    "role `{}` references unknown service `{missing}`",
                    role.name
                )));
            }
        }
        Ok(())
    }
}

/// Random 32-byte hex token for a new course service.
pub fn generate_api_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|v| v == value) {
        false
    } else {
        list.push(value.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> CourseIdentity {
        CourseIdentity {
            course_id: id.into(),
            course_title: format!("T ({id})"),
            course_title_short: "T".into(),
            grader_account_id: id.into(),
        }
    }

    fn service(name: &str, port: u16) -> ServiceRecord {
        ServiceRecord {
            name: name.into(),
            url: format!("http://127.0.0.1:{port}"),
            command: vec![],
            user: name.into(),
            cwd: format!("/home/{name}"),
            api_token: "t".into(),
            extra: Map::new(),
        }
    }

    fn register(registry: &mut Registry, id: &str) -> bool {
        registry
            .register_course(
                &identity(id),
                Path::new(&format!("/home/{id}")),
                &ServiceSettings::default(),
                generate_api_token(),
            )
            .unwrap()
    }

    #[test]
    fn next_port_is_one_above_highest() {
        let registry = Registry {
            services: vec![
                service("a", 8100),
                service("b", 8105),
                service("c", 8101),
            ],
            ..Registry::default()
        };
        assert_eq!(registry.next_port(8100).unwrap(), 8106);
        assert_eq!(Registry::default().next_port(8100).unwrap(), 8100);
    }

    #[test]
    fn register_course_builds_service_roles_and_groups() {
        let mut registry = Registry::default();
        assert!(register(&mut registry, "c-1"));

        let service = registry.service("c-1").unwrap();
        assert_eq!(service.url, "http://127.0.0.1:8100");
        assert_eq!(service.user, "c-1");
        assert_eq!(service.cwd, "/home/c-1");
        assert_eq!(service.api_token.len(), 64);
        assert_eq!(
            service.command,
            vec![
                "jupyterhub-singleuser",
                "--group=formgrade-c-1",
                "--KernelSpecManager.ensure_native_kernel=False"
            ]
        );
        assert_eq!(service.extra["oauth_no_confirm"], Value::Bool(true));
        assert_eq!(service.extra["display"], Value::Bool(false));

        let shared = registry.role(SHARED_SERVICE_ROLE).unwrap();
        assert_eq!(shared.services, vec!["c-1"]);
        assert_eq!(shared.scopes.len(), 6);

        let course_role = registry.role("formgrader-c-1-role").unwrap();
        assert_eq!(course_role.groups, vec!["formgrade-c-1"]);
        assert!(
            course_role
                .scopes
                .contains(&"access:services!service=kore".to_string())
        );

        assert_eq!(registry.group("formgrade-c-1").unwrap(), ["c-1"]);
        assert_eq!(registry.group("nbgrader-c-1").unwrap(), ["c-1"]);
        registry.validate().unwrap();
    }

    #[test]
    fn registering_twice_changes_nothing() {
        let mut registry = Registry::default();
        register(&mut registry, "c-1");
        let snapshot = registry.clone();

        assert!(!register(&mut registry, "c-1"));
        assert_eq!(registry, snapshot);
    }

    #[test]
    fn second_course_extends_shared_role_and_next_port() {
        let mut registry = Registry::default();
        register(&mut registry, "c-1");
        register(&mut registry, "c-2");

        assert_eq!(
            registry.service("c-2").unwrap().url,
            "http://127.0.0.1:8101"
        );
        let shared: Vec<_> = registry
            .roles
            .iter()
            .filter(|r| r.name == SHARED_SERVICE_ROLE)
            .collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].services, vec!["c-1", "c-2"]);
    }

    #[test]
    fn group_members_stay_unique() {
        let mut registry = Registry::default();
        assert!(registry.add_group_member("formgrade-c-1", "alice"));
        assert!(!registry.add_group_member("formgrade-c-1", "alice"));
        assert_eq!(registry.group("formgrade-c-1").unwrap(), ["alice"]);
    }

    #[test]
    fn remove_course_drops_everything_it_owns() {
        let mut registry = Registry::default();
        register(&mut registry, "c-1");
        register(&mut registry, "c-2");

        assert!(registry.remove_course(&identity("c-1")));
        assert!(registry.service("c-1").is_none());
        assert!(registry.role("formgrader-c-1-role").is_none());
        assert!(registry.group("formgrade-c-1").is_none());
        assert!(registry.group("nbgrader-c-1").is_none());
        assert_eq!(
            registry.role(SHARED_SERVICE_ROLE).unwrap().services,
            vec!["c-2"]
        );
        registry.validate().unwrap();

        assert!(!registry.remove_course(&identity("c-1")));
    }

    #[test]
    fn validate_rejects_shared_ports_and_dangling_roles() {
        let duplicate_port = Registry {
            services: vec![service("a", 8100), service("b", 8100)],
            ..Registry::default()
        };
        assert!(duplicate_port.validate().is_err());

        let mut dangling = RoleRecord::new("r", vec![]);
        dangling.services.push("ghost".into());
        let registry = Registry {
            roles: vec![dangling],
            ..Registry::default()
        };
        assert!(registry.validate().is_err());
    }
}
