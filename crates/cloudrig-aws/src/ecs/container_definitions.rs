//! ECS container definitions
//!
//! Container definitions are declared as a JSON document (the same shape the
//! ECS API and console use) and stored in state as a normalised JSON string.
//! Normalisation drops empty collections, sorts `environment` by name and
//! removes a zero `cpu`, so a definition read back from the API compares
//! equal to the one that was registered.

use crate::awserr::build_error;
use aws_sdk_ecs::types::{
    ContainerDefinition as SdkContainerDefinition, Device, DeviceCgroupPermission, HostEntry,
    KernelCapabilities, KeyValuePair, LinuxParameters as SdkLinuxParameters,
    LogConfiguration as SdkLogConfiguration, LogDriver, MountPoint as SdkMountPoint,
    PortMapping as SdkPortMapping, ResourceRequirement as SdkResourceRequirement, ResourceType,
    TransportProtocol, Ulimit as SdkUlimit, UlimitName, VolumeFrom as SdkVolumeFrom,
};
use cloudrig_core::{CloudError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContainerDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_reservation: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essential: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Vec<EnvironmentVariable>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_mappings: Option<Vec<PortMapping>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_points: Option<Vec<MountPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes_from: Option<Vec<VolumeFrom>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_hosts: Option<Vec<ExtraHost>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ulimits: Option<Vec<Ulimit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_security_options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly_root_filesystem: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_configuration: Option<LogConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_parameters: Option<LinuxParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_requirements: Option<Vec<ResourceRequirement>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentVariable {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PortMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MountPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VolumeFrom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtraHost {
    pub hostname: String,
    pub ip_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Ulimit {
    pub name: String,
    pub soft_limit: i32,
    pub hard_limit: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LogConfiguration {
    pub log_driver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinuxParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<DeviceMapping>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Capabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeviceMapping {
    pub host_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceRequirement {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Check that `definitions` is a JSON array of container objects whose
/// `command` and `entryPoint`, when present, are arrays of strings.
pub fn validate(definitions: &str) -> Result<()> {
    let value: Value = serde_json::from_str(definitions).map_err(|e| {
        CloudError::InvalidConfig(format!("container_definitions is not valid JSON: {e}"))
    })?;

    let items = value.as_array().ok_or_else(|| {
        CloudError::InvalidConfig("container_definitions must be a JSON array".to_string())
    })?;

    for (i, item) in items.iter().enumerate() {
        let object = item.as_object().ok_or_else(|| {
            CloudError::InvalidConfig(format!("container_definitions[{i}] must be a JSON object"))
        })?;
        for field in ["command", "entryPoint"] {
            match object.get(field) {
                None | Some(Value::Null) => {}
                Some(Value::Array(args)) if args.iter().all(Value::is_string) => {}
                Some(_) => {
                    return Err(CloudError::InvalidConfig(format!(
                        "container_definitions[{i}].{field} must be an array of strings"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Validate and parse a container definitions document.
pub fn parse(definitions: &str) -> Result<Vec<ContainerDefinition>> {
    validate(definitions)?;
    let parsed: Vec<ContainerDefinition> = serde_json::from_str(definitions)
        .map_err(|e| CloudError::InvalidConfig(format!("container_definitions: {e}")))?;
    Ok(parsed.into_iter().map(ContainerDefinition::normalized).collect())
}

/// The canonical JSON string for a set of definitions.
pub fn to_json_string(definitions: &[ContainerDefinition]) -> Result<String> {
    Ok(serde_json::to_string(definitions)?)
}

/// Parse, then re-serialise in canonical form.
pub fn normalize(definitions: &str) -> Result<String> {
    to_json_string(&parse(definitions)?)
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}

fn strings(items: &[String]) -> Option<Vec<String>> {
    non_empty(items.to_vec())
}

impl ContainerDefinition {
    fn normalized(mut self) -> Self {
        if self.cpu == Some(0) {
            self.cpu = None;
        }
        if let Some(env) = self.environment.as_mut() {
            env.sort_by(|a, b| a.name.cmp(&b.name));
        }
        self.environment = self.environment.and_then(non_empty);
        self.command = self.command.and_then(non_empty);
        self.entry_point = self.entry_point.and_then(non_empty);
        self.links = self.links.and_then(non_empty);
        self.port_mappings = self.port_mappings.and_then(non_empty);
        self.mount_points = self.mount_points.and_then(non_empty);
        self.volumes_from = self.volumes_from.and_then(non_empty);
        self.extra_hosts = self.extra_hosts.and_then(non_empty);
        self.ulimits = self.ulimits.and_then(non_empty);
        self.docker_security_options = self.docker_security_options.and_then(non_empty);
        self.resource_requirements = self.resource_requirements.and_then(non_empty);
        self.docker_labels = self.docker_labels.filter(|l| !l.is_empty());
        self
    }

    /// Build the SDK request shape.
    pub fn to_sdk(&self) -> Result<SdkContainerDefinition> {
        let environment = self.environment.as_ref().map(|env| {
            env.iter()
                .map(|e| KeyValuePair::builder().name(&e.name).value(&e.value).build())
                .collect()
        });

        let port_mappings = self.port_mappings.as_ref().map(|ports| {
            ports
                .iter()
                .map(|p| {
                    SdkPortMapping::builder()
                        .set_container_port(p.container_port)
                        .set_host_port(p.host_port)
                        .set_protocol(p.protocol.as_deref().map(TransportProtocol::from))
                        .build()
                })
                .collect()
        });

        let mount_points = self.mount_points.as_ref().map(|mounts| {
            mounts
                .iter()
                .map(|m| {
                    SdkMountPoint::builder()
                        .set_source_volume(m.source_volume.clone())
                        .set_container_path(m.container_path.clone())
                        .set_read_only(m.read_only)
                        .build()
                })
                .collect()
        });

        let volumes_from = self.volumes_from.as_ref().map(|volumes| {
            volumes
                .iter()
                .map(|v| {
                    SdkVolumeFrom::builder()
                        .set_source_container(v.source_container.clone())
                        .set_read_only(v.read_only)
                        .build()
                })
                .collect()
        });

        let extra_hosts = self
            .extra_hosts
            .as_ref()
            .map(|hosts| {
                hosts
                    .iter()
                    .map(|h| {
                        HostEntry::builder()
                            .hostname(&h.hostname)
                            .ip_address(&h.ip_address)
                            .build()
                            .map_err(build_error)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let ulimits = self
            .ulimits
            .as_ref()
            .map(|limits| {
                limits
                    .iter()
                    .map(|u| {
                        SdkUlimit::builder()
                            .name(UlimitName::from(u.name.as_str()))
                            .soft_limit(u.soft_limit)
                            .hard_limit(u.hard_limit)
                            .build()
                            .map_err(build_error)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let log_configuration = self
            .log_configuration
            .as_ref()
            .map(|l| {
                SdkLogConfiguration::builder()
                    .log_driver(LogDriver::from(l.log_driver.as_str()))
                    .set_options(l.options.clone().map(|o| o.into_iter().collect()))
                    .build()
                    .map_err(build_error)
            })
            .transpose()?;

        let linux_parameters = self
            .linux_parameters
            .as_ref()
            .map(LinuxParameters::to_sdk)
            .transpose()?;

        let resource_requirements = self
            .resource_requirements
            .as_ref()
            .map(|reqs| {
                reqs.iter()
                    .map(|r| {
                        SdkResourceRequirement::builder()
                            .r#type(ResourceType::from(r.kind.as_str()))
                            .value(&r.value)
                            .build()
                            .map_err(build_error)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        Ok(SdkContainerDefinition::builder()
            .set_name(self.name.clone())
            .set_image(self.image.clone())
            .set_cpu(self.cpu)
            .set_memory(self.memory)
            .set_memory_reservation(self.memory_reservation)
            .set_essential(self.essential)
            .set_command(self.command.clone())
            .set_entry_point(self.entry_point.clone())
            .set_environment(environment)
            .set_links(self.links.clone())
            .set_port_mappings(port_mappings)
            .set_mount_points(mount_points)
            .set_volumes_from(volumes_from)
            .set_extra_hosts(extra_hosts)
            .set_ulimits(ulimits)
            .set_docker_security_options(self.docker_security_options.clone())
            .set_working_directory(self.working_directory.clone())
            .set_user(self.user.clone())
            .set_hostname(self.hostname.clone())
            .set_privileged(self.privileged)
            .set_readonly_root_filesystem(self.readonly_root_filesystem)
            .set_log_configuration(log_configuration)
            .set_docker_labels(self.docker_labels.clone().map(|l| l.into_iter().collect()))
            .set_linux_parameters(linux_parameters)
            .set_resource_requirements(resource_requirements)
            .build())
    }

    /// Convert a definition returned by the API.
    pub fn from_sdk(def: &SdkContainerDefinition) -> Self {
        Self {
            name: def.name().map(str::to_string),
            image: def.image().map(str::to_string),
            cpu: Some(def.cpu()),
            memory: def.memory(),
            memory_reservation: def.memory_reservation(),
            essential: def.essential(),
            command: strings(def.command()),
            entry_point: strings(def.entry_point()),
            environment: non_empty(
                def.environment()
                    .iter()
                    .map(|e| EnvironmentVariable {
                        name: e.name().unwrap_or_default().to_string(),
                        value: e.value().unwrap_or_default().to_string(),
                    })
                    .collect(),
            ),
            links: strings(def.links()),
            port_mappings: non_empty(
                def.port_mappings()
                    .iter()
                    .map(|p| PortMapping {
                        container_port: p.container_port(),
                        host_port: p.host_port(),
                        protocol: p.protocol().map(|t| t.as_str().to_string()),
                    })
                    .collect(),
            ),
            mount_points: non_empty(
                def.mount_points()
                    .iter()
                    .map(|m| MountPoint {
                        source_volume: m.source_volume().map(str::to_string),
                        container_path: m.container_path().map(str::to_string),
                        read_only: m.read_only(),
                    })
                    .collect(),
            ),
            volumes_from: non_empty(
                def.volumes_from()
                    .iter()
                    .map(|v| VolumeFrom {
                        source_container: v.source_container().map(str::to_string),
                        read_only: v.read_only(),
                    })
                    .collect(),
            ),
            extra_hosts: non_empty(
                def.extra_hosts()
                    .iter()
                    .map(|h| ExtraHost {
                        hostname: h.hostname().to_string(),
                        ip_address: h.ip_address().to_string(),
                    })
                    .collect(),
            ),
            ulimits: non_empty(
                def.ulimits()
                    .iter()
                    .map(|u| Ulimit {
                        name: u.name().as_str().to_string(),
                        soft_limit: u.soft_limit(),
                        hard_limit: u.hard_limit(),
                    })
                    .collect(),
            ),
            docker_security_options: strings(def.docker_security_options()),
            working_directory: def.working_directory().map(str::to_string),
            user: def.user().map(str::to_string),
            hostname: def.hostname().map(str::to_string),
            privileged: def.privileged(),
            readonly_root_filesystem: def.readonly_root_filesystem(),
            log_configuration: def.log_configuration().map(|l| LogConfiguration {
                log_driver: l.log_driver().as_str().to_string(),
                options: l.options().map(|o| o.clone().into_iter().collect()),
            }),
            docker_labels: def.docker_labels().map(|l| l.clone().into_iter().collect()),
            linux_parameters: def.linux_parameters().map(LinuxParameters::from_sdk),
            resource_requirements: non_empty(
                def.resource_requirements()
                    .iter()
                    .map(|r| ResourceRequirement {
                        kind: r.r#type().as_str().to_string(),
                        value: r.value().to_string(),
                    })
                    .collect(),
            ),
        }
        .normalized()
    }
}

impl LinuxParameters {
    fn to_sdk(&self) -> Result<SdkLinuxParameters> {
        let capabilities = self.capabilities.as_ref().map(|c| {
            KernelCapabilities::builder()
                .set_add(c.add.clone())
                .set_drop(c.drop.clone())
                .build()
        });

        let devices = self
            .devices
            .as_ref()
            .map(|devices| {
                devices
                    .iter()
                    .map(|d| {
                        Device::builder()
                            .host_path(&d.host_path)
                            .set_container_path(d.container_path.clone())
                            .set_permissions(d.permissions.as_ref().map(|p| {
                                p.iter().map(|s| DeviceCgroupPermission::from(s.as_str())).collect()
                            }))
                            .build()
                            .map_err(build_error)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        Ok(SdkLinuxParameters::builder()
            .set_capabilities(capabilities)
            .set_devices(devices)
            .build())
    }

    fn from_sdk(params: &SdkLinuxParameters) -> Self {
        Self {
            capabilities: params.capabilities().map(|c| Capabilities {
                add: strings(c.add()),
                drop: strings(c.drop()),
            }),
            devices: non_empty(
                params
                    .devices()
                    .iter()
                    .map(|d| DeviceMapping {
                        host_path: d.host_path().to_string(),
                        container_path: d.container_path().map(str::to_string),
                        permissions: non_empty(
                            d.permissions().iter().map(|p| p.as_str().to_string()).collect(),
                        ),
                    })
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"[
      {
        "name": "sleep",
        "image": "busybox",
        "cpu": 10,
        "command": ["sleep", "360"],
        "memory": 10,
        "essential": true
      }
    ]"#;

    #[test]
    fn test_validate_accepts_valid_definitions() {
        assert!(validate(VALID).is_ok());
    }

    #[test]
    fn test_validate_rejects_string_command() {
        let invalid = r#"[{"name": "sleep", "image": "busybox", "command": "sleep 360"}]"#;
        let err = validate(invalid).unwrap_err();
        assert!(err.to_string().contains("command must be an array of strings"));

        let invalid = r#"[{"name": "sleep", "entryPoint": ["/bin/sh", 1]}]"#;
        assert!(validate(invalid).unwrap_err().to_string().contains("entryPoint"));
    }

    #[test]
    fn test_validate_rejects_non_arrays() {
        assert!(validate(r#"{"name": "x"}"#).is_err());
        assert!(validate(r#"["x"]"#).is_err());
        assert!(validate("not json").is_err());
    }

    #[test]
    fn test_normalize_sorts_environment_and_drops_empty() {
        let raw = r#"[{
            "name": "web",
            "image": "nginx",
            "cpu": 0,
            "links": [],
            "environment": [
                {"name": "VARNAME2", "value": "VARVAL2"},
                {"name": "VARNAME1", "value": "VARVAL1"}
            ]
        }]"#;
        let defs = parse(raw).unwrap();
        let env = defs[0].environment.as_ref().unwrap();
        assert_eq!(env[0].name, "VARNAME1");
        assert_eq!(env[1].name, "VARNAME2");
        assert!(defs[0].links.is_none());
        assert!(defs[0].cpu.is_none());

        let normalized = normalize(raw).unwrap();
        assert!(!normalized.contains("links"));
        assert_eq!(normalize(&normalized).unwrap(), normalized);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let raw = r#"[{"name": "web", "image": "nginx", "notAField": 1}]"#;
        assert!(matches!(parse(raw), Err(CloudError::InvalidConfig(_))));
    }

    #[test]
    fn test_sdk_conversion_keeps_arrays() {
        let raw = r#"[{
            "name": "wordpress",
            "image": "wordpress",
            "essential": true,
            "memory": 500,
            "cpu": 10,
            "links": ["container1", "container2"],
            "portMappings": [{"containerPort": 80}, {"containerPort": 81, "protocol": "udp"}],
            "extraHosts": [{"hostname": "host1", "ipAddress": "127.0.0.1"}],
            "ulimits": [{"name": "core", "softLimit": 10, "hardLimit": 20}],
            "linuxParameters": {
                "capabilities": {"add": ["AUDIT_CONTROL"], "drop": ["CHOWN", "KILL"]},
                "devices": [{"hostPath": "/path1", "permissions": ["read", "write"]}]
            },
            "logConfiguration": {
                "logDriver": "awslogs",
                "options": {"awslogs-region": "us-west-2"}
            },
            "dockerSecurityOptions": ["label:one"]
        }]"#;
        let defs = parse(raw).unwrap();
        let sdk = defs[0].to_sdk().unwrap();

        assert_eq!(sdk.name(), Some("wordpress"));
        assert_eq!(sdk.links().len(), 2);
        assert_eq!(sdk.port_mappings().len(), 2);
        assert_eq!(sdk.port_mappings()[1].protocol(), Some(&TransportProtocol::Udp));
        assert_eq!(sdk.extra_hosts()[0].hostname(), "host1");
        assert_eq!(sdk.ulimits()[0].hard_limit(), 20);

        let back = ContainerDefinition::from_sdk(&sdk);
        assert_eq!(back, defs[0]);
    }
}
