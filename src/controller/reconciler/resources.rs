//! # Managed Resources
//!
//! Names, labels and object builders for everything a TorrentServer owns.
//!
//! The `apply_*` functions mutate an object in place so they serve both the
//! create and the update path; they only touch the fields the operator
//! manages and leave server-populated fields (cluster IP, defaults) alone.

use super::ReconcilerError;
use crate::constants::{
    CONFIG_MOUNT_PATH, CREDENTIALS_MOUNT_PATH, DEFAULT_ADMIN_USERNAME, MANAGED_BY_SERVER_LABEL,
    OPERATOR_BINARY_PATH, SECRET_PASSWORD_KEY, SECRET_USERNAME_KEY,
};
use crate::crd::{SecretReference, TorrentClientConfigurationSpec, TorrentServer};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, ContainerPort, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Secret, SecretVolumeSource,
    SecurityContext, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

const CONTAINER_NAME: &str = "qbittorrent";
const INIT_CONTAINER_NAME: &str = "config-init";
const PORT_NAME: &str = "webui";
const CONFIG_VOLUME: &str = "config";
const CREDENTIALS_VOLUME: &str = "credentials";

#[must_use]
pub fn labels(server_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/name".to_string(),
            "qbittorrent".to_string(),
        ),
        (
            "app.kubernetes.io/instance".to_string(),
            server_name.to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            "qbittorrent-operator".to_string(),
        ),
    ])
}

/// Explicit `credentialsSecret`, or the generated `<name>-credentials`
#[must_use]
pub fn credentials_secret_name(server: &TorrentServer) -> String {
    server
        .spec
        .credentials_secret
        .as_ref()
        .map(|s| s.name.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("{}-credentials", server.name_any()))
}

#[must_use]
pub fn config_pvc_name(server_name: &str) -> String {
    format!("{server_name}-config")
}

#[must_use]
pub fn client_configuration_name(server_name: &str) -> String {
    format!("{server_name}-client-config")
}

/// In-cluster WebUI URL of the server's Service
#[must_use]
pub fn service_url(server_name: &str, namespace: &str, port: i32) -> String {
    format!("http://{server_name}.{namespace}.svc.cluster.local:{port}")
}

/// Controller owner reference pointing at the TorrentServer
///
/// # Errors
///
/// [`ReconcilerError::OwnerReference`] when the server has no uid yet.
pub fn owner_reference(server: &TorrentServer) -> Result<OwnerReference, ReconcilerError> {
    server
        .controller_owner_ref(&())
        .ok_or_else(|| ReconcilerError::OwnerReference {
            kind: "TorrentServer",
            name: server.name_any(),
        })
}

/// Add `owner` to the object's owner references unless it is already there
pub fn set_controller_reference(meta: &mut ObjectMeta, owner: &OwnerReference) {
    let references = meta.owner_references.get_or_insert_with(Vec::new);
    match references.iter_mut().find(|r| r.uid == owner.uid) {
        Some(existing) => *existing = owner.clone(),
        None => references.push(owner.clone()),
    }
}

fn apply_labels(meta: &mut ObjectMeta, labels: &BTreeMap<String, String>) {
    let current = meta.labels.get_or_insert_with(BTreeMap::new);
    current.extend(labels.clone());
}

/// Empty object carrying only name and namespace
#[must_use]
pub fn named<K>(name: &str, namespace: &str) -> K
where
    K: Resource + Default,
{
    let mut obj = K::default();
    obj.meta_mut().name = Some(name.to_string());
    obj.meta_mut().namespace = Some(namespace.to_string());
    obj
}

/// Generated admin credentials; created once and never regenerated
#[must_use]
pub fn generated_secret(
    server: &TorrentServer,
    namespace: &str,
    owner: &OwnerReference,
    password: &str,
) -> Secret {
    let mut secret: Secret = named(&credentials_secret_name(server), namespace);
    apply_labels(&mut secret.metadata, &labels(&server.name_any()));
    set_controller_reference(&mut secret.metadata, owner);
    secret.type_ = Some("Opaque".to_string());
    secret.data = Some(BTreeMap::from([
        (
            SECRET_USERNAME_KEY.to_string(),
            ByteString(DEFAULT_ADMIN_USERNAME.as_bytes().to_vec()),
        ),
        (
            SECRET_PASSWORD_KEY.to_string(),
            ByteString(password.as_bytes().to_vec()),
        ),
    ]));
    secret
}

/// Labels and owner on every pass; storage settings only when `is_new`
pub fn apply_config_pvc(
    pvc: &mut PersistentVolumeClaim,
    server: &TorrentServer,
    owner: &OwnerReference,
    is_new: bool,
) {
    apply_labels(&mut pvc.metadata, &labels(&server.name_any()));
    set_controller_reference(&mut pvc.metadata, owner);
    if !is_new {
        return;
    }

    let storage = server.spec.config_storage.clone().unwrap_or_default();
    pvc.spec = Some(PersistentVolumeClaimSpec {
        access_modes: Some(storage.access_modes()),
        storage_class_name: storage.storage_class_name.clone(),
        resources: Some(VolumeResourceRequirements {
            requests: Some(BTreeMap::from([(
                "storage".to_string(),
                Quantity(storage.size().to_string()),
            )])),
            ..Default::default()
        }),
        ..Default::default()
    });
}

fn pvc_volume(name: &str, claim_name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim_name.to_string(),
            read_only: None,
        }),
        ..Default::default()
    }
}

fn mount(name: &str, path: &str, read_only: bool) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        read_only: read_only.then_some(true),
        ..Default::default()
    }
}

fn config_init_container(operator_image: &str) -> Container {
    Container {
        name: INIT_CONTAINER_NAME.to_string(),
        image: Some(operator_image.to_string()),
        command: Some(vec![
            OPERATOR_BINARY_PATH.to_string(),
            "config-init".to_string(),
        ]),
        volume_mounts: Some(vec![
            mount(CONFIG_VOLUME, CONFIG_MOUNT_PATH, false),
            mount(CREDENTIALS_VOLUME, CREDENTIALS_MOUNT_PATH, true),
        ]),
        security_context: Some(SecurityContext {
            run_as_user: Some(0),
            allow_privilege_escalation: Some(false),
            capabilities: Some(Capabilities {
                drop: Some(vec!["ALL".to_string()]),
                add: None,
            }),
            read_only_root_filesystem: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Pod spec for the qBittorrent Deployment
///
/// The `config-init` container and its credentials volume are only added
/// when `operator_image` is known.
#[must_use]
pub fn pod_spec(server: &TorrentServer, secret_name: &str, operator_image: Option<&str>) -> PodSpec {
    let name = server.name_any();
    let spec = &server.spec;

    let mut volumes = vec![pvc_volume(CONFIG_VOLUME, &config_pvc_name(&name))];
    let mut volume_mounts = vec![mount(CONFIG_VOLUME, CONFIG_MOUNT_PATH, false)];
    for download in &spec.download_volumes {
        let volume_name = format!("download-{}", download.claim_name);
        volumes.push(pvc_volume(&volume_name, &download.claim_name));
        volume_mounts.push(mount(&volume_name, &download.mount_path, false));
    }

    let init_containers = operator_image.map(|image| {
        volumes.push(Volume {
            name: CREDENTIALS_VOLUME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret_name.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        vec![config_init_container(image)]
    });

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(spec.image().to_string()),
        image_pull_policy: Some("Always".to_string()),
        ports: Some(vec![ContainerPort {
            name: Some(PORT_NAME.to_string()),
            container_port: spec.web_ui_port(),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: (!spec.env.is_empty()).then(|| spec.env.clone()),
        resources: spec.resources.clone(),
        volume_mounts: Some(volume_mounts),
        ..Default::default()
    };

    PodSpec {
        init_containers,
        containers: vec![container],
        volumes: Some(volumes),
        restart_policy: Some("Always".to_string()),
        ..Default::default()
    }
}

pub fn apply_deployment(
    deployment: &mut Deployment,
    server: &TorrentServer,
    owner: &OwnerReference,
    secret_name: &str,
    operator_image: Option<&str>,
) {
    let labels = labels(&server.name_any());
    apply_labels(&mut deployment.metadata, &labels);
    set_controller_reference(&mut deployment.metadata, owner);

    let spec = deployment.spec.get_or_insert_with(DeploymentSpec::default);
    spec.replicas = Some(server.spec.replicas());
    spec.selector = LabelSelector {
        match_labels: Some(labels.clone()),
        ..Default::default()
    };
    spec.template = PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels),
            ..Default::default()
        }),
        spec: Some(pod_spec(server, secret_name, operator_image)),
    };
}

pub fn apply_service(service: &mut Service, server: &TorrentServer, owner: &OwnerReference) {
    let labels = labels(&server.name_any());
    apply_labels(&mut service.metadata, &labels);
    set_controller_reference(&mut service.metadata, owner);

    let port = server.spec.web_ui_port();
    let spec = service.spec.get_or_insert_with(ServiceSpec::default);
    spec.type_ = Some(server.spec.service_type().to_string());
    spec.selector = Some(labels);
    spec.ports = Some(vec![ServicePort {
        name: Some(PORT_NAME.to_string()),
        port,
        target_port: Some(IntOrString::String(PORT_NAME.to_string())),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }]);
}

/// Spec of the configuration generated for a server
#[must_use]
pub fn client_configuration_spec(
    server: &TorrentServer,
    namespace: &str,
    secret_name: &str,
) -> TorrentClientConfigurationSpec {
    TorrentClientConfigurationSpec {
        url: service_url(&server.name_any(), namespace, server.spec.web_ui_port()),
        credentials_secret: SecretReference {
            name: secret_name.to_string(),
        },
        check_interval: None,
    }
}

/// Labels of a generated configuration, including the managed-by marker
#[must_use]
pub fn client_configuration_labels(server_name: &str) -> BTreeMap<String, String> {
    let mut labels = labels(server_name);
    labels.insert(MANAGED_BY_SERVER_LABEL.to_string(), server_name.to_string());
    labels
}

pub fn apply_client_configuration_metadata(
    meta: &mut ObjectMeta,
    server: &TorrentServer,
    owner: &OwnerReference,
) {
    apply_labels(meta, &client_configuration_labels(&server.name_any()));
    set_controller_reference(meta, owner);
}
