//! Spinning model display
//!
//! Loads run on a tokio runtime owned by [`LoadBridge`]; finished results are
//! queued behind a mutex and drained by an `Update` system that reports them
//! to the [`Viewer`]. The displayed entity is tagged with the token of the
//! load it came from, so the scene never holds more than the model the
//! viewer currently considers attached.

use bevy::asset::RenderAssetUsages;
use bevy::mesh::Indices;
use bevy::prelude::*;
use bevy::render::render_resource::PrimitiveTopology;
use bevy::window::PrimaryWindow;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use turntable_core::{
    Completion, LoadError, LoadTicket, MeshData, ModelFormat, ModelLoader, NodeTransform,
    RequestToken, RotatingViewer, SceneNode, ViewerState,
};

/// Plugin for the spinning model slot
pub struct ModelsPlugin;

impl Plugin for ModelsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                apply_props,
                retry_on_keypress,
                collect_finished_loads,
                sync_model_entity,
                spin_model,
                update_model_visibility,
                update_window_title,
            )
                .chain(),
        );
    }
}

/// Viewer state machine
#[derive(Resource, Debug, Deref, DerefMut)]
pub struct Viewer(pub RotatingViewer);

/// Inputs of the viewer; change this resource to switch models or hide the view
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct ViewerProps {
    pub url: String,
    pub format: ModelFormat,
    pub visible: bool,
}

type FinishedLoad = (RequestToken, Result<SceneNode, LoadError>);

/// Runs model loads off the render thread
#[derive(Resource)]
pub struct LoadBridge {
    runtime: tokio::runtime::Runtime,
    loader: ModelLoader,
    finished: Arc<Mutex<Vec<FinishedLoad>>>,
}

impl LoadBridge {
    pub fn new(loader: ModelLoader) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("turntable-load")
            .enable_all()
            .build()?;

        Ok(Self {
            runtime,
            loader,
            finished: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Run a ticket in the background; the result shows up in [`LoadBridge::drain`]
    pub fn spawn(&self, ticket: LoadTicket) {
        let loader = self.loader.clone();
        let LoadTicket { token, target } = ticket;
        self.spawn_load(token, async move { loader.load(&target.url, target.format).await });
    }

    /// Every spawned load reports exactly once, even if its task panics
    fn spawn_load<F>(&self, token: RequestToken, load: F)
    where
        F: Future<Output = Result<SceneNode, LoadError>> + Send + 'static,
    {
        let finished = self.finished.clone();
        let task = self.runtime.spawn(load);

        self.runtime.spawn(async move {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(token = token.value(), error = %e, "Load task aborted");
                    Err(LoadError::Aborted(e.to_string()))
                }
            };
            lock_queue(&finished).push((token, result));
        });
    }

    /// Take every load finished since the last call
    pub fn drain(&self) -> Vec<FinishedLoad> {
        match self.finished.try_lock() {
            Ok(mut finished) => std::mem::take(&mut *finished),
            Err(TryLockError::Poisoned(poisoned)) => {
                tracing::warn!("Load queue poisoned, recovering");
                self.finished.clear_poison();
                std::mem::take(&mut *poisoned.into_inner())
            }
            Err(TryLockError::WouldBlock) => Vec::new(),
        }
    }
}

fn lock_queue(queue: &Mutex<Vec<FinishedLoad>>) -> MutexGuard<'_, Vec<FinishedLoad>> {
    queue.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Load queue poisoned, recovering");
        queue.clear_poison();
        poisoned.into_inner()
    })
}

/// Root entity of the displayed model
#[derive(Component, Debug, Clone, Copy)]
pub struct ModelRoot {
    /// Load this model came from
    pub token: RequestToken,
}

fn apply_props(props: Res<ViewerProps>, mut viewer: ResMut<Viewer>, bridge: Res<LoadBridge>) {
    if !props.is_changed() {
        return;
    }

    // Visibility first so a target set while hidden waits instead of loading
    if let Some(ticket) = viewer.set_visible(props.visible) {
        bridge.spawn(ticket);
    }
    if let Some(ticket) = viewer.set_target(props.url.clone(), props.format) {
        bridge.spawn(ticket);
    }
}

fn retry_on_keypress(
    keys: Res<ButtonInput<KeyCode>>,
    mut viewer: ResMut<Viewer>,
    bridge: Res<LoadBridge>,
) {
    if !keys.just_pressed(KeyCode::KeyR) {
        return;
    }
    if let Some(ticket) = viewer.retry() {
        tracing::info!(token = ticket.token.value(), url = %ticket.target.url, "Retrying load");
        bridge.spawn(ticket);
    }
}

fn collect_finished_loads(bridge: Res<LoadBridge>, mut viewer: ResMut<Viewer>) {
    for (token, result) in bridge.drain() {
        match viewer.complete(token, result) {
            Completion::Attached => tracing::debug!(token = token.value(), "Model attached"),
            Completion::Failed => {
                if let Some(e) = viewer.error() {
                    tracing::error!(token = token.value(), error = %e, "Model failed to load, press R to retry");
                }
            }
            Completion::Stale => tracing::debug!(token = token.value(), "Dropped superseded load"),
        }
    }
}

fn sync_model_entity(
    mut commands: Commands,
    viewer: Res<Viewer>,
    roots: Query<(Entity, &ModelRoot)>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if !viewer.is_changed() {
        return;
    }

    let current = viewer.current_token();
    let mut attached = false;
    for (entity, root) in &roots {
        if Some(root.token) == current {
            attached = true;
        } else {
            commands.entity(entity).despawn();
        }
    }

    if attached {
        return;
    }
    let (Some(token), Some(model)) = (current, viewer.current_model()) else {
        return;
    };

    let material = materials.add(StandardMaterial::default());
    let root = commands
        .spawn((
            ModelRoot { token },
            Name::new(format!("Model {}", token.value())),
            Transform::from_rotation(to_bevy_quat(viewer.orientation().to_quat())),
            Visibility::default(),
        ))
        .id();
    spawn_node(&mut commands, root, model, &mut meshes, &material);

    tracing::info!(
        token = token.value(),
        name = %model.name,
        meshes = model.mesh_count(),
        "Spawned model"
    );
}

fn spawn_node(
    commands: &mut Commands,
    parent: Entity,
    node: &SceneNode,
    meshes: &mut Assets<Mesh>,
    material: &Handle<StandardMaterial>,
) {
    let entity = commands
        .spawn((
            Name::new(node.name.clone()),
            to_bevy_transform(&node.transform),
            Visibility::default(),
        ))
        .id();
    commands.entity(parent).add_child(entity);

    for mesh in &node.meshes {
        let mesh_entity = commands
            .spawn((
                Mesh3d(meshes.add(to_bevy_mesh(mesh))),
                MeshMaterial3d(material.clone()),
                Transform::IDENTITY,
            ))
            .id();
        commands.entity(entity).add_child(mesh_entity);
    }

    for child in &node.children {
        spawn_node(commands, entity, child, meshes, material);
    }
}

fn spin_model(mut viewer: ResMut<Viewer>, mut roots: Query<&mut Transform, With<ModelRoot>>) {
    if !viewer.advance_frame() {
        return;
    }

    let rotation = to_bevy_quat(viewer.orientation().to_quat());
    for mut transform in &mut roots {
        transform.rotation = rotation;
    }
}

fn update_model_visibility(
    props: Res<ViewerProps>,
    mut roots: Query<&mut Visibility, With<ModelRoot>>,
) {
    let wanted = if props.visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };
    for mut visibility in &mut roots {
        if *visibility != wanted {
            *visibility = wanted;
        }
    }
}

fn update_window_title(viewer: Res<Viewer>, mut windows: Query<&mut Window, With<PrimaryWindow>>) {
    if !viewer.is_changed() {
        return;
    }
    let Ok(mut window) = windows.single_mut() else {
        return;
    };

    let title = window_title(&viewer);
    if window.title != title {
        window.title = title;
    }
}

fn window_title(viewer: &RotatingViewer) -> String {
    let Some(target) = viewer.target() else {
        return "Turntable".to_string();
    };
    let status = match viewer.state() {
        ViewerState::Idle if !viewer.is_visible() => "hidden",
        ViewerState::Idle => "idle",
        ViewerState::Loading { .. } => "loading",
        ViewerState::Ready { .. } => "ready",
        ViewerState::Failed { .. } => "failed, press R to retry",
    };
    format!("Turntable - {} ({}, {})", target.url, target.format, status)
}

fn to_bevy_quat(rotation: turntable_core::glam::Quat) -> Quat {
    Quat::from_array(rotation.to_array())
}

fn to_bevy_transform(transform: &NodeTransform) -> Transform {
    Transform {
        translation: Vec3::from_array(transform.translation.to_array()),
        rotation: to_bevy_quat(transform.rotation),
        scale: Vec3::from_array(transform.scale.to_array()),
    }
}

/// Build a triangle-list mesh, computing normals when the source has none
pub fn to_bevy_mesh(data: &MeshData) -> Mesh {
    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, data.positions.clone());

    if let Some(indices) = &data.indices {
        mesh.insert_indices(Indices::U32(indices.clone()));
    }

    match &data.normals {
        Some(normals) => mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals.clone()),
        None => mesh.compute_normals(),
    }

    mesh
}
