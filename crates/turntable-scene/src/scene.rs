//! Scene setup - light rig and camera

use bevy::prelude::*;
use turntable_core::LightRig;

/// Ambient brightness per unit of rig intensity
const AMBIENT_BRIGHTNESS_SCALE: f32 = 400.0;

/// Range of the spot and point lights; both sit about 17 units from the origin
const LIGHT_RANGE: f32 = 40.0;

/// Light rig configuration
#[derive(Debug, Clone, Copy, Resource)]
pub struct Lighting(pub LightRig);

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Marker component for the rig's spot light
#[derive(Component)]
pub struct RigSpotLight;

/// Marker component for the rig's point light
#[derive(Component)]
pub struct RigPointLight;

/// Plugin for scene setup
pub struct SceneSetupPlugin;

impl Plugin for SceneSetupPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_scene);
    }
}

fn setup_scene(mut commands: Commands, lighting: Res<Lighting>) {
    let rig = lighting.0;

    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: rig.ambient.intensity * AMBIENT_BRIGHTNESS_SCALE,
        ..default()
    });

    commands.spawn((
        SpotLight {
            outer_angle: rig.spot.angle,
            inner_angle: rig.spot.inner_angle(),
            range: LIGHT_RANGE,
            ..default()
        },
        Transform::from_translation(Vec3::from_array(rig.spot.position))
            .looking_at(Vec3::ZERO, Vec3::Y),
        RigSpotLight,
    ));

    commands.spawn((
        PointLight {
            range: LIGHT_RANGE,
            ..default()
        },
        Transform::from_translation(Vec3::from_array(rig.point.position)),
        RigPointLight,
    ));

    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: 75.0_f32.to_radians(),
            ..default()
        }),
        Transform::from_xyz(0.0, 0.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
        MainCamera,
    ));

    tracing::info!(
        ambient = rig.ambient.intensity,
        spot_angle = rig.spot.angle,
        "Scene initialized"
    );
}
